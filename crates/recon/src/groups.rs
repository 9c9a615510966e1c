use std::collections::BTreeSet;

use crate::config::GroupPass;
use crate::model::{sum_cents, Group, GroupDirection, RowId, SearchStats, Transaction};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GroupPassOutput {
    pub groups: Vec<Group>,
    pub consumed_ledger: BTreeSet<RowId>,
    pub consumed_bank: BTreeSet<RowId>,
    pub stats: SearchStats,
}

// ---------------------------------------------------------------------------
// N -> 1 search
// ---------------------------------------------------------------------------

/// Find groups of component rows that sum to a single target row.
///
/// With `LedgerToBank` every bank row is a target and ledger rows are
/// components; `BankToLedger` swaps the roles. Targets are visited in input
/// order. For each one the candidate components are the unconsumed rows of
/// the same sign, dated within `pass.days_window` of the target, whose
/// magnitude does not exceed `|T| + tolerance`. Candidates are ordered by
/// descending magnitude then row id and capped at `pass.max_candidates`.
/// The first subset (in DFS index order) with a size in
/// `[min_group_size, max_group_size]` and a sum within `tolerance` of `T`
/// wins.
///
/// Callers pass only rows that are still unclaimed; the returned consumed sets
/// cover this pass alone.
pub fn build_groups(
    ledger: &[Transaction],
    bank: &[Transaction],
    pass: &GroupPass,
    direction: GroupDirection,
) -> GroupPassOutput {
    let (targets, components) = match direction {
        GroupDirection::LedgerToBank => (bank, ledger),
        GroupDirection::BankToLedger => (ledger, bank),
    };

    let mut used_targets: BTreeSet<RowId> = BTreeSet::new();
    let mut used_components: BTreeSet<RowId> = BTreeSet::new();
    let mut groups = Vec::new();
    let mut stats = SearchStats::default();
    let window = i64::from(pass.days_window);

    for target in targets {
        if target.amount_cents == 0 || target.date.is_none() {
            continue;
        }
        let sign = target.amount_cents.signum();
        let limit = target
            .amount_cents
            .unsigned_abs()
            .saturating_add(pass.tolerance_cents.unsigned_abs());

        let mut candidates: Vec<&Transaction> = components
            .iter()
            .filter(|c| !used_components.contains(&c.row_id))
            .filter(|c| c.amount_cents.signum() == sign)
            .filter(|c| c.amount_cents.unsigned_abs() <= limit)
            .filter(|c| c.days_from(target).is_some_and(|d| d <= window))
            .collect();

        if candidates.len() < pass.min_group_size {
            stats.targets_without_candidates += 1;
            continue;
        }

        candidates.sort_by(|a, b| {
            b.amount_cents
                .unsigned_abs()
                .cmp(&a.amount_cents.unsigned_abs())
                .then(a.row_id.cmp(&b.row_id))
        });
        candidates.truncate(pass.max_candidates);

        let amounts: Vec<i64> = candidates.iter().map(|c| c.amount_cents).collect();
        let search = subset_sum_search(
            &amounts,
            target.amount_cents,
            pass.tolerance_cents,
            pass.min_group_size,
            pass.max_group_size,
            pass.max_nodes,
        );
        stats.targets_searched += 1;
        stats.nodes_visited += search.nodes_visited;
        if search.cap_hit {
            stats.cap_hits += 1;
            tracing::debug!(
                target = %target.row_id,
                nodes = search.nodes_visited,
                "group search hit node cap"
            );
        }

        let Some(hit) = search.hit else {
            continue;
        };

        let picked: Vec<Transaction> = hit.iter().map(|&i| candidates[i].clone()).collect();
        let amount_total_cents = sum_cents(picked.iter().map(|c| c.amount_cents));
        for c in &picked {
            used_components.insert(c.row_id);
        }
        used_targets.insert(target.row_id);

        groups.push(Group {
            target: target.clone(),
            components: picked,
            amount_total_cents,
            diff_cents: amount_total_cents.saturating_sub(target.amount_cents),
            status: pass.status,
            direction,
        });
    }

    tracing::debug!(
        status = %pass.status,
        direction = %direction,
        groups = groups.len(),
        targets_searched = stats.targets_searched,
        nodes = stats.nodes_visited,
        cap_hits = stats.cap_hits,
        "group pass done"
    );

    let (consumed_ledger, consumed_bank) = match direction {
        GroupDirection::LedgerToBank => (used_components, used_targets),
        GroupDirection::BankToLedger => (used_targets, used_components),
    };

    GroupPassOutput {
        groups,
        consumed_ledger,
        consumed_bank,
        stats,
    }
}

// ---------------------------------------------------------------------------
// Subset-sum DFS
// ---------------------------------------------------------------------------

struct SearchResult {
    hit: Option<Vec<usize>>,
    nodes_visited: u64,
    cap_hit: bool,
}

/// Bounded first-hit subset search over `amounts` (all sharing the target's
/// sign). Indices are explored in ascending order and never revisited within
/// a branch, so the result depends only on the input order.
fn subset_sum_search(
    amounts: &[i64],
    target: i64,
    tolerance: i64,
    min_group_size: usize,
    max_group_size: usize,
    max_nodes: u64,
) -> SearchResult {
    let mut nodes_visited: u64 = 0;
    let mut cap_hit = false;
    let mut stack: Vec<usize> = Vec::new();
    let ceiling = target.unsigned_abs().saturating_add(tolerance.unsigned_abs());

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        amounts: &[i64],
        target: i64,
        tolerance: i64,
        ceiling: u64,
        min_group_size: usize,
        max_group_size: usize,
        max_nodes: u64,
        start: usize,
        current_sum: i64,
        stack: &mut Vec<usize>,
        nodes_visited: &mut u64,
        cap_hit: &mut bool,
    ) -> bool {
        if *cap_hit {
            return false;
        }

        *nodes_visited += 1;
        if *nodes_visited >= max_nodes {
            *cap_hit = true;
            return false;
        }

        if stack.len() >= min_group_size && current_sum.abs_diff(target) <= tolerance.unsigned_abs() {
            return true;
        }

        if stack.len() >= max_group_size {
            return false;
        }

        for i in start..amounts.len() {
            let next = current_sum.saturating_add(amounts[i]);
            // Same-sign components only grow the magnitude.
            if next.unsigned_abs() > ceiling {
                continue;
            }
            stack.push(i);
            if dfs(
                amounts,
                target,
                tolerance,
                ceiling,
                min_group_size,
                max_group_size,
                max_nodes,
                i + 1,
                next,
                stack,
                nodes_visited,
                cap_hit,
            ) {
                return true;
            }
            stack.pop();

            if *cap_hit {
                return false;
            }
        }
        false
    }

    let found = dfs(
        amounts,
        target,
        tolerance,
        ceiling,
        min_group_size,
        max_group_size,
        max_nodes,
        0,
        0,
        &mut stack,
        &mut nodes_visited,
        &mut cap_hit,
    );

    SearchResult {
        hit: found.then_some(stack),
        nodes_visited,
        cap_hit,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
