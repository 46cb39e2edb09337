//! Non-dominated sorting and crowding distance.

use std::cmp::Ordering;

/// Whether `a` Pareto-dominates `b` (all objectives minimized).
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Splits points into successive non-dominated fronts.
///
/// Returns fronts of indices into `points`; the first front is the Pareto
/// front. Indices inside a front keep ascending order.
pub fn non_dominated_sort(points: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = points.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let mut current = Vec::new();
    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(&points[p], &points[q]) {
                dominated_by[p].push(q);
            } else if dominates(&points[q], &points[p]) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            current.push(p);
        }
    }

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of every member of `front`, in front order.
///
/// Boundary points of each objective get `f64::INFINITY`.
pub fn crowding_distance(points: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let n = front.len();
    let mut distance = vec![0.0; n];
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }
    let objectives = points[front[0]].len();
    let mut order: Vec<usize> = (0..n).collect();
    for m in 0..objectives {
        order.sort_by(|&a, &b| points[front[a]][m].total_cmp(&points[front[b]][m]));
        let low = points[front[order[0]]][m];
        let high = points[front[order[n - 1]]][m];
        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;
        let span = high - low;
        if span <= 0.0 {
            continue;
        }
        for k in 1..n - 1 {
            let gap = points[front[order[k + 1]]][m] - points[front[order[k - 1]]][m];
            distance[order[k]] += gap / span;
        }
    }
    distance
}

/// Front rank and crowding distance of every point.
pub fn rank_and_crowding(points: &[Vec<f64>]) -> (Vec<usize>, Vec<f64>) {
    let mut rank = vec![0; points.len()];
    let mut crowding = vec![0.0; points.len()];
    for (r, front) in non_dominated_sort(points).iter().enumerate() {
        for (&i, d) in front.iter().zip(crowding_distance(points, front)) {
            rank[i] = r;
            crowding[i] = d;
        }
    }
    (rank, crowding)
}

/// Crowded-comparison order: lower rank first, then larger crowding distance.
pub fn crowded_cmp(rank: &[usize], crowding: &[f64], a: usize, b: usize) -> Ordering {
    rank[a]
        .cmp(&rank[b])
        .then_with(|| crowding[b].total_cmp(&crowding[a]))
}

/// Indices of the `count` best points by crowded comparison.
///
/// Ties keep index order, so selection is deterministic.
pub fn select_best(points: &[Vec<f64>], count: usize) -> Vec<usize> {
    let (rank, crowding) = rank_and_crowding(points);
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| crowded_cmp(&rank, &crowding, a, b).then(a.cmp(&b)));
    order.truncate(count);
    order
}
