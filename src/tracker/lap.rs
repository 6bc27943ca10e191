//! Sparse rectangular linear assignment on top of `lapjv`.
//!
//! Only finite edges are stored. The bipartite graph is split into connected
//! components and each component is solved as an augmented square problem:
//!
//! ```text
//!            targets        no-link(rows)
//! rows     [ link costs   | diag(alt)      ]
//! no-link  [ diag(alt)    | aux (transpose) ]
//! ```
//!
//! The auxiliary block holds the global minimum edge cost wherever the
//! transposed link block has an edge. Missing entries carry a finite blocking
//! cost larger than the all-no-link solution.
//!
//! When several assignments share the minimum cost, the one keeping the
//! earliest edges in insertion order wins.

use std::collections::{HashSet, VecDeque};

use log::trace;
use ndarray::Array2;

/// Relative cost difference below which two assignments count as tied.
const TIE_TOLERANCE: f64 = 1e-9;

/// A candidate link between `row` and `col` with a strictly positive cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEdge {
    pub row: usize,
    pub col: usize,
    pub cost: f64,
}

/// Cost matrix that stores only the edges that exist.
#[derive(Debug, Clone, Default)]
pub struct SparseCostMatrix {
    rows: usize,
    cols: usize,
    edges: Vec<CostEdge>,
    seen: HashSet<(usize, usize)>,
}

impl SparseCostMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[CostEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Add an edge. Non-finite or non-positive costs are "no edge", and a
    /// repeated `(row, col)` keeps the first cost. Returns whether the edge
    /// was stored.
    pub fn push(&mut self, row: usize, col: usize, cost: f64) -> bool {
        if row >= self.rows || col >= self.cols || !cost.is_finite() || cost <= 0.0 {
            return false;
        }
        if !self.seen.insert((row, col)) {
            return false;
        }
        self.edges.push(CostEdge { row, col, cost });
        true
    }

    pub fn cost(&self, row: usize, col: usize) -> Option<f64> {
        self.edges
            .iter()
            .find(|e| e.row == row && e.col == col)
            .map(|e| e.cost)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssignmentResult {
    /// Accepted `(row, col)` pairs, ascending by row
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // keep the smaller index as root
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

#[derive(Default)]
struct Component {
    rows: Vec<usize>,
    cols: Vec<usize>,
    edges: Vec<CostEdge>,
}

/// Split the edges into connected components, ordered by their smallest row.
fn components(matrix: &SparseCostMatrix) -> Vec<Component> {
    let rows = matrix.rows;
    let mut set = DisjointSet::new(rows + matrix.cols);
    for e in &matrix.edges {
        set.union(e.row, rows + e.col);
    }

    // roots are the smallest member, and every component holds at least one row
    let mut slot = vec![usize::MAX; rows];
    let mut comps: Vec<Component> = Vec::new();
    let mut row_has_edge = vec![false; rows];
    for e in &matrix.edges {
        row_has_edge[e.row] = true;
    }
    for row in 0..rows {
        if row_has_edge[row] {
            let root = set.find(row);
            if slot[root] == usize::MAX {
                slot[root] = comps.len();
                comps.push(Component::default());
            }
        }
    }
    for e in &matrix.edges {
        let c = &mut comps[slot[set.find(e.row)]];
        c.edges.push(*e);
        c.rows.push(e.row);
        c.cols.push(e.col);
    }
    for c in &mut comps {
        c.rows.sort_unstable();
        c.rows.dedup();
        c.cols.sort_unstable();
        c.cols.dedup();
    }
    comps
}

/// Minimum-cost partial matching over the sparse edges.
///
/// Leaving a row or column unmatched costs `alternative_cost` each, where
/// `alternative_cost = max(factor * max_edge_cost, 1)`, so any stored edge is
/// cheaper than not linking. Among equal-cost optima an edge pushed earlier
/// is kept over a later one. Returns an error message when `lapjv` fails or
/// its solution relies on a forbidden entry.
pub fn linear_assignment(
    matrix: &SparseCostMatrix,
    alternative_cost_factor: f64,
) -> Result<AssignmentResult, String> {
    if matrix.edges.is_empty() {
        return Ok(AssignmentResult {
            matches: vec![],
            unmatched_rows: (0..matrix.rows).collect(),
            unmatched_cols: (0..matrix.cols).collect(),
        });
    }

    let (min_cost, max_cost) = matrix
        .edges
        .iter()
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), e| {
            (lo.min(e.cost), hi.max(e.cost))
        });
    let alternative = (alternative_cost_factor * max_cost).max(1.0);

    let mut matches = Vec::new();
    for (index, comp) in components(matrix).iter().enumerate() {
        solve_component(comp, index, alternative, min_cost, &mut matches)?;
    }
    matches.sort_unstable();

    let mut row_used = vec![false; matrix.rows];
    let mut col_used = vec![false; matrix.cols];
    for &(r, c) in &matches {
        row_used[r] = true;
        col_used[c] = true;
    }

    Ok(AssignmentResult {
        matches,
        unmatched_rows: (0..matrix.rows).filter(|&r| !row_used[r]).collect(),
        unmatched_cols: (0..matrix.cols).filter(|&c| !col_used[c]).collect(),
    })
}

fn solve_component(
    comp: &Component,
    index: usize,
    alternative: f64,
    min_cost: f64,
    matches: &mut Vec<(usize, usize)>,
) -> Result<(), String> {
    let (r, c) = (comp.rows.len(), comp.cols.len());
    let size = r + c;
    let blocked = 2.0 * alternative * (size as f64 + 1.0);

    let local_row = |row: usize| comp.rows.binary_search(&row).unwrap_or_default();
    let local_col = |col: usize| comp.cols.binary_search(&col).unwrap_or_default();

    let mut dense = Array2::<f64>::from_elem((size, size), blocked);
    for i in 0..r {
        dense[[i, c + i]] = alternative;
    }
    for j in 0..c {
        dense[[r + j, j]] = alternative;
    }
    for e in &comp.edges {
        let (i, j) = (local_row(e.row), local_col(e.col));
        dense[[i, j]] = e.cost;
        dense[[r + j, c + i]] = min_cost;
    }

    let (mut row_to_col, _) = lapjv::lapjv(&dense)
        .map_err(|err| format!("component {index} ({r}x{c}): lapjv failed: {err:?}"))?;

    for (k, &col) in row_to_col.iter().enumerate() {
        if col >= size || dense[[k, col]] >= blocked {
            return Err(format!(
                "component {index} ({r}x{c}): solution uses forbidden entry ({k}, {col})"
            ));
        }
    }

    let links: Vec<(usize, usize)> = comp
        .edges
        .iter()
        .map(|e| (local_row(e.row), local_col(e.col)))
        .collect();
    let tight = tight_entries(&dense, &row_to_col, blocked);
    prefer_earlier_edges(&links, &tight, &mut row_to_col);

    for (k, &col) in row_to_col.iter().enumerate() {
        if k < r && col < c {
            matches.push((comp.rows[k], comp.cols[col]));
        }
    }
    trace!(
        "solved component {} with {} rows, {} cols, {} edges",
        index,
        r,
        c,
        comp.edges.len()
    );
    Ok(())
}

/// Entries with zero reduced cost under dual potentials derived from the
/// optimal `assignment`. Every optimal assignment uses only these entries.
fn tight_entries(dense: &Array2<f64>, assignment: &[usize], blocked: f64) -> Array2<bool> {
    let n = assignment.len();
    let scale = dense
        .iter()
        .filter(|&&c| c < blocked)
        .fold(1.0_f64, |hi, &c| hi.max(c));
    let tolerance = scale * TIE_TOLERANCE;

    // column potentials are shortest distances in the residual graph
    let mut potential = vec![0.0_f64; n];
    for _ in 0..n {
        let mut changed = false;
        for (row, &own) in assignment.iter().enumerate() {
            let base = potential[own] - dense[[row, own]];
            for col in 0..n {
                let c = dense[[row, col]];
                if c < blocked && base + c < potential[col] - tolerance {
                    potential[col] = base + c;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    Array2::from_shape_fn((n, n), |(row, col)| {
        let c = dense[[row, col]];
        let own = assignment[row];
        c < blocked && c - dense[[row, own]] + potential[own] - potential[col] <= tolerance
    })
}

/// Walk `links` in input order and keep each one whenever some optimal
/// assignment still allows it next to the links kept before it.
fn prefer_earlier_edges(links: &[(usize, usize)], tight: &Array2<bool>, assignment: &mut [usize]) {
    let n = assignment.len();
    let mut owner = vec![0; n];
    for (row, &col) in assignment.iter().enumerate() {
        owner[col] = row;
    }
    let mut fixed_row = vec![false; n];
    let mut fixed_col = vec![false; n];

    for &(row, col) in links {
        if fixed_row[row] || fixed_col[col] {
            continue;
        }
        if assignment[row] != col
            && !(tight[[row, col]] && reroute(tight, assignment, &mut owner, &fixed_col, row, col))
        {
            continue;
        }
        fixed_row[row] = true;
        fixed_col[col] = true;
    }
}

/// Move `row` onto `col` by shifting the rows of a tight alternating path
/// from the current owner of `col` back to the column `row` gives up.
fn reroute(
    tight: &Array2<bool>,
    assignment: &mut [usize],
    owner: &mut [usize],
    fixed_col: &[bool],
    row: usize,
    col: usize,
) -> bool {
    let n = assignment.len();
    let (start, goal) = (owner[col], assignment[row]);
    let mut reached_from = vec![usize::MAX; n];
    let mut visited = vec![false; n];
    visited[start] = true;
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        for k in 0..n {
            if k == col || fixed_col[k] || reached_from[k] != usize::MAX || !tight[[current, k]] {
                continue;
            }
            reached_from[k] = current;
            if k == goal {
                let mut k = goal;
                loop {
                    let moved = reached_from[k];
                    let previous = assignment[moved];
                    assignment[moved] = k;
                    owner[k] = moved;
                    if moved == start {
                        break;
                    }
                    k = previous;
                }
                assignment[row] = col;
                owner[col] = row;
                return true;
            }
            let next = owner[k];
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    false
}
