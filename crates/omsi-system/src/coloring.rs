//! Structural sparsity and column coloring for Jacobian assembly.
//!
//! Columns that never share a nonzero row can be seeded together, so one
//! directional-derivative evaluation fills several columns at once.

use crate::error::{SystemError, SystemResult};

/// Nonzero structure of an `n_rows x n_cols` Jacobian, stored per column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparsityPattern {
    n_rows: usize,
    columns: Vec<Vec<usize>>,
}

impl SparsityPattern {
    /// Build from `(row, col)` nonzero positions. Duplicates are ignored.
    pub fn new(n_rows: usize, n_cols: usize, nonzeros: &[(usize, usize)]) -> SystemResult<Self> {
        let mut columns = vec![Vec::new(); n_cols];
        for &(row, col) in nonzeros {
            if row >= n_rows || col >= n_cols {
                return Err(SystemError::Layout {
                    what: format!("nonzero ({row}, {col}) outside {n_rows}x{n_cols} pattern"),
                });
            }
            columns[col].push(row);
        }
        for rows in &mut columns {
            rows.sort_unstable();
            rows.dedup();
        }
        Ok(Self { n_rows, columns })
    }

    /// Every entry structurally nonzero.
    pub fn dense(n: usize) -> Self {
        Self {
            n_rows: n,
            columns: vec![(0..n).collect::<Vec<_>>(); n],
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn nnz(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Rows with a nonzero in `col`, ascending.
    pub fn column_rows(&self, col: usize) -> &[usize] {
        self.columns.get(col).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.column_rows(col).binary_search(&row).is_ok()
    }
}

/// Partition of the Jacobian columns into structurally orthogonal groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnColoring {
    pattern: SparsityPattern,
    groups: Vec<Vec<usize>>,
}

impl ColumnColoring {
    /// Greedy first-fit coloring in column order.
    pub fn greedy(pattern: SparsityPattern) -> Self {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut occupied: Vec<Vec<bool>> = Vec::new();

        for col in 0..pattern.n_cols() {
            let rows = pattern.column_rows(col);
            let color = occupied
                .iter()
                .position(|used| rows.iter().all(|&r| !used[r]));
            let color = match color {
                Some(c) => c,
                None => {
                    groups.push(Vec::new());
                    occupied.push(vec![false; pattern.n_rows()]);
                    groups.len() - 1
                }
            };
            groups[color].push(col);
            for &r in rows {
                occupied[color][r] = true;
            }
        }

        Self { pattern, groups }
    }

    /// Trivial coloring: one group per column of a dense pattern.
    pub fn uncolored(n: usize) -> Self {
        Self {
            pattern: SparsityPattern::dense(n),
            groups: (0..n).map(|c| vec![c]).collect(),
        }
    }

    pub fn pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn n_colors(&self) -> usize {
        self.groups.len()
    }
}
