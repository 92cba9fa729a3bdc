use serde::{Serialize, Serializer};

use crate::error::{PipelineError, PipelineResult};

/// Row-major grid of sensor readings. Dimensions are checked when the
/// matrix is built, so every accessor can trust `rows * cols == cells.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<u32>,
}

impl PressureMatrix {
    pub fn new(rows: usize, cols: usize, cells: Vec<u32>) -> PipelineResult<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| PipelineError::range(format!("{rows}x{cols} matrix is too large")))?;

        if cells.len() != expected {
            return Err(PipelineError::range(format!(
                "{rows}x{cols} matrix needs {expected} cells, got {}",
                cells.len()
            )));
        }

        Ok(Self { rows, cols, cells })
    }

    pub fn filled(rows: usize, cols: usize, value: u32) -> PipelineResult<Self> {
        let count = rows
            .checked_mul(cols)
            .ok_or_else(|| PipelineError::range(format!("{rows}x{cols} matrix is too large")))?;
        Self::new(rows, cols, vec![value; count])
    }

    /// A 0x0 matrix. Never produced by the parser.
    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            cells: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> Option<&[u32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.cells[start..start + self.cols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[u32]> {
        (0..self.rows).filter_map(move |r| self.row(r))
    }

    pub fn to_nested(&self) -> Vec<Vec<u32>> {
        self.iter_rows().map(|row| row.to_vec()).collect()
    }
}

// Heatmap consumers want a jagged array, not the flat buffer.
impl Serialize for PressureMatrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter_rows())
    }
}
