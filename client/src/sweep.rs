//! Traversal orders used by the stock gardeners
//!
//! Both orders are snakes, so consecutive plots are always neighbours:
//! - `Rows` starts at the top-left corner and walks each row, alternating
//!   left-to-right and right-to-left.
//! - `Columns` starts at the bottom-right corner and walks each column,
//!   alternating bottom-to-top and top-to-bottom.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepOrder {
    Rows,
    Columns,
}

impl SweepOrder {
    /// Every plot of a `rows x columns` field exactly once, as `(row, col)`.
    pub fn plots(self, rows: i32, columns: i32) -> Vec<(i32, i32)> {
        let mut plots = Vec::with_capacity((rows.max(0) * columns.max(0)) as usize);
        match self {
            SweepOrder::Rows => {
                for row in 0..rows {
                    if row % 2 == 0 {
                        plots.extend((0..columns).map(|col| (row, col)));
                    } else {
                        plots.extend((0..columns).rev().map(|col| (row, col)));
                    }
                }
            }
            SweepOrder::Columns => {
                for (pass, col) in (0..columns).rev().enumerate() {
                    if pass % 2 == 0 {
                        plots.extend((0..rows).rev().map(|row| (row, col)));
                    } else {
                        plots.extend((0..rows).map(|row| (row, col)));
                    }
                }
            }
        }
        plots
    }
}
