//! The shared field
//!
//! The field is a row-major grid of plot values shared by every gardener
//! session. It holds no locks of its own: writers must hold the zone lock of
//! the plot they touch, which `claim_if_free` enforces by taking the
//! `ZoneGuard` as an argument. Cells are atomics so map snapshots can be taken
//! while other zones are being worked.

use crate::zones::{zone_index, ZoneGuard};
use garden_shared::{FieldSize, BLOCKED, UNTOUCHED};
use log::error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Share of blocked plots is drawn from this range, in percent.
pub const BLOCKED_PERCENT_MIN: usize = 10;
pub const BLOCKED_PERCENT_MAX: usize = 30;

/// Coordinates of a plot known to lie inside the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Plot {
    pub row: usize,
    pub col: usize,
}

impl Plot {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Plot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row: {}, col: {})", self.row, self.col)
    }
}

pub struct Field {
    rows: usize,
    columns: usize,
    cells: Vec<AtomicI32>,
}

impl Field {
    /// Creates a field with every plot untouched, then blocks between 10% and
    /// 30% of the plots at distinct random positions.
    pub fn initialize<R: Rng + ?Sized>(rows: usize, columns: usize, rng: &mut R) -> Self {
        let mut cells = vec![UNTOUCHED; rows * columns];

        let percent = rng.gen_range(BLOCKED_PERCENT_MIN..BLOCKED_PERCENT_MAX);
        let blocked = rows * columns * percent / 100;
        for _ in 0..blocked {
            loop {
                let index = rng.gen_range(0..rows) * columns + rng.gen_range(0..columns);
                if cells[index] != BLOCKED {
                    cells[index] = BLOCKED;
                    break;
                }
            }
        }

        Self {
            rows,
            columns,
            cells: cells.into_iter().map(AtomicI32::new).collect(),
        }
    }

    /// Seeded fields are reproducible; `None` draws from OS entropy.
    pub fn with_seed(rows: usize, columns: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::initialize(rows, columns, &mut rng)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Dimensions as sent to gardeners on connect.
    pub fn size(&self) -> FieldSize {
        FieldSize {
            rows: self.rows as i32,
            columns: self.columns as i32,
        }
    }

    pub fn contains(&self, row: i32, col: i32) -> bool {
        self.plot_at(row, col).is_some()
    }

    /// Converts wire coordinates to a plot, or `None` when outside the field.
    pub fn plot_at(&self, row: i32, col: i32) -> Option<Plot> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < self.rows && col < self.columns).then(|| Plot::new(row, col))
    }

    pub fn read(&self, plot: Plot) -> i32 {
        self.cells[self.index(plot)].load(Ordering::Relaxed)
    }

    /// Marks `plot` as owned by `gardener_id` if nobody has claimed it yet.
    ///
    /// Returns false, leaving the plot unchanged, when it is blocked or already
    /// owned (by anyone, including `gardener_id`), or when `guard` does not
    /// cover the plot's zone.
    pub fn claim_if_free(&self, guard: &ZoneGuard<'_>, plot: Plot, gardener_id: i32) -> bool {
        let zone = zone_index(plot, self.columns);
        if guard.zone() != zone {
            error!(
                "Gardener {} tried to claim {} while holding {} instead of {}",
                gardener_id,
                plot,
                guard.zone(),
                zone
            );
            return false;
        }

        // The zone lock orders all writers of this cell
        let cell = &self.cells[self.index(plot)];
        if cell.load(Ordering::Relaxed) == UNTOUCHED {
            cell.store(gardener_id, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            rows: self.rows,
            columns: self.columns,
            cells: self
                .cells
                .iter()
                .map(|cell| cell.load(Ordering::Relaxed))
                .collect(),
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.snapshot().count(BLOCKED)
    }

    /// Number of plots currently owned by `gardener_id`.
    pub fn owned_by(&self, gardener_id: i32) -> usize {
        if gardener_id <= 0 {
            return 0;
        }
        self.snapshot().count(gardener_id)
    }

    fn index(&self, plot: Plot) -> usize {
        plot.row * self.columns + plot.col
    }
}

/// Point-in-time copy of the field, rendered as the text of a map event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<i32>,
}

impl FieldSnapshot {
    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.cells[row * self.columns + col]
    }

    /// Number of cells holding `value`.
    pub fn count(&self, value: i32) -> usize {
        self.cells.iter().filter(|&&cell| cell == value).count()
    }
}

impl fmt::Display for FieldSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.columns) {
            for &cell in row {
                if cell < 0 {
                    write!(f, "X ")?;
                } else {
                    write!(f, "{} ", cell)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
