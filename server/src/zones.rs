//! Zone locks guarding the field
//!
//! The field is split into `ZONE_SIDE x ZONE_SIDE` blocks. Each block shares
//! one lock, so two gardeners working neighbouring plots of the same zone
//! queue up behind each other while plots in other zones proceed in parallel.

use crate::field::Plot;
use garden_shared::ZONE_SIDE;
use std::fmt;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {}", self.0)
    }
}

/// Index of the zone containing `plot` in a field `columns` cells wide.
pub fn zone_index(plot: Plot, columns: usize) -> ZoneId {
    ZoneId((plot.row / ZONE_SIDE) * (columns / ZONE_SIDE) + plot.col / ZONE_SIDE)
}

/// One mutex per zone. Not reentrant: locking a zone twice from the same
/// session deadlocks.
pub struct ZoneLocks {
    columns: usize,
    locks: Vec<Mutex<()>>,
}

impl ZoneLocks {
    pub fn new(rows: usize, columns: usize) -> Self {
        let count = (rows / ZONE_SIDE) * (columns / ZONE_SIDE);
        Self {
            columns,
            locks: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn zone_of(&self, plot: Plot) -> ZoneId {
        zone_index(plot, self.columns)
    }

    /// Waits until the zone is free and takes it.
    ///
    /// Panics if `zone` is not a zone of this field; callers derive it from a
    /// plot already checked against the field bounds.
    pub async fn lock(&self, zone: ZoneId) -> ZoneGuard<'_> {
        let guard = self.locks[zone.0].lock().await;
        ZoneGuard {
            zone,
            _guard: guard,
        }
    }

    /// Reports whether some session currently holds the zone.
    pub fn is_locked(&self, zone: ZoneId) -> bool {
        self.locks
            .get(zone.0)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Proof of holding a zone lock. Dropping it unlocks the zone.
pub struct ZoneGuard<'a> {
    zone: ZoneId,
    _guard: MutexGuard<'a, ()>,
}

impl ZoneGuard<'_> {
    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    /// Unlocks the zone.
    pub fn release(self) {}
}
