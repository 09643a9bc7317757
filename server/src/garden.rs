use crate::field::Field;
use crate::zones::ZoneLocks;

/// The field together with the zone locks guarding it, shared by every
/// gardener session.
pub struct Garden {
    pub field: Field,
    pub zones: ZoneLocks,
}

impl Garden {
    pub fn new(field: Field) -> Self {
        let zones = ZoneLocks::new(field.rows(), field.columns());
        Self { field, zones }
    }

    /// Field of `2 * side` by `2 * side` plots.
    pub fn with_side(side: usize, seed: Option<u64>) -> Self {
        Self::new(Field::with_seed(2 * side, 2 * side, seed))
    }
}
