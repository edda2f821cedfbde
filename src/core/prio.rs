//! Priority bitmap management for O(1) highest-ready lookup
//!
//! Bit `p` of the map is set iff the ready queue for priority `p` is
//! non-empty. Priority 0 is the highest, so the highest ready priority is
//! the lowest set bit, found with a single trailing-zeros count.

use crate::config::CFG_PRIO_MAX;
use crate::types::OsPrio;

const _: () = assert!(CFG_PRIO_MAX <= 32, "priority bitmap holds 32 levels");

/// Priority bitmap table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrioTable {
    bitmap: u32,
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable { bitmap: 0 }
    }

    /// Insert a priority into the bitmap
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);
        self.bitmap |= 1 << prio;
    }

    /// Remove a priority from the bitmap
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);
        self.bitmap &= !(1 << prio);
    }

    /// Get the highest priority with its bit set
    ///
    /// Returns the lowest priority level when the table is empty; the
    /// kernel never hits that case because the idle task is always ready.
    #[inline]
    pub fn get_highest(&self) -> OsPrio {
        if self.bitmap == 0 {
            return (CFG_PRIO_MAX - 1) as OsPrio;
        }
        self.bitmap.trailing_zeros() as OsPrio
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        (self.bitmap & (1 << prio)) != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), (CFG_PRIO_MAX - 1) as OsPrio);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), 5);

        table.insert(3);
        assert_eq!(table.get_highest(), 3);

        table.remove(3);
        assert_eq!(table.get_highest(), 5);

        table.remove(5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_boundary_priorities() {
        let mut table = PrioTable::new();

        table.insert(31);
        assert_eq!(table.get_highest(), 31);

        table.insert(0);
        assert_eq!(table.get_highest(), 0);

        table.remove(0);
        assert_eq!(table.get_highest(), 31);
    }

    /// Each byte is an operation: the low five bits pick a priority, the
    /// top bit picks insert or remove.
    #[quickcheck]
    fn matches_ordered_set_model(bytecode: Vec<u8>) -> bool {
        let mut table = PrioTable::new();
        let mut model = BTreeSet::new();

        for op in bytecode {
            let prio = (op & 0x1f) as OsPrio;
            if op & 0x80 != 0 {
                table.insert(prio);
                model.insert(prio);
            } else {
                table.remove(prio);
                model.remove(&prio);
            }

            if table.is_empty() != model.is_empty() {
                return false;
            }
            if let Some(&first) = model.iter().next() {
                if table.get_highest() != first {
                    return false;
                }
            }
        }
        true
    }
}
