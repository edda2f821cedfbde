//! Delta-encoded delay queue
//!
//! Every node stores its remaining ticks relative to the node before it,
//! so the tick handler only ever decrements the head. A node's absolute
//! remaining time is the sum of the deltas from the head through itself.

use crate::core::list::{Link, List, Nodes};
use crate::types::OsTick;

/// Arena node that can sit on a [`DelayQueue`]
pub trait Delayed {
    fn dly_link(&mut self) -> &mut Link;
    fn dly_ticks(&mut self) -> &mut OsTick;
}

/// Ordered queue of delayed nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayQueue {
    list: List,
}

impl DelayQueue {
    pub const fn new() -> Self {
        DelayQueue { list: List::new() }
    }

    #[inline]
    pub fn front(&self) -> Option<usize> {
        self.list.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Insert `idx` so that it expires `ticks` ticks from now
    ///
    /// Nodes sharing a deadline keep insertion order.
    pub fn insert<T: Delayed>(&mut self, slots: &mut [T], idx: usize, ticks: OsTick) {
        let mut nodes = Nodes::new(slots, T::dly_link);
        let mut sum: OsTick = 0;
        let mut cur = self.list.front();

        while let Some(i) = cur {
            let delta = *nodes.slot(i).dly_ticks();
            if sum.saturating_add(delta) > ticks {
                let own = ticks - sum;
                *nodes.slot(idx).dly_ticks() = own;
                *nodes.slot(i).dly_ticks() = delta - own;
                self.list.insert_before(&mut nodes, i, idx);
                return;
            }
            sum += delta;
            cur = self.list.next(&mut nodes, i);
        }

        *nodes.slot(idx).dly_ticks() = ticks - sum;
        self.list.push_back(&mut nodes, idx);
    }

    /// Remove `idx` before it expires, folding its delta into its successor
    pub fn remove<T: Delayed>(&mut self, slots: &mut [T], idx: usize) {
        let mut nodes = Nodes::new(slots, T::dly_link);
        let delta = *nodes.slot(idx).dly_ticks();

        if let Some(next) = self.list.next(&mut nodes, idx) {
            *nodes.slot(next).dly_ticks() += delta;
        }
        self.list.remove(&mut nodes, idx);
        *nodes.slot(idx).dly_ticks() = 0;
    }

    /// Count one tick off the head
    pub fn tick<T: Delayed>(&mut self, slots: &mut [T]) {
        if let Some(head) = self.list.front() {
            let delta = slots[head].dly_ticks();
            *delta = delta.saturating_sub(1);
        }
    }

    /// Unlink and return the head if its delay has run out
    pub fn pop_expired<T: Delayed>(&mut self, slots: &mut [T]) -> Option<usize> {
        let head = self.list.front()?;
        if *slots[head].dly_ticks() != 0 {
            return None;
        }
        let mut nodes = Nodes::new(slots, T::dly_link);
        self.list.remove(&mut nodes, head);
        Some(head)
    }

    /// Absolute remaining ticks of `idx`, or `None` if it is not queued
    pub fn remaining<T: Delayed>(&self, slots: &mut [T], idx: usize) -> Option<OsTick> {
        let mut nodes = Nodes::new(slots, T::dly_link);
        let mut sum: OsTick = 0;
        let mut cur = self.list.front();

        while let Some(i) = cur {
            sum += *nodes.slot(i).dly_ticks();
            if i == idx {
                return Some(sum);
            }
            cur = self.list.next(&mut nodes, i);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Sleeper {
        link: Link,
        ticks: OsTick,
    }

    impl Delayed for Sleeper {
        fn dly_link(&mut self) -> &mut Link {
            &mut self.link
        }
        fn dly_ticks(&mut self) -> &mut OsTick {
            &mut self.ticks
        }
    }

    fn arena(n: usize) -> Vec<Sleeper> {
        (0..n).map(|_| Sleeper::default()).collect()
    }

    #[test]
    fn insert_orders_by_deadline() {
        let mut slots = arena(4);
        let mut q = DelayQueue::new();

        q.insert(&mut slots, 0, 10);
        q.insert(&mut slots, 1, 3);
        q.insert(&mut slots, 2, 7);
        q.insert(&mut slots, 3, 7);

        assert_eq!(q.front(), Some(1));
        assert_eq!(slots[1].ticks, 3);
        assert_eq!(slots[2].ticks, 4);
        // Same deadline queues behind the earlier insert
        assert_eq!(slots[3].ticks, 0);
        assert_eq!(slots[0].ticks, 3);
        assert_eq!(q.remaining(&mut slots, 3), Some(7));
        assert_eq!(q.remaining(&mut slots, 0), Some(10));
    }

    #[test]
    fn remove_keeps_successor_deadline() {
        let mut slots = arena(3);
        let mut q = DelayQueue::new();

        q.insert(&mut slots, 0, 4);
        q.insert(&mut slots, 1, 9);
        q.insert(&mut slots, 2, 12);

        q.remove(&mut slots, 0);
        assert_eq!(q.front(), Some(1));
        assert_eq!(q.remaining(&mut slots, 1), Some(9));
        assert_eq!(q.remaining(&mut slots, 2), Some(12));
        assert_eq!(q.remaining(&mut slots, 0), None);
    }

    #[test]
    fn equal_deadlines_expire_together() {
        let mut slots = arena(3);
        let mut q = DelayQueue::new();

        q.insert(&mut slots, 0, 2);
        q.insert(&mut slots, 1, 2);
        q.insert(&mut slots, 2, 3);

        q.tick(&mut slots);
        assert_eq!(q.pop_expired(&mut slots), None);

        q.tick(&mut slots);
        assert_eq!(q.pop_expired(&mut slots), Some(0));
        assert_eq!(q.pop_expired(&mut slots), Some(1));
        assert_eq!(q.pop_expired(&mut slots), None);
        assert_eq!(q.len(), 1);
    }

    /// Each byte is an operation on one of eight sleepers: insert with a
    /// delay of 1..=32 ticks, remove, or advance one tick.
    #[quickcheck]
    fn deltas_sum_to_remaining_ticks(bytecode: Vec<u8>) -> bool {
        const N: usize = 8;
        let mut slots = arena(N);
        let mut q = DelayQueue::new();
        let mut model: BTreeMap<usize, OsTick> = BTreeMap::new();

        for op in bytecode {
            let idx = (op as usize) % N;
            match op >> 6 {
                0 | 1 => {
                    if !model.contains_key(&idx) {
                        let ticks = ((op >> 3) as OsTick & 0x1f) + 1;
                        q.insert(&mut slots, idx, ticks);
                        model.insert(idx, ticks);
                    }
                }
                2 => {
                    if model.remove(&idx).is_some() {
                        q.remove(&mut slots, idx);
                    }
                }
                _ => {
                    q.tick(&mut slots);
                    for ticks in model.values_mut() {
                        *ticks -= 1;
                    }
                    let mut expired = Vec::new();
                    while let Some(i) = q.pop_expired(&mut slots) {
                        expired.push(i);
                    }
                    expired.sort_unstable();
                    let due: Vec<usize> = model
                        .iter()
                        .filter(|&(_, &t)| t == 0)
                        .map(|(&i, _)| i)
                        .collect();
                    if expired != due {
                        return false;
                    }
                    model.retain(|_, t| *t != 0);
                }
            }

            if q.len() != model.len() {
                return false;
            }
            for (&i, &ticks) in model.iter() {
                if q.remaining(&mut slots, i) != Some(ticks) {
                    return false;
                }
            }
        }
        true
    }
}
