//
// maxicp-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License  v3
// as published by the Free Software Foundation.
//
// mini-cp is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY.
// See the GNU Lesser General Public License  for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with mini-cp. If not, see http://www.gnu.org/licenses/lgpl-3.0.en.html
//
// Copyright (c)  2022 by X. Gillard
//

//! This module defines the data structures and utilities that are used to
//! save and restore data from the solver trail.
use super::*;

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ TRAIL DATA ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// This structure keeps track of the information about one given level: the
/// length of its trail and the count of each kind of resources that are managed
/// by the state manager
#[derive(Debug, Clone, Copy, Default)]
struct Level {
    /// the length of the trail at the moment this layer was started
    trail_size: usize,

    /// how many integers have already been recorded ? (note: booleans are
    /// simply mapped onto integers)
    integers: usize,

    /// how many sparse sets have already been recorded ?
    sparse_sets: usize,
    /// length of the sparse sets data
    sparse_set_data: usize,

    /// how many partitions have already been recorded ?
    partitions: usize,
    /// length of the partitions data
    partition_data: usize,
}

/// An entry that is used to save/restore data from the trail
#[derive(Debug, Clone, Copy)]
enum TrailEntry {
    /// An entry related to the restoration of an integer value
    IntEntry(IntState),
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ STATE MANAGER ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// A simple state manager that can manage booleans, integers, sparse sets and
/// reversible partitions (basically any reversible data structure ends up
/// being managed by this struct)
#[derive(Debug, Clone)]
pub struct TrailedStateManager {
    /// At what 'time' was this data modified to the point where it needed being saved ?
    ///
    /// # Note:
    /// This data was referred to as 'magic' in minicp and maxicp. Still I like to
    /// convey the idea that 'magic' is actually a monotonic clock  indicating the validity
    /// timestamp of the data.
    clock: usize,
    /// The previous values that are saved on the trail
    trail: Vec<TrailEntry>,
    /// Some book keeping to track what needs and what doesn't need
    /// to be restored upon manager `pop`
    levels: Vec<Level>,

    /// The current value of the various managed data
    integers: Vec<IntState>,

    /// Holds the metadata about sparse sets
    sparse_sets: Vec<SparseSet>,
    /// Holds the actual content of the sparse sets
    sparse_set_data: Vec<usize>,
    /// Holds the indices of the data in a sparse set
    sparse_set_idx: Vec<usize>,

    /// Holds the metadata about the partitions
    partitions: Vec<Partition>,
    /// Holds the (swapped around) elements of all partitions
    partition_data: Vec<usize>,
    /// Holds the absolute position of each element in `partition_data`
    partition_pos: Vec<usize>,
}
impl Default for TrailedStateManager {
    fn default() -> Self {
        Self::new()
    }
}
impl TrailedStateManager {
    /// Creates a new SimpleManager
    pub fn new() -> Self {
        Self {
            clock: 0,
            trail: vec![],
            //
            integers: vec![],
            //
            sparse_sets: vec![],
            sparse_set_data: vec![],
            sparse_set_idx: vec![],
            //
            partitions: vec![],
            partition_data: vec![],
            partition_pos: vec![],

            levels: vec![Level::default()],
        }
    }
}
impl StateManager for TrailedStateManager {}
//------------------------------------------------------------------------------
// Save and Restore management
//------------------------------------------------------------------------------
impl SaveAndRestore for TrailedStateManager {
    /// Saves the current state
    fn save_state(&mut self) {
        self.clock += 1;

        // additional book keeping
        self.levels.push(Level {
            trail_size: self.trail.len(),
            //
            integers: self.integers.len(),
            //
            sparse_sets: self.sparse_sets.len(),
            sparse_set_data: self.sparse_set_data.len(),
            //
            partitions: self.partitions.len(),
            partition_data: self.partition_data.len(),
        })
    }
    /// Restores the previous state
    fn restore_state(&mut self) {
        if self.levels.len() <= 1 {
            panic!("cannot pop above the root level of the state manager");
        }
        let level = self.levels.pop().expect("the root level is never popped");

        // restore whatever needs to be restored
        for e in self.trail.iter().skip(level.trail_size).rev().copied() {
            match e {
                TrailEntry::IntEntry(state) => self.integers[state.id.0] = state,
            }
        }
        // drop stale trail entry
        self.trail.truncate(level.trail_size);

        // integers book keeping
        self.integers.truncate(level.integers);
        // sparse set book keeping
        self.sparse_sets.truncate(level.sparse_sets);
        self.sparse_set_data.truncate(level.sparse_set_data);
        self.sparse_set_idx.truncate(level.sparse_set_data);
        // partitions book keeping
        self.partitions.truncate(level.partitions);
        self.partition_data.truncate(level.partition_data);
        self.partition_pos.truncate(level.partition_data);
    }

    fn level(&self) -> usize {
        self.levels.len() - 1
    }
}
//------------------------------------------------------------------------------
// Int management
//------------------------------------------------------------------------------
/// The state of an integer that can be saved and restored
#[derive(Debug, Clone, Copy)]
struct IntState {
    /// The identifier of the managed resource
    id: ReversibleInt,
    /// At what 'time' was this data modified to the point where it needed being saved ?
    clock: usize,
    /// The value that will be restored in the managed data
    value: isize,
}

impl IntManager for TrailedStateManager {
    /// creates a new managed integer
    fn manage_int(&mut self, value: isize) -> ReversibleInt {
        let id = ReversibleInt(self.integers.len());
        self.integers.push(IntState {
            id,
            clock: self.clock,
            value,
        });
        id
    }
    /// returns the value of a managed integer
    fn get_int(&self, id: ReversibleInt) -> isize {
        self.integers[id.0].value
    }
    /// sets a managed integer's value and returns the new value
    fn set_int(&mut self, id: ReversibleInt, value: isize) -> isize {
        let curr = self.integers[id.0];
        // if the value is unchanged there is no need to do anything
        if value != curr.value {
            // do i need to trail this data ?
            if curr.clock < self.clock {
                self.trail.push(TrailEntry::IntEntry(curr));
                self.integers[id.0] = IntState {
                    id,
                    clock: self.clock,
                    value,
                }
            // apparently i don't need to save it on the trail. i can modify it right away
            } else {
                self.integers[id.0].value = value;
            }
        }
        value
    }
    /// increments a managed integer's value
    fn increment(&mut self, id: ReversibleInt) -> isize {
        self.set_int(id, self.get_int(id) + 1)
    }
    /// decrements a managed integer's value
    fn decrement(&mut self, id: ReversibleInt) -> isize {
        self.set_int(id, self.get_int(id) - 1)
    }
}
//------------------------------------------------------------------------------
// Bool management
//------------------------------------------------------------------------------
impl BoolManager for TrailedStateManager {
    /// creates a new managed boolean
    fn manage_bool(&mut self, v: bool) -> ReversibleBool {
        ReversibleBool(self.manage_int(v as isize))
    }
    /// returns the value of a managed boolean
    fn get_bool(&self, id: ReversibleBool) -> bool {
        self.get_int(id.0) != 0
    }
    /// sets a managed boolean's value and returns the new value
    fn set_bool(&mut self, id: ReversibleBool, value: bool) -> bool {
        self.set_int(id.0, value as isize) != 0
    }
}
//------------------------------------------------------------------------------
// Sparse sets management
//------------------------------------------------------------------------------
/// The information that needs to be maintained in order to deal with a
/// sparse set
#[derive(Debug, Clone, Copy)]
struct SparseSet {
    /// offset of the values
    val_offset: isize,
    /// start index of the sparse set (included)
    start: usize,
    /// capcity of the sparse set
    capa: usize,
    /// the current size of the sparse set
    size: ReversibleInt,
    /// the minimum value in the set (included !)
    min: ReversibleInt,
    /// the maximum value in the set (included !)
    max: ReversibleInt,
}
impl SparseSetManager for TrailedStateManager {
    fn manage_sparse_set(&mut self, n: usize, val_offset: isize) -> ReversibleSparseSet {
        let id = self.sparse_sets.len();
        let start = self.sparse_set_data.len();

        for i in 0..n {
            self.sparse_set_data.push(i);
            self.sparse_set_idx.push(i + start);
        }

        let size = self.manage_int(n as isize);
        let min = self.manage_int(0);
        let max = self.manage_int(n as isize - 1);

        self.sparse_sets.push(SparseSet {
            val_offset,
            start,
            capa: n,
            size,
            min,
            max,
        });
        ReversibleSparseSet(id)
    }
    fn sparse_set_size(&self, id: ReversibleSparseSet) -> usize {
        self.get_int(self.sparse_sets[id.0].size) as usize
    }
    fn sparse_set_is_empty(&self, id: ReversibleSparseSet) -> bool {
        self.sparse_set_size(id) == 0
    }
    fn sparse_set_get_min(&self, id: ReversibleSparseSet) -> Option<isize> {
        let ss = self.sparse_sets[id.0];
        if self.get_int(ss.size) <= 0 {
            None
        } else {
            Some(self.get_int(ss.min) + ss.val_offset)
        }
    }
    fn sparse_set_get_max(&self, id: ReversibleSparseSet) -> Option<isize> {
        let ss = self.sparse_sets[id.0];
        if self.get_int(ss.size) <= 0 {
            None
        } else {
            Some(self.get_int(ss.max) + ss.val_offset)
        }
    }
    fn sparse_set_contains(&self, id: ReversibleSparseSet, value: isize) -> bool {
        let ss = self.sparse_sets[id.0];
        let val = value - ss.val_offset;

        if val < 0 || val >= ss.capa as isize {
            false
        } else {
            let sz = self.get_int(ss.size) as usize;
            self.sparse_set_idx[ss.start + val as usize] < sz + ss.start
        }
    }
    fn sparse_set_remove(&mut self, id: ReversibleSparseSet, value: isize) -> bool {
        if !self.sparse_set_contains(id, value) {
            false
        } else {
            let ss = self.sparse_sets[id.0];
            let val = (value - ss.val_offset) as usize;
            let size = self.get_int(ss.size) as usize;

            let a = ss.start + val;
            let b = ss.start + self.sparse_set_data[ss.start + size - 1];
            self.sparse_set_swap(a, b);

            let size = self.decrement(ss.size) as usize;

            // maintain the bounds
            self.sparse_set_update_min_val_removed(ss, size, val);
            self.sparse_set_update_max_val_removed(ss, size, val);

            true
        }
    }
    fn sparse_set_remove_all(&mut self, id: ReversibleSparseSet) {
        self.set_int(self.sparse_sets[id.0].size, 0);
    }
    fn sparse_set_remove_all_but(&mut self, id: ReversibleSparseSet, value: isize) {
        if self.sparse_set_contains(id, value) {
            // it suffices to place the desired item in position 0
            let ss = self.sparse_sets[id.0];
            let val = (value - ss.val_offset) as usize;

            let a = ss.start + val;
            let b = ss.start + self.sparse_set_data[ss.start];
            self.sparse_set_swap(a, b);

            self.set_int(ss.size, 1);
            self.set_int(ss.min, val as isize);
            self.set_int(ss.max, val as isize);
        } else {
            self.sparse_set_remove_all(id);
        }
    }
    fn sparse_set_keep_only(&mut self, id: ReversibleSparseSet, values: &[isize]) {
        let ss = self.sparse_sets[id.0];
        // the kept values are swapped to the front, the size is only updated
        // at the end so that `contains` still sees the old set
        let mut kept = 0;
        let mut min = isize::MAX;
        let mut max = isize::MIN;
        for value in values.iter().copied() {
            if !self.sparse_set_contains(id, value) {
                continue;
            }
            let val = (value - ss.val_offset) as usize;
            let a = ss.start + val;
            if self.sparse_set_idx[a] < ss.start + kept {
                continue;
            }
            let b = ss.start + self.sparse_set_data[ss.start + kept];
            self.sparse_set_swap(a, b);

            kept += 1;
            min = min.min(val as isize);
            max = max.max(val as isize);
        }

        self.set_int(ss.size, kept as isize);
        if kept > 0 {
            self.set_int(ss.min, min);
            self.set_int(ss.max, max);
        }
    }
    fn sparse_set_remove_below(&mut self, id: ReversibleSparseSet, val: isize) {
        let ss = self.sparse_sets[id.0];
        let val = val - ss.val_offset;

        if self.get_int(ss.size) != 0 {
            let max = self.get_int(ss.max);
            if val > max {
                self.sparse_set_remove_all(id);
            } else {
                let min = self.get_int(ss.min);
                for x in min..val {
                    self.sparse_set_remove(id, x + ss.val_offset);
                }
            }
        }
    }
    fn sparse_set_remove_above(&mut self, id: ReversibleSparseSet, val: isize) {
        let ss = self.sparse_sets[id.0];
        let val = val - ss.val_offset;

        if self.get_int(ss.size) != 0 {
            let min = self.get_int(ss.min);
            if val < min {
                self.sparse_set_remove_all(id);
            } else {
                let max = self.get_int(ss.max);
                for x in val + 1..=max {
                    self.sparse_set_remove(id, x + ss.val_offset);
                }
            }
        }
    }
    fn sparse_set_for_each<F: FnMut(isize)>(&self, id: ReversibleSparseSet, f: F) {
        let ss = self.sparse_sets[id.0];
        let len = self.get_int(ss.size) as usize;

        self.sparse_set_data[ss.start..ss.start + len]
            .iter()
            .map(|v| *v as isize + ss.val_offset)
            .for_each(f)
    }
}
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// private methods
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
impl TrailedStateManager {
    /// swaps the items at indices a and b in the sparse set
    fn sparse_set_swap(&mut self, a: usize, b: usize) {
        let ia = self.sparse_set_idx[a];
        let ib = self.sparse_set_idx[b];
        self.sparse_set_data.swap(ia, ib);
        self.sparse_set_idx.swap(a, b)
    }
    /// update the minimum
    fn sparse_set_update_min_val_removed(&mut self, ss: SparseSet, size: usize, val: usize) {
        let min = self.get_int(ss.min) as usize;

        if min == val {
            if let Some(min) = self.sparse_set_data[ss.start..ss.start + size]
                .iter()
                .min()
                .copied()
            {
                self.set_int(ss.min, min as isize);
            }
        }
    }
    /// update the maximum
    fn sparse_set_update_max_val_removed(&mut self, ss: SparseSet, size: usize, val: usize) {
        let max = self.get_int(ss.max) as usize;

        if max == val {
            if let Some(max) = self.sparse_set_data[ss.start..ss.start + size]
                .iter()
                .max()
                .copied()
            {
                self.set_int(ss.max, max as isize);
            }
        }
    }
}
//------------------------------------------------------------------------------
// Partitions management
//------------------------------------------------------------------------------
/// The information that needs to be maintained in order to deal with a
/// reversible partition
#[derive(Debug, Clone, Copy)]
struct Partition {
    /// start index of the partition in the data (included)
    start: usize,
    /// number of elements in the partition
    capa: usize,
    /// the number of elements still in front of the boundary
    boundary: ReversibleInt,
}
impl PartitionManager for TrailedStateManager {
    fn manage_partition(&mut self, n: usize) -> ReversiblePartition {
        let id = self.partitions.len();
        let start = self.partition_data.len();

        for i in 0..n {
            self.partition_data.push(i);
            self.partition_pos.push(start + i);
        }

        let boundary = self.manage_int(n as isize);
        self.partitions.push(Partition {
            start,
            capa: n,
            boundary,
        });
        ReversiblePartition(id)
    }
    fn partition_boundary(&self, id: ReversiblePartition) -> usize {
        self.get_int(self.partitions[id.0].boundary) as usize
    }
    fn partition_capacity(&self, id: ReversiblePartition) -> usize {
        self.partitions[id.0].capa
    }
    fn partition_contains(&self, id: ReversiblePartition, elem: usize) -> bool {
        let p = self.partitions[id.0];
        elem < p.capa && self.partition_pos[p.start + elem] < p.start + self.partition_boundary(id)
    }
    fn partition_remove(&mut self, id: ReversiblePartition, elem: usize) -> bool {
        if !self.partition_contains(id, elem) {
            false
        } else {
            let p = self.partitions[id.0];
            let last_pos = p.start + self.partition_boundary(id) - 1;
            let elem_pos = self.partition_pos[p.start + elem];
            let last = self.partition_data[last_pos];

            self.partition_data.swap(elem_pos, last_pos);
            self.partition_pos[p.start + elem] = last_pos;
            self.partition_pos[p.start + last] = elem_pos;

            self.decrement(p.boundary);
            true
        }
    }
    fn partition_valid(&self, id: ReversiblePartition) -> &[usize] {
        let p = self.partitions[id.0];
        let len = self.partition_boundary(id);
        &self.partition_data[p.start..p.start + len]
    }
}

// #############################################################################
// ### UNIT TESTS ##############################################################
// #############################################################################





//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ UT PARTITION ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
#[cfg(test)]
mod tests_manager_partition {
    use super::*;

    #[test]
    fn all_elements_are_valid_at_creation() {
        let mut mgr = TrailedStateManager::new();
        let _ = mgr.manage_partition(3);
        let p = mgr.manage_partition(4);

        assert_eq!(4, mgr.partition_boundary(p));
        assert_eq!(4, mgr.partition_capacity(p));
        assert_eq!(vec![0, 1, 2, 3], sorted_valid(&mgr, p));
        assert!(!mgr.partition_contains(p, 4));
    }

    #[test]
    fn remove_moves_the_element_past_the_boundary() {
        let mut mgr = TrailedStateManager::new();
        let p = mgr.manage_partition(5);

        assert!(mgr.partition_remove(p, 1));
        assert!(!mgr.partition_remove(p, 1));
        assert!(mgr.partition_remove(p, 4));

        assert_eq!(3, mgr.partition_boundary(p));
        assert!(!mgr.partition_contains(p, 1));
        assert!(!mgr.partition_contains(p, 4));
        assert_eq!(vec![0, 2, 3], sorted_valid(&mgr, p));
    }

    #[test]
    fn restore_brings_back_the_same_set_of_valid_elements() {
        let mut mgr = TrailedStateManager::new();
        let p = mgr.manage_partition(6);

        mgr.save_state();
        mgr.partition_remove(p, 0);
        mgr.partition_remove(p, 3);
        mgr.save_state();
        mgr.partition_remove(p, 5);
        mgr.partition_remove(p, 1);
        assert_eq!(vec![2, 4], sorted_valid(&mgr, p));

        mgr.restore_state();
        assert_eq!(vec![1, 2, 4, 5], sorted_valid(&mgr, p));
        assert!(mgr.partition_contains(p, 5));
        assert!(!mgr.partition_contains(p, 3));

        // the positions must still be coherent after an un-swapped restore
        mgr.partition_remove(p, 2);
        assert_eq!(vec![1, 4, 5], sorted_valid(&mgr, p));

        mgr.restore_state();
        assert_eq!(vec![0, 1, 2, 3, 4, 5], sorted_valid(&mgr, p));
    }

    #[test]
    fn partitions_do_not_interfere() {
        let mut mgr = TrailedStateManager::new();
        let a = mgr.manage_partition(3);
        let b = mgr.manage_partition(3);

        mgr.partition_remove(a, 0);
        assert!(mgr.partition_contains(b, 0));
        assert_eq!(3, mgr.partition_boundary(b));
        assert_eq!(2, mgr.partition_boundary(a));
    }

    fn sorted_valid(mgr: &TrailedStateManager, id: ReversiblePartition) -> Vec<usize> {
        let mut out = mgr.partition_valid(id).to_vec();
        out.sort_unstable();
        out
    }
}
