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

//! The state module comprises all traits and datastructures related to
//! the state (save and restore) management.
//!
//! # Note
//! The state manager have been thought of in terms of a visitor pattern: the
//! reversible objects are mere identifiers and the manager owns their data.
//! This keeps the reversible objects themselves dead simple (they are `Copy`)
//! and lets a constraint hold as many of them as it likes without borrowing
//! anything from the solver.
//!

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ MANAGED RESOURCES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The identifier of a managed integer resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversibleInt(usize);

/// The identifier of a managed boolean resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversibleBool(ReversibleInt);

/// The identifier of a managed sparse set resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversibleSparseSet(usize);

/// The identifier of a managed reversible partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversiblePartition(usize);

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ MANAGER TRAITS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// A state manager is an object capable of saving and restoring the state of
/// all types of managed resources.
pub trait StateManager:
    SaveAndRestore + IntManager + BoolManager + SparseSetManager + PartitionManager
{
}

/// An implementation of this type is capable of saving and restoring the
/// state of the resources it manages.
pub trait SaveAndRestore {
    /// Saves the current state of all managed resources
    fn save_state(&mut self);
    /// Restores the previous state of all managed resources
    fn restore_state(&mut self);
    /// Returns the depth of the current level (the root level is 0)
    fn level(&self) -> usize;
}

/// All the operations that can be made on an integer resource
pub trait IntManager {
    /// creates a new managed integer
    fn manage_int(&mut self, value: isize) -> ReversibleInt;
    /// returns the value of a managed integer
    fn get_int(&self, id: ReversibleInt) -> isize;
    /// sets a managed integer's value and returns the new value
    fn set_int(&mut self, id: ReversibleInt, value: isize) -> isize;
    /// increments a managed integer's value
    fn increment(&mut self, id: ReversibleInt) -> isize;
    /// decrements a managed integer's value
    fn decrement(&mut self, id: ReversibleInt) -> isize;
}

/// All the operations that can be made on a boolean resource
pub trait BoolManager {
    /// creates a new managed boolean
    fn manage_bool(&mut self, v: bool) -> ReversibleBool;
    /// returns the value of a managed boolean
    fn get_bool(&self, id: ReversibleBool) -> bool;
    /// sets a managed boolean's value and returns the new value
    fn set_bool(&mut self, id: ReversibleBool, value: bool) -> bool;
    /// flips a boolean's value and returns it
    fn flip_bool(&mut self, id: ReversibleBool) -> bool {
        self.set_bool(id, self.get_bool(id).not())
    }
}

/// All the operations that can be applied to a sparse set
pub trait SparseSetManager {
    /// creates a new managed sparse set with values
    /// [0 + value_offset, 1 + value_offset, 2 + value_offset, ... , n-1 + value_offset]
    ///
    /// # Params
    /// - n: the number of values in the sparse set
    /// - val_offset: the "offset" of the first value that belongs to the set
    fn manage_sparse_set(&mut self, n: usize, val_offset: isize) -> ReversibleSparseSet;
    /// returns the size of the given sparse set
    fn sparse_set_size(&self, id: ReversibleSparseSet) -> usize;
    /// returns true iff the sparse set is empty
    fn sparse_set_is_empty(&self, id: ReversibleSparseSet) -> bool;
    /// returns the minimum value of the sparse set (if it exists)
    fn sparse_set_get_min(&self, id: ReversibleSparseSet) -> Option<isize>;
    /// returns the maximum value of the sparse set (if it exists)
    fn sparse_set_get_max(&self, id: ReversibleSparseSet) -> Option<isize>;
    /// returns true iff the sparse set contains the designated value
    fn sparse_set_contains(&self, id: ReversibleSparseSet, value: isize) -> bool;
    /// removes the given value from the sparse set and returns a boolean telling
    /// whether or not the value was actually deleted from the set
    fn sparse_set_remove(&mut self, id: ReversibleSparseSet, value: isize) -> bool;
    /// removes all values in the set
    fn sparse_set_remove_all(&mut self, id: ReversibleSparseSet);
    /// removes all values in the set except the given value (if it belongs to the set)
    fn sparse_set_remove_all_but(&mut self, id: ReversibleSparseSet, value: isize);
    /// removes all values in the set except the given ones (those which belong
    /// to the set). It only costs a number of steps proportional to the
    /// length of `values`.
    fn sparse_set_keep_only(&mut self, id: ReversibleSparseSet, values: &[isize]);
    /// remove from the set all the items having a value lower than the given `value`
    fn sparse_set_remove_below(&mut self, id: ReversibleSparseSet, val: isize);
    /// remove from the set all the items having a value higher than the given `value`
    fn sparse_set_remove_above(&mut self, id: ReversibleSparseSet, val: isize);
    /// Calls the function f once for each value in the reversible sparse set
    /// identified with 'id'
    fn sparse_set_for_each<F: FnMut(isize)>(&self, id: ReversibleSparseSet, f: F);
}

/// All the operations that can be applied to a reversible partition.
///
/// A reversible partition is an array of the dense element ids `0..n` split
/// in two by a trailed boundary: the elements in front of the boundary are
/// still *valid*, the others have been removed. Removing an element swaps it
/// with the last valid entry and shrinks the boundary by one, which is O(1).
/// Restoring a level only restores the boundary; the swapped entries are
/// never put back in place. This is fine because the set of entries found in
/// front of a restored boundary is exactly the set that was there when the
/// level was saved (only its order differs).
pub trait PartitionManager {
    /// creates a new partition where all elements `0..n` are valid
    fn manage_partition(&mut self, n: usize) -> ReversiblePartition;
    /// returns the number of elements still valid in the partition
    fn partition_boundary(&self, id: ReversiblePartition) -> usize;
    /// returns the total number of elements of the partition (valid or not)
    fn partition_capacity(&self, id: ReversiblePartition) -> usize;
    /// returns true iff the given element is in front of the boundary
    fn partition_contains(&self, id: ReversiblePartition, elem: usize) -> bool;
    /// moves the element past the boundary. Returns true iff the element
    /// was valid before the call.
    fn partition_remove(&mut self, id: ReversiblePartition, elem: usize) -> bool;
    /// returns the valid prefix of the partition (in no particular order)
    fn partition_valid(&self, id: ReversiblePartition) -> &[usize];
}

/// The state manager is in charge of storing and restoring the data from
/// and to the trail
mod trailed;
use std::ops::Not;

pub use trailed::*;
