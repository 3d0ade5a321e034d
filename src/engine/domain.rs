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

//! This module provides the definition and implementation of the variables,
//! DomainStore and DomainBroker

use crate::{ReversibleInt, ReversibleSparseSet, SaveAndRestore, StateManager, TrailedStateManager};

/// This is the kind of error that gets raised whenever a propagator fails.
/// It carries no payload: it only tells the search that the current branch
/// has no solution.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq, Hash)]
#[error("inconsistency")]
pub struct Inconsistency;

/// The result of a propagation operation. (Note: all propagation opertations
/// can fail, in which case they raise an Inconsistency error)
pub type CPResult<T> = Result<T, Inconsistency>;

/// An integer variable that can be used in a CP model
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);
impl Variable {
    /// Returns the position of this variable in the domain store
    pub fn index(self) -> usize {
        self.0
    }
}

/// A domain store is the entity that gives a hook to propagators for modifying
/// the variables domains. (Note however that no propagator can directly access
/// the events associated with a given variable, nor decide to save or restore
/// the state of these domaims to a previous value. These are the
/// responsibilities devoted to a DomainBroker -- which is typically implemented
/// by the same structure as DomainStore; but it helps to split responsibilities).
pub trait DomainStore {
    /// Creates a new integer variable covering the min..=max range of values
    fn new_int_var(&mut self, min: isize, max: isize) -> Variable;
    /// Returns the minimum value of the doman of this variable (if it exists)
    fn min(&self, var: Variable) -> Option<isize>;
    /// Returns the maximum value of the doman of this variable (if it exists)
    fn max(&self, var: Variable) -> Option<isize>;
    /// Returns the size of the domain of this variable
    fn size(&self, var: Variable) -> usize;
    /// Returns true iff the domain of the target `var` contains the specified `value`
    fn contains(&self, var: Variable, value: isize) -> bool;
    /// Calls `f` once for each value in the domain of `var` (in no particular order)
    fn for_each_value(&self, var: Variable, f: &mut dyn FnMut(isize));
    /// Forces the value of this variable. It returns an Inconsistency error
    /// when fixing the value of the target variable is impossible
    fn fix(&mut self, var: Variable, value: isize) -> CPResult<()>;
    /// Removes the specified value from the domain of the target variable.
    /// An Inconsistency error is returned when the domain of the variable
    /// becomes empty because of this removal
    fn remove(&mut self, var: Variable, value: isize) -> CPResult<()>;
    /// Removes all value less than (<) the specified value from the domain
    /// of the target variable. An Inconsistency error is returned when the
    /// domain of the variable becomes empty because of this removal
    fn remove_below(&mut self, var: Variable, value: isize) -> CPResult<()>;
    /// Removes all value greater than (>) the specified value from the domain
    /// of the target variable. An Inconsistency error is returned when the
    /// domain of the variable becomes empty because of this removal
    fn remove_above(&mut self, var: Variable, value: isize) -> CPResult<()>;

    /// Returns true iff the value of the target variable is fixed/imposed
    fn is_fixed(&self, var: Variable) -> bool {
        self.size(var) == 1
    }
    /// Returns the value of the variable if it is fixed
    fn value(&self, var: Variable) -> Option<isize> {
        if self.is_fixed(var) {
            self.min(var)
        } else {
            None
        }
    }
    /// Returns the values of the domain in increasing order
    fn values(&self, var: Variable) -> Vec<isize> {
        let mut out = Vec::with_capacity(self.size(var));
        self.for_each_value(var, &mut |v| out.push(v));
        out.sort_unstable();
        out
    }
    /// Removes all values outside of `lo..=hi`.
    fn remove_outside(&mut self, var: Variable, lo: isize, hi: isize) -> CPResult<()> {
        self.remove_below(var, lo)?;
        self.remove_above(var, hi)
    }
    /// Creates a new variable whose domain comprises exactly the given values
    /// (an empty slice yields a variable with an empty domain)
    fn new_var_from_values(&mut self, values: &[isize]) -> Variable {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let min = sorted.first().copied().unwrap_or(0);
        let max = sorted.last().copied().unwrap_or(-1);
        let var = self.new_int_var(min, max);
        // only the gaps between two consecutive values are visited
        for w in sorted.windows(2) {
            for v in w[0] + 1..w[1] {
                // the domain is not watched by anyone yet
                let _ = self.remove(var, v);
            }
        }
        var
    }
}

/// An event that tells what happened to the domain of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainEvent {
    /// This is the variable impacted by a possible change in its domain
    pub variable: Variable,
    /// This flag is set when the domain of the variable has become fixed
    /// (That is, it only has one single value left in its domain)
    pub is_fixed: bool,
    /// This flag is set when the domain of a variable has become empty
    /// (this should somehow have triggered an Inconsistency error)
    pub is_empty: bool,
    /// This flag is set when the domain's minimum has changed
    pub min_changed: bool,
    /// This flag is set when the domain's maximum has changed
    pub max_changed: bool,
    /// This flag is set when a change has occured in the domain of the variable
    /// (this is the weakest of the requirements to set a flag)
    pub domain_changed: bool,
}
impl DomainEvent {
    /// An event where nothing happened
    fn nothing(variable: Variable) -> Self {
        Self {
            variable,
            is_fixed: false,
            is_empty: false,
            min_changed: false,
            max_changed: false,
            domain_changed: false,
        }
    }
}

/// The domain borker is the facet of the domain store which is in charge of
/// tracking all changes occurring in the domain of the variables. A domain
/// broker is the object which is used by the solver to schedule the propagation
/// of the various propagators and listeners.
pub trait DomainBroker: SaveAndRestore {
    /// forgets all events that have happened on a variable
    fn clear_events(&mut self);
    /// goes over all the events that have occurred on the variables
    fn for_each_event<F: FnMut(DomainEvent)>(&self, f: F);
}

/// This is the type of domain store implementation you will likely want to use
/// in your solver. Currently, this is the only available implementation of a DS
/// but it *might* possibly change in the future.
pub type DefaultDomainStore = DomainStoreImpl<TrailedStateManager>;

/// This is a simple implementation of a domain store. It implements both the
/// DomainStore and the DomainBroker traits, which means it really is an entity
/// that encompasses the complete lifecycle of a variable (but has nothing to
/// do with the higher level constructs that *use* the events applied to these
/// variables)
#[derive(Debug, Clone)]
pub struct DomainStoreImpl<T: StateManager> {
    /// The state manager in charge of saving/restoring the domains states
    state: T,
    /// How many variables are there right now ?
    n_vars: ReversibleInt,
    /// The domains of all variables
    domains: Vec<ReversibleSparseSet>,
    /// The events attached to all variables
    events: Vec<DomainEvent>,
    /// The variables whose event is not blank
    modified: Vec<Variable>,
}
impl<T: StateManager> DomainStoreImpl<T> {
    /// Creates a new instance of the domain store based on the given state
    /// manager
    pub fn new(state: T) -> Self {
        Self::from(state)
    }
    /// Returns a reference to the underlying state manager
    pub fn state_manager(&self) -> &T {
        &self.state
    }
    /// Returns a mutable reference to the underlying state manager
    pub fn state_manager_mut(&mut self) -> &mut T {
        &mut self.state
    }
    /// Returns the number of variables in the store
    pub fn len(&self) -> usize {
        self.domains.len()
    }
    /// Returns true iff no variable has been created yet
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
    /// Returns the variable at the given position
    pub fn variable(&self, index: usize) -> Variable {
        Variable(index)
    }
}

impl<T: StateManager> From<T> for DomainStoreImpl<T> {
    fn from(mut state: T) -> Self {
        let n_vars = state.manage_int(0);
        Self {
            state,
            n_vars,
            domains: vec![],
            events: vec![],
            modified: vec![],
        }
    }
}
impl<T: StateManager + Default> Default for DomainStoreImpl<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: StateManager> DomainStore for DomainStoreImpl<T> {
    fn new_int_var(&mut self, min: isize, max: isize) -> Variable {
        let id = (self.state.increment(self.n_vars) - 1) as usize;
        let n = (max - min + 1).max(0) as usize;
        let domain = self.state.manage_sparse_set(n, min);

        let variable = Variable(id);
        self.domains.push(domain);
        self.events.push(DomainEvent::nothing(variable));
        variable
    }

    fn new_var_from_values(&mut self, values: &[isize]) -> Variable {
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(-1);
        let variable = self.new_int_var(min, max);
        self.state.sparse_set_keep_only(self.domains[variable.0], values);
        variable
    }

    fn min(&self, var: Variable) -> Option<isize> {
        self.state.sparse_set_get_min(self.domains[var.0])
    }

    fn max(&self, var: Variable) -> Option<isize> {
        self.state.sparse_set_get_max(self.domains[var.0])
    }

    fn size(&self, var: Variable) -> usize {
        self.state.sparse_set_size(self.domains[var.0])
    }

    fn contains(&self, var: Variable, value: isize) -> bool {
        self.state.sparse_set_contains(self.domains[var.0], value)
    }

    fn for_each_value(&self, var: Variable, f: &mut dyn FnMut(isize)) {
        self.state.sparse_set_for_each(self.domains[var.0], f)
    }

    fn fix(&mut self, var: Variable, value: isize) -> CPResult<()> {
        let dom = self.domains[var.0];

        if self.contains(var, value) && self.is_fixed(var) {
            // if there is nothing to do, then we're done
            Ok(())
        } else {
            let min_changed = self.state.sparse_set_get_min(dom) != Some(value);
            let max_changed = self.state.sparse_set_get_max(dom) != Some(value);
            self.state.sparse_set_remove_all_but(dom, value);

            let empty = self.state.sparse_set_is_empty(dom);
            let evt = self.event_mut(var);
            evt.min_changed |= min_changed;
            evt.max_changed |= max_changed;
            evt.domain_changed = true;
            if empty {
                evt.is_empty = true;
                Err(Inconsistency)
            } else {
                evt.is_fixed = true;
                Ok(())
            }
        }
    }

    fn remove(&mut self, var: Variable, value: isize) -> CPResult<()> {
        if !self.contains(var, value) {
            // there is nothing to do
            Ok(())
        } else {
            let dom = self.domains[var.0];
            let min_changed = self.state.sparse_set_get_min(dom) == Some(value);
            let max_changed = self.state.sparse_set_get_max(dom) == Some(value);

            self.state.sparse_set_remove(dom, value);
            let size = self.state.sparse_set_size(dom);
            self.after_removal(var, size, min_changed, max_changed)
        }
    }

    fn remove_below(&mut self, var: Variable, value: isize) -> CPResult<()> {
        let dom = self.domains[var.0];
        match self.state.sparse_set_get_min(dom) {
            Some(min) if min < value => {
                let max_changed = self
                    .state
                    .sparse_set_get_max(dom)
                    .map_or(true, |max| max < value);
                self.state.sparse_set_remove_below(dom, value);
                let size = self.state.sparse_set_size(dom);
                self.after_removal(var, size, true, max_changed)
            }
            Some(_) => Ok(()),
            None => Err(Inconsistency),
        }
    }

    fn remove_above(&mut self, var: Variable, value: isize) -> CPResult<()> {
        let dom = self.domains[var.0];
        match self.state.sparse_set_get_max(dom) {
            Some(max) if max > value => {
                let min_changed = self
                    .state
                    .sparse_set_get_min(dom)
                    .map_or(true, |min| min > value);
                self.state.sparse_set_remove_above(dom, value);
                let size = self.state.sparse_set_size(dom);
                self.after_removal(var, size, min_changed, true)
            }
            Some(_) => Ok(()),
            None => Err(Inconsistency),
        }
    }
}
impl<T: StateManager> DomainStoreImpl<T> {
    /// Returns the (mutable) event slot of the given variable and remembers
    /// that this variable has been modified
    fn event_mut(&mut self, var: Variable) -> &mut DomainEvent {
        let evt = &mut self.events[var.0];
        if !evt.domain_changed && !evt.is_empty {
            self.modified.push(var);
        }
        evt
    }
    /// Updates the events of a variable after some values have been removed
    /// from its domain
    fn after_removal(
        &mut self,
        var: Variable,
        size: usize,
        min_changed: bool,
        max_changed: bool,
    ) -> CPResult<()> {
        let evt = self.event_mut(var);
        evt.min_changed |= min_changed;
        evt.max_changed |= max_changed;
        evt.is_fixed |= size == 1;
        evt.is_empty |= size == 0;
        evt.domain_changed = true;

        if size == 0 {
            Err(Inconsistency)
        } else {
            Ok(())
        }
    }
}

impl<T: StateManager> SaveAndRestore for DomainStoreImpl<T> {
    fn save_state(&mut self) {
        self.state.save_state()
    }

    fn restore_state(&mut self) {
        self.state.restore_state();

        // forget the variables that were created in the popped level
        let n = self.state.get_int(self.n_vars) as usize;
        self.domains.truncate(n);
        self.events.truncate(n);
        self.clear_events();
    }

    fn level(&self) -> usize {
        self.state.level()
    }
}

impl<T: StateManager> DomainBroker for DomainStoreImpl<T> {
    fn clear_events(&mut self) {
        for var in self.modified.drain(..) {
            if let Some(evt) = self.events.get_mut(var.0) {
                *evt = DomainEvent::nothing(var);
            }
        }
    }

    fn for_each_event<F: FnMut(DomainEvent)>(&self, f: F) {
        self.modified
            .iter()
            .map(|v| self.events[v.0])
            .for_each(f);
    }
}
