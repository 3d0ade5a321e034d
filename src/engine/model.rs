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

//! This module provides the definition and implementation of the traits and
//! structure related to the constraint propagation.

use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::{
    CPResult, DefaultDomainStore, DomainBroker, DomainStore, IntManager, ReversibleInt,
    SaveAndRestore, TrailedStateManager, Variable,
};

/// This trait stands for the modeling constructs which you'll want to work
/// with when representing the problem you intend to solve. These modeling
/// constructs are often referred to as constraints, but this implementation
/// reserves the constraint type for an atomic constraint associated with
/// a propagator.
pub trait ModelingConstruct {
    /// This method installs the current modeling construct (which might
    /// consist of several underlying propagators/constraints) into the
    /// model which will schedule its propagators as needed. Installing a
    /// construct may already detect that the model has no solution.
    fn install(&self, cp: &mut CpModel) -> CPResult<()>;
}

/// An identifier to a constraint. A constraint in itself is really just
/// an identifier in this implementation. The bulk of the work is done by
/// the solver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint(usize);
impl Constraint {
    /// The position of this constraint in the sequence of the posted ones
    pub fn id(self) -> usize {
        self.0
    }
}

/// The propagator is the portion of the code where the magic actually happens.
/// A propagator is called by the solver during the fixpoint computation. It
/// enforces a certain level of consistency on the domain of the variables it
/// works on.
pub trait Propagator {
    /// Actually runs the custom propagation algorithm
    fn propagate(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()>;

    /// Tells the propagator that one of the variables it watches has been
    /// modified at the given level. This must remain cheap: the actual work
    /// is deferred to the next call to `propagate`.
    fn queue_variable(&mut self, _level: usize, _var: Variable) {}

    /// Tells the propagator that the solver is about to rewind the trail
    /// past the given level. Whatever transient bookkeeping it holds about
    /// the changes that occurred since its last run is stale afterwards.
    fn remove_level(&mut self, _level: usize) {}

    /// Returns true iff the constraint enforced by this propagator is
    /// satisfied by the current (fixed) domains.
    fn is_satisfied(&self, _domains: &DefaultDomainStore) -> bool {
        true
    }

    /// A short name used when logging
    fn name(&self) -> &'static str {
        "propagator"
    }
}

/// Any closure/function that accepts a mutable ref to the domain store can be
/// a propagator. (This is mere convenience, not required to get something
/// useable)
impl<F: FnMut(&mut DefaultDomainStore) -> CPResult<()>> Propagator for F {
    fn propagate(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()> {
        self(domains)
    }
}

/// A condition expressing that a specific change event has occurred on the
/// domain of some variable. The granularity of the wake up is decided once
/// and for all when the condition is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainCondition {
    /// This condidion is satisfied whenever the domain of a variable becomes
    /// fixed
    IsFixed(Variable),
    /// The minimum or the maximum value of the domain has changed
    BoundsChanged(Variable),
    /// This condition is satisfied when +something+ has changed in the domain
    /// of the variable
    DomainChanged(Variable),
}

/// The CP model owns the variables domains, the propagators and the trail.
/// It lets us create variables (it is a DomainStore), install constraints
/// bearing on these variables and its state can be efficiently saved and
/// restored to a previous snapshot during the search for a satisfying
/// solution.
pub struct CpModel {
    /// The domain store which is used to manage the problem variables
    domains: DefaultDomainStore,
    /// This establishes a correspondence between a domain condition and all
    /// the porpagators that need to be scheduled
    listeners: FxHashMap<DomainCondition, FxHashSet<Constraint>>,

    /// These are the propagators that might be used to effectively trim down
    /// the variable domains
    propagators: Vec<Box<dyn Propagator>>,
    /// This list tracks the associations that have been made between a domain
    /// condition and a propagator. The whole point of keeping this list is to
    /// be able to undo the associations upon state restoration (in conjunction
    /// with the conditions_sz field)
    conditions: Vec<(DomainCondition, Constraint)>,
    /// This tracks the length of the propagators that are active at any given
    /// point in time. It is also the sequence from which constraint ids are
    /// drawn.
    propagator_sz: ReversibleInt,
    /// This field tracks the lenght of the `conditions` field. The point here
    /// is to be able to identify the conditions that need to be undone upon
    /// state restoration.
    conditions_sz: ReversibleInt,

    /// The constraints that have been scheduled for propagation
    scheduled: FxHashSet<Constraint>,
}

impl Default for CpModel {
    fn default() -> Self {
        Self::new()
    }
}
//------------------------------------------------------------------------------
// Domain store facet
//------------------------------------------------------------------------------
impl DomainStore for CpModel {
    fn new_int_var(&mut self, min: isize, max: isize) -> Variable {
        self.domains.new_int_var(min, max)
    }

    fn new_var_from_values(&mut self, values: &[isize]) -> Variable {
        self.domains.new_var_from_values(values)
    }

    fn min(&self, var: Variable) -> Option<isize> {
        self.domains.min(var)
    }

    fn max(&self, var: Variable) -> Option<isize> {
        self.domains.max(var)
    }

    fn size(&self, var: Variable) -> usize {
        self.domains.size(var)
    }

    fn contains(&self, var: Variable, value: isize) -> bool {
        self.domains.contains(var, value)
    }

    fn for_each_value(&self, var: Variable, f: &mut dyn FnMut(isize)) {
        self.domains.for_each_value(var, f)
    }

    fn fix(&mut self, var: Variable, value: isize) -> CPResult<()> {
        self.domains.fix(var, value)
    }

    fn remove(&mut self, var: Variable, value: isize) -> CPResult<()> {
        self.domains.remove(var, value)
    }

    fn remove_below(&mut self, var: Variable, value: isize) -> CPResult<()> {
        self.domains.remove_below(var, value)
    }

    fn remove_above(&mut self, var: Variable, value: isize) -> CPResult<()> {
        self.domains.remove_above(var, value)
    }
}
//------------------------------------------------------------------------------
// Save and Restore management
//------------------------------------------------------------------------------
impl SaveAndRestore for CpModel {
    fn save_state(&mut self) {
        self.domains.save_state()
    }

    fn restore_state(&mut self) {
        let level = self.domains.level();
        let prop_sz = self.prop_size();
        for propagator in self.propagators.iter_mut().take(prop_sz) {
            propagator.remove_level(level);
        }

        self.domains.restore_state();

        let prop_sz = self.prop_size();
        let cond_sz = self.cond_size();
        self.propagators.truncate(prop_sz);

        for (cond, prop) in self.conditions.iter().skip(cond_sz).copied() {
            if let Entry::Occupied(mut e) = self.listeners.entry(cond) {
                e.get_mut().remove(&prop);
                if e.get().is_empty() {
                    e.remove_entry();
                }
            }
        }

        self.conditions.truncate(cond_sz);
        self.scheduled.clear();
    }

    fn level(&self) -> usize {
        self.domains.level()
    }
}
//------------------------------------------------------------------------------
// Constraint store
//------------------------------------------------------------------------------
impl CpModel {
    /// Creates a new empty model
    pub fn new() -> Self {
        let mut sm = TrailedStateManager::new();
        let conditions_sz = sm.manage_int(0);
        let propagator_sz = sm.manage_int(0);
        Self {
            domains: DefaultDomainStore::from(sm),
            listeners: Default::default(),
            propagators: Default::default(),
            conditions: Default::default(),
            propagator_sz,
            conditions_sz,
            scheduled: Default::default(),
        }
    }
    /// Installs a given modeling constuct into the model
    pub fn install(&mut self, modeling_construct: &dyn ModelingConstruct) -> CPResult<()> {
        modeling_construct.install(self)
    }
    /// Posts the given propagator but does not attach it to any condition
    pub fn post(&mut self, propagator: Box<dyn Propagator>) -> Constraint {
        self.propagators.push(propagator);
        Constraint(self.inc_prop_size() - 1)
    }
    /// Schedules the execution of a given constraint (propagator)
    pub fn schedule(&mut self, constraint: Constraint) {
        self.scheduled.insert(constraint);
    }
    /// Tells the solver that the given constraint should be propagated whenever
    /// the condition is satisfied
    pub fn propagate_on(&mut self, constraint: Constraint, cond: DomainCondition) {
        let must_push = match self.listeners.entry(cond) {
            Entry::Occupied(mut e) => e.get_mut().insert(constraint),
            Entry::Vacant(e) => {
                let mut v = FxHashSet::default();
                v.insert(constraint);
                e.insert(v);
                true
            }
        };

        if must_push {
            self.conditions.push((cond, constraint));
            self.inc_cond_size();
        }
    }
    /// Propagate all constraints until a fixpoint is reached. Whenever a
    /// propagator fails, the pending work is dropped and the failure is
    /// returned to the caller (typically the search).
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn fixpoint(&mut self) -> CPResult<()> {
        let result = self.run_until_quiescent();
        if result.is_err() {
            self.scheduled.clear();
            self.domains.clear_events();
        }
        result
    }
    /// Returns true iff all posted constraints are satisfied by the current
    /// domains
    pub fn is_satisfied(&self) -> bool {
        self.propagators
            .iter()
            .take(self.prop_size())
            .all(|p| p.is_satisfied(&self.domains))
    }
    /// Returns the number of constraints currently posted in the model
    pub fn n_constraints(&self) -> usize {
        self.prop_size()
    }
    /// Gives access to the underlying domain store
    pub fn domains(&self) -> &DefaultDomainStore {
        &self.domains
    }
    /// Gives a mutable access to the underlying domain store
    pub fn domains_mut(&mut self) -> &mut DefaultDomainStore {
        &mut self.domains
    }
    /// Gives access to the state manager which holds all reversible data
    pub fn state_manager(&self) -> &TrailedStateManager {
        self.domains.state_manager()
    }
    /// Gives a mutable access to the state manager which holds all
    /// reversible data
    pub fn state_manager_mut(&mut self) -> &mut TrailedStateManager {
        self.domains.state_manager_mut()
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// ~~~ UTILITY METHODS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
impl CpModel {
    /// returns the size of the propagators list
    fn prop_size(&self) -> usize {
        self.state_manager().get_int(self.propagator_sz) as usize
    }
    /// increments the size of the propagators list
    fn inc_prop_size(&mut self) -> usize {
        let var = self.propagator_sz;
        self.state_manager_mut().increment(var) as usize
    }
    /// returns the size of the conditions vector
    fn cond_size(&self) -> usize {
        self.state_manager().get_int(self.conditions_sz) as usize
    }
    /// increments the size of the conditions list
    fn inc_cond_size(&mut self) -> usize {
        let var = self.conditions_sz;
        self.state_manager_mut().increment(var) as usize
    }

    /// The actual fixpoint loop
    fn run_until_quiescent(&mut self) -> CPResult<()> {
        loop {
            self.schedule_relevant();
            if self.scheduled.is_empty() {
                return Ok(());
            }

            let mut batch = self.scheduled.drain().collect::<Vec<_>>();
            batch.sort_unstable();
            for constraint in batch {
                let propagator = self.propagators[constraint.0].as_mut();
                trace!(constraint = constraint.0, name = propagator.name(), "propagate");
                if let Err(e) = propagator.propagate(&mut self.domains) {
                    debug!(constraint = constraint.0, name = propagator.name(), "failure");
                    return Err(e);
                }
            }
        }
    }

    /// Schedules the execution of all the relevant propagators and clears the
    /// current set of events. Every propagator is told which of its watched
    /// variables have changed before it gets scheduled.
    fn schedule_relevant(&mut self) {
        let level = self.domains.level();
        let schedule = &mut self.scheduled;
        let listeners = &self.listeners;
        let propagators = &mut self.propagators;

        self.domains.for_each_event(|e| {
            let var = e.variable;
            if e.is_fixed {
                let cond = DomainCondition::IsFixed(var);
                Self::schedule_cond(cond, level, listeners, propagators, schedule);
            }
            if e.min_changed || e.max_changed {
                let cond = DomainCondition::BoundsChanged(var);
                Self::schedule_cond(cond, level, listeners, propagators, schedule);
            }
            if e.domain_changed {
                let cond = DomainCondition::DomainChanged(var);
                Self::schedule_cond(cond, level, listeners, propagators, schedule);
            }
        });
        self.domains.clear_events();
    }
    /// Effectively schedule all propagators attached to a given condition
    fn schedule_cond(
        condition: DomainCondition,
        level: usize,
        listeners: &FxHashMap<DomainCondition, FxHashSet<Constraint>>,
        propagators: &mut [Box<dyn Propagator>],
        sched: &mut FxHashSet<Constraint>,
    ) {
        if let Some(l) = listeners.get(&condition) {
            let var = match condition {
                DomainCondition::IsFixed(v)
                | DomainCondition::BoundsChanged(v)
                | DomainCondition::DomainChanged(v) => v,
            };
            for c in l.iter().copied() {
                propagators[c.0].queue_variable(level, var);
                sched.insert(c);
            }
        }
    }
}

// #############################################################################
// ### UNIT TESTS ##############################################################
// #############################################################################


//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ SAVE AND RESTORE ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
#[cfg(test)]
mod test_model_saveandrestore {
    use std::{cell::RefCell, rc::Rc};

    use crate::prelude::*;

    /// Records the hooks that the model calls on it
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
    }
    impl Propagator for Recorder {
        fn propagate(&mut self, _: &mut DefaultDomainStore) -> CPResult<()> {
            self.log.borrow_mut().push("propagate".to_string());
            Ok(())
        }
        fn queue_variable(&mut self, level: usize, var: Variable) {
            self.log
                .borrow_mut()
                .push(format!("queue {} @{level}", var.index()));
        }
        fn remove_level(&mut self, level: usize) {
            self.log.borrow_mut().push(format!("remove_level {level}"));
        }
    }

    #[test]
    fn save_and_restore_state_should_work_together() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 9);

        cp.save_state();
        assert_eq!(Ok(()), cp.remove_above(x, 4));
        cp.save_state();
        assert_eq!(Ok(()), cp.fix(x, 2));
        assert_eq!(2, cp.level());

        cp.restore_state();
        assert_eq!(5, cp.size(x));
        cp.restore_state();
        assert_eq!(10, cp.size(x));
        assert_eq!(0, cp.level());
    }

    #[test]
    fn restore_drops_all_stale_propagators_and_conditions() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 9);
        let count = Rc::new(RefCell::new(0));

        cp.save_state();
        let counter = count.clone();
        let c = cp.post(Box::new(move |_: &mut DefaultDomainStore| -> CPResult<()> {
            *counter.borrow_mut() += 1;
            Ok(())
        }));
        cp.propagate_on(c, DomainCondition::DomainChanged(x));
        assert_eq!(1, cp.n_constraints());
        cp.restore_state();

        assert_eq!(0, cp.n_constraints());
        assert_eq!(Ok(()), cp.remove(x, 3));
        assert_eq!(Ok(()), cp.fixpoint());
        assert_eq!(0, *count.borrow());
    }

    #[test]
    fn restore_unschedules_all_scheduled_propagators() {
        let mut cp = CpModel::default();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        let c = cp.post(Box::new(move |_: &mut DefaultDomainStore| -> CPResult<()> {
            *counter.borrow_mut() += 1;
            Ok(())
        }));

        cp.save_state();
        cp.schedule(c);
        cp.restore_state();

        assert_eq!(Ok(()), cp.fixpoint());
        assert_eq!(0, *count.borrow());
    }

    #[test]
    fn restore_notifies_propagators_before_rewinding() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 9);
        let log = Rc::new(RefCell::new(vec![]));
        let c = cp.post(Box::new(Recorder { log: log.clone() }));
        cp.propagate_on(c, DomainCondition::DomainChanged(x));

        cp.save_state();
        cp.save_state();
        assert_eq!(Ok(()), cp.remove(x, 0));
        assert_eq!(Ok(()), cp.fixpoint());
        cp.restore_state();

        let log = log.borrow();
        assert_eq!(
            &["queue 0 @2", "propagate", "remove_level 2"],
            log.as_slice()
        );
    }
}
