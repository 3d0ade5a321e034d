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

//! This module provides the driver of the global consistency engine shared
//! by the all different and the global cardinality constraints. The details
//! of the filtering are given in "A filtering algorithm for constraints of
//! difference in CSPs" J-C. Régin, AAAI-94 and "Generalized arc consistency
//! for global cardinality constraint" J-C. Régin, AAAI-96.
//!
//! Every call runs the following pipeline until it stops narrowing domains:
//!
//! 1. the changed variables are synchronized with the support graph (stale
//!    edges are dropped, singleton variables are grounded) and the matching
//!    is repaired;
//! 2. the SCC labels are recomputed (incrementally when the matching
//!    survived);
//! 3. the reachability marks are computed;
//! 4. the edges that belong to no feasible assignment are pruned.
//!
//! An edge (w, m) with m not matched to w survives iff some variable matched
//! to m shares the label of w, or if m can gain one more variable (it has
//! room to spare or one of its variables is reachable from a free value)
//! while w can hand its own value back to a value holding a surplus.

use std::{cell::Cell, rc::Rc};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::prelude::*;

use super::{
    guided_choice, Matching, MatchingFailure, MatchingSnapshot, Reachability, SccAnalyzer,
    SupportGraph, UNMATCHED,
};

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ CAPACITIES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Tells how many variables may take each value of the graph
pub trait Capacity {
    /// Returns the `(lower, upper)` number of variables that may take the
    /// value at the given value index. These bounds are read anew at every
    /// propagation pass.
    fn bounds(&self, domains: &DefaultDomainStore, m: usize) -> (isize, isize);
    /// True when every value may be taken at most once and never needs to
    /// be taken at all (all different).
    fn is_exactly_one(&self) -> bool {
        false
    }
}

/// Each value can be taken by at most one variable
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactlyOne;
impl Capacity for ExactlyOne {
    fn bounds(&self, _: &DefaultDomainStore, _: usize) -> (isize, isize) {
        (0, 1)
    }
    fn is_exactly_one(&self) -> bool {
        true
    }
}

/// The number of variables taking value `m` must lie within the domain of
/// the m-th counter variable
#[derive(Debug, Clone)]
pub struct Bounded {
    /// one counter per value
    counters: Vec<Variable>,
}
impl Bounded {
    /// Creates the capacities from the given counters
    pub fn new(counters: Vec<Variable>) -> Self {
        Self { counters }
    }
}
impl Capacity for Bounded {
    fn bounds(&self, domains: &DefaultDomainStore, m: usize) -> (isize, isize) {
        let counter = self.counters[m];
        // an empty counter leaves no room at all
        (
            domains.min(counter).unwrap_or(0),
            domains.max(counter).unwrap_or(-1),
        )
    }
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ OPTIONS AND STATISTICS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The knobs of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Only relabel the touched components when the matching survived.
    /// When false, every pass recomputes all labels from scratch.
    pub incremental_scc: bool,
    /// Bind at once the candidates of a value that needs all of them
    pub bind_shortcut: bool,
}
impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            incremental_scc: true,
            bind_shortcut: true,
        }
    }
}
impl EngineOptions {
    /// sets the `incremental_scc` flag
    pub fn with_incremental_scc(mut self, incremental_scc: bool) -> Self {
        self.incremental_scc = incremental_scc;
        self
    }
    /// sets the `bind_shortcut` flag
    pub fn with_bind_shortcut(mut self, bind_shortcut: bool) -> Self {
        self.bind_shortcut = bind_shortcut;
        self
    }
}

/// Diagnostic counters. They tell how much work was done, never whether
/// the result is right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatistics {
    /// number of propagation calls
    pub calls: usize,
    /// number of passes through the pipeline
    pub passes: usize,
    /// number of passes which narrowed some domain
    pub narrowing_passes: usize,
    /// number of SCC decompositions done from scratch
    pub scratch_scc: usize,
    /// number of incremental SCC decompositions
    pub incremental_scc: usize,
    /// number of values removed from a domain
    pub removals: usize,
    /// number of variables bound by the shortcut
    pub bindings: usize,
    /// number of failures because the matching could not be repaired
    pub infeasible_matchings: usize,
    /// number of failures because some value capacity cannot be met
    pub capacity_violations: usize,
}

/// The state machine of one propagation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationPhase {
    /// Nothing going on
    Idle,
    /// Synchronizing the graph and repairing the matching
    RepairMatching,
    /// Labelling the strongly connected components
    ComputeScc,
    /// Marking the variables reachable from a free value
    MarkReachability,
    /// Removing the unsupported edges
    ApplyPruning,
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ ENGINE ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The global consistency engine of one constraint
pub struct GlobalEngine<C: Capacity> {
    /// how many variables may take each value
    capacity: C,
    /// the knobs
    options: EngineOptions,
    /// the bipartite graph (shared with the handles)
    graph: Rc<SupportGraph>,
    /// matching workspace
    matching: Matching,
    /// scc workspace
    scc: SccAnalyzer,
    /// reachability marks
    reach: Reachability,
    /// the local positions of each watched variable
    positions: FxHashMap<Variable, Vec<usize>>,

    /// the variables that changed since they were last synchronized
    changed: Vec<usize>,
    /// is each variable in `changed` ?
    queued: Vec<bool>,
    /// the labels of the components that lost an arc or a node
    dirty: Vec<isize>,
    /// must the next decomposition start from scratch ?
    force_full: bool,

    /// where the current call stands
    phase: PropagationPhase,
    /// counters (shared with the handles)
    stats: Rc<Cell<EngineStatistics>>,
}

impl<C: Capacity> GlobalEngine<C> {
    /// Builds the engine for the given variables and values, computes a first
    /// matching and a first SCC decomposition. Fails when no matching exists.
    pub fn impose(
        vars: &[Variable],
        values: &[isize],
        capacity: C,
        options: EngineOptions,
        domains: &mut DefaultDomainStore,
    ) -> CPResult<Self> {
        let graph = SupportGraph::new(vars, values, domains);
        let n = graph.n_vars();

        let mut positions: FxHashMap<Variable, Vec<usize>> = FxHashMap::default();
        for (i, var) in vars.iter().copied().enumerate() {
            positions.entry(var).or_default().push(i);
        }

        let mut engine = Self {
            capacity,
            options,
            matching: Matching::new(&graph),
            scc: SccAnalyzer::new(n),
            reach: Reachability::new(n),
            graph: Rc::new(graph),
            positions,
            changed: (0..n).collect(),
            queued: vec![true; n],
            dirty: vec![],
            force_full: true,
            phase: PropagationPhase::Idle,
            stats: Rc::new(Cell::new(EngineStatistics::default())),
        };

        engine.sync(domains);
        engine.repair(domains)?;
        engine.decompose(domains, true);
        Ok(engine)
    }

    /// Runs the pipeline until it stops narrowing any domain
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn consistency(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()> {
        self.bump(|s| s.calls += 1);
        let result = self.run(domains);
        self.phase = PropagationPhase::Idle;
        if result.is_err() {
            self.changed.drain(..).for_each(|i| self.queued[i] = false);
            self.dirty.clear();
            self.force_full = true;
        }
        result
    }

    /// Records that the given variable has changed
    pub fn queue_variable(&mut self, var: Variable) {
        if let Some(positions) = self.positions.get(&var) {
            for i in positions.iter().copied() {
                if !self.queued[i] {
                    self.queued[i] = true;
                    self.changed.push(i);
                }
            }
        }
    }

    /// Forgets all transient bookkeeping: everything the trail does not
    /// restore is stale once the search backtracks.
    ///
    /// The trail also brings back the edges that were synchronized at the
    /// level being popped, even when their values left the domains one level
    /// above. Hence every variable is checked again on the next call.
    pub fn remove_level(&mut self, _level: usize) {
        self.dirty.clear();
        self.changed.clear();
        self.changed.extend(0..self.queued.len());
        self.queued.fill(true);
    }

    /// True iff all variables are fixed and every value is taken a number of
    /// times compatible with its capacity
    pub fn is_satisfied(&self, domains: &DefaultDomainStore) -> bool {
        let graph = &self.graph;
        let mut count = vec![0_isize; graph.n_values()];
        for var in graph.variables().iter().copied() {
            match domains.value(var).and_then(|v| graph.value_index(v)) {
                Some(m) => count[m] += 1,
                None => return false,
            }
        }
        count.iter().copied().enumerate().all(|(m, c)| {
            let (lb, ub) = self.capacity.bounds(domains, m);
            lb <= c && c <= ub
        })
    }

    /// The capacities of this engine
    pub fn capacity(&self) -> &C {
        &self.capacity
    }
    /// The step of the pipeline the engine is in
    pub fn phase(&self) -> PropagationPhase {
        self.phase
    }
    /// The counters of this engine
    pub fn statistics(&self) -> EngineStatistics {
        self.stats.get()
    }
    /// A read only handle on the engine state
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            graph: Rc::clone(&self.graph),
            stats: Rc::clone(&self.stats),
        }
    }
}

// ********************************************************************** //
// ****** PIPELINE ****************************************************** //
// ********************************************************************** //
impl<C: Capacity> GlobalEngine<C> {
    /// The explicit state machine
    fn run(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()> {
        let mut phase = PropagationPhase::RepairMatching;
        let mut matching_changed = false;
        loop {
            self.phase = phase;
            phase = match phase {
                PropagationPhase::RepairMatching => {
                    self.bump(|s| s.passes += 1);
                    self.sync(domains);
                    matching_changed = self.repair(domains)?;
                    PropagationPhase::ComputeScc
                }
                PropagationPhase::ComputeScc => {
                    self.decompose(domains, matching_changed);
                    PropagationPhase::MarkReachability
                }
                PropagationPhase::MarkReachability => {
                    self.reach
                        .mark(&self.graph, domains.state_manager(), &self.matching);
                    PropagationPhase::ApplyPruning
                }
                PropagationPhase::ApplyPruning => {
                    if self.prune(domains)? {
                        self.bump(|s| s.narrowing_passes += 1);
                        PropagationPhase::RepairMatching
                    } else {
                        PropagationPhase::Idle
                    }
                }
                PropagationPhase::Idle => return Ok(()),
            };
        }
    }

    /// Drops the stale edges of the changed variables and grounds the ones
    /// that became singletons
    fn sync(&mut self, domains: &mut DefaultDomainStore) {
        let graph = &self.graph;
        while let Some(i) = self.changed.pop() {
            self.queued[i] = false;
            let sm = domains.state_manager();
            if !graph.is_open(sm, i) {
                continue;
            }

            let var = graph.variable(i);
            let label = graph.label(sm, i);
            let stale = graph
                .var_edges(i)
                .iter()
                .copied()
                .filter(|e| graph.has_edge(sm, *e))
                .filter(|e| !domains.contains(var, graph.value(graph.edge_value(*e))))
                .collect::<Vec<_>>();
            let fixed = domains.value(var).and_then(|v| graph.value_index(v));

            let sm = domains.state_manager_mut();
            for e in stale.iter().copied() {
                graph.remove_edge(sm, e);
            }
            if let Some(m) = fixed {
                graph.ground(sm, i, m);
            }
            if !stale.is_empty() || fixed.is_some() {
                self.dirty.push(label);
            }
        }
    }

    /// Refreshes the effective capacities and repairs the matching.
    /// Returns true iff the matching has changed.
    fn repair(&mut self, domains: &mut DefaultDomainStore) -> CPResult<bool> {
        let graph = &self.graph;
        for m in 0..graph.n_values() {
            let (lb, ub) = self.capacity.bounds(domains, m);
            let grounded = graph.grounded(domains.state_manager(), m);
            if grounded > ub {
                debug!(value = graph.value(m), grounded, ub, "capacity violation");
                self.bump(|s| s.capacity_violations += 1);
                return Err(Inconsistency);
            }
            self.matching.lower[m] = (lb - grounded).max(0) as usize;
            self.matching.upper[m] = (ub - grounded) as usize;
        }

        match self.matching.repair(graph, domains) {
            Ok(changed) => Ok(changed),
            Err(MatchingFailure::Infeasible) => {
                debug!("infeasible matching");
                self.bump(|s| s.infeasible_matchings += 1);
                Err(Inconsistency)
            }
            Err(MatchingFailure::Capacity) => {
                debug!("capacity violation");
                self.bump(|s| s.capacity_violations += 1);
                Err(Inconsistency)
            }
        }
    }

    /// Recomputes the SCC labels
    fn decompose(&mut self, domains: &mut DefaultDomainStore, matching_changed: bool) {
        let full = matching_changed || self.force_full || !self.options.incremental_scc;
        let sm = domains.state_manager_mut();
        if full {
            let n = self.scc.from_scratch(&self.graph, sm, &self.matching.mate);
            trace!(components = n, "scc from scratch");
            self.bump(|s| s.scratch_scc += 1);
        } else if !self.dirty.is_empty() {
            let n = self
                .scc
                .revisit(&self.graph, sm, &self.matching.mate, &self.dirty);
            trace!(components = n, dirty = self.dirty.len(), "scc revisited");
            self.bump(|s| s.incremental_scc += 1);
        }
        self.dirty.clear();
        self.force_full = false;
    }

    /// Removes all the unsupported edges. Returns true iff some domain was
    /// narrowed.
    fn prune(&mut self, domains: &mut DefaultDomainStore) -> CPResult<bool> {
        let graph = &self.graph;
        let matching = &self.matching;
        let reach = &self.reach;
        let sm = domains.state_manager();
        let open = graph.open_vars(sm).to_vec();

        let mut binds = vec![];
        if self.options.bind_shortcut {
            let permutation = self.capacity.is_exactly_one() && graph.live_values(sm) == open.len();
            for m in 0..graph.n_values() {
                let n = graph.n_candidates(sm, m);
                if n > 0 && (matching.lower[m] == n || (permutation && n == 1)) {
                    binds.extend(graph.candidates(sm, m).map(|x| (x, m)));
                }
            }
        }

        let value_reached = (0..graph.n_values())
            .map(|m| matching.matched_to[m].iter().any(|x| reach.reached[*x]))
            .collect::<Vec<_>>();
        let mut removals = vec![];
        for w in open.iter().copied() {
            let mw = matching.mate[w];
            let lw = graph.label(sm, w);
            for m in graph.candidate_values(sm, w) {
                if m == mw {
                    continue;
                }
                let same_scc = matching.matched_to[m]
                    .iter()
                    .any(|x| graph.label(sm, *x) == lw);
                let can_grow = matching.count[m] < matching.upper[m] || value_reached[m];
                if !(same_scc || (can_grow && reach.drains[w])) {
                    removals.push((w, m));
                }
            }
        }

        // the graph may lag behind the domains when some other propagator ran
        // since the last events were dispatched: only actual changes count
        let (mut n_binds, mut n_removals) = (0, 0);
        for (x, m) in binds.iter().copied() {
            let var = graph.variable(x);
            let before = domains.size(var);
            domains.fix(var, graph.value(m))?;
            n_binds += usize::from(domains.size(var) != before);
        }
        for (w, m) in removals.iter().copied() {
            let var = graph.variable(w);
            let before = domains.size(var);
            domains.remove(var, graph.value(m))?;
            n_removals += usize::from(domains.size(var) != before);
        }
        let narrowed = n_binds + n_removals > 0;

        trace!(binds = n_binds, removals = n_removals, "pruning");
        self.bump(|s| {
            s.bindings += n_binds;
            s.removals += n_removals;
        });
        for (x, _) in binds.into_iter().chain(removals) {
            if !self.queued[x] {
                self.queued[x] = true;
                self.changed.push(x);
            }
        }
        Ok(narrowed)
    }

    /// Updates the statistics
    fn bump(&self, f: impl FnOnce(&mut EngineStatistics)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ HANDLE ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// A read only view on the state of an engine which has been handed over to
/// the model. Since all of that state lives on the trail, the handle reads it
/// from the domain store.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    /// the graph of the engine
    graph: Rc<SupportGraph>,
    /// the counters of the engine
    stats: Rc<Cell<EngineStatistics>>,
}
impl EngineHandle {
    /// The counters of the engine
    pub fn statistics(&self) -> EngineStatistics {
        self.stats.get()
    }
    /// The value currently matched to `var` (if `var` is still open)
    pub fn matched_value(&self, domains: &DefaultDomainStore, var: Variable) -> Option<isize> {
        let sm = domains.state_manager();
        let i = self.position(domains, var)?;
        let m = self.graph.mate(sm, i);
        if m == UNMATCHED {
            None
        } else {
            Some(self.graph.value(m))
        }
    }
    /// The SCC label of `var` (if `var` is still open)
    pub fn label(&self, domains: &DefaultDomainStore, var: Variable) -> Option<isize> {
        let i = self.position(domains, var)?;
        Some(self.graph.label(domains.state_manager(), i))
    }
    /// For each value, the number of variables that must take it and the
    /// number of variables that still may take it
    pub fn occurrences(&self, domains: &DefaultDomainStore) -> (Vec<isize>, Vec<isize>) {
        let sm = domains.state_manager();
        let graph = &self.graph;
        (0..graph.n_values())
            .map(|m| {
                let grounded = graph.grounded(sm, m);
                let forced = graph
                    .candidates(sm, m)
                    .filter(|x| domains.is_fixed(graph.variable(*x)))
                    .count() as isize;
                let open = graph.n_candidates(sm, m) as isize;
                (grounded + forced, grounded + open)
            })
            .unzip()
    }
    /// Captures the current matching
    pub fn snapshot(&self, domains: &DefaultDomainStore) -> MatchingSnapshot {
        MatchingSnapshot::capture(&self.graph, domains)
    }
    /// Proposes a branching decision guided by the matching
    pub fn choose(&self, domains: &DefaultDomainStore) -> Option<(Variable, isize)> {
        guided_choice(&self.snapshot(domains))
    }
    /// The first open position of `var` in the graph
    fn position(&self, domains: &DefaultDomainStore, var: Variable) -> Option<usize> {
        let sm = domains.state_manager();
        (0..self.graph.n_vars())
            .find(|i| self.graph.variable(*i) == var && self.graph.is_open(sm, *i))
    }
}
