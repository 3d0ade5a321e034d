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

//! This module provides the incremental matching between the open variables
//! and the values of a global constraint, where each value `m` may be taken
//! by a number of variables in `lower[m]..=upper[m]`.
//!
//! The matching found during the previous call is the starting point. Only
//! the variables whose matched edge was invalidated (value removed from the
//! domain, or value over its upper capacity) are freed. Then:
//!
//! 1. The free variables are rematched (smallest domain max first), either
//!    greedily or along an augmenting path ending at a value with spare
//!    capacity. A variable which cannot be rematched means that the
//!    constraint has no solution.
//! 2. The values that are below their lower capacity (smallest first) pull
//!    variables away from values holding a surplus, along alternating paths.
//!    A value that cannot be completed this way is a capacity violation.
//!
//! With `lower = 0` and `upper = 1` everywhere, this is exactly the classic
//! maximum matching used by the all different constraint.

use std::{cmp::Reverse, collections::BinaryHeap, collections::VecDeque};

use crate::prelude::*;

use super::{SupportGraph, UNMATCHED};

/// Why the matching could not be repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingFailure {
    /// Some variable cannot be matched without exceeding an upper capacity
    Infeasible,
    /// Some value cannot reach its lower capacity
    Capacity,
}

/// This "timestamp" implements a sort of 'monotonic clock' (a counter that
/// can only ever be incremented). It tells whether a node was already seen
/// during the current path search without having to clear the marks.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Timestamp(usize);

impl Timestamp {
    /// Increments the value of the current timestamp
    fn inc(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The working copy of the matching used during one propagation pass.
#[derive(Debug, Clone)]
pub struct Matching {
    /// The value index matched to each variable
    pub mate: Vec<usize>,
    /// The number of open variables matched to each value
    pub count: Vec<usize>,
    /// The effective lower capacity of each value
    pub lower: Vec<usize>,
    /// The effective upper capacity of each value
    pub upper: Vec<usize>,
    /// The open variables matched to each value (rebuilt after each repair)
    pub matched_to: Vec<Vec<usize>>,

    /// current time
    timestamp: Timestamp,
    /// last time each variable was seen
    var_seen: Vec<Timestamp>,
    /// last time each value was seen
    val_seen: Vec<Timestamp>,
    /// the node from which each variable was reached
    var_parent: Vec<usize>,
    /// the node from which each value was reached
    val_parent: Vec<usize>,
    /// bfs queue
    queue: VecDeque<usize>,
}

impl Matching {
    /// Creates an empty workspace for the given graph
    pub fn new(graph: &SupportGraph) -> Self {
        let n = graph.n_vars();
        let m = graph.n_values();
        Self {
            mate: vec![UNMATCHED; n],
            count: vec![0; m],
            lower: vec![0; m],
            upper: vec![0; m],
            matched_to: vec![vec![]; m],
            timestamp: Timestamp::default(),
            var_seen: vec![Timestamp::default(); n],
            val_seen: vec![Timestamp::default(); m],
            var_parent: vec![UNMATCHED; n],
            val_parent: vec![UNMATCHED; m],
            queue: VecDeque::new(),
        }
    }

    /// Repairs the matching stored in the graph so that every open variable
    /// is matched and every value count lies within its effective capacity
    /// (`lower` and `upper` must have been set beforehand). The repaired
    /// matching is written back in the graph. Returns true iff the matching
    /// of some open variable has changed.
    pub fn repair(
        &mut self,
        graph: &SupportGraph,
        domains: &mut DefaultDomainStore,
    ) -> Result<bool, MatchingFailure> {
        let sm = domains.state_manager();
        let open = graph.open_vars(sm).to_vec();

        // load the previous matching and seed the free variables
        self.count.iter_mut().for_each(|c| *c = 0);
        let mut free = vec![];
        for i in open.iter().copied() {
            let m = graph.mate(sm, i);
            let valid = m != UNMATCHED && graph.edge(i, m).map_or(false, |e| graph.has_edge(sm, e));
            if valid {
                self.mate[i] = m;
                self.count[m] += 1;
            } else {
                self.mate[i] = UNMATCHED;
                free.push(i);
            }
        }
        // over capacity values evict their excess (right to left)
        for m in 0..graph.n_values() {
            if self.count[m] > self.upper[m] {
                let cands = graph.candidates(sm, m).collect::<Vec<_>>();
                for x in cands.into_iter().rev() {
                    if self.count[m] <= self.upper[m] {
                        break;
                    }
                    if self.mate[x] == m {
                        self.mate[x] = UNMATCHED;
                        self.count[m] -= 1;
                        free.push(x);
                    }
                }
            }
        }

        // upper pass
        let mut heap = free
            .iter()
            .copied()
            .map(|i| Reverse((domains.max(graph.variable(i)).unwrap_or(isize::MIN), i)))
            .collect::<BinaryHeap<_>>();
        while let Some(Reverse((_, i))) = heap.pop() {
            if !self.greedy(graph, sm, i) && !self.augment(graph, sm, i) {
                return Err(MatchingFailure::Infeasible);
            }
        }

        // lower pass (smallest deficient value first)
        let mut heap = (0..graph.n_values())
            .filter(|m| self.count[*m] < self.lower[*m])
            .map(|m| Reverse((graph.value(m), m)))
            .collect::<BinaryHeap<_>>();
        while let Some(Reverse((_, m))) = heap.pop() {
            while self.count[m] < self.lower[m] {
                if !self.pull(graph, sm, m) {
                    return Err(MatchingFailure::Capacity);
                }
            }
        }

        // write back
        let mut changed = false;
        for i in open.iter().copied() {
            if graph.mate(domains.state_manager(), i) != self.mate[i] {
                graph.set_mate(domains.state_manager_mut(), i, self.mate[i]);
                changed = true;
            }
        }

        for l in self.matched_to.iter_mut() {
            l.clear();
        }
        for i in open.iter().copied() {
            self.matched_to[self.mate[i]].push(i);
        }
        Ok(changed)
    }

    /// Matches variable `i` with its first admissible value having some
    /// spare capacity. Returns true when that succeeded.
    fn greedy(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, i: usize) -> bool {
        for m in graph.candidate_values(sm, i) {
            if self.count[m] < self.upper[m] {
                self.mate[i] = m;
                self.count[m] += 1;
                return true;
            }
        }
        false
    }

    /// Looks for an alternating path from the free variable `i` to a value
    /// with spare capacity and flips it. Returns true when such a path was
    /// found.
    fn augment(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, i: usize) -> bool {
        self.timestamp = self.timestamp.inc();
        let now = self.timestamp;

        self.queue.clear();
        self.queue.push_back(i);
        self.var_seen[i] = now;

        while let Some(x) = self.queue.pop_front() {
            for m in graph.candidate_values(sm, x) {
                if m == self.mate[x] || self.val_seen[m] == now {
                    continue;
                }
                self.val_seen[m] = now;
                self.val_parent[m] = x;

                if self.count[m] < self.upper[m] {
                    self.flip(m);
                    return true;
                }
                for y in graph.candidates(sm, m) {
                    if self.mate[y] == m && self.var_seen[y] != now {
                        self.var_seen[y] = now;
                        self.queue.push_back(y);
                    }
                }
            }
        }
        false
    }

    /// Flips the augmenting path ending at value `target`
    fn flip(&mut self, target: usize) {
        let mut m = target;
        loop {
            let x = self.val_parent[m];
            let previous = self.mate[x];
            self.mate[x] = m;
            if previous == UNMATCHED {
                break;
            }
            m = previous;
        }
        self.count[target] += 1;
    }

    /// Looks for an alternating path which moves one variable from a value
    /// holding a surplus towards the deficient value `target`, and shifts it.
    /// Returns true when such a path was found.
    fn pull(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, target: usize) -> bool {
        self.timestamp = self.timestamp.inc();
        let now = self.timestamp;

        self.queue.clear();
        self.queue.push_back(target);
        self.val_seen[target] = now;

        while let Some(u) = self.queue.pop_front() {
            for x in graph.candidates(sm, u) {
                let w = self.mate[x];
                if w == u || self.var_seen[x] == now {
                    continue;
                }
                self.var_seen[x] = now;
                self.var_parent[x] = u;

                if self.val_seen[w] == now {
                    continue;
                }
                self.val_seen[w] = now;
                self.val_parent[w] = x;

                if self.count[w] > self.lower[w] {
                    self.shift(w, target);
                    return true;
                }
                self.queue.push_back(w);
            }
        }
        false
    }

    /// Moves every variable on the path from the surplus value `source` to
    /// the deficient value `target` one step forward.
    fn shift(&mut self, source: usize, target: usize) {
        let mut w = source;
        loop {
            let x = self.val_parent[w];
            let u = self.var_parent[x];
            self.mate[x] = u;
            if u == target {
                break;
            }
            w = u;
        }
        self.count[source] -= 1;
        self.count[target] += 1;
    }
}
