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

//! Reachability marks computed on top of a matching.
//!
//! * A variable is *reached* when some free value (a value whose count is
//!   below its upper capacity) leads to it through an alternating path. A
//!   variable which is not reached is *locked* in its component.
//! * A variable *drains* when an alternating path leads from it to some
//!   variable matched to a value holding a surplus (count above the lower
//!   capacity). When no value has a lower capacity, every variable drains.

use std::collections::VecDeque;

use crate::prelude::*;

use super::{Matching, SupportGraph};

/// The reachability marks of the open variables
#[derive(Debug, Clone)]
pub struct Reachability {
    /// is each variable reachable from a free value ?
    pub reached: Vec<bool>,
    /// can each variable reach a surplus value ?
    pub drains: Vec<bool>,
    /// bfs queue
    queue: VecDeque<usize>,
}

impl Reachability {
    /// Creates the marks for a graph of `n` variables
    pub fn new(n: usize) -> Self {
        Self {
            reached: vec![false; n],
            drains: vec![false; n],
            queue: VecDeque::new(),
        }
    }

    /// Computes both marks
    pub fn mark(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, matching: &Matching) {
        self.mark_reached(graph, sm, matching);
        self.mark_drains(graph, sm, matching);
    }

    /// Forward search from the free values
    fn mark_reached(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, matching: &Matching) {
        self.reached.iter_mut().for_each(|r| *r = false);
        self.queue.clear();

        let mate = &matching.mate;
        for u in 0..graph.n_values() {
            if matching.count[u] < matching.upper[u] {
                for y in graph.candidates(sm, u) {
                    if mate[y] != u && !self.reached[y] {
                        self.reached[y] = true;
                        self.queue.push_back(y);
                    }
                }
            }
        }
        while let Some(x) = self.queue.pop_front() {
            let m = mate[x];
            for y in graph.candidates(sm, m) {
                if mate[y] != m && !self.reached[y] {
                    self.reached[y] = true;
                    self.queue.push_back(y);
                }
            }
        }
    }

    /// Backward search from the variables matched to a surplus value
    fn mark_drains(&mut self, graph: &SupportGraph, sm: &TrailedStateManager, matching: &Matching) {
        self.drains.iter_mut().for_each(|d| *d = false);
        self.queue.clear();

        let mate = &matching.mate;
        if matching.lower.iter().all(|l| *l == 0) {
            for x in graph.open_vars(sm).iter().copied() {
                self.drains[x] = true;
            }
            return;
        }

        for x in graph.open_vars(sm).iter().copied() {
            let m = mate[x];
            if matching.count[m] > matching.lower[m] {
                self.drains[x] = true;
                self.queue.push_back(x);
            }
        }
        // z -> x iff x admits mate(z) != mate(x)
        while let Some(x) = self.queue.pop_front() {
            for u in graph.candidate_values(sm, x) {
                if u == mate[x] {
                    continue;
                }
                for z in matching.matched_to[u].iter().copied() {
                    if !self.drains[z] {
                        self.drains[z] = true;
                        self.queue.push_back(z);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test_reachability {
    use crate::prelude::*;

    use super::Reachability;
    use crate::constraints::global::{Matching, SupportGraph};

    fn setup(
        doms: &[&[isize]],
        values: &[isize],
        caps: &[(usize, usize)],
    ) -> (DefaultDomainStore, SupportGraph, Matching) {
        let mut ds = DefaultDomainStore::default();
        let vars = doms
            .iter()
            .map(|d| ds.new_var_from_values(d))
            .collect::<Vec<_>>();
        let graph = SupportGraph::new(&vars, values, &mut ds);
        let mut matching = Matching::new(&graph);
        for (m, (lb, ub)) in caps.iter().copied().enumerate() {
            matching.lower[m] = lb;
            matching.upper[m] = ub;
        }
        assert!(matching.repair(&graph, &mut ds).is_ok());
        (ds, graph, matching)
    }

    #[test]
    fn free_values_reach_through_alternating_paths() {
        // x0 -> 1, x1 -> 2, x2 -> 3 and value 4 is free
        let (ds, graph, matching) = setup(&[&[1], &[1, 2], &[2, 3, 4]], &[1, 2, 3, 4], &[(0, 1); 4]);
        let mut reach = Reachability::new(3);
        reach.mark(&graph, ds.state_manager(), &matching);

        assert_eq!(vec![0, 1, 2], matching.mate);
        assert_eq!(vec![false, false, true], reach.reached);
        assert_eq!(vec![true, true, true], reach.drains);
    }

    #[test]
    fn only_variables_leading_to_a_surplus_drain() {
        // value 1 needs both of its candidates, value 2 has room to spare
        let (ds, graph, matching) = setup(
            &[&[1, 2], &[1, 2], &[2]],
            &[1, 2],
            &[(2, 2), (1, 3)],
        );
        let mut reach = Reachability::new(3);
        reach.mark(&graph, ds.state_manager(), &matching);

        assert_eq!(vec![0, 0, 1], matching.mate);
        assert_eq!(vec![false, false, false], reach.drains);
        assert_eq!(vec![true, true, false], reach.reached);
    }
}
