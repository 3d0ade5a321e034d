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

//! This module provides a plain depth first search with chronological
//! backtracking. Each node branches on a decision `x = v` (left) and then
//! `x != v` (right). The decisions are made by a brancher: any closure which
//! looks at the model and returns the next decision, or None when there is
//! nothing left to decide.

use tracing::{debug, trace};

use crate::{CPResult, CpModel, DomainStore, SaveAndRestore, Variable};

/// Tells the search whether it should go on after a solution was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFlow {
    /// Look for more solutions
    Continue,
    /// Stop the search right away
    Stop,
}

/// What happened during a search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// number of explored nodes
    pub nodes: usize,
    /// number of failed nodes
    pub failures: usize,
    /// number of solutions found
    pub solutions: usize,
    /// true iff the whole search space was explored
    pub completed: bool,
}

/// The first fail brancher: picks the unfixed variable with the smallest
/// domain (ties broken by position) and tries its minimum first.
pub fn first_fail(vars: Vec<Variable>) -> impl FnMut(&CpModel) -> Option<(Variable, isize)> {
    move |cp: &CpModel| {
        vars.iter()
            .copied()
            .enumerate()
            .filter(|(_, x)| cp.size(*x) > 1)
            .min_by_key(|(i, x)| (cp.size(*x), *i))
            .and_then(|(_, x)| cp.min(x).map(|v| (x, v)))
    }
}

/// A depth first search driven by the given brancher
pub struct Search<B> {
    brancher: B,
    stats: SearchStatistics,
}

impl<B: FnMut(&CpModel) -> Option<(Variable, isize)>> Search<B> {
    /// Creates a new search
    pub fn new(brancher: B) -> Self {
        Self {
            brancher,
            stats: SearchStatistics::default(),
        }
    }

    /// Explores the search space of the given model and calls `on_solution`
    /// on every solution. The model is left in the state it was given.
    pub fn solve<F>(&mut self, cp: &mut CpModel, mut on_solution: F) -> SearchStatistics
    where
        F: FnMut(&CpModel) -> SearchFlow,
    {
        self.stats = SearchStatistics::default();

        cp.save_state();
        let flow = match cp.fixpoint() {
            Ok(()) => self.dfs(cp, &mut on_solution),
            Err(_) => {
                self.stats.nodes += 1;
                self.stats.failures += 1;
                SearchFlow::Continue
            }
        };
        cp.restore_state();

        self.stats.completed = flow == SearchFlow::Continue;
        debug!(
            nodes = self.stats.nodes,
            failures = self.stats.failures,
            solutions = self.stats.solutions,
            "search done"
        );
        self.stats
    }

    /// The statistics of the last search
    pub fn statistics(&self) -> SearchStatistics {
        self.stats
    }

    /// Explores the subtree of the current node
    fn dfs(&mut self, cp: &mut CpModel, on_solution: &mut dyn FnMut(&CpModel) -> SearchFlow) -> SearchFlow {
        self.stats.nodes += 1;
        let Some((x, v)) = (self.brancher)(cp) else {
            if cp.is_satisfied() {
                self.stats.solutions += 1;
                return on_solution(cp);
            }
            self.stats.failures += 1;
            return SearchFlow::Continue;
        };

        for left in [true, false] {
            trace!(var = x.index(), value = v, left, "branch");
            cp.save_state();
            let decision: CPResult<()> = if left { cp.fix(x, v) } else { cp.remove(x, v) };
            let flow = match decision.and_then(|_| cp.fixpoint()) {
                Ok(()) => self.dfs(cp, on_solution),
                Err(_) => {
                    self.stats.failures += 1;
                    SearchFlow::Continue
                }
            };
            cp.restore_state();
            if flow == SearchFlow::Stop {
                return SearchFlow::Stop;
            }
        }
        SearchFlow::Continue
    }
}

#[cfg(test)]
mod test_search {
    use itertools::Itertools;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use crate::prelude::*;

    #[test]
    fn enumerates_all_permutations() {
        let mut cp = CpModel::default();
        let x = (0..4).map(|_| cp.new_int_var(0, 3)).collect::<Vec<_>>();
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());

        let mut found = vec![];
        let stats = Search::new(first_fail(x.clone())).solve(&mut cp, |cp| {
            found.push(x.iter().map(|v| cp.value(*v)).collect::<Vec<_>>());
            SearchFlow::Continue
        });

        assert_eq!(24, stats.solutions);
        assert!(stats.completed);
        assert!(found.iter().all_unique());
        // the model is back where it started
        for v in x.iter().copied() {
            assert_eq!(4, cp.size(v));
        }
    }

    #[test]
    fn stops_when_asked_to() {
        let mut cp = CpModel::default();
        let x = (0..4).map(|_| cp.new_int_var(0, 3)).collect::<Vec<_>>();
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());

        let stats = Search::new(first_fail(x)).solve(&mut cp, |_| SearchFlow::Stop);
        assert_eq!(1, stats.solutions);
        assert!(!stats.completed);
    }

    #[test]
    fn domain_consistency_never_fails_on_permutations() {
        let mut cp = CpModel::default();
        let x = (0..5).map(|_| cp.new_int_var(0, 4)).collect::<Vec<_>>();
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());

        let stats = Search::new(first_fail(x)).solve(&mut cp, |_| SearchFlow::Continue);
        assert_eq!(120, stats.solutions);
        assert_eq!(0, stats.failures);
    }

    #[test]
    fn matching_guided_search_finds_the_same_solutions() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2, 3]),
            cp.new_var_from_values(&[1, 2, 3, 4]),
            cp.new_var_from_values(&[2, 4, 5]),
            cp.new_var_from_values(&[1, 5]),
        ];
        let handle = AllDifferent::new(x.clone()).post_global(&mut cp).unwrap();
        let guided = Search::new(move |cp: &CpModel| handle.choose(cp.domains()))
            .solve(&mut cp, |_| SearchFlow::Continue);
        let plain = Search::new(first_fail(x)).solve(&mut cp, |_| SearchFlow::Continue);

        assert_eq!(plain.solutions, guided.solutions);
        assert_eq!(0, guided.failures);
    }

    #[test]
    fn unsatisfiable_root_is_a_single_failure() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 3);
        let c = cp.post(Box::new(move |d: &mut DefaultDomainStore| d.remove_above(x, -1)));
        cp.schedule(c);

        let stats = Search::new(first_fail(vec![x])).solve(&mut cp, |_| SearchFlow::Continue);
        assert_eq!(0, stats.solutions);
        assert_eq!(1, stats.failures);
        assert!(stats.completed);
    }

    #[test]
    fn both_consistencies_count_the_same_solutions() {
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..50 {
            let n = rng.gen_range(2..=5);
            let doms = (0..n)
                .map(|_| {
                    let mut d = (0..5).filter(|_| rng.gen_bool(0.6)).collect::<Vec<isize>>();
                    if d.is_empty() {
                        d.push(0);
                    }
                    d
                })
                .collect::<Vec<_>>();
            let expected = doms
                .iter()
                .multi_cartesian_product()
                .filter(|s| s.iter().all_unique())
                .count();

            for consistency in [Consistency::Domain, Consistency::Value] {
                let mut cp = CpModel::default();
                let x = doms.iter().map(|d| cp.new_var_from_values(d)).collect::<Vec<_>>();
                let alldiff = AllDifferent::new(x.clone()).with_consistency(consistency);
                let solutions = match cp.install(&alldiff) {
                    Err(_) => 0,
                    Ok(()) => Search::new(first_fail(x))
                        .solve(&mut cp, |_| SearchFlow::Continue)
                        .solutions,
                };
                assert_eq!(expected, solutions, "{consistency:?} {doms:?}");
            }
        }
    }

    #[test]
    fn global_cardinality_solutions_are_enumerated() {
        let mut cp = CpModel::default();
        let x = (0..3).map(|_| cp.new_var_from_values(&[1, 2])).collect::<Vec<_>>();
        let ca = cp.new_int_var(1, 2);
        let cb = cp.new_int_var(1, 2);
        let gcc = GlobalCardinality::new(x.clone(), vec![1, 2], vec![ca, cb]).unwrap();
        assert!(cp.install(&gcc).is_ok());

        let stats = Search::new(first_fail(x)).solve(&mut cp, |cp| {
            assert!(cp.is_fixed(ca) && cp.is_fixed(cb));
            SearchFlow::Continue
        });
        assert_eq!(6, stats.solutions);
    }
}
