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

//! This module provides the implementation of the global cardinality
//! constraint: value `values[i]` must be taken by exactly `counters[i]`
//! variables. The filtering of the decision variables is that of
//! "Generalized arc consistency for global cardinality constraint"
//! J-C. Régin, AAAI-96. The counters themselves are only bounds-narrowed.
//!
//! The constraint is *closed*: the decision variables may only take one of
//! the listed values.

use rustc_hash::FxHashSet;

use crate::prelude::*;

use super::global::{Bounded, EngineHandle, EngineOptions, GlobalEngine};

/// The reasons why a global cardinality cannot be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// There must be exactly one counter per value
    #[error("{values} values but {counters} counters")]
    LengthMismatch {
        /// number of values
        values: usize,
        /// number of counters
        counters: usize,
    },
    /// A value cannot be listed twice
    #[error("value {0} is listed more than once")]
    DuplicateValue(isize),
    /// Counting occurrences in an empty list makes no sense
    #[error("counters given for an empty list of variables")]
    NoVariables,
}

/// This constraint enforces that each value `values[i]` be taken by a number
/// of variables equal to `counters[i]`
#[derive(Debug, Clone)]
pub struct GlobalCardinality {
    /// the decision variables
    vars: Vec<Variable>,
    /// the values that may be taken
    values: Vec<isize>,
    /// the number of occurrences of each value
    counters: Vec<Variable>,
    /// the knobs of the engine
    options: EngineOptions,
}
impl GlobalCardinality {
    /// Creates the constraint after checking that it is well formed
    pub fn new(
        vars: Vec<Variable>,
        values: Vec<isize>,
        counters: Vec<Variable>,
    ) -> Result<Self, ModelError> {
        if values.len() != counters.len() {
            return Err(ModelError::LengthMismatch {
                values: values.len(),
                counters: counters.len(),
            });
        }
        let mut seen = FxHashSet::default();
        for v in values.iter().copied() {
            if !seen.insert(v) {
                return Err(ModelError::DuplicateValue(v));
            }
        }
        if vars.is_empty() && !counters.is_empty() {
            return Err(ModelError::NoVariables);
        }
        Ok(Self {
            vars,
            values,
            counters,
            options: EngineOptions::default(),
        })
    }
    /// sets the engine options
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the constraint and returns a handle on its engine
    pub fn post_global(&self, cp: &mut CpModel) -> CPResult<EngineHandle> {
        let listed = self.values.iter().copied().collect::<FxHashSet<_>>();
        for x in self.vars.iter().copied() {
            for v in cp.values(x) {
                if !listed.contains(&v) {
                    cp.remove(x, v)?;
                }
            }
        }
        let n = self.vars.len() as isize;
        for c in self.counters.iter().copied() {
            cp.remove_outside(c, 0, n)?;
        }

        let capacity = Bounded::new(self.counters.clone());
        let engine = GlobalEngine::impose(&self.vars, &self.values, capacity, self.options, cp.domains_mut())?;
        let handle = engine.handle();

        let constraint = cp.post(Box::new(CardinalityPropagator {
            engine,
            counters: self.counters.clone(),
            n_vars: self.vars.len(),
            handle: handle.clone(),
        }));
        for x in self.vars.iter().copied() {
            cp.propagate_on(constraint, DomainCondition::DomainChanged(x));
        }
        for c in self.counters.iter().copied() {
            cp.propagate_on(constraint, DomainCondition::BoundsChanged(c));
        }
        cp.schedule(constraint);
        Ok(handle)
    }
}
impl ModelingConstruct for GlobalCardinality {
    fn install(&self, cp: &mut CpModel) -> CPResult<()> {
        self.post_global(cp).map(|_| ())
    }
}

/// The propagator of the global cardinality
struct CardinalityPropagator {
    engine: GlobalEngine<Bounded>,
    counters: Vec<Variable>,
    n_vars: usize,
    handle: EngineHandle,
}
impl CardinalityPropagator {
    /// Narrows the counters to the occurrences that remain possible. Returns
    /// true iff some counter was narrowed.
    fn narrow_counters(&self, domains: &mut DefaultDomainStore) -> CPResult<bool> {
        let (must, may) = self.handle.occurrences(domains);

        let mut bounds = must
            .iter()
            .copied()
            .zip(may.iter().copied())
            .collect::<Vec<_>>();

        // every variable takes exactly one of the values
        let n = self.n_vars as isize;
        let sum_min = self.counters.iter().map(|c| domains.min(*c).unwrap_or(0)).sum::<isize>();
        let sum_max = self.counters.iter().map(|c| domains.max(*c).unwrap_or(0)).sum::<isize>();
        for (m, c) in self.counters.iter().copied().enumerate() {
            let (min, max) = (domains.min(c).unwrap_or(0), domains.max(c).unwrap_or(0));
            let lo = n - (sum_max - max);
            let hi = n - (sum_min - min);
            bounds[m] = (bounds[m].0.max(lo), bounds[m].1.min(hi));
        }

        let mut narrowed = false;
        for (c, (lo, hi)) in self.counters.iter().copied().zip(bounds) {
            let before = domains.size(c);
            domains.remove_outside(c, lo, hi)?;
            narrowed |= domains.size(c) != before;
        }
        Ok(narrowed)
    }
}
impl Propagator for CardinalityPropagator {
    fn propagate(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()> {
        loop {
            self.engine.consistency(domains)?;
            if !self.narrow_counters(domains)? {
                return Ok(());
            }
        }
    }
    fn queue_variable(&mut self, _level: usize, var: Variable) {
        self.engine.queue_variable(var);
    }
    fn remove_level(&mut self, level: usize) {
        self.engine.remove_level(level);
    }
    fn is_satisfied(&self, domains: &DefaultDomainStore) -> bool {
        self.counters.iter().all(|c| domains.is_fixed(*c)) && self.engine.is_satisfied(domains)
    }
    fn name(&self) -> &'static str {
        "global_cardinality"
    }
}


#[cfg(test)]
mod test_gcc_random {
    use itertools::Itertools;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use crate::prelude::*;

    const VALUES: [isize; 4] = [1, 2, 3, 4];

    /// Brute force: the supported values of each variable and the possible
    /// occurrences of each value, or None when there is no solution
    fn supports(doms: &[Vec<isize>], bounds: &[(isize, isize)]) -> Option<(Vec<Vec<isize>>, Vec<Vec<isize>>)> {
        let mut supp = vec![vec![]; doms.len()];
        let mut occ = vec![vec![]; VALUES.len()];
        for sol in doms.iter().multi_cartesian_product() {
            let count = VALUES
                .iter()
                .map(|v| sol.iter().filter(|x| ***x == *v).count() as isize)
                .collect::<Vec<_>>();
            if count.iter().zip(bounds).all(|(c, (lo, hi))| lo <= c && c <= hi) {
                for (i, v) in sol.iter().enumerate() {
                    supp[i].push(**v);
                }
                for (m, c) in count.iter().enumerate() {
                    occ[m].push(*c);
                }
            }
        }
        if supp[0].is_empty() {
            return None;
        }
        for s in supp.iter_mut().chain(occ.iter_mut()) {
            s.sort_unstable();
            s.dedup();
        }
        Some((supp, occ))
    }

    /// Random domains over VALUES and random counter bounds
    fn random_instance(rng: &mut SmallRng) -> (Vec<Vec<isize>>, Vec<(isize, isize)>) {
        let n = rng.gen_range(2..=5);
        let doms = (0..n)
            .map(|_| {
                let mut d = VALUES.iter().copied().filter(|_| rng.gen_bool(0.6)).collect::<Vec<_>>();
                if d.is_empty() {
                    d.push(VALUES[rng.gen_range(0..VALUES.len())]);
                }
                d
            })
            .collect::<Vec<_>>();
        let bounds = VALUES
            .iter()
            .map(|_| {
                let lo = rng.gen_range(0..=2);
                (lo, rng.gen_range(lo..=3))
            })
            .collect::<Vec<_>>();
        (doms, bounds)
    }

    fn current(cp: &CpModel, x: &[Variable]) -> Vec<Vec<isize>> {
        x.iter().map(|v| cp.values(*v)).collect()
    }

    fn bounds_of(cp: &CpModel, c: &[Variable]) -> Vec<(isize, isize)> {
        c.iter()
            .map(|k| (cp.min(*k).unwrap_or(0), cp.max(*k).unwrap_or(-1)))
            .collect()
    }

    #[test]
    fn filtering_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(2022);
        for _ in 0..300 {
            let (doms, bounds) = random_instance(&mut rng);

            let mut cp = CpModel::default();
            let x = doms.iter().map(|d| cp.new_var_from_values(d)).collect::<Vec<_>>();
            let c = bounds.iter().map(|(lo, hi)| cp.new_int_var(*lo, *hi)).collect::<Vec<_>>();
            let gcc = GlobalCardinality::new(x.clone(), VALUES.to_vec(), c.clone()).unwrap();
            let result = cp.install(&gcc).and_then(|_| cp.fixpoint());

            match supports(&doms, &bounds) {
                None => assert_eq!(Err(Inconsistency), result, "{doms:?} {bounds:?}"),
                Some((supp, occ)) => {
                    assert_eq!(Ok(()), result, "{doms:?} {bounds:?}");
                    assert_eq!(supp, current(&cp, &x), "{doms:?} {bounds:?}");
                    // counters are only bounds narrowed: they must keep every
                    // possible occurrence
                    for (m, counter) in c.iter().copied().enumerate() {
                        for k in occ[m].iter().copied() {
                            assert!(cp.contains(counter, k));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn dives_and_backtracks_stay_exact() {
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..150 {
            let (doms, bounds) = random_instance(&mut rng);
            let n = doms.len();
            let mut cp = CpModel::default();
            let x = doms.iter().map(|d| cp.new_var_from_values(d)).collect::<Vec<_>>();
            let c = bounds.iter().map(|(lo, hi)| cp.new_int_var(*lo, *hi)).collect::<Vec<_>>();
            let gcc = GlobalCardinality::new(x.clone(), VALUES.to_vec(), c.clone()).unwrap();
            if cp.install(&gcc).and_then(|_| cp.fixpoint()).is_err() {
                continue;
            }
            let root = (current(&cp, &x), current(&cp, &c));

            for _ in 0..5 {
                let depth = rng.gen_range(1..=4);
                cp.save_state();
                let mut saved = 1;
                for _ in 0..depth {
                    let open = (0..n).filter(|i| cp.size(x[*i]) > 1).collect::<Vec<_>>();
                    if open.is_empty() {
                        break;
                    }
                    let i = open[rng.gen_range(0..open.len())];
                    let dom = cp.values(x[i]);
                    let v = dom[rng.gen_range(0..dom.len())];

                    let early = rng.gen_bool(0.5);
                    if !early {
                        cp.save_state();
                        saved += 1;
                    }
                    let decision = if rng.gen_bool(0.5) {
                        cp.remove(x[i], v)
                    } else {
                        cp.fix(x[i], v)
                    };
                    if early {
                        cp.save_state();
                        saved += 1;
                    }

                    let before = current(&cp, &x);
                    let limits = bounds_of(&cp, &c);
                    match decision.and_then(|_| cp.fixpoint()) {
                        Ok(()) => match supports(&before, &limits) {
                            Some((supp, occ)) => {
                                assert_eq!(supp, current(&cp, &x), "{before:?} {limits:?}");
                                for (m, counter) in c.iter().copied().enumerate() {
                                    for k in occ[m].iter().copied() {
                                        assert!(cp.contains(counter, k));
                                    }
                                }
                            }
                            None => panic!("missed a failure on {before:?} {limits:?}"),
                        },
                        Err(_) => {
                            assert!(
                                supports(&before, &limits).is_none(),
                                "spurious failure on {before:?} {limits:?}"
                            );
                            break;
                        }
                    }
                    // undo the propagation but keep the early decision
                    if early && rng.gen_bool(0.5) {
                        cp.restore_state();
                        saved -= 1;
                    }
                }
                for _ in 0..saved {
                    cp.restore_state();
                }
                assert_eq!(root, (current(&cp, &x), current(&cp, &c)));
                assert_eq!(Ok(()), cp.fixpoint());
                assert_eq!(root, (current(&cp, &x), current(&cp, &c)));
            }
        }
    }
}
