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

//! This module provides the implementation of the all different constraint.
//! The domain consistent version relies on the matching based engine
//! described in "A filtering algorithm for constraints of difference in CSPs"
//! J-C. Régin, AAAI-94. The value consistent version simply posts a
//! difference between each pair of variables.

use crate::prelude::*;

use super::global::{EngineHandle, EngineOptions, ExactlyOne, GlobalEngine};

/// The level of consistency enforced by an all different constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Every remaining value of every variable belongs to some solution
    #[default]
    Domain,
    /// A value is only removed once some other variable is fixed to it
    Value,
}

/// This constraint enforces that the the value affected to each variable be
/// different from the one affected to all other variables.
#[derive(Debug, Clone)]
pub struct AllDifferent {
    /// All these variables must take different values in the solution
    vars: Vec<Variable>,
    /// how hard to filter
    consistency: Consistency,
    /// the knobs of the engine (only used with domain consistency)
    options: EngineOptions,
}
impl AllDifferent {
    /// creates a new domain consistent constraint
    pub fn new(vars: Vec<Variable>) -> Self {
        Self {
            vars,
            consistency: Consistency::Domain,
            options: EngineOptions::default(),
        }
    }
    /// sets the level of consistency
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }
    /// sets the engine options
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the domain consistent version of the constraint and returns a
    /// handle on its engine. The handle can be used to guide the search.
    pub fn post_global(&self, cp: &mut CpModel) -> CPResult<EngineHandle> {
        let mut values = self
            .vars
            .iter()
            .flat_map(|x| cp.values(*x))
            .collect::<Vec<_>>();
        values.sort_unstable();
        values.dedup();

        let engine = GlobalEngine::impose(&self.vars, &values, ExactlyOne, self.options, cp.domains_mut())?;
        let handle = engine.handle();

        let constraint = cp.post(Box::new(AllDifferentPropagator { engine }));
        for x in self.vars.iter().copied() {
            cp.propagate_on(constraint, DomainCondition::DomainChanged(x));
        }
        cp.schedule(constraint);
        Ok(handle)
    }
}
impl ModelingConstruct for AllDifferent {
    fn install(&self, cp: &mut CpModel) -> CPResult<()> {
        match self.consistency {
            Consistency::Domain => self.post_global(cp).map(|_| ()),
            Consistency::Value => {
                for (i, x) in self.vars.iter().copied().enumerate() {
                    for y in self.vars.iter().copied().skip(i + 1) {
                        cp.install(&NotEqualVar::new(x, y))?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The propagator of the domain consistent all different
struct AllDifferentPropagator {
    engine: GlobalEngine<ExactlyOne>,
}
impl Propagator for AllDifferentPropagator {
    fn propagate(&mut self, domains: &mut DefaultDomainStore) -> CPResult<()> {
        self.engine.consistency(domains)
    }
    fn queue_variable(&mut self, _level: usize, var: Variable) {
        self.engine.queue_variable(var);
    }
    fn remove_level(&mut self, level: usize) {
        self.engine.remove_level(level);
    }
    fn is_satisfied(&self, domains: &DefaultDomainStore) -> bool {
        self.engine.is_satisfied(domains)
    }
    fn name(&self) -> &'static str {
        "all_different"
    }
}

#[cfg(test)]
mod test_alldiff_dc {
    use crate::prelude::*;

    #[test]
    fn fixing_one_variable_removes_its_value_elsewhere() {
        let mut cp = CpModel::default();
        let x = (0..5).map(|_| cp.new_int_var(0, 4)).collect::<Vec<_>>();
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert!(cp.fix(x[0], 0).is_ok());
        assert!(cp.fixpoint().is_ok());

        for v in x.iter().skip(1).copied() {
            assert_eq!(4, cp.size(v));
            assert_eq!(Some(1), cp.min(v));
        }
    }

    #[test]
    fn hall_interval_is_removed_from_the_others() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2, 3, 4]),
        ];
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert_eq!(2, cp.size(x[2]));
        assert_eq!(Some(3), cp.min(x[2]));

        assert!(cp.fix(x[0], 1).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(Some(2), cp.value(x[1]));
    }

    #[test]
    fn nine_variables_with_fixed_ones() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2, 3, 4, 5]),
            cp.new_var_from_values(&[2]),
            cp.new_var_from_values(&[1, 2, 3, 4, 5]),
            cp.new_var_from_values(&[1]),
            cp.new_var_from_values(&[1, 2, 3, 4, 5, 6]),
            cp.new_var_from_values(&[6, 7, 8]),
            cp.new_var_from_values(&[3]),
            cp.new_var_from_values(&[6, 7, 8, 9]),
            cp.new_var_from_values(&[6, 7, 8]),
        ];
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert_eq!(cp.size(x[0]), 2);
        assert_eq!(cp.size(x[2]), 2);
        assert_eq!(cp.min(x[4]), Some(6));
        assert_eq!(cp.min(x[7]), Some(9));
        assert_eq!(cp.min(x[8]), Some(7));
        assert_eq!(cp.max(x[8]), Some(8));
    }

    #[test]
    fn values_outside_a_tight_component_are_removed() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[3, 4]),
            cp.new_var_from_values(&[1]),
            cp.new_var_from_values(&[3, 4]),
            cp.new_var_from_values(&[0]),
            cp.new_var_from_values(&[3, 4, 5]),
            cp.new_var_from_values(&[5, 6, 7]),
            cp.new_var_from_values(&[2, 9, 10]),
            cp.new_var_from_values(&[5, 6, 7, 8]),
            cp.new_var_from_values(&[5, 6, 7]),
        ];
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert!(!cp.contains(x[4], 3));
        assert!(!cp.contains(x[4], 4));
        assert!(!cp.contains(x[5], 5));
        assert!(!cp.contains(x[7], 5));
        assert!(!cp.contains(x[7], 6));
        assert!(!cp.contains(x[8], 5));
    }

    #[test]
    fn negative_values_are_handled() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[0, 2, 3, 5]),
            cp.new_var_from_values(&[4]),
            cp.new_var_from_values(&[-1, 1]),
            cp.new_var_from_values(&[-4, -2, 0, 2, 3]),
            cp.new_var_from_values(&[-1]),
        ];
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert!(!cp.contains(x[2], -1));
    }

    #[test]
    fn pigeon_hole_fails_at_install() {
        let mut cp = CpModel::default();
        let x = (0..3).map(|_| cp.new_var_from_values(&[1, 2])).collect::<Vec<_>>();
        assert_eq!(Err(Inconsistency), cp.install(&AllDifferent::new(x)));
    }

    #[test]
    fn pigeon_hole_fails_after_narrowing() {
        let mut cp = CpModel::default();
        let x = (0..3).map(|_| cp.new_var_from_values(&[1, 2, 3])).collect::<Vec<_>>();
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());

        cp.save_state();
        assert!(cp.remove(x[0], 3).is_ok());
        assert!(cp.remove(x[1], 3).is_ok());
        assert!(cp.remove(x[2], 3).is_ok());
        assert_eq!(Err(Inconsistency), cp.fixpoint());
        cp.restore_state();

        // the model is usable again after the failure
        assert!(cp.fix(x[0], 3).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(vec![1, 2], cp.values(x[1]));
        assert_eq!(vec![1, 2], cp.values(x[2]));
    }

    #[test]
    fn chain_of_tight_pairs_is_pruned() {
        // {1,2} {1,2} {2,3} {3,4}
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[2, 3]),
            cp.new_var_from_values(&[3, 4]),
        ];
        let handle = AllDifferent::new(x.clone()).post_global(&mut cp).unwrap();
        assert_eq!(
            handle.label(cp.domains(), x[0]),
            handle.label(cp.domains(), x[1])
        );
        assert!(cp.fixpoint().is_ok());

        assert_eq!(vec![1, 2], cp.values(x[0]));
        assert_eq!(vec![1, 2], cp.values(x[1]));
        assert_eq!(vec![3], cp.values(x[2]));
        assert_eq!(vec![4], cp.values(x[3]));
    }

    #[test]
    fn value_consistency_only_reacts_to_fixed_variables() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2, 3]),
        ];
        let weak = AllDifferent::new(x.clone()).with_consistency(Consistency::Value);
        assert!(cp.install(&weak).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(3, cp.size(x[2]));

        assert!(cp.fix(x[0], 1).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(vec![2], cp.values(x[1]));
        assert_eq!(vec![3], cp.values(x[2]));
    }

    #[test]
    fn removal_propagated_in_a_popped_level_is_not_forgotten() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2, 3, 4]),
            cp.new_var_from_values(&[2, 3, 4]),
            cp.new_var_from_values(&[2, 3]),
            cp.new_var_from_values(&[1, 2, 3]),
        ];
        let handle = AllDifferent::new(x.clone()).post_global(&mut cp).unwrap();
        assert!(cp.fixpoint().is_ok());

        assert!(cp.remove(x[1], 4).is_ok());
        cp.save_state();
        assert!(cp.fixpoint().is_ok());
        cp.restore_state();

        cp.save_state();
        assert!(cp.fix(x[3], 1).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(vec![4], cp.values(x[0]));
        assert_eq!(vec![2, 3], cp.values(x[1]));
        assert_ne!(Some(4), handle.matched_value(cp.domains(), x[1]));
    }

    #[test]
    fn satisfaction_requires_fixed_and_distinct_values() {
        let mut cp = CpModel::default();
        let x = vec![
            cp.new_var_from_values(&[1, 2]),
            cp.new_var_from_values(&[1, 2]),
        ];
        assert!(cp.install(&AllDifferent::new(x.clone())).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert!(!cp.is_satisfied());

        assert!(cp.fix(x[0], 2).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert!(cp.is_satisfied());
    }
}
