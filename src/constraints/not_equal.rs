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

//! This module provides the implementation of the binary difference
//! constraint. It is the building block of the (weaker) value consistent
//! all different.

use crate::prelude::*;
use crate::DomainCondition::IsFixed;

/// This constraint enforce that a variable take a different value from another
/// x != y
#[derive(Debug, Clone, Copy)]
pub struct NotEqualVar {
    x: Variable,
    y: Variable,
}
impl NotEqualVar {
    /// Creates a not equal modeling construct
    pub fn new(x: Variable, y: Variable) -> Self {
        Self { x, y }
    }
}
impl ModelingConstruct for NotEqualVar {
    fn install(&self, cp: &mut CpModel) -> CPResult<()> {
        let x_fixed = cp.post(Box::new(Self::forward(self.x, self.y)));
        let y_fixed = cp.post(Box::new(Self::forward(self.y, self.x)));

        cp.propagate_on(x_fixed, IsFixed(self.x));
        cp.propagate_on(y_fixed, IsFixed(self.y));
        // either of them might already be fixed
        cp.schedule(x_fixed);
        cp.schedule(y_fixed);
        Ok(())
    }
}
impl NotEqualVar {
    /// Removes the value of `from` (once it is fixed) from the domain of `to`
    fn forward(from: Variable, to: Variable) -> impl Propagator {
        move |dom: &mut DefaultDomainStore| match dom.value(from) {
            Some(v) => dom.remove(to, v),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test_notequal_var {
    use crate::prelude::*;

    #[test]
    fn x_propagates_to_y() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 10);
        let y = cp.new_int_var(0, 10);

        assert!(cp.install(&NotEqualVar::new(x, y)).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert_eq!(11, cp.size(x));
        assert_eq!(11, cp.size(y));

        assert!(cp.fix(x, 6).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert!(!cp.contains(y, 6));
    }

    #[test]
    fn y_propagates_to_x() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(0, 10);
        let y = cp.new_int_var(0, 10);

        assert!(cp.install(&NotEqualVar::new(x, y)).is_ok());
        assert!(cp.fixpoint().is_ok());

        assert!(cp.fix(y, 6).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert!(!cp.contains(x, 6));
    }

    #[test]
    fn already_fixed_variables_propagate_on_install() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(3, 3);
        let y = cp.new_int_var(0, 5);

        assert!(cp.install(&NotEqualVar::new(x, y)).is_ok());
        assert!(cp.fixpoint().is_ok());
        assert!(!cp.contains(y, 3));
    }

    #[test]
    fn equal_singletons_fail() {
        let mut cp = CpModel::default();
        let x = cp.new_int_var(3, 3);
        let y = cp.new_int_var(3, 3);

        assert!(cp.install(&NotEqualVar::new(x, y)).is_ok());
        assert_eq!(Err(Inconsistency), cp.fixpoint());
    }
}
