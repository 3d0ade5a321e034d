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

//! A lean finite domain constraint solver core whose main feature is the
//! matching based global consistency engine behind the domain consistent
//! all different and global cardinality constraints.
//!
//! All the reversible state (domains, matchings, component labels) lives in
//! a trailed state manager, which makes backtracking a matter of restoring
//! the trail.
//!
//! ```
//! use regin_cp::prelude::*;
//!
//! let mut cp = CpModel::default();
//! let x = vec![
//!     cp.new_var_from_values(&[1, 2]),
//!     cp.new_var_from_values(&[1, 2]),
//!     cp.new_var_from_values(&[1, 2, 3]),
//! ];
//! cp.install(&AllDifferent::new(x.clone())).unwrap();
//! cp.fixpoint().unwrap();
//! assert_eq!(Some(3), cp.value(x[2]));
//! ```

#![warn(missing_docs)]

pub mod constraints;
mod engine;
mod state;

pub use constraints::*;
pub use engine::*;
pub use state::*;

/// Everything one needs to build and solve a model
pub mod prelude {
    pub use crate::constraints::global::{EngineHandle, EngineOptions, EngineStatistics};
    pub use crate::constraints::{AllDifferent, Consistency, GlobalCardinality, ModelError, NotEqualVar};
    pub use crate::engine::*;
    pub use crate::state::*;
}
