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

//! This module provides the implementation of the constraints. The 'global'
//! submodule hosts the matching based engine which is shared by the all
//! different and the global cardinality constraints.

pub mod global;

mod alldiff;
mod gcc;
mod not_equal;

pub use alldiff::*;
pub use gcc::*;
pub use not_equal::*;
