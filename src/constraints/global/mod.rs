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

//! The matching based consistency engine shared by the global constraints.

mod engine;
mod graph;
mod heuristic;
mod matching;
mod reach;
mod scc;

pub use engine::*;
pub use graph::*;
pub use heuristic::*;
pub use matching::*;
pub use reach::*;
pub use scc::*;
