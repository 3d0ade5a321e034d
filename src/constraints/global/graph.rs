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

//! The support graph is the bipartite variable/value graph on which the
//! matching and the SCC decomposition are computed.
//!
//! Nothing in here is an object graph: variables, values and edges are all
//! dense indices into flat arrays. Each (variable, value) pair found in the
//! initial domains gets one edge id, and the edges of a given value are
//! contiguous. This is what lets the candidate list of a value be a
//! reversible partition over `0..degree(value)`: removing an edge is O(1)
//! and undoing it costs nothing more than restoring a trailed boundary.
//!
//! All the reversible data (partitions, matched values, SCC labels, grounded
//! counts) lives in the state manager. The graph itself is immutable once
//! built, which is why it can be shared with the search guide.

use rustc_hash::FxHashMap;

use crate::prelude::*;

/// Marker used for a variable that is not matched to any value
pub const UNMATCHED: usize = usize::MAX;

/// The bipartite variable/value graph of a global constraint
#[derive(Debug)]
pub struct SupportGraph {
    /// The decision variables (position = local variable index)
    vars: Vec<Variable>,
    /// The values (position = value index)
    values: Vec<isize>,
    /// Maps a value onto its value index
    value_index: FxHashMap<isize, usize>,
    /// Maps a (variable index, value index) pair onto its edge id
    edge_index: FxHashMap<(usize, usize), usize>,

    /// The variable index of each edge
    edge_var: Vec<usize>,
    /// The value index of each edge
    edge_val: Vec<usize>,
    /// The edges of each variable sorted by increasing value index
    var_edges: Vec<Vec<usize>>,
    /// The first edge of each value (the edges of value m are the range
    /// `value_start[m]..value_start[m+1]`)
    value_start: Vec<usize>,

    /// For each value, the partition of its edges that are still valid.
    /// Only open variables are ever in front of the boundary.
    candidates: Vec<ReversiblePartition>,
    /// The variables that are not grounded yet
    open: ReversiblePartition,
    /// The value index matched to each variable (-1 when unmatched)
    mate: Vec<ReversibleInt>,
    /// The SCC label of each variable
    label: Vec<ReversibleInt>,
    /// The number of grounded variables that took each value
    grounded: Vec<ReversibleInt>,
    /// The number of values having at least one open candidate
    live: ReversibleInt,
}

impl SupportGraph {
    /// Builds the graph of the given variables over the given values. Only
    /// the (variable, value) pairs present in the current domains get an edge.
    pub fn new(vars: &[Variable], values: &[isize], domains: &mut DefaultDomainStore) -> Self {
        let value_index = values
            .iter()
            .copied()
            .enumerate()
            .map(|(i, v)| (v, i))
            .collect::<FxHashMap<_, _>>();

        let mut edge_index = FxHashMap::default();
        let mut edge_var = vec![];
        let mut edge_val = vec![];
        let mut var_edges = vec![vec![]; vars.len()];
        let mut value_start = Vec::with_capacity(values.len() + 1);

        for (m, value) in values.iter().copied().enumerate() {
            value_start.push(edge_var.len());
            for (i, var) in vars.iter().copied().enumerate() {
                if domains.contains(var, value) {
                    let e = edge_var.len();
                    edge_var.push(i);
                    edge_val.push(m);
                    var_edges[i].push(e);
                    edge_index.insert((i, m), e);
                }
            }
        }
        value_start.push(edge_var.len());

        let sm = domains.state_manager_mut();
        let candidates = (0..values.len())
            .map(|m| sm.manage_partition(value_start[m + 1] - value_start[m]))
            .collect::<Vec<_>>();
        let open = sm.manage_partition(vars.len());
        let mate = vars.iter().map(|_| sm.manage_int(-1)).collect();
        let label = vars.iter().map(|_| sm.manage_int(0)).collect();
        let grounded = values.iter().map(|_| sm.manage_int(0)).collect();
        let n_live = (0..values.len())
            .filter(|m| value_start[m + 1] > value_start[*m])
            .count();
        let live = sm.manage_int(n_live as isize);

        Self {
            vars: vars.to_vec(),
            values: values.to_vec(),
            value_index,
            edge_index,
            edge_var,
            edge_val,
            var_edges,
            value_start,
            candidates,
            open,
            mate,
            label,
            grounded,
            live,
        }
    }

    // --- STATIC STRUCTURE ---------------------------------------------------
    /// number of variables
    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }
    /// number of values
    pub fn n_values(&self) -> usize {
        self.values.len()
    }
    /// The solver variable at local index `i`
    pub fn variable(&self, i: usize) -> Variable {
        self.vars[i]
    }
    /// All the solver variables
    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }
    /// The value at value index `m`
    pub fn value(&self, m: usize) -> isize {
        self.values[m]
    }
    /// The value index of `value` (if it belongs to the graph)
    pub fn value_index(&self, value: isize) -> Option<usize> {
        self.value_index.get(&value).copied()
    }
    /// The edge id of the pair (variable `i`, value `m`) if it ever existed
    pub fn edge(&self, i: usize, m: usize) -> Option<usize> {
        self.edge_index.get(&(i, m)).copied()
    }
    /// The value index of edge `e`
    pub fn edge_value(&self, e: usize) -> usize {
        self.edge_val[e]
    }
    /// All the edges that ever existed for variable `i`, by increasing value
    /// index
    pub fn var_edges(&self, i: usize) -> &[usize] {
        &self.var_edges[i]
    }

    // --- REVERSIBLE STATE ---------------------------------------------------
    /// true iff variable `i` is not grounded yet
    pub fn is_open(&self, sm: &TrailedStateManager, i: usize) -> bool {
        sm.partition_contains(self.open, i)
    }
    /// the open variables (in no particular order)
    pub fn open_vars<'a>(&self, sm: &'a TrailedStateManager) -> &'a [usize] {
        sm.partition_valid(self.open)
    }
    /// true iff edge `e` is still valid
    pub fn has_edge(&self, sm: &TrailedStateManager, e: usize) -> bool {
        let m = self.edge_val[e];
        sm.partition_contains(self.candidates[m], e - self.value_start[m])
    }
    /// The open variables that still admit value `m`
    pub fn candidates<'a>(
        &'a self,
        sm: &'a TrailedStateManager,
        m: usize,
    ) -> impl DoubleEndedIterator<Item = usize> + 'a {
        let start = self.value_start[m];
        sm.partition_valid(self.candidates[m])
            .iter()
            .map(move |pos| self.edge_var[start + pos])
    }
    /// The number of open variables that still admit value `m`
    pub fn n_candidates(&self, sm: &TrailedStateManager, m: usize) -> usize {
        sm.partition_boundary(self.candidates[m])
    }
    /// The value indices still admitted by variable `i`
    pub fn candidate_values<'a>(
        &'a self,
        sm: &'a TrailedStateManager,
        i: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        self.var_edges[i]
            .iter()
            .copied()
            .filter(move |e| self.has_edge(sm, *e))
            .map(move |e| self.edge_val[e])
    }
    /// The value index matched to variable `i` (or `UNMATCHED`)
    pub fn mate(&self, sm: &TrailedStateManager, i: usize) -> usize {
        let m = sm.get_int(self.mate[i]);
        if m < 0 {
            UNMATCHED
        } else {
            m as usize
        }
    }
    /// Records the value index matched to variable `i`
    pub fn set_mate(&self, sm: &mut TrailedStateManager, i: usize, m: usize) {
        let m = if m == UNMATCHED { -1 } else { m as isize };
        sm.set_int(self.mate[i], m);
    }
    /// The SCC label of variable `i`
    pub fn label(&self, sm: &TrailedStateManager, i: usize) -> isize {
        sm.get_int(self.label[i])
    }
    /// Records the SCC label of variable `i`
    pub fn set_label(&self, sm: &mut TrailedStateManager, i: usize, label: isize) {
        sm.set_int(self.label[i], label);
    }
    /// The number of grounded variables that took value `m`
    pub fn grounded(&self, sm: &TrailedStateManager, m: usize) -> isize {
        sm.get_int(self.grounded[m])
    }
    /// The number of values that still have an open candidate
    pub fn live_values(&self, sm: &TrailedStateManager) -> usize {
        sm.get_int(self.live) as usize
    }

    /// Invalidates edge `e`. Returns true iff the edge was valid
    pub fn remove_edge(&self, sm: &mut TrailedStateManager, e: usize) -> bool {
        let m = self.edge_val[e];
        let removed = sm.partition_remove(self.candidates[m], e - self.value_start[m]);
        if removed && sm.partition_boundary(self.candidates[m]) == 0 {
            sm.decrement(self.live);
        }
        removed
    }
    /// Moves variable `i` past the open boundary: it leaves every candidate
    /// list and counts as one of the grounded consumers of value `m`.
    pub fn ground(&self, sm: &mut TrailedStateManager, i: usize, m: usize) {
        if sm.partition_remove(self.open, i) {
            for e in self.var_edges[i].iter().copied() {
                self.remove_edge(sm, e);
            }
            sm.increment(self.grounded[m]);
        }
    }
}

#[cfg(test)]
mod test_support_graph {
    use crate::prelude::*;

    use super::{SupportGraph, UNMATCHED};

    fn build(doms: &[&[isize]]) -> (DefaultDomainStore, SupportGraph) {
        let mut ds = DefaultDomainStore::default();
        let vars = doms
            .iter()
            .map(|d| ds.new_var_from_values(d))
            .collect::<Vec<_>>();
        let values = vec![1, 2, 3, 4];
        let g = SupportGraph::new(&vars, &values, &mut ds);
        (ds, g)
    }

    #[test]
    fn edges_of_a_value_are_the_variables_admitting_it() {
        let (ds, g) = build(&[&[1, 2], &[2, 3], &[2, 4]]);
        let sm = ds.state_manager();

        let mut cands = g.candidates(sm, 1).collect::<Vec<_>>();
        cands.sort_unstable();
        assert_eq!(vec![0, 1, 2], cands);
        assert_eq!(1, g.n_candidates(sm, 2));
        assert_eq!(vec![1, 3], g.candidate_values(sm, 2).collect::<Vec<_>>());
        assert_eq!(None, g.edge(0, 2));
        assert_eq!(4, g.live_values(sm));
    }

    #[test]
    fn removing_the_last_edge_of_a_value_kills_it() {
        let (mut ds, g) = build(&[&[1, 2], &[2, 3], &[2, 4]]);
        let e = g.edge(2, 3).unwrap();

        ds.save_state();
        assert!(g.remove_edge(ds.state_manager_mut(), e));
        assert!(!g.remove_edge(ds.state_manager_mut(), e));
        assert_eq!(3, g.live_values(ds.state_manager()));
        assert!(!g.has_edge(ds.state_manager(), e));

        ds.restore_state();
        assert_eq!(4, g.live_values(ds.state_manager()));
        assert!(g.has_edge(ds.state_manager(), e));
    }

    #[test]
    fn grounding_removes_the_variable_from_every_list() {
        let (mut ds, g) = build(&[&[1, 2], &[2, 3], &[2, 4]]);

        ds.save_state();
        g.ground(ds.state_manager_mut(), 1, 2);
        let sm = ds.state_manager();
        assert!(!g.is_open(sm, 1));
        assert_eq!(2, g.n_candidates(sm, 1));
        assert_eq!(0, g.n_candidates(sm, 2));
        assert_eq!(1, g.grounded(sm, 2));
        assert_eq!(2, g.open_vars(sm).len());

        ds.restore_state();
        let sm = ds.state_manager();
        assert!(g.is_open(sm, 1));
        assert_eq!(0, g.grounded(sm, 2));
        assert_eq!(3, g.n_candidates(sm, 1));
    }

    #[test]
    fn mate_and_labels_are_trailed() {
        let (mut ds, g) = build(&[&[1, 2], &[2, 3]]);
        assert_eq!(UNMATCHED, g.mate(ds.state_manager(), 0));

        ds.save_state();
        g.set_mate(ds.state_manager_mut(), 0, 1);
        g.set_label(ds.state_manager_mut(), 0, 7);
        assert_eq!(1, g.mate(ds.state_manager(), 0));
        assert_eq!(7, g.label(ds.state_manager(), 0));

        ds.restore_state();
        assert_eq!(UNMATCHED, g.mate(ds.state_manager(), 0));
        assert_eq!(0, g.label(ds.state_manager(), 0));
    }
}
