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

//! This module computes the strongly connected components of the graph
//! induced by a matching on the open variables. There is an arc `x -> y`
//! whenever `y` still admits the value matched to `x` while being matched
//! to some other value. Two variables share a label iff they lie on a common
//! alternating cycle.
//!
//! Labels are drawn from a monotone sequence owned by the analyzer. Because
//! that sequence never goes back, a fresh label can never collide with one
//! that the trail restored after a backtrack.
//!
//! When the matching has not changed since the labels were computed, the
//! graph can only have lost arcs and nodes, and a component can only split.
//! The incremental pass therefore recomputes the components of the labels
//! that were touched and leaves every other label untouched.

use rustc_hash::FxHashSet;

use crate::prelude::*;

use super::SupportGraph;

/// Marker of a node which was not visited yet
const UNSET: usize = usize::MAX;

/// Workspace of the (iterative) Tarjan algorithm
#[derive(Debug, Clone)]
pub struct SccAnalyzer {
    /// the next label to hand out
    next_label: isize,
    /// local position of each variable in the current run
    pos: Vec<usize>,
    /// the nodes of the current run
    nodes: Vec<usize>,
    /// adjacency (csr) of the current run
    start: Vec<usize>,
    adj: Vec<usize>,
    /// tarjan bookkeeping
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    call: Vec<(usize, usize)>,
}

impl SccAnalyzer {
    /// Creates an analyzer for a graph of `n` variables
    pub fn new(n: usize) -> Self {
        Self {
            next_label: 1,
            pos: vec![UNSET; n],
            nodes: vec![],
            start: vec![],
            adj: vec![],
            index: vec![],
            lowlink: vec![],
            on_stack: vec![],
            stack: vec![],
            call: vec![],
        }
    }

    /// Relabels all open variables. Returns the number of components.
    pub fn from_scratch(
        &mut self,
        graph: &SupportGraph,
        sm: &mut TrailedStateManager,
        mate: &[usize],
    ) -> usize {
        let nodes = graph.open_vars(sm).to_vec();
        self.run(graph, sm, mate, nodes, false)
    }

    /// Relabels the open variables whose label is one of `dirty`, without
    /// ever leaving the component they used to be part of. Returns the
    /// number of components found.
    pub fn revisit(
        &mut self,
        graph: &SupportGraph,
        sm: &mut TrailedStateManager,
        mate: &[usize],
        dirty: &[isize],
    ) -> usize {
        let dirty = dirty.iter().copied().collect::<FxHashSet<_>>();
        let nodes = graph
            .open_vars(sm)
            .iter()
            .copied()
            .filter(|i| dirty.contains(&graph.label(sm, *i)))
            .collect::<Vec<_>>();
        self.run(graph, sm, mate, nodes, true)
    }

    /// Runs tarjan on the given nodes
    fn run(
        &mut self,
        graph: &SupportGraph,
        sm: &mut TrailedStateManager,
        mate: &[usize],
        nodes: Vec<usize>,
        same_label_only: bool,
    ) -> usize {
        self.nodes = nodes;
        self.build_adjacency(graph, sm, mate, same_label_only);

        let k = self.nodes.len();
        self.index.clear();
        self.index.resize(k, UNSET);
        self.lowlink.clear();
        self.lowlink.resize(k, 0);
        self.on_stack.clear();
        self.on_stack.resize(k, false);
        self.stack.clear();
        self.call.clear();

        let mut counter = 0;
        let mut components = 0;
        for root in 0..k {
            if self.index[root] != UNSET {
                continue;
            }
            self.open(root, &mut counter);

            while let Some((v, cursor)) = self.call.last().copied() {
                if cursor < self.start[v + 1] {
                    if let Some(c) = self.call.last_mut() {
                        c.1 += 1;
                    }
                    let w = self.adj[cursor];
                    if self.index[w] == UNSET {
                        self.open(w, &mut counter);
                    } else if self.on_stack[w] {
                        self.lowlink[v] = self.lowlink[v].min(self.index[w]);
                    }
                } else {
                    self.call.pop();
                    if let Some((parent, _)) = self.call.last().copied() {
                        self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
                    }
                    if self.lowlink[v] == self.index[v] {
                        let label = self.next_label;
                        self.next_label += 1;
                        components += 1;
                        while let Some(w) = self.stack.pop() {
                            self.on_stack[w] = false;
                            graph.set_label(sm, self.nodes[w], label);
                            if w == v {
                                break;
                            }
                        }
                    }
                }
            }
        }

        for i in self.nodes.iter().copied() {
            self.pos[i] = UNSET;
        }
        components
    }

    /// Starts the visit of local node `v`
    fn open(&mut self, v: usize, counter: &mut usize) {
        self.index[v] = *counter;
        self.lowlink[v] = *counter;
        *counter += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
        self.call.push((v, self.start[v]));
    }

    /// Computes the successors of every node of the run
    fn build_adjacency(
        &mut self,
        graph: &SupportGraph,
        sm: &TrailedStateManager,
        mate: &[usize],
        same_label_only: bool,
    ) {
        for (p, i) in self.nodes.iter().copied().enumerate() {
            self.pos[i] = p;
        }
        self.start.clear();
        self.adj.clear();
        for x in self.nodes.iter().copied() {
            self.start.push(self.adj.len());
            let m = mate[x];
            let lx = graph.label(sm, x);
            for y in graph.candidates(sm, m) {
                if mate[y] == m || self.pos[y] == UNSET {
                    continue;
                }
                if same_label_only && graph.label(sm, y) != lx {
                    continue;
                }
                self.adj.push(self.pos[y]);
            }
        }
        self.start.push(self.adj.len());
    }
}
