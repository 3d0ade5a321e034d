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

//! A branching heuristic guided by the matching of a global constraint: it
//! picks the unfixed variable with the fewest candidates (ties broken by the
//! size of its strongly connected component, then by position) and proposes
//! the value it is currently matched to.

use rustc_hash::FxHashMap;

use crate::prelude::*;

use super::{SupportGraph, UNMATCHED};

/// What the heuristic knows about one unfixed variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// the variable
    pub variable: Variable,
    /// its position in the constraint
    pub position: usize,
    /// how many values it still admits
    pub candidates: usize,
    /// the value it is matched to (if that value is still in its domain)
    pub matched: Option<isize>,
    /// its SCC label
    pub label: isize,
    /// the smallest value in its domain
    pub min_value: isize,
}

/// A frozen picture of the matching. It is pure data: deciding from it does
/// not need access to the engine anymore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingSnapshot {
    /// one entry per unfixed open variable, by increasing position
    pub entries: Vec<SnapshotEntry>,
}

impl MatchingSnapshot {
    /// Reads the current matching from the trail
    pub fn capture(graph: &SupportGraph, domains: &DefaultDomainStore) -> Self {
        let sm = domains.state_manager();
        let mut open = graph.open_vars(sm).to_vec();
        open.sort_unstable();

        let entries = open
            .into_iter()
            .filter_map(|i| {
                let variable = graph.variable(i);
                let candidates = domains.size(variable);
                if candidates <= 1 {
                    return None;
                }
                let m = graph.mate(sm, i);
                let matched = Some(m)
                    .filter(|m| *m != UNMATCHED)
                    .map(|m| graph.value(m))
                    .filter(|v| domains.contains(variable, *v));
                Some(SnapshotEntry {
                    variable,
                    position: i,
                    candidates,
                    matched,
                    label: graph.label(sm, i),
                    min_value: domains.min(variable)?,
                })
            })
            .collect();
        Self { entries }
    }
}

/// Picks the variable to branch on and the value to try first. Returns None
/// when every variable of the snapshot is fixed.
pub fn guided_choice(snapshot: &MatchingSnapshot) -> Option<(Variable, isize)> {
    let mut scc_size: FxHashMap<isize, usize> = FxHashMap::default();
    for e in snapshot.entries.iter() {
        *scc_size.entry(e.label).or_insert(0) += 1;
    }
    snapshot
        .entries
        .iter()
        .min_by_key(|e| (e.candidates, scc_size[&e.label], e.position))
        .map(|e| (e.variable, e.matched.unwrap_or(e.min_value)))
}

#[cfg(test)]
mod test_heuristic {
    use crate::prelude::*;

    use super::{guided_choice, MatchingSnapshot, SnapshotEntry};

    fn entry(ds: &mut DefaultDomainStore, position: usize, candidates: usize, label: isize) -> SnapshotEntry {
        SnapshotEntry {
            variable: ds.new_int_var(0, 9),
            position,
            candidates,
            matched: Some(position as isize),
            label,
            min_value: 0,
        }
    }

    #[test]
    fn nothing_to_choose_from_an_empty_snapshot() {
        assert_eq!(None, guided_choice(&MatchingSnapshot::default()));
    }

    #[test]
    fn fewest_candidates_first() {
        let mut ds = DefaultDomainStore::default();
        let entries = vec![entry(&mut ds, 0, 3, 1), entry(&mut ds, 1, 2, 1), entry(&mut ds, 2, 4, 2)];
        let expected = (entries[1].variable, 1);
        assert_eq!(Some(expected), guided_choice(&MatchingSnapshot { entries }));
    }

    #[test]
    fn smaller_components_break_ties() {
        let mut ds = DefaultDomainStore::default();
        let entries = vec![
            entry(&mut ds, 0, 2, 1),
            entry(&mut ds, 1, 2, 1),
            entry(&mut ds, 2, 2, 5),
        ];
        let expected = (entries[2].variable, 2);
        assert_eq!(Some(expected), guided_choice(&MatchingSnapshot { entries }));
    }

    #[test]
    fn falls_back_on_the_minimum_when_unmatched() {
        let mut ds = DefaultDomainStore::default();
        let mut e = entry(&mut ds, 0, 2, 1);
        e.matched = None;
        e.min_value = 7;
        let expected = (e.variable, 7);
        assert_eq!(Some(expected), guided_choice(&MatchingSnapshot { entries: vec![e] }));
    }
}
