// Copyright 2024 Nathan Hoos
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Non-recursive replacement of nonterminal labels.
//!
//! Every arc whose input label is a registered nonterminal is rewritten
//! into an ε-entering arc (keeping the original output label and weight)
//! onto a spliced copy of the referenced transducer; the copy's final
//! states are demoted and return to the arc's old destination by ε:ε arcs
//! carrying their final weights. Referenced transducers are expanded
//! depth-first; a nonterminal that reappears while it is still being
//! expanded is a cycle and fails with `INVALID_STATE`.

use crate::errors::FstError;
use crate::semiring;
use crate::types::{FstArc, MutableFst, EPSILON};
use rustc_hash::{FxHashMap, FxHashSet};

struct Expander<'a> {
    table: FxHashMap<u32, &'a MutableFst>,
    memo: FxHashMap<u32, MutableFst>,
    active: FxHashSet<u32>,
}

impl<'a> Expander<'a> {
    /// Fully expanded (nonterminal-free) version of the transducer bound
    /// to `label`, memoised so DAG-shaped references expand once.
    fn expand_label(&mut self, label: u32) -> Result<MutableFst, FstError> {
        if let Some(done) = self.memo.get(&label) {
            return Ok(done.clone());
        }
        if !self.active.insert(label) {
            return Err(FstError::InvalidState(
                "recursive nonterminal replacement",
            ));
        }
        let referenced = self.table[&label];
        let expanded = self.expand_fst(referenced);
        self.active.remove(&label);
        let expanded = expanded?;
        self.memo.insert(label, expanded.clone());
        Ok(expanded)
    }

    fn expand_fst(&mut self, fst: &MutableFst) -> Result<MutableFst, FstError> {
        let mut out = fst.clone();
        // Spliced-in states are already nonterminal-free, so only the
        // original states need scanning.
        let original_states = out.num_states();
        for s in 0..original_states {
            let arcs: Vec<FstArc> = out.states[s as usize].arcs.to_vec();
            let mut rebuilt: Vec<FstArc> = Vec::with_capacity(arcs.len());
            for arc in arcs {
                if !self.table.contains_key(&arc.ilabel) {
                    rebuilt.push(arc);
                    continue;
                }
                let sub = self.expand_label(arc.ilabel)?;
                if !sub.has_start() {
                    // The nonterminal derives ∅; the arc vanishes.
                    continue;
                }
                let delta = out.num_states();
                for state in &sub.states {
                    let mut copied = state.clone();
                    for sub_arc in copied.arcs.iter_mut() {
                        sub_arc.nextstate += delta;
                    }
                    out.states.push(copied);
                }
                for sub_state in 0..sub.num_states() {
                    let spliced = sub_state + delta;
                    let weight = out.states[spliced as usize].final_weight;
                    if semiring::is_zero(weight) {
                        continue;
                    }
                    out.states[spliced as usize].final_weight = semiring::ZERO;
                    out.states[spliced as usize].arcs.push(FstArc::new(
                        EPSILON,
                        EPSILON,
                        weight,
                        arc.nextstate,
                    ));
                }
                rebuilt.push(FstArc::new(
                    EPSILON,
                    arc.olabel,
                    arc.weight,
                    sub.start() + delta,
                ));
            }
            out.states[s as usize].arcs = rebuilt.into();
        }
        Ok(out)
    }
}

/// Expands `root` against the `(nonterminal, transducer)` bindings.
pub fn replace(
    root: &MutableFst,
    pairs: &[(u32, &MutableFst)],
) -> Result<MutableFst, FstError> {
    let mut table: FxHashMap<u32, &MutableFst> = FxHashMap::default();
    for &(label, fst) in pairs {
        if label == EPSILON {
            return Err(FstError::InvalidArg("epsilon cannot be a nonterminal"));
        }
        if table.insert(label, fst).is_some() {
            return Err(FstError::InvalidArg("duplicate nonterminal label"));
        }
    }
    let mut expander = Expander {
        table,
        memo: FxHashMap::default(),
        active: FxHashSet::default(),
    };
    expander.expand_fst(root)
}
