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

//! Rational operations that rearrange a single graph: invert, project,
//! union, concatenation, closure.

use crate::semiring;
use crate::types::{ClosureType, FstArc, MutableFst, ProjectType, EPSILON, NO_STATE};
use std::mem;

/// Swaps input and output labels on every arc, in place.
pub fn invert(fst: &mut MutableFst) {
    for state in fst.states.iter_mut() {
        for arc in state.arcs.iter_mut() {
            mem::swap(&mut arc.ilabel, &mut arc.olabel);
        }
    }
}

/// Copies one label side onto the other, turning the transducer into an
/// acceptor of the chosen side. In place.
pub fn project(fst: &mut MutableFst, side: ProjectType) {
    for state in fst.states.iter_mut() {
        for arc in state.arcs.iter_mut() {
            match side {
                ProjectType::Input => arc.olabel = arc.ilabel,
                ProjectType::Output => arc.ilabel = arc.olabel,
            }
        }
    }
}

/// Appends `b`'s states into `a`, renumbered by `|a|`, and returns the
/// offset. Final weights travel with the states; arcs are retargeted.
pub(crate) fn splice_states(a: &mut MutableFst, b: &MutableFst) -> u32 {
    let delta = a.num_states();
    for state in &b.states {
        let mut copied = state.clone();
        for arc in copied.arcs.iter_mut() {
            arc.nextstate += delta;
        }
        a.states.push(copied);
    }
    delta
}

/// A ← A ∪ B. A fresh start state fans out by ε:ε weight-1̄ arcs to both
/// operands' old starts; an operand with no start contributes ∅.
pub fn union(a: &mut MutableFst, b: &MutableFst) {
    let delta = splice_states(a, b);
    let old_start = a.start();
    let new_start = a.add_state();
    if old_start != NO_STATE {
        a.states[new_start as usize].arcs.push(FstArc::new(
            EPSILON,
            EPSILON,
            semiring::ONE,
            old_start,
        ));
    }
    if b.has_start() {
        a.states[new_start as usize].arcs.push(FstArc::new(
            EPSILON,
            EPSILON,
            semiring::ONE,
            b.start() + delta,
        ));
    }
    a.start = new_start;
}

/// A ← A · B. Every final state of A is demoted and glued to B's start by
/// an ε:ε arc carrying its old final weight. When B has no start the glue
/// arcs are skipped and the result accepts nothing.
pub fn concat(a: &mut MutableFst, b: &MutableFst) {
    let old_len = a.num_states();
    let delta = splice_states(a, b);
    let b_start = if b.has_start() {
        Some(b.start() + delta)
    } else {
        None
    };
    for s in 0..old_len {
        let weight = a.states[s as usize].final_weight;
        if semiring::is_zero(weight) {
            continue;
        }
        a.states[s as usize].final_weight = semiring::ZERO;
        if let Some(target) = b_start {
            a.states[s as usize]
                .arcs
                .push(FstArc::new(EPSILON, EPSILON, weight, target));
        }
    }
}

/// Kleene closure, in place.
///
/// - `Plus`: every final state loops back to the start by ε:ε, weighted by
///   its final weight.
/// - `Star`: as `Plus`, then a fresh final start (weight 1̄) with an ε:ε
///   arc to the old start, so ε is accepted.
/// - `Question`: only the fresh final start, no loops: ε ∪ L.
pub fn closure(fst: &mut MutableFst, kind: ClosureType) {
    let old_start = fst.start();

    if matches!(kind, ClosureType::Star | ClosureType::Plus)
        && old_start != NO_STATE
    {
        let finals: Vec<(u32, f64)> = (0..fst.num_states())
            .filter_map(|s| {
                let w = fst.final_weight(s);
                (!semiring::is_zero(w)).then_some((s, w))
            })
            .collect();
        for (s, w) in finals {
            fst.states[s as usize]
                .arcs
                .push(FstArc::new(EPSILON, EPSILON, w, old_start));
        }
    }

    if matches!(kind, ClosureType::Star | ClosureType::Question) {
        let new_start = fst.add_state();
        fst.states[new_start as usize].final_weight = semiring::ONE;
        if old_start != NO_STATE {
            fst.states[new_start as usize].arcs.push(FstArc::new(
                EPSILON,
                EPSILON,
                semiring::ONE,
                old_start,
            ));
        }
        fst.start = new_start;
    }
}
