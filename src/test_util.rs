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

//! Shared assertions for algorithm tests: tropical path weights for a given
//! input string (or input/output pair), computed by brute-force relaxation
//! so the expected values are independent of the code under test.

use crate::semiring;
use crate::types::{MutableFst, EPSILON};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Minimum weight over accepting paths whose non-ε input labels spell
/// `input`, output side ignored. +∞ when no such path exists.
pub(crate) fn string_weight(fst: &MutableFst, input: &[u32]) -> f64 {
    if !fst.has_start() {
        return semiring::ZERO;
    }
    let mut dist: FxHashMap<(u32, usize), f64> = FxHashMap::default();
    let mut queue: VecDeque<(u32, usize)> = VecDeque::new();
    dist.insert((fst.start(), 0), semiring::ONE);
    queue.push_back((fst.start(), 0));

    while let Some(key) = queue.pop_front() {
        let (state, pos) = key;
        let d = dist[&key];
        for arc in fst.arcs(state) {
            let next_pos = if arc.ilabel == EPSILON {
                pos
            } else if pos < input.len() && input[pos] == arc.ilabel {
                pos + 1
            } else {
                continue;
            };
            let nd = semiring::times(d, arc.weight);
            let entry = dist
                .entry((arc.nextstate, next_pos))
                .or_insert(semiring::ZERO);
            if nd < *entry {
                *entry = nd;
                queue.push_back((arc.nextstate, next_pos));
            }
        }
    }

    let mut best = semiring::ZERO;
    for state in 0..fst.num_states() {
        if let Some(&d) = dist.get(&(state, input.len())) {
            best = semiring::plus(best, semiring::times(d, fst.final_weight(state)));
        }
    }
    best
}

/// Minimum weight over accepting paths spelling `input` on the input side
/// and `output` on the output side. +∞ when no such path exists.
pub(crate) fn pair_weight(fst: &MutableFst, input: &[u32], output: &[u32]) -> f64 {
    if !fst.has_start() {
        return semiring::ZERO;
    }
    let mut dist: FxHashMap<(u32, usize, usize), f64> = FxHashMap::default();
    let mut queue: VecDeque<(u32, usize, usize)> = VecDeque::new();
    dist.insert((fst.start(), 0, 0), semiring::ONE);
    queue.push_back((fst.start(), 0, 0));

    while let Some(key) = queue.pop_front() {
        let (state, ipos, opos) = key;
        let d = dist[&key];
        for arc in fst.arcs(state) {
            let next_ipos = if arc.ilabel == EPSILON {
                ipos
            } else if ipos < input.len() && input[ipos] == arc.ilabel {
                ipos + 1
            } else {
                continue;
            };
            let next_opos = if arc.olabel == EPSILON {
                opos
            } else if opos < output.len() && output[opos] == arc.olabel {
                opos + 1
            } else {
                continue;
            };
            let nd = semiring::times(d, arc.weight);
            let entry = dist
                .entry((arc.nextstate, next_ipos, next_opos))
                .or_insert(semiring::ZERO);
            if nd < *entry {
                *entry = nd;
                queue.push_back((arc.nextstate, next_ipos, next_opos));
            }
        }
    }

    let mut best = semiring::ZERO;
    for state in 0..fst.num_states() {
        if let Some(&d) = dist.get(&(state, input.len(), output.len())) {
            best = semiring::plus(best, semiring::times(d, fst.final_weight(state)));
        }
    }
    best
}

pub(crate) fn accepts(fst: &MutableFst, input: &[u32]) -> bool {
    !semiring::is_zero(string_weight(fst, input))
}

/// Linear acceptor for a label sequence, weight 1̄ throughout.
pub(crate) fn acceptor(labels: &[u32]) -> MutableFst {
    let mut fst = MutableFst::new();
    let mut prev = fst.add_state();
    fst.set_start(prev).unwrap();
    for &label in labels {
        let next = fst.add_state();
        fst.add_arc(prev, label, label, semiring::ONE, next).unwrap();
        prev = next;
    }
    fst.set_final(prev, semiring::ONE).unwrap();
    fst
}
