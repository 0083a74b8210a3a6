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

//! Byte strings as linear chain transducers, and the inverse extraction.

use crate::semiring;
use crate::types::{MutableFst, EPSILON};
use fixedbitset::FixedBitSet;

/// Chain of `len + 1` states with one `b:b` weight-1̄ arc per byte; state 0
/// is the start and the last state is final with weight 1̄.
pub fn compile_string(input: &[u8]) -> MutableFst {
    let mut fst = MutableFst::new();
    let mut prev = fst.add_state();
    fst.start = prev;
    for &byte in input {
        let next = fst.add_state();
        fst.states[prev as usize].arcs.push(crate::types::FstArc::new(
            byte as u32,
            byte as u32,
            semiring::ONE,
            next,
        ));
        prev = next;
    }
    fst.states[prev as usize].final_weight = semiring::ONE;
    fst
}

/// Extracts the unique byte string along a linear chain.
///
/// Returns `None` unless the transducer is a single non-branching path of
/// identity byte labels from the start to a final state: branching, ε
/// labels, labels above 255, output differing from input, or a cycle all
/// disqualify it.
pub fn print_string(fst: &MutableFst) -> Option<Vec<u8>> {
    if !fst.has_start() {
        return None;
    }
    let mut bytes = Vec::new();
    let mut visited = FixedBitSet::with_capacity(fst.num_states() as usize);
    let mut state = fst.start();

    loop {
        if visited.contains(state as usize) {
            return None;
        }
        visited.insert(state as usize);

        let arcs = fst.arcs(state);
        if arcs.is_empty() {
            return fst.is_final(state).then_some(bytes);
        }
        if arcs.len() > 1 || fst.is_final(state) {
            return None;
        }
        let arc = arcs[0];
        if arc.ilabel == EPSILON || arc.ilabel > u8::MAX as u32 || arc.olabel != arc.ilabel {
            return None;
        }
        bytes.push(arc.ilabel as u8);
        state = arc.nextstate;
    }
}
