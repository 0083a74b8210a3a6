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

//! Composition with the 3-state ε-matching filter.
//!
//! Product states are triples `(p_a, p_b, f)`:
//! - `f = 0` admits every move: a matched non-ε label, a paired ε move
//!   (A's output ε against B's input ε), or either side's lone ε move.
//! - `f = 1` is entered by A's lone ε-output move and forbids a following
//!   lone ε-input move in B.
//! - `f = 2` is the mirror image.
//!
//! A matched non-ε label resets the filter to 0. Without the filter the
//! product would count every interleaving of the two ε sides separately.

use crate::environment::COMPOSE_STATE_LIMIT;
use crate::errors::FstError;
use crate::semiring;
use crate::types::{MutableFst, EPSILON};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

type PairState = (u32, u32, u8);

struct Product {
    out: MutableFst,
    map: FxHashMap<PairState, u32>,
    queue: VecDeque<PairState>,
}

impl Product {
    fn intern(&mut self, key: PairState) -> Result<u32, FstError> {
        if let Some(&id) = self.map.get(&key) {
            return Ok(id);
        }
        if self.map.len() >= *COMPOSE_STATE_LIMIT {
            return Err(FstError::InvalidState("composition state limit exceeded"));
        }
        let id = self.out.add_state();
        self.map.insert(key, id);
        self.queue.push_back(key);
        Ok(id)
    }
}

/// C = A ∘ B: recognises (x, z) with weight min over y of
/// w_A(x, y) ⊗ w_B(y, z). States are explored reachable-only, emitted in
/// BFS order; either operand without a start yields the empty transducer.
pub fn compose(a: &MutableFst, b: &MutableFst) -> Result<MutableFst, FstError> {
    let mut product = Product {
        out: MutableFst::new(),
        map: FxHashMap::default(),
        queue: VecDeque::new(),
    };
    if !a.has_start() || !b.has_start() {
        return Ok(product.out);
    }

    let start = product.intern((a.start(), b.start(), 0))?;
    product.out.set_start(start)?;

    while let Some(key) = product.queue.pop_front() {
        let (pa, pb, filter) = key;
        let s = product.map[&key];

        let final_weight = semiring::times(a.final_weight(pa), b.final_weight(pb));
        if !semiring::is_zero(final_weight) {
            product.out.set_final(s, final_weight)?;
        }

        for arc_a in a.arcs(pa) {
            if arc_a.olabel != EPSILON {
                for arc_b in b.arcs(pb) {
                    if arc_b.ilabel != arc_a.olabel {
                        continue;
                    }
                    let dst = product.intern((arc_a.nextstate, arc_b.nextstate, 0))?;
                    product.out.add_arc(
                        s,
                        arc_a.ilabel,
                        arc_b.olabel,
                        semiring::times(arc_a.weight, arc_b.weight),
                        dst,
                    )?;
                }
            } else {
                if filter == 0 {
                    for arc_b in b.arcs(pb) {
                        if arc_b.ilabel != EPSILON {
                            continue;
                        }
                        let dst = product.intern((arc_a.nextstate, arc_b.nextstate, 0))?;
                        product.out.add_arc(
                            s,
                            arc_a.ilabel,
                            arc_b.olabel,
                            semiring::times(arc_a.weight, arc_b.weight),
                            dst,
                        )?;
                    }
                }
                if filter != 2 {
                    let dst = product.intern((arc_a.nextstate, pb, 1))?;
                    product
                        .out
                        .add_arc(s, arc_a.ilabel, EPSILON, arc_a.weight, dst)?;
                }
            }
        }

        if filter != 1 {
            for arc_b in b.arcs(pb) {
                if arc_b.ilabel != EPSILON {
                    continue;
                }
                let dst = product.intern((pa, arc_b.nextstate, 2))?;
                product
                    .out
                    .add_arc(s, EPSILON, arc_b.olabel, arc_b.weight, dst)?;
            }
        }
    }

    tracing::debug!(
        states = product.out.num_states(),
        arcs = product.out.total_arcs(),
        "composition complete"
    );
    Ok(product.out)
}
