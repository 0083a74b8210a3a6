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

//! Weighted subset construction.
//!
//! A subset is a canonical (state-sorted) list of `(state, residual)`
//! pairs. Moving a subset over an input label gathers every matching arc,
//! factors out the common divisor W = ⊕ of the accumulated weights, and
//! leaves the per-state remainders as the next subset's residuals; W
//! becomes the emitted arc's weight. Subsets are hash-consed by exact
//! residual bit patterns, so determinizable inputs converge and divergent
//! ones trip the state limit.
//!
//! Arcs are consumed one label at a time, so a (subset, input label) group
//! must agree on a single output label; disagreement is non-functional
//! input and fails with `INVALID_STATE`.

use crate::environment::DETERMINIZE_STATE_LIMIT;
use crate::errors::FstError;
use crate::semiring;
use crate::types::MutableFst;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

type Subset = Vec<(u32, f64)>;
type SubsetKey = Vec<(u32, u64)>;

struct Builder {
    out: MutableFst,
    map: FxHashMap<SubsetKey, u32>,
    subsets: Vec<Subset>,
    queue: VecDeque<u32>,
}

impl Builder {
    fn intern(&mut self, subset: Subset) -> Result<u32, FstError> {
        let key: SubsetKey = subset
            .iter()
            .map(|&(state, residual)| (state, semiring::weight_key(residual)))
            .collect();
        if let Some(&id) = self.map.get(&key) {
            return Ok(id);
        }
        if self.subsets.len() >= *DETERMINIZE_STATE_LIMIT {
            return Err(FstError::InvalidState(
                "determinization diverged past the subset limit",
            ));
        }
        let id = self.out.add_state();
        self.map.insert(key, id);
        self.subsets.push(subset);
        self.queue.push_back(id);
        Ok(id)
    }
}

/// Produces an equivalent transducer whose states have at most one out-arc
/// per input label. Fails with `INVALID_STATE` on non-functional input or
/// unbounded residual divergence.
pub fn determinize(fst: &MutableFst) -> Result<MutableFst, FstError> {
    let mut builder = Builder {
        out: MutableFst::new(),
        map: FxHashMap::default(),
        subsets: Vec::new(),
        queue: VecDeque::new(),
    };
    if !fst.has_start() {
        return Ok(builder.out);
    }

    let start = builder.intern(vec![(fst.start(), semiring::ONE)])?;
    builder.out.set_start(start)?;

    while let Some(id) = builder.queue.pop_front() {
        let subset = builder.subsets[id as usize].clone();

        let mut final_weight = semiring::ZERO;
        for &(q, r) in &subset {
            final_weight =
                semiring::plus(final_weight, semiring::times(r, fst.final_weight(q)));
        }
        if !semiring::is_zero(final_weight) {
            builder.out.set_final(id, final_weight)?;
        }

        // Group this subset's moves by input label. Arcs of weight 0̄
        // contribute nothing and are dropped here, which keeps every
        // residual finite.
        let mut moves: FxHashMap<u32, Vec<(u32, f64, u32)>> = FxHashMap::default();
        for &(q, r) in &subset {
            for arc in fst.arcs(q) {
                let w = semiring::times(r, arc.weight);
                if semiring::is_zero(w) {
                    continue;
                }
                moves
                    .entry(arc.ilabel)
                    .or_default()
                    .push((arc.nextstate, w, arc.olabel));
            }
        }

        let mut labels: Vec<u32> = moves.keys().copied().collect();
        labels.sort_unstable();
        for ilabel in labels {
            let entries = &moves[&ilabel];
            let olabel = entries[0].2;
            if entries.iter().any(|&(_, _, o)| o != olabel) {
                return Err(FstError::InvalidState(
                    "input is not functional: conflicting output labels",
                ));
            }

            let mut divisor = semiring::ZERO;
            for &(_, w, _) in entries {
                divisor = semiring::plus(divisor, w);
            }

            let mut residuals: FxHashMap<u32, f64> = FxHashMap::default();
            for &(dst, w, _) in entries {
                let slot = residuals.entry(dst).or_insert(semiring::ZERO);
                *slot = semiring::plus(*slot, w);
            }
            let mut next: Subset = residuals
                .into_iter()
                .map(|(dst, w)| (dst, w - divisor))
                .collect();
            next.sort_unstable_by_key(|&(state, _)| state);

            let nid = builder.intern(next)?;
            builder.out.add_arc(id, ilabel, olabel, divisor, nid)?;
        }
    }

    tracing::debug!(
        input_states = fst.num_states(),
        subset_states = builder.out.num_states(),
        "determinization complete"
    );
    Ok(builder.out)
}
