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

//! ε-removal: rewrites a transducer so no ε:ε arcs remain, folding each
//! state's tropical ε-closure into its non-ε arcs and final weight.

use crate::errors::FstError;
use crate::semiring;
use crate::types::{FstArc, MutableFst, EPSILON};
use fixedbitset::FixedBitSet;
use std::collections::VecDeque;

#[inline(always)]
fn is_eps_eps(arc: &FstArc) -> bool {
    arc.ilabel == EPSILON && arc.olabel == EPSILON
}

/// Single-source shortest distances over the ε:ε subgraph.
///
/// Label-correcting relaxation rather than Dijkstra, because ε arcs may
/// carry negative weights. A state relaxed more than `n` times witnesses a
/// negative-weight ε-cycle.
fn epsilon_closure(
    fst: &MutableFst,
    source: u32,
    dist: &mut [f64],
    relax_count: &mut [u32],
    touched: &mut Vec<u32>,
) -> Result<(), FstError> {
    let n = fst.num_states();
    let mut in_queue = FixedBitSet::with_capacity(n as usize);
    let mut queue: VecDeque<u32> = VecDeque::new();

    dist[source as usize] = semiring::ONE;
    touched.push(source);
    queue.push_back(source);
    in_queue.insert(source as usize);

    while let Some(state) = queue.pop_front() {
        in_queue.set(state as usize, false);
        let base = dist[state as usize];
        for arc in fst.arcs(state) {
            if !is_eps_eps(arc) {
                continue;
            }
            let next = arc.nextstate as usize;
            let candidate = semiring::times(base, arc.weight);
            if candidate < dist[next] {
                if semiring::is_zero(dist[next]) {
                    touched.push(arc.nextstate);
                }
                dist[next] = candidate;
                relax_count[next] += 1;
                if relax_count[next] > n {
                    return Err(FstError::InvalidState(
                        "negative-weight epsilon cycle",
                    ));
                }
                if !in_queue.contains(next) {
                    in_queue.insert(next);
                    queue.push_back(arc.nextstate);
                }
            }
        }
    }
    Ok(())
}

/// Builds the ε-free equivalent of `fst` over the same state set.
///
/// For every (q, w) in the ε-closure of p, q's non-ε arcs are re-homed onto
/// p with w folded into their weights, and q's final weight folds into p's.
pub fn rm_epsilon(fst: &MutableFst) -> Result<MutableFst, FstError> {
    let n = fst.num_states() as usize;
    let mut out = MutableFst::new();
    for _ in 0..n {
        out.add_state();
    }
    if fst.has_start() {
        out.set_start(fst.start())?;
    }

    let mut dist = vec![semiring::ZERO; n];
    let mut relax_count = vec![0u32; n];
    let mut touched: Vec<u32> = Vec::new();

    for p in 0..fst.num_states() {
        epsilon_closure(fst, p, &mut dist, &mut relax_count, &mut touched)?;

        let mut final_weight = semiring::ZERO;
        touched.sort_unstable();
        for &q in touched.iter() {
            let w = dist[q as usize];
            for arc in fst.arcs(q) {
                if is_eps_eps(arc) {
                    continue;
                }
                out.add_arc(
                    p,
                    arc.ilabel,
                    arc.olabel,
                    semiring::times(w, arc.weight),
                    arc.nextstate,
                )?;
            }
            final_weight =
                semiring::plus(final_weight, semiring::times(w, fst.final_weight(q)));
        }
        if !semiring::is_zero(final_weight) {
            out.set_final(p, final_weight)?;
        }

        for &q in touched.iter() {
            dist[q as usize] = semiring::ZERO;
            relax_count[q as usize] = 0;
        }
        touched.clear();
    }

    tracing::debug!(
        states = out.num_states(),
        arcs = out.total_arcs(),
        "epsilon removal complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{accepts, string_weight};

    #[test]
    fn test_removes_epsilon_chain() {
        // 0 -ε:ε(1)-> 1 -a:a(2)-> 2(final 0.5)
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s2, 0.5).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 1.0, s1).unwrap();
        fst.add_arc(s1, 5, 5, 2.0, s2).unwrap();

        let out = rm_epsilon(&fst).unwrap();
        assert!(out
            .states
            .iter()
            .all(|s| s.arcs.iter().all(|a| !is_eps_eps(a))));
        assert_eq!(string_weight(&out, &[5]), 3.5);
        assert!(!accepts(&out, &[]));
    }

    #[test]
    fn test_epsilon_path_to_final_folds_final_weight() {
        // 0 -ε:ε(2)-> 1(final 3): state 0 becomes final with weight 5.
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 3.0).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 2.0, s1).unwrap();

        let out = rm_epsilon(&fst).unwrap();
        assert_eq!(out.final_weight(s0), 5.0);
        assert_eq!(out.num_arcs(s0), 0);
    }

    #[test]
    fn test_parallel_epsilons_take_min() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s2, 0.0).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 4.0, s1).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 1.0, s1).unwrap();
        fst.add_arc(s1, 7, 7, 0.0, s2).unwrap();

        let out = rm_epsilon(&fst).unwrap();
        assert_eq!(string_weight(&out, &[7]), 1.0);
    }

    #[test]
    fn test_epsilon_with_output_label_survives() {
        // ε:x arcs are not ε:ε and must stay.
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.0).unwrap();
        fst.add_arc(s0, EPSILON, 9, 0.0, s1).unwrap();

        let out = rm_epsilon(&fst).unwrap();
        assert_eq!(out.num_arcs(s0), 1);
        assert_eq!(out.arcs(s0)[0].olabel, 9);
    }

    #[test]
    fn test_zero_weight_cycle_is_tolerated() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.0).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 0.0, s1).unwrap();
        fst.add_arc(s1, EPSILON, EPSILON, 0.0, s0).unwrap();

        let out = rm_epsilon(&fst).unwrap();
        assert_eq!(string_weight(&out, &[]), 0.0);
    }

    #[test]
    fn test_negative_cycle_rejected() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.0).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 1.0, s1).unwrap();
        fst.add_arc(s1, EPSILON, EPSILON, -2.0, s0).unwrap();

        assert!(matches!(
            rm_epsilon(&fst),
            Err(FstError::InvalidState(_))
        ));
    }
}
