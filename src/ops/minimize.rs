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

//! Partition-refinement minimization of a deterministic, input-ε-free
//! transducer.
//!
//! Classes start as final-weight groups (exact bit equality, non-final is
//! the +∞ group) and are split by the outgoing signature, sorted
//! (ilabel, olabel, weight bits, target class), until the class count
//! stops moving. Class ids are assigned in first-occurrence order over
//! ascending state ids, so each class's representative is its lowest
//! original state.

use crate::errors::FstError;
use crate::semiring;
use crate::types::{MutableFst, EPSILON, NO_STATE};
use rustc_hash::{FxHashMap, FxHashSet};

type Signature = (u32, Vec<(u32, u32, u64, u32)>);

fn check_preconditions(fst: &MutableFst) -> Result<(), FstError> {
    let mut seen: FxHashSet<u32> = FxHashSet::default();
    for s in 0..fst.num_states() {
        seen.clear();
        for arc in fst.arcs(s) {
            if arc.ilabel == EPSILON {
                return Err(FstError::InvalidState(
                    "minimization requires an epsilon-free input",
                ));
            }
            if !seen.insert(arc.ilabel) {
                return Err(FstError::InvalidState(
                    "minimization requires a deterministic input",
                ));
            }
        }
    }
    Ok(())
}

/// Merges equivalent states in place. The input must be deterministic on
/// its input labels and free of input-ε arcs.
pub fn minimize(fst: &mut MutableFst) -> Result<(), FstError> {
    check_preconditions(fst)?;
    let n = fst.num_states() as usize;
    if n == 0 {
        return Ok(());
    }

    let mut class_of: Vec<u32> = vec![0; n];
    let mut num_classes = {
        let mut ids: FxHashMap<u64, u32> = FxHashMap::default();
        for (s, class) in class_of.iter_mut().enumerate() {
            let key = semiring::weight_key(fst.final_weight(s as u32));
            let next = ids.len() as u32;
            *class = *ids.entry(key).or_insert(next);
        }
        ids.len()
    };

    loop {
        let mut ids: FxHashMap<Signature, u32> = FxHashMap::default();
        let mut next_class: Vec<u32> = vec![0; n];
        for s in 0..n {
            let mut arcs: Vec<(u32, u32, u64, u32)> = fst
                .arcs(s as u32)
                .iter()
                .map(|a| {
                    (
                        a.ilabel,
                        a.olabel,
                        semiring::weight_key(a.weight),
                        class_of[a.nextstate as usize],
                    )
                })
                .collect();
            arcs.sort_unstable();
            let signature: Signature = (class_of[s], arcs);
            let next = ids.len() as u32;
            next_class[s] = *ids.entry(signature).or_insert(next);
        }
        let count = ids.len();
        class_of = next_class;
        let stable = count == num_classes;
        num_classes = count;
        if stable {
            break;
        }
    }

    let mut representative: Vec<u32> = vec![NO_STATE; num_classes];
    for s in 0..n {
        let c = class_of[s] as usize;
        if representative[c] == NO_STATE {
            representative[c] = s as u32;
        }
    }

    let mut out = MutableFst::new();
    for _ in 0..num_classes {
        out.add_state();
    }
    for (c, &r) in representative.iter().enumerate() {
        out.set_final(c as u32, fst.final_weight(r))?;
        for arc in fst.arcs(r) {
            out.add_arc(
                c as u32,
                arc.ilabel,
                arc.olabel,
                arc.weight,
                class_of[arc.nextstate as usize],
            )?;
        }
    }
    if fst.has_start() {
        out.set_start(class_of[fst.start() as usize])?;
    }

    tracing::debug!(
        before = n,
        after = num_classes,
        "minimization complete"
    );
    *fst = out;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{accepts, string_weight};

    #[test]
    fn test_merges_equivalent_branches() {
        // Two parallel deterministic branches on labels 1 and 2 whose tail
        // states are indistinguishable.
        let mut fst = MutableFst::new();
        for _ in 0..5 {
            fst.add_state();
        }
        fst.set_start(0).unwrap();
        fst.add_arc(0, 1, 1, 0.0, 1).unwrap();
        fst.add_arc(0, 2, 2, 0.0, 2).unwrap();
        fst.add_arc(1, 3, 3, 0.0, 3).unwrap();
        fst.add_arc(2, 3, 3, 0.0, 4).unwrap();
        fst.set_final(3, 0.0).unwrap();
        fst.set_final(4, 0.0).unwrap();

        minimize(&mut fst).unwrap();
        // 3/4 merge, then 1/2 merge: start, mid, final.
        assert_eq!(fst.num_states(), 3);
        assert!(accepts(&fst, &[1, 3]));
        assert!(accepts(&fst, &[2, 3]));
        assert!(!accepts(&fst, &[1]));
    }

    #[test]
    fn test_distinct_final_weights_stay_separate() {
        let mut fst = MutableFst::new();
        for _ in 0..3 {
            fst.add_state();
        }
        fst.set_start(0).unwrap();
        fst.add_arc(0, 1, 1, 0.0, 1).unwrap();
        fst.add_arc(0, 2, 2, 0.0, 2).unwrap();
        fst.set_final(1, 1.0).unwrap();
        fst.set_final(2, 2.0).unwrap();

        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 3);
        assert_eq!(string_weight(&fst, &[1]), 1.0);
        assert_eq!(string_weight(&fst, &[2]), 2.0);
    }

    #[test]
    fn test_preserves_weighted_language() {
        let mut fst = MutableFst::new();
        for _ in 0..4 {
            fst.add_state();
        }
        fst.set_start(0).unwrap();
        fst.add_arc(0, 1, 1, 0.5, 1).unwrap();
        fst.add_arc(1, 2, 2, 0.25, 2).unwrap();
        fst.add_arc(1, 3, 3, 0.25, 3).unwrap();
        fst.set_final(2, 0.0).unwrap();
        fst.set_final(3, 0.0).unwrap();
        let before_12 = string_weight(&fst, &[1, 2]);
        let before_13 = string_weight(&fst, &[1, 3]);

        minimize(&mut fst).unwrap();
        assert_eq!(string_weight(&fst, &[1, 2]), before_12);
        assert_eq!(string_weight(&fst, &[1, 3]), before_13);
    }

    #[test]
    fn test_rejects_nondeterministic_input() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.0).unwrap();
        fst.add_arc(s0, 1, 1, 0.0, s1).unwrap();
        fst.add_arc(s0, 1, 1, 1.0, s1).unwrap();

        assert!(matches!(minimize(&mut fst), Err(FstError::InvalidState(_))));
        // Inputs are left unchanged on failure.
        assert_eq!(fst.num_arcs(s0), 2);
    }

    #[test]
    fn test_rejects_epsilon_input() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.0).unwrap();
        fst.add_arc(s0, EPSILON, EPSILON, 0.0, s1).unwrap();

        assert!(matches!(minimize(&mut fst), Err(FstError::InvalidState(_))));
    }

    #[test]
    fn test_minimize_empty() {
        let mut fst = MutableFst::new();
        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 0);
    }

    #[test]
    fn test_unreachable_duplicates_collapse() {
        // An unreachable copy of the accept state folds into one class.
        let mut fst = MutableFst::new();
        for _ in 0..3 {
            fst.add_state();
        }
        fst.set_start(0).unwrap();
        fst.add_arc(0, 1, 1, 0.0, 1).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst.set_final(2, 0.0).unwrap();

        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert!(accepts(&fst, &[1]));
    }
}
