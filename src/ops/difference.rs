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

//! Difference: A ∖ B = A ∘ complement(det(B projected to its input side)).
//!
//! B is treated as an unweighted acceptor of its input language (its
//! weights are zeroed during projection, so a difference is weighted
//! purely by A). The complement completes the determinized machine over
//! every label the composition can feed it (A's output labels plus B's
//! input labels) into a non-final sink, then flips finality.

use crate::errors::FstError;
use crate::ops::{basic, compose, determinize, rmepsilon};
use crate::semiring;
use crate::types::{MutableFst, ProjectType, EPSILON};
use rustc_hash::FxHashSet;

/// Alphabet the complement must be total over: every label B could match
/// against when composed to the right of A.
fn joint_alphabet(a: &MutableFst, b: &MutableFst) -> Vec<u32> {
    let mut labels: FxHashSet<u32> = FxHashSet::default();
    for s in 0..a.num_states() {
        for arc in a.arcs(s) {
            if arc.olabel != EPSILON {
                labels.insert(arc.olabel);
            }
        }
    }
    for s in 0..b.num_states() {
        for arc in b.arcs(s) {
            if arc.ilabel != EPSILON {
                labels.insert(arc.ilabel);
            }
        }
    }
    let mut sorted: Vec<u32> = labels.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// Completes `det` over `alphabet` with a fresh sink and inverts finality,
/// in place. The input must already be deterministic and ε-free.
fn complement(det: &mut MutableFst, alphabet: &[u32]) -> Result<(), FstError> {
    if !det.has_start() {
        let s = det.add_state();
        det.set_start(s)?;
    }
    let sink = det.add_state();
    for s in 0..det.num_states() {
        let present: FxHashSet<u32> = det.arcs(s).iter().map(|a| a.ilabel).collect();
        for &label in alphabet {
            if !present.contains(&label) {
                det.add_arc(s, label, label, semiring::ONE, sink)?;
            }
        }
    }
    for s in 0..det.num_states() {
        let flipped = if det.is_final(s) {
            semiring::ZERO
        } else {
            semiring::ONE
        };
        det.set_final(s, flipped)?;
    }
    Ok(())
}

/// A ∖ B. Propagates `INVALID_STATE` when B cannot be determinized.
pub fn difference(a: &MutableFst, b: &MutableFst) -> Result<MutableFst, FstError> {
    let alphabet = joint_alphabet(a, b);

    let mut b_input = b.clone();
    basic::project(&mut b_input, ProjectType::Input);
    for state in b_input.states.iter_mut() {
        if !semiring::is_zero(state.final_weight) {
            state.final_weight = semiring::ONE;
        }
        for arc in state.arcs.iter_mut() {
            arc.weight = semiring::ONE;
        }
    }

    let b_input = rmepsilon::rm_epsilon(&b_input)?;
    let mut det = determinize::determinize(&b_input)?;
    complement(&mut det, &alphabet)?;
    compose::compose(a, &det)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{accepts, acceptor, string_weight};

    #[test]
    fn test_difference_removes_common_string() {
        let mut a = acceptor(&[1]);
        let b2 = acceptor(&[2]);
        basic::union(&mut a, &b2); // A accepts {1, 2}
        let b = acceptor(&[2]);

        let diff = difference(&a, &b).unwrap();
        assert!(accepts(&diff, &[1]));
        assert!(!accepts(&diff, &[2]));
    }

    #[test]
    fn test_difference_with_empty_b_is_identity_language() {
        let a = acceptor(&[1, 2]);
        let b = MutableFst::new();
        let diff = difference(&a, &b).unwrap();
        assert!(accepts(&diff, &[1, 2]));
        assert!(!accepts(&diff, &[1]));
    }

    #[test]
    fn test_difference_of_equal_languages_is_empty() {
        let a = acceptor(&[1, 2]);
        let b = acceptor(&[1, 2]);
        let diff = difference(&a, &b).unwrap();
        assert!(!accepts(&diff, &[1, 2]));
        assert!(!accepts(&diff, &[1]));
        assert!(!accepts(&diff, &[]));
    }

    #[test]
    fn test_difference_keeps_a_weights() {
        let mut a = acceptor(&[1]);
        let last = a.num_states() - 1;
        a.set_final(last, 2.5).unwrap();
        let b = acceptor(&[3]);
        let diff = difference(&a, &b).unwrap();
        assert_eq!(string_weight(&diff, &[1]), 2.5);
    }

    #[test]
    fn test_difference_ignores_b_weights() {
        let mut a = acceptor(&[1]);
        let mut longer = acceptor(&[1, 1]);
        basic::union(&mut a, &longer); // A accepts {1, 11}
        longer = acceptor(&[1, 1]);
        let tail = longer.num_states() - 1;
        longer.set_final(tail, 9.0).unwrap();

        let diff = difference(&a, &longer).unwrap();
        assert!(accepts(&diff, &[1]));
        assert!(!accepts(&diff, &[1, 1]));
    }

    #[test]
    fn test_difference_with_nondeterministic_b() {
        // B needs determinization first; built with duplicate arcs.
        let mut b = MutableFst::new();
        for _ in 0..3 {
            b.add_state();
        }
        b.set_start(0).unwrap();
        b.add_arc(0, 1, 1, 0.0, 1).unwrap();
        b.add_arc(0, 1, 1, 0.0, 2).unwrap();
        b.set_final(1, 0.0).unwrap();

        let mut a = acceptor(&[1]);
        let two = acceptor(&[2]);
        basic::union(&mut a, &two);
        let diff = difference(&a, &b).unwrap();
        assert!(!accepts(&diff, &[1]));
        assert!(accepts(&diff, &[2]));
    }
}
