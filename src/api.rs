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

//! The handle-based boundary API.
//!
//! Embedding hosts see only `u32` handles, plain [`FstArc`] records and
//! primitive scalars. Every function acquires the process-wide registry
//! mutex for its entire duration, resolves its handles (checking kind),
//! runs the core operation and maps failures to the sentinel the return
//! type allows: `INVALID_HANDLE` for handles, `NO_STATE` for states, 0
//! for counts, +∞ for weights, or an [`FstErrorCode`].

use crate::errors::{FstError, FstErrorCode};
use crate::io;
use crate::ops;
use crate::registry::{registry, FstObject, Registry};
use crate::semiring;
use crate::strings;
use crate::types::{
    ClosureType, FrozenFst, FstArc, MutableFst, ProjectType, INVALID_HANDLE, NO_STATE,
};
use std::path::Path;

/// Handle to a mutable transducer.
pub type FstMutableHandle = u32;
/// Handle to a frozen transducer.
pub type FstHandle = u32;

fn insert_mutable(reg: &mut Registry, result: Result<MutableFst, FstError>) -> FstMutableHandle {
    match result {
        Ok(fst) => reg
            .insert(FstObject::Mutable(fst))
            .unwrap_or(INVALID_HANDLE),
        Err(_) => INVALID_HANDLE,
    }
}

fn copy_arcs(arcs: &[FstArc], buf: &mut [FstArc]) -> u32 {
    let n = arcs.len().min(buf.len());
    buf[..n].copy_from_slice(&arcs[..n]);
    arcs.len() as u32
}

// --- MutableFst lifecycle ---

pub fn fst_mutable_new() -> FstMutableHandle {
    let mut reg = registry();
    reg.insert(FstObject::Mutable(MutableFst::new()))
        .unwrap_or(INVALID_HANDLE)
}

pub fn fst_mutable_free(handle: FstMutableHandle) {
    registry().remove(handle, true);
}

/// Index of the new state, or `NO_STATE` on a bad handle.
pub fn fst_mutable_add_state(handle: FstMutableHandle) -> u32 {
    let mut reg = registry();
    match reg.resolve_mutable_mut(handle) {
        Ok(fst) => fst.add_state(),
        Err(_) => NO_STATE,
    }
}

pub fn fst_mutable_set_start(handle: FstMutableHandle, state: u32) -> FstErrorCode {
    let mut reg = registry();
    let result = reg
        .resolve_mutable_mut(handle)
        .and_then(|fst| fst.set_start(state));
    FstErrorCode::from_result(result)
}

pub fn fst_mutable_set_final(handle: FstMutableHandle, state: u32, weight: f64) -> FstErrorCode {
    let mut reg = registry();
    let result = reg
        .resolve_mutable_mut(handle)
        .and_then(|fst| fst.set_final(state, weight));
    FstErrorCode::from_result(result)
}

pub fn fst_mutable_add_arc(
    handle: FstMutableHandle,
    src: u32,
    ilabel: u32,
    olabel: u32,
    weight: f64,
    nextstate: u32,
) -> FstErrorCode {
    let mut reg = registry();
    let result = reg
        .resolve_mutable_mut(handle)
        .and_then(|fst| fst.add_arc(src, ilabel, olabel, weight, nextstate));
    FstErrorCode::from_result(result)
}

// --- MutableFst query ---

pub fn fst_mutable_start(handle: FstMutableHandle) -> u32 {
    registry()
        .resolve_mutable(handle)
        .map(|fst| fst.start())
        .unwrap_or(NO_STATE)
}

pub fn fst_mutable_num_states(handle: FstMutableHandle) -> u32 {
    registry()
        .resolve_mutable(handle)
        .map(|fst| fst.num_states())
        .unwrap_or(0)
}

pub fn fst_mutable_num_arcs(handle: FstMutableHandle, state: u32) -> u32 {
    registry()
        .resolve_mutable(handle)
        .map(|fst| fst.num_arcs(state))
        .unwrap_or(0)
}

pub fn fst_mutable_final_weight(handle: FstMutableHandle, state: u32) -> f64 {
    registry()
        .resolve_mutable(handle)
        .map(|fst| fst.final_weight(state))
        .unwrap_or(semiring::ZERO)
}

/// Copies up to `buf.len()` arcs of `state` into `buf` and returns the
/// true arc count, so the caller can detect truncation.
pub fn fst_mutable_get_arcs(handle: FstMutableHandle, state: u32, buf: &mut [FstArc]) -> u32 {
    let reg = registry();
    match reg.resolve_mutable(handle) {
        Ok(fst) => copy_arcs(fst.arcs(state), buf),
        Err(_) => 0,
    }
}

// --- Freeze and frozen query ---

/// Freezes a snapshot of a mutable transducer into an independently owned
/// frozen transducer with canonical arc order. The mutable source remains
/// valid and editable.
pub fn fst_freeze(handle: FstMutableHandle) -> FstHandle {
    let mut reg = registry();
    let frozen = match reg.resolve_mutable(handle) {
        Ok(fst) => FrozenFst::from(fst),
        Err(_) => return INVALID_HANDLE,
    };
    reg.insert(FstObject::Frozen(frozen)).unwrap_or(INVALID_HANDLE)
}

pub fn fst_free(handle: FstHandle) {
    registry().remove(handle, false);
}

pub fn fst_start(handle: FstHandle) -> u32 {
    registry()
        .resolve_frozen(handle)
        .map(|fst| fst.start())
        .unwrap_or(NO_STATE)
}

pub fn fst_num_states(handle: FstHandle) -> u32 {
    registry()
        .resolve_frozen(handle)
        .map(|fst| fst.num_states())
        .unwrap_or(0)
}

pub fn fst_num_arcs(handle: FstHandle, state: u32) -> u32 {
    registry()
        .resolve_frozen(handle)
        .map(|fst| fst.num_arcs(state))
        .unwrap_or(0)
}

pub fn fst_final_weight(handle: FstHandle, state: u32) -> f64 {
    registry()
        .resolve_frozen(handle)
        .map(|fst| fst.final_weight(state))
        .unwrap_or(semiring::ZERO)
}

pub fn fst_get_arcs(handle: FstHandle, state: u32, buf: &mut [FstArc]) -> u32 {
    let reg = registry();
    match reg.resolve_frozen(handle) {
        Ok(fst) => copy_arcs(fst.arcs(state), buf),
        Err(_) => 0,
    }
}

// --- I/O ---

pub fn fst_read_text(path: &str) -> FstMutableHandle {
    let mut reg = registry();
    match io::text::read_text(Path::new(path)) {
        Ok(fst) => insert_mutable(&mut reg, Ok(fst)),
        Err(_) => INVALID_HANDLE,
    }
}

pub fn fst_load(path: &str) -> FstHandle {
    let mut reg = registry();
    match io::binary::load(Path::new(path)) {
        Ok(fst) => reg.insert(FstObject::Frozen(fst)).unwrap_or(INVALID_HANDLE),
        Err(_) => INVALID_HANDLE,
    }
}

pub fn fst_save(handle: FstHandle, path: &str) -> FstErrorCode {
    let reg = registry();
    let result = reg
        .resolve_frozen(handle)
        .and_then(|fst| io::binary::save(fst, Path::new(path)));
    FstErrorCode::from_result(result)
}

// --- Operations producing new transducers ---

pub fn fst_compose(a: FstMutableHandle, b: FstMutableHandle) -> FstMutableHandle {
    let mut reg = registry();
    let result = {
        let fa = match reg.resolve_mutable(a) {
            Ok(fst) => fst,
            Err(_) => return INVALID_HANDLE,
        };
        let fb = match reg.resolve_mutable(b) {
            Ok(fst) => fst,
            Err(_) => return INVALID_HANDLE,
        };
        ops::compose::compose(fa, fb)
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_determinize(handle: FstMutableHandle) -> FstMutableHandle {
    let mut reg = registry();
    let result = match reg.resolve_mutable(handle) {
        Ok(fst) => ops::determinize::determinize(fst),
        Err(_) => return INVALID_HANDLE,
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_rm_epsilon(handle: FstMutableHandle) -> FstMutableHandle {
    let mut reg = registry();
    let result = match reg.resolve_mutable(handle) {
        Ok(fst) => ops::rmepsilon::rm_epsilon(fst),
        Err(_) => return INVALID_HANDLE,
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_shortest_path(handle: FstMutableHandle, n: u32) -> FstMutableHandle {
    let mut reg = registry();
    let result = match reg.resolve_mutable(handle) {
        Ok(fst) => ops::shortest_path::shortest_path(fst, n),
        Err(_) => return INVALID_HANDLE,
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_optimize(handle: FstMutableHandle) -> FstMutableHandle {
    let mut reg = registry();
    let result = match reg.resolve_mutable(handle) {
        Ok(fst) => ops::optimize::optimize(fst),
        Err(_) => return INVALID_HANDLE,
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_difference(a: FstMutableHandle, b: FstMutableHandle) -> FstMutableHandle {
    let mut reg = registry();
    let result = {
        let fa = match reg.resolve_mutable(a) {
            Ok(fst) => fst,
            Err(_) => return INVALID_HANDLE,
        };
        let fb = match reg.resolve_mutable(b) {
            Ok(fst) => fst,
            Err(_) => return INVALID_HANDLE,
        };
        ops::difference::difference(fa, fb)
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_cdrewrite(
    tau: FstMutableHandle,
    lambda: FstMutableHandle,
    rho: FstMutableHandle,
    sigma: FstMutableHandle,
) -> FstMutableHandle {
    let mut reg = registry();
    let result = {
        let mut operands = Vec::with_capacity(4);
        for handle in [tau, lambda, rho, sigma] {
            match reg.resolve_mutable(handle) {
                Ok(fst) => operands.push(fst),
                Err(_) => return INVALID_HANDLE,
            }
        }
        ops::cdrewrite::cdrewrite(operands[0], operands[1], operands[2], operands[3])
    };
    insert_mutable(&mut reg, result)
}

pub fn fst_replace(
    root: FstMutableHandle,
    pairs: &[(u32, FstMutableHandle)],
) -> FstMutableHandle {
    let mut reg = registry();
    let result = {
        let root_fst = match reg.resolve_mutable(root) {
            Ok(fst) => fst,
            Err(_) => return INVALID_HANDLE,
        };
        let mut resolved: Vec<(u32, &MutableFst)> = Vec::with_capacity(pairs.len());
        for &(label, handle) in pairs {
            match reg.resolve_mutable(handle) {
                Ok(fst) => resolved.push((label, fst)),
                Err(_) => return INVALID_HANDLE,
            }
        }
        ops::replace::replace(root_fst, &resolved)
    };
    insert_mutable(&mut reg, result)
}

// --- In-place operations ---

pub fn fst_minimize(handle: FstMutableHandle) -> FstErrorCode {
    let mut reg = registry();
    let result = reg
        .resolve_mutable_mut(handle)
        .and_then(ops::minimize::minimize);
    FstErrorCode::from_result(result)
}

pub fn fst_union(a: FstMutableHandle, b: FstMutableHandle) -> FstErrorCode {
    binary_in_place(a, b, ops::basic::union)
}

pub fn fst_concat(a: FstMutableHandle, b: FstMutableHandle) -> FstErrorCode {
    binary_in_place(a, b, ops::basic::concat)
}

/// A ← op(A, B) under a single registry lock. A is lifted out of its slot
/// so B can be borrowed from the table at the same time; `a == b` operates
/// on a snapshot of the shared operand.
fn binary_in_place(
    a: FstMutableHandle,
    b: FstMutableHandle,
    op: fn(&mut MutableFst, &MutableFst),
) -> FstErrorCode {
    let mut reg = registry();
    if let Err(err) = reg.resolve_mutable(b) {
        return FstErrorCode::from(&err);
    }
    let mut fa = match reg.take_mutable(a) {
        Ok(fst) => fst,
        Err(err) => return FstErrorCode::from(&err),
    };
    if a == b {
        let fb = fa.clone();
        op(&mut fa, &fb);
    } else {
        match reg.resolve_mutable(b) {
            Ok(fb) => op(&mut fa, fb),
            Err(err) => {
                let code = FstErrorCode::from(&err);
                reg.restore(a, fa);
                return code;
            }
        }
    }
    reg.restore(a, fa);
    FstErrorCode::Ok
}

pub fn fst_closure(handle: FstMutableHandle, kind: ClosureType) -> FstErrorCode {
    let mut reg = registry();
    let result = reg
        .resolve_mutable_mut(handle)
        .map(|fst| ops::basic::closure(fst, kind));
    FstErrorCode::from_result(result)
}

pub fn fst_invert(handle: FstMutableHandle) {
    let mut reg = registry();
    if let Ok(fst) = reg.resolve_mutable_mut(handle) {
        ops::basic::invert(fst);
    }
}

pub fn fst_project(handle: FstMutableHandle, side: ProjectType) {
    let mut reg = registry();
    if let Ok(fst) = reg.resolve_mutable_mut(handle) {
        ops::basic::project(fst, side);
    }
}

// --- String utilities ---

pub fn fst_compile_string(input: &[u8]) -> FstMutableHandle {
    let mut reg = registry();
    let fst = strings::compile_string(input);
    insert_mutable(&mut reg, Ok(fst))
}

/// Copies up to `buf.len()` bytes of the unique accepted string into `buf`
/// and returns the true length, or -1 if the transducer is not a linear
/// identity chain.
pub fn fst_print_string(handle: FstMutableHandle, buf: &mut [u8]) -> i32 {
    let reg = registry();
    let fst = match reg.resolve_mutable(handle) {
        Ok(fst) => fst,
        Err(_) => return -1,
    };
    match strings::print_string(fst) {
        Some(bytes) => {
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            bytes.len() as i32
        }
        None => -1,
    }
}

// --- Global teardown ---

/// Releases every live transducer. The caller must guarantee no other
/// boundary call is in flight.
pub fn fst_teardown() {
    let released = registry().clear();
    tracing::debug!(released, "registry teardown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON;
    use serial_test::serial;

    fn build_chain(labels: &[u32]) -> FstMutableHandle {
        let handle = fst_mutable_new();
        let mut prev = fst_mutable_add_state(handle);
        assert_eq!(fst_mutable_set_start(handle, prev), FstErrorCode::Ok);
        for &label in labels {
            let next = fst_mutable_add_state(handle);
            assert_eq!(
                fst_mutable_add_arc(handle, prev, label, label, 0.0, next),
                FstErrorCode::Ok
            );
            prev = next;
        }
        assert_eq!(fst_mutable_set_final(handle, prev, 0.0), FstErrorCode::Ok);
        handle
    }

    #[test]
    #[serial]
    fn test_mutable_lifecycle() {
        let handle = fst_mutable_new();
        assert_ne!(handle, INVALID_HANDLE);
        assert_eq!(fst_mutable_num_states(handle), 0);
        assert_eq!(fst_mutable_start(handle), NO_STATE);

        let s0 = fst_mutable_add_state(handle);
        let s1 = fst_mutable_add_state(handle);
        assert_eq!(fst_mutable_set_start(handle, s0), FstErrorCode::Ok);
        assert_eq!(fst_mutable_set_final(handle, s1, 0.5), FstErrorCode::Ok);
        assert_eq!(
            fst_mutable_add_arc(handle, s0, 1, 2, 0.25, s1),
            FstErrorCode::Ok
        );
        assert_eq!(fst_mutable_num_states(handle), 2);
        assert_eq!(fst_mutable_num_arcs(handle, s0), 1);
        assert_eq!(fst_mutable_final_weight(handle, s1), 0.5);

        fst_mutable_free(handle);
        assert_eq!(fst_mutable_num_states(handle), 0);
        assert_eq!(fst_mutable_add_state(handle), NO_STATE);
    }

    #[test]
    #[serial]
    fn test_invalid_inputs_map_to_sentinels() {
        let handle = fst_mutable_new();
        assert_eq!(
            fst_mutable_set_start(handle, 7),
            FstErrorCode::InvalidArg
        );
        let s0 = fst_mutable_add_state(handle);
        assert_eq!(
            fst_mutable_set_final(handle, s0, f64::NAN),
            FstErrorCode::InvalidArg
        );
        assert_eq!(
            fst_mutable_add_arc(handle, s0, 1, 1, 0.0, 9),
            FstErrorCode::InvalidArg
        );
        assert!(fst_mutable_final_weight(handle, 42).is_infinite());
        fst_mutable_free(handle);

        assert_eq!(fst_mutable_start(INVALID_HANDLE), NO_STATE);
        assert_eq!(fst_mutable_num_states(INVALID_HANDLE), 0);
    }

    #[test]
    #[serial]
    fn test_get_arcs_reports_true_count() {
        let handle = fst_mutable_new();
        let s0 = fst_mutable_add_state(handle);
        let s1 = fst_mutable_add_state(handle);
        for label in 1..=3 {
            fst_mutable_add_arc(handle, s0, label, label, 0.0, s1);
        }
        let mut buf = [FstArc::new(0, 0, 0.0, 0); 2];
        assert_eq!(fst_mutable_get_arcs(handle, s0, &mut buf), 3);
        assert_eq!(buf[0].ilabel, 1);
        assert_eq!(buf[1].ilabel, 2);
        fst_mutable_free(handle);
    }

    #[test]
    #[serial]
    fn test_freeze_and_kind_confusion() {
        let handle = build_chain(&[1, 2]);
        let frozen = fst_freeze(handle);
        assert_ne!(frozen, INVALID_HANDLE);

        assert_eq!(fst_num_states(frozen), fst_mutable_num_states(handle));
        assert_eq!(fst_start(frozen), fst_mutable_start(handle));
        // Wrong-kind lookups fail with the sentinel of the return type.
        assert_eq!(fst_num_states(handle), 0);
        assert_eq!(fst_mutable_num_states(frozen), 0);

        // The mutable source stays editable after freezing.
        assert_ne!(fst_mutable_add_state(handle), NO_STATE);
        fst_mutable_free(handle);
        assert_eq!(fst_num_states(frozen), 3);
        fst_free(frozen);
    }

    #[test]
    #[serial]
    fn test_compose_via_handles() {
        let a = build_chain(&[1]);
        let b = build_chain(&[1]);
        let c = fst_compose(a, b);
        assert_ne!(c, INVALID_HANDLE);
        assert!(fst_mutable_num_states(c) > 0);
        let bad = fst_compose(a, INVALID_HANDLE);
        assert_eq!(bad, INVALID_HANDLE);
        fst_mutable_free(a);
        fst_mutable_free(b);
        fst_mutable_free(c);
    }

    #[test]
    #[serial]
    fn test_union_self_operand() {
        let a = build_chain(&[1]);
        assert_eq!(fst_union(a, a), FstErrorCode::Ok);
        let mut buf = [0u8; 8];
        // No longer a linear chain.
        assert_eq!(fst_print_string(a, &mut buf), -1);
        fst_mutable_free(a);
    }

    #[test]
    #[serial]
    fn test_compile_print_round_trip() {
        let handle = fst_compile_string(b"abc");
        assert_eq!(fst_mutable_num_states(handle), 4);
        let mut buf = [0u8; 8];
        assert_eq!(fst_print_string(handle, &mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        // Truncating buffer still reports the true length.
        let mut short = [0u8; 2];
        assert_eq!(fst_print_string(handle, &mut short), 3);
        assert_eq!(&short, b"ab");
        fst_mutable_free(handle);
    }

    #[test]
    #[serial]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.fst");
        let path_str = path.to_str().unwrap();

        let handle = build_chain(&[5, 6]);
        let frozen = fst_freeze(handle);
        assert_eq!(fst_save(frozen, path_str), FstErrorCode::Ok);

        let loaded = fst_load(path_str);
        assert_ne!(loaded, INVALID_HANDLE);
        assert_eq!(fst_num_states(loaded), fst_num_states(frozen));
        assert_eq!(fst_start(loaded), fst_start(frozen));

        assert_eq!(fst_load("/nonexistent/x.fst"), INVALID_HANDLE);
        fst_mutable_free(handle);
        fst_free(frozen);
        fst_free(loaded);
    }

    #[test]
    #[serial]
    fn test_shortest_path_and_optimize_handles() {
        let handle = fst_mutable_new();
        let s0 = fst_mutable_add_state(handle);
        let s1 = fst_mutable_add_state(handle);
        fst_mutable_set_start(handle, s0);
        fst_mutable_set_final(handle, s1, 0.0);
        fst_mutable_add_arc(handle, s0, 1, 1, 2.0, s1);
        fst_mutable_add_arc(handle, s0, 1, 1, 5.0, s1);

        let best = fst_shortest_path(handle, 1);
        assert_ne!(best, INVALID_HANDLE);
        let opt = fst_optimize(handle);
        assert_ne!(opt, INVALID_HANDLE);

        fst_mutable_free(handle);
        fst_mutable_free(best);
        fst_mutable_free(opt);
    }

    #[test]
    #[serial]
    fn test_in_place_edits_via_handles() {
        let a = build_chain(&[1]);
        let b = build_chain(&[2]);
        assert_eq!(fst_concat(a, b), FstErrorCode::Ok);
        assert_eq!(fst_closure(a, ClosureType::Star), FstErrorCode::Ok);
        fst_invert(a);
        fst_project(a, ProjectType::Input);
        assert_eq!(fst_minimize(INVALID_HANDLE), FstErrorCode::InvalidArg);
        fst_mutable_free(a);
        fst_mutable_free(b);
    }

    #[test]
    #[serial]
    fn test_replace_via_handles() {
        let root = build_chain(&[100]);
        let body = build_chain(&[1]);
        let out = fst_replace(root, &[(100, body)]);
        assert_ne!(out, INVALID_HANDLE);
        assert_eq!(
            fst_replace(root, &[(EPSILON, body)]),
            INVALID_HANDLE
        );
        fst_mutable_free(root);
        fst_mutable_free(body);
        fst_mutable_free(out);
    }

    #[test]
    #[serial]
    fn test_teardown_invalidates_everything() {
        let a = fst_mutable_new();
        let frozen = fst_freeze(a);
        fst_teardown();
        assert_eq!(fst_mutable_num_states(a), 0);
        assert_eq!(fst_mutable_add_state(a), NO_STATE);
        assert_eq!(fst_num_states(frozen), 0);
        // The registry keeps working after teardown.
        let b = fst_mutable_new();
        assert_ne!(b, INVALID_HANDLE);
        fst_mutable_free(b);
    }
}
