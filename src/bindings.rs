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
#![cfg(feature = "c_api")]

//! `extern "C"` exports over the handle API, for hosts linking the crate
//! as a cdylib. Pointer arguments follow C conventions: NUL-terminated
//! paths, (pointer, length) buffers where a length travels separately.
//! A null or non-UTF-8 path fails with the sentinel of the return type.

use crate::api;
use crate::errors::FstErrorCode;
use crate::types::{ClosureType, FstArc, ProjectType, INVALID_HANDLE};
use libc::c_char;
use std::ffi::CStr;
use std::slice;

fn path_from_c<'a>(path: *const c_char) -> Option<&'a str> {
    if path.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(path) }.to_str().ok()
}

fn arc_buf<'a>(buf: *mut FstArc, len: u32) -> &'a mut [FstArc] {
    if buf.is_null() || len == 0 {
        return &mut [];
    }
    unsafe { slice::from_raw_parts_mut(buf, len as usize) }
}

#[no_mangle]
pub extern "C" fn fst_mutable_new() -> u32 {
    api::fst_mutable_new()
}

#[no_mangle]
pub extern "C" fn fst_mutable_free(handle: u32) {
    api::fst_mutable_free(handle);
}

#[no_mangle]
pub extern "C" fn fst_mutable_add_state(handle: u32) -> u32 {
    api::fst_mutable_add_state(handle)
}

#[no_mangle]
pub extern "C" fn fst_mutable_set_start(handle: u32, state: u32) -> u32 {
    api::fst_mutable_set_start(handle, state) as u32
}

#[no_mangle]
pub extern "C" fn fst_mutable_set_final(handle: u32, state: u32, weight: f64) -> u32 {
    api::fst_mutable_set_final(handle, state, weight) as u32
}

#[no_mangle]
pub extern "C" fn fst_mutable_add_arc(
    handle: u32,
    src: u32,
    ilabel: u32,
    olabel: u32,
    weight: f64,
    nextstate: u32,
) -> u32 {
    api::fst_mutable_add_arc(handle, src, ilabel, olabel, weight, nextstate) as u32
}

#[no_mangle]
pub extern "C" fn fst_mutable_start(handle: u32) -> u32 {
    api::fst_mutable_start(handle)
}

#[no_mangle]
pub extern "C" fn fst_mutable_num_states(handle: u32) -> u32 {
    api::fst_mutable_num_states(handle)
}

#[no_mangle]
pub extern "C" fn fst_mutable_num_arcs(handle: u32, state: u32) -> u32 {
    api::fst_mutable_num_arcs(handle, state)
}

#[no_mangle]
pub extern "C" fn fst_mutable_final_weight(handle: u32, state: u32) -> f64 {
    api::fst_mutable_final_weight(handle, state)
}

#[no_mangle]
pub extern "C" fn fst_mutable_get_arcs(
    handle: u32,
    state: u32,
    buf: *mut FstArc,
    buf_len: u32,
) -> u32 {
    api::fst_mutable_get_arcs(handle, state, arc_buf(buf, buf_len))
}

#[no_mangle]
pub extern "C" fn fst_freeze(mutable_handle: u32) -> u32 {
    api::fst_freeze(mutable_handle)
}

#[no_mangle]
pub extern "C" fn fst_free(handle: u32) {
    api::fst_free(handle);
}

#[no_mangle]
pub extern "C" fn fst_start(handle: u32) -> u32 {
    api::fst_start(handle)
}

#[no_mangle]
pub extern "C" fn fst_num_states(handle: u32) -> u32 {
    api::fst_num_states(handle)
}

#[no_mangle]
pub extern "C" fn fst_num_arcs(handle: u32, state: u32) -> u32 {
    api::fst_num_arcs(handle, state)
}

#[no_mangle]
pub extern "C" fn fst_final_weight(handle: u32, state: u32) -> f64 {
    api::fst_final_weight(handle, state)
}

#[no_mangle]
pub extern "C" fn fst_get_arcs(handle: u32, state: u32, buf: *mut FstArc, buf_len: u32) -> u32 {
    api::fst_get_arcs(handle, state, arc_buf(buf, buf_len))
}

#[no_mangle]
pub extern "C" fn fst_read_text(path: *const c_char) -> u32 {
    match path_from_c(path) {
        Some(path) => api::fst_read_text(path),
        None => INVALID_HANDLE,
    }
}

#[no_mangle]
pub extern "C" fn fst_load(path: *const c_char) -> u32 {
    match path_from_c(path) {
        Some(path) => api::fst_load(path),
        None => INVALID_HANDLE,
    }
}

#[no_mangle]
pub extern "C" fn fst_save(handle: u32, path: *const c_char) -> u32 {
    match path_from_c(path) {
        Some(path) => api::fst_save(handle, path) as u32,
        None => FstErrorCode::InvalidArg as u32,
    }
}

#[no_mangle]
pub extern "C" fn fst_compose(a: u32, b: u32) -> u32 {
    api::fst_compose(a, b)
}

#[no_mangle]
pub extern "C" fn fst_determinize(handle: u32) -> u32 {
    api::fst_determinize(handle)
}

#[no_mangle]
pub extern "C" fn fst_minimize(handle: u32) -> u32 {
    api::fst_minimize(handle) as u32
}

#[no_mangle]
pub extern "C" fn fst_rm_epsilon(handle: u32) -> u32 {
    api::fst_rm_epsilon(handle)
}

#[no_mangle]
pub extern "C" fn fst_shortest_path(handle: u32, n: u32) -> u32 {
    api::fst_shortest_path(handle, n)
}

#[no_mangle]
pub extern "C" fn fst_union(a: u32, b: u32) -> u32 {
    api::fst_union(a, b) as u32
}

#[no_mangle]
pub extern "C" fn fst_concat(a: u32, b: u32) -> u32 {
    api::fst_concat(a, b) as u32
}

#[no_mangle]
pub extern "C" fn fst_closure(handle: u32, closure_type: i32) -> u32 {
    match ClosureType::from_raw(closure_type) {
        Some(kind) => api::fst_closure(handle, kind) as u32,
        None => FstErrorCode::InvalidArg as u32,
    }
}

#[no_mangle]
pub extern "C" fn fst_invert(handle: u32) {
    api::fst_invert(handle);
}

#[no_mangle]
pub extern "C" fn fst_optimize(handle: u32) -> u32 {
    api::fst_optimize(handle)
}

#[no_mangle]
pub extern "C" fn fst_cdrewrite(tau: u32, lambda: u32, rho: u32, sigma: u32) -> u32 {
    api::fst_cdrewrite(tau, lambda, rho, sigma)
}

#[no_mangle]
pub extern "C" fn fst_difference(a: u32, b: u32) -> u32 {
    api::fst_difference(a, b)
}

#[no_mangle]
pub extern "C" fn fst_replace(
    root: u32,
    labels: *const u32,
    fsts: *const u32,
    num_pairs: u32,
) -> u32 {
    if num_pairs > 0 && (labels.is_null() || fsts.is_null()) {
        return INVALID_HANDLE;
    }
    let pairs: Vec<(u32, u32)> = if num_pairs == 0 {
        Vec::new()
    } else {
        let labels = unsafe { slice::from_raw_parts(labels, num_pairs as usize) };
        let fsts = unsafe { slice::from_raw_parts(fsts, num_pairs as usize) };
        labels.iter().copied().zip(fsts.iter().copied()).collect()
    };
    api::fst_replace(root, &pairs)
}

#[no_mangle]
pub extern "C" fn fst_project(handle: u32, side: i32) {
    if let Some(side) = ProjectType::from_raw(side) {
        api::fst_project(handle, side);
    }
}

#[no_mangle]
pub extern "C" fn fst_compile_string(input: *const u8, len: u32) -> u32 {
    if input.is_null() && len > 0 {
        return INVALID_HANDLE;
    }
    let bytes = if len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(input, len as usize) }
    };
    api::fst_compile_string(bytes)
}

#[no_mangle]
pub extern "C" fn fst_print_string(handle: u32, buf: *mut u8, buf_len: u32) -> i32 {
    let buf = if buf.is_null() || buf_len == 0 {
        &mut []
    } else {
        unsafe { slice::from_raw_parts_mut(buf, buf_len as usize) }
    };
    api::fst_print_string(handle, buf)
}

#[no_mangle]
pub extern "C" fn fst_teardown() {
    api::fst_teardown();
}
