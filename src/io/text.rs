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

//! Line-oriented text reader.
//!
//! Each non-empty line is either an arc, `src dst ilabel olabel [weight]`,
//! or a final state, `state [weight]`; the weight defaults to 0 in both
//! forms. States are created implicitly by mention and the first arc's
//! source becomes the start state.

use crate::errors::FstError;
use crate::semiring;
use crate::types::MutableFst;
use std::fs;
use std::path::Path;

fn parse_u32(field: &str) -> Result<u32, FstError> {
    field
        .parse()
        .map_err(|_| FstError::InvalidArg("malformed state or label field"))
}

fn parse_weight(field: &str) -> Result<f64, FstError> {
    let weight: f64 = field
        .parse()
        .map_err(|_| FstError::InvalidArg("malformed weight field"))?;
    semiring::check_weight(weight)?;
    Ok(weight)
}

fn ensure_state(fst: &mut MutableFst, state: u32) {
    while fst.num_states() <= state {
        fst.add_state();
    }
}

pub fn parse_text(content: &str) -> Result<MutableFst, FstError> {
    let mut fst = MutableFst::new();
    let mut saw_arc = false;

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            0 => continue,
            1 | 2 => {
                let state = parse_u32(fields[0])?;
                let weight = if fields.len() == 2 {
                    parse_weight(fields[1])?
                } else {
                    semiring::ONE
                };
                ensure_state(&mut fst, state);
                fst.set_final(state, weight)?;
            }
            4 | 5 => {
                let src = parse_u32(fields[0])?;
                let dst = parse_u32(fields[1])?;
                let ilabel = parse_u32(fields[2])?;
                let olabel = parse_u32(fields[3])?;
                let weight = if fields.len() == 5 {
                    parse_weight(fields[4])?
                } else {
                    semiring::ONE
                };
                ensure_state(&mut fst, src.max(dst));
                fst.add_arc(src, ilabel, olabel, weight, dst)?;
                if !saw_arc {
                    fst.set_start(src)?;
                    saw_arc = true;
                }
            }
            _ => return Err(FstError::InvalidArg("malformed text line")),
        }
    }
    Ok(fst)
}

pub fn read_text(path: &Path) -> Result<MutableFst, FstError> {
    let content = fs::read_to_string(path).map_err(|e| FstError::Io(e.to_string()))?;
    parse_text(&content)
}
