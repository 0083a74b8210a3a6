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

//! Binary save/load of frozen transducers.
//!
//! Layout, all little-endian: magic `LFST`, version byte, `num_states`
//! u32, `num_arcs` u32, `start` u32, then per state a final weight (f64)
//! and arc count (u32), then every arc in state order as
//! (ilabel u32, olabel u32, weight f64, nextstate u32). Frozen arc order
//! is canonical, so save → load → save round-trips bit-identically.

use crate::errors::FstError;
use crate::types::{FrozenFst, FstArc, NO_STATE};
use std::fs;
use std::path::Path;

const MAGIC: [u8; 4] = *b"LFST";
const VERSION: u8 = 1;

pub fn encode(fst: &FrozenFst) -> Vec<u8> {
    let num_states = fst.num_states();
    let num_arcs: u32 = (0..num_states).map(|s| fst.num_arcs(s)).sum();

    let mut buf = Vec::with_capacity(
        MAGIC.len() + 1 + 12 + num_states as usize * 12 + num_arcs as usize * 20,
    );
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&num_states.to_le_bytes());
    buf.extend_from_slice(&num_arcs.to_le_bytes());
    buf.extend_from_slice(&fst.start().to_le_bytes());
    for s in 0..num_states {
        buf.extend_from_slice(&fst.final_weight(s).to_le_bytes());
        buf.extend_from_slice(&fst.num_arcs(s).to_le_bytes());
    }
    for s in 0..num_states {
        for arc in fst.arcs(s) {
            buf.extend_from_slice(&arc.ilabel.to_le_bytes());
            buf.extend_from_slice(&arc.olabel.to_le_bytes());
            buf.extend_from_slice(&arc.weight.to_le_bytes());
            buf.extend_from_slice(&arc.nextstate.to_le_bytes());
        }
    }
    buf
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FstError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| FstError::Io("truncated binary fst".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, FstError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, FstError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }
}

pub fn decode(buf: &[u8]) -> Result<FrozenFst, FstError> {
    let mut reader = Reader { buf, pos: 0 };
    if reader.take(4)? != MAGIC {
        return Err(FstError::Io("bad magic".to_string()));
    }
    if reader.take(1)?[0] != VERSION {
        return Err(FstError::Io("unsupported version".to_string()));
    }

    let num_states = reader.read_u32()?;
    let num_arcs = reader.read_u32()?;
    let start = reader.read_u32()?;
    if start != NO_STATE && start >= num_states {
        return Err(FstError::Io("start state out of range".to_string()));
    }

    let mut final_weights = Vec::with_capacity(num_states as usize);
    let mut offsets = Vec::with_capacity(num_states as usize + 1);
    offsets.push(0u32);
    let mut total: u64 = 0;
    for _ in 0..num_states {
        let weight = reader.read_f64()?;
        if weight.is_nan() {
            return Err(FstError::Io("corrupt final weight".to_string()));
        }
        final_weights.push(weight);
        total += reader.read_u32()? as u64;
        if total > num_arcs as u64 {
            return Err(FstError::Io("arc counts exceed header".to_string()));
        }
        offsets.push(total as u32);
    }
    if total != num_arcs as u64 {
        return Err(FstError::Io("arc counts disagree with header".to_string()));
    }

    let mut arcs = Vec::with_capacity(num_arcs as usize);
    for _ in 0..num_arcs {
        let ilabel = reader.read_u32()?;
        let olabel = reader.read_u32()?;
        let weight = reader.read_f64()?;
        let nextstate = reader.read_u32()?;
        if nextstate >= num_states {
            return Err(FstError::Io("arc target out of range".to_string()));
        }
        if weight.is_nan() {
            return Err(FstError::Io("corrupt arc weight".to_string()));
        }
        arcs.push(FstArc::new(ilabel, olabel, weight, nextstate));
    }
    if reader.pos != buf.len() {
        return Err(FstError::Io("trailing bytes after fst".to_string()));
    }

    Ok(FrozenFst::from_parts(start, final_weights, offsets, arcs))
}

pub fn save(fst: &FrozenFst, path: &Path) -> Result<(), FstError> {
    fs::write(path, encode(fst)).map_err(|e| FstError::Io(e.to_string()))
}

pub fn load(path: &Path) -> Result<FrozenFst, FstError> {
    let buf = fs::read(path).map_err(|e| FstError::Io(e.to_string()))?;
    decode(&buf)
}
