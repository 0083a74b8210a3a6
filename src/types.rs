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
use crate::errors::FstError;
use crate::semiring;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Reserved empty label, legal on either side of an arc.
pub const EPSILON: u32 = 0;

/// Sentinel for "no state": unset start, or a state-returning call that failed.
pub const NO_STATE: u32 = u32::MAX;

/// Sentinel returned by handle-producing calls that failed.
pub const INVALID_HANDLE: u32 = u32::MAX;

/// One transition: input label, output label, tropical weight, target state.
///
/// This is the boundary record; embedding hosts see it bit-for-bit.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FstArc {
    pub ilabel: u32,
    pub olabel: u32,
    pub weight: f64,
    pub nextstate: u32,
}

impl FstArc {
    #[inline(always)]
    pub fn new(ilabel: u32, olabel: u32, weight: f64, nextstate: u32) -> Self {
        FstArc {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }

    /// Canonical order imposed by freeze: (ilabel, olabel, nextstate, weight).
    pub fn canonical_cmp(&self, other: &FstArc) -> Ordering {
        self.ilabel
            .cmp(&other.ilabel)
            .then(self.olabel.cmp(&other.olabel))
            .then(self.nextstate.cmp(&other.nextstate))
            .then(self.weight.total_cmp(&other.weight))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureType {
    Star,
    Plus,
    Question,
}

impl ClosureType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ClosureType::Star),
            1 => Some(ClosureType::Plus),
            2 => Some(ClosureType::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Input,
    Output,
}

impl ProjectType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ProjectType::Input),
            1 => Some(ProjectType::Output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MutableState {
    pub final_weight: f64,
    pub arcs: SmallVec<[FstArc; 4]>,
}

impl MutableState {
    fn new() -> Self {
        MutableState {
            final_weight: semiring::ZERO,
            arcs: SmallVec::new(),
        }
    }
}

/// Arc-list transducer under construction.
///
/// States are dense `0..num_states`; arcs live in per-state lists in
/// insertion order. The final weight +∞ marks a non-final state.
#[derive(Debug, Clone)]
pub struct MutableFst {
    pub(crate) states: Vec<MutableState>,
    pub(crate) start: u32,
}

impl Default for MutableFst {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableFst {
    pub fn new() -> Self {
        MutableFst {
            states: Vec::new(),
            start: NO_STATE,
        }
    }

    pub fn add_state(&mut self) -> u32 {
        let id = self.states.len() as u32;
        self.states.push(MutableState::new());
        id
    }

    pub fn set_start(&mut self, state: u32) -> Result<(), FstError> {
        if state as usize >= self.states.len() {
            return Err(FstError::InvalidArg("start state out of range"));
        }
        self.start = state;
        Ok(())
    }

    pub fn set_final(&mut self, state: u32, weight: f64) -> Result<(), FstError> {
        semiring::check_weight(weight)?;
        let slot = self
            .states
            .get_mut(state as usize)
            .ok_or(FstError::InvalidArg("state out of range"))?;
        slot.final_weight = weight;
        Ok(())
    }

    pub fn add_arc(
        &mut self,
        src: u32,
        ilabel: u32,
        olabel: u32,
        weight: f64,
        nextstate: u32,
    ) -> Result<(), FstError> {
        semiring::check_weight(weight)?;
        if nextstate as usize >= self.states.len() {
            return Err(FstError::InvalidArg("arc target out of range"));
        }
        let slot = self
            .states
            .get_mut(src as usize)
            .ok_or(FstError::InvalidArg("arc source out of range"))?;
        slot.arcs.push(FstArc::new(ilabel, olabel, weight, nextstate));
        Ok(())
    }

    #[inline(always)]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline(always)]
    pub fn has_start(&self) -> bool {
        self.start != NO_STATE
    }

    #[inline(always)]
    pub fn num_states(&self) -> u32 {
        self.states.len() as u32
    }

    pub fn num_arcs(&self, state: u32) -> u32 {
        self.states
            .get(state as usize)
            .map(|s| s.arcs.len() as u32)
            .unwrap_or(0)
    }

    /// Total arc count over all states.
    pub fn total_arcs(&self) -> u64 {
        self.states.iter().map(|s| s.arcs.len() as u64).sum()
    }

    /// +∞ for non-final and out-of-range states.
    pub fn final_weight(&self, state: u32) -> f64 {
        self.states
            .get(state as usize)
            .map(|s| s.final_weight)
            .unwrap_or(semiring::ZERO)
    }

    #[inline(always)]
    pub fn is_final(&self, state: u32) -> bool {
        !semiring::is_zero(self.final_weight(state))
    }

    /// Out-arcs of a state; empty for out-of-range states.
    pub fn arcs(&self, state: u32) -> &[FstArc] {
        self.states
            .get(state as usize)
            .map(|s| s.arcs.as_slice())
            .unwrap_or(&[])
    }

    /// Largest label value on any arc, ε included. 0 for an arc-free graph.
    pub fn max_label(&self) -> u32 {
        self.states
            .iter()
            .flat_map(|s| s.arcs.iter())
            .map(|a| a.ilabel.max(a.olabel))
            .max()
            .unwrap_or(0)
    }
}

/// Immutable transducer with a single packed arc array.
///
/// Arcs of state `s` occupy `arcs[offsets[s]..offsets[s + 1]]`, sorted in
/// canonical order. Queries never allocate and are safe from any thread.
#[derive(Debug, Clone)]
pub struct FrozenFst {
    start: u32,
    final_weights: Vec<f64>,
    offsets: Vec<u32>,
    arcs: Vec<FstArc>,
}

impl From<&MutableFst> for FrozenFst {
    fn from(fst: &MutableFst) -> FrozenFst {
        let mut offsets = Vec::with_capacity(fst.states.len() + 1);
        let mut arcs = Vec::with_capacity(fst.total_arcs() as usize);
        let mut final_weights = Vec::with_capacity(fst.states.len());

        offsets.push(0);
        for state in &fst.states {
            let mut sorted: Vec<FstArc> = state.arcs.to_vec();
            sorted.sort_by(FstArc::canonical_cmp);
            arcs.extend_from_slice(&sorted);
            offsets.push(arcs.len() as u32);
            final_weights.push(state.final_weight);
        }

        FrozenFst {
            start: fst.start,
            final_weights,
            offsets,
            arcs,
        }
    }
}

impl FrozenFst {
    /// Reassembles a frozen transducer from its stored parts. The caller
    /// guarantees the offsets are monotonic and the arc targets in range;
    /// the binary loader validates before calling.
    pub(crate) fn from_parts(
        start: u32,
        final_weights: Vec<f64>,
        offsets: Vec<u32>,
        arcs: Vec<FstArc>,
    ) -> Self {
        FrozenFst {
            start,
            final_weights,
            offsets,
            arcs,
        }
    }

    #[inline(always)]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline(always)]
    pub fn num_states(&self) -> u32 {
        self.final_weights.len() as u32
    }

    pub fn num_arcs(&self, state: u32) -> u32 {
        let s = state as usize;
        if s + 1 >= self.offsets.len() {
            return 0;
        }
        self.offsets[s + 1] - self.offsets[s]
    }

    pub fn final_weight(&self, state: u32) -> f64 {
        self.final_weights
            .get(state as usize)
            .copied()
            .unwrap_or(semiring::ZERO)
    }

    pub fn arcs(&self, state: u32) -> &[FstArc] {
        let s = state as usize;
        if s + 1 >= self.offsets.len() {
            return &[];
        }
        &self.arcs[self.offsets[s] as usize..self.offsets[s + 1] as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fst_is_empty() {
        let fst = MutableFst::new();
        assert_eq!(fst.num_states(), 0);
        assert_eq!(fst.start(), NO_STATE);
        assert!(!fst.has_start());
    }

    #[test]
    fn test_state_and_arc_edits() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 0.5).unwrap();
        fst.add_arc(s0, 1, 2, 3.0, s1).unwrap();

        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.num_arcs(s0), 1);
        assert_eq!(fst.num_arcs(s1), 0);
        assert_eq!(fst.final_weight(s1), 0.5);
        assert!(fst.final_weight(s0).is_infinite());
        assert_eq!(fst.arcs(s0)[0], FstArc::new(1, 2, 3.0, s1));
    }

    #[test]
    fn test_out_of_range_edits_rejected() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        assert!(fst.set_start(7).is_err());
        assert!(fst.set_final(7, 0.0).is_err());
        assert!(fst.add_arc(s0, 1, 1, 0.0, 7).is_err());
        assert!(fst.add_arc(7, 1, 1, 0.0, s0).is_err());
    }

    #[test]
    fn test_nan_weight_rejected() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        assert!(fst.set_final(s0, f64::NAN).is_err());
        assert!(fst.add_arc(s0, 1, 1, f64::NAN, s0).is_err());
    }

    #[test]
    fn test_freeze_preserves_contents() {
        let mut fst = MutableFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.set_final(s1, 1.5).unwrap();
        fst.add_arc(s0, 2, 2, 1.0, s1).unwrap();
        fst.add_arc(s0, 1, 1, 0.0, s1).unwrap();

        let frozen = FrozenFst::from(&fst);
        assert_eq!(frozen.num_states(), fst.num_states());
        assert_eq!(frozen.start(), fst.start());
        assert_eq!(frozen.num_arcs(s0), 2);
        assert_eq!(frozen.final_weight(s1), 1.5);
        // Canonical order sorts the ilabel-1 arc first.
        assert_eq!(frozen.arcs(s0)[0].ilabel, 1);
        assert_eq!(frozen.arcs(s0)[1].ilabel, 2);
        // The mutable source is untouched, insertion order intact.
        assert_eq!(fst.arcs(s0)[0].ilabel, 2);
    }

    #[test]
    fn test_canonical_order_ties() {
        let a = FstArc::new(1, 1, 2.0, 3);
        let b = FstArc::new(1, 1, 2.0, 4);
        let c = FstArc::new(1, 1, 1.0, 3);
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
        assert_eq!(c.canonical_cmp(&a), Ordering::Less);
    }
}
