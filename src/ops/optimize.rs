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

//! Optimization pipeline: ε-removal, determinization, minimization.
//!
//! ε-removal failure (a negative ε-cycle) is fatal. A later stage whose
//! precondition does not hold (non-functional input to determinize, or a
//! determinization that diverged) stops the pipeline and the last
//! successful intermediate is returned instead.

use crate::errors::FstError;
use crate::ops::{determinize, minimize, rmepsilon};
use crate::types::MutableFst;

pub fn optimize(fst: &MutableFst) -> Result<MutableFst, FstError> {
    let no_eps = rmepsilon::rm_epsilon(fst)?;

    let mut det = match determinize::determinize(&no_eps) {
        Ok(det) => det,
        Err(FstError::InvalidState(reason)) => {
            tracing::debug!(reason, "optimize stopped after epsilon removal");
            return Ok(no_eps);
        }
        Err(err) => return Err(err),
    };

    match minimize::minimize(&mut det) {
        Ok(()) => Ok(det),
        Err(FstError::InvalidState(reason)) => {
            tracing::debug!(reason, "optimize stopped after determinization");
            Ok(det)
        }
        Err(err) => Err(err),
    }
}
