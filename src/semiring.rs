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

//! Tropical semiring: (ℝ ∪ {+∞}, min, +, +∞, 0).
//!
//! Weights are plain `f64` values. Legal weights are finite reals and +∞;
//! NaN and -∞ never enter the graph (rejected at the boundary with
//! `INVALID_ARG`). +∞ is the ⊕-identity and the ⊗-annihilator.

use crate::errors::FstError;

/// ⊕-identity / non-final marker.
pub const ZERO: f64 = f64::INFINITY;

/// ⊗-identity.
pub const ONE: f64 = 0.0;

#[inline(always)]
pub fn plus(a: f64, b: f64) -> f64 {
    a.min(b)
}

#[inline(always)]
pub fn times(a: f64, b: f64) -> f64 {
    // +∞ annihilates: inf + finite = inf under IEEE 754, and the boundary
    // keeps -∞ out, so plain addition is exact.
    a + b
}

#[inline(always)]
pub fn is_zero(w: f64) -> bool {
    w == f64::INFINITY
}

/// Exact bitwise key for hashing and equivalence of weights.
///
/// Determinization and minimization compare weights by identity, not by
/// tolerance; `to_bits` gives a stable `Eq`/`Hash`-able form.
#[inline(always)]
pub fn weight_key(w: f64) -> u64 {
    w.to_bits()
}

/// Validates a weight arriving from the caller.
pub fn check_weight(w: f64) -> Result<(), FstError> {
    if w.is_nan() {
        return Err(FstError::InvalidArg("weight is NaN"));
    }
    if w == f64::NEG_INFINITY {
        return Err(FstError::InvalidArg("weight is -inf"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities() {
        assert_eq!(plus(ZERO, 3.5), 3.5);
        assert_eq!(plus(3.5, ZERO), 3.5);
        assert_eq!(times(ONE, 3.5), 3.5);
        assert_eq!(times(ZERO, 3.5), ZERO);
        assert_eq!(times(3.5, ZERO), ZERO);
        assert!(is_zero(ZERO));
        assert!(!is_zero(ONE));
    }

    #[test]
    fn test_plus_is_min() {
        assert_eq!(plus(2.0, 5.0), 2.0);
        assert_eq!(plus(-1.0, 1.0), -1.0);
    }

    #[test]
    fn test_weight_validation() {
        assert!(check_weight(0.0).is_ok());
        assert!(check_weight(-4.25).is_ok());
        assert!(check_weight(f64::INFINITY).is_ok());
        assert!(check_weight(f64::NAN).is_err());
        assert!(check_weight(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_weight_key_distinguishes_zero_signs() {
        // 0.0 and -0.0 compare equal but hash differently; callers normalise
        // through arithmetic, so both keys just need to be stable.
        assert_eq!(weight_key(1.5), weight_key(1.5));
        assert_ne!(weight_key(1.5), weight_key(2.5));
    }
}
