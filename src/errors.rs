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

/// Failure categories of the library.
///
/// Every fallible core operation returns `Result<_, FstError>`; the boundary
/// layer collapses the error into the matching [`FstErrorCode`] (or into a
/// sentinel value for handle/state/count returns).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FstError {
    #[error("allocation failed")]
    Oom,
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),
    #[error("operation precondition violated: {0}")]
    InvalidState(&'static str),
    #[error("i/o failure: {0}")]
    Io(String),
}

/// Numeric status codes surfaced at the handle boundary.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FstErrorCode {
    Ok = 0,
    Oom = 1,
    InvalidArg = 2,
    InvalidState = 3,
    IoError = 4,
}

impl From<&FstError> for FstErrorCode {
    fn from(err: &FstError) -> Self {
        match err {
            FstError::Oom => FstErrorCode::Oom,
            FstError::InvalidArg(_) => FstErrorCode::InvalidArg,
            FstError::InvalidState(_) => FstErrorCode::InvalidState,
            FstError::Io(_) => FstErrorCode::IoError,
        }
    }
}

impl FstErrorCode {
    pub fn from_result(result: Result<(), FstError>) -> Self {
        match result {
            Ok(()) => FstErrorCode::Ok,
            Err(err) => FstErrorCode::from(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(FstErrorCode::from(&FstError::Oom), FstErrorCode::Oom);
        assert_eq!(
            FstErrorCode::from(&FstError::InvalidArg("x")),
            FstErrorCode::InvalidArg
        );
        assert_eq!(
            FstErrorCode::from(&FstError::InvalidState("x")),
            FstErrorCode::InvalidState
        );
        assert_eq!(
            FstErrorCode::from(&FstError::Io("gone".to_string())),
            FstErrorCode::IoError
        );
        assert_eq!(FstErrorCode::from_result(Ok(())), FstErrorCode::Ok);
    }
}
