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
pub mod api;
mod environment;
mod errors;
pub mod io;
pub mod ops;
mod registry;
pub mod semiring;
pub mod strings;
pub mod types;

mod bindings;

#[cfg(test)]
pub(crate) mod test_util;

pub use crate::errors::{FstError, FstErrorCode};
pub use crate::types::{
    ClosureType, FrozenFst, FstArc, MutableFst, ProjectType, EPSILON, INVALID_HANDLE, NO_STATE,
};
