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
use once_cell::sync::Lazy;
use std::env;

/// Upper bound on subsets emitted by determinization.
///
/// Weighted subset construction diverges on inputs with unbounded residual
/// growth; once this many subset states have been emitted the operation
/// aborts with `INVALID_STATE` instead of looping.
///
/// Set via the `FST_DETERMINIZE_STATE_LIMIT` environment variable:
/// ```bash
/// export FST_DETERMINIZE_STATE_LIMIT=[INTEGER]
/// ```
/// Default: 1_000_000 subsets.
pub static DETERMINIZE_STATE_LIMIT: Lazy<usize> = Lazy::new(|| {
    env::var("FST_DETERMINIZE_STATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000_000)
});

/// Upper bound on product states emitted by composition.
///
/// The filtered product is finite (at most |A| x |B| x 3 states) but can be
/// enormous; this cap turns a runaway construction into `INVALID_STATE`
/// before it exhausts memory.
///
/// Set via the `FST_COMPOSE_STATE_LIMIT` environment variable:
/// ```bash
/// export FST_COMPOSE_STATE_LIMIT=[INTEGER]
/// ```
/// Default: 8_000_000 states.
pub static COMPOSE_STATE_LIMIT: Lazy<usize> = Lazy::new(|| {
    env::var("FST_COMPOSE_STATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8_000_000)
});
