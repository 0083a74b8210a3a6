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

//! N-best path extraction.
//!
//! Best-first search over path prefixes: every queue entry is a distinct
//! path (arena node with a back-pointer), ordered by accumulated cost.
//! Reaching a final state enqueues a completion entry whose cost folds in
//! the final weight; with non-negative weights a prefix cost lower-bounds
//! every completion built on it, so completions pop in global order of
//! total path weight. Each state is expanded at most N times, which bounds
//! the search on cyclic graphs.

use crate::errors::FstError;
use crate::semiring;
use crate::types::{FstArc, MutableFst, EPSILON};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const NO_NODE: u32 = u32::MAX;

struct PathNode {
    state: u32,
    parent: u32,
    arc: Option<FstArc>,
}

struct QueueEntry {
    cost: f64,
    node: u32,
    complete: bool,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed: BinaryHeap is a max-heap, we pop the cheapest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn check_nonnegative(fst: &MutableFst) -> Result<(), FstError> {
    for s in 0..fst.num_states() {
        let fw = fst.final_weight(s);
        if !semiring::is_zero(fw) && fw < 0.0 {
            return Err(FstError::InvalidState(
                "shortest-path requires non-negative weights",
            ));
        }
        for arc in fst.arcs(s) {
            if arc.weight < 0.0 {
                return Err(FstError::InvalidState(
                    "shortest-path requires non-negative weights",
                ));
            }
        }
    }
    Ok(())
}

/// Builds a transducer accepting the `n` lowest-weight input/output pairs
/// of `fst`, in non-decreasing weight order. N=1 yields a bare chain; for
/// larger N the chains share a fresh ε-start. Fewer than `n` accepting
/// paths simply yields fewer chains.
pub fn shortest_path(fst: &MutableFst, n: u32) -> Result<MutableFst, FstError> {
    check_nonnegative(fst)?;
    let mut out = MutableFst::new();
    if n == 0 || !fst.has_start() {
        return Ok(out);
    }

    let mut nodes: Vec<PathNode> = vec![PathNode {
        state: fst.start(),
        parent: NO_NODE,
        arc: None,
    }];
    let mut heap: BinaryHeap<QueueEntry> = BinaryHeap::new();
    heap.push(QueueEntry {
        cost: semiring::ONE,
        node: 0,
        complete: false,
    });
    let mut pop_count = vec![0u32; fst.num_states() as usize];
    let mut found: Vec<u32> = Vec::new();

    while let Some(entry) = heap.pop() {
        if entry.complete {
            found.push(entry.node);
            if found.len() == n as usize {
                break;
            }
            continue;
        }

        let state = nodes[entry.node as usize].state;
        if pop_count[state as usize] >= n {
            continue;
        }
        pop_count[state as usize] += 1;

        let final_weight = fst.final_weight(state);
        if !semiring::is_zero(final_weight) {
            heap.push(QueueEntry {
                cost: semiring::times(entry.cost, final_weight),
                node: entry.node,
                complete: true,
            });
        }

        for arc in fst.arcs(state) {
            if semiring::is_zero(arc.weight) {
                continue;
            }
            let node = nodes.len() as u32;
            nodes.push(PathNode {
                state: arc.nextstate,
                parent: entry.node,
                arc: Some(*arc),
            });
            heap.push(QueueEntry {
                cost: semiring::times(entry.cost, arc.weight),
                node,
                complete: false,
            });
        }
    }

    tracing::debug!(requested = n, found = found.len(), "shortest-path search done");

    let chains: Vec<(Vec<FstArc>, f64)> = found
        .iter()
        .map(|&tail| {
            let final_weight = fst.final_weight(nodes[tail as usize].state);
            let mut arcs = Vec::new();
            let mut cursor = tail;
            while cursor != NO_NODE {
                let node = &nodes[cursor as usize];
                if let Some(arc) = node.arc {
                    arcs.push(arc);
                }
                cursor = node.parent;
            }
            arcs.reverse();
            (arcs, final_weight)
        })
        .collect();

    if chains.is_empty() {
        return Ok(out);
    }

    let fan_start = if n > 1 {
        let s = out.add_state();
        out.set_start(s)?;
        Some(s)
    } else {
        None
    };

    for (arcs, final_weight) in chains {
        let head = out.add_state();
        match fan_start {
            Some(s) => out.add_arc(s, EPSILON, EPSILON, semiring::ONE, head)?,
            None => out.set_start(head)?,
        }
        let mut prev = head;
        for arc in arcs {
            let next = out.add_state();
            out.add_arc(prev, arc.ilabel, arc.olabel, arc.weight, next)?;
            prev = next;
        }
        out.set_final(prev, final_weight)?;
    }
    Ok(out)
}
