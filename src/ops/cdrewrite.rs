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

//! Context-dependent rewrite compilation, after Mohri & Sproat:
//! τ applied in the context λ _ ρ over σ*, via marker insertion, marked
//! rewriting, and context filtering.
//!
//! Application is obligatory and left-to-right: every occurrence of τ's
//! domain whose right context matches ρ on the input side and whose left
//! context matches λ on the (already rewritten) output side is rewritten.
//! The rule transducer is the composition of five factors:
//!
//! 1. `r`: inserts a right marker `>` before every ρ-occurrence.
//! 2. `f`: inserts `<1` or `<2` (a nondeterministic choice) before every
//!    occurrence of dom(τ) followed by `>`.
//! 3. `repl`: rewrites `<1 φ >` through τ, passes `<2 φ >` unchanged, and
//!    deletes stray `>` markers.
//! 4. `l1`: admits (and deletes) `<1` only immediately after a λ-match.
//! 5. `l2`: forbids (and otherwise deletes) `<2` immediately after a
//!    λ-match, forcing the rewrite wherever both contexts hold.
//!
//! Context acceptors contribute their languages only; their weights are
//! discarded. τ's weights ride through the rewrite branch of `repl`.
//! Marker labels are allocated past every label in the four operands.

use crate::errors::FstError;
use crate::ops::{basic, compose, determinize, rmepsilon};
use crate::semiring;
use crate::types::{FstArc, MutableFst, ProjectType, EPSILON};
use rustc_hash::FxHashSet;

/// Single-state identity acceptor of `labels`*.
fn sigma_star(labels: &[u32]) -> MutableFst {
    let mut fst = MutableFst::new();
    let s = fst.add_state();
    fst.start = s;
    fst.states[s as usize].final_weight = semiring::ONE;
    for &label in labels {
        fst.states[s as usize]
            .arcs
            .push(FstArc::new(label, label, semiring::ONE, s));
    }
    fst
}

/// Two-state acceptor of the single-symbol string `label`.
fn symbol(label: u32) -> MutableFst {
    let mut fst = MutableFst::new();
    let s0 = fst.add_state();
    let s1 = fst.add_state();
    fst.start = s0;
    fst.states[s0 as usize]
        .arcs
        .push(FstArc::new(label, label, semiring::ONE, s1));
    fst.states[s1 as usize].final_weight = semiring::ONE;
    fst
}

/// Input-side language of a transducer with every weight flattened to 1̄.
fn unweighted_domain(fst: &MutableFst) -> MutableFst {
    let mut out = fst.clone();
    basic::project(&mut out, ProjectType::Input);
    for state in out.states.iter_mut() {
        if !semiring::is_zero(state.final_weight) {
            state.final_weight = semiring::ONE;
        }
        for arc in state.arcs.iter_mut() {
            arc.weight = semiring::ONE;
        }
    }
    out
}

/// Reversal: arcs flip direction, a fresh start reaches the old finals by
/// ε:ε arcs carrying their weights, and the old start becomes final.
fn reverse(fst: &MutableFst) -> MutableFst {
    let mut out = MutableFst::new();
    for _ in 0..fst.num_states() {
        out.add_state();
    }
    let new_start = out.add_state();
    out.start = new_start;
    for s in 0..fst.num_states() {
        for arc in fst.arcs(s) {
            out.states[arc.nextstate as usize]
                .arcs
                .push(FstArc::new(arc.ilabel, arc.olabel, arc.weight, s));
        }
        let weight = fst.final_weight(s);
        if !semiring::is_zero(weight) {
            out.states[new_start as usize]
                .arcs
                .push(FstArc::new(EPSILON, EPSILON, weight, s));
        }
    }
    if fst.has_start() {
        out.states[fst.start() as usize].final_weight = semiring::ONE;
    }
    out
}

/// Identity self-loops added at every state, for symbols a factor must let
/// pass transparently.
fn add_self_loops(fst: &mut MutableFst, loops: &[(u32, u32)]) {
    for (idx, state) in fst.states.iter_mut().enumerate() {
        for &(ilabel, olabel) in loops {
            state
                .arcs
                .push(FstArc::new(ilabel, olabel, semiring::ONE, idx as u32));
        }
    }
}

/// Deterministic acceptor of `alphabet`* · L(beta), complete over
/// `alphabet`; final states mark every position where a beta-match ends.
fn match_dfa(beta: &MutableFst, alphabet: &[u32]) -> Result<MutableFst, FstError> {
    let mut lang = sigma_star(alphabet);
    basic::concat(&mut lang, beta);
    let lang = rmepsilon::rm_epsilon(&lang)?;
    determinize::determinize(&lang)
}

/// Transducer over `alphabet`* that obligatorily inserts one marker drawn
/// from `markers` after every prefix in `alphabet`* · L(beta).
///
/// Built by splitting each final DFA state q into (q, q~): q keeps the
/// incoming arcs and only emits a marker; q~ carries q's out-arcs and the
/// end-of-input acceptance. Runs are thereby forced through the marker at
/// every match end.
fn insert_marker(
    beta: &MutableFst,
    alphabet: &[u32],
    markers: &[u32],
) -> Result<MutableFst, FstError> {
    let dfa = match_dfa(beta, alphabet)?;
    if !dfa.has_start() {
        // No match is ever possible; the inserter is the identity.
        return Ok(sigma_star(alphabet));
    }

    let mut out = MutableFst::new();
    for _ in 0..dfa.num_states() {
        out.add_state();
    }
    for q in 0..dfa.num_states() {
        if dfa.is_final(q) {
            let twin = out.add_state();
            for &marker in markers {
                out.add_arc(q, EPSILON, marker, semiring::ONE, twin)?;
            }
            for arc in dfa.arcs(q) {
                out.add_arc(twin, arc.ilabel, arc.ilabel, semiring::ONE, arc.nextstate)?;
            }
            out.set_final(twin, semiring::ONE)?;
        } else {
            for arc in dfa.arcs(q) {
                out.add_arc(q, arc.ilabel, arc.ilabel, semiring::ONE, arc.nextstate)?;
            }
            out.set_final(q, semiring::ONE)?;
        }
    }
    out.set_start(dfa.start())?;
    Ok(out)
}

/// Filter over marked text: at states where the λ-DFA finality equals
/// `admit_at_final`, `marker` is consumed and deleted; elsewhere it kills
/// the path. `transparent` symbols pass everywhere unchanged.
fn marker_filter(
    dfa: &MutableFst,
    marker: u32,
    admit_at_final: bool,
    transparent: &[u32],
) -> Result<MutableFst, FstError> {
    let mut out = MutableFst::new();
    for _ in 0..dfa.num_states() {
        out.add_state();
    }
    for q in 0..dfa.num_states() {
        for arc in dfa.arcs(q) {
            out.add_arc(q, arc.ilabel, arc.ilabel, semiring::ONE, arc.nextstate)?;
        }
        if dfa.is_final(q) == admit_at_final {
            out.add_arc(q, marker, EPSILON, semiring::ONE, q)?;
        }
        for &t in transparent {
            out.add_arc(q, t, t, semiring::ONE, q)?;
        }
        out.set_final(q, semiring::ONE)?;
    }
    if dfa.has_start() {
        out.set_start(dfa.start())?;
    }
    Ok(out)
}

/// The rewriting factor: outside text passes through and stray `>` markers
/// are deleted; `<1` enters a spliced copy of τ whose finals exit on `>`;
/// `<2` enters an identity copy of dom(τ). Markers embedded inside a
/// bracketed region belong to occurrences the region already consumed and
/// are silently dropped there.
fn build_repl(
    tau: &MutableFst,
    phi: &MutableFst,
    sigma_labels: &[u32],
    m_lb1: u32,
    m_lb2: u32,
    m_rb: u32,
) -> Result<MutableFst, FstError> {
    let transparent = [
        (m_rb, EPSILON),
        (m_lb1, EPSILON),
        (m_lb2, EPSILON),
    ];

    let mut out = MutableFst::new();
    let outside = out.add_state();
    out.set_start(outside)?;
    out.set_final(outside, semiring::ONE)?;
    for &label in sigma_labels {
        out.add_arc(outside, label, label, semiring::ONE, outside)?;
    }
    out.add_arc(outside, m_rb, EPSILON, semiring::ONE, outside)?;

    for (entry_marker, body) in [(m_lb1, tau), (m_lb2, phi)] {
        if !body.has_start() {
            continue;
        }
        let mut branch = body.clone();
        add_self_loops(&mut branch, &transparent);
        let delta = basic::splice_states(&mut out, &branch);
        out.add_arc(
            outside,
            entry_marker,
            entry_marker,
            semiring::ONE,
            branch.start() + delta,
        )?;
        for s in 0..branch.num_states() {
            let spliced = s + delta;
            let weight = out.states[spliced as usize].final_weight;
            if semiring::is_zero(weight) {
                continue;
            }
            out.states[spliced as usize].final_weight = semiring::ZERO;
            out.states[spliced as usize]
                .arcs
                .push(FstArc::new(m_rb, EPSILON, weight, outside));
        }
    }
    Ok(out)
}

fn collect_labels(fsts: &[&MutableFst], input_side: bool, into: &mut FxHashSet<u32>) {
    for fst in fsts {
        for s in 0..fst.num_states() {
            for arc in fst.arcs(s) {
                let label = if input_side { arc.ilabel } else { arc.olabel };
                if label != EPSILON {
                    into.insert(label);
                }
            }
        }
    }
}

/// Compiles τ / λ _ ρ over σ* into a single rewrite transducer.
pub fn cdrewrite(
    tau: &MutableFst,
    lambda: &MutableFst,
    rho: &MutableFst,
    sigma: &MutableFst,
) -> Result<MutableFst, FstError> {
    let mut sigma_labels: Vec<u32> = {
        let mut set = FxHashSet::default();
        collect_labels(&[sigma], true, &mut set);
        set.into_iter().collect()
    };
    sigma_labels.sort_unstable();

    let max_label = tau
        .max_label()
        .max(lambda.max_label())
        .max(rho.max_label())
        .max(sigma.max_label());
    let m_rb = max_label + 1;
    let m_lb1 = max_label + 2;
    let m_lb2 = max_label + 3;

    let phi = unweighted_domain(tau);
    let lambda_lang = unweighted_domain(lambda);
    let rho_lang = unweighted_domain(rho);

    // r: mark every position where a ρ-match begins, by inserting after
    // every reverse(ρ)-match end in the reversed string.
    let r = reverse(&insert_marker(
        &reverse(&rho_lang),
        &sigma_labels,
        &[m_rb],
    )?);

    // f: mark every occurrence of dom(τ) followed by `>`, choosing <1 or
    // <2. The domain is made `>`-transparent so ρ-marks falling inside an
    // occurrence do not break the match.
    let f = {
        let mut phi_rb = phi.clone();
        add_self_loops(&mut phi_rb, &[(m_rb, m_rb)]);
        basic::concat(&mut phi_rb, &symbol(m_rb));
        let mut extended = sigma_labels.clone();
        extended.push(m_rb);
        reverse(&insert_marker(&reverse(&phi_rb), &extended, &[m_lb1, m_lb2])?)
    };

    let repl = build_repl(tau, &phi, &sigma_labels, m_lb1, m_lb2, m_rb)?;

    // λ filters run on rewritten text, so their machines must be total
    // over σ plus anything τ can emit.
    let lambda_dfa = {
        let mut output_labels = FxHashSet::default();
        for &label in &sigma_labels {
            output_labels.insert(label);
        }
        collect_labels(&[tau], false, &mut output_labels);
        let mut sorted: Vec<u32> = output_labels.into_iter().collect();
        sorted.sort_unstable();
        match_dfa(&lambda_lang, &sorted)?
    };
    let l1 = marker_filter(&lambda_dfa, m_lb1, true, &[m_lb2])?;
    let l2 = marker_filter(&lambda_dfa, m_lb2, false, &[])?;

    let chain = compose::compose(&r, &f)?;
    let chain = compose::compose(&chain, &repl)?;
    let chain = compose::compose(&chain, &l1)?;
    let result = compose::compose(&chain, &l2)?;

    tracing::debug!(
        states = result.num_states(),
        arcs = result.total_arcs(),
        "context-dependent rewrite compiled"
    );
    Ok(result)
}
