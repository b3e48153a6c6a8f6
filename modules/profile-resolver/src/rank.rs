// Composite scoring, deterministic ordering and final selection.

use std::cmp::Ordering;

use tracing::info;

use crate::config::ResolverConfig;
use crate::types::{Candidate, Classification, DecisionReason, RankedResult, ResolutionOutcome};

/// Weights for one run. `classification + similarity == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub classification: f64,
    pub similarity: f64,
    /// Stand-in for a missing similarity in the composite. Display only: the
    /// tiering in [`rank`] keeps such candidates below any with a real score.
    pub neutral_similarity: f64,
}

impl RankingWeights {
    /// Similarity dominates when a usable reference logo exists and is
    /// ignored otherwise.
    pub fn for_run(config: &ResolverConfig, has_reference: bool) -> Self {
        let similarity = if has_reference { config.similarity_weight } else { 0.0 };
        Self {
            classification: 1.0 - similarity,
            similarity,
            neutral_similarity: config.neutral_similarity,
        }
    }

    pub fn composite(&self, candidate: &Candidate) -> f64 {
        if !candidate.is_fetched() {
            return f64::NEG_INFINITY;
        }
        let similarity = candidate.similarity_score.unwrap_or(self.neutral_similarity);
        self.classification * candidate.classification_confidence + self.similarity * similarity
    }
}

/// Scored candidates first, then fetched ones without a score, then failures.
fn tier(candidate: &Candidate) -> u8 {
    match (candidate.is_fetched(), candidate.similarity_score.is_some()) {
        (true, true) => 0,
        (true, false) => 1,
        (false, _) => 2,
    }
}

fn compare(a: &(Candidate, f64), b: &(Candidate, f64)) -> Ordering {
    let (ca, sa) = a;
    let (cb, sb) = b;
    tier(ca)
        .cmp(&tier(cb))
        .then_with(|| sb.total_cmp(sa))
        .then_with(|| {
            let la = ca.classification == Classification::LinkedInCompany;
            let lb = cb.classification == Classification::LinkedInCompany;
            lb.cmp(&la)
        })
        .then_with(|| ca.path_depth().cmp(&cb.path_depth()))
        .then_with(|| ca.url.cmp(&cb.url))
}

/// Order candidates into 1-based ranks. The result depends only on candidate
/// contents, never on the order they arrive in.
pub fn rank(candidates: Vec<Candidate>, weights: &RankingWeights) -> Vec<RankedResult> {
    let mut scored: Vec<(Candidate, f64)> = candidates
        .into_iter()
        .map(|c| {
            let score = weights.composite(&c);
            (c, score)
        })
        .collect();
    scored.sort_by(compare);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (candidate, composite_score))| RankedResult {
            candidate,
            composite_score,
            rank: i + 1,
        })
        .collect()
}

/// Pick the winner from a ranked list.
pub fn select(all_ranked: Vec<RankedResult>, high_confidence_threshold: f64) -> ResolutionOutcome {
    let Some(top) = all_ranked.first() else {
        return ResolutionOutcome::terminal(DecisionReason::NoCandidates);
    };

    let (selected, decision_reason) = if !top.candidate.is_fetched() {
        (None, DecisionReason::AllFetchesFailed)
    } else if top.composite_score > high_confidence_threshold {
        (Some(top.candidate.clone()), DecisionReason::HighConfidenceMatch)
    } else {
        (Some(top.candidate.clone()), DecisionReason::BestAvailableNoStrongMatch)
    };

    info!(
        candidates = all_ranked.len(),
        selected = selected.as_ref().map(|c| c.url.as_str()).unwrap_or("-"),
        score = top.composite_score,
        reason = %decision_reason,
        "Selection complete"
    );

    ResolutionOutcome {
        selected,
        all_ranked,
        decision_reason,
    }
}
