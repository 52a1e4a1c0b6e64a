mod config;
mod rules;

pub use config::MatchWeights;

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ServiceRequest, Worker, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    Specialization,
    Proximity,
    Availability,
    Rating,
}

/// One weighted contribution to a match score, kept for admin-facing explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: MatchFactor,
    pub sub_score: f64,
    pub weight: f64,
    pub notes: String,
}

/// Ranked entry returned to the admin when choosing a worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub score: f64,
    pub open_assignments: usize,
    pub hourly_rate: Decimal,
    pub registered_at: NaiveDateTime,
    pub components: Vec<ScoreComponent>,
}

/// Stateless scorer applying configurable weights.
#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    weights: MatchWeights,
}

impl MatchScorer {
    pub fn new(weights: MatchWeights) -> Self {
        Self {
            weights: weights.sanitized(),
        }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    /// Score in [0, 100], rounded to two decimals.
    pub fn score(&self, worker: &Worker, request: &ServiceRequest) -> f64 {
        rules::score_worker(worker, request, &self.weights).1
    }

    pub fn explain(&self, worker: &Worker, request: &ServiceRequest) -> (f64, Vec<ScoreComponent>) {
        let (components, score) = rules::score_worker(worker, request, &self.weights);
        (score, components)
    }

    /// Orders candidates by score, then fewer open assignments, lower hourly rate, earlier
    /// registration, and finally worker id so identical inputs always rank identically.
    pub fn rank(
        &self,
        request: &ServiceRequest,
        workers: &[&Worker],
        open_assignments: &HashMap<WorkerId, usize>,
    ) -> Vec<RankedCandidate> {
        let mut candidates: Vec<RankedCandidate> = workers
            .iter()
            .map(|worker| {
                let (score, components) = self.explain(worker, request);
                RankedCandidate {
                    rank: 0,
                    worker_id: worker.id.clone(),
                    worker_name: worker.name.clone(),
                    score,
                    open_assignments: open_assignments.get(&worker.id).copied().unwrap_or(0),
                    hourly_rate: worker.hourly_rate,
                    registered_at: worker.registered_at,
                    components,
                }
            })
            .collect();

        candidates.sort_by(compare_candidates);
        for (index, candidate) in candidates.iter_mut().enumerate() {
            candidate.rank = index + 1;
        }
        candidates
    }
}

fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.open_assignments.cmp(&b.open_assignments))
        .then_with(|| a.hourly_rate.cmp(&b.hourly_rate))
        .then_with(|| a.registered_at.cmp(&b.registered_at))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
}
