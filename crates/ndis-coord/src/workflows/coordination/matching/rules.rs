use chrono::Duration;

use super::super::domain::{ServiceRequest, Worker};
use super::config::MatchWeights;
use super::{MatchFactor, ScoreComponent};

const NEUTRAL_RATING: f64 = 0.5;
const EXACT_CATEGORY: f64 = 1.0;
const RELATED_CATEGORY: f64 = 0.5;
const COVERAGE_SHARE: f64 = 0.7;

pub(crate) fn score_worker(
    worker: &Worker,
    request: &ServiceRequest,
    weights: &MatchWeights,
) -> (Vec<ScoreComponent>, f64) {
    let weights = weights.sanitized();

    let components = vec![
        specialization(worker, request, weights.specialization),
        proximity(worker, request, weights.proximity),
        availability(worker, request, weights.availability),
        rating(worker, weights.rating),
    ];

    let weighted: f64 = components
        .iter()
        .map(|component| component.sub_score * component.weight)
        .sum();
    let total = (weighted / weights.total() * 100.0).clamp(0.0, 100.0);

    (components, round_score(total))
}

pub(crate) fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn specialization(worker: &Worker, request: &ServiceRequest, weight: f64) -> ScoreComponent {
    let required = &request.required_specializations;
    let coverage = if required.is_empty() {
        1.0
    } else {
        let held = required
            .iter()
            .filter(|category| worker.specializations.contains(category))
            .count();
        held as f64 / required.len() as f64
    };

    let (category_fit, note) = if worker.specializations.contains(&request.category) {
        (EXACT_CATEGORY, "exact category match")
    } else if worker
        .specializations
        .iter()
        .any(|held| held.family() == request.category.family())
    {
        (RELATED_CATEGORY, "related category match")
    } else {
        (0.0, "no category match")
    };

    let sub_score = COVERAGE_SHARE * coverage + (1.0 - COVERAGE_SHARE) * category_fit;

    ScoreComponent {
        factor: MatchFactor::Specialization,
        sub_score,
        weight,
        notes: format!(
            "{:.0}% of required specializations, {}",
            coverage * 100.0,
            note
        ),
    }
}

fn proximity(worker: &Worker, request: &ServiceRequest, weight: f64) -> ScoreComponent {
    let distance = worker.location.distance_km(&request.location);
    let radius = worker.working_radius_km;

    let sub_score = if !distance.is_finite() {
        0.0
    } else if radius > 0.0 {
        (1.0 - distance / radius).clamp(0.0, 1.0)
    } else if distance <= f64::EPSILON {
        1.0
    } else {
        0.0
    };

    ScoreComponent {
        factor: MatchFactor::Proximity,
        sub_score,
        weight,
        notes: format!("{:.1} km of {:.1} km radius", distance, radius),
    }
}

fn availability(worker: &Worker, request: &ServiceRequest, weight: f64) -> ScoreComponent {
    let window = request.preferred_window;
    let requested = window.duration();

    let sub_score = if requested > Duration::zero() {
        let covered: i64 = worker
            .availability
            .iter()
            .map(|slot| slot.overlap(&window).num_minutes())
            .sum();
        (covered as f64 / requested.num_minutes() as f64).clamp(0.0, 1.0)
    } else if worker
        .availability
        .iter()
        .any(|slot| slot.contains(window.start))
    {
        1.0
    } else {
        0.0
    };

    ScoreComponent {
        factor: MatchFactor::Availability,
        sub_score,
        weight,
        notes: format!("{:.0}% of preferred window available", sub_score * 100.0),
    }
}

fn rating(worker: &Worker, weight: f64) -> ScoreComponent {
    let (sub_score, notes) = match worker.average_rating() {
        Some(average) => {
            let normalized = ((f64::from(average) - 1.0) / 4.0).clamp(0.0, 1.0);
            (
                normalized,
                format!(
                    "average rating {:.2} over {} service(s)",
                    average,
                    worker.ratings.len()
                ),
            )
        }
        None => (NEUTRAL_RATING, "no rating history".to_string()),
    };

    ScoreComponent {
        factor: MatchFactor::Rating,
        sub_score,
        weight,
        notes,
    }
}
