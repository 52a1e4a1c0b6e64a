use serde::{Deserialize, Serialize};

/// Relative weights of the match sub-scores. Only the ratios matter; the scorer normalizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub specialization: f64,
    pub proximity: f64,
    pub availability: f64,
    pub rating: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            specialization: 0.4,
            proximity: 0.25,
            availability: 0.25,
            rating: 0.1,
        }
    }
}

impl MatchWeights {
    /// Negative and non-finite weights are treated as zero. Falls back to defaults when every
    /// weight is zero.
    pub fn sanitized(self) -> Self {
        let clean = |value: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                0.0
            }
        };

        let sanitized = Self {
            specialization: clean(self.specialization),
            proximity: clean(self.proximity),
            availability: clean(self.availability),
            rating: clean(self.rating),
        };

        if sanitized.total() > 0.0 {
            sanitized
        } else {
            Self::default()
        }
    }

    pub fn total(&self) -> f64 {
        self.specialization + self.proximity + self.availability + self.rating
    }
}
