use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rates::RateTable;

const NIGHT_ENDS_HOUR: u32 = 6;
const EVENING_STARTS_HOUR: u32 = 18;
const NIGHT_STARTS_HOUR: u32 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    Evening,
    Night,
    Weekend,
    PublicHoliday,
}

impl PenaltyKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Evening => "Evening shift (18:00-22:00)",
            Self::Night => "Night shift (22:00-06:00)",
            Self::Weekend => "Weekend",
            Self::PublicHoliday => "Public holiday",
        }
    }
}

/// Contiguous slice of a shift priced at a single multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// `None` for ordinary time.
    pub penalty: Option<PenaltyKind>,
    pub multiplier: Decimal,
}

impl Segment {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Splits `[start, end)` at 00:00, 06:00, 18:00, and 22:00 and prices each piece by its own
/// wall-clock time.
pub(crate) fn split_shift(
    start: NaiveDateTime,
    end: NaiveDateTime,
    table: &RateTable,
) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let boundary = next_boundary(cursor).min(end);
        let (penalty, multiplier) = applicable_penalty(cursor, table);

        match segments.last_mut() {
            Some(last) if last.penalty == penalty && last.multiplier == multiplier => {
                last.end = boundary;
            }
            _ => segments.push(Segment {
                start: cursor,
                end: boundary,
                penalty,
                multiplier,
            }),
        }

        cursor = boundary;
    }

    segments
}

fn next_boundary(instant: NaiveDateTime) -> NaiveDateTime {
    let midnight = instant.date().and_time(NaiveTime::default());
    [NIGHT_ENDS_HOUR, EVENING_STARTS_HOUR, NIGHT_STARTS_HOUR]
        .into_iter()
        .map(|hour| midnight + Duration::hours(i64::from(hour)))
        .find(|boundary| *boundary > instant)
        .unwrap_or(midnight + Duration::days(1))
}

/// Highest applicable multiplier wins; loadings are never stacked. Equal multipliers resolve in
/// the order public holiday, weekend, night, evening.
fn applicable_penalty(instant: NaiveDateTime, table: &RateTable) -> (Option<PenaltyKind>, Decimal) {
    let date = instant.date();
    let hour = instant.hour();
    let rates = &table.penalties;

    let mut candidates = Vec::with_capacity(2);
    if table.is_public_holiday(date) {
        candidates.push((PenaltyKind::PublicHoliday, rates.public_holiday));
    }
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        candidates.push((PenaltyKind::Weekend, rates.weekend));
    }
    if hour < NIGHT_ENDS_HOUR || hour >= NIGHT_STARTS_HOUR {
        candidates.push((PenaltyKind::Night, rates.night));
    } else if hour >= EVENING_STARTS_HOUR {
        candidates.push((PenaltyKind::Evening, rates.evening));
    }

    candidates
        .into_iter()
        .filter(|(_, multiplier)| *multiplier > Decimal::ONE)
        .fold(None, |best: Option<(PenaltyKind, Decimal)>, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        })
        .map(|(kind, multiplier)| (Some(kind), multiplier))
        .unwrap_or((None, Decimal::ONE))
}
