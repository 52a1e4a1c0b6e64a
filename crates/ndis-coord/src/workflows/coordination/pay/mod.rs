//! SCHADS-style pay calculation for approved timesheets.
//!
//! A breakdown is a pure function of the timesheet and the rate table in force on the service
//! date: the same inputs always serialize to the same bytes. Loadings use the single highest
//! multiplier applicable to each wall-clock segment and are reported as deltas over base pay.

mod rates;
mod segments;

pub use rates::{
    PenaltyMultipliers, RateImportError, RateSchedule, RateTable, TravelAllowanceMethod,
};
pub use segments::PenaltyKind;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::domain::Timesheet;
use segments::{split_shift, Segment};

const MINUTES_PER_HOUR: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyLine {
    pub kind: PenaltyKind,
    pub rate_multiplier: Decimal,
    pub applicable_hours: Decimal,
    /// Amount above base pay for these hours.
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceKind {
    Travel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceLine {
    pub kind: AllowanceKind,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayBreakdown {
    pub classification: String,
    pub base_rate: Decimal,
    pub billable_hours: Decimal,
    pub base_amount: Decimal,
    pub penalties: Vec<PenaltyLine>,
    pub allowances: Vec<AllowanceLine>,
    pub total: Decimal,
    pub rate_table_effective_from: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayError {
    #[error("invalid timesheet: {reason}")]
    InvalidTimesheet { reason: String },
    #[error("classification '{classification}' has no base rate in the rate table")]
    UnknownClassification { classification: String },
    #[error("no rate table in force on {date}")]
    NoRateTableInForce { date: NaiveDate },
}

impl PayError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTimesheet {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayCalculator;

impl PayCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Selects the table in force on the timesheet date, then calculates.
    pub fn calculate_scheduled(
        &self,
        timesheet: &Timesheet,
        classification: &str,
        schedule: &RateSchedule,
    ) -> Result<PayBreakdown, PayError> {
        let table = schedule
            .in_force(timesheet.date)
            .ok_or(PayError::NoRateTableInForce {
                date: timesheet.date,
            })?;
        self.calculate(timesheet, classification, table)
    }

    pub fn calculate(
        &self,
        timesheet: &Timesheet,
        classification: &str,
        table: &RateTable,
    ) -> Result<PayBreakdown, PayError> {
        let start = timesheet.shift_start();
        let end = timesheet.shift_end();
        if end <= start {
            return Err(PayError::invalid("shift must end after it starts"));
        }

        let billable_minutes = timesheet.billable_minutes();
        if billable_minutes <= 0 {
            return Err(PayError::invalid(format!(
                "break of {} minute(s) leaves no billable time",
                timesheet.break_minutes
            )));
        }

        if timesheet
            .travel_kilometres
            .map(|km| km < Decimal::ZERO)
            .unwrap_or(false)
        {
            return Err(PayError::invalid("travel distance cannot be negative"));
        }

        let base_rate =
            table
                .base_rate(classification)
                .ok_or_else(|| PayError::UnknownClassification {
                    classification: classification.to_string(),
                })?;

        let base_amount = money(base_rate * minutes_to_hours(billable_minutes));

        let segments = split_shift(start, end, table);
        let paid = deduct_break(&segments, i64::from(timesheet.break_minutes));
        let penalties = penalty_lines(&segments, &paid, base_rate);
        let allowances = travel_allowance(timesheet, &table.travel)
            .into_iter()
            .collect::<Vec<_>>();

        let total = base_amount
            + penalties.iter().map(|line| line.amount).sum::<Decimal>()
            + allowances.iter().map(|line| line.amount).sum::<Decimal>();

        Ok(PayBreakdown {
            classification: classification.to_string(),
            base_rate,
            billable_hours: minutes_to_hours(billable_minutes).round_dp(2),
            base_amount,
            penalties,
            allowances,
            total,
            rate_table_effective_from: table.effective_from,
        })
    }
}

fn minutes_to_hours(minutes: i64) -> Decimal {
    Decimal::from(minutes) / Decimal::from(MINUTES_PER_HOUR)
}

fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unpaid break comes out of ordinary time first, then the lowest loading, latest segment first.
fn deduct_break(segments: &[Segment], break_minutes: i64) -> Vec<i64> {
    let mut paid: Vec<i64> = segments.iter().map(Segment::minutes).collect();
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|a, b| {
        segments[*a]
            .multiplier
            .cmp(&segments[*b].multiplier)
            .then_with(|| b.cmp(a))
    });

    let mut remaining = break_minutes.max(0);
    for index in order {
        if remaining == 0 {
            break;
        }
        let taken = paid[index].min(remaining);
        paid[index] -= taken;
        remaining -= taken;
    }

    paid
}

fn penalty_lines(segments: &[Segment], paid: &[i64], base_rate: Decimal) -> Vec<PenaltyLine> {
    let mut totals: Vec<(PenaltyKind, Decimal, i64)> = Vec::new();

    for (segment, minutes) in segments.iter().zip(paid) {
        let Some(kind) = segment.penalty else {
            continue;
        };
        if *minutes <= 0 {
            continue;
        }
        match totals.iter_mut().find(|(existing, _, _)| *existing == kind) {
            Some(entry) => entry.2 += minutes,
            None => totals.push((kind, segment.multiplier, *minutes)),
        }
    }

    totals
        .into_iter()
        .map(|(kind, multiplier, minutes)| {
            let hours = minutes_to_hours(minutes);
            PenaltyLine {
                kind,
                rate_multiplier: multiplier,
                applicable_hours: hours.round_dp(2),
                amount: money(base_rate * (multiplier - Decimal::ONE) * hours),
            }
        })
        .collect()
}

fn travel_allowance(timesheet: &Timesheet, method: &TravelAllowanceMethod) -> Option<AllowanceLine> {
    let travelled = timesheet.travel_minutes > 0
        || timesheet
            .travel_kilometres
            .map(|km| km > Decimal::ZERO)
            .unwrap_or(false);
    if !travelled {
        return None;
    }

    match method {
        TravelAllowanceMethod::None => None,
        TravelAllowanceMethod::FlatPerTrip { amount } => Some(AllowanceLine {
            kind: AllowanceKind::Travel,
            detail: "flat travel allowance per trip".to_string(),
            amount: money(*amount),
        }),
        TravelAllowanceMethod::PerKilometre {
            rate_per_km,
            average_speed_kmh,
        } => {
            let (kilometres, source) = match timesheet.travel_kilometres {
                Some(km) => (km, "recorded"),
                None => (
                    minutes_to_hours(i64::from(timesheet.travel_minutes)) * *average_speed_kmh,
                    "estimated",
                ),
            };
            let kilometres = kilometres.round_dp(2);
            if kilometres <= Decimal::ZERO {
                return None;
            }
            Some(AllowanceLine {
                kind: AllowanceKind::Travel,
                detail: format!("{kilometres} km {source} at ${rate_per_km}/km"),
                amount: money(kilometres * *rate_per_km),
            })
        }
    }
}
