use rust_decimal::Decimal;

use super::common::*;
use crate::workflows::coordination::{
    AllowanceKind, PayCalculator, PayError, PenaltyKind, PenaltyMultipliers, RateImportError,
    RateSchedule, RateTable, TravelAllowanceMethod,
};

fn dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn table() -> RateTable {
    RateTable::schads_standard(date(2025, 7, 1))
}

fn steep_penalties() -> PenaltyMultipliers {
    PenaltyMultipliers {
        evening: Decimal::new(125, 2),
        night: Decimal::new(15, 1),
        weekend: Decimal::new(125, 2),
        public_holiday: Decimal::new(25, 1),
    }
}

#[test]
fn weekday_daytime_shift_is_base_pay_only() {
    let sheet = timesheet(at(2026, 3, 4, 8, 0), time(10, 0));

    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_3", &table())
        .expect("pay calculates");

    assert_eq!(breakdown.base_rate, dollars(4875));
    assert_eq!(breakdown.billable_hours, Decimal::from(2));
    assert_eq!(breakdown.base_amount, dollars(9750));
    assert!(breakdown.penalties.is_empty());
    assert!(breakdown.allowances.is_empty());
    assert_eq!(breakdown.total, dollars(9750));
    assert_eq!(breakdown.rate_table_effective_from, date(2025, 7, 1));
}

#[test]
fn shift_crossing_into_night_splits_loadings() {
    let sheet = timesheet(at(2026, 3, 4, 20, 0), time(23, 0));
    let table = table().with_penalties(steep_penalties());

    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_2", &table)
        .expect("pay calculates");

    assert_eq!(breakdown.base_amount, dollars(13650));
    assert_eq!(breakdown.penalties.len(), 2);

    let evening = &breakdown.penalties[0];
    assert_eq!(evening.kind, PenaltyKind::Evening);
    assert_eq!(evening.applicable_hours, Decimal::from(2));
    assert_eq!(evening.amount, dollars(2275));

    let night = &breakdown.penalties[1];
    assert_eq!(night.kind, PenaltyKind::Night);
    assert_eq!(night.rate_multiplier, Decimal::new(15, 1));
    assert_eq!(night.amount, dollars(2275));

    assert_eq!(breakdown.total, dollars(18200));
}

#[test]
fn highest_multiplier_wins_without_stacking() {
    let saturday_night = timesheet(at(2026, 3, 7, 22, 0), time(23, 0));
    let table = table().with_penalties(steep_penalties());

    let breakdown = PayCalculator::new()
        .calculate(&saturday_night, "scs_level_2", &table)
        .expect("pay calculates");

    assert_eq!(breakdown.penalties.len(), 1);
    assert_eq!(breakdown.penalties[0].kind, PenaltyKind::Night);
    assert_eq!(breakdown.total, dollars(6825));
}

#[test]
fn equal_multipliers_prefer_weekend_over_night() {
    let saturday_night = timesheet(at(2026, 3, 7, 22, 0), time(23, 0));
    let table = table().with_penalties(PenaltyMultipliers {
        weekend: Decimal::new(15, 1),
        ..steep_penalties()
    });

    let breakdown = PayCalculator::new()
        .calculate(&saturday_night, "scs_level_2", &table)
        .expect("pay calculates");

    assert_eq!(breakdown.penalties.len(), 1);
    assert_eq!(breakdown.penalties[0].kind, PenaltyKind::Weekend);
    assert_eq!(breakdown.total, dollars(6825));
}

#[test]
fn public_holiday_loading_applies_all_day() {
    let australia_day = timesheet(at(2026, 1, 26, 9, 0), time(13, 0));
    let table = table().with_public_holiday(date(2026, 1, 26));

    let breakdown = PayCalculator::new()
        .calculate(&australia_day, "scs_level_2", &table)
        .expect("pay calculates");

    assert_eq!(breakdown.base_amount, dollars(18200));
    assert_eq!(breakdown.penalties.len(), 1);
    assert_eq!(breakdown.penalties[0].kind, PenaltyKind::PublicHoliday);
    assert_eq!(breakdown.penalties[0].amount, dollars(27300));
    assert_eq!(breakdown.total, dollars(45500));
}

#[test]
fn unpaid_break_comes_out_of_ordinary_time_first() {
    let mut sheet = timesheet(at(2026, 3, 4, 16, 0), time(20, 0));
    sheet.break_minutes = 30;

    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_2", &table())
        .expect("pay calculates");

    assert_eq!(breakdown.billable_hours, Decimal::new(35, 1));
    assert_eq!(breakdown.base_amount, dollars(15925));
    assert_eq!(breakdown.penalties.len(), 1);
    assert_eq!(breakdown.penalties[0].kind, PenaltyKind::Evening);
    assert_eq!(breakdown.penalties[0].applicable_hours, Decimal::from(2));
    assert_eq!(breakdown.penalties[0].amount, dollars(1138));
    assert_eq!(breakdown.total, dollars(17063));
}

#[test]
fn overnight_shift_prices_both_days() {
    let mut sheet = timesheet(at(2026, 3, 4, 22, 0), time(2, 0));
    sheet.ends_next_day = true;

    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_2", &table())
        .expect("pay calculates");

    assert_eq!(breakdown.billable_hours, Decimal::from(4));
    assert_eq!(breakdown.base_amount, dollars(18200));
    assert_eq!(breakdown.penalties.len(), 1);
    assert_eq!(breakdown.penalties[0].kind, PenaltyKind::Night);
    assert_eq!(breakdown.penalties[0].applicable_hours, Decimal::from(4));
    assert_eq!(breakdown.penalties[0].amount, dollars(2730));
    assert_eq!(breakdown.total, dollars(20930));
}

#[test]
fn travel_uses_recorded_distance_or_estimates_from_minutes() {
    let calculator = PayCalculator::new();

    let mut recorded = timesheet(at(2026, 3, 4, 9, 0), time(10, 0));
    recorded.travel_kilometres = Some(Decimal::new(125, 1));
    let breakdown = calculator
        .calculate(&recorded, "scs_level_2", &table())
        .expect("pay calculates");
    assert_eq!(breakdown.allowances.len(), 1);
    assert_eq!(breakdown.allowances[0].kind, AllowanceKind::Travel);
    assert_eq!(breakdown.allowances[0].amount, dollars(1238));
    assert!(breakdown.allowances[0].detail.contains("recorded"));
    assert_eq!(breakdown.total, dollars(4550) + dollars(1238));

    let mut estimated = timesheet(at(2026, 3, 4, 9, 0), time(10, 0));
    estimated.travel_minutes = 30;
    let breakdown = calculator
        .calculate(&estimated, "scs_level_2", &table())
        .expect("pay calculates");
    assert_eq!(breakdown.allowances[0].amount, dollars(1980));
    assert!(breakdown.allowances[0].detail.contains("estimated"));
}

#[test]
fn flat_and_disabled_travel_methods() {
    let mut sheet = timesheet(at(2026, 3, 4, 9, 0), time(10, 0));
    sheet.travel_minutes = 15;

    let flat = table().with_travel(TravelAllowanceMethod::FlatPerTrip {
        amount: dollars(1500),
    });
    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_2", &flat)
        .expect("pay calculates");
    assert_eq!(breakdown.allowances[0].amount, dollars(1500));

    let none = table().with_travel(TravelAllowanceMethod::None);
    let breakdown = PayCalculator::new()
        .calculate(&sheet, "scs_level_2", &none)
        .expect("pay calculates");
    assert!(breakdown.allowances.is_empty());
}

#[test]
fn unknown_classification_is_rejected() {
    let sheet = timesheet(at(2026, 3, 4, 9, 0), time(10, 0));

    let error = PayCalculator::new()
        .calculate(&sheet, "scs_level_9", &table())
        .expect_err("unknown classification");
    assert_eq!(
        error,
        PayError::UnknownClassification {
            classification: "scs_level_9".to_string()
        }
    );
}

#[test]
fn empty_or_fully_broken_shifts_are_invalid() {
    let calculator = PayCalculator::new();

    let zero_length = timesheet(at(2026, 3, 4, 9, 0), time(9, 0));
    assert!(matches!(
        calculator.calculate(&zero_length, "scs_level_2", &table()),
        Err(PayError::InvalidTimesheet { .. })
    ));

    let mut all_break = timesheet(at(2026, 3, 4, 9, 0), time(10, 0));
    all_break.break_minutes = 60;
    assert!(matches!(
        calculator.calculate(&all_break, "scs_level_2", &table()),
        Err(PayError::InvalidTimesheet { .. })
    ));
}

#[test]
fn identical_inputs_serialize_identically() {
    let mut sheet = timesheet(at(2026, 3, 6, 17, 0), time(23, 30));
    sheet.break_minutes = 45;
    sheet.travel_minutes = 20;
    let calculator = PayCalculator::new();

    let first = calculator
        .calculate(&sheet, "scs_level_4", &table())
        .expect("pay calculates");
    let second = calculator
        .calculate(&sheet, "scs_level_4", &table())
        .expect("pay calculates");

    assert_eq!(
        serde_json::to_vec(&first).expect("serialize"),
        serde_json::to_vec(&second).expect("serialize")
    );
}

#[test]
fn schedule_selects_the_table_in_force() {
    let earlier = RateTable::new(date(2025, 7, 1)).with_classification("scs_level_2", dollars(4550));
    let later = RateTable::new(date(2026, 7, 1)).with_classification("scs_level_2", dollars(4700));
    let schedule = RateSchedule::new(vec![later, earlier]);
    let calculator = PayCalculator::new();

    let june = timesheet(at(2026, 6, 30, 9, 0), time(10, 0));
    let july = timesheet(at(2026, 7, 1, 9, 0), time(10, 0));

    let before = calculator
        .calculate_scheduled(&june, "scs_level_2", &schedule)
        .expect("pay calculates");
    let after = calculator
        .calculate_scheduled(&july, "scs_level_2", &schedule)
        .expect("pay calculates");
    assert_eq!(before.base_rate, dollars(4550));
    assert_eq!(after.base_rate, dollars(4700));
    assert_eq!(after.rate_table_effective_from, date(2026, 7, 1));

    let too_early = timesheet(at(2025, 6, 30, 9, 0), time(10, 0));
    assert_eq!(
        calculator.calculate_scheduled(&too_early, "scs_level_2", &schedule),
        Err(PayError::NoRateTableInForce {
            date: date(2025, 6, 30)
        })
    );
}

#[test]
fn csv_import_merges_classifications() {
    let mut table = table();
    let csv = "classification,base_rate\nscs_level_2, 46.25\ndisability_support_level_1,50\n";

    let imported = table
        .import_classifications(csv.as_bytes())
        .expect("rates import");
    assert_eq!(imported, 2);
    assert_eq!(table.base_rate("scs_level_2"), Some(dollars(4625)));
    assert_eq!(
        table.base_rate("disability_support_level_1"),
        Some(Decimal::from(50))
    );
    assert_eq!(table.base_rate("scs_level_3"), Some(dollars(4875)));
}

#[test]
fn csv_import_rejects_non_positive_rates() {
    let mut table = table();
    let csv = "classification,base_rate\nscs_level_1,-1\n";

    match table.import_classifications(csv.as_bytes()) {
        Err(RateImportError::NonPositiveRate {
            classification,
            rate,
        }) => {
            assert_eq!(classification, "scs_level_1");
            assert_eq!(rate, Decimal::from(-1));
        }
        other => panic!("expected non-positive rate error, got {other:?}"),
    }
}
