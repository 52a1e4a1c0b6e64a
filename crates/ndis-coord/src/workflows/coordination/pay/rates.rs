use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Multipliers applied to the base rate inside each penalty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyMultipliers {
    pub evening: Decimal,
    pub night: Decimal,
    pub weekend: Decimal,
    pub public_holiday: Decimal,
}

impl Default for PenaltyMultipliers {
    /// SCHADS Award shift, weekend, and public holiday loadings.
    fn default() -> Self {
        Self {
            evening: Decimal::new(1125, 3),
            night: Decimal::new(115, 2),
            weekend: Decimal::new(15, 1),
            public_holiday: Decimal::new(25, 1),
        }
    }
}

/// How travel between clients is reimbursed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TravelAllowanceMethod {
    None,
    /// Fixed amount for any shift that records travel.
    FlatPerTrip { amount: Decimal },
    /// Per-kilometre rate. Distance comes from the timesheet when recorded, otherwise it is
    /// derived from travel minutes at the given average speed.
    PerKilometre {
        rate_per_km: Decimal,
        average_speed_kmh: Decimal,
    },
}

impl Default for TravelAllowanceMethod {
    fn default() -> Self {
        Self::PerKilometre {
            rate_per_km: Decimal::new(99, 2),
            average_speed_kmh: Decimal::from(40),
        }
    }
}

/// Rates in force from `effective_from` until superseded by a later table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub effective_from: NaiveDate,
    pub classifications: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub penalties: PenaltyMultipliers,
    #[serde(default)]
    pub public_holidays: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub travel: TravelAllowanceMethod,
}

impl RateTable {
    pub fn new(effective_from: NaiveDate) -> Self {
        Self {
            effective_from,
            classifications: BTreeMap::new(),
            penalties: PenaltyMultipliers::default(),
            public_holidays: BTreeSet::new(),
            travel: TravelAllowanceMethod::default(),
        }
    }

    pub fn with_classification(mut self, key: impl Into<String>, base_rate: Decimal) -> Self {
        self.classifications.insert(key.into(), base_rate);
        self
    }

    pub fn with_penalties(mut self, penalties: PenaltyMultipliers) -> Self {
        self.penalties = penalties;
        self
    }

    pub fn with_public_holiday(mut self, date: NaiveDate) -> Self {
        self.public_holidays.insert(date);
        self
    }

    pub fn with_travel(mut self, travel: TravelAllowanceMethod) -> Self {
        self.travel = travel;
        self
    }

    pub fn base_rate(&self, classification: &str) -> Option<Decimal> {
        self.classifications.get(classification).copied()
    }

    pub fn is_public_holiday(&self, date: NaiveDate) -> bool {
        self.public_holidays.contains(&date)
    }

    /// Merge `classification,base_rate` rows into the table, replacing existing keys.
    pub fn import_classifications<R: Read>(&mut self, reader: R) -> Result<usize, RateImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut imported = 0;

        for (index, row) in csv_reader.deserialize::<ClassificationRow>().enumerate() {
            let row = row?;
            let key = row.classification.trim().to_string();
            if key.is_empty() {
                return Err(RateImportError::EmptyClassification { line: index + 2 });
            }
            if row.base_rate <= Decimal::ZERO {
                return Err(RateImportError::NonPositiveRate {
                    classification: key,
                    rate: row.base_rate,
                });
            }
            self.classifications.insert(key, row.base_rate);
            imported += 1;
        }

        Ok(imported)
    }

    /// Representative SCHADS Award hourly rates for the SACS and home care streams.
    pub fn schads_standard(effective_from: NaiveDate) -> Self {
        Self::new(effective_from)
            .with_classification("scs_level_1", Decimal::new(3541, 2))
            .with_classification("scs_level_2", Decimal::new(4550, 2))
            .with_classification("scs_level_3", Decimal::new(4875, 2))
            .with_classification("scs_level_4", Decimal::new(5216, 2))
            .with_classification("scs_level_5", Decimal::new(5573, 2))
            .with_classification("home_care_level_2", Decimal::new(3612, 2))
            .with_classification("home_care_level_3", Decimal::new(3768, 2))
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationRow {
    classification: String,
    base_rate: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum RateImportError {
    #[error("rate import failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("classification on line {line} is empty")]
    EmptyClassification { line: usize },
    #[error("classification {classification} has non-positive rate {rate}")]
    NonPositiveRate {
        classification: String,
        rate: Decimal,
    },
}

/// Chronological set of rate tables; the table in force is the latest one effective on or
/// before the service date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSchedule {
    tables: Vec<RateTable>,
}

impl RateSchedule {
    pub fn new(mut tables: Vec<RateTable>) -> Self {
        tables.sort_by_key(|table| table.effective_from);
        Self { tables }
    }

    pub fn single(table: RateTable) -> Self {
        Self::new(vec![table])
    }

    pub fn push(&mut self, table: RateTable) {
        self.tables.push(table);
        self.tables.sort_by_key(|table| table.effective_from);
    }

    pub fn in_force(&self, service_date: NaiveDate) -> Option<&RateTable> {
        self.tables
            .iter()
            .rfind(|table| table.effective_from <= service_date)
    }

    pub fn tables(&self) -> &[RateTable] {
        &self.tables
    }
}
