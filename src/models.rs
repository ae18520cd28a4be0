use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;

use crate::error::{DataError, DataResult};
use crate::source::Source;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitId {
    Code(i64),
    Label(String),
}

impl UnitId {
    /// Numeric-looking identifiers become `Code`, anything else a `Label`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(code) => UnitId::Code(code),
            Err(_) => match trimmed.parse::<f64>() {
                Ok(value) if value.fract() == 0.0 && value.is_finite() => {
                    UnitId::Code(value as i64)
                }
                _ => UnitId::Label(trimmed.to_string()),
            },
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Code(code) => write!(f, "{code}"),
            UnitId::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRow {
    pub id: UnitId,
    pub attributes: Vec<String>,
    pub counts: Vec<u64>,
}

/// One row per unit, one cumulative count per date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTable {
    pub source: Source,
    pub attribute_names: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<UnitRow>,
}

impl CanonicalTable {
    pub fn new(
        source: Source,
        attribute_names: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<UnitRow>,
    ) -> DataResult<Self> {
        if dates.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(DataError::Schema(
                "date columns are not strictly ascending".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if row.attributes.len() != attribute_names.len() {
                return Err(DataError::Schema(format!(
                    "unit {} has {} attributes, expected {}",
                    row.id,
                    row.attributes.len(),
                    attribute_names.len()
                )));
            }
            if row.counts.len() != dates.len() {
                return Err(DataError::Schema(format!(
                    "unit {} has {} counts, expected {}",
                    row.id,
                    row.counts.len(),
                    dates.len()
                )));
            }
            if !seen.insert(&row.id) {
                return Err(DataError::Schema(format!("duplicate unit id {}", row.id)));
            }
        }

        Ok(Self {
            source,
            attribute_names,
            dates,
            rows,
        })
    }

    /// Derived table keeping only the rows matching `keep`.
    pub fn retain_rows(&self, keep: impl Fn(&UnitRow) -> bool) -> Self {
        Self {
            source: self.source,
            attribute_names: self.attribute_names.clone(),
            dates: self.dates.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attribute_names.iter().position(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRow {
    pub unit: UnitRow,
    /// Offset into `dates` of the first count at or above the threshold.
    pub first_crossing: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedTable {
    pub source: Source,
    pub threshold: i64,
    pub attribute_names: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// Number of leading dates that took part in the alignment.
    pub working_dates: usize,
    pub rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn positive_rows(&self) -> impl Iterator<Item = (&UnitId, usize)> {
        self.rows
            .iter()
            .filter_map(|row| row.first_crossing.map(|index| (&row.unit.id, index)))
    }

    pub fn positive_units(&self) -> Vec<UnitId> {
        self.positive_rows().map(|(id, _)| id.clone()).collect()
    }

    pub fn crossing_days(&self) -> Vec<usize> {
        self.positive_rows().map(|(_, index)| index).collect()
    }

    pub fn require_positive(&self) -> DataResult<Vec<UnitId>> {
        let units = self.positive_units();
        if units.is_empty() {
            return Err(DataError::EmptyResult {
                threshold: self.threshold,
            });
        }
        Ok(units)
    }

    pub fn working_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.dates.first()?;
        let last = *self.dates.get(self.working_dates.checked_sub(1)?)?;
        Some((first, last))
    }

    pub fn row(&self, id: &UnitId) -> Option<&AlignedRow> {
        self.rows.iter().find(|row| &row.unit.id == id)
    }
}

/// Pairwise differences of first-crossing index over the positive units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetMatrix {
    pub threshold: i64,
    pub units: Vec<UnitId>,
    pub cells: Vec<Vec<i64>>,
    /// The first unit is also the aligned table's first row.
    pub leads_table: bool,
}

impl OffsetMatrix {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// `None` when either unit never crossed the threshold.
    pub fn get(&self, row: &UnitId, column: &UnitId) -> Option<i64> {
        let i = self.units.iter().position(|u| u == row)?;
        let j = self.units.iter().position(|u| u == column)?;
        Some(self.cells[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn row(id: i64, counts: Vec<u64>) -> UnitRow {
        UnitRow {
            id: UnitId::Code(id),
            attributes: vec!["X".to_string()],
            counts,
        }
    }

    #[test]
    fn unit_ids_parse_codes_and_labels() {
        assert_eq!(UnitId::parse("84001001"), UnitId::Code(84001001));
        assert_eq!(UnitId::parse("3550308.0"), UnitId::Code(3550308));
        assert_eq!(UnitId::parse("Brazil"), UnitId::Label("Brazil".to_string()));
    }

    #[test]
    fn rejects_duplicate_units() {
        let result = CanonicalTable::new(
            Source::Jhu,
            vec!["state".to_string()],
            vec![date(1)],
            vec![row(1, vec![0]), row(1, vec![2])],
        );
        assert!(matches!(result, Err(DataError::Schema(_))));
    }

    #[test]
    fn rejects_ragged_rows_and_unsorted_dates() {
        let ragged = CanonicalTable::new(
            Source::Jhu,
            vec!["state".to_string()],
            vec![date(1), date(2)],
            vec![row(1, vec![0])],
        );
        assert!(matches!(ragged, Err(DataError::Schema(_))));

        let unsorted = CanonicalTable::new(
            Source::Jhu,
            vec!["state".to_string()],
            vec![date(2), date(1)],
            vec![],
        );
        assert!(matches!(unsorted, Err(DataError::Schema(_))));
    }

    #[test]
    fn offset_lookup_reports_missing_units() {
        let matrix = OffsetMatrix {
            threshold: 1,
            units: vec![UnitId::Code(1), UnitId::Code(2)],
            cells: vec![vec![0, -3], vec![3, 0]],
            leads_table: true,
        };
        assert_eq!(matrix.get(&UnitId::Code(1), &UnitId::Code(2)), Some(-3));
        assert_eq!(matrix.get(&UnitId::Code(1), &UnitId::Code(9)), None);
    }
}
