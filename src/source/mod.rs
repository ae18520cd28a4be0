//! Source adapters: raw CSV text from each endpoint reshaped into a
//! [`CanonicalTable`].

mod brasil;
mod jhu;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SourceOptions;
use crate::error::{DataError, DataResult};
use crate::models::CanonicalTable;

pub use jhu::NON_CONTIGUOUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// JHU CSSE confirmed cases per US county
    Jhu,
    /// JHU CSSE confirmed cases per country
    JhuGlobal,
    /// brasil.io confirmed cases per municipality
    BrasilIo,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Jhu, Source::JhuGlobal, Source::BrasilIo];

    pub fn url(self) -> &'static str {
        match self {
            Source::Jhu => {
                "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/\
                 csse_covid_19_data/csse_covid_19_time_series/\
                 time_series_covid19_confirmed_US.csv"
            }
            Source::JhuGlobal => {
                "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/\
                 csse_covid_19_data/csse_covid_19_time_series/\
                 time_series_covid19_confirmed_global.csv"
            }
            Source::BrasilIo => {
                "https://brasil.io/dataset/covid19/caso/?place_type=city&format=csv"
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::Jhu => "jhu",
            Source::JhuGlobal => "jhu_global",
            Source::BrasilIo => "brasil_io",
        }
    }
}

/// Reshape a raw payload from `source` into the canonical wide layout.
pub fn parse(source: Source, text: &str) -> DataResult<CanonicalTable> {
    let table = match source {
        Source::Jhu => jhu::parse_us(text)?,
        Source::JhuGlobal => jhu::parse_global(text)?,
        Source::BrasilIo => brasil::parse(text)?,
    };
    info!(
        "{}: {} units across {} dates",
        source.label(),
        table.rows.len(),
        table.dates.len()
    );
    Ok(table)
}

/// Apply the option-dependent row filters; the input table is left untouched.
pub fn restrict(table: &CanonicalTable, options: &SourceOptions) -> DataResult<CanonicalTable> {
    if table.source != Source::Jhu || !options.only_contiguous {
        return Ok(table.clone());
    }
    let state = table
        .attribute_index(jhu::STATE_COLUMN)
        .ok_or_else(|| DataError::Schema(format!("missing column {}", jhu::STATE_COLUMN)))?;
    let restricted =
        table.retain_rows(|row| !NON_CONTIGUOUS.contains(&row.attributes[state].as_str()));
    info!(
        "contiguous filter kept {} of {} units",
        restricted.rows.len(),
        table.rows.len()
    );
    Ok(restricted)
}

/// Cumulative counts: blanks read as zero, fractions are truncated and
/// negative corrections clamp to zero.
pub(crate) fn parse_count(field: &str) -> DataResult<u64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = field.parse::<u64>() {
        return Ok(value);
    }
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value.trunc() as u64),
        Ok(value) if value.is_finite() => {
            warn!("negative cumulative count {} clamped to 0", value);
            Ok(0)
        }
        _ => Err(DataError::Malformed(format!("unparseable count {field:?}"))),
    }
}

pub(crate) fn column(headers: &csv::StringRecord, name: &str) -> DataResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DataError::Schema(format!("missing column {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UnitId, UnitRow};
    use chrono::NaiveDate;

    #[test]
    fn counts_tolerate_blank_fractional_and_negative_cells() {
        assert_eq!(parse_count("").unwrap(), 0);
        assert_eq!(parse_count("42").unwrap(), 42);
        assert_eq!(parse_count("7.0").unwrap(), 7);
        assert_eq!(parse_count("-3").unwrap(), 0);
        assert!(matches!(parse_count("n/a"), Err(DataError::Malformed(_))));
    }

    #[test]
    fn contiguous_filter_drops_every_listed_territory() {
        let mut rows = Vec::new();
        for (i, state) in NON_CONTIGUOUS.iter().chain(["Ohio", "Texas"].iter()).enumerate() {
            rows.push(UnitRow {
                id: UnitId::Code(i as i64),
                attributes: vec!["County".to_string(), state.to_string()],
                counts: vec![1],
            });
        }
        let table = CanonicalTable::new(
            Source::Jhu,
            vec!["Admin2".to_string(), "Province_State".to_string()],
            vec![NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()],
            rows,
        )
        .unwrap();

        let contiguous = restrict(&table, &SourceOptions::default()).unwrap();
        let states: Vec<&str> = contiguous
            .rows
            .iter()
            .map(|row| row.attributes[1].as_str())
            .collect();
        assert_eq!(states, vec!["Ohio", "Texas"]);

        let everything = restrict(
            &table,
            &SourceOptions {
                only_contiguous: false,
                ..SourceOptions::default()
            },
        )
        .unwrap();
        assert_eq!(everything.rows.len(), table.rows.len());
    }
}
