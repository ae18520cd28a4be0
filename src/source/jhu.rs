use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{column, parse_count, Source};
use crate::config::parse_date;
use crate::error::{DataError, DataResult};
use crate::models::{CanonicalTable, UnitId, UnitRow};

pub(super) const STATE_COLUMN: &str = "Province_State";

pub const NON_CONTIGUOUS: [&str; 7] = [
    "American Samoa",
    "Guam",
    "Northern Mariana Islands",
    "Puerto Rico",
    "Virgin Islands",
    "Hawaii",
    "Alaska",
];

const US_DROPPED: [&str; 6] = ["iso2", "iso3", "code3", "FIPS", "Lat", "Long_"];

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(false)
        .from_reader(text.as_bytes())
}

/// Position of the first date header and the dates from there on.
fn date_columns(headers: &csv::StringRecord) -> DataResult<(usize, Vec<NaiveDate>)> {
    let start = headers
        .iter()
        .position(|h| parse_date(h).is_some())
        .ok_or_else(|| DataError::Schema("no date columns".to_string()))?;

    let dates = headers
        .iter()
        .skip(start)
        .map(|h| {
            parse_date(h)
                .ok_or_else(|| DataError::Schema(format!("non-date column {h:?} after dates")))
        })
        .collect::<DataResult<Vec<_>>>()?;
    Ok((start, dates))
}

pub(super) fn parse_us(text: &str) -> DataResult<CanonicalTable> {
    let mut reader = reader(text);
    let headers = reader.headers()?.clone();
    let uid = column(&headers, "UID")?;
    column(&headers, STATE_COLUMN)?;
    let (start, dates) = date_columns(&headers)?;

    let attributes: Vec<usize> = (0..start)
        .filter(|&i| i != uid && !US_DROPPED.contains(&headers[i].trim()))
        .collect();
    let attribute_names = attributes.iter().map(|&i| headers[i].trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let counts = (start..record.len())
            .map(|i| parse_count(&record[i]))
            .collect::<DataResult<Vec<_>>>()?;
        rows.push(UnitRow {
            id: UnitId::parse(&record[uid]),
            attributes: attributes.iter().map(|&i| record[i].to_string()).collect(),
            counts,
        });
    }

    CanonicalTable::new(Source::Jhu, attribute_names, dates, rows)
}

/// Country-level table: every province row is summed into its country and
/// the coordinate columns are discarded.
pub(super) fn parse_global(text: &str) -> DataResult<CanonicalTable> {
    let mut reader = reader(text);
    let headers = reader.headers()?.clone();
    let country = column(&headers, "Country/Region")?;
    let (start, dates) = date_columns(&headers)?;

    let mut totals: BTreeMap<String, (usize, Vec<u64>)> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let entry = totals
            .entry(record[country].trim().to_string())
            .or_insert_with(|| (0, vec![0; dates.len()]));
        entry.0 += 1;
        for (total, i) in entry.1.iter_mut().zip(start..record.len()) {
            *total += parse_count(&record[i])?;
        }
    }

    let rows = totals
        .into_iter()
        .map(|(name, (provinces, counts))| UnitRow {
            id: UnitId::Label(name),
            attributes: vec![provinces.to_string()],
            counts,
        })
        .collect();

    CanonicalTable::new(
        Source::JhuGlobal,
        vec!["Provinces".to_string()],
        dates,
        rows,
    )
}
