use std::collections::{BTreeSet, HashMap};

use super::{column, parse_count, Source};
use crate::config::parse_date;
use crate::error::{DataError, DataResult};
use crate::models::{CanonicalTable, UnitId, UnitRow};

/// Placeholder city for cases without a known municipality.
const UNSPECIFIED_CITY: &str = "Importados/Indefinidos";

struct City {
    id: UnitId,
    name: String,
    state: String,
    confirmed: HashMap<chrono::NaiveDate, u64>,
}

/// Pivot the long city/date listing into one row per IBGE code. A city with
/// no report on some date counts zero there.
pub(super) fn parse(text: &str) -> DataResult<CanonicalTable> {
    let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let date = column(&headers, "date")?;
    let state = column(&headers, "state")?;
    let city = column(&headers, "city")?;
    let confirmed = column(&headers, "confirmed")?;
    let code = column(&headers, "city_ibge_code")?;
    let place_type = column(&headers, "place_type").ok();

    let mut cities: Vec<City> = Vec::new();
    let mut positions: HashMap<UnitId, usize> = HashMap::new();
    let mut dates = BTreeSet::new();

    for record in reader.records() {
        let record = record?;
        if place_type.is_some_and(|i| record.get(i).is_some_and(|p| p != "city")) {
            continue;
        }
        let name = record.get(city).unwrap_or_default();
        let ibge = record.get(code).unwrap_or_default().trim();
        if name == UNSPECIFIED_CITY || ibge.is_empty() {
            continue;
        }

        let raw_date = record.get(date).unwrap_or_default();
        let day = parse_date(raw_date)
            .ok_or_else(|| DataError::Malformed(format!("unparseable date {raw_date:?}")))?;
        let cases = parse_count(record.get(confirmed).unwrap_or_default())?;
        dates.insert(day);

        let id = UnitId::parse(ibge);
        let index = *positions.entry(id.clone()).or_insert_with(|| {
            cities.push(City {
                id,
                name: name.to_string(),
                state: record.get(state).unwrap_or_default().to_string(),
                confirmed: HashMap::new(),
            });
            cities.len() - 1
        });
        cities[index].confirmed.entry(day).or_insert(cases);
    }

    let dates: Vec<_> = dates.into_iter().collect();
    let rows = cities
        .into_iter()
        .map(|city| UnitRow {
            counts: dates
                .iter()
                .map(|day| city.confirmed.get(day).copied().unwrap_or(0))
                .collect(),
            id: city.id,
            attributes: vec![city.name, city.state],
        })
        .collect();

    CanonicalTable::new(
        Source::BrasilIo,
        vec!["city".to_string(), "Province_State".to_string()],
        dates,
        rows,
    )
}
