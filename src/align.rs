use tracing::debug;

use crate::config::MaxDate;
use crate::error::{DataError, DataResult};
use crate::models::{AlignedRow, AlignedTable, CanonicalTable};

/// Number of leading date columns up to and including `max_date`.
pub fn working_dates(table: &CanonicalTable, max_date: MaxDate) -> DataResult<usize> {
    match max_date {
        MaxDate::Last => Ok(table.dates.len()),
        MaxDate::Through(date) => table
            .dates
            .iter()
            .position(|d| *d == date)
            .map(|i| i + 1)
            .ok_or_else(|| DataError::Schema(format!("date {date} is not a column of the table"))),
    }
}

/// First offset whose count reaches `threshold`.
pub fn first_crossing(counts: &[u64], threshold: i64) -> Option<usize> {
    counts
        .iter()
        .position(|&count| i128::from(count) >= i128::from(threshold))
}

/// Derive the aligned table for `threshold`, considering dates through
/// `max_date`.
///
/// Rows come back ordered by their working counts, largest first, compared
/// date by date from the earliest column; ties keep the input order.
pub fn align(
    table: &CanonicalTable,
    threshold: i64,
    max_date: MaxDate,
) -> DataResult<AlignedTable> {
    let working = working_dates(table, max_date)?;

    let mut rows: Vec<AlignedRow> = table
        .rows
        .iter()
        .map(|unit| {
            let counts = &unit.counts[..working.min(unit.counts.len())];
            AlignedRow {
                first_crossing: first_crossing(counts, threshold),
                unit: unit.clone(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        let a = &a.unit.counts[..working.min(a.unit.counts.len())];
        let b = &b.unit.counts[..working.min(b.unit.counts.len())];
        b.cmp(a)
    });

    let aligned = AlignedTable {
        source: table.source,
        threshold,
        attribute_names: table.attribute_names.clone(),
        dates: table.dates.clone(),
        working_dates: working,
        rows,
    };
    debug!(
        "threshold {}: {} of {} units crossed within {} dates",
        threshold,
        aligned.positive_rows().count(),
        aligned.rows.len(),
        working
    );
    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UnitId, UnitRow};
    use crate::source::Source;
    use chrono::{Duration, NaiveDate};

    fn table(series: Vec<(i64, Vec<u64>)>) -> CanonicalTable {
        let width = series.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        CanonicalTable::new(
            Source::Jhu,
            vec!["Province_State".to_string()],
            (0..width).map(|i| start + Duration::days(i as i64)).collect(),
            series
                .iter()
                .map(|(id, counts)| UnitRow {
                    id: UnitId::Code(*id),
                    attributes: vec!["Ohio".to_string()],
                    counts: counts.clone(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn crossing(aligned: &AlignedTable, id: i64) -> Option<usize> {
        aligned.row(&UnitId::Code(id)).unwrap().first_crossing
    }

    #[test]
    fn finds_first_index_at_or_above_threshold() {
        let aligned = align(&table(vec![(1, vec![0, 3, 6, 6])]), 5, MaxDate::Last).unwrap();
        assert_eq!(crossing(&aligned, 1), Some(2));
    }

    #[test]
    fn units_below_threshold_never_cross() {
        let aligned = align(
            &table(vec![(1, vec![0, 3, 6]), (2, vec![0, 1, 2])]),
            5,
            MaxDate::Last,
        )
        .unwrap();
        assert_eq!(crossing(&aligned, 2), None);
        assert_eq!(aligned.positive_units(), vec![UnitId::Code(1)]);
    }

    #[test]
    fn crossing_index_is_first_value_reaching_threshold() {
        let source = table(vec![
            (1, vec![0, 0, 2, 7, 7]),
            (2, vec![1, 4, 4, 4, 9]),
            (3, vec![0, 0, 0, 0, 0]),
            (4, vec![5, 5, 6, 7, 8]),
        ]);
        for threshold in 1..=10 {
            let aligned = align(&source, threshold, MaxDate::Last).unwrap();
            for row in &aligned.rows {
                let counts = &row.unit.counts;
                match row.first_crossing {
                    Some(i) => {
                        assert!(counts[i] as i64 >= threshold);
                        assert!(counts[..i].iter().all(|&c| (c as i64) < threshold));
                    }
                    None => assert!(counts.iter().all(|&c| (c as i64) < threshold)),
                }
            }
        }
    }

    #[test]
    fn non_positive_threshold_crosses_at_first_date() {
        let counts = table(vec![(1, vec![0, 0]), (2, vec![3, 4])]);
        let aligned = align(&counts, 0, MaxDate::Last).unwrap();
        assert_eq!(crossing(&aligned, 1), Some(0));
        assert_eq!(crossing(&aligned, 2), Some(0));

        let negative = align(&table(vec![(1, vec![0, 0])]), -4, MaxDate::Last).unwrap();
        assert_eq!(crossing(&negative, 1), Some(0));
    }

    #[test]
    fn table_without_dates_never_crosses() {
        let aligned = align(&table(vec![(1, vec![])]), 0, MaxDate::Last).unwrap();
        assert_eq!(crossing(&aligned, 1), None);
        assert!(aligned.require_positive().is_err());
    }

    #[test]
    fn max_date_is_inclusive_and_truncates_the_scan() {
        let source = table(vec![(1, vec![0, 3, 6, 9])]);
        let through = |day| MaxDate::Through(NaiveDate::from_ymd_opt(2020, 3, day).unwrap());

        let inclusive = align(&source, 6, through(3)).unwrap();
        assert_eq!(inclusive.working_dates, 3);
        assert_eq!(crossing(&inclusive, 1), Some(2));

        let truncated = align(&source, 6, through(2)).unwrap();
        assert_eq!(crossing(&truncated, 1), None);
        assert_eq!(truncated.dates.len(), 4);
    }

    #[test]
    fn unknown_max_date_is_a_schema_error() {
        let source = table(vec![(1, vec![0, 3])]);
        let missing = MaxDate::Through(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert!(matches!(align(&source, 1, missing), Err(DataError::Schema(_))));
    }

    #[test]
    fn rows_sort_by_counts_descending_from_earliest_date() {
        let source = table(vec![
            (1, vec![0, 1, 9]),
            (2, vec![2, 2, 2]),
            (3, vec![0, 4, 4]),
            (4, vec![0, 1, 9]),
        ]);
        let aligned = align(&source, 1, MaxDate::Last).unwrap();
        let order: Vec<UnitId> = aligned.rows.iter().map(|r| r.unit.id.clone()).collect();
        assert_eq!(
            order,
            vec![UnitId::Code(2), UnitId::Code(3), UnitId::Code(1), UnitId::Code(4)]
        );
    }

    #[test]
    fn alignment_is_idempotent() {
        let source = table(vec![(1, vec![0, 1, 9]), (2, vec![2, 2, 2]), (3, vec![0, 0, 0])]);
        let first = align(&source, 2, MaxDate::Last).unwrap();
        let second = align(&source, 2, MaxDate::Last).unwrap();
        assert_eq!(first, second);
    }
}
