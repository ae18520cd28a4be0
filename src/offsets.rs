use tracing::debug;

use crate::models::{AlignedTable, OffsetMatrix, UnitId};

/// Pairwise day offsets between every unit that crossed the threshold, in
/// aligned-table row order. Cell `(i, j)` is `crossing(i) - crossing(j)`.
pub fn build_offsets(aligned: &AlignedTable) -> OffsetMatrix {
    let (units, crossings): (Vec<UnitId>, Vec<i64>) = aligned
        .positive_rows()
        .map(|(id, index)| (id.clone(), index as i64))
        .unzip();

    let size = units.len();
    let mut cells = Vec::with_capacity(size);
    for (done, di) in crossings.iter().enumerate() {
        cells.push(crossings.iter().map(|dj| di - dj).collect::<Vec<_>>());
        if size >= 10 && (done + 1) % (size / 10) == 0 {
            let percent = (done + 1) as f64 * 100.0 / size as f64;
            debug!("offset matrix {:.0}% complete", percent);
        }
    }

    OffsetMatrix {
        threshold: aligned.threshold,
        units,
        cells,
        leads_table: aligned
            .rows
            .first()
            .is_some_and(|row| row.first_crossing.is_some()),
    }
}

/// The slice of an offset matrix handed to the heatmap renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapView {
    pub row_units: Vec<UnitId>,
    pub column_units: Vec<UnitId>,
    pub cells: Vec<Vec<i64>>,
}

impl HeatmapView {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() || self.column_units.is_empty()
    }

    /// Smallest and largest offset shown.
    pub fn range(&self) -> Option<(i64, i64)> {
        let mut values = self.cells.iter().flatten().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

impl OffsetMatrix {
    /// With `skip_leading_row` the row of the aligned table's first unit is
    /// left out of the rendered grid; its column stays. Nothing is skipped
    /// when that unit never crossed and so has no row here.
    pub fn view(&self, skip_leading_row: bool) -> HeatmapView {
        let skip = usize::from(skip_leading_row && self.leads_table && !self.units.is_empty());
        HeatmapView {
            row_units: self.units[skip..].to_vec(),
            column_units: self.units.clone(),
            cells: self.cells[skip..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;
    use crate::config::MaxDate;
    use crate::models::{CanonicalTable, UnitRow};
    use crate::source::Source;
    use chrono::{Duration, NaiveDate};

    fn aligned(series: Vec<(i64, Vec<u64>)>, threshold: i64) -> AlignedTable {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let width = series[0].1.len();
        let table = CanonicalTable::new(
            Source::BrasilIo,
            vec![],
            (0..width).map(|i| start + Duration::days(i as i64)).collect(),
            series
                .into_iter()
                .map(|(id, counts)| UnitRow {
                    id: UnitId::Code(id),
                    attributes: vec![],
                    counts,
                })
                .collect(),
        )
        .unwrap();
        align(&table, threshold, MaxDate::Last).unwrap()
    }

    #[test]
    fn offsets_are_antisymmetric_with_zero_diagonal() {
        let table = aligned(
            vec![
                (1, vec![0, 0, 5, 9, 9]),
                (2, vec![5, 6, 7, 8, 9]),
                (3, vec![0, 5, 5, 5, 5]),
                (4, vec![0, 0, 0, 0, 5]),
            ],
            5,
        );
        let matrix = build_offsets(&table);
        assert_eq!(matrix.len(), 4);
        for i in 0..matrix.len() {
            assert_eq!(matrix.cells[i][i], 0);
            for j in 0..matrix.len() {
                assert_eq!(matrix.cells[i][j], -matrix.cells[j][i]);
            }
        }
        assert_eq!(matrix.get(&UnitId::Code(4), &UnitId::Code(2)), Some(4));
        assert_eq!(matrix.get(&UnitId::Code(3), &UnitId::Code(1)), Some(-1));
    }

    #[test]
    fn never_crossed_units_are_excluded() {
        let table = aligned(vec![(1, vec![0, 3, 6]), (2, vec![0, 1, 2])], 5);
        let matrix = build_offsets(&table);
        assert_eq!(matrix.units, vec![UnitId::Code(1)]);
        assert_eq!(matrix.get(&UnitId::Code(1), &UnitId::Code(2)), None);
    }

    #[test]
    fn units_follow_aligned_row_order() {
        let table = aligned(vec![(1, vec![0, 1]), (2, vec![1, 1]), (3, vec![0, 0])], 1);
        let matrix = build_offsets(&table);
        assert_eq!(matrix.units, vec![UnitId::Code(2), UnitId::Code(1)]);
        assert_eq!(matrix.cells, vec![vec![0, -1], vec![1, 0]]);
    }

    #[test]
    fn view_optionally_skips_leading_row() {
        let table = aligned(vec![(1, vec![0, 1]), (2, vec![1, 1])], 1);
        let matrix = build_offsets(&table);

        let skipped = matrix.view(true);
        assert_eq!(skipped.row_units, vec![UnitId::Code(1)]);
        assert_eq!(skipped.column_units.len(), 2);
        assert_eq!(skipped.cells, vec![vec![1, 0]]);
        assert_eq!(skipped.range(), Some((0, 1)));

        let full = matrix.view(false);
        assert_eq!(full.cells.len(), 2);
    }

    #[test]
    fn leading_row_is_kept_when_table_leader_never_crossed() {
        let table = aligned(vec![(1, vec![0, 1, 1]), (2, vec![0, 0, 100])], 5);
        assert_eq!(table.rows[0].unit.id, UnitId::Code(1));
        let matrix = build_offsets(&table);
        assert!(!matrix.leads_table);

        let view = matrix.view(true);
        assert_eq!(view.row_units, vec![UnitId::Code(2)]);
        assert_eq!(view.cells, vec![vec![0]]);
    }

    #[test]
    fn empty_positive_set_gives_empty_matrix() {
        let table = aligned(vec![(1, vec![0, 1])], 10);
        let matrix = build_offsets(&table);
        assert!(matrix.is_empty());
        assert!(matrix.view(true).is_empty());
    }
}
