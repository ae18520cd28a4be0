use std::path::Path;

use crate::error::DataResult;
use crate::models::{AlignedTable, CanonicalTable, OffsetMatrix};

pub const CROSSING_COLUMN: &str = "Day_First_N_Infections";

pub fn save_canonical(table: &CanonicalTable, path: &Path) -> DataResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["UID".to_string()];
    header.extend(table.attribute_names.iter().cloned());
    header.extend(table.dates.iter().map(|d| d.to_string()));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.id.to_string()];
        record.extend(row.attributes.iter().cloned());
        record.extend(row.counts.iter().map(u64::to_string));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Aligned rows in their sorted order; the crossing column sits right after
/// the attributes and is blank for units that never crossed.
pub fn save_aligned(table: &AlignedTable, path: &Path) -> DataResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["UID".to_string()];
    header.extend(table.attribute_names.iter().cloned());
    header.push(CROSSING_COLUMN.to_string());
    header.extend(table.dates.iter().map(|d| d.to_string()));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.unit.id.to_string()];
        record.extend(row.unit.attributes.iter().cloned());
        record.push(row.first_crossing.map(|i| i.to_string()).unwrap_or_default());
        record.extend(row.unit.counts.iter().map(u64::to_string));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_offsets(matrix: &OffsetMatrix, path: &Path) -> DataResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["UID".to_string()];
    header.extend(matrix.units.iter().map(|u| u.to_string()));
    writer.write_record(&header)?;

    for (unit, cells) in matrix.units.iter().zip(&matrix.cells) {
        let mut record = vec![unit.to_string()];
        record.extend(cells.iter().map(i64::to_string));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
