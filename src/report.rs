use std::fmt::Write;

use crate::models::AlignedTable;
use crate::plot::bin_counts;

#[derive(Debug, Clone, PartialEq)]
pub struct CrossingSummary {
    pub units: usize,
    pub crossed: usize,
    pub earliest: usize,
    pub median: f64,
    pub latest: usize,
}

pub fn summarize(aligned: &AlignedTable) -> Option<CrossingSummary> {
    let mut days = aligned.crossing_days();
    if days.is_empty() {
        return None;
    }
    days.sort_unstable();

    let mid = days.len() / 2;
    let median = if days.len() % 2 == 0 {
        (days[mid - 1] + days[mid]) as f64 / 2.0
    } else {
        days[mid] as f64
    };

    Some(CrossingSummary {
        units: aligned.rows.len(),
        crossed: days.len(),
        earliest: days[0],
        median,
        latest: days[days.len() - 1],
    })
}

pub fn build_report(aligned: &AlignedTable, bins: usize, top: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Outbreak Alignment Report");
    match aligned.working_range() {
        Some((first, last)) => {
            let _ = writeln!(
                output,
                "Generated for {} at N = {} (dates {} through {})",
                aligned.source.label(),
                aligned.threshold,
                first,
                last
            );
        }
        None => {
            let _ = writeln!(
                output,
                "Generated for {} at N = {} (no dates)",
                aligned.source.label(),
                aligned.threshold
            );
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Crossing Days");

    let Some(summary) = summarize(aligned) else {
        let _ = writeln!(
            output,
            "No unit reached {} cases among {} units.",
            aligned.threshold,
            aligned.rows.len()
        );
        return output;
    };

    let _ = writeln!(
        output,
        "- {} of {} units reached {} cases",
        summary.crossed, summary.units, aligned.threshold
    );
    let _ = writeln!(
        output,
        "- day {} earliest, day {:.1} median, day {} latest",
        summary.earliest, summary.median, summary.latest
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Earliest Units");
    let mut earliest: Vec<_> = aligned
        .rows
        .iter()
        .filter(|row| row.first_crossing.is_some())
        .collect();
    earliest.sort_by_key(|row| row.first_crossing);
    for row in earliest.iter().take(top) {
        let label = if row.unit.attributes.is_empty() {
            row.unit.id.to_string()
        } else {
            format!("{} ({})", row.unit.id, row.unit.attributes.join(", "))
        };
        let _ = writeln!(
            output,
            "- {} on day {}",
            label,
            row.first_crossing.unwrap_or_default()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution");
    let days = aligned.crossing_days();
    let (lo, hi) = (summary.earliest as f64, summary.latest as f64);
    let bins = bins.max(1);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    for (bin, count) in bin_counts(&days, lo, hi, bins).into_iter().enumerate() {
        if count == 0 {
            continue;
        }
        let start = lo + width * bin as f64;
        let _ = writeln!(
            output,
            "- days {:.1}-{:.1}: {}",
            start,
            start + width,
            count
        );
    }

    output
}
