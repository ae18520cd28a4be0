use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod align;
mod cache;
mod config;
mod error;
mod export;
mod fetch;
mod models;
mod offsets;
mod plot;
mod report;
mod source;

use cache::DataService;
use config::{MaxDate, Options, SourceOptions};
use fetch::{HttpFetcher, RetryPolicy};
use plot::{HistogramSeries, HistogramStyle};
use source::Source;

#[derive(Parser)]
#[command(name = "outbreak-alignment")]
#[command(
    about = "Align COVID-19 case series on the day each unit reached N cases",
    long_about = None
)]
struct Cli {
    /// Seconds before a download is abandoned
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,
    /// Download attempts per source
    #[arg(long, global = true, default_value_t = 3)]
    attempts: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Selection {
    #[arg(long, value_enum, default_value_t = Source::Jhu)]
    source: Source,
    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args, Clone, Default)]
struct Overrides {
    /// JSON file with per-source options
    #[arg(long)]
    options: Option<PathBuf>,
    /// Case threshold
    #[arg(long)]
    n: Option<i64>,
    /// Last date considered ("last", YYYY-MM-DD or M/D/YY)
    #[arg(long)]
    max_date: Option<MaxDate>,
    /// Keep Alaska, Hawaii and the US territories
    #[arg(long)]
    all_states: bool,
    /// Download again even if the table is cached
    #[arg(long)]
    force: bool,
}

impl Overrides {
    fn resolve(&self, source: Source) -> anyhow::Result<SourceOptions> {
        let options = match &self.options {
            Some(path) => Options::load(path)
                .with_context(|| format!("failed to read options from {}", path.display()))?,
            None => Options::default(),
        };
        let mut resolved = options.for_source(source).clone();
        if let Some(n) = self.n {
            resolved.n = n;
        }
        if let Some(max_date) = self.max_date {
            resolved.max_date = max_date;
        }
        if self.all_states {
            resolved.only_contiguous = false;
        }
        Ok(resolved)
    }
}

#[derive(Args, Clone)]
struct HistogramArgs {
    #[arg(long, default_value_t = 45)]
    bins: usize,
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,
    /// Logarithmic frequency axis (`--log-scale false` to turn it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    log_scale: Option<bool>,
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long)]
    x_label: Option<String>,
}

impl HistogramArgs {
    fn style(&self, threshold: i64, log_by_default: bool) -> HistogramStyle {
        HistogramStyle {
            bins: self.bins,
            alpha: self.alpha,
            log_scale: self.log_scale.unwrap_or(log_by_default),
            title: self.title.clone(),
            x_label: self.x_label.clone().unwrap_or_else(|| {
                format!("Days from outbreak to case number {threshold} in county")
            }),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download a source and save its canonical table
    Fetch {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "canonical.csv")]
        out: PathBuf,
    },
    /// Save the table aligned on the day each unit reached N cases
    Align {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "output.csv")]
        out: PathBuf,
    },
    /// Histogram of crossing days for one source
    Hist {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        histogram: HistogramArgs,
        #[arg(long, default_value = "history.png")]
        out: PathBuf,
    },
    /// Overlay crossing-day histograms of several sources
    Compare {
        #[arg(long = "source", value_enum, required = true)]
        sources: Vec<Source>,
        #[command(flatten)]
        overrides: Overrides,
        #[command(flatten)]
        histogram: HistogramArgs,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Save the pairwise offset matrix and its heatmap
    Offsets {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "offsets.csv")]
        out: PathBuf,
        /// Keep the first unit's row in the heatmap
        #[arg(long)]
        keep_leading_row: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value_t = 10)]
        bins: usize,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

/// The overlay is named and labelled after the first source's threshold.
fn compare_threshold(sources: &[Source], overrides: &Overrides) -> anyhow::Result<i64> {
    let first = sources.first().context("at least one --source is required")?;
    Ok(overrides.resolve(*first)?.n)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let fetcher = HttpFetcher::new(
        Duration::from_secs(cli.timeout),
        RetryPolicy {
            attempts: cli.attempts,
            ..RetryPolicy::default()
        },
    );
    let service = DataService::new(fetcher);

    match cli.command {
        Commands::Fetch { selection, out } => {
            let table = service.table(selection.source, selection.overrides.force)?;
            let options = selection.overrides.resolve(selection.source)?;
            let table = source::restrict(&table, &options)?;
            export::save_canonical(&table, &out)?;
            println!("Saved {} units to {}.", table.rows.len(), out.display());
        }
        Commands::Align { selection, out } => {
            let options = selection.overrides.resolve(selection.source)?;
            let aligned = service.aligned(selection.source, &options, selection.overrides.force)?;
            export::save_aligned(&aligned, &out)?;
            println!(
                "Saved {} units ({} reached {} cases) to {}.",
                aligned.rows.len(),
                aligned.positive_rows().count(),
                aligned.threshold,
                out.display()
            );
        }
        Commands::Hist {
            selection,
            histogram,
            out,
        } => {
            let options = selection.overrides.resolve(selection.source)?;
            let aligned = service.aligned(selection.source, &options, selection.overrides.force)?;
            match plot::histogram(&aligned, &histogram.style(options.n, false), &out)? {
                Some(path) => println!("Histogram written to {}.", path.display()),
                None => println!("No unit reached {} cases; nothing plotted.", options.n),
            }
        }
        Commands::Compare {
            sources,
            overrides,
            histogram,
            out_dir,
        } => {
            let threshold = compare_threshold(&sources, &overrides)?;
            let mut series = Vec::new();
            for source in sources {
                let options = overrides.resolve(source)?;
                let aligned = service.aligned(source, &options, overrides.force)?;
                series.push(HistogramSeries::from_aligned(source.label(), &aligned));
            }
            let style = histogram.style(threshold, true);
            match plot::overlay_histogram(threshold, &series, &style, &out_dir)? {
                Some(path) => println!("Histogram written to {}.", path.display()),
                None => println!("No unit reached {threshold} cases; nothing plotted."),
            }
        }
        Commands::Offsets {
            selection,
            out,
            keep_leading_row,
        } => {
            let options = selection.overrides.resolve(selection.source)?;
            let aligned = service.aligned(selection.source, &options, selection.overrides.force)?;
            if let Err(err) = aligned.require_positive() {
                println!("{err}; no offsets to compute.");
                return Ok(());
            }
            let matrix = offsets::build_offsets(&aligned);
            export::save_offsets(&matrix, &out)?;
            println!("Saved {}x{} offsets to {}.", matrix.len(), matrix.len(), out.display());
            if let Some(path) = plot::heatmap(&matrix.view(!keep_leading_row), &out)? {
                println!("Heatmap written to {}.", path.display());
            }
        }
        Commands::Report {
            selection,
            bins,
            top,
            out,
        } => {
            let options = selection.overrides.resolve(selection.source)?;
            let aligned = service.aligned(selection.source, &options, selection.overrides.force)?;
            let report = report::build_report(&aligned, bins, top);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare_args(args: &[&str]) -> (Vec<Source>, Overrides, HistogramArgs) {
        let mut argv = vec!["outbreak-alignment", "compare"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Compare {
                sources,
                overrides,
                histogram,
                ..
            } => (sources, overrides, histogram),
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn compare_uses_first_source_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let options = dir.path().join("options.json");
        std::fs::write(&options, r#"{"jhu": {"N": 50}, "brasil_io": {"N": 10}}"#).unwrap();
        let options = options.to_str().unwrap();

        let (sources, overrides, _) =
            compare_args(&["--source", "brasil-io", "--source", "jhu", "--options", options]);
        assert_eq!(compare_threshold(&sources, &overrides).unwrap(), 10);

        let (sources, overrides, _) =
            compare_args(&["--source", "jhu", "--source", "brasil-io", "--options", options]);
        assert_eq!(compare_threshold(&sources, &overrides).unwrap(), 50);
    }

    #[test]
    fn compare_defaults_to_log_scale() {
        let (_, _, histogram) = compare_args(&["--source", "jhu"]);
        assert!(histogram.style(1, true).log_scale);
        assert!(!histogram.style(1, false).log_scale);

        let (_, _, histogram) = compare_args(&["--source", "jhu", "--log-scale", "false"]);
        assert!(!histogram.style(1, true).log_scale);

        let (_, _, histogram) = compare_args(&["--source", "jhu", "--log-scale"]);
        assert!(histogram.style(1, false).log_scale);
    }
}
