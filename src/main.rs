use anyhow::{bail, Context, Result};
use argh::FromArgs;
use benchplot::{
    aggregate,
    plot::{self, ChartConfig, ChartKind, BAR_LENGTH, BUILTIN_SCALE, DEFAULT_SCALE},
    record::{self, MeasurementRecord},
    style::{StyleTable, VisualEncoding},
};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs, Debug)]
/// Benchmark chart generator
struct Args {
    /// log progress to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Bar(BarArgs),
    Line(LineArgs),
    Agg(AggArgs),
    Gen(GenArgs),
}

#[derive(FromArgs, Debug)]
/// Draw call times at a single string length as horizontal bars. Reads
/// aggregate CSV from stdin and writes SVG to stdout.
#[argh(subcommand, name = "bar")]
struct BarArgs {
    /// figure scale, 1.5 when omitted
    #[argh(positional)]
    scale: Option<Scale>,

    /// string length to compare
    #[argh(option, short = 'l', default = "BAR_LENGTH")]
    length: u64,
}

#[derive(FromArgs, Debug)]
/// Draw call time against string length, one line per function. Reads
/// aggregate CSV from stdin and writes SVG to stdout.
#[argh(subcommand, name = "line")]
struct LineArgs {
    /// figure scale, 1.5 when omitted
    #[argh(positional)]
    scale: Option<Scale>,

    /// path to style table, defaults to tests.json next to the executable
    #[argh(option, short = 's')]
    styles: Option<PathBuf>,

    /// use the built-in h0-h9 styles at a fixed scale of 2.0
    #[argh(switch)]
    builtin_styles: bool,

    /// sort each line's points by string length before drawing
    #[argh(switch)]
    sort_x: bool,
}

#[derive(FromArgs, Debug)]
/// Summarize raw Source,Test,Length,Time timings per test and length. Reads
/// CSV from stdin and writes aggregate CSV to stdout.
#[argh(subcommand, name = "agg")]
struct AggArgs {}

#[derive(FromArgs, Debug)]
/// Aggregate a raw results file and write sizes.svg and times.svg.
#[argh(subcommand, name = "gen")]
struct GenArgs {
    /// raw results CSV
    #[argh(positional)]
    results: PathBuf,

    /// output directory
    #[argh(option, short = 'o', default = "PathBuf::from(\"out\")")]
    out_dir: PathBuf,

    /// bar chart scale, 1.5 when omitted
    #[argh(option)]
    scale: Option<Scale>,

    /// style table for the line chart; built-in styles when omitted
    #[argh(option, short = 's')]
    styles: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct Scale(f64);

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<f64>()
            .map_err(|e| format!("invalid scale {:?}: {}", s, e))?;
        match value.is_finite() && value > 0. {
            true => Ok(Scale(value)),
            false => Err(format!("scale must be a positive number, got {}", s)),
        }
    }
}

impl From<Scale> for f64 {
    fn from(val: Scale) -> Self {
        val.0
    }
}

fn scale_or_default(scale: Option<Scale>) -> f64 {
    scale.map_or(DEFAULT_SCALE, f64::from)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_stdin_records() -> Result<Vec<MeasurementRecord>> {
    record::read_records(io::stdin().lock()).context("Failed to read aggregate rows")
}

fn bar(args: BarArgs) -> Result<()> {
    let records = read_stdin_records()?;
    let config = ChartConfig {
        kind: ChartKind::Bar {
            length: args.length,
        },
        encoding: VisualEncoding::Rank,
        scale: scale_or_default(args.scale),
    };
    plot::draw(&records, &config, io::stdout().lock())?;
    Ok(())
}

fn line(args: LineArgs) -> Result<()> {
    // the style table must load before any row is read
    let (table, scale) = match (args.builtin_styles, args.styles) {
        (true, Some(_)) => bail!("--styles and --builtin-styles are mutually exclusive"),
        (true, None) => {
            if args.scale.is_some() {
                warn!("scale is fixed at {} with built-in styles", BUILTIN_SCALE);
            }
            (StyleTable::builtin(), BUILTIN_SCALE)
        }
        (false, path) => {
            let path = match path {
                Some(path) => path,
                None => StyleTable::default_path()?,
            };
            (StyleTable::load(&path)?, scale_or_default(args.scale))
        }
    };

    let records = read_stdin_records()?;
    let config = ChartConfig {
        kind: ChartKind::Line {
            sort_x: args.sort_x,
        },
        encoding: VisualEncoding::Table(&table),
        scale,
    };
    plot::draw(&records, &config, io::stdout().lock())?;
    Ok(())
}

fn agg() -> Result<()> {
    let rows = aggregate::aggregate_timings(io::stdin().lock())
        .context("Failed to aggregate raw timings")?;
    aggregate::write_rows(&rows, io::stdout().lock()).context("Failed to write aggregate rows")
}

fn gen(args: GenArgs) -> Result<()> {
    let (table, line_scale) = match &args.styles {
        Some(path) => (StyleTable::load(path)?, scale_or_default(args.scale)),
        None => (StyleTable::builtin(), BUILTIN_SCALE),
    };

    let results = File::open(&args.results)
        .with_context(|| format!("unable to open {}", args.results.display()))?;
    let rows = aggregate::aggregate_timings(results)
        .with_context(|| format!("Failed to aggregate {}", args.results.display()))?;
    let records: Vec<MeasurementRecord> = rows.iter().map(MeasurementRecord::from).collect();

    let charts = [
        (
            "sizes.svg",
            ChartConfig {
                kind: ChartKind::Line { sort_x: false },
                encoding: VisualEncoding::Table(&table),
                scale: line_scale,
            },
        ),
        (
            "times.svg",
            ChartConfig {
                kind: ChartKind::Bar { length: BAR_LENGTH },
                encoding: VisualEncoding::Rank,
                scale: scale_or_default(args.scale),
            },
        ),
    ];

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("unable to create {}", args.out_dir.display()))?;
    for (file_name, config) in charts.iter() {
        let path = args.out_dir.join(file_name);
        let svg = plot::plan(&records, config)
            .and_then(|plan| plot::render(&plan))
            .with_context(|| format!("Failed to draw {}", path.display()))?;
        fs::write(&path, &svg).with_context(|| format!("unable to write {}", path.display()))?;
        info!(path = %path.display(), bytes = svg.len(), "generated chart");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    match args.command {
        Command::Bar(args) => bar(args),
        Command::Line(args) => line(args),
        Command::Agg(_) => agg(),
        Command::Gen(args) => gen(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_accepts_positive_reals() {
        assert_eq!(f64::from("3.0".parse::<Scale>().unwrap()), 3.0);
        assert_eq!(f64::from("0.25".parse::<Scale>().unwrap()), 0.25);
    }

    #[test]
    fn scale_rejects_non_positive_or_non_finite() {
        for bad in ["0", "-1.5", "inf", "NaN", "big"] {
            assert!(bad.parse::<Scale>().is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn omitted_scale_uses_default() {
        assert_eq!(scale_or_default(None), DEFAULT_SCALE);
        assert_eq!(scale_or_default(Some(Scale(3.0))), 3.0);
    }
}
