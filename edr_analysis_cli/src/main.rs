use std::fs;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use edr_analysis::{analyze, channel_tokens, Analysis, AnalysisParams, UnitSystem};
use rayon::prelude::*;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "EDR kinematic analysis CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one time/speed channel pair and write the per-segment CSV
    Analyze(AnalyzeArgs),
    /// Inspect a channel file for token counts and parse problems
    Diagnose(DiagnoseArgs),
    /// Analyze every `<stem>_time.txt` / `<stem>_speed.txt` pair in a directory
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Time channel text file (seconds relative to the reference instant)
    #[arg(long, value_hint = ValueHint::FilePath)]
    time: PathBuf,

    /// Speed channel text file (active speed unit)
    #[arg(long, value_hint = ValueHint::FilePath)]
    speed: PathBuf,

    /// Unit system fixing the conversion factor and gravity constant
    #[arg(long, value_enum, default_value_t = UnitOpt::Imperial)]
    units: UnitOpt,

    /// Speed-change magnitude flagged as a significant event
    #[arg(long, default_value_t = 10.0)]
    threshold: f64,

    /// Tolerance in seconds when matching the reference instant (0 = exact)
    #[arg(long, default_value_t = 0.0)]
    reference_eps: f64,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "segments.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional JSON report path (full analysis, timestamped)
    #[arg(long, value_hint = ValueHint::FilePath)]
    json: Option<PathBuf>,

    /// Print the aggregate summary block
    #[arg(long, action = ArgAction::SetTrue)]
    summary: bool,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct DiagnoseArgs {
    /// Channel text file to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory containing `<stem>_time.txt` / `<stem>_speed.txt` pairs
    #[arg(required = true, value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Unit system applied to every case
    #[arg(long, value_enum, default_value_t = UnitOpt::Imperial)]
    units: UnitOpt,

    /// Speed-change magnitude flagged as a significant event
    #[arg(long, default_value_t = 10.0)]
    threshold: f64,

    /// Tolerance in seconds when matching the reference instant
    #[arg(long, default_value_t = 0.0)]
    reference_eps: f64,

    /// Output CSV path for the per-case summary table
    #[arg(short, long, default_value = "batch_summary.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnitOpt {
    Imperial,
    Metric,
}

impl From<UnitOpt> for UnitSystem {
    fn from(value: UnitOpt) -> Self {
        match value {
            UnitOpt::Imperial => UnitSystem::Imperial,
            UnitOpt::Metric => UnitSystem::Metric,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Analyze(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Diagnose(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Batch(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Diagnose(args) => handle_diagnose(args),
        Command::Batch(args) => handle_batch(args),
    }
}

fn build_params(units: UnitOpt, threshold: f64, reference_eps: f64) -> Result<AnalysisParams> {
    if threshold < 0.0 {
        return Err(anyhow!("--threshold must be non-negative"));
    }
    if reference_eps < 0.0 {
        return Err(anyhow!("--reference-eps must be non-negative"));
    }
    Ok(AnalysisParams {
        unit_system: units.into(),
        significant_speed_change: threshold,
        reference_epsilon_s: reference_eps,
    })
}

fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let params = build_params(args.units, args.threshold, args.reference_eps)?;

    let time_text = fs::read_to_string(&args.time)
        .with_context(|| format!("failed to read {}", args.time.display()))?;
    let speed_text = fs::read_to_string(&args.speed)
        .with_context(|| format!("failed to read {}", args.speed.display()))?;

    let analysis = analyze(&time_text, &speed_text, &params)
        .with_context(|| format!("analysis failed for {}", args.time.display()))?;
    info!(
        "Analyzed {} samples into {} segments ({} significant)",
        analysis.samples.len(),
        analysis.segments.len(),
        analysis.summary.significant_event_count
    );

    if args.output.as_os_str() == "-" {
        write_segments_stdout(&analysis)?;
    } else {
        write_segments_csv(&analysis, &args.output)?;
        info!("Wrote segment CSV: {}", args.output.display());
    }

    if let Some(path) = args.json.as_ref() {
        write_json_report(&analysis, path)?;
        info!("Wrote JSON report: {}", path.display());
    }

    if args.summary {
        print_summary(&analysis)?;
    }

    Ok(())
}

fn handle_diagnose(args: DiagnoseArgs) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut parsed = Vec::new();
    let mut invalid = Vec::new();
    for (index, token) in channel_tokens(&text).enumerate() {
        match token.parse::<f64>() {
            Ok(value) => parsed.push(value),
            Err(_) => invalid.push((index, token.to_string())),
        }
    }

    info!(
        "{}: {} tokens, {} numeric, {} invalid",
        args.input.display(),
        parsed.len() + invalid.len(),
        parsed.len(),
        invalid.len()
    );
    for (index, token) in &invalid {
        warn!("token {} is not a number: '{}'", index, token);
    }

    if let (Some(first), Some(last)) = (parsed.first(), parsed.last()) {
        let min = parsed.iter().copied().fold(f64::INFINITY, f64::min);
        let max = parsed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        info!(
            "range: first {:.3}, last {:.3}, min {:.3}, max {:.3}",
            first, last, min, max
        );
    } else {
        warn!("no numeric tokens found");
    }

    if invalid.is_empty() {
        info!("channel is clean");
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<()> {
    let params = build_params(args.units, args.threshold, args.reference_eps)?;

    let cases = discover_cases(&args.dir)?;
    if cases.is_empty() {
        return Err(anyhow!(
            "no <stem>_time.txt / <stem>_speed.txt pairs under {}",
            args.dir.display()
        ));
    }
    info!("Found {} case pair(s) under {}", cases.len(), args.dir.display());

    let results: Vec<(String, Result<Analysis>)> = cases
        .par_iter()
        .map(|case| {
            let run = || -> Result<Analysis> {
                let time_text = fs::read_to_string(&case.time_path)
                    .with_context(|| format!("failed to read {}", case.time_path.display()))?;
                let speed_text = fs::read_to_string(&case.speed_path)
                    .with_context(|| format!("failed to read {}", case.speed_path.display()))?;
                analyze(&time_text, &speed_text, &params)
                    .with_context(|| format!("analysis failed for case '{}'", case.stem))
            };
            (case.stem.clone(), run())
        })
        .collect();

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        "case",
        "samples",
        "segments",
        "significant_events",
        "measured_distance",
        "extrapolated_distance",
        "total_distance",
        "has_reference_sample",
        "min_speed",
        "max_speed",
    ])?;

    let mut failures = 0usize;
    for (stem, result) in &results {
        match result {
            Ok(analysis) => {
                let summary = &analysis.summary;
                writer.write_record([
                    stem.clone(),
                    analysis.samples.len().to_string(),
                    analysis.segments.len().to_string(),
                    summary.significant_event_count.to_string(),
                    format!("{:.3}", summary.measured_distance),
                    format!("{:.3}", summary.extrapolated_distance),
                    format!("{:.3}", summary.total_distance),
                    summary.has_reference_sample.to_string(),
                    format!("{:.3}", summary.min_speed),
                    format!("{:.3}", summary.max_speed),
                ])?;
            }
            Err(err) => {
                failures += 1;
                warn!("case '{}' skipped: {:#}", stem, err);
            }
        }
    }
    writer.flush()?;

    info!(
        "Wrote batch summary: {} ({} ok, {} failed)",
        args.output.display(),
        results.len() - failures,
        failures
    );
    Ok(())
}

struct BatchCase {
    stem: String,
    time_path: PathBuf,
    speed_path: PathBuf,
}

fn discover_cases(dir: &Path) -> Result<Vec<BatchCase>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;

    let mut cases = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix("_time.txt") else {
            continue;
        };
        let speed_path = dir.join(format!("{stem}_speed.txt"));
        if speed_path.is_file() {
            cases.push(BatchCase {
                stem: stem.to_string(),
                time_path: path,
                speed_path,
            });
        } else {
            warn!("no speed channel for '{}'; skipping", stem);
        }
    }
    cases.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(cases)
}

fn write_segments_stdout(analysis: &Analysis) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_segment_rows(analysis, &mut writer)
}

fn write_segments_csv(analysis: &Analysis, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_segment_rows(analysis, &mut writer)
}

fn write_segment_rows<W: Write>(analysis: &Analysis, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "segment",
        "start_time_s",
        "end_time_s",
        "time_interval_s",
        "speed_change",
        "decel_accel_rate",
        "drag_factor",
        "segment_distance",
        "cumulative_distance",
        "significant",
    ])?;

    for (index, segment) in analysis.segments.iter().enumerate() {
        writer.write_record([
            (index + 1).to_string(),
            format!("{:.3}", segment.start_time_s),
            format!("{:.3}", segment.end_time_s),
            format!("{:.3}", segment.time_interval_s),
            format!("{:.3}", segment.speed_change),
            segment
                .decel_accel_rate
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "".into()),
            segment
                .drag_factor
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "".into()),
            format!("{:.3}", segment.segment_distance),
            format!("{:.3}", segment.cumulative_distance),
            segment.is_significant.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_json_report(analysis: &Analysis, path: &Path) -> Result<()> {
    let report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "analysis": analysis,
    });
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &report)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(analysis: &Analysis) -> Result<()> {
    let summary = &analysis.summary;
    let units = analysis.params.unit_system;
    let dist = units.distance_label();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "measured distance:      {:.3} {}", summary.measured_distance, dist)?;
    writeln!(
        out,
        "extrapolated distance:  {:.3} {}",
        summary.extrapolated_distance, dist
    )?;
    writeln!(out, "total distance:         {:.3} {}", summary.total_distance, dist)?;
    writeln!(out, "reference sample:       {}", summary.has_reference_sample)?;
    writeln!(out, "time to reference:      {:.3} s", summary.time_to_reference_s)?;
    writeln!(
        out,
        "speed range:            {:.3} to {:.3} {}",
        summary.min_speed,
        summary.max_speed,
        units.speed_label()
    )?;
    writeln!(
        out,
        "avg speed change:       {:.3} {}",
        summary.avg_speed_change,
        units.speed_label()
    )?;
    match summary.avg_decel_accel_rate {
        Some(rate) => writeln!(out, "avg decel/accel rate:   {:.3} {}", rate, units.rate_label())?,
        None => writeln!(out, "avg decel/accel rate:   n/a")?,
    }
    match summary.avg_drag_factor {
        Some(f) => writeln!(out, "avg drag factor:        {:.3}", f)?,
        None => writeln!(out, "avg drag factor:        n/a")?,
    }
    writeln!(out, "significant events:     {}", summary.significant_event_count)?;
    writeln!(out, "time span:              {:.3} s", summary.time_span_s)?;
    Ok(())
}
