//! Extract command - turn a zip of NF-e XMLs into a regime report.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use regtrib_core::models::config::RegtribConfig;
use regtrib_core::report::HEADERS;
use regtrib_core::{ExtractionRecord, Pipeline, PipelineOutcome, ReportArtifact, RunReport};

use super::config::default_config_path;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Zip archive containing NF-e XML files ("-" reads from stdin)
    #[arg(required = true)]
    archive: PathBuf,

    /// Output file or directory (default: configured report name in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "xlsx")]
    format: OutputFormat,

    /// Also write the run summary and diagnostics as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Styled spreadsheet
    Xlsx,
    /// CSV rows
    Csv,
    /// JSON rows
    Json,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Serialize)]
struct JsonRow<'a> {
    cnpj: &'a str,
    nome_da_empresa: &'a str,
    regime_tributario: &'a str,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.extraction.workers = jobs;
    }

    let data = read_archive(&args.archive)?;
    info!("Read {} bytes from {}", data.len(), args.archive.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Processing archive...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let pipeline = Pipeline::new(config);
    let outcome = pipeline.run(&data).await;
    pb.finish_and_clear();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            anyhow::bail!("Could not process {}", args.archive.display());
        }
    };

    print_diagnostics(outcome.run_report());

    if let Some(summary_path) = &args.summary {
        fs::write(summary_path, serde_json::to_string_pretty(outcome.run_report())?)?;
        debug!("Wrote run summary to {}", summary_path.display());
    }

    match outcome {
        PipelineOutcome::NoData(run) => {
            println!(
                "{} No data was extracted from {} XML files. Check that they follow the NF-e standard.",
                style("⚠").yellow(),
                run.documents_found
            );
        }
        PipelineOutcome::Report(artifact) => {
            let output_path = resolve_output(args.output.as_deref(), &artifact.file_name, args.format);
            write_output(&output_path, &artifact, args.format)?;

            print_counters(&artifact.run);
            println!(
                "{} Report written to {}",
                style("✓").green(),
                output_path.display()
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<RegtribConfig> {
    if let Some(path) = config_path {
        return Ok(RegtribConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using configuration from {}", default_path.display());
        return Ok(RegtribConfig::from_file(&default_path)?);
    }

    Ok(RegtribConfig::default())
}

fn read_archive(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        return Ok(data);
    }

    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    Ok(fs::read(path)?)
}

/// Pick the output file: a directory gets the report name appended, and the
/// extension follows the chosen format when no path is given.
fn resolve_output(output: Option<&Path>, file_name: &str, format: OutputFormat) -> PathBuf {
    let default_name = Path::new(file_name).with_extension(format.extension());

    match output {
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => path.to_path_buf(),
        None => default_name,
    }
}

fn write_output(path: &Path, artifact: &ReportArtifact, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Xlsx => fs::write(path, &artifact.bytes)?,
        OutputFormat::Csv => fs::write(path, format_csv(&artifact.records)?)?,
        OutputFormat::Json => fs::write(path, format_json(&artifact.records)?)?,
    }
    Ok(())
}

fn format_csv(records: &[ExtractionRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(HEADERS)?;
    for record in records {
        wtr.write_record(record.cells())?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_json(records: &[ExtractionRecord]) -> anyhow::Result<String> {
    let rows: Vec<JsonRow> = records
        .iter()
        .map(|r| JsonRow {
            cnpj: &r.tax_id,
            nome_da_empresa: &r.legal_name,
            regime_tributario: r.regime.label(),
        })
        .collect();

    Ok(serde_json::to_string_pretty(&rows)?)
}

fn print_diagnostics(run: &RunReport) {
    for diagnostic in &run.diagnostics {
        eprintln!(
            "{} {}: {}",
            style("⚠").yellow(),
            diagnostic.path.display(),
            diagnostic.reason
        );
    }
}

fn print_counters(run: &RunReport) {
    println!(
        "{} {} files processed successfully",
        style("✓").green(),
        run.summary.total_final
    );
    println!(
        "   {} read, {} duplicates removed, {} in report",
        style(run.summary.total_read).cyan(),
        style(run.summary.duplicates_removed).yellow(),
        style(run.summary.total_final).green()
    );
}
