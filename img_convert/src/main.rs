use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use img_convert::{
    convert_all, convert_all_with_progress, normalize_drop_payloads, supported_input_extensions,
    BatchReport, ConversionOutcome, ConvertOptions, OutputFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use shared_utils::logging::{self, LogConfig};
use shared_utils::print_summary_report;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::Level;

const BATCH_TEMPLATE: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ \
    {percent:>3}% • {pos}/{len} • ⏱️ {elapsed_precise} • {msg}";
const PROGRESS_CHARS: &str = "█▓░";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

#[derive(Parser)]
#[command(name = "img-convert")]
#[command(
    version,
    about = "Raster image format converter - keeps alpha where the target allows it",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert dropped files; each PAYLOAD may hold several paths, `{...}` groups keep spaces
    #[command(name = "run")]
    Run {
        #[arg(value_name = "PAYLOAD", required = true)]
        payloads: Vec<String>,

        /// Target format: png, jpg, webp, gif, bmp, tiff, avif
        #[arg(short, long, default_value = "jpg", value_parser = parse_output_format)]
        format: OutputFormat,

        /// Keep existing output files instead of replacing them
        #[arg(long)]
        no_overwrite: bool,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        #[arg(long)]
        json: bool,

        #[arg(short, long)]
        verbose: bool,
    },

    /// List output formats and readable input extensions
    Formats {
        #[arg(long)]
        json: bool,
    },
}

fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    let log_config = LogConfig::default()
        .with_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_stderr(verbose);
    if let Err(e) = logging::init_logging("img_convert", log_config) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }

    match cli.command {
        Commands::Run {
            payloads,
            format,
            no_overwrite,
            jobs,
            json,
            verbose: _,
        } => {
            let options = ConvertOptions::new(format)
                .with_overwrite(!no_overwrite)
                .with_jobs(jobs);
            run(&payloads, options, json)?;
        }

        Commands::Formats { json } => list_formats(json)?,
    }

    Ok(())
}

fn run(payloads: &[String], options: ConvertOptions, json_output: bool) -> anyhow::Result<()> {
    let paths = normalize_drop_payloads(payloads);
    if paths.is_empty() {
        bail!("No file paths found in the given input");
    }

    let start = Instant::now();

    let outcomes = if json_output {
        convert_all(&paths, &options)
    } else {
        eprintln!(
            "🖼️  Converting {} file(s) to {} (overwrite: {})",
            paths.len(),
            options.output_format,
            if options.overwrite { "on" } else { "off" }
        );
        let pb = create_progress_bar(paths.len() as u64, "Converting")?;
        let outcomes = convert_all_with_progress(&paths, &options, |i, outcome| {
            pb.println(describe(Path::new(&paths[i]), outcome));
            pb.inc(1);
        });
        pb.finish_and_clear();
        outcomes
    };

    let elapsed = start.elapsed();
    let report = BatchReport::new(&paths, outcomes, options);
    let tally = report.tally();

    if json_output {
        let doc = json!({
            "report": report,
            "summary": tally,
            "duration_secs": elapsed.as_secs_f64(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialize report")?
        );
    } else {
        print_summary_report(&tally, elapsed, "Image Conversion");
    }

    logging::log_operation_end("convert", elapsed, tally.failed == 0);
    Ok(())
}

fn create_progress_bar(total: u64, prefix: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BATCH_TEMPLATE)
            .context("Invalid progress bar template")?
            .progress_chars(PROGRESS_CHARS)
            .tick_chars(SPINNER_CHARS),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn describe(input: &Path, outcome: &ConversionOutcome) -> String {
    let input = input.display();
    match outcome {
        ConversionOutcome::Converted(output) => format!(
            "{} {} → {}",
            style("✅").green(),
            input,
            style(output.display()).green()
        ),
        ConversionOutcome::SkippedSameFormat => format!(
            "{} {}: {}",
            style("⏭️ ").dim(),
            input,
            style("already in target format").dim()
        ),
        ConversionOutcome::SkippedNotFound => format!(
            "{} {}: {}",
            style("⏭️ ").yellow(),
            input,
            style("not found").yellow()
        ),
        ConversionOutcome::SkippedExists(output) => format!(
            "{} {}: {} exists, kept",
            style("⏭️ ").yellow(),
            input,
            style(output.display()).yellow()
        ),
        ConversionOutcome::Failed(err) => format!(
            "{} {}: {}",
            style("❌").red().bold(),
            input,
            style(err).red()
        ),
    }
}

fn list_formats(json_output: bool) -> anyhow::Result<()> {
    let outputs: Vec<&str> = OutputFormat::ALL.iter().map(|f| f.extension()).collect();
    let inputs = supported_input_extensions();

    if json_output {
        let doc = json!({ "output": outputs, "input": inputs });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("📤 Output formats: {}", outputs.join(", "));
    println!("📥 Readable input extensions: {}", inputs.join(", "));
    Ok(())
}
