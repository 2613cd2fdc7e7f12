mod converter;
mod dump;
mod lua;
mod pipeline;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use converter::{PandocConverter, TextConverter};
use pipeline::RunStats;

const DUMP_PATH: &str = "FFXI+Wiki-20250521034029.xml";
const OUTPUT_PATH: &str = "ffxi_walkthroughs.lua";

#[derive(Parser)]
#[command(name = "wiki2lua", about = "Convert a MediaWiki XML export into a Lua walkthrough table")]
struct Cli {
    /// Wiki export to read
    #[arg(short, long, default_value = DUMP_PATH)]
    input: PathBuf,
    /// Lua file to write (overwritten)
    #[arg(short, long, default_value = OUTPUT_PATH)]
    output: PathBuf,
    /// Converter program, called as `<prog> --from=mediawiki --to=plain`
    #[arg(long, default_value = converter::DEFAULT_PROGRAM)]
    pandoc: String,
    /// Per-page converter timeout in seconds
    #[arg(long, default_value_t = converter::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let converter = PandocConverter::new(cli.pandoc, Duration::from_secs(cli.timeout))
        .context("Failed to start converter runtime")?;
    let stats = run(&cli.input, &cli.output, &converter)?;

    println!(
        "Wrote {} entries to {} ({} errors, {} empty pages dropped) in {}",
        stats.entries(),
        cli.output.display(),
        stats.errors,
        stats.dropped,
        format_duration(t0.elapsed())
    );
    Ok(())
}

/// Load the dump, convert page by page, then write the table.
fn run<C: TextConverter>(input: &Path, output: &Path, converter: &C) -> anyhow::Result<RunStats> {
    let pages = dump::load_pages(input)
        .with_context(|| format!("Failed to load wiki dump {}", input.display()))?;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    let (entries, stats) = pipeline::convert_pages(&pages, converter, &pb);
    pb.finish_and_clear();

    lua::write_table(output, &entries)?;
    info!(
        "Converted {} pages: {} ok, {} errors, {} dropped",
        stats.pages, stats.converted, stats.errors, stats.dropped
    );
    Ok(stats)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
