use clap::Parser;
use libresync::{NoProgress, Progress, Resync, RunReport};
use libresync::config::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod compose;
mod context;
mod format;

/// Resync - Container Image Synchronizer
///
/// Keeps locally stored container images in step with their registries and
/// reports how much storage the images share.
#[derive(Parser, Debug)]
#[command(name = "resync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Compose manifests listing the images (default: docker-compose.yml)
    files: Vec<PathBuf>,

    /// Synchronize a single image instead of reading manifests
    #[arg(long, value_name = "SLUG")]
    image: Option<String>,

    /// Inspect local images and report reuse without contacting registries
    #[arg(long)]
    report_only: bool,

    /// Report what would be refreshed without pulling, tagging or removing
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of images processed at once
    #[arg(long, value_name = "N")]
    cpu_count: Option<usize>,

    /// Report format: pretty, json, yaml
    #[arg(short, long, value_parser = ["pretty", "json", "yaml"])]
    format: Option<String>,

    /// Control colored output: auto, always, never
    #[arg(long, value_parser = ["auto", "always", "never"])]
    color: Option<String>,

    /// Configuration file (default: $RESYNC_CONFIG or the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> context::CliOverrides {
        context::CliOverrides {
            config_path: self.config.clone(),
            cpu_count: self.cpu_count,
            dry_run: self.dry_run,
            format: self.format.clone(),
            color: self.color.clone(),
        }
    }

    /// Returns the references to process, in input order.
    fn images(&self) -> Result<Vec<String>, String> {
        match &self.image {
            Some(image) => Ok(vec![image.clone()]),
            None => compose::collect_images(&self.files),
        }
    }
}

/// Maps the `-v` count to a default log filter.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn execute(
    resync: &Resync,
    report_only: bool,
    images: Vec<String>,
    progress: &mut dyn Progress,
) -> RunReport {
    if report_only {
        resync.report_only(images, progress).await
    } else {
        resync.refresh(images, progress).await
    }
}

fn run(cli: Cli) -> Result<(), String> {
    // Build context with precedence: defaults > config file > env vars > CLI flags
    let ctx = context::AppContext::build(&cli.overrides())?;
    let images = cli.images()?;
    let formatter = format::create_formatter(ctx.config.output.color);
    let output_format = ctx.config.output.format;

    let resync = Resync::builder()
        .with_config(ctx.config.clone())
        .build()
        .map_err(|e| e.to_string())?;
    tracing::debug!(
        version = libresync::version(),
        images = images.len(),
        concurrency = resync.concurrency(),
        dry_run = resync.options().dry_run,
        "configuration resolved"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    // Item blocks only make sense next to the pretty report.
    let report = if output_format == OutputFormat::Pretty {
        let verb = if cli.report_only { "Inspecting" } else { "Refreshing" };
        let mut progress = format::TerminalProgress::new(formatter.as_ref(), verb, images.len());
        let report = runtime.block_on(execute(&resync, cli.report_only, images, &mut progress));
        progress.finish();
        println!();
        report
    } else {
        runtime.block_on(execute(&resync, cli.report_only, images, &mut NoProgress))
    };

    let rendered = format::render_report(formatter.as_ref(), &report, output_format)?;
    println!("{}", rendered);
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version output also end with status 1.
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        // Per-image failures are part of the report, not of the exit status.
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            format::error(&message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
