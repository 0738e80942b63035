use indicatif::{ProgressBar, ProgressStyle};
use libresync::config::{ColorChoice, OutputFormat};
use libresync::dedup::ReuseStats;
use libresync::format::pretty_bytes;
use libresync::{ItemFailure, ItemLog, LineKind, Progress, ReportMode, RunReport, WorkItem};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use tabled::{Table, Tabled, settings::Style};

/// Width of the `[n/total]` column.
const POSITION_WIDTH: usize = 10;

/// Width of the section rules in the pretty report.
const RULE_WIDTH: usize = 80;

/// Trait for output formatting that can be TTY-aware or plain text
pub trait OutputFormatter: Send + Sync {
    /// Style one progress line according to its kind
    fn paint(&self, kind: LineKind, text: &str) -> String;

    /// Pretty print a size, highlighted by magnitude
    fn size(&self, bytes: i64) -> String;

    /// Style a report section heading
    fn heading(&self, text: &str) -> String;

    /// Create a progress bar for determinate progress
    fn progress_bar(&self, len: u64) -> ProgressBar;
}

/// How loudly a size is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBand {
    /// Over 1 GB
    Huge,
    /// Over 500 MB
    Large,
    /// Over 100 MB
    Medium,
    Small,
}

impl SizeBand {
    pub fn of(bytes: i64) -> Self {
        if bytes > 1_000_000_000 {
            SizeBand::Huge
        } else if bytes > 500_000_000 {
            SizeBand::Large
        } else if bytes > 100_000_000 {
            SizeBand::Medium
        } else {
            SizeBand::Small
        }
    }
}

/// TTY-aware formatter with colors and progress indicators
pub struct TtyFormatter;

impl OutputFormatter for TtyFormatter {
    fn paint(&self, kind: LineKind, text: &str) -> String {
        match kind {
            LineKind::Info => text.cyan().to_string(),
            LineKind::Success => text.bright_green().to_string(),
            LineKind::Warning => text.on_red().to_string(),
            LineKind::Error => text.red().to_string(),
        }
    }

    fn size(&self, bytes: i64) -> String {
        let text = pretty_bytes(bytes);
        match SizeBand::of(bytes) {
            SizeBand::Huge => text.on_red().to_string(),
            SizeBand::Large => text.red().to_string(),
            SizeBand::Medium => text.yellow().to_string(),
            SizeBand::Small => text.green().to_string(),
        }
    }

    fn heading(&self, text: &str) -> String {
        text.bold().to_string()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ ");
        pb.set_style(style);
        pb
    }
}

/// Plain text formatter for non-TTY output (piped, scripted)
pub struct PlainFormatter;

impl OutputFormatter for PlainFormatter {
    fn paint(&self, _kind: LineKind, text: &str) -> String {
        text.to_string()
    }

    fn size(&self, bytes: i64) -> String {
        pretty_bytes(bytes)
    }

    fn heading(&self, text: &str) -> String {
        text.to_string()
    }

    fn progress_bar(&self, _len: u64) -> ProgressBar {
        ProgressBar::hidden()
    }
}

/// Create the appropriate formatter based on the color choice, TTY and environment
pub fn create_formatter(choice: ColorChoice) -> Box<dyn OutputFormatter> {
    let color = match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::env::var("NO_COLOR").is_err()
                && (std::io::stdout().is_terminal() || std::io::stderr().is_terminal())
        }
    };
    if color {
        Box::new(TtyFormatter)
    } else {
        Box::new(PlainFormatter)
    }
}

/// Print a startup error on stderr, in red when stderr is a terminal
pub fn error(message: &str) {
    if std::env::var("NO_COLOR").is_err() && std::io::stderr().is_terminal() {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    } else {
        eprintln!("✗ {}", message);
    }
}

/// Parses an output format name; anything unknown is pretty.
pub fn output_format(s: &str) -> OutputFormat {
    match s.trim().to_lowercase().as_str() {
        "json" => OutputFormat::Json,
        "yaml" | "yml" => OutputFormat::Yaml,
        _ => OutputFormat::Pretty,
    }
}

/// Parses a color choice; anything unknown is auto.
pub fn color_choice(s: &str) -> ColorChoice {
    match s.trim().to_lowercase().as_str() {
        "always" => ColorChoice::Always,
        "never" => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

fn position(item: &WorkItem) -> String {
    format!("{:>width$}", item.position(), width = POSITION_WIDTH)
}

/// Renders one finished item as a block: a header, its log and its failure.
pub fn render_item(
    formatter: &dyn OutputFormatter,
    verb: &str,
    item: &WorkItem,
    log: &ItemLog,
    failure: Option<&ItemFailure>,
) -> String {
    let position = position(item);
    let mut lines = vec![format!("{} {} {}", position, verb, item.slug)];
    for line in log.lines() {
        lines.push(format!("{} {}", position, formatter.paint(line.kind, &line.text)));
    }
    if let Some(failure) = failure {
        lines.push(format!("{} {}", position, formatter.paint(LineKind::Error, &failure.message)));
    }
    lines.join("\n")
}

/// Progress display: item blocks printed above an optional progress bar.
pub struct TerminalProgress<'a> {
    formatter: &'a dyn OutputFormatter,
    verb: &'static str,
    bar: ProgressBar,
}

impl<'a> TerminalProgress<'a> {
    pub fn new(formatter: &'a dyn OutputFormatter, verb: &'static str, total: usize) -> Self {
        Self {
            formatter,
            verb,
            bar: formatter.progress_bar(total as u64),
        }
    }

    /// Clears the bar and prints the completion line.
    pub fn finish(self) {
        self.bar.finish_and_clear();
        println!("Refreshing complete.");
    }
}

impl Progress for TerminalProgress<'_> {
    fn item_finished(&mut self, item: &WorkItem, log: &ItemLog, failure: Option<&ItemFailure>) {
        let block = render_item(self.formatter, self.verb, item, log, failure);
        self.bar.suspend(|| println!("{}", block));
        self.bar.inc(1);
    }

    fn outstanding(&mut self, remaining: usize) {
        self.bar
            .suspend(|| println!("There are still {} refreshes outstanding.", remaining));
    }
}

#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "VIRTUAL SIZE")]
    virtual_size: String,
    #[tabled(rename = "REUSE")]
    reuse: String,
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn reuse_line(label: &str, shared_label: &str, stats: &ReuseStats) -> String {
    format!(
        "{:<22} {:<22} {:.1}%",
        format!("{} {}", label, stats.total),
        format!("{} {}", shared_label, stats.shared),
        stats.percent()
    )
}

fn image_stats(report: &RunReport) -> Vec<String> {
    vec![
        format!("Unique Base Images: {}", report.dedup.unique_base_images),
        reuse_line("Total layers   ", "Shared layers  ", &report.dedup.layer_reuse),
        reuse_line("Total commands ", "Shared commands", &report.dedup.history_reuse),
    ]
}

/// Renders the human-readable report.
pub fn render_pretty(formatter: &dyn OutputFormatter, report: &RunReport) -> String {
    let mut out = Vec::new();
    let real = format!("Total Real Size:     {}", pretty_bytes(report.dedup.total_real_bytes as i64));

    match report.mode {
        ReportMode::ReportOnly => {
            out.push(formatter.heading("REPORT:"));
            let rows: Vec<ImageRow> = report
                .images
                .iter()
                .map(|row| ImageRow {
                    image: row.image.clone(),
                    virtual_size: pretty_bytes(row.virtual_bytes as i64),
                    reuse: formatter.size(row.reuse_bytes as i64),
                })
                .collect();
            out.push(Table::new(&rows).with(Style::empty()).to_string());

            out.push(String::new());
            out.push(formatter.heading("IMAGE STATS:"));
            out.push(rule());
            out.extend(image_stats(report));

            out.push(String::new());
            out.push(formatter.heading("DISK STATS:"));
            out.push(rule());
            out.push(real);
        }
        ReportMode::Refresh | ReportMode::DryRun => {
            let title = if report.mode == ReportMode::DryRun {
                "Report (dry run):"
            } else {
                "Report:"
            };
            out.push(formatter.heading(title));
            out.push("=".repeat(RULE_WIDTH));
            if let Some(stats) = &report.stats {
                out.push(format!("Images Refreshed: {}", stats.images_refreshed));
                out.push(format!("    added: {}", pretty_bytes(stats.bytes_added as i64)));
                out.push(format!("  removed: {}", pretty_bytes(stats.bytes_removed as i64)));
                out.push(format!("    delta: {}", pretty_bytes(stats.delta())));
                out.push(String::new());
                out.push(format!("Stable Virtual Disk: {}", formatter.size(stats.bytes_steady as i64)));
                out.push(format!("Total Virtual Disk:  {}", formatter.size(stats.total_virtual() as i64)));
                out.push(String::new());
            }
            out.push(real);
            out.push(String::new());
            out.extend(image_stats(report));
        }
    }

    if report.has_errors() {
        out.push(String::new());
        out.push(formatter.heading(&format!("Errors ({}):", report.errors.len())));
        for error in &report.errors {
            out.push(formatter.paint(LineKind::Error, error));
        }
    }

    out.join("\n")
}

/// Renders the final report in the requested format.
pub fn render_report(
    formatter: &dyn OutputFormatter,
    report: &RunReport,
    format: OutputFormat,
) -> Result<String, String> {
    match format {
        OutputFormat::Pretty => Ok(render_pretty(formatter, report)),
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e)),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("Failed to serialize to YAML: {}", e))
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
