use super::*;
use libresync::stats::{DedupSummary, ImageReport};
use libresync::RunStats;

fn item(index: usize, total: usize, slug: &str) -> WorkItem {
    WorkItem {
        index,
        total,
        slug: slug.to_string(),
    }
}

fn report(mode: ReportMode) -> RunReport {
    RunReport {
        mode,
        total_images: 2,
        stats: Some(RunStats::refreshed(1024, 3072) + RunStats::steady(2048)),
        images: Vec::new(),
        dedup: DedupSummary {
            total_real_bytes: 4096,
            unique_base_images: 1,
            layer_reuse: ReuseStats::default(),
            history_reuse: ReuseStats {
                nodes: 3,
                shared_nodes: 1,
                total: 4,
                shared: 2,
            },
        },
        errors: Vec::new(),
    }
}

#[test]
fn test_size_band_thresholds() {
    assert_eq!(SizeBand::of(1_000_000_001), SizeBand::Huge);
    assert_eq!(SizeBand::of(1_000_000_000), SizeBand::Large);
    assert_eq!(SizeBand::of(500_000_001), SizeBand::Large);
    assert_eq!(SizeBand::of(100_000_001), SizeBand::Medium);
    assert_eq!(SizeBand::of(100_000_000), SizeBand::Small);
    assert_eq!(SizeBand::of(-5), SizeBand::Small);
}

#[test]
fn test_output_format_from_string() {
    assert_eq!(output_format("pretty"), OutputFormat::Pretty);
    assert_eq!(output_format("JSON"), OutputFormat::Json);
    assert_eq!(output_format("yml"), OutputFormat::Yaml);
    assert_eq!(output_format("invalid"), OutputFormat::Pretty);
}

#[test]
fn test_color_choice_from_string() {
    assert_eq!(color_choice("always"), ColorChoice::Always);
    assert_eq!(color_choice("never"), ColorChoice::Never);
    assert_eq!(color_choice("sometimes"), ColorChoice::Auto);
}

#[test]
fn test_tty_formatter_colors_sizes() {
    let plain = PlainFormatter.size(2048);
    let colored = TtyFormatter.size(2048);
    assert_eq!(plain, "2 KiB");
    assert!(colored.contains("2 KiB"));
    assert_ne!(colored, plain);
}

#[test]
fn test_render_item_block() {
    let mut log = ItemLog::new();
    log.warning("Out of Sync");
    log.info("Pulling new image. redis:6");

    let block = render_item(&PlainFormatter, "Refreshing", &item(1, 12, "redis:6"), &log, None);

    let lines: Vec<&str> = block.lines().collect();
    assert_eq!(lines[0], "    [2/12] Refreshing redis:6");
    assert_eq!(lines[1], "    [2/12] Out of Sync");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_render_item_appends_failure() {
    let failed = item(0, 1, "ghost:1");
    let failure = ItemFailure {
        item: failed.clone(),
        message: "Could not fetch remote digest".to_string(),
    };

    let block = render_item(&PlainFormatter, "Refreshing", &failed, &ItemLog::new(), Some(&failure));

    assert!(block.ends_with("[1/1] Could not fetch remote digest"));
}

#[test]
fn test_render_pretty_refresh_report() {
    let text = render_pretty(&PlainFormatter, &report(ReportMode::Refresh));

    assert!(text.starts_with("Report:"));
    assert!(text.contains("Images Refreshed: 1"));
    assert!(text.contains("    delta: 2 KiB"));
    assert!(text.contains("Total Virtual Disk:  5 KiB"));
    assert!(text.contains("Total Real Size:     4 KiB"));
    assert!(text.contains("Unique Base Images: 1"));
    assert!(text.contains("50.0%"));
    assert!(!text.contains("Errors"));
}

#[test]
fn test_render_pretty_lists_errors() {
    let mut report = report(ReportMode::DryRun);
    report.errors.push("ghost:1: manifest unknown".to_string());

    let text = render_pretty(&PlainFormatter, &report);

    assert!(text.starts_with("Report (dry run):"));
    assert!(text.contains("Errors (1):"));
    assert!(text.ends_with("ghost:1: manifest unknown"));
}

#[test]
fn test_render_pretty_report_only_table() {
    let mut report = report(ReportMode::ReportOnly);
    report.stats = None;
    report.images = vec![ImageReport {
        image: "redis:6".to_string(),
        virtual_bytes: 2048,
        reuse_bytes: 1024,
    }];

    let text = render_pretty(&PlainFormatter, &report);

    assert!(text.contains("IMAGE"));
    assert!(text.contains("redis:6"));
    assert!(text.contains("1 KiB"));
    assert!(text.contains("IMAGE STATS:"));
    assert!(text.contains("DISK STATS:"));
    assert!(!text.contains("Images Refreshed"));
}

#[test]
fn test_render_report_json() {
    let json = render_report(&PlainFormatter, &report(ReportMode::Refresh), OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["mode"], "refresh");
    assert_eq!(value["stats"]["images_refreshed"], 1);
    assert!(value.get("images").is_none());
}

#[test]
fn test_render_report_yaml() {
    let yaml = render_report(&PlainFormatter, &report(ReportMode::ReportOnly), OutputFormat::Yaml).unwrap();
    assert!(yaml.contains("mode: report_only"));
}
