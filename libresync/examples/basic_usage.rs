//! Basic usage example for the Resync library.
//!
//! Prints the size and shared bytes of local images without contacting any
//! registry. Needs a running docker daemon.
//!
//! Run with: cargo run --example basic_usage -- redis:6 nginx:latest

use libresync::{ItemFailure, ItemLog, Progress, Resync, WorkItem};

struct Printer;

impl Progress for Printer {
    fn item_finished(&mut self, item: &WorkItem, log: &ItemLog, failure: Option<&ItemFailure>) {
        println!("{} {}", item.position(), item.slug);
        for line in log.lines() {
            println!("  {}", line.text);
        }
        if let Some(failure) = failure {
            println!("  ✗ {}", failure.message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let images: Vec<String> = std::env::args().skip(1).collect();
    if images.is_empty() {
        eprintln!("usage: basic_usage <image>...");
        return Ok(());
    }

    let resync = Resync::builder().build()?;
    let report = resync.report_only(images, &mut Printer).await;

    println!();
    for row in &report.images {
        println!("{:<40} {:>12} {:>12}", row.image, row.virtual_bytes, row.reuse_bytes);
    }
    println!(
        "\nShared build steps: {:.1}%",
        report.dedup.history_reuse.percent()
    );
    Ok(())
}
