//! Gallery statistics.
//!
//! Provides a quick summary of the catalog: counts by moderation status,
//! counts by content type, and the number of "quality" items (approved
//! deployments, pilots and case studies with educational value ≥ 3). Used by
//! `gallery stats` to show whether crawls are producing usable content.

use std::path::Path;

use anyhow::Result;

use gallery_core::models::GalleryStats;
use gallery_core::store::GalleryStore;

use crate::progress::format_number;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(store: &dyn GalleryStore, db_path: &Path) -> Result<()> {
    let stats = store.gallery_stats().await?;
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Robotics Gallery — Catalog Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print!("{}", render_counts(&stats));
    println!();
    Ok(())
}

fn render_counts(stats: &GalleryStats) -> String {
    let mut out = String::new();
    let total = stats.total();
    out.push_str(&format!("  Total:       {}\n", format_number(total)));
    out.push_str(&format!("  Approved:    {}\n", format_number(stats.total_approved)));
    out.push_str(&format!("  Pending:     {}\n", format_number(stats.total_pending)));
    out.push_str(&format!("  Rejected:    {}\n", format_number(stats.total_rejected)));
    out.push_str(&format!(
        "  Quality:     {} / {} approved ({}%)\n",
        format_number(stats.quality_content),
        format_number(stats.total_approved),
        percent(stats.quality_content, stats.total_approved)
    ));

    if !stats.by_content_type.is_empty() {
        out.push('\n');
        out.push_str("  Approved by content type:\n");
        out.push_str(&format!("  {:<24} {:>8} {:>6}\n", "CONTENT TYPE", "ITEMS", "SHARE"));
        out.push_str(&format!("  {}\n", "-".repeat(40)));
        let mut rows: Vec<_> = stats.by_content_type.iter().collect();
        // largest first, ties in vocabulary order
        rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (content_type, count) in rows {
            out.push_str(&format!(
                "  {:<24} {:>8} {:>5}%\n",
                content_type.as_str(),
                format_number(*count),
                percent(*count, stats.total_approved)
            ));
        }
    }
    out
}

fn percent(part: u64, whole: u64) -> u64 {
    if whole > 0 {
        part * 100 / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
