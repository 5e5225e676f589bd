//! Report Module
//!
//! Summary reporting for batch conversions

use crate::batch::BatchResult;
use std::time::Duration;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

pub fn print_summary_report(result: &BatchResult, duration: Duration, operation_name: &str) {
    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║  📊 {:<48} ║", format!("{} Summary Report", operation_name));
    println!("╠══════════════════════════════════════════════════════╣");
    println!("║  📁 Files Processed:    {:>10}                   ║", result.total);
    println!("║  ✅ Converted:          {:>10}                   ║", result.succeeded);
    println!("║  ❌ Failed:             {:>10}                   ║", result.failed);
    println!("║  ⏭️  Skipped:            {:>10}                   ║", result.skipped);
    for (reason, count) in &result.skip_reasons {
        println!("║     · {:<18}{:>10}                   ║", reason, count);
    }
    println!(
        "║  📈 Success Rate:       {:>9.1}%                   ║",
        result.success_rate()
    );
    println!(
        "║  ⏱️  Total Time:         {:>10}                   ║",
        format_duration(duration)
    );
    println!("╚══════════════════════════════════════════════════════╝");

    if !result.errors.is_empty() {
        println!();
        println!("❌ Errors encountered:");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (path, error) in &result.errors {
            println!("   {} → {}", path.display(), error);
        }
    }
}
