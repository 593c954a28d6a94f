pub mod json;
pub mod table;

use crate::collect::CollectResult;
use crate::store::Commit;

/// Print the outcome of a collect run: committed versions, failed sources,
/// diagnostics, and run metrics under verbose.
pub fn print_collect(result: &CollectResult, commits: &[Commit], verbose: bool) {
    if commits.is_empty() {
        println!("no snapshot committed");
    } else {
        println!("committed:");
        for commit in commits {
            println!(
                "  {}: version {} ({} record(s))",
                commit.source, commit.version, commit.entries
            );
        }
    }

    if !result.failures.is_empty() {
        println!("\nfailed sources:");
        for failure in &result.failures {
            println!("  {}: {} - {}", failure.source, failure.status, failure.error);
        }
    }

    print_diagnostics(result, verbose);

    if let Some(duration) = result.duration {
        println!("\ncollection completed in {:.2}s", duration.as_secs_f64());

        if verbose {
            if let Some(peak_bytes) = result.peak_memory_bytes {
                println!("peak memory: {:.1} MB", peak_bytes as f64 / 1_024_f64 / 1_024_f64);
            }
        }
    }
}

fn print_diagnostics(result: &CollectResult, verbose: bool) {
    if result.diagnostics.is_empty() {
        return;
    }

    println!();
    if verbose {
        println!("Diagnostics:");
        println!("{}", "-".repeat(40));
        for diagnostic in &result.diagnostics {
            println!("  {diagnostic}");
        }
    } else {
        for diagnostic in &result.diagnostics {
            println!("[diagnostic] {diagnostic}");
        }
    }
}
