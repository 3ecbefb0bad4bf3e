//! Human-readable text output

use crate::distributed::{DispatchStats, Product};
use crate::matrix::Matrix;
use std::fmt::Write;
use std::time::Duration;

/// Print the input matrices and the product to the console
pub fn print_matrices(a: &Matrix, b: &Matrix, c: &Matrix) {
    print!("{}", format_matrices(a, b, c));
}

/// Print the run summary to the console
///
/// Shows totals followed by one line per worker.
pub fn print_summary(product: &Product, elapsed: Duration) {
    print!("{}", format_summary(&product.stats, elapsed));
}

pub fn format_matrices(a: &Matrix, b: &Matrix, c: &Matrix) -> String {
    format!("Matrix A:\n{}\nMatrix B:\n{}\nMatrix C (A * B):\n{}", a, b, c)
}

pub fn format_summary(stats: &DispatchStats, elapsed: Duration) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out, "                    RUN SUMMARY");
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out, "Elapsed Time: {:.3}s", elapsed.as_secs_f64());
    let _ = writeln!(out, "Work units:   {}", format_number(stats.units_dispatched as u64));
    let _ = writeln!(out, "Results:      {}", format_number(stats.results_received as u64));
    let _ = writeln!(out, "Workers:      {} ({} idle)", stats.per_worker.len(), stats.idle_workers());
    let _ = writeln!(out);

    let _ = writeln!(out, "Per worker:");
    for worker in &stats.per_worker {
        let share = if stats.units_dispatched > 0 {
            worker.units_dispatched as f64 / stats.units_dispatched as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "  Worker {:>3}: {:>10} units ({:>5.1}%){}",
            worker.worker,
            format_number(worker.units_dispatched as u64),
            share,
            if worker.terminated { "" } else { "  [not terminated]" }
        );
    }
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");

    out
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
