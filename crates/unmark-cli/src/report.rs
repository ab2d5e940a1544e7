// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch summary rendering for stdout, as text or JSON.

use std::fmt::Write as _;

use unmark_core::error::UnmarkError;
use unmark_core::{BatchReport, JobStatus};

pub fn print_report(report: &BatchReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(body) => println!("{}", body),
            Err(err) => tracing::error!("Cannot serialise report: {}", err),
        }
    } else {
        print!("{}", render_text(report));
    }
}

pub fn print_error(err: &UnmarkError, json: bool) {
    if json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "stage": err.stage(),
        });
        println!("{}", body);
    } else {
        eprintln!("unmark: {}", err);
    }
}

pub fn render_text(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "unmark {} ({}): {} succeeded, {} failed, {} skipped",
        report.run_id,
        report.mode,
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
    if report.warning_count() > 0 {
        let _ = writeln!(out, "{} cleanup warnings", report.warning_count());
    }
    let _ = writeln!(out, "output: {}", report.output_root.display());

    for outcome in &report.outcomes {
        let name = outcome.relative.display();
        let _ = match &outcome.status {
            JobStatus::Succeeded => match outcome.stats {
                Some(stats) => writeln!(
                    out,
                    "  ok    {} ({} pages, {} replaced)",
                    name, stats.pages, stats.replacements
                ),
                None => writeln!(out, "  ok    {}", name),
            },
            JobStatus::Failed { stage, reason } => {
                writeln!(out, "  FAIL  {} [{}] {}", name, stage, reason)
            }
            JobStatus::Skipped { reason } => writeln!(out, "  skip  {} ({})", name, reason),
        };
        for warning in &outcome.warnings {
            let _ = writeln!(out, "        warning: {}", warning);
        }
    }
    out
}
