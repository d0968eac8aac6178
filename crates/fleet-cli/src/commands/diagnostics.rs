//! Doctor report rendering

use crate::console::CliConsole;
use colored::*;
use fleet_core::recovery::{DoctorReport, Finding, FindingKind, Severity};

fn icon(finding: &Finding) -> ColoredString {
    match finding.severity {
        Severity::Pass => "✓".green().bold(),
        Severity::Warn => "⚠".yellow().bold(),
    }
}

fn label(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::HostSession => "Host session",
        FindingKind::PaneBinding => "Pane binding",
        FindingKind::SessionBinding => "Session binding",
        FindingKind::MissingClaim => "Missing claim",
        FindingKind::ClaimOwnerMismatch => "Claim owner",
        FindingKind::OrphanClaim => "Orphan claim",
        FindingKind::ExpiredClaim => "Expired claim",
        FindingKind::Cursor => "Cursor",
        FindingKind::BlockedDrift => "Blocked state",
    }
}

pub fn print_report(console: &CliConsole, report: &DoctorReport) {
    console.print_header(&format!("Team {} Health Check", report.team_id));
    println!();

    for finding in &report.findings {
        println!(
            "{} {} - {}",
            icon(finding),
            label(finding.kind).bold(),
            finding.message
        );
        if let Some(hint) = &finding.hint {
            println!("    {} {}", "→".dimmed(), hint.dimmed());
        }
    }

    let warnings = report.warnings().count();
    let passed = report.findings.len() - warnings;
    println!();
    println!("{}", "=".repeat(50).dimmed());
    println!(
        "Summary: {} passed, {} warnings",
        passed.to_string().green(),
        warnings.to_string().yellow()
    );

    if report.is_ok() {
        console.success("Team looks healthy");
    } else {
        console.warn("Run `fleet team recover` to repair drift");
    }
}

