//! Terminal output formatting for the ptah CLI.
//! Uses comfy-table for tabular output and colored for severity-aware
//! terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use ptah_core::generator::MigrationFiles;
use ptah_core::runner::MigrationStatus;

/// Print `migrate-status` as a colored table.
pub fn print_status_table(status: &MigrationStatus) {
    println!("Current version: {}", status.current_version.to_string().cyan().bold());

    if status.pending.is_empty() {
        println!("{}", "No pending migrations.".green());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Version"), Cell::new("State")]);

    for version in &status.pending {
        table.add_row(vec![Cell::new(version), Cell::new("Pending".yellow().to_string())]);
    }

    println!("{table}");
    println!("{}/{} applied, {} pending", status.total - status.pending.len(), status.total, status.pending.len());
}

/// Print a summary of the versions applied by `migrate-up`.
pub fn print_migrate_up_summary(applied: &[i64]) {
    if applied.is_empty() {
        println!("{}", "Already up to date.".green());
        return;
    }
    println!("{} Applied {} migration(s): {}", "✓".green().bold(), applied.len(), versions_list(applied));
}

/// Print the result of `migrate-down`.
pub fn print_migrate_down_summary(reverted: &Option<i64>) {
    match reverted {
        Some(v) => println!("{} Reverted migration {}.", "✓".green().bold(), v),
        None => println!("{}", "Nothing to revert.".yellow()),
    }
}

/// Print the result of `generate`.
pub fn print_generate_summary(files: &Option<MigrationFiles>) {
    match files {
        Some(f) => {
            println!("{} Wrote migration {}:", "✓".green().bold(), f.version);
            println!("  {}", f.up_path.display());
            println!("  {}", f.down_path.display());
        }
        None => println!("{}", "No schema changes detected; nothing generated.".green()),
    }
}

fn versions_list(versions: &[i64]) -> String {
    versions.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}
