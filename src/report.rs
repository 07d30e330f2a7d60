use comfy_table::{
    presets,
    Attribute,
    Cell,
    CellAlignment,
    Color,
    ContentArrangement,
    Table,
};
use std::collections::BTreeMap;
use stream_observer_collector::{
    CycleReport,
    Statistics,
};

fn state_color(state: &str) -> Color {
    match state {
        "RUNNING" => Color::Green,
        "FINISHED" => Color::Blue,
        "FAILED" => Color::Red,
        "CANCELED" | "CANCELING" => Color::Yellow,
        _ => Color::White,
    }
}

fn counts_table(title: &str, counts: &BTreeMap<String, u64>, colored: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(title).add_attribute(Attribute::Bold),
            Cell::new("Jobs").add_attribute(Attribute::Bold),
        ]);
    for (key, count) in counts {
        let label = Cell::new(key);
        let label = if colored { label.fg(state_color(key)) } else { label };
        table.add_row(vec![label, Cell::new(count).set_alignment(CellAlignment::Right)]);
    }
    table
}

/// Statistics as terminal tables: states, then clusters and job types.
pub(crate) fn statistics_tables(stats: &Statistics) -> String {
    let mut output = format!("Total jobs: {}\n", stats.total_jobs);
    output.push_str(&counts_table("State", &stats.states, true).to_string());
    if !stats.clusters.is_empty() {
        output.push('\n');
        output.push_str(&counts_table("Cluster", &stats.clusters, false).to_string());
    }
    if !stats.job_types.is_empty() {
        output.push('\n');
        output.push_str(&counts_table("Job type", &stats.job_types, false).to_string());
    }
    output
}

pub(crate) fn cycle_table(report: &CycleReport) -> String {
    let mut output = report.to_string();
    if report.failures.is_empty() {
        return output;
    }
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Cluster").add_attribute(Attribute::Bold),
            Cell::new("Failure").add_attribute(Attribute::Bold).fg(Color::Red),
        ]);
    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(format!("{} (#{})", failure.cluster_name, failure.cluster_id)),
            Cell::new(&failure.reason),
        ]);
    }
    output.push_str(&table.to_string());
    output
}
