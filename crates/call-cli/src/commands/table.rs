//! Table command - dump the call state table

use anyhow::{Context, Result};
use serde::Serialize;
use telcall_core::state_table::{EventTemplate, MASTER_TABLE};

use crate::cli::TableFormat;

#[derive(Serialize)]
struct Row {
    state: String,
    event: &'static str,
    next_state: Option<String>,
    publishes: Vec<EventTemplate>,
}

pub fn execute(format: TableFormat) -> Result<()> {
    let mut rows: Vec<Row> = MASTER_TABLE
        .entries()
        .into_iter()
        .map(|(key, transition)| Row {
            state: key.state.to_string(),
            event: key.event.type_name(),
            next_state: transition.next_state.map(|s| s.to_string()),
            publishes: transition.publish_events.clone(),
        })
        .collect();
    rows.sort_by(|a, b| (&a.state, a.event).cmp(&(&b.state, b.event)));

    match format {
        TableFormat::Json => {
            let json = serde_json::to_string_pretty(&rows).context("failed to encode table")?;
            println!("{}", json);
        }
        TableFormat::Text => {
            println!("{:<14} {:<18} {:<14} PUBLISHES", "STATE", "EVENT", "NEXT");
            for row in &rows {
                let publishes: Vec<String> = row.publishes.iter().map(|t| format!("{:?}", t)).collect();
                println!(
                    "{:<14} {:<18} {:<14} {}",
                    row.state,
                    row.event,
                    row.next_state.as_deref().unwrap_or("(no-op)"),
                    publishes.join(", ")
                );
            }
            println!("\n{} transitions", rows.len());
        }
    }
    Ok(())
}
