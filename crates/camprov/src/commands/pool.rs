//! `camprov pool`: the configured range and what is taken.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use serde::Serialize;

use camprov_core::Orchestrator;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PoolView {
    range: String,
    capacity: usize,
    free: usize,
    reserved: Vec<Ipv4Addr>,
    next: Option<Ipv4Addr>,
}

fn detail(view: &PoolView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Range:     {}", view.range);
    let _ = writeln!(out, "Capacity:  {}", view.capacity);
    let _ = writeln!(out, "Free:      {}", view.free);
    let _ = writeln!(
        out,
        "Next:      {}",
        view.next.map_or_else(|| "none (pool exhausted)".into(), |a| a.to_string())
    );
    if view.reserved.is_empty() {
        let _ = write!(out, "Reserved:  -");
    } else {
        let _ = writeln!(out, "Reserved:");
        let list: Vec<String> = view.reserved.iter().map(|a| format!("  {a}")).collect();
        out.push_str(&list.join("\n"));
    }
    out
}

pub async fn handle(orchestrator: &Orchestrator, global: &GlobalOpts) -> Result<(), CliError> {
    let status = orchestrator.pool_status().await;
    let next = orchestrator.preview_next_address().await;
    let view = PoolView {
        free: status.capacity.saturating_sub(status.reserved.len()),
        range: status.range,
        capacity: status.capacity,
        reserved: status.reserved.into_iter().collect(),
        next,
    };

    let rendered = output::render_single(&global.output, &view, detail, |v| {
        v.next.map(|a| a.to_string()).unwrap_or_default()
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
