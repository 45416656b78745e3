use anyhow::Result;
use colored::*;

use crate::core::telemetry::{available_ports, PortEntry};

/// List serial ports the monitor can attach to.
pub fn execute() -> Result<()> {
    let ports = available_ports()?;
    print!("{}", format_port_list(&ports));
    Ok(())
}

fn format_port_list(ports: &[PortEntry]) -> String {
    if ports.is_empty() {
        return format!("{}\n", "No serial ports found.".yellow());
    }

    let width = ports.iter().map(|p| p.name.len()).max().unwrap_or(0);
    ports
        .iter()
        .map(|port| {
            let name = format!("{:<width$}", port.name, width = width);
            format!("{}  {}\n", name.bold(), port.description.dimmed())
        })
        .collect()
}
