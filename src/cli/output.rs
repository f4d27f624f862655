//! CLI output formatting.
//!
//! Every command prints through an [`OutputFormatter`] so the same data can
//! be rendered for a terminal or consumed as JSON by scripts.

use console::style;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::protocol::{ProtocolEvent, ProtocolStatistics, UserPosition};
use crate::utils::constants::PARITY_DECIMALS;
use crate::utils::format::{format_bps, format_units, format_usd};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Compact JSON
    Json,
    /// Pretty JSON
    JsonPretty,
}

impl OutputFormat {
    fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonPretty)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "pretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Renders command results
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
    color: bool,
}

impl OutputFormatter {
    /// Create a formatter; color applies to text output only
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }

    /// Selected format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn status(&self, status: &str, message: &str) {
        if self.format.is_json() {
            self.print_json(&serde_json::json!({ "status": status, "message": message }));
            return;
        }
        let marker = match (status, self.color) {
            ("success", true) => style("✓").green().to_string(),
            ("error", true) => style("✗").red().bold().to_string(),
            ("warning", true) => style("⚠").yellow().to_string(),
            (_, true) => style("ℹ").blue().to_string(),
            (other, false) => format!("{}:", other.to_uppercase()),
        };
        if status == "error" {
            eprintln!("{} {}", marker, message);
        } else {
            println!("{} {}", marker, message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        self.status("success", message);
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        self.status("error", message);
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        self.status("warning", message);
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        self.status("info", message);
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        if self.format.is_json() {
            return;
        }
        println!();
        if self.color {
            println!("{}", style(format!("=== {} ===", title)).cyan().bold());
        } else {
            println!("=== {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.format.is_json() {
            self.print_json(&serde_json::json!({ key: value }));
        } else if self.color {
            println!("  {}: {}", style(key).bold(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    /// Print any serializable value; text output falls back to indented JSON
    pub fn data<T: Serialize>(&self, data: &T) {
        if self.format.is_json() {
            self.print_json(data);
        } else {
            match serde_json::to_string_pretty(data) {
                Ok(json) => println!("{}", json),
                Err(e) => self.error(&format!("cannot encode output: {}", e)),
            }
        }
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.format.is_json() {
            let data: Vec<BTreeMap<&str, &str>> = rows
                .iter()
                .map(|row| headers.iter().copied().zip(row.iter().map(String::as_str)).collect())
                .collect();
            self.print_json(&data);
        } else {
            print!("{}", render_table(headers, rows));
        }
    }

    /// Print protocol statistics
    pub fn statistics(&self, stats: &ProtocolStatistics) {
        if self.format.is_json() {
            self.print_json(stats);
            return;
        }
        let optional_usd = |v: Option<u128>| v.map(format_usd).unwrap_or_else(|| "stale".into());

        self.section("Protocol");
        self.kv("Block", &format!("{} @ {}", stats.block_height, stats.timestamp));
        self.kv("Paused", &stats.paused.to_string());
        self.kv("Supply", &format!("{} PARITY", format_units(stats.total_supply, PARITY_DECIMALS)));
        self.kv("Holders", &stats.holder_count.to_string());
        self.kv(
            "PARITY price",
            &stats
                .parity_price
                .map(|p| format_usd(p as u128 * 10u128.pow(10)))
                .unwrap_or_else(|| "stale".into()),
        );

        self.section("Reserve");
        self.kv("Value", &optional_usd(stats.reserve_value_usd));
        self.kv(
            "Collateral ratio",
            &stats
                .collateral_ratio_bps
                .map(format_bps)
                .unwrap_or_else(|| "n/a".into()),
        );
        self.kv("Surplus", &optional_usd(stats.surplus_usd));
        self.kv("Swept", &format!("{} in {} sweeps", format_usd(stats.total_swept_usd), stats.sweep_count));

        self.section("NAV pool");
        self.kv("Value", &optional_usd(stats.nav_value_usd));
        self.kv("Rebalances", &stats.rebalance_count.to_string());

        let rows: Vec<Vec<String>> = crate::core::asset::Asset::ALL
            .iter()
            .map(|asset| {
                vec![
                    asset.symbol().to_string(),
                    format_units(stats.reserve_balances.get(*asset), asset.decimals()),
                    format_units(stats.nav_holdings.get(*asset), asset.decimals()),
                ]
            })
            .collect();
        println!();
        self.table(&["Asset", "Reserve", "NAV"], &rows);

        self.section("Activity");
        let c = &stats.counters;
        self.kv("Mints / burns", &format!("{} / {}", c.mint_count, c.burn_count));
        self.kv("Swaps / transfers", &format!("{} / {}", c.swap_count, c.transfer_count));
        self.kv("Fees", &format!("{} PARITY", format_units(c.total_fee_parity, PARITY_DECIMALS)));
        self.kv(
            "Oracle",
            &format!(
                "{} reporters, {}",
                stats.reporter_count,
                if stats.oracle_bootstrap { "bootstrap" } else { "full quorum" }
            ),
        );
    }

    /// Print one account's position
    pub fn position(&self, label: &str, position: &UserPosition) {
        if self.format.is_json() {
            #[derive(Serialize)]
            struct Labelled<'a> {
                account: &'a str,
                position: &'a UserPosition,
            }
            self.print_json(&Labelled {
                account: label,
                position,
            });
            return;
        }
        self.section(label);
        self.kv("PARITY", &format_units(position.parity_balance, PARITY_DECIMALS));
        if let Some(usd) = position.parity_value_usd {
            self.kv("Value", &format_usd(usd));
        }
        for asset in crate::core::asset::Asset::ALL {
            let amount = position.collateral.get(asset);
            if amount > 0 {
                self.kv(asset.symbol(), &format_units(amount, asset.decimals()));
            }
        }
        if let Some(block) = position.last_burn_block {
            self.kv("Last burn", &format!("block {}", block));
        }
    }

    /// Print an event list
    pub fn events(&self, events: &[ProtocolEvent]) {
        if self.format.is_json() {
            self.print_json(&events);
            return;
        }
        let rows: Vec<Vec<String>> = events
            .iter()
            .map(|e| {
                vec![
                    e.block_height().to_string(),
                    e.event_type().to_string(),
                    e.hash().to_hex()[..16].to_string(),
                ]
            })
            .collect();
        self.table(&["Block", "Event", "Hash"], &rows);
    }

    fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        let output = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        match output {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("cannot encode output: {}", e),
        }
    }
}

/// Lay out a plain-text table
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("Pretty".parse::<OutputFormat>().unwrap(), OutputFormat::JsonPretty);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["Asset", "Amount"],
            &[
                vec!["KSM".into(), "1.5".into()],
                vec!["STABLE".into(), "1000".into()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Asset  | Amount");
        assert_eq!(lines[1], "-------+-------");
        assert_eq!(lines[2], "KSM    | 1.5");
    }

    #[test]
    fn test_render_table_empty_headers() {
        assert!(render_table(&[], &[]).is_empty());
    }
}
