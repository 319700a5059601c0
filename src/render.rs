//! Rendering cube snapshots for terminals and downstream tools
//!
//! Every format lists dimension columns first, then the configured measures
//! in configuration order. Amounts are printed with two decimals and an
//! undefined mean shows as `-` in tables, `null` in JSON and an empty field
//! in CSV.

use crate::aggregation::MeasureValue;
use crate::engine::CubeSnapshot;
use crate::error::{CubeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::io::Write;
use std::time::Duration;

/// Output format for snapshots
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// One JSON object per snapshot
    Json,
    /// Header line plus one line per row
    Csv,
}

/// When the dashboard redraws during a replay
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Clear the screen and redraw each time Enter is pressed
    #[default]
    Prompt,
    /// Redraw on a fixed interval
    Interval,
}

/// Rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output format
    pub format: OutputFormat,
    /// Redraw trigger
    pub refresh: RefreshMode,
    /// Seconds between redraws in interval mode
    pub interval_seconds: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            refresh: RefreshMode::Prompt,
            interval_seconds: 5,
        }
    }
}

impl RenderConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.refresh == RefreshMode::Interval && self.interval_seconds == 0 {
            return Err(CubeError::Configuration(
                "refresh interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between redraws in interval mode
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Write one snapshot in `format`
pub fn write_snapshot<W: Write>(
    out: &mut W,
    snapshot: &CubeSnapshot,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(out, snapshot),
        OutputFormat::Json => write_json(out, snapshot),
        OutputFormat::Csv => write_csv(out, snapshot),
    }
}

/// Render a snapshot to a string
pub fn render_to_string(snapshot: &CubeSnapshot, format: OutputFormat) -> Result<String> {
    let mut buf = Vec::new();
    write_snapshot(&mut buf, snapshot, format)?;
    String::from_utf8(buf).map_err(|e| CubeError::Io(std::io::Error::other(e)))
}

fn header(snapshot: &CubeSnapshot) -> Vec<String> {
    snapshot
        .dimensions
        .iter()
        .map(ToString::to_string)
        .chain(snapshot.measures.iter().map(ToString::to_string))
        .collect()
}

fn write_table<W: Write>(out: &mut W, snapshot: &CubeSnapshot) -> Result<()> {
    let dims = snapshot.dimensions.len();
    let header = header(snapshot);
    let rows: Vec<Vec<String>> = snapshot
        .rows
        .iter()
        .map(|row| {
            row.key
                .values()
                .iter()
                .cloned()
                .chain(snapshot.measures.iter().map(|m| row.value(*m).to_string()))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    match snapshot.taken_at {
        Some(at) => writeln!(out, "Cube at {} ({} rows)", at, rows.len())?,
        None => writeln!(out, "Cube is empty")?,
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i < dims {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(&header))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;
    for row in &rows {
        writeln!(out, "{}", line(row))?;
    }
    Ok(())
}

fn json_value(value: MeasureValue) -> JsonValue {
    match value {
        MeasureValue::Count(n) => JsonValue::from(n),
        MeasureValue::Amount(v) => JsonValue::from((v * 100.0).round() / 100.0),
        MeasureValue::Undefined => JsonValue::Null,
    }
}

fn write_json<W: Write>(out: &mut W, snapshot: &CubeSnapshot) -> Result<()> {
    let rows: Vec<JsonValue> = snapshot
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (dimension, value) in snapshot.dimensions.iter().zip(row.key.values()) {
                object.insert(dimension.to_string(), JsonValue::from(value.as_str()));
            }
            for measure in &snapshot.measures {
                object.insert(measure.to_string(), json_value(row.value(*measure)));
            }
            JsonValue::Object(object)
        })
        .collect();

    let document = serde_json::json!({
        "taken_at": snapshot.taken_at,
        "dimensions": snapshot.dimensions,
        "measures": snapshot.measures,
        "rows": rows,
    });
    serde_json::to_writer(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}

fn write_csv<W: Write>(out: &mut W, snapshot: &CubeSnapshot) -> Result<()> {
    let mut writer = csv::Writer::from_writer(&mut *out);
    writer.write_record(header(snapshot))?;
    for row in &snapshot.rows {
        let measures = snapshot.measures.iter().map(|m| match row.value(*m) {
            MeasureValue::Undefined => String::new(),
            value => value.to_string(),
        });
        let record: Vec<String> = row.key.values().iter().cloned().chain(measures).collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
