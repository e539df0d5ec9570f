//! CSV and JSON export of scored windows with a fixed column order.

use crate::config::OutputConfig;
use crate::ensemble::EnsembleEngine;
use crate::error::PipelineError;
use crate::features::{FeatureVector, CORE_COLUMNS, TOP_N};
use crate::pipeline::ScoredWindow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// One output cell. Missing values are empty in CSV and `null` in JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    fn from_opt_u8(v: Option<u8>) -> Self {
        v.map_or(Cell::Null, |v| Cell::Number(f64::from(v)))
    }

    fn time(t: DateTime<Utc>) -> Self {
        Cell::Text(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    fn to_csv(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Number(v) if v.is_finite() => v.to_string(),
            Cell::Number(_) => String::new(),
            Cell::Text(s) => escape_csv(s),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            // Whole numbers print as integers.
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Value::from(*v as i64),
            Cell::Number(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Output column names. `actor_ip` is present only when grouping by actor.
pub fn columns(grouped: bool) -> Vec<String> {
    let detectors = EnsembleEngine::detector_names();
    let mut cols: Vec<String> = vec!["window_start".to_string(), "window_end".to_string()];
    cols.extend(CORE_COLUMNS.iter().map(|c| c.to_string()));
    cols.extend(detectors.iter().map(|d| format!("{}_label", d)));
    cols.push("ensemble_anomaly".to_string());
    if grouped {
        cols.push("actor_ip".to_string());
    }
    cols.extend(
        FeatureVector::numeric_columns()
            .into_iter()
            .skip(CORE_COLUMNS.len())
            .map(str::to_string),
    );
    for prefix in ["top_service", "top_tag"] {
        cols.extend((1..=TOP_N).map(|i| format!("{}_{}", prefix, i)));
        cols.extend((1..=TOP_N).map(|i| format!("{}_{}_freq", prefix, i)));
    }
    cols.extend(detectors.iter().map(|d| format!("{}_score", d)));
    cols
}

/// Cells of one row, aligned with [`columns`].
pub fn row_cells(row: &ScoredWindow, grouped: bool) -> Vec<Cell> {
    let fv = &row.features;
    let detectors = EnsembleEngine::detector_names();
    let numeric = fv.numeric_features();

    let mut cells = vec![Cell::time(fv.window_start), Cell::time(fv.window_end)];
    cells.extend(numeric[..CORE_COLUMNS.len()].iter().map(|(_, v)| Cell::Number(*v)));
    cells.extend(
        detectors
            .iter()
            .map(|d| Cell::from_opt_u8(row.ensemble.verdict(d).map(|v| v.label))),
    );
    cells.push(Cell::from_opt_u8(row.ensemble.ensemble_anomaly));
    if grouped {
        cells.push(fv.actor_ip.clone().map_or(Cell::Null, Cell::Text));
    }
    cells.extend(numeric[CORE_COLUMNS.len()..].iter().map(|(_, v)| Cell::Number(*v)));
    for top in [&fv.top_services, &fv.top_tags] {
        cells.extend((0..TOP_N).map(|i| top.get(i).map_or(Cell::Null, |(name, _)| Cell::Text(name.clone()))));
        cells.extend((0..TOP_N).map(|i| top.get(i).map_or(Cell::Null, |(_, freq)| Cell::Number(*freq))));
    }
    cells.extend(
        detectors
            .iter()
            .map(|d| row.ensemble.verdict(d).map_or(Cell::Null, |v| Cell::Number(v.score))),
    );
    cells
}

/// Header then one line per row. The header is written even with no rows.
pub fn write_csv<W: Write>(mut w: W, rows: &[ScoredWindow], grouped: bool) -> std::io::Result<()> {
    let header: Vec<String> = columns(grouped).iter().map(|c| escape_csv(c)).collect();
    writeln!(w, "{}", header.join(","))?;
    for row in rows {
        let line: Vec<String> = row_cells(row, grouped).iter().map(Cell::to_csv).collect();
        writeln!(w, "{}", line.join(","))?;
    }
    w.flush()
}

/// JSON objects with keys in column order.
pub fn to_json_records(rows: &[ScoredWindow], grouped: bool) -> Vec<Map<String, Value>> {
    let cols = columns(grouped);
    rows.iter()
        .map(|row| {
            cols.iter()
                .cloned()
                .zip(row_cells(row, grouped).iter().map(Cell::to_json))
                .collect()
        })
        .collect()
}

pub fn write_json<W: Write>(w: W, rows: &[ScoredWindow], grouped: bool) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(w, &to_json_records(rows, grouped))
}

/// Write the enabled formats under `output.dir`; returns the paths written.
pub fn save(rows: &[ScoredWindow], grouped: bool, output: &OutputConfig) -> Result<Vec<PathBuf>, PipelineError> {
    std::fs::create_dir_all(&output.dir)?;
    let mut written = Vec::new();
    if output.csv {
        let path = output.dir.join(format!("{}.csv", output.basename));
        write_csv(BufWriter::new(File::create(&path)?), rows, grouped)?;
        written.push(path);
    }
    if output.json {
        let path = output.dir.join(format!("{}.json", output.basename));
        let mut w = BufWriter::new(File::create(&path)?);
        write_json(&mut w, rows, grouped)?;
        w.flush()?;
        written.push(path);
    }
    info!(rows = rows.len(), files = written.len(), "exported window scores");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quoting() {
        assert_eq!(escape_csv("sshd"), "sshd");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
        assert_eq!(Cell::Text("x,y".to_string()).to_csv(), "\"x,y\"");
        assert_eq!(Cell::Number(f64::NAN).to_csv(), "");
        assert_eq!(Cell::Null.to_csv(), "");
    }
}
