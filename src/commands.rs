//! Command execution for the rowkeep binary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::config::{Command, OutputFormat};
use crate::driver::{Action, Batch, Driver, Outcome};
use crate::record::{Record, RecordId};

/// Parse a command-line id: integers stay integers, anything else is text.
pub fn parse_id(raw: &str) -> RecordId {
    raw.parse::<i64>()
        .map_or_else(|_| RecordId::Text(raw.to_string()), RecordId::Int)
}

fn parse_record(raw: &str) -> Result<Record> {
    serde_json::from_str(raw).context("record must be a JSON object")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn emit<T: Serialize>(out: &mut impl Write, format: OutputFormat, value: &T) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", serde_json::to_string(value)?)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
    }
    Ok(())
}

fn emit_rows(out: &mut impl Write, format: OutputFormat, rows: &[Record]) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for row in rows {
                emit(out, format, row)?;
            }
            Ok(())
        }
        OutputFormat::Json => emit(out, format, &rows),
    }
}

/// Run one command against `driver`, writing results to `out`.
pub async fn run(
    command: &Command,
    driver: &dyn Driver,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Gather => emit_rows(out, format, &driver.gather().await?),
        Command::Select { id } => {
            let record = Record::with_id(parse_id(id));
            emit(out, format, &driver.select(&record).await?)
        }
        Command::Search { criteria } => {
            let criteria = parse_record(criteria)?;
            emit_rows(out, format, &driver.search(&criteria).await?)
        }
        Command::Insert { record } => emit(out, format, &driver.insert(&parse_record(record)?).await?),
        Command::Update { record } => emit(out, format, &driver.update(&parse_record(record)?).await?),
        Command::Delete { id } => {
            let record = Record::with_id(parse_id(id));
            emit(out, format, &driver.delete(&record).await?)
        }
        Command::Several { file } => {
            let batch: Batch = read_json(file)?;
            let mut fired: Vec<(Action, Outcome)> = Vec::with_capacity(batch.len());
            let last = driver
                .several(&batch, &mut |action: Action, outcome: &Outcome| {
                    fired.push((action, outcome.clone()));
                })
                .await?;

            if format == OutputFormat::Text {
                for (action, outcome) in &fired {
                    writeln!(out, "{action}\t{}", serde_json::to_string(outcome)?)?;
                }
                Ok(())
            } else {
                emit(out, format, &last)
            }
        }
        Command::Refresh { file } => {
            let records: Vec<Record> = read_json(file)?;
            emit(out, format, &driver.refresh(&records).await?)
        }
        Command::Truncate => emit(out, format, &driver.truncate().await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::MemoryDriver;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn run_json(driver: &MemoryDriver, command: Command) -> Value {
        let mut out = Vec::new();
        run(&command, driver, OutputFormat::Json, &mut out)
            .await
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), RecordId::Int(42));
        assert_eq!(parse_id("call-7"), RecordId::Text("call-7".into()));
    }

    #[tokio::test]
    async fn test_insert_then_gather() {
        let driver = MemoryDriver::new("calls", "calls");
        run_json(
            &driver,
            Command::Insert {
                record: r#"{"id": 1, "caller": "100"}"#.into(),
            },
        )
        .await;

        let rows = run_json(&driver, Command::Gather).await;
        assert_eq!(rows, json!([{"id": 1, "caller": "100"}]));
    }

    #[tokio::test]
    async fn test_several_text_output_lists_each_record() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("batch.json");
        std::fs::write(&file, r#"{"insert": [{"id": 1}, {"id": 2}], "delete": [{"id": 1}]}"#)
            .unwrap();

        let driver = MemoryDriver::new("calls", "calls");
        let mut out = Vec::new();
        run(&Command::Several { file }, &driver, OutputFormat::Text, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let actions: Vec<&str> = text
            .lines()
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(actions, vec!["insert", "insert", "delete"]);
    }

    #[tokio::test]
    async fn test_truncate_output() {
        let driver = MemoryDriver::new("calls", "calls");
        driver.insert(&Record::with_id(1)).await.unwrap();

        let ack = run_json(&driver, Command::Truncate).await;
        assert_eq!(ack["destroyedRows"], json!(1));
    }

    #[tokio::test]
    async fn test_invalid_record_json() {
        let driver = MemoryDriver::new("calls", "calls");
        let mut out = Vec::new();
        let err = run(
            &Command::Insert {
                record: "[1, 2]".into(),
            },
            &driver,
            OutputFormat::Json,
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }
}
