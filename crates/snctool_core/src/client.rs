//! Record access through the vendor `snc` CLI.
//!
//! The platform is only reachable through the CLI, so the transport is a
//! blocking child process per call: no retries, no timeout, no shared state.
//! Flows depend on the `RecordApi` trait rather than the concrete client so
//! they can be exercised against an in-memory double.

use std::process::Command;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::extract::{ExtractError, extract_embedded_json};

const REQUEST_COMPLETED_MARKER: &str = "Request completed";

pub trait RecordApi {
    /// Run an encoded query and return the rows of the `result` array.
    fn query_records(
        &mut self,
        table: &str,
        query: &str,
        fields: &str,
        limit: usize,
    ) -> Result<Vec<Value>>;

    /// Fetch a single text field from one record.
    fn fetch_field(&mut self, table: &str, sys_id: &str, field: &str) -> Result<String> {
        let query = format!("sys_id={sys_id}");
        let rows = self.query_records(table, &query, field, 1)?;
        let row = rows
            .first()
            .ok_or_else(|| anyhow::anyhow!("no record in {table} matches sys_id={sys_id}"))?;
        let value = row
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("record {table}/{sys_id} has no text field {field}"))?;
        Ok(value.to_string())
    }

    /// Overwrite a single field on one record.
    fn update_field(&mut self, table: &str, sys_id: &str, field: &str, value: &str) -> Result<()>;

    /// Create a record from a JSON object of field values.
    fn create_record(&mut self, table: &str, data: &Value) -> Result<()>;

    fn request_count(&self) -> usize;
}

/// `RecordApi` implementation that spawns the `snc` binary per request and
/// extracts the JSON payload from its mixed status-line output.
pub struct SncCliClient {
    snc_bin: String,
    request_count: usize,
}

impl SncCliClient {
    pub fn new(snc_bin: impl Into<String>) -> Self {
        Self {
            snc_bin: snc_bin.into(),
            request_count: 0,
        }
    }

    fn run(&mut self, args: &[&str]) -> Result<String> {
        self.request_count += 1;
        let output = Command::new(&self.snc_bin)
            .args(args)
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.snc_bin))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{} {}` exited with {}: {}",
                self.snc_bin,
                args.join(" "),
                output.status,
                if stderr.trim().is_empty() {
                    stdout.trim()
                } else {
                    stderr.trim()
                }
            );
        }
        Ok(stdout)
    }
}

impl RecordApi for SncCliClient {
    fn query_records(
        &mut self,
        table: &str,
        query: &str,
        fields: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let limit = limit.to_string();
        let stdout = self.run(&[
            "record", "query", "--table", table, "--query", query, "--fields", fields, "--limit",
            &limit, "-o", "json",
        ])?;
        let payload = extract_embedded_json(&stdout)
            .with_context(|| format!("no JSON payload in `snc record query` output for {table}"))?;
        let rows = payload
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(rows)
    }

    fn update_field(&mut self, table: &str, sys_id: &str, field: &str, value: &str) -> Result<()> {
        let data = serde_json::json!({ field: value }).to_string();
        let stdout = self.run(&[
            "record", "update", "--table", table, "--sys-id", sys_id, "--data", &data, "-o",
            "json",
        ])?;
        match extract_embedded_json(&stdout) {
            Ok(_) => Ok(()),
            // Some CLI versions print only the completion banner on update.
            Err(ExtractError::NotFound { .. }) if stdout.contains(REQUEST_COMPLETED_MARKER) => {
                Ok(())
            }
            Err(error) => Err(error).with_context(|| {
                format!("update of {table}/{sys_id}.{field} returned no confirmation payload")
            }),
        }
    }

    fn create_record(&mut self, table: &str, data: &Value) -> Result<()> {
        let data = data.to_string();
        self.run(&[
            "record", "create", "--table", table, "--data", &data, "-o", "none",
        ])?;
        Ok(())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RecordApi, SncCliClient};

    #[test]
    fn fetch_field_reads_first_row_via_query() {
        struct OneRow;
        impl RecordApi for OneRow {
            fn query_records(
                &mut self,
                table: &str,
                query: &str,
                fields: &str,
                limit: usize,
            ) -> anyhow::Result<Vec<serde_json::Value>> {
                assert_eq!(table, "sys_script_include");
                assert_eq!(query, "sys_id=abc123");
                assert_eq!(fields, "script");
                assert_eq!(limit, 1);
                Ok(vec![json!({"script": "var x = 1;"})])
            }
            fn update_field(&mut self, _: &str, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
                unreachable!()
            }
            fn create_record(&mut self, _: &str, _: &serde_json::Value) -> anyhow::Result<()> {
                unreachable!()
            }
            fn request_count(&self) -> usize {
                0
            }
        }

        let script = OneRow
            .fetch_field("sys_script_include", "abc123", "script")
            .expect("fetch");
        assert_eq!(script, "var x = 1;");
    }

    #[test]
    fn fetch_field_fails_on_empty_result() {
        struct NoRows;
        impl RecordApi for NoRows {
            fn query_records(
                &mut self,
                _: &str,
                _: &str,
                _: &str,
                _: usize,
            ) -> anyhow::Result<Vec<serde_json::Value>> {
                Ok(Vec::new())
            }
            fn update_field(&mut self, _: &str, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
                unreachable!()
            }
            fn create_record(&mut self, _: &str, _: &serde_json::Value) -> anyhow::Result<()> {
                unreachable!()
            }
            fn request_count(&self) -> usize {
                0
            }
        }

        let error = NoRows
            .fetch_field("sys_ui_page", "missing", "client_script")
            .expect_err("must fail");
        assert!(error.to_string().contains("sys_id=missing"));
    }

    #[test]
    fn spawn_failure_names_the_binary() {
        let mut client = SncCliClient::new("snc-binary-that-does-not-exist");
        let error = client
            .query_records("sys_script_include", "sys_id=x", "script", 1)
            .expect_err("must fail");
        assert!(error.to_string().contains("snc-binary-that-does-not-exist"));
        assert_eq!(client.request_count(), 1);
    }
}
