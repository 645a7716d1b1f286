//! Migrates the legacy comma-delimited `values` field of each scoring
//! method into one child record per value.
//!
//! Display values map to the numeric value used for averaging: T-shirt
//! sizes follow the Fibonacci-ish ladder, special cards get sentinel
//! numbers (`?` is -1 so result calculation can exclude it), anything else
//! parses as a number or falls back to 0. Child rows get sequences 10, 20,
//! 30, … so values can be reordered later without renumbering.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::client::RecordApi;
use crate::config::ToolConfig;

const TSHIRT_VALUES: &[(&str, f64)] = &[
    ("XS", 1.0),
    ("S", 2.0),
    ("M", 3.0),
    ("L", 5.0),
    ("XL", 8.0),
    ("XXL", 13.0),
    ("XXXL", 21.0),
];

const SPECIAL_VALUES: &[(&str, f64)] = &[
    ("?", -1.0),
    ("☕", 0.0),
    ("🎯", -2.0),
    ("∞", 999.0),
    ("Pass", 0.0),
    ("pass", 0.0),
];

/// Map a display value to its numeric voting value.
pub fn actual_value(display_value: &str) -> f64 {
    for (token, value) in TSHIRT_VALUES.iter().chain(SPECIAL_VALUES) {
        if *token == display_value {
            return *value;
        }
    }
    display_value.parse::<f64>().unwrap_or(0.0)
}

/// Split a comma-delimited values field into trimmed, non-empty entries.
pub fn parse_value_list(values_csv: &str) -> Vec<String> {
    values_csv
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    pub dry_run: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedValue {
    pub method_name: String,
    pub method_id: String,
    pub display_value: String,
    pub actual_value: f64,
    pub sequence: u32,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrateReport {
    pub dry_run: bool,
    pub methods_seen: usize,
    pub methods_skipped_empty: usize,
    pub values_created: usize,
    pub errors: Vec<String>,
    pub rows: Vec<PlannedValue>,
    pub request_count: usize,
}

/// Copy every parent method's delimited values into child records.
///
/// Per-row create failures are collected rather than aborting the run, so a
/// partially migrated method is visible in the report instead of hidden
/// behind the first error.
pub fn migrate_values<A: RecordApi>(
    api: &mut A,
    config: &ToolConfig,
    options: &MigrateOptions,
) -> Result<MigrateReport> {
    let limit = options.limit.unwrap_or_else(|| config.query_limit());
    let methods = api
        .query_records(
            config.method_table(),
            "",
            &format!("sys_id,name,{}", config.values_field()),
            limit,
        )
        .with_context(|| format!("failed to query {}", config.method_table()))?;

    let mut report = MigrateReport {
        dry_run: options.dry_run,
        methods_seen: methods.len(),
        methods_skipped_empty: 0,
        values_created: 0,
        errors: Vec::new(),
        rows: Vec::new(),
        request_count: 0,
    };

    for method in &methods {
        let method_id = string_field(method, "sys_id");
        let method_name = string_field(method, "name");
        let values_csv = string_field(method, config.values_field());

        let values = parse_value_list(&values_csv);
        if values.is_empty() {
            report.methods_skipped_empty += 1;
            continue;
        }

        let mut sequence = config.sequence_step();
        for display_value in values {
            let actual = actual_value(&display_value);
            let mut row = PlannedValue {
                method_name: method_name.clone(),
                method_id: method_id.clone(),
                display_value: display_value.clone(),
                actual_value: actual,
                sequence,
                created: false,
            };

            if !options.dry_run {
                let mut fields = serde_json::Map::new();
                fields.insert(
                    config.method_reference_field().to_string(),
                    Value::String(method_id.clone()),
                );
                fields.insert(
                    config.display_value_field().to_string(),
                    Value::String(display_value.clone()),
                );
                fields.insert(
                    config.actual_value_field().to_string(),
                    Value::String(format_actual(actual)),
                );
                fields.insert(
                    config.sequence_field().to_string(),
                    Value::String(sequence.to_string()),
                );
                fields.insert(
                    config.active_field().to_string(),
                    Value::String("true".to_string()),
                );
                let data = Value::Object(fields);
                match api.create_record(config.value_table(), &data) {
                    Ok(()) => {
                        row.created = true;
                        report.values_created += 1;
                    }
                    Err(error) => {
                        report.errors.push(format!(
                            "{} {:?} (sequence {}): {:#}",
                            method_name, row.display_value, sequence, error
                        ));
                    }
                }
            }

            report.rows.push(row);
            sequence += config.sequence_step();
        }
    }

    report.request_count = api.request_count();
    Ok(report)
}

fn string_field(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Render like the source scripts did: integral values without a trailing
/// `.0`, everything else as-is.
fn format_actual(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
