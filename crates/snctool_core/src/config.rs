use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SNC_BIN: &str = "snc";
pub const DEFAULT_METHOD_TABLE: &str = "x_1447726_planni_0_scoring_method";
pub const DEFAULT_VALUE_TABLE: &str = "u_x_1447726_planni_0_scoring_value";
pub const DEFAULT_SEQUENCE_STEP: u32 = 10;
pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub instance: InstanceSection,
    #[serde(default)]
    pub migrate: MigrateSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct InstanceSection {
    pub snc_bin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrateSection {
    pub method_table: Option<String>,
    pub value_table: Option<String>,
    pub method_reference_field: Option<String>,
    pub display_value_field: Option<String>,
    pub actual_value_field: Option<String>,
    pub sequence_field: Option<String>,
    pub active_field: Option<String>,
    pub values_field: Option<String>,
    pub sequence_step: Option<u32>,
    pub query_limit: Option<usize>,
}

impl ToolConfig {
    /// Resolve the snc binary: env SNC_BIN > config > "snc".
    pub fn snc_bin(&self) -> String {
        if let Ok(value) = env::var("SNC_BIN") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.instance
            .snc_bin
            .clone()
            .unwrap_or_else(|| DEFAULT_SNC_BIN.to_string())
    }

    pub fn method_table(&self) -> &str {
        self.migrate
            .method_table
            .as_deref()
            .unwrap_or(DEFAULT_METHOD_TABLE)
    }

    pub fn value_table(&self) -> &str {
        self.migrate
            .value_table
            .as_deref()
            .unwrap_or(DEFAULT_VALUE_TABLE)
    }

    pub fn method_reference_field(&self) -> &str {
        self.migrate
            .method_reference_field
            .as_deref()
            .unwrap_or("u_scoring_method")
    }

    pub fn display_value_field(&self) -> &str {
        self.migrate
            .display_value_field
            .as_deref()
            .unwrap_or("u_display_value")
    }

    pub fn actual_value_field(&self) -> &str {
        self.migrate
            .actual_value_field
            .as_deref()
            .unwrap_or("u_actual_value")
    }

    pub fn sequence_field(&self) -> &str {
        self.migrate
            .sequence_field
            .as_deref()
            .unwrap_or("u_sequence")
    }

    pub fn active_field(&self) -> &str {
        self.migrate.active_field.as_deref().unwrap_or("u_active")
    }

    pub fn values_field(&self) -> &str {
        self.migrate.values_field.as_deref().unwrap_or("values")
    }

    pub fn sequence_step(&self) -> u32 {
        self.migrate.sequence_step.unwrap_or(DEFAULT_SEQUENCE_STEP)
    }

    pub fn query_limit(&self) -> usize {
        self.migrate.query_limit.unwrap_or(DEFAULT_QUERY_LIMIT)
    }
}

/// Load a ToolConfig from a TOML file. Returns defaults if the file is
/// missing; a malformed file is a real error.
pub fn load_config(config_path: &Path) -> Result<ToolConfig> {
    if !config_path.exists() {
        return Ok(ToolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{DEFAULT_METHOD_TABLE, DEFAULT_VALUE_TABLE, ToolConfig, load_config};

    #[test]
    fn default_config_uses_builtin_tables() {
        let config = ToolConfig::default();
        assert_eq!(config.method_table(), DEFAULT_METHOD_TABLE);
        assert_eq!(config.value_table(), DEFAULT_VALUE_TABLE);
        assert_eq!(config.sequence_step(), 10);
        assert_eq!(config.query_limit(), 100);
        assert_eq!(config.values_field(), "values");
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert!(config.instance.snc_bin.is_none());
    }

    #[test]
    fn load_config_parses_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[instance]
snc_bin = "/usr/local/bin/snc"

[migrate]
method_table = "x_app_method"
value_table = "u_x_app_value"
sequence_step = 5
query_limit = 25
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.instance.snc_bin.as_deref(),
            Some("/usr/local/bin/snc")
        );
        assert_eq!(config.method_table(), "x_app_method");
        assert_eq!(config.value_table(), "u_x_app_value");
        assert_eq!(config.sequence_step(), 5);
        assert_eq!(config.query_limit(), 25);
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[instance]\nsnc_bin = \"snc\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.method_table(), DEFAULT_METHOD_TABLE);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[instance\nsnc_bin = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }
}
