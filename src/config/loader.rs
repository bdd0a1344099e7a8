//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::DumpConfig;
use super::secret_string;
use crate::domain::errors::DumpError;
use crate::domain::result::Result;
use crate::domain::Encoding;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into DumpConfig
/// 4. Applies environment variable overrides (COSMOS_DUMP_* prefix)
///
/// Validation is left to the caller so CLI flags can still fill in
/// missing values before the configuration is checked.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if a
/// referenced environment variable is not set.
///
/// # Examples
///
/// ```no_run
/// use cosmos_dump::config::loader::load_config;
///
/// let config = load_config("cosmos-dump.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<DumpConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DumpError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DumpError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: DumpConfig = toml::from_str(&contents)
        .map_err(|e| DumpError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Loads the configuration file if it exists, otherwise starts from defaults
///
/// Environment overrides are applied in both cases, so a run can be
/// configured entirely through `COSMOS_DUMP_*` variables.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<DumpConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    let mut config = DumpConfig::default();
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is a valid regex")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied verbatim.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(DumpError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the COSMOS_DUMP_* prefix
fn apply_env_overrides(config: &mut DumpConfig) -> Result<()> {
    if let Ok(val) = std::env::var("COSMOS_DUMP_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Cosmos DB account
    if let Ok(val) = std::env::var("COSMOS_DUMP_ENDPOINT") {
        config.cosmosdb.endpoint = val;
    }
    if let Ok(val) = std::env::var("COSMOS_DUMP_KEY") {
        config.cosmosdb.key = secret_string(val);
    }
    if let Ok(val) = std::env::var("COSMOS_DUMP_DATABASE") {
        config.cosmosdb.database_name = val;
    }

    // Export
    if let Ok(val) = std::env::var("COSMOS_DUMP_OUTPUT_DIR") {
        config.export.output_dir = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("COSMOS_DUMP_ENCODING") {
        config.export.encoding = Encoding::from_str(&val)?;
    }
    if let Ok(val) = std::env::var("COSMOS_DUMP_MAX_FILE_SIZE_GB") {
        let size = val.parse::<f64>().map_err(|e| {
            DumpError::Configuration(format!("Invalid COSMOS_DUMP_MAX_FILE_SIZE_GB '{val}': {e}"))
        })?;
        config.export.max_file_size_gb = Some(size);
    }

    // Import
    if let Ok(val) = std::env::var("COSMOS_DUMP_IMPORT_CONCURRENCY") {
        if let Ok(concurrency) = val.parse() {
            config.import.concurrency = concurrency;
        }
    }
    if let Ok(val) = std::env::var("COSMOS_DUMP_IMPORT_SHUFFLE") {
        config.import.shuffle = val.parse().unwrap_or(false);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("CD_TEST_SUBST_VAR", "test_value");
        let input = "key = \"${CD_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "key = \"test_value\"\n");
        std::env::remove_var("CD_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("CD_TEST_MISSING_VAR");
        let input = "key = \"${CD_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("CD_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("CD_TEST_COMMENTED_VAR");
        let input = "# key = \"${CD_TEST_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-cosmos-dump.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[cosmosdb]
endpoint = "https://acct.documents.azure.com:443/"
key = "a2V5"
database_name = "appdb"

[export]
encoding = "jsonl"
max_file_size_gb = 0.5
collections = ["orders"]

[import]
concurrency = 25
shuffle = true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.cosmosdb.database_name, "appdb");
        assert_eq!(config.cosmosdb.key.expose_secret(), "a2V5");
        assert_eq!(config.export.encoding, Encoding::Jsonl);
        assert_eq!(config.export.max_file_size_gb, Some(0.5));
        assert_eq!(config.export.collections, vec!["orders".to_string()]);
        assert_eq!(config.import.concurrency, 25);
        assert!(config.import.shuffle);
        assert_eq!(config.import.shuffle_capacity, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_or_default_without_file() {
        let config = load_config_or_default("definitely-missing-cosmos-dump.toml").unwrap();
        assert_eq!(config.export.queue_capacity, 100);
    }
}
