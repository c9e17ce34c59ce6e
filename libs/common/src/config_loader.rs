//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables `<SERVICE>_...`, `__` separates nested keys
//! 2. Explicit config file passed on the command line
//! 3. `config/<service>.yaml`
//! 4. Default values

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    let figment = match extension {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => {
            return Err(Error::Config(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };
    Ok(figment)
}

/// Build the figment for a service without extracting it
pub fn figment_for<T>(service_name: &str, explicit: Option<&Path>) -> Result<Figment>
where
    T: Serialize + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()))
        .merge(Yaml::file(format!("config/{}.yaml", service_name)));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        debug!("Config file: {}", path.display());
        figment = file_provider(figment, path)?;
    }

    Ok(figment.merge(Env::prefixed(&format!("{}_", service_name.to_uppercase())).split("__")))
}

/// Load configuration from defaults, files and environment
pub fn load_config<T>(service_name: &str, explicit: Option<&Path>) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Default,
{
    figment_for::<T>(service_name, explicit)?
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
}

/// Load configuration from a specific file only
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    file_provider(Figment::new(), path.as_ref())?
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration from file: {}", e)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        period_ms: u64,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                period_ms: 2000,
            }
        }
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let loaded: Sample = load_config("cfgtest_nothing", None).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "period_ms: 500").unwrap();

        let loaded: Sample = load_config("cfgtest_file", Some(file.path())).unwrap();
        assert_eq!(loaded.period_ms, 500);
        assert_eq!(loaded.name, "default");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result: Result<Sample> =
            load_config("cfgtest_missing", Some(Path::new("/nonexistent/cfg.yaml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let result: Result<Sample> = load_config_from_file(file.path());
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Unsupported")));
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"name": "gh", "period_ms": 10}}"#).unwrap();

        let loaded: Sample = load_config_from_file(file.path()).unwrap();
        assert_eq!(
            loaded,
            Sample {
                name: "gh".to_string(),
                period_ms: 10
            }
        );
    }
}
