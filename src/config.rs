use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub storage_timeout: Duration,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to the campus Postgres instance")?;
        let max_connections = try_load(&lookup, "ECOCAMPUS_MAX_CONNECTIONS", 5u32)?;
        let timeout_secs = try_load(&lookup, "ECOCAMPUS_STORAGE_TIMEOUT_SECS", 5u64)?;
        if timeout_secs == 0 {
            anyhow::bail!("ECOCAMPUS_STORAGE_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            database_url,
            max_connections,
            storage_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn try_load<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value {raw:?}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/ecocampus")]).unwrap();
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.storage_timeout, Duration::from_secs(5));
    }

    #[test]
    fn database_url_is_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        let result = config(&[
            ("DATABASE_URL", "postgres://localhost/ecocampus"),
            ("ECOCAMPUS_MAX_CONNECTIONS", "many"),
        ]);
        assert!(result.is_err());

        let result = config(&[
            ("DATABASE_URL", "postgres://localhost/ecocampus"),
            ("ECOCAMPUS_STORAGE_TIMEOUT_SECS", "0"),
        ]);
        assert!(result.is_err());
    }
}
