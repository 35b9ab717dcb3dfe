use anyhow::{Context, Result};
use std::net::SocketAddr;

use crate::model::TrainConfig;

pub const DEFAULT_PORT: u16 = 10020;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub train: TrainConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            train: TrainConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read `PREDMODEL_HOST`, `PREDMODEL_PORT` and `PREDMODEL_EPOCHS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(host) = get("PREDMODEL_HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("PREDMODEL_PORT") {
            cfg.port = port
                .parse()
                .with_context(|| format!("PREDMODEL_PORT is not a valid port: {port}"))?;
        }
        if let Some(epochs) = get("PREDMODEL_EPOCHS") {
            cfg.train.epochs = epochs
                .parse()
                .with_context(|| format!("PREDMODEL_EPOCHS is not a number: {epochs}"))?;
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 10020);
        assert_eq!(cfg.train.epochs, 50);
        assert_eq!(cfg.addr().unwrap().port(), 10020);
    }

    #[test]
    fn env_overrides() {
        let cfg = ServiceConfig::from_lookup(lookup(&[
            ("PREDMODEL_PORT", "9000"),
            ("PREDMODEL_HOST", "127.0.0.1"),
            ("PREDMODEL_EPOCHS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.train.epochs, 5);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(ServiceConfig::from_lookup(lookup(&[("PREDMODEL_PORT", "ten")])).is_err());
    }
}
