use anyhow::{bail, Context, Result};
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_MODEL: &str = "microsoft/Phi-3.5-mini-instruct";
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Where completions come from and how long they may be.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

// hand-written so the key never reaches the logs
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub upstream: UpstreamConfig,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = get("HF_API_KEY")
            .or_else(|| get("HF_TOKEN"))
            .filter(|k| !k.trim().is_empty());
        let Some(api_key) = api_key else {
            bail!("HF_API_KEY (or HF_TOKEN) must be set");
        };

        let mut upstream = UpstreamConfig::new(api_key);
        if let Some(url) = get("HF_BASE_URL") {
            upstream.base_url = url;
        }
        if let Some(model) = get("HF_MODEL") {
            upstream.model = model;
        }
        if let Some(n) = get("HF_MAX_TOKENS") {
            upstream.max_tokens = n
                .parse()
                .with_context(|| format!("HF_MAX_TOKENS is not a number: {n}"))?;
        }

        let port = match get("CHATBOT_PORT") {
            Some(p) => p
                .parse()
                .with_context(|| format!("CHATBOT_PORT is not a valid port: {p}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: get("CHATBOT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            upstream,
        })
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
    fn api_key_is_required() {
        assert!(ProxyConfig::from_lookup(lookup(&[])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[("HF_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn defaults_follow_the_hosted_model() {
        let cfg = ProxyConfig::from_lookup(lookup(&[("HF_TOKEN", "hf_test")])).unwrap();
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.upstream.model, "microsoft/Phi-3.5-mini-instruct");
        assert_eq!(cfg.upstream.max_tokens, 500);
        assert_eq!(cfg.upstream.api_key, "hf_test");
    }

    #[test]
    fn overrides_and_redacted_debug() {
        let cfg = ProxyConfig::from_lookup(lookup(&[
            ("HF_API_KEY", "hf_secret"),
            ("HF_MODEL", "meta-llama/Llama-3.2-1B-Instruct"),
            ("HF_MAX_TOKENS", "64"),
            ("CHATBOT_PORT", "6000"),
            ("CHATBOT_HOST", "127.0.0.1"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:6000");
        assert_eq!(cfg.upstream.max_tokens, 64);
        assert!(!format!("{:?}", cfg).contains("hf_secret"));
    }
}
