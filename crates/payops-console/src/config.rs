use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "payops-console", about = "Live operations console for the payment agent")]
pub struct Args {
    /// Realtime channel endpoint, e.g. ws://127.0.0.1:8000/ws
    #[arg(long, default_value = "")]
    pub ws_url: String,
    /// HTTP base address of the agent backend
    #[arg(long, default_value = "")]
    pub api_url: String,
    /// Name recorded as approved_by on operator decisions
    #[arg(long, default_value = "")]
    pub operator: String,
    /// Disable the local fallback simulator entirely
    #[arg(long)]
    pub no_simulator: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: Url,
    pub api_url: String,
    pub operator: String,
    pub simulator_enabled: bool,
}

impl Config {
    pub fn load(args: Args) -> Result<Self> {
        let raw_ws = resolve(&args.ws_url, "PAYOPS_WS_URL", "ws://127.0.0.1:8000/ws");
        let ws_url = Url::parse(&raw_ws).with_context(|| format!("invalid channel url: {raw_ws}"))?;
        let api_url = resolve(&args.api_url, "PAYOPS_API_URL", "http://127.0.0.1:8000")
            .trim_end_matches('/')
            .to_string();
        let operator = resolve(&args.operator, "PAYOPS_OPERATOR", "operator");
        Ok(Self {
            ws_url,
            api_url,
            operator,
            simulator_enabled: !args.no_simulator,
        })
    }
}

fn resolve(flag: &str, env_var: &str, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = env::var(env_var) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    default.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_default() {
        let config = Config::load(Args {
            ws_url: "ws://example.test:9000/ws".to_string(),
            api_url: "http://example.test:9000/".to_string(),
            operator: "asha".to_string(),
            no_simulator: true,
        })
        .expect("config must load");
        assert_eq!(config.ws_url.as_str(), "ws://example.test:9000/ws");
        assert_eq!(config.api_url, "http://example.test:9000");
        assert_eq!(config.operator, "asha");
        assert!(!config.simulator_enabled);
    }

    #[test]
    fn defaults_apply_when_flags_are_empty() {
        let config = Config::load(Args {
            ws_url: String::new(),
            api_url: String::new(),
            operator: String::new(),
            no_simulator: false,
        })
        .expect("config must load");
        assert_eq!(config.ws_url.scheme(), "ws");
        assert_eq!(config.operator, "operator");
        assert!(config.simulator_enabled);
    }

    #[test]
    fn invalid_channel_url_is_an_error() {
        let result = Config::load(Args {
            ws_url: "not a url".to_string(),
            api_url: String::new(),
            operator: String::new(),
            no_simulator: false,
        });
        assert!(result.is_err());
    }
}
