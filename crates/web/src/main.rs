use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use testscope_web::{LlmConfig, WebServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let web_addr: SocketAddr = std::env::var("TESTSCOPE_WEB_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    // LLM narrator is opt-in: without an API key the deterministic
    // fallback narrator serves every request.
    let llm = match std::env::var("TESTSCOPE_LLM_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            let defaults = LlmConfig::default();
            let timeout_ms = std::env::var("TESTSCOPE_LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000);
            Some(LlmConfig {
                endpoint: std::env::var("TESTSCOPE_LLM_ENDPOINT")
                    .unwrap_or(defaults.endpoint),
                api_key,
                model: std::env::var("TESTSCOPE_LLM_MODEL").unwrap_or(defaults.model),
                timeout: Duration::from_millis(timeout_ms),
            })
        }
        _ => None,
    };

    let jitter_seed = std::env::var("TESTSCOPE_JITTER_SEED")
        .ok()
        .and_then(|v| v.parse::<u64>().ok());

    let cfg = WebServerConfig { llm, jitter_seed };

    info!(
        "Starting TestScope analysis service on http://{} (llm narrator: {})",
        web_addr,
        if cfg.llm.is_some() { "enabled" } else { "disabled" }
    );

    testscope_web::serve(web_addr, cfg).await
}
