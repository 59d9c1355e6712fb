use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::config::Config;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

/// Post `text` to the configured channel. The pipeline never aborts over a
/// missed notification: failures are logged and reported as `false`.
pub async fn send(cfg: &Config, text: &str) -> bool {
    match post_message(cfg, text).await {
        Ok(()) => {
            info!(channel = %cfg.channel, "notification sent");
            true
        }
        Err(err) => {
            warn!("slack notification failed: {err:#}");
            false
        }
    }
}

async fn post_message(cfg: &Config, text: &str) -> Result<()> {
    // the token lives in the environment, loadable from a local .env file
    dotenvy::dotenv().ok();
    let token =
        env::var(&cfg.token_var).with_context(|| format!("{} is not set", cfg.token_var))?;

    let response: PostMessageResponse = Client::new()
        .post(POST_MESSAGE_URL)
        .bearer_auth(token)
        .json(&serde_json::json!({ "channel": cfg.channel, "text": text }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("decoding slack response")?;

    // Slack reports most failures inside a 200 body
    if !response.ok {
        bail!(
            "slack api error: {}",
            response.error.unwrap_or_else(|| "unknown".to_string())
        );
    }
    Ok(())
}
