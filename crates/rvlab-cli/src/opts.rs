//! Global CLI options.

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Options shared by the client commands. `serve` ignores them.
#[derive(clap::Args, Debug, Clone)]
pub struct ClientOpts {
    /// Base URL of the rvlab HTTP API (env: RVLAB_SERVER)
    #[arg(
        long,
        global = true,
        env = "RVLAB_SERVER",
        default_value = "http://127.0.0.1:3000"
    )]
    pub server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl ClientOpts {
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api{path}", self.server.trim_end_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = self.api_url(path);
        let response = reqwest::get(&url)
            .await
            .with_context(|| format!("GET {url}"))?;
        read_json(&url, response).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.api_url(path);
        let response = reqwest::Client::new()
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        read_json(&url, response).await
    }
}

/// Decodes the body and turns `{ success: false, message }` replies into
/// errors.
async fn read_json(url: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("decode response from {url}"))?;
    if !status.is_success() || body["success"] == false {
        let message = body["message"].as_str().unwrap_or("request failed");
        match body["error"].as_str() {
            Some(detail) => bail!("{message} ({status}): {detail}"),
            None => bail!("{message} ({status})"),
        }
    }
    Ok(body)
}
