use anyhow::{Context, Result, bail};

/// Thin client for the agent's ops API, used by the query subcommands.
pub struct ApiClient {
    base: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base: format!("http://{host}:{port}"),
            client: reqwest::Client::new(),
        }
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{path}", self.base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("is the agent running? GET {url} failed"))?;
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("GET {url} returned a non-JSON body"))?;
        if !status.is_success() {
            bail!("GET {url} returned HTTP {status}: {body}");
        }
        Ok(body)
    }

    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("is the agent running? GET {url} failed"))?;
        if !response.status().is_success() {
            bail!("GET {url} returned HTTP {}", response.status());
        }
        Ok(response.text().await?)
    }

    pub async fn post_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{path}", self.base);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("is the agent running? POST {url} failed"))?;
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("POST {url} returned a non-JSON body"))?;
        if !status.is_success() {
            bail!("POST {url} returned HTTP {status}: {body}");
        }
        Ok(body)
    }
}
