//! Signed HTTP transport for the remote generation API.
//!
//! Three surfaces: catalog search (key-only headers), job submission and
//! task polling (HMAC-signed headers), and plain-text model documentation
//! fetches from the docs site.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use fleet_common::{FleetError, GenerationConfig, Result};

type HmacSha256 = Hmac<Sha256>;

/// Submission response: a task id on acceptance, a non-empty error list
/// on rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub taskid: Option<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl RunResponse {
    pub fn task_id(&self) -> Option<String> {
        self.taskid.as_ref().map(value_to_string).filter(|s| !s.is_empty())
    }

    pub fn error_text(&self) -> String {
        self.errors.iter().map(value_to_string).collect::<Vec<_>>().join("; ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetailResponse {
    #[serde(default)]
    pub tasklist: Vec<TaskDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetail {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outputs: Vec<TaskOutput>,
    #[serde(default)]
    pub elapsedseconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub url: String,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// HTTP client for the generation API. Cheap to clone per the underlying
/// pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct GenerationTransport {
    client: Client,
    base_url: String,
    site_url: String,
    api_key: String,
    api_secret: String,
}

impl GenerationTransport {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| FleetError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            site_url: config.site_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            api_secret: config.api_secret.trim().to_string(),
        })
    }

    /// HMAC-SHA256 over `secret || nonce`, keyed by the API key.
    fn sign(&self, nonce: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_key.as_bytes())
            .map_err(|e| FleetError::transport(format!("invalid signing key: {e}")))?;
        mac.update(self.api_secret.as_bytes());
        mac.update(nonce.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn header_value(raw: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(raw)
            .map_err(|e| FleetError::transport(format!("invalid header value: {e}")))
    }

    /// Headers for submission and polling.
    fn signed_headers(&self) -> Result<HeaderMap> {
        let nonce = chrono::Utc::now().timestamp().to_string();
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", Self::header_value(&self.api_key)?);
        headers.insert("x-nonce", Self::header_value(&nonce)?);
        headers.insert("x-signature", Self::header_value(&self.sign(&nonce)?)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Headers for catalog search; the key alone, no signature.
    fn simple_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", Self::header_value(&self.api_key)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<T> {
        debug!("POST {} ({} form fields)", url, form.len());
        let response = self
            .client
            .post(url)
            .headers(headers)
            .form(form)
            .send()
            .await
            .map_err(|e| FleetError::transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::transport(format!(
                "{url} returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FleetError::transport(format!("non-JSON response from {url}: {e}")))
    }

    /// POST `/v1/Tool/List` — search the model catalog.
    pub async fn tool_list(&self, query: &str, limit: usize) -> Result<Value> {
        let url = format!("{}/v1/Tool/List", self.base_url);
        let form = vec![
            ("start".to_string(), "0".to_string()),
            ("limit".to_string(), limit.to_string()),
            ("search".to_string(), query.to_string()),
            ("summary".to_string(), "true".to_string()),
        ];
        self.post_form(&url, &form, self.simple_headers()?).await
    }

    /// POST `/v1/Run/{owner}/{project}` — submit a generation job.
    pub async fn run(
        &self,
        owner: &str,
        project: &str,
        params: &[(String, String)],
    ) -> Result<RunResponse> {
        let url = format!("{}/v1/Run/{}/{}", self.base_url, owner, project);
        self.post_form(&url, params, self.signed_headers()?).await
    }

    /// POST `/v1/Task/Detail` — fetch the current state of a task.
    pub async fn task_detail(&self, task_id: &str) -> Result<TaskDetailResponse> {
        let url = format!("{}/v1/Task/Detail", self.base_url);
        let form = vec![("taskid".to_string(), task_id.to_string())];
        self.post_form(&url, &form, self.signed_headers()?).await
    }

    /// GET the documentation blob for a model. Missing or JSON-shaped
    /// bodies (error payloads) come back as an empty string.
    pub async fn fetch_model_docs(&self, owner: &str, project: &str) -> String {
        let url = format!("{}/models/{}/{}/llms-full.txt", self.site_url, owner, project);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("doc fetch for {}/{} failed: {}", owner, project, e);
                return String::new();
            }
        };
        if !response.status().is_success() {
            return String::new();
        }
        let body = response.text().await.unwrap_or_default();
        if body.trim_start().starts_with('{') {
            return String::new();
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> GenerationTransport {
        let config = GenerationConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            ..GenerationConfig::default()
        };
        GenerationTransport::new(&config).unwrap()
    }

    #[test]
    fn signature_is_hex_hmac_over_secret_and_nonce() {
        let t = transport();
        let sig = t.sign("1700000000").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic for a fixed nonce.
        assert_eq!(sig, t.sign("1700000000").unwrap());
        assert_ne!(sig, t.sign("1700000001").unwrap());
    }

    #[test]
    fn run_response_extracts_task_id_and_errors() {
        let accepted: RunResponse = serde_json::from_str(r#"{"taskid": 123}"#).unwrap();
        assert_eq!(accepted.task_id().as_deref(), Some("123"));
        assert!(accepted.error_text().is_empty());

        let rejected: RunResponse =
            serde_json::from_str(r#"{"errors": ["bad prompt", "quota"]}"#).unwrap();
        assert!(rejected.task_id().is_none());
        assert_eq!(rejected.error_text(), "bad prompt; quota");
    }
}
