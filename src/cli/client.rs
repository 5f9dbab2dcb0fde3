use anyhow::Context;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

/// Response from the API, envelope still attached
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiReply {
    /// `data` of a success envelope, or an error built from the error envelope
    pub fn into_data(self) -> anyhow::Result<Value> {
        if self.status.is_success() && self.body["success"] == Value::Bool(true) {
            return Ok(self.body.get("data").cloned().unwrap_or(Value::Null));
        }
        anyhow::bail!("{} ({})", self.error_message(), self.status)
    }

    pub fn error_message(&self) -> String {
        let mut message = self.body["error"]
            .as_str()
            .unwrap_or("request failed")
            .to_string();

        if let Some(fields) = self.body["field_errors"].as_object() {
            let details: Vec<String> = fields
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg.as_str().unwrap_or_default()))
                .collect();
            message = format!("{} [{}]", message, details.join(", "));
        }
        message
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    basic: Option<(String, String)>,
}

impl ApiClient {
    pub fn new(base_url: &str, basic: Option<(String, String)>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("invalid server URL '{}'", base_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            basic,
        })
    }

    pub fn request(&self, method: Method, path: &str) -> anyhow::Result<RequestBuilder> {
        let url = self.base_url.join(path).with_context(|| format!("invalid path '{}'", path))?;
        let builder = self.http.request(method, url);

        Ok(match &self.basic {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        })
    }

    pub async fn send(&self, builder: RequestBuilder) -> anyhow::Result<ApiReply> {
        let res = builder.send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("failed to read response body")?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ApiReply { status, body })
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<ApiReply> {
        let builder = self.request(Method::GET, path)?;
        self.send(builder).await
    }
}
