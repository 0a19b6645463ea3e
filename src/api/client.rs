//! HTTP client for the Kwork mobile API.
//!
//! Every call is a form-encoded `POST {api_host}/{method}` carrying the
//! mobile app's basic-auth header. Responses share one envelope:
//! `{"success": bool, "error": str, "response": any, "paging": {...}}`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use super::types::{Dialog, InboxMessage, lenient};
use super::{KworkApi, Responder};
use crate::config::BotConfig;
use crate::error::ApiError;

/// Basic credentials of the official mobile client.
const MOBILE_AUTH_HEADER: &str = "Basic bW9iaWxlX2FwaTpxRnZmUmw3dw==";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response: serde_json::Value,
    #[serde(default, deserialize_with = "lenient")]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default, deserialize_with = "lenient")]
    pages: Option<u32>,
}

/// Kwork API client. Signs in lazily and reuses the token for its lifetime.
pub struct KworkClient {
    http: reqwest::Client,
    api_host: String,
    login: String,
    password: SecretString,
    phone_last: Option<String>,
    token: OnceCell<String>,
}

impl KworkClient {
    pub fn new(config: &BotConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();

        if let Some(ref url) = config.proxy_url {
            let proxy = reqwest::Proxy::all(url).map_err(|e| ApiError::InvalidProxy {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            http: builder.build()?,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            login: config.login.clone(),
            password: config.password.clone(),
            phone_last: config.phone_last.clone(),
            token: OnceCell::new(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_host)
    }

    /// Perform one API call and unwrap the envelope.
    async fn api_request(&self, method: &str, params: &[(&str, String)]) -> Result<Envelope, ApiError> {
        let form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let resp = self
            .http
            .post(self.api_url(method))
            .header(reqwest::header::AUTHORIZATION, MOBILE_AUTH_HEADER)
            .form(&form)
            .send()
            .await?;

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = resp.text().await?;

        if !is_json {
            return Err(ApiError::UnexpectedBody(body));
        }

        let envelope: Envelope = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(ApiError::Rejected(envelope.error.unwrap_or_default()));
        }

        debug!(method, "Kwork API call succeeded");
        Ok(envelope)
    }

    /// Authorization token, signing in on first use.
    pub async fn token(&self) -> Result<&str, ApiError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let params = [
                    ("login", self.login.clone()),
                    ("password", self.password.expose_secret().to_string()),
                    ("phone_last", self.phone_last.clone().unwrap_or_default()),
                ];
                let envelope = self.api_request("signIn", &params).await?;
                string_field(&envelope.response, "signIn", "token")
            })
            .await?;
        Ok(token.as_str())
    }

    /// Walk `page=1..` until an empty page or the advertised page count.
    async fn paginate<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut page_params = params.to_vec();
            page_params.push(("page", page.to_string()));

            let envelope = self.api_request(method, &page_params).await?;
            let batch: Vec<T> = match envelope.response {
                serde_json::Value::Null => Vec::new(),
                value => serde_json::from_value(value)?,
            };
            if batch.is_empty() {
                break;
            }
            items.extend(batch);

            if envelope.paging.and_then(|p| p.pages).is_some_and(|pages| page >= pages) {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

fn string_field(response: &serde_json::Value, method: &str, field: &str) -> Result<String, ApiError> {
    response
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(String::from)
        .ok_or_else(|| ApiError::MissingField {
            method: method.to_string(),
            field: field.to_string(),
        })
}

#[async_trait]
impl Responder for KworkClient {
    async fn send_text(&self, user_id: i64, text: &str) -> Result<(), ApiError> {
        let token = self.token().await?.to_string();
        let params = [
            ("token", token),
            ("user_id", user_id.to_string()),
            ("text", text.to_string()),
        ];
        self.api_request("inboxCreate", &params).await?;
        Ok(())
    }

    async fn set_typing(&self, user_id: i64) -> Result<(), ApiError> {
        let token = self.token().await?.to_string();
        let params = [("token", token), ("recipientId", user_id.to_string())];
        self.api_request("typing", &params).await?;
        Ok(())
    }
}

#[async_trait]
impl KworkApi for KworkClient {
    async fn fetch_channel_token(&self) -> Result<String, ApiError> {
        let token = self.token().await?.to_string();
        let envelope = self.api_request("getChannel", &[("token", token)]).await?;
        string_field(&envelope.response, "getChannel", "channel")
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ApiError> {
        let token = self.token().await?.to_string();
        self.paginate("dialogs", &[("token", token), ("filter", "all".to_string())])
            .await
    }

    async fn fetch_thread(&self, username: &str) -> Result<Vec<InboxMessage>, ApiError> {
        let token = self.token().await?.to_string();
        self.paginate("inboxes", &[("token", token), ("username", username.to_string())])
            .await
    }
}
