use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;

use super::config::Credentials;
use super::error::ApiError;
use super::resource::Attributes;
use super::resource::Document;
use super::resource::Related;
use super::resource::Resource;

/// OAuth scopes requested for the client credentials grant
pub const SCOPES: &str = "structures.view structures.edit rooms.view rooms.edit \
                          vents.view vents.edit pucks.view pucks.edit";

const JSON_API: &str = "application/vnd.api+json";

/// Operations the integration needs from the Flair API
///
/// This trait allows for mocking the remote API for testing purposes
#[async_trait]
pub trait FlairApi: Send + Sync {
    /// Exchange the client credentials for a fresh access token
    async fn renew_token(&self) -> Result<(), ApiError>;

    /// Re-read the API root and its collection links
    async fn refresh_root(&self) -> Result<(), ApiError>;

    /// List a top-level collection, e.g. "structures"
    async fn list(&self, kind: &str) -> Result<Vec<Resource>, ApiError>;

    /// Re-fetch a resource by its self link
    async fn fetch(&self, resource: &Resource) -> Result<Resource, ApiError>;

    /// Follow a relationship; an absent relation yields `ApiError::EmptyBody`
    async fn related(&self, resource: &Resource, rel: &str) -> Result<Related, ApiError>;

    /// Write attributes and return the resource as stored remotely
    async fn update(&self, resource: &Resource, attributes: Attributes)
    -> Result<Resource, ApiError>;
}

/// Authenticates and hands out API client handles
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn FlairApi>, ApiError>;
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RootResponse {
    #[serde(default)]
    links: HashMap<String, Value>,
}

/// Flair API client over reqwest
pub struct HttpFlairClient {
    http: reqwest::Client,
    api_root: String,
    credentials: Credentials,
    token: RwLock<Option<String>>,
    links: RwLock<HashMap<String, String>>,
}

impl HttpFlairClient {
    /// Create a client without contacting the API
    pub fn new(http: reqwest::Client, api_root: &str, credentials: Credentials) -> Self {
        Self {
            http,
            api_root: api_root.trim_end_matches('/').to_string(),
            credentials,
            token: RwLock::new(None),
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Create a client, obtain a token and read the API root
    pub async fn authenticate(
        http: reqwest::Client,
        api_root: &str,
        credentials: Credentials,
    ) -> Result<Self, ApiError> {
        let client = Self::new(http, api_root, credentials);
        client.renew_token().await?;
        client.refresh_root().await?;
        Ok(client)
    }

    fn url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", self.api_root, href.trim_start_matches('/'))
        }
    }

    async fn bearer(&self) -> Result<String, ApiError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::Authentication("no access token".to_string()))
    }

    /// Send an authenticated request; `None` means the response had no body
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, ApiError> {
        let token = self.bearer().await?;
        let response = request
            .bearer_auth(token)
            .header(ACCEPT, JSON_API)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Authentication(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_document(&self, href: &str) -> Result<Related, ApiError> {
        debug!("[flair] GET {}", href);
        match self.send(self.http.get(self.url(href))).await? {
            Some(body) => serde_json::from_value::<Document>(body)
                .map_err(|e| ApiError::Decode(e.to_string()))?
                .into_related(),
            None => Err(ApiError::EmptyBody),
        }
    }
}

#[async_trait]
impl FlairApi for HttpFlairClient {
    async fn renew_token(&self) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/oauth/token"))
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", SCOPES),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Authentication(format!(
                "token request returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Authentication(e.to_string()))?;
        debug!("[flair] Access token renewed, expires in {:?}s", token.expires_in);
        *self.token.write().await = Some(token.access_token);
        Ok(())
    }

    async fn refresh_root(&self) -> Result<(), ApiError> {
        let root: RootResponse = match self.send(self.http.get(self.url("/api/"))).await? {
            Some(body) => serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))?,
            None => RootResponse::default(),
        };

        let links: HashMap<String, String> = root
            .links
            .into_iter()
            .filter_map(|(kind, link)| {
                let href = match link {
                    Value::String(href) => Some(href),
                    Value::Object(map) => map.get("self").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                };
                href.map(|href| (kind, href))
            })
            .collect();

        debug!("[flair] API root lists {} collections", links.len());
        *self.links.write().await = links;
        Ok(())
    }

    async fn list(&self, kind: &str) -> Result<Vec<Resource>, ApiError> {
        let href = self
            .links
            .read()
            .await
            .get(kind)
            .cloned()
            .unwrap_or_else(|| format!("/api/{}", kind));
        Ok(self.get_document(&href).await?.into_vec())
    }

    async fn fetch(&self, resource: &Resource) -> Result<Resource, ApiError> {
        self.get_document(&resource.self_href())
            .await?
            .into_one()
            .ok_or(ApiError::EmptyBody)
    }

    async fn related(&self, resource: &Resource, rel: &str) -> Result<Related, ApiError> {
        let href = resource.related_href(rel)?.to_string();
        self.get_document(&href).await
    }

    async fn update(
        &self,
        resource: &Resource,
        attributes: Attributes,
    ) -> Result<Resource, ApiError> {
        let body = json!({
            "data": {
                "type": resource.kind,
                "id": resource.id,
                "attributes": attributes,
            }
        });
        debug!("[flair] PATCH {} {}", resource.self_href(), body);

        let request = self
            .http
            .patch(self.url(&resource.self_href()))
            .header(CONTENT_TYPE, JSON_API)
            .body(body.to_string());

        match self.send(request).await? {
            Some(body) => serde_json::from_value::<Document>(body)
                .map_err(|e| ApiError::Decode(e.to_string()))?
                .into_related()?
                .into_one()
                .ok_or(ApiError::EmptyBody),
            // Accepted without a body: the write went through as sent
            None => Ok(resource.merged(&attributes)),
        }
    }
}

/// Connector producing `HttpFlairClient`s
pub struct HttpConnector {
    http: reqwest::Client,
    api_root: String,
}

impl HttpConnector {
    pub fn new(api_root: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("flaird/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_root: api_root.into(),
        })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn FlairApi>, ApiError> {
        info!("[flair] Connecting to {}", self.api_root);
        let client =
            HttpFlairClient::authenticate(self.http.clone(), &self.api_root, credentials.clone())
                .await?;
        Ok(Arc::new(client))
    }
}
