//! HTTPS client for the administrative API (reqwest-based).

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{
    AdminSurface, AttributePage, CollectionPage, DocumentPage, IndexPage, PageRequest,
};
use crate::catalog::{AttributeKind, AttributeSpec, CollectionSpec, IndexSpec};
use crate::config::SyncConfig;
use crate::error::{RemoteError, RemoteResult, SyncError, SyncResult};

const PROJECT_HEADER: &str = "X-Project-Id";
const KEY_HEADER: &str = "X-Api-Key";

/// Structured error body returned by the surface.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionBody<'a> {
    collection_id: &'a str,
    name: &'a str,
    permissions: &'a [String],
    document_security: bool,
    enabled: bool,
}

/// Client bound to one project and database.
#[derive(Clone)]
pub struct HttpAdminClient {
    /// `{endpoint}/databases/{database_id}`, without trailing slash.
    database_url: String,
    project_id: String,
    api_key: String,
    http_client: Client,
}

impl std::fmt::Debug for HttpAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdminClient")
            .field("database_url", &self.database_url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl HttpAdminClient {
    /// Create a client from the run configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timing.request_timeout)
            .user_agent(concat!("folio-schema/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Connectivity {
                message: format!("failed to build HTTP client: {e}"),
                source: None,
            })?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(config: &SyncConfig, http_client: Client) -> Self {
        let base = config.endpoint.as_str().trim_end_matches('/');
        Self {
            database_url: format!("{base}/databases/{}", config.database_id),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            http_client,
        }
    }

    fn collections_url(&self) -> String {
        format!("{}/collections", self.database_url)
    }

    fn collection_url(&self, collection_id: &str) -> String {
        format!("{}/collections/{collection_id}", self.database_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(PROJECT_HEADER, &self.project_id)
            .header(KEY_HEADER, &self.api_key)
            .header(header::ACCEPT, "application/json")
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: &str, page: PageRequest) -> RemoteResult<T> {
        debug!(method = "GET", url = %url, offset = page.offset, "admin request");
        let response = self
            .authorize(self.http_client.get(url))
            .query(&[
                ("limit", page.limit.to_string()),
                ("offset", page.offset.to_string()),
            ])
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> RemoteResult<()> {
        debug!(method = "POST", url = %url, "admin request");
        let response = self
            .authorize(self.http_client.post(url))
            .json(body)
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    async fn patch<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> RemoteResult<()> {
        debug!(method = "PATCH", url = %url, "admin request");
        let response = self
            .authorize(self.http_client.patch(url))
            .json(body)
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    // ── Response Handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse {
                message: format!("failed to parse response: {e}"),
            })
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn handle_empty(response: reqwest::Response) -> RemoteResult<()> {
        let status = response.status();
        if status.is_success() || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> RemoteError {
        let status = response.status();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) if !parsed.message.is_empty() => match parsed.kind {
                Some(kind) => format!("{} ({kind})", parsed.message),
                None => parsed.message,
            },
            _ if body.is_empty() => format!("HTTP {status}"),
            _ => body,
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(retry_after_secs = ?retry_after, "administrative surface rate limited the call");
        }

        RemoteError::from_status(status.as_u16(), message, retry_after)
    }
}

fn attribute_body(spec: &AttributeSpec) -> (&'static str, Value) {
    let default = spec.default.as_ref().map_or(Value::Null, |d| d.to_json());
    match spec.kind {
        AttributeKind::String { size } => (
            "string",
            json!({
                "key": spec.key,
                "size": size,
                "required": spec.required,
                "default": default,
                "array": spec.array,
            }),
        ),
        AttributeKind::Integer { min, max } => (
            "integer",
            json!({
                "key": spec.key,
                "required": spec.required,
                "min": min,
                "max": max,
                "default": default,
                "array": spec.array,
            }),
        ),
        AttributeKind::Boolean => (
            "boolean",
            json!({
                "key": spec.key,
                "required": spec.required,
                "default": default,
                "array": spec.array,
            }),
        ),
    }
}

#[async_trait]
impl AdminSurface for HttpAdminClient {
    async fn list_collections(&self, page: PageRequest) -> RemoteResult<CollectionPage> {
        self.get(&self.collections_url(), page).await
    }

    async fn list_attributes(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<AttributePage> {
        let url = format!("{}/attributes", self.collection_url(collection_id));
        self.get(&url, page).await
    }

    async fn list_indexes(&self, collection_id: &str, page: PageRequest) -> RemoteResult<IndexPage> {
        let url = format!("{}/indexes", self.collection_url(collection_id));
        self.get(&url, page).await
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> RemoteResult<()> {
        let body = CreateCollectionBody {
            collection_id: &spec.id,
            name: &spec.name,
            permissions: &spec.permissions,
            document_security: spec.document_security,
            enabled: true,
        };
        self.post(&self.collections_url(), &body).await
    }

    async fn create_attribute(&self, spec: &AttributeSpec) -> RemoteResult<()> {
        let (kind, body) = attribute_body(spec);
        let url = format!(
            "{}/attributes/{kind}",
            self.collection_url(&spec.collection_id)
        );
        self.post(&url, &body).await
    }

    async fn create_index(&self, spec: &IndexSpec) -> RemoteResult<()> {
        let url = format!("{}/indexes", self.collection_url(&spec.collection_id));
        let body = json!({
            "key": spec.key,
            "type": spec.kind.as_str(),
            "attributes": spec.attributes,
            "orders": spec.effective_orders(),
        });
        self.post(&url, &body).await
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> RemoteResult<DocumentPage> {
        let url = format!("{}/documents", self.collection_url(collection_id));
        self.get(&url, page).await
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: &Map<String, Value>,
    ) -> RemoteResult<()> {
        let url = format!(
            "{}/documents/{document_id}",
            self.collection_url(collection_id)
        );
        self.patch(&url, &json!({ "data": patch })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DefaultValue;

    #[test]
    fn test_database_url_strips_trailing_slash() {
        let config = SyncConfig::new("https://cloud.example.com/v1/", "p", "content", "k").unwrap();
        let client = HttpAdminClient::new(&config).unwrap();
        assert_eq!(
            client.collections_url(),
            "https://cloud.example.com/v1/databases/content/collections"
        );
    }

    #[test]
    fn test_attribute_body_per_kind() {
        let (kind, body) = attribute_body(
            &AttributeSpec::integer("views")
                .bounds(Some(0), None)
                .default_value(DefaultValue::Int(0)),
        );
        assert_eq!(kind, "integer");
        assert_eq!(body["min"], json!(0));
        assert_eq!(body["max"], Value::Null);
        assert_eq!(body["default"], json!(0));

        let (kind, body) = attribute_body(&AttributeSpec::string("tags", 64).array());
        assert_eq!(kind, "string");
        assert_eq!(body["size"], json!(64));
        assert_eq!(body["array"], json!(true));
        assert_eq!(body["default"], Value::Null);

        let (kind, body) = attribute_body(&AttributeSpec::boolean("published").required());
        assert_eq!(kind, "boolean");
        assert_eq!(body["required"], json!(true));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = SyncConfig::new("https://cloud.example.com/v1", "p", "d", "topsecret").unwrap();
        let client = HttpAdminClient::new(&config).unwrap();
        assert!(!format!("{client:?}").contains("topsecret"));
    }
}
