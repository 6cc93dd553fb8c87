use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::{ObjectQuery, ObjectRepository};
use crate::config::{Config, Credentials};
use crate::error::{RelgraphError, Result};
use crate::model::{ArchitectureObject, ObjectKind, Relation};

const RELATIONS_ENDPOINT: &str = "Relations";
const OBJECTS_ENDPOINT: &str = "Objects";

/// HTTP client for an OData v4 object repository
///
/// Issues `GET {root}/Relations` and `GET {root}/Objects` with `$filter`
/// expressions scoped to a workspace. `MoreColumns=true` is added when the
/// caller wants extended property columns.
pub struct ODataClient {
    client: Client,
    root: String,
    credentials: Credentials,
    page_size: usize,
}

impl ODataClient {
    /// Create a client for the service rooted at `odata_url`.
    pub fn new(
        odata_url: &str,
        credentials: Credentials,
        timeout: Duration,
        page_size: usize,
    ) -> Result<Self> {
        Url::parse(odata_url)
            .map_err(|e| RelgraphError::Config(format!("Invalid OData URL {}: {}", odata_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            root: odata_url.trim_end_matches('/').to_string(),
            credentials,
            page_size: page_size.max(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.repository.odata_url,
            config.credentials(),
            Duration::from_secs(config.repository.timeout_secs),
            config.repository.page_size,
        )
    }

    fn build_url(&self, endpoint: &str, filter: &str, top: usize, extended: bool) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.root, endpoint))
            .map_err(|e| RelgraphError::Config(format!("Invalid OData URL: {}", e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            if extended {
                pairs.append_pair("MoreColumns", "true");
            }
            pairs.append_pair("$filter", filter);
            pairs.append_pair("$top", &top.to_string());
        }
        Ok(url)
    }

    /// Run one list query and decode its records.
    async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        filter: &str,
        top: usize,
        extended: bool,
    ) -> Result<Vec<T>> {
        let url = self.build_url(endpoint, filter, top, extended)?;
        log::debug!("OData GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0");

        request = match &self.credentials {
            Credentials::Bearer(key) => request.header("Authorization", format!("Bearer {}", key)),
            Credentials::Basic { username, password } => request.header(
                "Authorization",
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password))),
            ),
            Credentials::None => request,
        };

        let start = std::time::Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RelgraphError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let records = match body {
            serde_json::Value::Object(mut map) => match map.remove("value") {
                Some(serde_json::Value::Array(items)) => items,
                _ => Vec::new(),
            },
            serde_json::Value::Array(items) => items,
            _ => Vec::new(),
        };

        let total = records.len();
        let decoded: Vec<T> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    log::warn!("Skipping malformed {} record: {}", endpoint, e);
                    None
                }
            })
            .collect();

        log::debug!(
            "OData {} returned {}/{} records in {:?}",
            endpoint,
            decoded.len(),
            total,
            start.elapsed()
        );
        Ok(decoded)
    }
}

#[async_trait]
impl ObjectRepository for ODataClient {
    async fn relations_for(&self, object_id: &str, workspace: &str) -> Result<Vec<Relation>> {
        let filter = relationship_filter(object_id, workspace);
        self.list(RELATIONS_ENDPOINT, &filter, self.page_size, true).await
    }

    async fn objects_by_ids(
        &self,
        ids: &[String],
        workspace: &str,
        query: &ObjectQuery,
    ) -> Result<Vec<ArchitectureObject>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = objects_filter(ids, workspace, query.type_filter.as_deref());
        let top = self.page_size.max(ids.len());
        self.list(OBJECTS_ENDPOINT, &filter, top, query.extended).await
    }

    async fn object_by_id(
        &self,
        id: &str,
        workspace: &str,
        extended: bool,
    ) -> Result<Option<ArchitectureObject>> {
        let filter = format!("ID eq {} and Workspace eq {}", quote(id), quote(workspace));
        let mut objects: Vec<ArchitectureObject> =
            self.list(OBJECTS_ENDPOINT, &filter, 1, extended).await?;
        Ok(if objects.is_empty() {
            None
        } else {
            Some(objects.swap_remove(0))
        })
    }
}

/// OData string literal; embedded quotes are doubled.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn relationship_filter(object_id: &str, workspace: &str) -> String {
    let id = quote(object_id);
    let ws = quote(workspace);
    let kinds = ObjectKind::TRAVERSABLE
        .iter()
        .map(|k| format!("RelatedBlueDolphinObjectDefinitionName eq {}", quote(k.definition())))
        .collect::<Vec<_>>()
        .join(" or ");
    format!(
        "(BlueDolphinObjectItemId eq {id} or RelatedBlueDolphinObjectItemId eq {id}) \
         and BlueDolphinObjectWorkspaceName eq {ws} \
         and RelatedBlueDolphinObjectWorkspaceName eq {ws} \
         and ({kinds})"
    )
}

pub(crate) fn objects_filter(ids: &[String], workspace: &str, type_filter: Option<&str>) -> String {
    let list = ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(",");
    match type_filter {
        Some(definition) => format!(
            "ID in ({}) and Definition eq {} and Workspace eq {}",
            list,
            quote(definition),
            quote(workspace)
        ),
        None => format!("ID in ({}) and Workspace eq {}", list, quote(workspace)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    async fn relations_handler(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        seen.lock().unwrap().push((params, auth));
        Json(json!({
            "value": [
                {
                    "RelationshipId": "R1",
                    "BlueDolphinObjectItemId": "AF-1",
                    "RelatedBlueDolphinObjectItemId": "BP-1",
                    "Type": "composition",
                    "BlueDolphinObjectWorkspaceName": "W",
                    "RelatedBlueDolphinObjectWorkspaceName": "W"
                },
                { "broken": true }
            ]
        }))
    }

    async fn objects_handler(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        let filter = params.get("$filter").cloned().unwrap_or_default();
        if filter.contains("ID in") {
            return (StatusCode::BAD_REQUEST, "in operator unsupported").into_response();
        }
        let mut record = json!({
            "ID": "BP-1",
            "Title": "Order Handling",
            "Definition": "Business Process",
            "Workspace": "W"
        });
        if params.get("MoreColumns").map(String::as_str) == Some("true") {
            record["Object_Properties_Owner"] = json!("ops");
        }
        Json(json!([record])).into_response()
    }

    async fn serve(seen: Seen) -> String {
        let router = Router::new()
            .route("/odata/Relations", get(relations_handler))
            .route("/odata/Objects", get(objects_handler))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/odata/", addr)
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_relationship_filter_shape() {
        let filter = relationship_filter("AF-1", "W");
        assert!(filter.starts_with(
            "(BlueDolphinObjectItemId eq 'AF-1' or RelatedBlueDolphinObjectItemId eq 'AF-1')"
        ));
        assert!(filter.contains("BlueDolphinObjectWorkspaceName eq 'W'"));
        assert!(filter.contains("RelatedBlueDolphinObjectWorkspaceName eq 'W'"));
        for kind in ObjectKind::TRAVERSABLE {
            assert!(filter.contains(kind.definition()));
        }
    }

    #[test]
    fn test_objects_filter_with_and_without_type() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            objects_filter(&ids, "W", None),
            "ID in ('a','b') and Workspace eq 'W'"
        );
        assert_eq!(
            objects_filter(&ids, "W", Some("Deliverable")),
            "ID in ('a','b') and Definition eq 'Deliverable' and Workspace eq 'W'"
        );
    }

    #[tokio::test]
    async fn test_relations_for_sends_filter_and_auth() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let root = serve(seen.clone()).await;
        let client = ODataClient::new(
            &root,
            Credentials::Bearer("token".into()),
            Duration::from_secs(5),
            1000,
        )
        .unwrap();

        let relations = client.relations_for("AF-1", "W").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target_id, "BP-1");

        let seen = seen.lock().unwrap();
        let (params, auth) = &seen[0];
        assert_eq!(params.get("$top").map(String::as_str), Some("1000"));
        assert_eq!(params.get("$filter"), Some(&relationship_filter("AF-1", "W")));
        assert_eq!(auth.as_deref(), Some("Bearer token"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let root = serve(Arc::new(Mutex::new(Vec::new()))).await;
        let client =
            ODataClient::new(&root, Credentials::None, Duration::from_secs(5), 100).unwrap();

        let err = client
            .objects_by_ids(&["BP-1".to_string()], "W", &ObjectQuery::summary())
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::Remote { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_object_by_id_accepts_bare_array_and_extended_columns() {
        let root = serve(Arc::new(Mutex::new(Vec::new()))).await;
        let client =
            ODataClient::new(&root, Credentials::None, Duration::from_secs(5), 100).unwrap();

        let summary = client.object_by_id("BP-1", "W", false).await.unwrap().unwrap();
        assert!(summary.extended_fields.is_empty());

        let full = client.object_by_id("BP-1", "W", true).await.unwrap().unwrap();
        assert_eq!(full.title, "Order Handling");
        assert_eq!(full.count_fields_with_prefix(&["Object_Properties_"]), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        let client = ODataClient::new(
            "http://127.0.0.1:9/odata",
            Credentials::None,
            Duration::from_secs(2),
            10,
        )
        .unwrap();
        let err = client.relations_for("AF-1", "W").await.unwrap_err();
        assert!(matches!(err, RelgraphError::Http(_)));
    }
}
