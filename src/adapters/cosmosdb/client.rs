//! Cosmos DB client implementation
//!
//! This module talks to the Cosmos DB REST API directly. Partition key
//! ranges, range-scoped queries and per-request charges are all first-class
//! in the REST protocol, which is everything the pipelines need.

use crate::adapters::cosmosdb::auth::{request_date, MasterKey, ResourceType, API_VERSION};
use crate::adapters::cosmosdb::models::{
    CollectionList, CollectionResource, DocumentList, PartitionKeyRangeList, QueryRequest,
};
use crate::adapters::database::{DocumentStore, Page, StoreResponse};
use crate::config::CosmosDbConfig;
use crate::domain::{
    CollectionDescriptor, CosmosDbError, DumpError, IndexingPolicy, Item, PartitionRange, Result,
};
use crate::log_throttled_retry;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const HEADER_REQUEST_CHARGE: &str = "x-ms-request-charge";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const HEADER_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

const INITIAL_RETRY_DELAY_MS: u64 = 1000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Longest error body echoed into an error message
const MAX_ERROR_BODY: usize = 512;

/// Query used to scan a partition range
const SCAN_QUERY: &str = "SELECT * FROM c";

/// Cosmos DB client for cosmos-dump
///
/// Signs every request with the account master key and retries throttled
/// (429) requests up to `cosmosdb.max_retries` times.
pub struct CosmosDbClient {
    http: Client,
    base_url: Url,
    key: MasterKey,
    config: CosmosDbConfig,
}

/// A signed REST call, rebuilt on every retry
struct RestRequest {
    method: Method,
    resource_type: ResourceType,
    resource_link: String,
    path: String,
    headers: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl RestRequest {
    fn new(
        method: Method,
        resource_type: ResourceType,
        resource_link: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            method,
            resource_type,
            resource_link: resource_link.into(),
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn json_body(mut self, body: &impl Serialize) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    fn raw_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

struct RestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    request_charge: f64,
}

impl RestResponse {
    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn continuation(&self) -> Option<String> {
        self.header_str(HEADER_CONTINUATION)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            DumpError::from(CosmosDbError::DeserializationFailed(e.to_string()))
                .with_charge(self.request_charge)
        })
    }

    fn body_text(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(MAX_ERROR_BODY).collect()
    }

    /// Map a non-success response to a domain error carrying its charge
    fn into_error(self, context: &str, fallback: fn(String) -> CosmosDbError) -> DumpError {
        let message = format!("{context}: HTTP {} {}", self.status, self.body_text());
        let error = match self.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CosmosDbError::AuthenticationFailed(message)
            }
            StatusCode::TOO_MANY_REQUESTS => CosmosDbError::Throttled(message),
            _ => fallback(message),
        };
        DumpError::CosmosDb(error).with_charge(self.request_charge)
    }
}

impl CosmosDbClient {
    /// Create a new Cosmos DB client
    ///
    /// No request is made; call [`DocumentStore::test_connection`] to verify
    /// the endpoint and key.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the key is not
    /// valid base64.
    pub fn new(config: CosmosDbConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        let key = MasterKey::from_base64(config.key.expose_secret().as_ref())?;

        let mut endpoint = config.endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint).map_err(|e| {
            DumpError::Configuration(format!("Invalid Cosmos DB endpoint '{endpoint}': {e}"))
        })?;

        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CosmosDbError::ConnectionFailed(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url,
            key,
            config,
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn database_link(&self) -> String {
        format!("dbs/{}", self.config.database_name)
    }

    fn collection_link(&self, collection: &str) -> String {
        format!("dbs/{}/colls/{}", self.config.database_name, collection)
    }

    /// Send a request, retrying throttled responses with backoff
    ///
    /// The returned charge covers every attempt, and so does the charge of
    /// a transport error raised after throttled attempts.
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse> {
        let url = self.base_url.join(&request.path).map_err(|e| {
            CosmosDbError::InvalidRequest(format!("Invalid resource path {}: {e}", request.path))
        })?;

        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let mut request_charge = 0.0;

        loop {
            let date = request_date();
            let authorization = self.key.authorization(
                request.method.as_str(),
                request.resource_type,
                &request.resource_link,
                &date,
            );

            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .header("x-ms-date", date.as_str())
                .header("x-ms-version", API_VERSION)
                .header(AUTHORIZATION, authorization);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(|e| {
                DumpError::from(CosmosDbError::ConnectionFailed(format!(
                    "{} {} failed: {e}",
                    request.method, request.path
                )))
                .with_charge(request_charge)
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            request_charge += parse_charge(&headers);

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < max_retries {
                attempt += 1;
                let wait_ms = retry_after_ms(&headers).unwrap_or(delay_ms);
                log_throttled_retry!(request.path, attempt, max_retries, wait_ms);
                sleep(Duration::from_millis(wait_ms)).await;
                delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                continue;
            }

            let body = response.bytes().await.map_err(|e| {
                DumpError::from(CosmosDbError::ConnectionFailed(format!(
                    "Failed to read response of {} {}: {e}",
                    request.method, request.path
                )))
                .with_charge(request_charge)
            })?;

            return Ok(RestResponse {
                status,
                headers,
                body: body.to_vec(),
                request_charge,
            });
        }
    }

    /// Read every page of a feed resource (collections, partition key ranges)
    async fn read_feed<T: DeserializeOwned>(
        &self,
        resource_type: ResourceType,
        resource_link: &str,
        path: &str,
        context: &str,
        not_found: fn(String) -> CosmosDbError,
    ) -> Result<StoreResponse<Vec<T>>> {
        let mut pages = Vec::new();
        let mut request_charge = 0.0;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = RestRequest::new(Method::GET, resource_type, resource_link, path);
            if let Some(token) = &continuation {
                request = request.header(HEADER_CONTINUATION, token.clone());
            }

            let previous = request_charge;
            let response = self
                .execute(&request)
                .await
                .map_err(|e| e.with_charge(previous))?;
            request_charge += response.request_charge;

            if response.status == StatusCode::NOT_FOUND {
                return Err(response.into_error(context, not_found).with_charge(previous));
            }
            if !response.status.is_success() {
                return Err(response
                    .into_error(context, CosmosDbError::QueryFailed)
                    .with_charge(previous));
            }

            pages.push(response.json::<T>().map_err(|e| e.with_charge(previous))?);
            continuation = response.continuation();
            if continuation.is_none() {
                break;
            }
        }

        Ok(StoreResponse::new(pages, request_charge))
    }
}

#[async_trait]
impl DocumentStore for CosmosDbClient {
    async fn test_connection(&self) -> Result<()> {
        let link = self.database_link();
        let request = RestRequest::new(Method::GET, ResourceType::Databases, &link, &link);
        let response = self.execute(&request).await?;

        let status = response.status;
        match status {
            status if status.is_success() => {
                tracing::debug!(database = %self.config.database_name, "Connection test succeeded");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(response.into_error(
                &format!("Database {}", self.config.database_name),
                CosmosDbError::DatabaseNotFound,
            )),
            _ => Err(response.into_error("Connection test failed", CosmosDbError::ConnectionFailed)),
        }
    }

    async fn list_collections(&self) -> Result<StoreResponse<Vec<CollectionDescriptor>>> {
        let link = self.database_link();
        let path = format!("{link}/colls");
        let pages: StoreResponse<Vec<CollectionList>> = self
            .read_feed(
                ResourceType::Collections,
                &link,
                &path,
                "List collections",
                CosmosDbError::DatabaseNotFound,
            )
            .await?;

        Ok(pages.map(|pages| {
            pages
                .into_iter()
                .flat_map(|page| page.collections)
                .map(CollectionDescriptor::from)
                .collect()
        }))
    }

    async fn partition_ranges(
        &self,
        collection: &str,
    ) -> Result<StoreResponse<Vec<PartitionRange>>> {
        let link = self.collection_link(collection);
        let path = format!("{link}/pkranges");
        let pages: StoreResponse<Vec<PartitionKeyRangeList>> = self
            .read_feed(
                ResourceType::PartitionKeyRanges,
                &link,
                &path,
                &format!("Partition key ranges of {collection}"),
                CosmosDbError::CollectionNotFound,
            )
            .await?;

        Ok(pages.map(|pages| {
            pages
                .into_iter()
                .flat_map(PartitionKeyRangeList::into_ranges)
                .collect()
        }))
    }

    async fn query_page(
        &self,
        collection: &str,
        range: &PartitionRange,
        continuation: Option<&str>,
    ) -> Result<StoreResponse<Page>> {
        let link = self.collection_link(collection);
        let path = format!("{link}/docs");

        let mut request = RestRequest::new(Method::POST, ResourceType::Documents, &link, path)
            .header("x-ms-documentdb-isquery", "True")
            .header("x-ms-documentdb-query-enablecrosspartition", "True")
            .header("x-ms-documentdb-partitionkeyrangeid", range.as_str())
            .header("x-ms-max-item-count", "-1")
            .header("content-type", "application/query+json")
            .json_body(&QueryRequest::new(SCAN_QUERY))?;
        if let Some(token) = continuation {
            request = request.header(HEADER_CONTINUATION, token);
        }

        let response = self.execute(&request).await?;
        if !response.status.is_success() {
            return Err(response.into_error(
                &format!("Query of {collection} range {range}"),
                CosmosDbError::QueryFailed,
            ));
        }

        let list: DocumentList = response.json()?;
        let items = list
            .documents
            .into_iter()
            .map(Item::try_from)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                DumpError::from(CosmosDbError::DeserializationFailed(e.to_string()))
                    .with_charge(response.request_charge)
            })?;

        Ok(StoreResponse::new(
            Page {
                items,
                continuation: response.continuation(),
            },
            response.request_charge,
        ))
    }

    async fn upsert_item(
        &self,
        collection: &CollectionDescriptor,
        item: &Item,
    ) -> Result<StoreResponse<()>> {
        let link = self.collection_link(&collection.name);
        let path = format!("{link}/docs");
        let partition_key = partition_key_header(item, &collection.partition_key_path)?;

        let request = RestRequest::new(Method::POST, ResourceType::Documents, &link, path)
            .header("x-ms-documentdb-is-upsert", "True")
            .header("x-ms-documentdb-partitionkey", partition_key)
            .header("content-type", "application/json")
            .raw_body(item.to_bytes()?);

        let response = self.execute(&request).await?;
        if !response.status.is_success() {
            let context = format!(
                "Upsert of {} into {}",
                item.id().unwrap_or("<no id>"),
                collection.name
            );
            return Err(response.into_error(&context, CosmosDbError::UpsertFailed));
        }

        Ok(StoreResponse::new((), response.request_charge))
    }

    async fn read_collection(
        &self,
        name: &str,
    ) -> Result<StoreResponse<Option<CollectionDescriptor>>> {
        let link = self.collection_link(name);
        let request = RestRequest::new(Method::GET, ResourceType::Collections, &link, &link);
        let response = self.execute(&request).await?;

        let status = response.status;
        match status {
            StatusCode::NOT_FOUND => Ok(StoreResponse::new(None, response.request_charge)),
            status if status.is_success() => {
                let resource: CollectionResource = response.json()?;
                Ok(StoreResponse::new(
                    Some(CollectionDescriptor::from(resource)),
                    response.request_charge,
                ))
            }
            _ => Err(response.into_error(
                &format!("Read collection {name}"),
                CosmosDbError::QueryFailed,
            )),
        }
    }

    async fn create_collection_if_absent(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<StoreResponse<bool>> {
        let link = self.database_link();
        let path = format!("{link}/colls");
        let request = RestRequest::new(Method::POST, ResourceType::Collections, &link, path)
            .header("content-type", "application/json")
            .json_body(&CollectionResource::from(descriptor))?;

        let response = self.execute(&request).await?;
        let status = response.status;
        match status {
            StatusCode::CONFLICT => {
                tracing::debug!(collection = %descriptor.name, "Collection already exists");
                Ok(StoreResponse::new(false, response.request_charge))
            }
            status if status.is_success() => {
                tracing::info!(
                    collection = %descriptor.name,
                    partition_key = %descriptor.partition_key_path,
                    "Collection created"
                );
                Ok(StoreResponse::new(true, response.request_charge))
            }
            _ => Err(response.into_error(
                &format!("Create collection {}", descriptor.name),
                CosmosDbError::CollectionCreationFailed,
            )),
        }
    }

    async fn replace_indexing_policy(
        &self,
        collection: &CollectionDescriptor,
        policy: &IndexingPolicy,
    ) -> Result<StoreResponse<()>> {
        let link = self.collection_link(&collection.name);
        let mut body = CollectionResource::from(collection);
        body.indexing_policy = Some(policy.as_value().clone());

        let request = RestRequest::new(Method::PUT, ResourceType::Collections, &link, &link)
            .header("content-type", "application/json")
            .json_body(&body)?;

        let response = self.execute(&request).await?;
        if !response.status.is_success() {
            return Err(response.into_error(
                &format!("Replace indexing policy of {}", collection.name),
                CosmosDbError::PolicyUpdateFailed,
            ));
        }

        Ok(StoreResponse::new((), response.request_charge))
    }

    fn database_name(&self) -> &str {
        &self.config.database_name
    }
}

fn parse_charge(headers: &HeaderMap) -> f64 {
    headers
        .get(HEADER_REQUEST_CHARGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(HEADER_RETRY_AFTER_MS)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|ms| ms.ceil() as u64)
}

/// JSON-array partition key header for an item
///
/// Items without a value at the key path are addressed with `[{}]`, the
/// REST encoding of an undefined partition key.
fn partition_key_header(item: &Item, path: &str) -> Result<String> {
    let value = item.value_at_path(path).cloned().unwrap_or_else(|| json!({}));
    let encoded = serde_json::to_string(&Value::Array(vec![value]))?;
    Ok(escape_header_json(&encoded))
}

/// Header values must be visible ASCII, so escape everything else
fn escape_header_json(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len());
    let mut units = [0u16; 2];
    for c in encoded.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}
