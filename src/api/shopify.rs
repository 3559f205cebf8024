//! Purpose: Provide an HTTP client for the Shopify Admin REST API.
//! Exports: `ShopifyClient`, `DEFAULT_API_VERSION`.
//! Role: Production `ShopApi` implementation over blocking ureq requests.
//! Invariants: Store refs resolve to an origin; API paths live under `admin/api/<version>/`.
//! Invariants: Listings follow `Link: <...>; rel="next"` until no next page remains.
//! Invariants: Non-success statuses map onto `ErrorKind`; no request is retried.
#![allow(clippy::result_large_err)]

use super::resource::{Metafield, Product, ProductUpdate};
use super::{ApiResult, LookupField, ShopApi};
use crate::core::error::{Error, ErrorKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_VERSION: &str = "2024-01";
const PAGE_LIMIT: &str = "250";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    origin: Url,
    api_version: String,
    authorization: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ProductsEnvelope {
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct MetafieldsEnvelope {
    metafields: Vec<Metafield>,
}

#[derive(Serialize)]
struct ProductUpdateEnvelope<'a> {
    product: &'a ProductUpdate,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    errors: Value,
}

impl ShopifyClient {
    pub fn new(store: &str, api_version: impl Into<String>) -> ApiResult<Self> {
        let origin = normalize_store(store)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("powereditor/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                origin,
                api_version: api_version.into(),
                authorization: None,
                agent,
            }),
        })
    }

    pub fn with_basic_auth(mut self, key: &str, password: &str) -> Self {
        let authorization = format!("Basic {}", STANDARD.encode(format!("{key}:{password}")));
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.authorization = Some(authorization);
        } else {
            self.inner = Arc::new(ShopifyClientInner {
                origin: self.inner.origin.clone(),
                api_version: self.inner.api_version.clone(),
                authorization: Some(authorization),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    fn endpoint(&self, resource: &[&str], query: &[(&str, &str)]) -> ApiResult<Url> {
        let mut segments = vec!["admin", "api", self.inner.api_version.as_str()];
        segments.extend_from_slice(resource);
        let mut url = build_url(&self.inner.origin, &segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn get_all<E, T>(&self, first: Url, unwrap: impl Fn(E) -> Vec<T>) -> ApiResult<Vec<T>>
    where
        E: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let response = self.send("GET", &url, None)?;
            next = next_page_url(response.header("Link"))?;
            let envelope: E = read_json_response(response)?;
            items.extend(unwrap(envelope));
        }
        Ok(items)
    }

    fn send(&self, method: &str, url: &Url, body: Option<String>) -> ApiResult<ureq::Response> {
        tracing::debug!(method, url = %url, "shop request");
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(authorization) = &self.inner.authorization {
            request = request.set("Authorization", authorization);
        }
        let response = match body {
            None => request.call(),
            Some(payload) => request
                .set("Content-Type", "application/json")
                .send_string(&payload),
        };

        match response {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message(format!("request to {} failed", url.host_str().unwrap_or("shop")))
                .with_source(err)),
        }
    }
}

impl ShopApi for ShopifyClient {
    fn collection_products(&self, collection_id: u64, fields: &[&str]) -> ApiResult<Vec<Product>> {
        let collection_id = collection_id.to_string();
        let fields = fields.join(",");
        let url = self.endpoint(
            &["products.json"],
            &[
                ("collection_id", collection_id.as_str()),
                ("fields", fields.as_str()),
                ("limit", PAGE_LIMIT),
            ],
        )?;
        self.get_all(url, |envelope: ProductsEnvelope| envelope.products)
    }

    fn product_metafields(&self, product_id: u64, namespace: &str) -> ApiResult<Vec<Metafield>> {
        let product_id = product_id.to_string();
        let url = self.endpoint(
            &["products", product_id.as_str(), "metafields.json"],
            &[
                ("namespace", namespace),
                ("fields", "id,namespace,key,value"),
                ("limit", PAGE_LIMIT),
            ],
        )?;
        self.get_all(url, |envelope: MetafieldsEnvelope| envelope.metafields)
    }

    fn find_products(&self, field: LookupField, value: &str) -> ApiResult<Vec<Product>> {
        let url = self.endpoint(
            &["products.json"],
            &[
                (field.as_str(), value),
                ("fields", "id,handle,title"),
                ("limit", PAGE_LIMIT),
            ],
        )?;
        let products = self.get_all(url, |envelope: ProductsEnvelope| envelope.products)?;
        // The title filter matches loosely on some API versions.
        Ok(products
            .into_iter()
            .filter(|product| {
                let found = match field {
                    LookupField::Handle => product.handle.as_deref(),
                    LookupField::Title => product.title.as_deref(),
                };
                found.is_none_or(|found| found == value)
            })
            .collect())
    }

    fn update_product(&self, update: &ProductUpdate) -> ApiResult<()> {
        let file = format!("{}.json", update.id);
        let url = self.endpoint(&["products", file.as_str()], &[])?;
        let payload = serde_json::to_string(&ProductUpdateEnvelope { product: update })
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode product update")
                    .with_source(err)
            })?;
        self.send("PUT", &url, Some(payload))?;
        Ok(())
    }
}

fn normalize_store(store: &str) -> ApiResult<Url> {
    let store = store.trim().trim_end_matches('/');
    let candidate = if store.contains("://") {
        store.to_string()
    } else {
        format!("https://{store}")
    };
    let mut url = Url::parse(&candidate).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid store domain '{store}'"))
            .with_hint("Use the shop domain, e.g. my-shop.myshopify.com.")
            .with_source(err)
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::new(ErrorKind::Usage).with_message("store url must use http or https"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(origin: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = origin.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("store url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn next_page_url(link: Option<&str>) -> ApiResult<Option<Url>> {
    let Some(mut rest) = link else {
        return Ok(None);
    };
    // Targets may contain commas (`fields=id,handle`), so split on `<...>` rather than `,`.
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let target = &rest[start + 1..start + len];
        let after = &rest[start + len + 1..];
        let params = after.split('<').next().unwrap_or_default();
        let is_next = params.split(';').any(|param| {
            let param = param.trim().trim_end_matches(',').trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if is_next {
            let url = Url::parse(target).map_err(|err| {
                Error::new(ErrorKind::Remote)
                    .with_message("invalid pagination link")
                    .with_source(err)
            })?;
            return Ok(Some(url));
        }
        rest = after;
    }
    Ok(None)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Remote)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let kind = error_kind_from_status(status);
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .map(|envelope| match envelope.errors {
            Value::String(text) => text,
            other => other.to_string(),
        });
    let message = match detail {
        Some(detail) => format!("shop returned status {status}: {detail}"),
        None => format!("shop returned status {status}"),
    };
    let err = Error::new(kind).with_message(message);
    match kind {
        ErrorKind::Permission => {
            err.with_hint("Check the API key, password, and the app's access scopes.")
        }
        _ => err,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Remote,
    }
}
