//! Purpose: Loopback stand-in for the Shopify Admin REST endpoints the CLI touches.
//! Exports: `StubShop`, `StubProduct`, `KEY`, `PASSWORD`, `API_VERSION`.
//! Role: Shared by integration tests; serves listings, metafields, and product updates.
//! Invariants: Binds an ephemeral 127.0.0.1 port; the server thread lives until the test exits.
//! Invariants: Collection listings return one product per page to exercise `Link` pagination.
#![allow(dead_code)]

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, serve};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const KEY: &str = "key";
pub const PASSWORD: &str = "secret";
pub const API_VERSION: &str = "2024-01";

#[derive(Clone, Debug, Default)]
pub struct StubProduct {
    pub id: u64,
    pub collection: u64,
    pub handle: String,
    pub title: String,
    pub body_html: String,
    pub metafields: Vec<(String, String, Value)>,
    pub reject_update: bool,
}

impl StubProduct {
    pub fn new(id: u64, collection: u64, handle: &str) -> Self {
        Self {
            id,
            collection,
            handle: handle.to_string(),
            title: format!("Product {id}"),
            body_html: format!("<p>{handle}</p>"),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_metafield(mut self, namespace: &str, key: &str, value: Value) -> Self {
        self.metafields
            .push((namespace.to_string(), key.to_string(), value));
        self
    }

    pub fn rejecting_updates(mut self) -> Self {
        self.reject_update = true;
        self
    }

    fn json(&self, fields: Option<&str>) -> Value {
        let full = json!({
            "id": self.id,
            "handle": self.handle,
            "title": self.title,
            "body_html": self.body_html,
        });
        let Some(fields) = fields else {
            return full;
        };
        let wanted = fields.split(',').collect::<Vec<_>>();
        let mut out = Map::new();
        if let Value::Object(map) = full {
            for (name, value) in map {
                if wanted.contains(&name.as_str()) {
                    out.insert(name, value);
                }
            }
        }
        Value::Object(out)
    }
}

struct StubState {
    base_url: String,
    authorization: String,
    products: Vec<StubProduct>,
    requests: Mutex<Vec<String>>,
    updates: Mutex<Vec<Value>>,
}

pub struct StubShop {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubShop {
    pub fn start(products: Vec<StubProduct>) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub shop");
        listener.set_nonblocking(true).expect("nonblocking");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{addr}");

        let authorization = {
            use base64::Engine;
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{KEY}:{PASSWORD}"));
            format!("Basic {token}")
        };
        let state = Arc::new(StubState {
            base_url: base_url.clone(),
            authorization,
            products,
            requests: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        });

        let prefix = format!("/admin/api/{API_VERSION}");
        let app = Router::new()
            .route(&format!("{prefix}/products.json"), get(list_products))
            .route(
                &format!("{prefix}/products/:id/metafields.json"),
                get(list_metafields),
            )
            .route(&format!("{prefix}/products/:id"), put(update_product))
            .with_state(Arc::clone(&state));

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                serve(listener, app).await.expect("serve");
            });
        });

        Self { base_url, state }
    }

    /// Request log as `path?query`, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Parsed JSON bodies of accepted product updates.
    pub fn updates(&self) -> Vec<Value> {
        self.state
            .updates
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl StubState {
    fn record(&self, path: &str, query: &HashMap<String, String>) {
        let mut pairs = query
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>();
        pairs.sort();
        self.requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(format!("{path}?{}", pairs.join("&")));
    }

    fn check_auth(&self, headers: &HeaderMap) -> Result<(), Response> {
        let sent = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if sent == Some(self.authorization.as_str()) {
            return Ok(());
        }
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": "[API] Invalid API key or access token"})),
        )
            .into_response())
    }
}

async fn list_products(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record("products.json", &query);
    if let Err(response) = state.check_auth(&headers) {
        return response;
    }
    let fields = query.get("fields").map(String::as_str);

    if let Some(collection) = query.get("collection_id") {
        let members = state
            .products
            .iter()
            .filter(|product| product.collection.to_string() == *collection)
            .collect::<Vec<_>>();
        let page = query
            .get("page_info")
            .and_then(|page| page.parse::<usize>().ok())
            .unwrap_or(0);
        let products = members
            .get(page)
            .map(|product| vec![product.json(fields)])
            .unwrap_or_default();
        if page + 1 < members.len() {
            let next = format!(
                "<{}/admin/api/{API_VERSION}/products.json?collection_id={collection}&fields={}&page_info={}>; rel=\"next\"",
                state.base_url,
                fields.unwrap_or("id"),
                page + 1
            );
            return ([(header::LINK, next)], Json(json!({ "products": products }))).into_response();
        }
        return Json(json!({ "products": products })).into_response();
    }

    let products = state
        .products
        .iter()
        .filter(|product| match (query.get("handle"), query.get("title")) {
            (Some(handle), _) => product.handle == *handle,
            // Loose on purpose: the client must keep exact matches only.
            (None, Some(title)) => product.title.contains(title.as_str()),
            (None, None) => true,
        })
        .map(|product| product.json(fields))
        .collect::<Vec<_>>();
    Json(json!({ "products": products })).into_response()
}

async fn list_metafields(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record(&format!("products/{id}/metafields.json"), &query);
    if let Err(response) = state.check_auth(&headers) {
        return response;
    }
    let Some(product) = state
        .products
        .iter()
        .find(|product| product.id.to_string() == id)
    else {
        return (StatusCode::NOT_FOUND, Json(json!({"errors": "Not Found"}))).into_response();
    };
    let namespace = query.get("namespace");
    let metafields = product
        .metafields
        .iter()
        .enumerate()
        .filter(|(_, (ns, _, _))| namespace.is_none_or(|wanted| wanted == ns))
        .map(|(index, (ns, key, value))| {
            json!({
                "id": product.id * 100 + index as u64,
                "namespace": ns,
                "key": key,
                "value": value,
            })
        })
        .collect::<Vec<_>>();
    Json(json!({ "metafields": metafields })).into_response()
}

async fn update_product(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(file): Path<String>,
    body: String,
) -> Response {
    state.record(&format!("products/{file}"), &HashMap::new());
    if let Err(response) = state.check_auth(&headers) {
        return response;
    }
    let id = file.trim_end_matches(".json");
    let Some(product) = state
        .products
        .iter()
        .find(|product| product.id.to_string() == id)
    else {
        return (StatusCode::NOT_FOUND, Json(json!({"errors": "Not Found"}))).into_response();
    };
    if product.reject_update {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": {"title": ["can't be blank"]}})),
        )
            .into_response();
    }
    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"errors": "bad json"}))).into_response();
    };
    state
        .updates
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .push(value.clone());
    Json(value).into_response()
}
