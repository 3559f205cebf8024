//! Purpose: Provide an in-process `ShopApi` backed by plain vectors.
//! Exports: `MemoryShop`.
//! Role: Stand-in shop for exercising export/import without a network.
//! Invariants: Mirrors `ShopifyClient` filtering (collection, namespace, exact lookup).
//! Invariants: Updates are recorded in call order and never mutate stored products.
#![allow(clippy::result_large_err)]

use super::resource::{Metafield, Product, ProductUpdate};
use super::{ApiResult, LookupField, ShopApi};
use crate::core::error::{Error, ErrorKind};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryShop {
    products: Vec<StoredProduct>,
    failing_listing: bool,
    failing_metafields: HashSet<u64>,
    failing_updates: HashSet<u64>,
    updates: Mutex<Vec<ProductUpdate>>,
}

#[derive(Debug)]
struct StoredProduct {
    product: Product,
    collections: Vec<u64>,
    metafields: Vec<Metafield>,
}

impl MemoryShop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(
        mut self,
        collection_id: u64,
        product: Product,
        metafields: Vec<Metafield>,
    ) -> Self {
        self.products.push(StoredProduct {
            product,
            collections: vec![collection_id],
            metafields,
        });
        self
    }

    /// Makes every collection listing fail with a transport error.
    pub fn with_failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    pub fn with_failing_metafields(mut self, product_id: u64) -> Self {
        self.failing_metafields.insert(product_id);
        self
    }

    pub fn with_failing_update(mut self, product_id: u64) -> Self {
        self.failing_updates.insert(product_id);
        self
    }

    /// Updates accepted so far, oldest first.
    pub fn updates(&self) -> Vec<ProductUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl ShopApi for MemoryShop {
    fn collection_products(&self, collection_id: u64, fields: &[&str]) -> ApiResult<Vec<Product>> {
        if self.failing_listing {
            return Err(transport_error("product listing"));
        }
        let wants = |name: &str| fields.contains(&name);
        Ok(self
            .products
            .iter()
            .filter(|stored| stored.collections.contains(&collection_id))
            .map(|stored| Product {
                id: stored.product.id,
                handle: stored.product.handle.clone().filter(|_| wants("handle")),
                title: stored.product.title.clone().filter(|_| wants("title")),
                body_html: stored.product.body_html.clone().filter(|_| wants("body_html")),
            })
            .collect())
    }

    fn product_metafields(&self, product_id: u64, namespace: &str) -> ApiResult<Vec<Metafield>> {
        if self.failing_metafields.contains(&product_id) {
            return Err(transport_error("metafield listing"));
        }
        let stored = self
            .products
            .iter()
            .find(|stored| stored.product.id == product_id)
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("product {product_id} does not exist"))
            })?;
        Ok(stored
            .metafields
            .iter()
            .filter(|field| field.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    fn find_products(&self, field: LookupField, value: &str) -> ApiResult<Vec<Product>> {
        Ok(self
            .products
            .iter()
            .map(|stored| &stored.product)
            .filter(|product| {
                let found = match field {
                    LookupField::Handle => product.handle.as_deref(),
                    LookupField::Title => product.title.as_deref(),
                };
                found == Some(value)
            })
            .cloned()
            .collect())
    }

    fn update_product(&self, update: &ProductUpdate) -> ApiResult<()> {
        if self.failing_updates.contains(&update.id) {
            return Err(Error::new(ErrorKind::Remote)
                .with_message(format!("shop returned status 422 for product {}", update.id)));
        }
        self.updates
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(update.clone());
        Ok(())
    }
}

fn transport_error(what: &str) -> Error {
    Error::new(ErrorKind::Io).with_message(format!("{what} failed: connection refused"))
}

#[cfg(test)]
mod tests {
    use super::MemoryShop;
    use crate::api::{LookupField, Metafield, Product, ProductUpdate, ShopApi};
    use crate::core::error::ErrorKind;

    fn product(id: u64, handle: &str) -> Product {
        Product {
            id,
            handle: Some(handle.to_string()),
            title: Some(format!("Title {id}")),
            body_html: Some("<p>body</p>".to_string()),
        }
    }

    #[test]
    fn listing_honors_collection_and_fields() {
        let shop = MemoryShop::new()
            .with_product(1, product(10, "a"), Vec::new())
            .with_product(2, product(20, "b"), Vec::new());
        let products = shop.collection_products(1, &["id", "handle"]).expect("list");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].handle.as_deref(), Some("a"));
        assert_eq!(products[0].title, None);
        assert_eq!(products[0].body_html, None);
    }

    #[test]
    fn metafields_filter_by_namespace() {
        let shop = MemoryShop::new().with_product(
            1,
            product(10, "a"),
            vec![
                Metafield::new(Some(1), "power-editor", "video", "x"),
                Metafield::new(Some(2), "global", "title_tag", "SEO"),
            ],
        );
        let fields = shop.product_metafields(10, "global").expect("fields");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].key, "title_tag");

        let err = shop.product_metafields(99, "global").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn lookup_returns_every_exact_match() {
        let shop = MemoryShop::new()
            .with_product(1, product(10, "dup"), Vec::new())
            .with_product(1, product(11, "dup"), Vec::new())
            .with_product(1, product(12, "dup-2"), Vec::new());
        let found = shop.find_products(LookupField::Handle, "dup").expect("found");
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn updates_are_recorded_unless_failing() {
        let shop = MemoryShop::new().with_failing_update(2);
        shop.update_product(&ProductUpdate {
            id: 1,
            ..ProductUpdate::default()
        })
        .expect("update");
        let err = shop
            .update_product(&ProductUpdate {
                id: 2,
                ..ProductUpdate::default()
            })
            .expect_err("failing");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(shop.updates().len(), 1);
    }
}
