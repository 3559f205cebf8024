//! Purpose: Assemble the export bundle for one collection.
//! Exports: `ExportOptions`, `ExportReport`, `export_collection`, `product_fields`.
//! Role: Export direction of the per-product assembly; fetch, decode, filter.
//! Invariants: Listing failures are logged and treated as "nothing found".
//! Invariants: A product is kept when it has namespace fields or base info is requested.
//! Invariants: SEO tags come from the reserved `global` namespace, outside the grid model.

use crate::api::{Metafield, Product, ShopApi};
use crate::core::bundle::{ExportBundle, ProductRecord};
use crate::core::grid::GridField;

pub const SEO_NAMESPACE: &str = "global";
pub const SEO_TITLE_KEY: &str = "title_tag";
pub const SEO_DESCRIPTION_KEY: &str = "description_tag";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportOptions {
    pub namespace: String,
    pub include_product_info: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExportReport {
    pub bundle: ExportBundle,
    pub scanned: usize,
}

pub fn product_fields(options: &ExportOptions) -> Vec<&'static str> {
    let mut fields = vec!["id", "handle"];
    if options.include_product_info {
        fields.extend(["body_html", "title"]);
    }
    fields
}

pub fn export_collection(
    api: &dyn ShopApi,
    collection_id: u64,
    options: &ExportOptions,
) -> ExportReport {
    tracing::info!(collection_id, "exporting collection");
    let products = match api.collection_products(collection_id, &product_fields(options)) {
        Ok(products) => products,
        Err(err) => {
            tracing::warn!(collection_id, error = %err, "product listing failed");
            Vec::new()
        }
    };
    if products.is_empty() {
        tracing::warn!(collection_id, "collection has no products");
    }

    let total = products.len();
    let mut bundle = ExportBundle::default();
    for (index, product) in products.into_iter().enumerate() {
        tracing::info!("fetching product {} of {}", index + 1, total);
        if let Some(record) = assemble_product(api, product, options) {
            bundle.products.push(record);
        }
    }

    ExportReport {
        bundle,
        scanned: total,
    }
}

fn assemble_product(
    api: &dyn ShopApi,
    product: Product,
    options: &ExportOptions,
) -> Option<ProductRecord> {
    let metafields = list_metafields(api, product.id, &options.namespace);
    if metafields.is_empty() && !options.include_product_info {
        tracing::debug!(product_id = product.id, "no power-editor fields; skipped");
        return None;
    }

    let (title_tag, description_tag) = seo_tags(&list_metafields(api, product.id, SEO_NAMESPACE));
    Some(ProductRecord {
        id: Some(product.id),
        handle: product.handle,
        body_html: product.body_html,
        title: product.title,
        metafields_global_title_tag: title_tag,
        metafields_global_description_tag: description_tag,
        fields: metafields
            .into_iter()
            .map(|field| GridField::decode(field.key, field.id, &field.value))
            .collect(),
    })
}

fn list_metafields(api: &dyn ShopApi, product_id: u64, namespace: &str) -> Vec<Metafield> {
    match api.product_metafields(product_id, namespace) {
        Ok(fields) => fields,
        Err(err) => {
            tracing::warn!(product_id, namespace, error = %err, "metafield listing failed");
            Vec::new()
        }
    }
}

fn seo_tags(fields: &[Metafield]) -> (Option<String>, Option<String>) {
    let lookup = |key: &str| {
        fields
            .iter()
            .rev()
            .find(|field| field.key == key)
            .map(|field| field.value.clone())
    };
    (lookup(SEO_TITLE_KEY), lookup(SEO_DESCRIPTION_KEY))
}
