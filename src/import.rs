//! Purpose: Push an export bundle back into the shop.
//! Exports: `PrimaryKey`, `ImportOptions`, `ImportReport`, `SkippedRecord`, `FailedUpdate`,
//! `import_bundle`, `resolve_target`, `build_update`.
//! Role: Import direction of the per-product assembly; resolve, encode, update.
//! Invariants: A record that cannot be matched to exactly one product is skipped, never fatal.
//! Invariants: A failed update is recorded and the run moves on to the next record.
//! Invariants: Every grid field is re-encoded and sent as a full overwrite of its value.
#![allow(clippy::result_large_err)]

use crate::api::{LookupField, MetafieldUpdate, ProductUpdate, ShopApi};
use crate::core::bundle::{ExportBundle, ProductRecord};
use crate::core::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

pub const METAFIELD_TYPE: &str = "multi_line_text_field";

/// Field used to locate the shop product a bundle record belongs to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PrimaryKey {
    #[default]
    Id,
    Handle,
    Title,
}

type RecordAccessor = fn(&ProductRecord) -> Option<&str>;

fn record_handle(record: &ProductRecord) -> Option<&str> {
    record.handle.as_deref()
}

fn record_title(record: &ProductRecord) -> Option<&str> {
    record.title.as_deref()
}

impl PrimaryKey {
    pub const ALL: [PrimaryKey; 3] = [PrimaryKey::Id, PrimaryKey::Handle, PrimaryKey::Title];

    pub fn as_str(self) -> &'static str {
        match self {
            PrimaryKey::Id => "id",
            PrimaryKey::Handle => "handle",
            PrimaryKey::Title => "title",
        }
    }

    /// Secondary lookup for keys other than `id`: shop filter plus record accessor.
    fn lookup(self) -> Option<(LookupField, RecordAccessor)> {
        match self {
            PrimaryKey::Id => None,
            PrimaryKey::Handle => Some((LookupField::Handle, record_handle as RecordAccessor)),
            PrimaryKey::Title => Some((LookupField::Title, record_title as RecordAccessor)),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimaryKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PrimaryKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("primary key '{value}' is not valid"))
                    .with_hint("Use one of: id, handle, title.")
            })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImportOptions {
    pub namespace: String,
    pub primary_key: PrimaryKey,
    pub metafields_only: bool,
}

#[derive(Debug)]
pub struct SkippedRecord {
    pub label: String,
    pub reason: Error,
}

#[derive(Debug)]
pub struct FailedUpdate {
    pub label: String,
    pub product_id: u64,
    pub reason: Error,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub updated: Vec<u64>,
    pub skipped: Vec<SkippedRecord>,
    pub failed: Vec<FailedUpdate>,
}

/// Finds the shop product id a record should update.
pub fn resolve_target(
    api: &dyn ShopApi,
    record: &ProductRecord,
    primary_key: PrimaryKey,
) -> Result<u64, Error> {
    let Some((field, accessor)) = primary_key.lookup() else {
        return record.id.ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("record has no id")
                .with_hint("Re-run with --primary-key handle or --primary-key title.")
        });
    };

    let value = accessor(record).ok_or_else(|| {
        Error::new(ErrorKind::NotFound).with_message(format!("record has no {primary_key}"))
    })?;
    let matches = api.find_products(field, value).map_err(|err| {
        Error::new(err.kind())
            .with_message(format!("can't find product with {primary_key} '{value}'"))
            .with_source(err)
    })?;
    match matches.as_slice() {
        [only] => Ok(only.id),
        [] => Err(Error::new(ErrorKind::NotFound)
            .with_message(format!("found no product with {primary_key} '{value}'"))),
        many => Err(Error::new(ErrorKind::Ambiguous).with_message(format!(
            "found {} products with {primary_key} '{value}'",
            many.len()
        ))),
    }
}

pub fn build_update(
    record: &ProductRecord,
    product_id: u64,
    options: &ImportOptions,
) -> ProductUpdate {
    let base = |value: &Option<String>| value.clone().filter(|_| !options.metafields_only);
    ProductUpdate {
        id: product_id,
        title: base(&record.title),
        body_html: base(&record.body_html),
        metafields_global_title_tag: base(&record.metafields_global_title_tag),
        metafields_global_description_tag: base(&record.metafields_global_description_tag),
        metafields: record
            .fields
            .iter()
            .map(|field| MetafieldUpdate {
                id: field.id,
                namespace: options.namespace.clone(),
                key: field.key.clone(),
                value: field.encode(),
                value_type: METAFIELD_TYPE.to_string(),
            })
            .collect(),
    }
}

pub fn import_bundle(
    api: &dyn ShopApi,
    bundle: &ExportBundle,
    options: &ImportOptions,
) -> ImportReport {
    let mut report = ImportReport::default();
    let total = bundle.products.len();
    for (index, record) in bundle.products.iter().enumerate() {
        let label = record.label();
        tracing::info!("importing product {} of {} ({label})", index + 1, total);

        let product_id = match resolve_target(api, record, options.primary_key) {
            Ok(product_id) => product_id,
            Err(reason) => {
                tracing::warn!(product = %label, error = %reason, "skipping record");
                report.skipped.push(SkippedRecord { label, reason });
                continue;
            }
        };
        if options.primary_key != PrimaryKey::Id {
            tracing::info!("{}: {label} => id: {product_id}", options.primary_key);
        }

        let update = build_update(record, product_id, options);
        match api.update_product(&update) {
            Ok(()) => report.updated.push(product_id),
            Err(reason) => {
                tracing::warn!(product = %label, product_id, error = %reason, "update failed");
                report.failed.push(FailedUpdate {
                    label,
                    product_id,
                    reason,
                });
            }
        }
    }
    report
}
