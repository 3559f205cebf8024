//! Purpose: Define the shop API boundary used by export and import.
//! Exports: `ShopApi`, `LookupField`, resource types, `ShopifyClient`, `MemoryShop`.
//! Role: Narrow contract over the remote product/metafield REST API.
//! Invariants: Export/import code only talks to the shop through `ShopApi`.
//! Invariants: Implementations never retry; callers decide what a failure means.

mod memory;
mod resource;
mod shopify;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use memory::MemoryShop;
pub use resource::{Metafield, MetafieldUpdate, Product, ProductUpdate};
pub use shopify::{DEFAULT_API_VERSION, ShopifyClient};

pub type ApiResult<T> = Result<T, Error>;

/// Product fields the shop can filter a product listing by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupField {
    Handle,
    Title,
}

impl LookupField {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupField::Handle => "handle",
            LookupField::Title => "title",
        }
    }
}

pub trait ShopApi {
    /// Lists every product of a collection, following pagination to the end.
    fn collection_products(&self, collection_id: u64, fields: &[&str]) -> ApiResult<Vec<Product>>;

    fn product_metafields(&self, product_id: u64, namespace: &str) -> ApiResult<Vec<Metafield>>;

    /// Lists products whose `field` equals `value`; zero or many matches are not errors.
    fn find_products(&self, field: LookupField, value: &str) -> ApiResult<Vec<Product>>;

    /// Edits core fields and attached metafields of one product in a single call.
    fn update_product(&self, update: &ProductUpdate) -> ApiResult<()>;
}
