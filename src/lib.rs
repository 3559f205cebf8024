//! Purpose: Library crate behind the `powereditor` CLI and its tests.
//! Exports: `core` (grid codec, bundle, errors), `api` (shop boundary), `config`,
//! `export`, `import`, `notice`.
//! Role: Keeps the grid transform and per-product assembly testable without a shop.
//! Invariants: Operations take explicit settings/options; there is no global state.
pub mod api;
pub mod config;
pub mod core;
pub mod export;
pub mod import;
pub mod notice;
