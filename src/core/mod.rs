// Core modules implementing the grid codec, the export bundle, and error modeling.
pub mod bundle;
pub mod error;
pub mod grid;
