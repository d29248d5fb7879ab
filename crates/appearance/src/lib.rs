#![doc(html_no_source)]

mod appearance;
pub use appearance::Appearance;

// Reexport all crates
pub use appearance_asset_database;
pub use appearance_model;
pub use appearance_model_import;
pub use appearance_profiling;
pub use appearance_texture;
