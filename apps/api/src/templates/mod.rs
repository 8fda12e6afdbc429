// Template Cache: compiled Handlebars templates and embedded font assets,
// both populated once per key and read-only afterwards.

pub mod assets;
pub mod cache;
pub mod helpers;
pub mod once_map;

pub use assets::{AssetStore, RenderAsset};
pub use cache::{CompiledTemplate, TemplateCache};
