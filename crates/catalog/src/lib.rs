pub mod catalog;
pub mod intent;

pub use catalog::{slug, CatalogEntry, CatalogType, EntityCatalog, EntityMention};
pub use intent::{classify, understand, Intent};
