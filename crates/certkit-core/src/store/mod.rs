//! Storage layer: the `TemplateStore` trait, record types, and the
//! SQLite backend.

mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteStore;
pub use traits::TemplateStore;
pub use types::{
    ElementRecord, NewElement, NewPage, NewTemplate, PageMetrics, PageMetricsUpdate, PageRecord,
    TemplateRecord,
};
