//! Polymorphic element behavior.
//!
//! Element records carry only data; the behavior tied to an element's
//! type tag lives in an [`Element`] implementation resolved through the
//! [`ElementFactory`] at the moment it is needed. Unknown tags resolve
//! to `None`, never an error: callers fall back to safe defaults
//! (direct row deletion, skip during render, keep payload on copy) so
//! a store written by a build with extra variants stays usable.

mod date;
mod image;
mod line;
mod text;

pub use date::DateElement;
pub use image::ImageElement;
pub use line::LineElement;
pub use text::TextElement;

use std::collections::HashMap;

use crate::error::Result;
use crate::render::{Canvas, RenderContext};
use crate::store::traits::TemplateStore;
use crate::store::types::ElementRecord;

/// Behavior contract for one element variant.
pub trait Element {
    /// The persisted record this instance was resolved from.
    fn record(&self) -> &ElementRecord;

    /// Remove this element, including its persisted record.
    ///
    /// Variants with external resources override this to release them
    /// first; the default just removes the row.
    fn delete(&self, store: &mut dyn TemplateStore) -> Result<()> {
        store.delete_element_row(self.record().id)
    }

    /// Adapt this freshly duplicated element's payload, using the
    /// source record it was copied from.
    ///
    /// Returning `Ok(false)` tells the caller to discard the duplicate.
    /// The default keeps the copied payload as-is.
    fn copy_element(
        &self,
        _store: &mut dyn TemplateStore,
        _source: &ElementRecord,
    ) -> Result<bool> {
        Ok(true)
    }

    /// Emit this element's draw commands.
    fn render(&self, canvas: &mut dyn Canvas, ctx: &RenderContext<'_>) -> Result<()>;
}

/// Constructor producing an element instance from its persisted record.
pub type ElementCtor = fn(ElementRecord) -> Box<dyn Element>;

/// Registry resolving type tags to element behavior.
pub struct ElementFactory {
    registry: HashMap<String, ElementCtor>,
}

impl ElementFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// A registry with the built-in variants (`text`, `image`, `line`,
    /// `date`) registered.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register("text", text::construct);
        factory.register("image", image::construct);
        factory.register("line", line::construct);
        factory.register("date", date::construct);
        factory
    }

    /// Register a constructor for a type tag, replacing any previous one.
    pub fn register(&mut self, element_type: impl Into<String>, ctor: ElementCtor) {
        self.registry.insert(element_type.into(), ctor);
    }

    /// Resolve a record's type tag to a behavior instance.
    ///
    /// Returns `None` when the tag is unknown; callers must treat that
    /// as "perform safe fallback", never as fatal.
    pub fn resolve(&self, record: &ElementRecord) -> Option<Box<dyn Element>> {
        self.registry
            .get(record.element_type.as_str())
            .map(|ctor| ctor(record.clone()))
    }

    /// The registered type tags, unordered.
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(element_type: &str) -> ElementRecord {
        ElementRecord {
            id: Uuid::new_v4(),
            page_id: Uuid::new_v4(),
            element_type: element_type.to_string(),
            data: serde_json::json!({}),
            sequence: 1,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn test_builtins_resolve() {
        let factory = ElementFactory::with_builtins();
        for tag in ["text", "image", "line", "date"] {
            assert!(factory.resolve(&record(tag)).is_some(), "{} missing", tag);
        }
    }

    #[test]
    fn test_registered_types_lists_builtins() {
        let factory = ElementFactory::with_builtins();
        let mut types: Vec<&str> = factory.registered_types().collect();
        types.sort_unstable();
        assert_eq!(types, vec!["date", "image", "line", "text"]);
    }

    #[test]
    fn test_unknown_tag_resolves_to_none() {
        let factory = ElementFactory::with_builtins();
        assert!(factory.resolve(&record("hologram")).is_none());
    }

    #[test]
    fn test_empty_factory_resolves_nothing() {
        let factory = ElementFactory::new();
        assert!(factory.resolve(&record("text")).is_none());
    }
}
