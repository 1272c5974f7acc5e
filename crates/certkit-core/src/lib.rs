//! # Certkit Core
//!
//! Core library for certkit - a certificate/document template engine.
//!
//! A template owns an ordered sequence of pages, each page owns an
//! ordered sequence of elements, and the whole structure renders into
//! an ordered stream of draw commands for an abstract canvas.
//!
//! ## Architecture
//!
//! - **store**: storage trait, record types and the SQLite backend
//! - **template**: the aggregate root and all structural operations
//! - **element**: polymorphic element behavior and the type registry
//! - **render**: canvas contract, draw primitives, render context

pub mod element;
pub mod error;
pub mod render;
pub mod store;
pub mod template;

pub use element::{Element, ElementFactory};
pub use error::{Error, Result};
pub use render::{Canvas, RecordingCanvas, RenderOptions, Subject};
pub use store::{SqliteStore, TemplateStore};
pub use template::{MoveDirection, MoveKind, Template};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
