//! Core data types for the storage layer.
//!
//! These types mirror the persisted rows: templates own ordered pages,
//! pages own ordered elements. Sequence values are 1-based and dense
//! within their parent scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted template record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Unique identifier, assigned once at creation
    pub id: Uuid,

    /// User-facing name (non-empty)
    pub name: String,

    /// Immutable ownership/scoping reference (opaque to the core)
    pub context_id: i64,

    /// When this template was created
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

/// Layout metrics for a page, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub width: f64,
    pub height: f64,
    pub left_margin: f64,
    pub right_margin: f64,
}

impl Default for PageMetrics {
    /// A4 portrait with no margins.
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            left_margin: 0.0,
            right_margin: 0.0,
        }
    }
}

/// A persisted page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Owning template (back-reference, not ownership)
    pub template_id: Uuid,

    /// Page width in millimetres
    pub width: f64,

    /// Page height in millimetres
    pub height: f64,

    /// Left margin in millimetres
    pub left_margin: f64,

    /// Right margin in millimetres
    pub right_margin: f64,

    /// 1-based position within the template; dense and unique per template
    pub sequence: u32,

    /// When this page was created
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl PageRecord {
    /// The layout metrics of this page.
    pub fn metrics(&self) -> PageMetrics {
        PageMetrics {
            width: self.width,
            height: self.height,
            left_margin: self.left_margin,
            right_margin: self.right_margin,
        }
    }
}

/// A persisted element record.
///
/// The record carries no behavior, only data; the behavior associated
/// with `element_type` is resolved through the element factory at the
/// moment it is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Owning page (back-reference)
    pub page_id: Uuid,

    /// Type tag selecting polymorphic behavior; immutable after creation
    pub element_type: String,

    /// Opaque per-type payload
    pub data: serde_json::Value,

    /// 1-based position within the page; dense and unique per page
    pub sequence: u32,

    /// When this element was created
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

/// Builder for creating new templates.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    /// User-facing name
    pub name: String,

    /// Ownership/scoping reference
    pub context_id: i64,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, context_id: i64) -> Self {
        Self {
            name: name.into(),
            context_id,
        }
    }
}

/// Builder for creating new pages.
///
/// The sequence is computed by the caller (the template aggregate);
/// the storage layer inserts it verbatim.
#[derive(Debug, Clone)]
pub struct NewPage {
    /// Owning template
    pub template_id: Uuid,

    /// Layout metrics
    pub metrics: PageMetrics,

    /// 1-based position within the template
    pub sequence: u32,
}

impl NewPage {
    pub fn new(template_id: Uuid, sequence: u32) -> Self {
        Self {
            template_id,
            metrics: PageMetrics::default(),
            sequence,
        }
    }

    pub fn with_metrics(mut self, metrics: PageMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Builder for creating new elements.
#[derive(Debug, Clone)]
pub struct NewElement {
    /// Owning page
    pub page_id: Uuid,

    /// Type tag (immutable after creation)
    pub element_type: String,

    /// Opaque per-type payload
    pub data: serde_json::Value,

    /// 1-based position within the page
    pub sequence: u32,
}

impl NewElement {
    pub fn new(
        page_id: Uuid,
        element_type: impl Into<String>,
        data: serde_json::Value,
        sequence: u32,
    ) -> Self {
        Self {
            page_id,
            element_type: element_type.into(),
            data,
            sequence,
        }
    }
}

/// A single per-page metrics update within a bulk page save.
#[derive(Debug, Clone)]
pub struct PageMetricsUpdate {
    /// Page addressed by this update
    pub page_id: Uuid,

    /// Replacement metrics
    pub metrics: PageMetrics,
}
