//! Storage trait definition.
//!
//! The `TemplateStore` trait defines the interface that all storage
//! backends must implement. The core aggregate logic (sequencing,
//! cascades, copies) is written against this abstraction and never
//! touches a concrete database directly.
//!
//! Reads take `&self`; structural mutations take `&mut self`, so all
//! sequence-mutating operations on one store handle are serialized by
//! the borrow checker. Multi-step operations are bracketed by the
//! transaction methods, which the backend must make atomic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    ElementRecord, NewElement, NewPage, NewTemplate, PageMetrics, PageRecord, TemplateRecord,
};
use crate::error::Result;

/// Storage interface for template, page and element records.
///
/// All implementations must ensure:
/// - Inserted ids are unique and never reused
/// - `list_pages`/`list_elements` return rows in ascending sequence order
/// - Everything between `begin` and `commit` is applied atomically, and
///   `rollback` discards it entirely
pub trait TemplateStore: Send + Sync {
    // --- Transaction boundary ---

    /// Begin an exclusive transaction.
    ///
    /// While the transaction is open, no other writer may mutate the
    /// store. Transactions do not nest.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction, discarding its writes.
    fn rollback(&mut self) -> Result<()>;

    // --- Template operations ---

    /// Insert a new template row.
    ///
    /// # Returns
    ///
    /// Returns the UUID of the created template.
    fn insert_template(&mut self, template: &NewTemplate) -> Result<Uuid>;

    /// Get a template by ID.
    ///
    /// Returns `Ok(Some(record))` if found, `Ok(None)` if not found.
    fn get_template(&self, id: Uuid) -> Result<Option<TemplateRecord>>;

    /// List all templates, newest first.
    fn list_templates(&self) -> Result<Vec<TemplateRecord>>;

    /// Update a template's name and modification timestamp.
    fn update_template_name(
        &mut self,
        id: Uuid,
        name: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete a template row.
    ///
    /// Child pages and elements are not touched; cascading is the
    /// aggregate's responsibility.
    fn delete_template_row(&mut self, id: Uuid) -> Result<()>;

    // --- Page operations ---

    /// Insert a new page row with the sequence given by the caller.
    fn insert_page(&mut self, page: &NewPage) -> Result<Uuid>;

    /// Get a page by ID.
    fn get_page(&self, id: Uuid) -> Result<Option<PageRecord>>;

    /// List the pages of a template in ascending sequence order.
    fn list_pages(&self, template_id: Uuid) -> Result<Vec<PageRecord>>;

    /// Get the page of a template holding the given sequence, if any.
    fn page_at_sequence(&self, template_id: Uuid, sequence: u32) -> Result<Option<PageRecord>>;

    /// The highest page sequence for a template, or `None` when the
    /// template has no pages.
    fn max_page_sequence(&self, template_id: Uuid) -> Result<Option<u32>>;

    /// Update a page's layout metrics and modification timestamp.
    fn update_page_metrics(
        &mut self,
        id: Uuid,
        metrics: &PageMetrics,
        modified_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Set a page's sequence value directly (used for adjacent swaps).
    fn set_page_sequence(&mut self, id: Uuid, sequence: u32) -> Result<()>;

    /// Decrement by one the sequence of every page of `template_id`
    /// whose sequence is greater than `deleted_sequence`.
    ///
    /// # Returns
    ///
    /// Returns the number of rows affected.
    fn close_page_gap(&mut self, template_id: Uuid, deleted_sequence: u32) -> Result<usize>;

    /// Delete a page row. Child elements are not touched.
    fn delete_page_row(&mut self, id: Uuid) -> Result<()>;

    // --- Element operations ---

    /// Insert a new element row with the sequence given by the caller.
    fn insert_element(&mut self, element: &NewElement) -> Result<Uuid>;

    /// Get an element by ID.
    fn get_element(&self, id: Uuid) -> Result<Option<ElementRecord>>;

    /// List the elements of a page in ascending sequence order.
    fn list_elements(&self, page_id: Uuid) -> Result<Vec<ElementRecord>>;

    /// Get the element of a page holding the given sequence, if any.
    fn element_at_sequence(&self, page_id: Uuid, sequence: u32) -> Result<Option<ElementRecord>>;

    /// The highest element sequence for a page, or `None` when the page
    /// has no elements.
    fn max_element_sequence(&self, page_id: Uuid) -> Result<Option<u32>>;

    /// Replace an element's payload and modification timestamp.
    fn update_element_data(
        &mut self,
        id: Uuid,
        data: &serde_json::Value,
        modified_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Set an element's sequence value directly (used for adjacent swaps).
    fn set_element_sequence(&mut self, id: Uuid, sequence: u32) -> Result<()>;

    /// Decrement by one the sequence of every element of `page_id`
    /// whose sequence is greater than `deleted_sequence`.
    ///
    /// # Returns
    ///
    /// Returns the number of rows affected.
    fn close_element_gap(&mut self, page_id: Uuid, deleted_sequence: u32) -> Result<usize>;

    /// Delete an element row.
    fn delete_element_row(&mut self, id: Uuid) -> Result<()>;

    // --- Maintenance operations ---

    /// Check sequence integrity across the whole store.
    ///
    /// Verifies that page sequences within every template and element
    /// sequences within every page form exactly {1..N} with no gaps or
    /// duplicates.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` describing the first violation found.
    fn check_integrity(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the trait contract exists
    // Actual implementations will be tested in their own modules

    #[test]
    fn test_trait_definition_compiles() {
        // This test simply ensures the trait definition is valid
        // and can be used as a trait bound
        fn _accepts_template_store<T: TemplateStore>(_store: T) {}
    }
}
