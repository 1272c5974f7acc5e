//! Template aggregate root.
//!
//! A template owns an ordered set of pages; each page owns an ordered
//! set of elements. All structural operations live here and run
//! against the abstract [`TemplateStore`], wrapped in the store's
//! transaction boundary so sequence invariants survive failures and
//! concurrent callers.
//!
//! Sequence values within a scope are 1-based and dense. The only
//! legal transitions are append at N+1, remove-and-compact, and an
//! adjacent pairwise swap; no operation may produce a gap or duplicate.

use chrono::Utc;
use uuid::Uuid;

use crate::element::ElementFactory;
use crate::error::{Error, Result};
use crate::render::{Canvas, RenderContext, RenderOptions};
use crate::store::traits::TemplateStore;
use crate::store::types::{
    ElementRecord, NewElement, NewPage, NewTemplate, PageMetricsUpdate, TemplateRecord,
};

/// Which kind of item a move addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Page,
    Element,
}

/// Direction of a move within the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Handle to one template aggregate.
#[derive(Debug, Clone)]
pub struct Template {
    id: Uuid,
    name: String,
    context_id: i64,
}

/// Run `f` inside the store's transaction boundary, rolling back on
/// any error.
fn with_tx<T>(
    store: &mut dyn TemplateStore,
    f: impl FnOnce(&mut dyn TemplateStore) -> Result<T>,
) -> Result<T> {
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            // Preserve the original failure even if rollback also fails.
            if let Err(rollback_err) = store.rollback() {
                log::error!("rollback failed after {}: {}", e, rollback_err);
            }
            Err(e)
        }
    }
}

/// Delete one element record, through its variant's teardown hook when
/// the variant is resolvable, or directly otherwise.
fn teardown_element(
    store: &mut dyn TemplateStore,
    factory: &ElementFactory,
    record: &ElementRecord,
) -> Result<()> {
    match factory.resolve(record) {
        Some(element) => element.delete(store),
        None => {
            // The variant is unavailable; remove the row without its
            // custom cleanup rather than failing.
            log::warn!(
                "element {} has unknown type '{}', deleting record directly",
                record.id,
                record.element_type
            );
            store.delete_element_row(record.id)
        }
    }
}

impl Template {
    /// Create a new template.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the name is empty.
    pub fn create(
        store: &mut dyn TemplateStore,
        name: impl Into<String>,
        context_id: i64,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Template name must not be empty".to_string(),
            ));
        }

        let id = store.insert_template(&NewTemplate::new(name.clone(), context_id))?;
        Ok(Self {
            id,
            name,
            context_id,
        })
    }

    /// Load an existing template.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no template has this id.
    pub fn load(store: &dyn TemplateStore, id: Uuid) -> Result<Self> {
        let record = store
            .get_template(id)?
            .ok_or_else(|| Error::NotFound(format!("Template {}", id)))?;
        Ok(Self::from_record(&record))
    }

    /// Build a handle from an already-fetched record.
    pub fn from_record(record: &TemplateRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            context_id: record.context_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_id(&self) -> i64 {
        self.context_id
    }

    /// Rename the template and touch its modification timestamp. No
    /// structural effect.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the template row no longer exists,
    /// `Error::InvalidInput` if the name is empty.
    pub fn save(&mut self, store: &mut dyn TemplateStore, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Template name must not be empty".to_string(),
            ));
        }
        let id = self.id;
        with_tx(store, |s| {
            if s.get_template(id)?.is_none() {
                return Err(Error::NotFound(format!("Template {}", id)));
            }
            s.update_template_name(id, &name, Utc::now())
        })?;
        self.name = name;
        Ok(())
    }

    /// Append a new page with default metrics.
    ///
    /// The new page's sequence is one past the current maximum (1 for
    /// an empty template). Runs in a transaction so concurrent callers
    /// never compute the same next sequence.
    ///
    /// # Returns
    ///
    /// Returns the id of the new page.
    pub fn add_page(&self, store: &mut dyn TemplateStore) -> Result<Uuid> {
        let template_id = self.id;
        with_tx(store, |s| {
            let sequence = s.max_page_sequence(template_id)?.unwrap_or(0) + 1;
            s.insert_page(&NewPage::new(template_id, sequence))
        })
    }

    /// Apply a bulk per-page metrics update.
    ///
    /// Pages of this template absent from `updates` are left unchanged.
    /// Updates addressing pages that do not belong to this template are
    /// silently ignored, mirroring how form-driven callers resubmit
    /// stale page ids.
    pub fn save_pages(
        &self,
        store: &mut dyn TemplateStore,
        updates: &[PageMetricsUpdate],
    ) -> Result<()> {
        let template_id = self.id;
        with_tx(store, |s| {
            let now = Utc::now();
            for page in s.list_pages(template_id)? {
                if let Some(update) = updates.iter().find(|u| u.page_id == page.id) {
                    s.update_page_metrics(page.id, &update.metrics, now)?;
                }
            }
            Ok(())
        })
    }

    /// Append a new element to a page of this template.
    ///
    /// The element enters the page's sequence at max+1.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the page does not exist or belongs
    /// to another template.
    pub fn add_element(
        &self,
        store: &mut dyn TemplateStore,
        page_id: Uuid,
        element_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<Uuid> {
        let template_id = self.id;
        let element_type = element_type.into();
        with_tx(store, |s| {
            let page = s
                .get_page(page_id)?
                .filter(|p| p.template_id == template_id)
                .ok_or_else(|| Error::NotFound(format!("Page {}", page_id)))?;

            let sequence = s.max_element_sequence(page.id)?.unwrap_or(0) + 1;
            s.insert_element(&NewElement::new(page.id, element_type, data, sequence))
        })
    }

    /// Replace an element's payload and touch its modification
    /// timestamp. The type tag and sequence are untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the element does not exist.
    pub fn save_element(
        &self,
        store: &mut dyn TemplateStore,
        element_id: Uuid,
        data: serde_json::Value,
    ) -> Result<()> {
        with_tx(store, |s| {
            let record = s
                .get_element(element_id)?
                .ok_or_else(|| Error::NotFound(format!("Element {}", element_id)))?;

            s.update_element_data(record.id, &data, Utc::now())
        })
    }

    /// Delete a page, its elements, and close the sequence gap among
    /// the sibling pages.
    ///
    /// Element variants get their custom teardown; the per-element
    /// sequence compaction is skipped since the whole page goes away.
    /// Atomic: a failing teardown rolls the whole deletion back.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the page does not exist or belongs
    /// to another template.
    pub fn delete_page(
        &self,
        store: &mut dyn TemplateStore,
        factory: &ElementFactory,
        page_id: Uuid,
    ) -> Result<()> {
        let template_id = self.id;
        with_tx(store, |s| {
            let page = s
                .get_page(page_id)?
                .filter(|p| p.template_id == template_id)
                .ok_or_else(|| Error::NotFound(format!("Page {}", page_id)))?;

            for record in s.list_elements(page.id)? {
                teardown_element(s, factory, &record)?;
            }

            s.delete_page_row(page.id)?;
            s.close_page_gap(template_id, page.sequence)?;
            Ok(())
        })
    }

    /// Delete an element and close the sequence gap among its sibling
    /// elements.
    ///
    /// The variant's teardown hook runs when resolvable; otherwise the
    /// record is removed directly.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the element does not exist.
    pub fn delete_element(
        &self,
        store: &mut dyn TemplateStore,
        factory: &ElementFactory,
        element_id: Uuid,
    ) -> Result<()> {
        with_tx(store, |s| {
            let record = s
                .get_element(element_id)?
                .ok_or_else(|| Error::NotFound(format!("Element {}", element_id)))?;

            teardown_element(s, factory, &record)?;
            s.close_element_gap(record.page_id, record.sequence)?;
            Ok(())
        })
    }

    /// Delete this template and everything it owns.
    ///
    /// The cascade is explicit and bottom-up: every element (with its
    /// variant teardown, no renumbering), then every page, then the
    /// template row, all inside one transaction. If any descendant
    /// deletion fails the transaction rolls back and the template row
    /// survives.
    pub fn delete(self, store: &mut dyn TemplateStore, factory: &ElementFactory) -> Result<()> {
        let template_id = self.id;
        with_tx(store, |s| {
            for page in s.list_pages(template_id)? {
                for record in s.list_elements(page.id)? {
                    teardown_element(s, factory, &record)?;
                }
                s.delete_page_row(page.id)?;
            }
            s.delete_template_row(template_id)?;
            Ok(())
        })
    }

    /// Duplicate every page and element of this template under another
    /// template, preserving sequence order exactly.
    ///
    /// Each duplicated element's variant gets its copy hook, with the
    /// source record as the data source. A hook reporting failure
    /// discards that one duplicate; the rest of the copy proceeds and
    /// the surviving duplicates stay densely numbered.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the target template does not exist.
    pub fn copy_to(
        &self,
        store: &mut dyn TemplateStore,
        factory: &ElementFactory,
        target_template_id: Uuid,
    ) -> Result<()> {
        let source_template_id = self.id;
        with_tx(store, |s| {
            if s.get_template(target_template_id)?.is_none() {
                return Err(Error::NotFound(format!(
                    "Template {}",
                    target_template_id
                )));
            }

            for page in s.list_pages(source_template_id)? {
                let new_page_id = s.insert_page(
                    &NewPage::new(target_template_id, page.sequence).with_metrics(page.metrics()),
                )?;

                // Duplicates are numbered as they are kept; a refused
                // copy reuses its sequence slot so no gap is left.
                let mut next_sequence = 1;
                for source in s.list_elements(page.id)? {
                    let new_element_id = s.insert_element(&NewElement::new(
                        new_page_id,
                        source.element_type.clone(),
                        source.data.clone(),
                        next_sequence,
                    ))?;

                    let duplicate = s.get_element(new_element_id)?.ok_or_else(|| {
                        Error::Storage(format!(
                            "Duplicated element {} missing after insert",
                            new_element_id
                        ))
                    })?;

                    if let Some(element) = factory.resolve(&duplicate) {
                        if !element.copy_element(s, &source)? {
                            // The hook refused the copy: discard just
                            // this duplicate and carry on.
                            log::warn!(
                                "copy hook refused element {} ({}), discarding duplicate",
                                source.id,
                                source.element_type
                            );
                            element.delete(s)?;
                            continue;
                        }
                    }
                    next_sequence += 1;
                }
            }
            Ok(())
        })
    }

    /// Move a page or element one position up or down by swapping
    /// sequence values with the adjacent sibling.
    ///
    /// Moving the first item up or the last item down is a silent
    /// no-op: nothing is mutated. A missing item id is also a no-op,
    /// matching the boundary policy.
    pub fn move_item(
        &self,
        store: &mut dyn TemplateStore,
        kind: MoveKind,
        item_id: Uuid,
        direction: MoveDirection,
    ) -> Result<()> {
        let template_id = self.id;
        with_tx(store, |s| match kind {
            MoveKind::Page => {
                let Some(page) = s.get_page(item_id)?.filter(|p| p.template_id == template_id)
                else {
                    return Ok(());
                };
                let Some(target) = target_sequence(page.sequence, direction) else {
                    return Ok(());
                };
                if let Some(swap) = s.page_at_sequence(template_id, target)? {
                    s.set_page_sequence(page.id, swap.sequence)?;
                    s.set_page_sequence(swap.id, page.sequence)?;
                }
                Ok(())
            }
            MoveKind::Element => {
                let Some(element) = s.get_element(item_id)? else {
                    return Ok(());
                };
                let Some(target) = target_sequence(element.sequence, direction) else {
                    return Ok(());
                };
                if let Some(swap) = s.element_at_sequence(element.page_id, target)? {
                    s.set_element_sequence(element.id, swap.sequence)?;
                    s.set_element_sequence(swap.id, element.sequence)?;
                }
                Ok(())
            }
        })
    }

    /// Render this template into the supplied canvas.
    ///
    /// Walks pages in ascending sequence order and each page's elements
    /// in ascending sequence order, emitting draw commands. Elements
    /// with an unresolvable variant are skipped, never fatal. Reads are
    /// not snapshot-isolated: a render racing a structural edit may
    /// observe it mid-walk, which is acceptable for preview use.
    ///
    /// # Returns
    ///
    /// Returns the assembled document bytes with `OutputMode::Return`,
    /// `None` with `OutputMode::Stream`.
    pub fn render(
        &self,
        store: &dyn TemplateStore,
        factory: &ElementFactory,
        canvas: &mut dyn Canvas,
        options: &RenderOptions,
    ) -> Result<Option<Vec<u8>>> {
        for page in store.list_pages(self.id)? {
            canvas.begin_page(&page.metrics())?;

            for record in store.list_elements(page.id)? {
                match factory.resolve(&record) {
                    Some(element) => {
                        let ctx = RenderContext {
                            preview: options.preview,
                            subject: options.subject.as_ref(),
                            page: &page,
                        };
                        element.render(canvas, &ctx)?;
                    }
                    None => {
                        log::warn!(
                            "skipping element {} with unknown type '{}'",
                            record.id,
                            record.element_type
                        );
                    }
                }
            }
        }

        canvas.finish(options.output)
    }
}

/// The sequence the moved item wants to occupy, or `None` at the
/// boundary (moving the first item up).
fn target_sequence(sequence: u32, direction: MoveDirection) -> Option<u32> {
    match direction {
        MoveDirection::Up => sequence.checked_sub(1).filter(|&s| s >= 1),
        MoveDirection::Down => Some(sequence + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_create_rejects_empty_name() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            Template::create(&mut store, "  ", 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_load_missing_template_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            Template::load(&store, Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_save_renames_and_touches() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut template = Template::create(&mut store, "Before", 1).unwrap();

        template.save(&mut store, "After").unwrap();
        assert_eq!(template.name(), "After");

        let record = store.get_template(template.id()).unwrap().unwrap();
        assert_eq!(record.name, "After");
        assert!(record.modified_at >= record.created_at);
    }

    #[test]
    fn test_save_after_row_deleted_is_not_found() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut template = Template::create(&mut store, "Doomed", 1).unwrap();
        store.delete_template_row(template.id()).unwrap();

        assert!(matches!(
            template.save(&mut store, "New name"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_target_sequence_boundaries() {
        assert_eq!(target_sequence(1, MoveDirection::Up), None);
        assert_eq!(target_sequence(2, MoveDirection::Up), Some(1));
        assert_eq!(target_sequence(3, MoveDirection::Down), Some(4));
    }

    #[test]
    fn test_save_element_replaces_payload_only() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let template = Template::create(&mut store, "T1", 1).unwrap();
        let page = template.add_page(&mut store).unwrap();
        let element = template
            .add_element(
                &mut store,
                page,
                "text",
                serde_json::json!({"content": "before", "y": 1.0}),
            )
            .unwrap();

        template
            .save_element(
                &mut store,
                element,
                serde_json::json!({"content": "after", "y": 2.0}),
            )
            .unwrap();

        let record = store.get_element(element).unwrap().unwrap();
        assert_eq!(record.data["content"], "after");
        assert_eq!(record.element_type, "text");
        assert_eq!(record.sequence, 1);

        assert!(matches!(
            template.save_element(&mut store, Uuid::new_v4(), serde_json::json!({})),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_add_element_rejects_foreign_page() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let template = Template::create(&mut store, "Mine", 1).unwrap();
        let other = Template::create(&mut store, "Theirs", 1).unwrap();
        let foreign_page = other.add_page(&mut store).unwrap();

        let result = template.add_element(
            &mut store,
            foreign_page,
            "text",
            serde_json::json!({"content": "x", "y": 1.0}),
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
