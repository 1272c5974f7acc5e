//! SQLite storage backend.
//!
//! Stores templates, pages and elements in a single SQLite database,
//! either file-backed or in memory. All access goes through one
//! connection behind a mutex; structural mutations additionally take
//! `&mut self`, so a store handle never interleaves writers.
//!
//! Sequence values carry no UNIQUE constraint at the schema level: an
//! adjacent swap updates the two rows in separate statements and would
//! trip a per-statement constraint mid-swap. Density and uniqueness are
//! enforced by the aggregate logic and verified by `check_integrity`.

mod row;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::traits::TemplateStore;
use crate::store::types::{
    ElementRecord, NewElement, NewPage, NewTemplate, PageMetrics, PageRecord, TemplateRecord,
};

use row::{ElementRow, PageRow, TemplateRow};

const FORMAT_VERSION: &str = "0.1";

const SCHEMA: &str = r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    context_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE pages (
    id TEXT PRIMARY KEY,
    template_id TEXT NOT NULL,
    width REAL NOT NULL,
    height REAL NOT NULL,
    left_margin REAL NOT NULL,
    right_margin REAL NOT NULL,
    sequence INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,

    FOREIGN KEY(template_id) REFERENCES templates(id)
);

CREATE INDEX pages_by_template ON pages(template_id, sequence);

CREATE TABLE elements (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL,
    element_type TEXT NOT NULL,
    data_json TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,

    FOREIGN KEY(page_id) REFERENCES pages(id)
);

CREATE INDEX elements_by_page ON elements(page_id, sequence);
"#;

/// SQLite-backed template store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file already exists or the
    /// schema cannot be initialized.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::Storage(format!(
                "Store file already exists: {}",
                path.display()
            )));
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing store.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no file exists at the path, or
    /// `Error::Storage` if the file is not a certkit store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Store file not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let format_version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|_| Error::Storage("Not a certkit store".to_string()))?;
        if format_version.is_none() {
            return Err(Error::Storage("Not a certkit store".to_string()));
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory store (used by tests and previews).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let created_at = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["format_version", FORMAT_VERSION],
        )?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["created_at", &created_at],
        )?;

        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("SQLite connection poisoned".to_string()))
    }
}

fn page_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRow> {
    Ok(PageRow {
        id: row.get(0)?,
        template_id: row.get(1)?,
        width: row.get(2)?,
        height: row.get(3)?,
        left_margin: row.get(4)?,
        right_margin: row.get(5)?,
        sequence: row.get(6)?,
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
    })
}

fn element_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ElementRow> {
    Ok(ElementRow {
        id: row.get(0)?,
        page_id: row.get(1)?,
        element_type: row.get(2)?,
        data_json: row.get(3)?,
        sequence: row.get(4)?,
        created_at: row.get(5)?,
        modified_at: row.get(6)?,
    })
}

const PAGE_COLUMNS: &str =
    "id, template_id, width, height, left_margin, right_margin, sequence, created_at, modified_at";

const ELEMENT_COLUMNS: &str =
    "id, page_id, element_type, data_json, sequence, created_at, modified_at";

impl TemplateStore for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn insert_template(&mut self, template: &NewTemplate) -> Result<Uuid> {
        let conn = self.lock_conn()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO templates (id, name, context_id, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &template.name,
                template.context_id,
                &now,
                &now,
            ),
        )?;

        Ok(id)
    }

    fn get_template(&self, id: Uuid) -> Result<Option<TemplateRecord>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            "SELECT id, name, context_id, created_at, modified_at
             FROM templates WHERE id = ?",
            [id.to_string()],
            |row| {
                Ok(TemplateRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    context_id: row.get(2)?,
                    created_at: row.get(3)?,
                    modified_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_templates(&self) -> Result<Vec<TemplateRecord>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, context_id, created_at, modified_at
             FROM templates ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TemplateRow {
                id: row.get(0)?,
                name: row.get(1)?,
                context_id: row.get(2)?,
                created_at: row.get(3)?,
                modified_at: row.get(4)?,
            })
        })?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?.try_into()?);
        }

        Ok(templates)
    }

    fn update_template_name(
        &mut self,
        id: Uuid,
        name: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            "UPDATE templates SET name = ?, modified_at = ? WHERE id = ?",
            (name, modified_at.to_rfc3339(), id.to_string()),
        )?;

        Ok(())
    }

    fn delete_template_row(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM templates WHERE id = ?", [id.to_string()])?;
        Ok(())
    }

    fn insert_page(&mut self, page: &NewPage) -> Result<Uuid> {
        let conn = self.lock_conn()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO pages (id, template_id, width, height, left_margin, right_margin,
                                sequence, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                page.template_id.to_string(),
                page.metrics.width,
                page.metrics.height,
                page.metrics.left_margin,
                page.metrics.right_margin,
                page.sequence,
                &now,
                &now,
            ),
        )?;

        Ok(id)
    }

    fn get_page(&self, id: Uuid) -> Result<Option<PageRecord>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS),
            [id.to_string()],
            page_from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_pages(&self, template_id: Uuid) -> Result<Vec<PageRecord>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pages WHERE template_id = ? ORDER BY sequence ASC",
            PAGE_COLUMNS
        ))?;
        let rows = stmt.query_map([template_id.to_string()], page_from_row)?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?.try_into()?);
        }

        Ok(pages)
    }

    fn page_at_sequence(&self, template_id: Uuid, sequence: u32) -> Result<Option<PageRecord>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM pages WHERE template_id = ? AND sequence = ?",
                PAGE_COLUMNS
            ),
            (template_id.to_string(), sequence),
            page_from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn max_page_sequence(&self, template_id: Uuid) -> Result<Option<u32>> {
        let conn = self.lock_conn()?;

        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sequence) FROM pages WHERE template_id = ?",
            [template_id.to_string()],
            |row| row.get(0),
        )?;

        match max {
            Some(value) => {
                let sequence = u32::try_from(value).map_err(|_| {
                    Error::Storage(format!("Invalid sequence value: {}", value))
                })?;
                Ok(Some(sequence))
            }
            None => Ok(None),
        }
    }

    fn update_page_metrics(
        &mut self,
        id: Uuid,
        metrics: &PageMetrics,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            "UPDATE pages SET width = ?, height = ?, left_margin = ?, right_margin = ?,
                              modified_at = ?
             WHERE id = ?",
            (
                metrics.width,
                metrics.height,
                metrics.left_margin,
                metrics.right_margin,
                modified_at.to_rfc3339(),
                id.to_string(),
            ),
        )?;

        Ok(())
    }

    fn set_page_sequence(&mut self, id: Uuid, sequence: u32) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE pages SET sequence = ? WHERE id = ?",
            (sequence, id.to_string()),
        )?;
        Ok(())
    }

    fn close_page_gap(&mut self, template_id: Uuid, deleted_sequence: u32) -> Result<usize> {
        let conn = self.lock_conn()?;

        let affected = conn.execute(
            "UPDATE pages SET sequence = sequence - 1
             WHERE template_id = ? AND sequence > ?",
            (template_id.to_string(), deleted_sequence),
        )?;

        Ok(affected)
    }

    fn delete_page_row(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM pages WHERE id = ?", [id.to_string()])?;
        Ok(())
    }

    fn insert_element(&mut self, element: &NewElement) -> Result<Uuid> {
        let conn = self.lock_conn()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let data_json = serde_json::to_string(&element.data)
            .map_err(|e| Error::Storage(format!("Failed to serialize element payload: {}", e)))?;
        conn.execute(
            "INSERT INTO elements (id, page_id, element_type, data_json, sequence,
                                   created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                element.page_id.to_string(),
                &element.element_type,
                data_json,
                element.sequence,
                &now,
                &now,
            ),
        )?;

        Ok(id)
    }

    fn get_element(&self, id: Uuid) -> Result<Option<ElementRecord>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM elements WHERE id = ?", ELEMENT_COLUMNS),
            [id.to_string()],
            element_from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_elements(&self, page_id: Uuid) -> Result<Vec<ElementRecord>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM elements WHERE page_id = ? ORDER BY sequence ASC",
            ELEMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([page_id.to_string()], element_from_row)?;

        let mut elements = Vec::new();
        for row in rows {
            elements.push(row?.try_into()?);
        }

        Ok(elements)
    }

    fn element_at_sequence(&self, page_id: Uuid, sequence: u32) -> Result<Option<ElementRecord>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM elements WHERE page_id = ? AND sequence = ?",
                ELEMENT_COLUMNS
            ),
            (page_id.to_string(), sequence),
            element_from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn max_element_sequence(&self, page_id: Uuid) -> Result<Option<u32>> {
        let conn = self.lock_conn()?;

        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sequence) FROM elements WHERE page_id = ?",
            [page_id.to_string()],
            |row| row.get(0),
        )?;

        match max {
            Some(value) => {
                let sequence = u32::try_from(value).map_err(|_| {
                    Error::Storage(format!("Invalid sequence value: {}", value))
                })?;
                Ok(Some(sequence))
            }
            None => Ok(None),
        }
    }

    fn update_element_data(
        &mut self,
        id: Uuid,
        data: &serde_json::Value,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;

        let data_json = serde_json::to_string(data)
            .map_err(|e| Error::Storage(format!("Failed to serialize element payload: {}", e)))?;
        conn.execute(
            "UPDATE elements SET data_json = ?, modified_at = ? WHERE id = ?",
            (data_json, modified_at.to_rfc3339(), id.to_string()),
        )?;

        Ok(())
    }

    fn set_element_sequence(&mut self, id: Uuid, sequence: u32) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE elements SET sequence = ? WHERE id = ?",
            (sequence, id.to_string()),
        )?;
        Ok(())
    }

    fn close_element_gap(&mut self, page_id: Uuid, deleted_sequence: u32) -> Result<usize> {
        let conn = self.lock_conn()?;

        let affected = conn.execute(
            "UPDATE elements SET sequence = sequence - 1
             WHERE page_id = ? AND sequence > ?",
            (page_id.to_string(), deleted_sequence),
        )?;

        Ok(affected)
    }

    fn delete_element_row(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM elements WHERE id = ?", [id.to_string()])?;
        Ok(())
    }

    fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        // Page sequences per template.
        let mut stmt = conn.prepare(
            "SELECT template_id, sequence FROM pages ORDER BY template_id, sequence ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        verify_dense("template", rows)?;

        // Element sequences per page.
        let mut stmt = conn
            .prepare("SELECT page_id, sequence FROM elements ORDER BY page_id, sequence ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        verify_dense("page", rows)?;

        Ok(())
    }
}

/// Verify that sequences grouped by scope form exactly 1..N.
///
/// Expects rows ordered by scope then ascending sequence.
fn verify_dense(
    scope_name: &str,
    rows: impl Iterator<Item = rusqlite::Result<(String, i64)>>,
) -> Result<()> {
    let mut current_scope: Option<String> = None;
    let mut expected: i64 = 1;

    for row in rows {
        let (scope, sequence) = row?;
        if current_scope.as_deref() != Some(scope.as_str()) {
            current_scope = Some(scope.clone());
            expected = 1;
        }
        if sequence != expected {
            return Err(Error::Sequence(format!(
                "{} {} holds sequence {} where {} was expected",
                scope_name, scope, sequence, expected
            )));
        }
        expected += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{NewElement, NewPage, NewTemplate};

    fn store_with_template() -> (SqliteStore, Uuid) {
        let mut store = SqliteStore::open_in_memory().expect("open should succeed");
        let id = store
            .insert_template(&NewTemplate::new("Test template", 1))
            .expect("insert should succeed");
        (store, id)
    }

    #[test]
    fn test_template_round_trip() {
        let (store, id) = store_with_template();

        let record = store
            .get_template(id)
            .expect("get should succeed")
            .expect("template should exist");
        assert_eq!(record.id, id);
        assert_eq!(record.name, "Test template");
        assert_eq!(record.context_id, 1);
    }

    #[test]
    fn test_get_missing_template_returns_none() {
        let (store, _) = store_with_template();
        assert!(store.get_template(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_pages_listed_in_sequence_order() {
        let (mut store, template_id) = store_with_template();

        // Insert out of order on purpose.
        store.insert_page(&NewPage::new(template_id, 2)).unwrap();
        store.insert_page(&NewPage::new(template_id, 1)).unwrap();
        store.insert_page(&NewPage::new(template_id, 3)).unwrap();

        let pages = store.list_pages(template_id).unwrap();
        let sequences: Vec<u32> = pages.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_close_page_gap_decrements_only_higher() {
        let (mut store, template_id) = store_with_template();

        let first = store.insert_page(&NewPage::new(template_id, 1)).unwrap();
        let second = store.insert_page(&NewPage::new(template_id, 2)).unwrap();
        let third = store.insert_page(&NewPage::new(template_id, 3)).unwrap();

        store.delete_page_row(second).unwrap();
        let affected = store.close_page_gap(template_id, 2).unwrap();
        assert_eq!(affected, 1);

        assert_eq!(store.get_page(first).unwrap().unwrap().sequence, 1);
        assert_eq!(store.get_page(third).unwrap().unwrap().sequence, 2);
    }

    #[test]
    fn test_element_payload_round_trip() {
        let (mut store, template_id) = store_with_template();
        let page_id = store.insert_page(&NewPage::new(template_id, 1)).unwrap();

        let data = serde_json::json!({"content": "hello", "y": 40.0});
        let element_id = store
            .insert_element(&NewElement::new(page_id, "text", data.clone(), 1))
            .unwrap();

        let record = store.get_element(element_id).unwrap().unwrap();
        assert_eq!(record.element_type, "text");
        assert_eq!(record.data, data);
        assert_eq!(record.sequence, 1);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (mut store, template_id) = store_with_template();

        store.begin().unwrap();
        store.insert_page(&NewPage::new(template_id, 1)).unwrap();
        store.rollback().unwrap();

        assert!(store.list_pages(template_id).unwrap().is_empty());
    }

    #[test]
    fn test_check_integrity_detects_gap() {
        let (mut store, template_id) = store_with_template();

        let page = store.insert_page(&NewPage::new(template_id, 1)).unwrap();
        store.check_integrity().expect("dense sequence is valid");

        store.set_page_sequence(page, 3).unwrap();
        assert!(matches!(
            store.check_integrity(),
            Err(Error::Sequence(_))
        ));
    }

    #[test]
    fn test_max_sequence() {
        let (mut store, template_id) = store_with_template();
        assert_eq!(store.max_page_sequence(template_id).unwrap(), None);

        store.insert_page(&NewPage::new(template_id, 1)).unwrap();
        store.insert_page(&NewPage::new(template_id, 2)).unwrap();
        assert_eq!(store.max_page_sequence(template_id).unwrap(), Some(2));
    }
}
