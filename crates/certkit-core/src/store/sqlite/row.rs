//! Raw row types for database queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::types::{ElementRecord, PageRecord, TemplateRecord};

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Storage(format!("Invalid {} UUID: {}", what, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::Storage(format!("Invalid timestamp: {}", e)))
        .map(|ts| ts.with_timezone(&Utc))
}

fn parse_sequence(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Storage(format!("Invalid sequence value: {}", value)))
}

/// Raw row data from the templates table, before parsing into domain types.
#[derive(Debug)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub context_id: i64,
    pub created_at: String,
    pub modified_at: String,
}

impl TryFrom<TemplateRow> for TemplateRecord {
    type Error = Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        Ok(TemplateRecord {
            id: parse_uuid(&row.id, "template")?,
            name: row.name,
            context_id: row.context_id,
            created_at: parse_timestamp(&row.created_at)?,
            modified_at: parse_timestamp(&row.modified_at)?,
        })
    }
}

/// Raw row data from the pages table.
#[derive(Debug)]
pub struct PageRow {
    pub id: String,
    pub template_id: String,
    pub width: f64,
    pub height: f64,
    pub left_margin: f64,
    pub right_margin: f64,
    pub sequence: i64,
    pub created_at: String,
    pub modified_at: String,
}

impl TryFrom<PageRow> for PageRecord {
    type Error = Error;

    fn try_from(row: PageRow) -> Result<Self> {
        Ok(PageRecord {
            id: parse_uuid(&row.id, "page")?,
            template_id: parse_uuid(&row.template_id, "template")?,
            width: row.width,
            height: row.height,
            left_margin: row.left_margin,
            right_margin: row.right_margin,
            sequence: parse_sequence(row.sequence)?,
            created_at: parse_timestamp(&row.created_at)?,
            modified_at: parse_timestamp(&row.modified_at)?,
        })
    }
}

/// Raw row data from the elements table.
#[derive(Debug)]
pub struct ElementRow {
    pub id: String,
    pub page_id: String,
    pub element_type: String,
    pub data_json: String,
    pub sequence: i64,
    pub created_at: String,
    pub modified_at: String,
}

impl TryFrom<ElementRow> for ElementRecord {
    type Error = Error;

    fn try_from(row: ElementRow) -> Result<Self> {
        let data: serde_json::Value = serde_json::from_str(&row.data_json)
            .map_err(|e| Error::Storage(format!("Invalid element payload JSON: {}", e)))?;

        Ok(ElementRecord {
            id: parse_uuid(&row.id, "element")?,
            page_id: parse_uuid(&row.page_id, "page")?,
            element_type: row.element_type,
            data,
            sequence: parse_sequence(row.sequence)?,
            created_at: parse_timestamp(&row.created_at)?,
            modified_at: parse_timestamp(&row.modified_at)?,
        })
    }
}
