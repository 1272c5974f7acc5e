//! Date element: places the award date, formatted with a strftime
//! pattern from the payload.

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use super::Element;
use crate::error::{Error, Result};
use crate::render::{Canvas, RenderContext, TextAlign, TextDraw};
use crate::store::types::ElementRecord;

#[derive(Debug, Deserialize)]
struct DatePayload {
    #[serde(default = "default_format")]
    format: String,

    #[serde(default)]
    x: Option<f64>,

    y: f64,

    #[serde(default = "default_font_size")]
    font_size: f64,

    #[serde(default)]
    align: TextAlign,
}

fn default_format() -> String {
    "%-d %B %Y".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

/// Built-in `date` variant.
///
/// Renders the subject's award date when one is set; previews and
/// subjects without a date fall back to the render day.
pub struct DateElement {
    record: ElementRecord,
}

impl DateElement {
    fn payload(&self) -> Result<DatePayload> {
        serde_json::from_value(self.record.data.clone())
            .map_err(|e| Error::Validation(format!("Invalid date element payload: {}", e)))
    }
}

pub(super) fn construct(record: ElementRecord) -> Box<dyn Element> {
    Box::new(DateElement { record })
}

impl Element for DateElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }

    fn render(&self, canvas: &mut dyn Canvas, ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;

        let date = ctx
            .subject
            .filter(|_| !ctx.preview)
            .and_then(|s| s.awarded_on)
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        // Validate the pattern up front; formatting a bad specifier
        // panics inside Display otherwise.
        let items: Vec<Item<'_>> = StrftimeItems::new(&payload.format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(Error::Validation(format!(
                "Invalid date format pattern: {}",
                payload.format
            )));
        }

        canvas.draw_text(&TextDraw {
            text: date.format_with_items(items.iter()).to_string(),
            x: payload.x,
            y: payload.y,
            font_size: payload.font_size,
            align: payload.align,
        })
    }
}
