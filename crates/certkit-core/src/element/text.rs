//! Text element: places a run of text, with token substitution.

use serde::Deserialize;

use super::Element;
use crate::error::{Error, Result};
use crate::render::{substitute, Canvas, RenderContext, TextAlign, TextDraw};
use crate::store::types::ElementRecord;

#[derive(Debug, Deserialize)]
struct TextPayload {
    /// Text content; `{{name}}`, `{{course}}`, `{{date}}` and custom
    /// subject fields are substituted at render time
    content: String,

    /// Horizontal anchor; `None` aligns across the page width
    #[serde(default)]
    x: Option<f64>,

    /// Vertical position
    y: f64,

    #[serde(default = "default_font_size")]
    font_size: f64,

    #[serde(default)]
    align: TextAlign,
}

fn default_font_size() -> f64 {
    12.0
}

/// Built-in `text` variant.
pub struct TextElement {
    record: ElementRecord,
}

impl TextElement {
    fn payload(&self) -> Result<TextPayload> {
        serde_json::from_value(self.record.data.clone())
            .map_err(|e| Error::Validation(format!("Invalid text element payload: {}", e)))
    }
}

pub(super) fn construct(record: ElementRecord) -> Box<dyn Element> {
    Box::new(TextElement { record })
}

impl Element for TextElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }

    fn render(&self, canvas: &mut dyn Canvas, ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        canvas.draw_text(&TextDraw {
            text: substitute(&payload.content, ctx),
            x: payload.x,
            y: payload.y,
            font_size: payload.font_size,
            align: payload.align,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn element(data: serde_json::Value) -> TextElement {
        TextElement {
            record: ElementRecord {
                id: Uuid::new_v4(),
                page_id: Uuid::new_v4(),
                element_type: "text".to_string(),
                data,
                sequence: 1,
                created_at: Utc::now(),
                modified_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_payload_defaults() {
        let element = element(serde_json::json!({"content": "hi", "y": 40.0}));
        let payload = element.payload().unwrap();
        assert_eq!(payload.font_size, 12.0);
        assert_eq!(payload.align, TextAlign::Center);
        assert!(payload.x.is_none());
    }

    #[test]
    fn test_missing_content_is_invalid() {
        let element = element(serde_json::json!({"y": 40.0}));
        assert!(matches!(element.payload(), Err(Error::Validation(_))));
    }
}
