//! Line element: draws a straight line between two points.

use serde::Deserialize;

use super::Element;
use crate::error::{Error, Result};
use crate::render::{Canvas, LineDraw, RenderContext};
use crate::store::types::ElementRecord;

#[derive(Debug, Deserialize)]
struct LinePayload {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,

    #[serde(default = "default_width")]
    width: f64,
}

fn default_width() -> f64 {
    1.0
}

/// Built-in `line` variant.
pub struct LineElement {
    record: ElementRecord,
}

impl LineElement {
    fn payload(&self) -> Result<LinePayload> {
        serde_json::from_value(self.record.data.clone())
            .map_err(|e| Error::Validation(format!("Invalid line element payload: {}", e)))
    }
}

pub(super) fn construct(record: ElementRecord) -> Box<dyn Element> {
    Box::new(LineElement { record })
}

impl Element for LineElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }

    fn render(&self, canvas: &mut dyn Canvas, _ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        canvas.draw_line(&LineDraw {
            x1: payload.x1,
            y1: payload.y1,
            x2: payload.x2,
            y2: payload.y2,
            width: payload.width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_payload_default_width() {
        let element = LineElement {
            record: ElementRecord {
                id: Uuid::new_v4(),
                page_id: Uuid::new_v4(),
                element_type: "line".to_string(),
                data: serde_json::json!({"x1": 25.0, "y1": 60.0, "x2": 185.0, "y2": 60.0}),
                sequence: 1,
                created_at: Utc::now(),
                modified_at: Utc::now(),
            },
        };
        assert_eq!(element.payload().unwrap().width, 1.0);
    }
}
