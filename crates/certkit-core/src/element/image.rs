//! Image element: places an image by path and position.

use serde::Deserialize;

use super::Element;
use crate::error::{Error, Result};
use crate::render::{Canvas, ImageDraw, RenderContext};
use crate::store::types::ElementRecord;

#[derive(Debug, Deserialize)]
struct ImagePayload {
    /// Path or URI resolved by the painter; opaque to the core
    path: String,

    x: f64,
    y: f64,

    /// Zero lets the painter keep the image's natural dimension
    #[serde(default)]
    width: f64,

    #[serde(default)]
    height: f64,
}

/// Built-in `image` variant.
pub struct ImageElement {
    record: ElementRecord,
}

impl ImageElement {
    fn payload(&self) -> Result<ImagePayload> {
        serde_json::from_value(self.record.data.clone())
            .map_err(|e| Error::Validation(format!("Invalid image element payload: {}", e)))
    }
}

pub(super) fn construct(record: ElementRecord) -> Box<dyn Element> {
    Box::new(ImageElement { record })
}

impl Element for ImageElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }

    fn render(&self, canvas: &mut dyn Canvas, _ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        canvas.draw_image(&ImageDraw {
            path: payload.path,
            x: payload.x,
            y: payload.y,
            width: payload.width,
            height: payload.height,
        })
    }
}
