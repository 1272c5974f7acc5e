//! Rendering contract and the recording canvas.
//!
//! The core does not draw anything itself. A render walk emits ordered
//! draw primitives (text, image, line) into a [`Canvas`], an abstract
//! painter supplied by the caller. Real PDF painters live outside this
//! crate; [`RecordingCanvas`] captures the command stream for tests,
//! previews and the CLI.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::types::PageRecord;

pub use crate::store::types::PageMetrics;

/// Horizontal alignment for placed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// A text placement command.
///
/// `x` of `None` means the text is aligned within the full page width
/// (between the page margins) rather than anchored to a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDraw {
    pub text: String,
    pub x: Option<f64>,
    pub y: f64,
    pub font_size: f64,
    pub align: TextAlign,
}

/// An image placement command. Position and dimensions in page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDraw {
    pub path: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A straight line command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraw {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
}

/// One ordered draw primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DrawCommand {
    Text(TextDraw),
    Image(ImageDraw),
    Line(LineDraw),
}

/// How the finished document leaves the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Return the assembled document as a byte buffer
    #[default]
    Return,
    /// Stream the assembled document to the canvas's writer
    Stream,
}

/// The person a certificate is rendered for.
///
/// All content is opaque to the core; it is substituted into element
/// payloads verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// Full display name
    pub full_name: String,

    /// Course or activity title
    pub course: String,

    /// Date the certificate was awarded; `None` falls back to the
    /// render date
    pub awarded_on: Option<NaiveDate>,

    /// Additional substitution fields, keyed by token name
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Options controlling a render walk.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Render with placeholder data instead of a concrete subject
    pub preview: bool,

    /// The subject to substitute; ignored in preview mode
    pub subject: Option<Subject>,

    /// Whether the finished document is returned or streamed
    pub output: OutputMode,
}

/// Per-element rendering context.
///
/// Everything an element may consult during rendering is carried here
/// explicitly; elements must not assume any global state beyond it.
pub struct RenderContext<'a> {
    /// True when rendering with placeholder data
    pub preview: bool,

    /// The concrete subject, absent in preview mode
    pub subject: Option<&'a Subject>,

    /// The page currently being rendered
    pub page: &'a PageRecord,
}

impl RenderContext<'_> {
    /// Resolve a substitution token to its display value.
    ///
    /// Known tokens are `name`, `course` and `date`; anything else is
    /// looked up in the subject's extra fields. Unknown tokens resolve
    /// to `None` and are left untouched by [`substitute`].
    pub fn resolve_token(&self, token: &str) -> Option<String> {
        match token {
            "name" => Some(match self.subject {
                Some(subject) if !self.preview => subject.full_name.clone(),
                _ => "[Full name]".to_string(),
            }),
            "course" => Some(match self.subject {
                Some(subject) if !self.preview => subject.course.clone(),
                _ => "[Course]".to_string(),
            }),
            "date" => {
                let date = self
                    .subject
                    .filter(|_| !self.preview)
                    .and_then(|s| s.awarded_on)
                    .unwrap_or_else(|| chrono::Utc::now().date_naive());
                Some(date.format("%-d %B %Y").to_string())
            }
            other => self
                .subject
                .filter(|_| !self.preview)
                .and_then(|s| s.fields.get(other).cloned()),
        }
    }
}

/// Replace `{{token}}` occurrences in `input` using the context.
///
/// Tokens that do not resolve are left verbatim.
pub fn substitute(input: &str, ctx: &RenderContext<'_>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                match ctx.resolve_token(token) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Abstract painter consuming ordered draw primitives.
///
/// The template render walk calls `begin_page` once per page in
/// sequence order, emits the page's draw commands in element sequence
/// order, and ends with a single `finish`.
pub trait Canvas {
    /// Start a new page with the given layout metrics.
    fn begin_page(&mut self, metrics: &PageMetrics) -> Result<()>;

    /// Place text on the current page.
    fn draw_text(&mut self, text: &TextDraw) -> Result<()>;

    /// Place an image on the current page.
    fn draw_image(&mut self, image: &ImageDraw) -> Result<()>;

    /// Draw a line on the current page.
    fn draw_line(&mut self, line: &LineDraw) -> Result<()>;

    /// Assemble the document.
    ///
    /// With `OutputMode::Return` the document comes back as bytes; with
    /// `OutputMode::Stream` it is written to wherever the canvas
    /// streams and `None` is returned.
    fn finish(&mut self, mode: OutputMode) -> Result<Option<Vec<u8>>>;
}

/// One recorded page: its metrics plus the commands drawn onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedPage {
    pub metrics: PageMetrics,
    pub commands: Vec<DrawCommand>,
}

/// A canvas that records the draw command stream.
///
/// `finish(Return)` serializes the recorded pages to pretty JSON bytes;
/// `finish(Stream)` writes the same JSON to the writer supplied via
/// [`RecordingCanvas::with_writer`].
#[derive(Default)]
pub struct RecordingCanvas {
    pages: Vec<RecordedPage>,
    writer: Option<Box<dyn Write + Send>>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a writer for `OutputMode::Stream`.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            pages: Vec::new(),
            writer: Some(writer),
        }
    }

    /// The recorded pages so far.
    pub fn pages(&self) -> &[RecordedPage] {
        &self.pages
    }

    fn current_page(&mut self) -> Result<&mut RecordedPage> {
        self.pages
            .last_mut()
            .ok_or_else(|| Error::Render("draw command before begin_page".to_string()))
    }
}

impl Canvas for RecordingCanvas {
    fn begin_page(&mut self, metrics: &PageMetrics) -> Result<()> {
        self.pages.push(RecordedPage {
            metrics: *metrics,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn draw_text(&mut self, text: &TextDraw) -> Result<()> {
        self.current_page()?
            .commands
            .push(DrawCommand::Text(text.clone()));
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageDraw) -> Result<()> {
        self.current_page()?
            .commands
            .push(DrawCommand::Image(image.clone()));
        Ok(())
    }

    fn draw_line(&mut self, line: &LineDraw) -> Result<()> {
        self.current_page()?
            .commands
            .push(DrawCommand::Line(line.clone()));
        Ok(())
    }

    fn finish(&mut self, mode: OutputMode) -> Result<Option<Vec<u8>>> {
        let bytes = serde_json::to_vec_pretty(&self.pages)?;
        match mode {
            OutputMode::Return => Ok(Some(bytes)),
            OutputMode::Stream => {
                let writer = self.writer.as_mut().ok_or_else(|| {
                    Error::Render("streaming output requires a writer".to_string())
                })?;
                writer.write_all(&bytes)?;
                writer.flush()?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn page() -> PageRecord {
        PageRecord {
            id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            width: 210.0,
            height: 297.0,
            left_margin: 0.0,
            right_margin: 0.0,
            sequence: 1,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn subject() -> Subject {
        Subject {
            full_name: "Ada Lovelace".to_string(),
            course: "Analytical Engines".to_string(),
            awarded_on: NaiveDate::from_ymd_opt(2024, 6, 1),
            fields: BTreeMap::from([("grade".to_string(), "A".to_string())]),
        }
    }

    #[test]
    fn test_substitute_with_subject() {
        let page = page();
        let subject = subject();
        let ctx = RenderContext {
            preview: false,
            subject: Some(&subject),
            page: &page,
        };

        assert_eq!(
            substitute("{{name}} completed {{course}}", &ctx),
            "Ada Lovelace completed Analytical Engines"
        );
        assert_eq!(substitute("{{date}}", &ctx), "1 June 2024");
        assert_eq!(substitute("Grade: {{grade}}", &ctx), "Grade: A");
    }

    #[test]
    fn test_substitute_preview_uses_placeholders() {
        let page = page();
        let ctx = RenderContext {
            preview: true,
            subject: None,
            page: &page,
        };

        assert_eq!(substitute("{{name}}", &ctx), "[Full name]");
        assert_eq!(substitute("{{course}}", &ctx), "[Course]");
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        let page = page();
        let subject = subject();
        let ctx = RenderContext {
            preview: false,
            subject: Some(&subject),
            page: &page,
        };

        assert_eq!(substitute("{{mystery}}", &ctx), "{{mystery}}");
        assert_eq!(substitute("dangling {{name", &ctx), "dangling {{name");
    }

    #[test]
    fn test_recording_canvas_orders_commands() {
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(&PageMetrics::default()).unwrap();
        canvas
            .draw_text(&TextDraw {
                text: "first".to_string(),
                x: None,
                y: 10.0,
                font_size: 12.0,
                align: TextAlign::Center,
            })
            .unwrap();
        canvas
            .draw_line(&LineDraw {
                x1: 0.0,
                y1: 20.0,
                x2: 100.0,
                y2: 20.0,
                width: 1.0,
            })
            .unwrap();

        assert_eq!(canvas.pages().len(), 1);
        assert_eq!(canvas.pages()[0].commands.len(), 2);
        assert!(matches!(
            canvas.pages()[0].commands[0],
            DrawCommand::Text(_)
        ));
        assert!(matches!(
            canvas.pages()[0].commands[1],
            DrawCommand::Line(_)
        ));
    }

    #[test]
    fn test_draw_before_begin_page_fails() {
        let mut canvas = RecordingCanvas::new();
        let result = canvas.draw_line(&LineDraw {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
            width: 1.0,
        });
        assert!(matches!(result, Err(Error::Render(_))));
    }

    #[test]
    fn test_finish_return_and_stream() {
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(&PageMetrics::default()).unwrap();
        let bytes = canvas
            .finish(OutputMode::Return)
            .unwrap()
            .expect("return mode yields bytes");
        let parsed: Vec<RecordedPage> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);

        // Stream mode without a writer is an error.
        let mut bare = RecordingCanvas::new();
        bare.begin_page(&PageMetrics::default()).unwrap();
        assert!(bare.finish(OutputMode::Stream).is_err());
    }
}
