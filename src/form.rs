//! View-model for the browser front end.
//!
//! The form is an immutable [`FormState`] that only changes through
//! [`FormState::apply`] with a [`FormEvent`]. The HTTP surface folds the
//! fields of a submitted form into a state the same way, and
//! [`render_page`] turns a state into the HTML page.

use std::fmt;
use std::path::Path;

use crate::engine::GenerateOptions;
use crate::error::{Error, Result};
use crate::placement::{Position, MAX_SCALE_PERCENT, MIN_SCALE_PERCENT};
use crate::qr::ErrorCorrection;
use crate::raster;

/// Message shown when the form is submitted without data.
pub const EMPTY_DATA_MESSAGE: &str = "QR Code Data cannot be empty.";

/// Message shown when the chosen watermark file is not an image.
pub const NOT_AN_IMAGE_MESSAGE: &str = "Please select a valid image file";

/// A watermark file picked by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Watermark {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the browser, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Watermark {
    /// Whether the file looks like an image, by MIME type or else by extension.
    #[must_use]
    pub fn is_image(&self) -> bool {
        match &self.content_type {
            Some(ct) if ct != "application/octet-stream" => ct.starts_with("image/"),
            _ => raster::is_supported_image(Path::new(&self.name)),
        }
    }
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watermark")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything the front end shows.
///
/// Transparency and scale are clamped to their slider ranges as they are set;
/// the QR size is only checked on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    /// Text or URL to encode.
    pub data: String,
    /// Selected position preset.
    pub position: Position,
    /// Watermark alpha on the 0-255 scale.
    pub transparency: u32,
    /// Watermark width in percent of the QR edge.
    pub scale_percent: u32,
    /// QR canvas edge in pixels.
    pub qr_size: u32,
    /// QR error-correction level.
    pub error_correction: ErrorCorrection,
    /// Selected watermark file.
    pub watermark: Option<Watermark>,
    /// Inline error banner text.
    pub error: Option<String>,
    /// A submission is in flight.
    pub loading: bool,
}

impl Default for FormState {
    fn default() -> Self {
        let opts = GenerateOptions::default();
        Self {
            data: String::new(),
            position: opts.position,
            transparency: u32::from(opts.transparency),
            scale_percent: opts.scale_percent,
            qr_size: opts.qr_size,
            error_correction: opts.error_correction,
            watermark: None,
            error: None,
            loading: false,
        }
    }
}

/// A discrete change to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// Replace the data to encode.
    SetData(String),
    /// Pick a position preset.
    SetPosition(Position),
    /// Set the watermark transparency, clamped to 0-255.
    SetTransparency(u32),
    /// Set the watermark scale in percent, clamped to 5-50.
    SetScale(u32),
    /// Set the QR canvas size in pixels.
    SetQrSize(u32),
    /// Set the QR error-correction level.
    SetErrorCorrection(ErrorCorrection),
    /// Choose a watermark file.
    SetWatermark(Watermark),
    /// Drop the chosen watermark.
    ClearWatermark,
    /// The user pressed generate.
    Submit,
    /// Generation finished successfully.
    Completed,
    /// Generation failed with the given message.
    Failed(String),
    /// Restore the defaults.
    Reset,
}

impl FormState {
    /// Apply one event and return the next state.
    #[must_use]
    pub fn apply(self, event: FormEvent) -> Self {
        match event {
            FormEvent::SetData(data) => Self { data, ..self },
            FormEvent::SetPosition(position) => Self { position, ..self },
            FormEvent::SetTransparency(transparency) => Self {
                transparency: transparency.min(u32::from(u8::MAX)),
                ..self
            },
            FormEvent::SetScale(scale_percent) => Self {
                scale_percent: scale_percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT),
                ..self
            },
            FormEvent::SetQrSize(qr_size) => Self { qr_size, ..self },
            FormEvent::SetErrorCorrection(error_correction) => Self {
                error_correction,
                ..self
            },
            FormEvent::SetWatermark(watermark) => {
                if watermark.is_image() {
                    Self {
                        watermark: Some(watermark),
                        error: None,
                        ..self
                    }
                } else {
                    Self {
                        error: Some(NOT_AN_IMAGE_MESSAGE.to_string()),
                        ..self
                    }
                }
            }
            FormEvent::ClearWatermark => Self {
                watermark: None,
                ..self
            },
            FormEvent::Submit => {
                if self.loading {
                    return self;
                }
                if self.data.is_empty() {
                    return Self {
                        error: Some(EMPTY_DATA_MESSAGE.to_string()),
                        ..self
                    };
                }
                match self.options() {
                    Ok(_) => Self {
                        error: None,
                        loading: true,
                        ..self
                    },
                    Err(e) => Self {
                        error: Some(e.to_string()),
                        ..self
                    },
                }
            }
            FormEvent::Completed => Self {
                loading: false,
                error: None,
                ..self
            },
            FormEvent::Failed(message) => Self {
                loading: false,
                error: Some(message),
                ..self
            },
            FormEvent::Reset => Self::default(),
        }
    }

    /// Pipeline options for the current values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if transparency exceeds 255 or the
    /// scale or QR size is out of range.
    pub fn options(&self) -> Result<GenerateOptions> {
        let transparency = u8::try_from(self.transparency).map_err(|_| {
            Error::invalid(format!(
                "transparency must be between 0 and 255, got {}",
                self.transparency
            ))
        })?;
        let opts = GenerateOptions {
            position: self.position,
            transparency,
            scale_percent: self.scale_percent,
            qr_size: self.qr_size,
            error_correction: self.error_correction,
            ..GenerateOptions::default()
        };
        opts.validate()?;
        Ok(opts)
    }
}

/// Render the generator page for `state`.
///
/// The page posts its form to `/generate` and shows the returned PNG, or the
/// JSON error in the inline banner.
#[must_use]
pub fn render_page(state: &FormState) -> String {
    let positions: String = Position::ALL
        .into_iter()
        .map(|p| {
            let checked = if p == state.position { " checked" } else { "" };
            format!(
                r#"<label><input type="radio" name="position" value="{p}"{checked}> {label}</label>"#,
                label = position_label(p),
            )
        })
        .collect();

    let levels: String = [
        ErrorCorrection::Low,
        ErrorCorrection::Medium,
        ErrorCorrection::Quartile,
        ErrorCorrection::High,
    ]
    .into_iter()
    .map(|level| {
        let selected = if level == state.error_correction {
            " selected"
        } else {
            ""
        };
        format!(r#"<option value="{level}"{selected}>{level}</option>"#)
    })
    .collect();

    let banner = match &state.error {
        Some(msg) => format!(r#"<div id="error" class="error">{}</div>"#, escape(msg)),
        None => r#"<div id="error" class="error" hidden></div>"#.to_string(),
    };
    let button = if state.loading {
        r#"<button type="submit" disabled>Generating...</button>"#
    } else {
        r#"<button type="submit">Generate</button>"#
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>QR Watermarker</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }}
fieldset {{ border: 1px solid #ccc; margin: 1rem 0; }}
.error {{ background: #fdd; border: 1px solid #c33; padding: .5rem; }}
#result img {{ max-width: 100%; image-rendering: pixelated; }}
#drop.over {{ border-color: #36c; background: #eef; }}
#preview {{ display: block; max-height: 8rem; margin-top: .5rem; }}
</style>
</head>
<body>
<h1>QR Watermarker</h1>
{banner}
<form id="form" action="/generate" method="post" enctype="multipart/form-data">
<label>QR Code Data <input type="text" name="data" value="{data}" required></label>
<fieldset id="drop"><legend>Watermark (drop an image or browse)</legend><input type="file" name="watermark" accept="image/*"><img id="preview" alt="Watermark preview" hidden></fieldset>
<fieldset><legend>Position</legend>{positions}</fieldset>
<label>Transparency <input type="range" name="transparency" min="0" max="255" value="{transparency}"></label>
<label>Scale (%) <input type="range" name="scale" min="5" max="50" value="{scale}"></label>
<label>QR size (px) <input type="number" name="qr_size" min="1" max="4096" value="{qr_size}"></label>
<label>Error correction <select name="error_correction">{levels}</select></label>
<p>{button} <button type="reset">Reset</button></p>
</form>
<div id="result"></div>
<script>
const form = document.getElementById("form");
const banner = document.getElementById("error");
const result = document.getElementById("result");
const submit = form.querySelector("button[type=submit]");
const picker = form.querySelector("input[name=watermark]");
const drop = document.getElementById("drop");
const preview = document.getElementById("preview");
function showPreview(file) {{
  if (preview.src) URL.revokeObjectURL(preview.src);
  preview.removeAttribute("src");
  preview.hidden = true;
  if (!file) return;
  if (!file.type.startsWith("image/")) {{
    picker.value = "";
    banner.textContent = "{not_an_image}";
    banner.hidden = false;
    return;
  }}
  banner.hidden = true;
  preview.src = URL.createObjectURL(file);
  preview.hidden = false;
}}
picker.addEventListener("change", () => showPreview(picker.files[0]));
drop.addEventListener("dragover", (e) => {{ e.preventDefault(); drop.classList.add("over"); }});
drop.addEventListener("dragleave", () => drop.classList.remove("over"));
drop.addEventListener("drop", (e) => {{
  e.preventDefault();
  drop.classList.remove("over");
  if (e.dataTransfer.files.length > 0) {{
    picker.files = e.dataTransfer.files;
    showPreview(picker.files[0]);
  }}
}});
form.addEventListener("submit", async (e) => {{
  e.preventDefault();
  banner.hidden = true;
  result.innerHTML = "";
  submit.disabled = true;
  submit.textContent = "Generating...";
  try {{
    const resp = await fetch(form.action, {{ method: "POST", body: new FormData(form) }});
    if (!resp.ok) {{
      const body = await resp.json().catch(() => ({{ error: resp.statusText }}));
      throw new Error(body.error);
    }}
    const url = URL.createObjectURL(await resp.blob());
    result.innerHTML = `<img src="${{url}}" alt="QR code"><p><a href="${{url}}" download="watermarked_qr.png">Download</a></p>`;
  }} catch (err) {{
    banner.textContent = err.message || "Failed to generate QR code.";
    banner.hidden = false;
  }} finally {{
    submit.disabled = false;
    submit.textContent = "Generate";
  }}
}});
form.addEventListener("reset", () => {{ banner.hidden = true; result.innerHTML = ""; showPreview(null); }});
</script>
</body>
</html>
"#,
        data = escape(&state.data),
        transparency = state.transparency,
        scale = state.scale_percent,
        qr_size = state.qr_size,
        not_an_image = NOT_AN_IMAGE_MESSAGE,
    )
}

fn position_label(position: Position) -> &'static str {
    match position {
        Position::Center => "Center",
        Position::TopLeft => "Top Left",
        Position::TopRight => "Top Right",
        Position::BottomLeft => "Bottom Left",
        Position::BottomRight => "Bottom Right",
    }
}

/// Escape text for use in HTML content and double-quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
