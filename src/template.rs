//! OG card template
//!
//! Turns a [`RenderRequest`] into a complete, self-contained HTML document laid
//! out for a 1200×630 canvas: right-to-left Arabic typography, a faint centered
//! watermark, a soft gradient overlay, a double decorative border and three
//! text blocks (author/date, title, content snippet).
//!
//! Every request field is escaped on the way into the markup; the document is
//! built with `maud`, which escapes all interpolated values.

use maud::{html, PreEscaped, DOCTYPE};
use serde::{Deserialize, Serialize};

/// Default card title when the `title` parameter is absent
pub const DEFAULT_TITLE: &str = "تجربة من كتاب النور";
/// Default author ("voice") when the `voice` parameter is absent
pub const DEFAULT_VOICE: &str = "مجهول";
/// Default date label when the `date` parameter is absent
pub const DEFAULT_DATE: &str = "2024";
/// Default excerpt when the `content` parameter is absent
pub const DEFAULT_CONTENT: &str = "تجربة حقيقية من الحياة";

/// Number of characters of `content` kept in the snippet
pub const PREVIEW_CHARS: usize = 120;
/// Suffix marking a cut snippet
pub const ELLIPSIS: &str = "…";

pub const DEFAULT_FONT_STYLESHEET_URL: &str =
    "https://fonts.googleapis.com/css2?family=IBM+Plex+Sans+Arabic:wght@400;600;700&display=swap";
pub const DEFAULT_WATERMARK_URL: &str = "https://annur.ai/images/annur-ai.png";

/// The four text fields of one OG card.
///
/// Fields missing from a query string fall back to the Arabic placeholders
/// above. A field that is present but empty stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    pub title: String,
    pub voice: String,
    pub date: String,
    pub content: String,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            date: DEFAULT_DATE.to_string(),
            content: DEFAULT_CONTENT.to_string(),
        }
    }
}

impl RenderRequest {
    /// Build a request from decoded query pairs.
    ///
    /// A repeated field renders all of its values joined with `,`; unknown
    /// keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut seen = [false; 4];
        let mut request = Self::default();
        for (key, value) in pairs {
            let (index, field) = match key.as_ref() {
                "title" => (0, &mut request.title),
                "voice" => (1, &mut request.voice),
                "date" => (2, &mut request.date),
                "content" => (3, &mut request.content),
                _ => continue,
            };
            if seen[index] {
                field.push(',');
                field.push_str(&value.into());
            } else {
                *field = value.into();
                seen[index] = true;
            }
        }
        request
    }
}

/// When the snippet gets a trailing ellipsis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EllipsisPolicy {
    /// Only when the content was actually cut
    #[default]
    WhenTruncated,
    /// Always, even for short content
    Always,
}

/// Remote assets referenced by the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAssets {
    /// Stylesheet providing the `IBM Plex Sans Arabic` face
    pub font_stylesheet_url: String,
    /// Image used for the background watermark
    pub watermark_url: String,
}

impl Default for TemplateAssets {
    fn default() -> Self {
        Self {
            font_stylesheet_url: DEFAULT_FONT_STYLESHEET_URL.to_string(),
            watermark_url: DEFAULT_WATERMARK_URL.to_string(),
        }
    }
}

/// Knobs for [`render_html`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    pub assets: TemplateAssets,
    pub ellipsis: EllipsisPolicy,
}

/// Cut `content` to [`PREVIEW_CHARS`] characters.
///
/// The cut counts Unicode scalar values and ignores word boundaries, so it may
/// split a grapheme cluster.
pub fn content_preview(content: &str, policy: EllipsisPolicy) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ELLIPSIS),
        None => match policy {
            EllipsisPolicy::Always => format!("{}{}", content, ELLIPSIS),
            EllipsisPolicy::WhenTruncated => content.to_string(),
        },
    }
}

const STYLESHEET_TEMPLATE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  width: 1200px; height: 630px;
  background: linear-gradient(135deg, #f8f5f0 0%, #f2ede4 50%, #ede8dd 100%);
  font-family: 'IBM Plex Sans Arabic', sans-serif;
  position: relative; overflow: hidden;
}
.background-logo {
  position: absolute; top: 50%; left: 50%; transform: translate(-50%, -50%);
  width: 400px; height: 400px; opacity: 0.05; z-index: 1;
  background: url("{{WATERMARK_URL}}") no-repeat center;
  background-size: contain;
}
.content-overlay {
  position: absolute; top: 0; left: 0; right: 0; bottom: 0; z-index: 2;
  background: linear-gradient(45deg, rgba(255,255,255,0.1) 0%, rgba(248,245,240,0.3) 30%, rgba(255,255,255,0.2) 70%, rgba(248,245,240,0.1) 100%);
}
.container { position: relative; z-index: 3; width: 100%; height: 100%; padding: 60px; display: flex; flex-direction: column; }
.author-info { text-align: right; margin-bottom: 80px; font-size: 28px; font-weight: 600; color: #2c1810; text-shadow: 0 1px 2px rgba(255,255,255,0.8); }
.title { text-align: center; font-size: 64px; font-weight: 700; color: #1a0f08; line-height: 1.1; margin-bottom: 40px; text-shadow: 0 2px 4px rgba(255,255,255,0.9); max-width: 900px; align-self: center; }
.content-snippet { text-align: center; font-size: 24px; font-weight: 400; color: #4a3428; line-height: 1.4; max-width: 800px; align-self: center; opacity: 0.9; text-shadow: 0 1px 2px rgba(255,255,255,0.7); }
.border { position: absolute; top: 20px; left: 20px; right: 20px; bottom: 20px; border: 3px solid #dcc896; border-radius: 15px; z-index: 4; }
.inner-border { position: absolute; top: 35px; left: 35px; right: 35px; bottom: 35px; border: 1px solid rgba(220,200,150,0.4); border-radius: 10px; z-index: 4; }
"#;

// The watermark URL lands inside a quoted CSS `url()` within a <style> element.
fn css_url(url: &str) -> String {
    url.replace('"', "%22")
        .replace('<', "%3C")
        .replace('>', "%3E")
        .replace('\\', "%5C")
        .replace('\n', "")
}

fn stylesheet(assets: &TemplateAssets) -> String {
    STYLESHEET_TEMPLATE.replace("{{WATERMARK_URL}}", &css_url(&assets.watermark_url))
}

/// Render the card document for `request`.
pub fn render_html(request: &RenderRequest, options: &TemplateOptions) -> String {
    let preview = content_preview(&request.content, options.ellipsis);
    let markup = html! {
        (DOCTYPE)
        html lang="ar" dir="rtl" {
            head {
                meta charset="UTF-8";
                link href=(options.assets.font_stylesheet_url) rel="stylesheet";
                style { (PreEscaped(stylesheet(&options.assets))) }
            }
            body {
                div class="background-logo" {}
                div class="content-overlay" {}
                div class="border" {}
                div class="inner-border" {}
                div class="container" {
                    div class="author-info" { (request.voice) " " (request.date) }
                    div class="title" { (request.title) }
                    div class="content-snippet" { (preview) }
                }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request() {
        let req = RenderRequest::default();
        assert_eq!(req.title, DEFAULT_TITLE);
        assert_eq!(req.voice, DEFAULT_VOICE);
        assert_eq!(req.date, DEFAULT_DATE);
        assert_eq!(req.content, DEFAULT_CONTENT);
    }

    #[test]
    fn test_partial_query_keeps_other_defaults() {
        let req: RenderRequest = serde_json::from_str(r#"{"title":"x","content":""}"#).unwrap();
        assert_eq!(req.title, "x");
        assert_eq!(req.content, "");
        assert_eq!(req.voice, DEFAULT_VOICE);
        assert_eq!(req.date, DEFAULT_DATE);
    }

    #[test]
    fn test_from_pairs() {
        let req = RenderRequest::from_pairs([("title", "a"), ("date", ""), ("utm", "x"), ("title", "b")]);
        assert_eq!(req.title, "a,b");
        assert_eq!(req.date, "");
        assert_eq!(req.voice, DEFAULT_VOICE);
        assert_eq!(req.content, DEFAULT_CONTENT);

        assert_eq!(RenderRequest::from_pairs(Vec::<(String, String)>::new()), RenderRequest::default());
    }

    #[test]
    fn test_preview_boundary() {
        let exact: String = "ن".repeat(PREVIEW_CHARS);
        assert_eq!(content_preview(&exact, EllipsisPolicy::WhenTruncated), exact);
        assert_eq!(
            content_preview(&exact, EllipsisPolicy::Always),
            format!("{}…", exact)
        );

        let over: String = "ن".repeat(PREVIEW_CHARS + 1);
        let cut = content_preview(&over, EllipsisPolicy::WhenTruncated);
        assert_eq!(cut, format!("{}…", exact));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_preview_empty() {
        assert_eq!(content_preview("", EllipsisPolicy::WhenTruncated), "");
        assert_eq!(content_preview("", EllipsisPolicy::Always), "…");
    }

    #[test]
    fn test_css_url_cannot_close_style() {
        let assets = TemplateAssets {
            watermark_url: "x\");}</style><script>".to_string(),
            ..Default::default()
        };
        let css = stylesheet(&assets);
        assert!(!css.contains("</style>"));
        assert!(css.contains("x%22);}%3C/style%3E%3Cscript%3E"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let req = RenderRequest::default();
        let opts = TemplateOptions::default();
        assert_eq!(render_html(&req, &opts), render_html(&req, &opts));
    }
}
