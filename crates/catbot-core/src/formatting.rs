//! Formatting utilities (message entities → Telegram HTML).
//!
//! Entity offsets and lengths are counted in UTF-16 code units, so all slicing
//! goes through an encoded copy of the text.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::User;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\u{201C}', "&#8220;")
        .replace('\u{201D}', "&#8221;")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Mention,
    Hashtag,
    Cashtag,
    Command,
    Url,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    TextLink,
    TextMention,
    /// Any entity type this crate does not interpret (`pre`, `email`, ...).
    Unknown,
}

impl From<&str> for SpanKind {
    fn from(s: &str) -> Self {
        match s {
            "mention" => SpanKind::Mention,
            "hashtag" => SpanKind::Hashtag,
            "cashtag" => SpanKind::Cashtag,
            "bot_command" => SpanKind::Command,
            "url" => SpanKind::Url,
            "bold" => SpanKind::Bold,
            "italic" => SpanKind::Italic,
            "underline" => SpanKind::Underline,
            "strikethrough" => SpanKind::Strikethrough,
            "spoiler" => SpanKind::Spoiler,
            "code" => SpanKind::Code,
            "text_link" => SpanKind::TextLink,
            "text_mention" => SpanKind::TextMention,
            _ => SpanKind::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanExtra {
    Url(String),
    User(User),
}

/// One styled or categorized range of message text, in UTF-16 units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub offset: usize,
    pub length: usize,
    pub extra: Option<SpanExtra>,
}

impl Span {
    pub fn new(kind: SpanKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: SpanExtra) -> Self {
        self.extra = Some(extra);
        self
    }

    fn url(&self) -> &str {
        match &self.extra {
            Some(SpanExtra::Url(u)) => u,
            _ => "",
        }
    }

    fn user(&self) -> Option<&User> {
        match &self.extra {
            Some(SpanExtra::User(u)) => Some(u),
            _ => None,
        }
    }
}

/// `MessageEntity` as it appears on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl From<MessageEntity> for Span {
    fn from(e: MessageEntity) -> Self {
        let extra = match (e.url, e.user) {
            (Some(url), _) => Some(SpanExtra::Url(url)),
            (None, Some(user)) => Some(SpanExtra::User(user)),
            (None, None) => None,
        };
        Self {
            kind: SpanKind::from(e.kind.as_str()),
            offset: e.offset,
            length: e.length,
            extra,
        }
    }
}

/// Substrings of a message grouped by entity kind, each list in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityGroups {
    pub mentions: Vec<String>,
    pub hashtags: Vec<String>,
    pub cashtags: Vec<String>,
    pub commands: Vec<String>,
    pub links: Vec<String>,
    pub bolds: Vec<String>,
    pub italics: Vec<String>,
    pub underlines: Vec<String>,
    pub strikethroughs: Vec<String>,
    pub spoilers: Vec<String>,
    pub codes: Vec<String>,
    /// `(text, url)`
    pub text_links: Vec<(String, String)>,
    /// `(text, mentioned user)`
    pub text_mentions: Vec<(String, User)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formatted {
    pub groups: EntityGroups,
    pub html: String,
}

/// Tags inserted at one UTF-16 position. Closing tags are emitted before opening
/// tags so adjacent ranges never cross.
#[derive(Default)]
struct Marks {
    closes: Vec<String>,
    opens: Vec<String>,
}

/// Group `spans` by kind and render `text` as Telegram HTML.
///
/// Markup is applied in descending offset order, and each span encloses whatever
/// markup was already placed inside its range. Among spans starting at the same
/// offset the longer one is outer; for identical ranges the later one in `spans`
/// becomes the outer tag. `text` itself is not escaped, so zero spans yields
/// `text` unchanged.
///
/// Spans reaching past the end of `text` are clamped to it.
pub fn format_entities(text: &str, spans: &[Span]) -> Formatted {
    let units: Vec<u16> = text.encode_utf16().collect();
    let bounds = |s: &Span| {
        let start = s.offset.min(units.len());
        let end = s.offset.saturating_add(s.length).min(units.len());
        (start, end)
    };
    let slice = |start: usize, end: usize| String::from_utf16_lossy(&units[start..end]);

    let mut groups = EntityGroups::default();
    let mut markup: Vec<(&Span, String, &'static str)> = Vec::new();

    for span in spans {
        let (start, end) = bounds(span);
        let sub = slice(start, end);
        match span.kind {
            SpanKind::Mention => groups.mentions.push(sub),
            SpanKind::Hashtag => groups.hashtags.push(sub),
            SpanKind::Cashtag => groups.cashtags.push(sub),
            SpanKind::Command => groups.commands.push(sub),
            SpanKind::Url => groups.links.push(sub),
            SpanKind::Bold => {
                groups.bolds.push(sub);
                markup.push((span, "<b>".to_string(), "</b>"));
            }
            SpanKind::Italic => {
                groups.italics.push(sub);
                markup.push((span, "<i>".to_string(), "</i>"));
            }
            SpanKind::Underline => {
                groups.underlines.push(sub);
                markup.push((span, "<u>".to_string(), "</u>"));
            }
            SpanKind::Strikethrough => {
                groups.strikethroughs.push(sub);
                markup.push((span, "<s>".to_string(), "</s>"));
            }
            SpanKind::Spoiler => {
                groups.spoilers.push(sub);
                markup.push((span, "<tg-spoiler>".to_string(), "</tg-spoiler>"));
            }
            SpanKind::Code => {
                groups.codes.push(sub);
                markup.push((span, "<code>".to_string(), "</code>"));
            }
            SpanKind::TextLink => {
                let url = span.url();
                groups.text_links.push((sub, url.to_string()));
                markup.push((span, format!("<a href=\"{}\">", escape_html(url)), "</a>"));
            }
            SpanKind::TextMention => {
                // A text mention without its user cannot be linked.
                if let Some(user) = span.user() {
                    groups.text_mentions.push((sub, user.clone()));
                    markup.push((span, format!("<a href=\"{}\">", user.deep_link()), "</a>"));
                }
            }
            SpanKind::Unknown => {}
        }
    }

    if markup.is_empty() {
        return Formatted {
            groups,
            html: text.to_string(),
        };
    }

    // Later entries wrap earlier ones: descending start, then shorter first so the
    // longer span encloses it. Identical ranges stay in input order (stable sort).
    markup.sort_by(|a, b| {
        let (a_start, a_end) = bounds(a.0);
        let (b_start, b_end) = bounds(b.0);
        b_start.cmp(&a_start).then(a_end.cmp(&b_end))
    });

    let mut marks: BTreeMap<usize, Marks> = BTreeMap::new();
    for (span, open, close) in markup {
        let (start, end) = bounds(span);
        marks.entry(start).or_default().opens.insert(0, open);
        marks.entry(end).or_default().closes.push(close.to_string());
    }

    let mut html = String::with_capacity(text.len() + marks.len() * 8);
    let mut cursor = 0usize;
    for (pos, m) in marks {
        html.push_str(&slice(cursor, pos));
        for tag in m.closes.iter().chain(m.opens.iter()) {
            html.push_str(tag);
        }
        cursor = pos;
    }
    html.push_str(&slice(cursor, units.len()));

    Formatted { groups, html }
}
