//! Rich dispatch message builder (LINE Flex bubble).
//!
//! The document is a typed tree serialized by serde, so customer text is
//! always a JSON string value. Quotes, braces, or control characters in an
//! address or description cannot alter the document structure.

use serde::Serialize;

use crate::order::RepairOrder;

const HEADER_TITLE: &str = "🚨 弱電維修派工單";
const HEADER_COLOR: &str = "#E63946";
const TITLE_COLOR: &str = "#ffffff";
const ISSUE_COLOR: &str = "#1D3557";
const CALL_BUTTON_COLOR: &str = "#457B9D";
const PHONE_COLOR: &str = "#1D3557";

/// Alt text shown in notifications and on clients without Flex support.
pub const ALT_TEXT: &str = "🚨 新報修工單";
pub const CALL_LABEL: &str = "📞 撥打電話";
pub const NAVIGATE_LABEL: &str = "📍 開啟導航";

/// Longest text message the push API accepts, in UTF-16 code units.
/// A longer one fails the whole push request.
pub const TEXT_MESSAGE_LIMIT: usize = 5000;

// ── Document model ──────────────────────────────────────────────────

/// A message in a push request's `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: Bubble,
    },
}

/// A single-card Flex container with header, body, and footer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "bubble")]
pub struct Bubble {
    pub header: FlexBox,
    pub body: FlexBox,
    pub footer: FlexBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexBox {
    pub layout: Layout,
    pub contents: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Text(Text),
    Separator {
        #[serde(skip_serializing_if = "Option::is_none")]
        margin: Option<String>,
    },
    Button(Button),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Text {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub wrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<UriAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    pub style: ButtonStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub action: UriAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
}

/// Opens a URI when tapped (`tel:` for calls, https for navigation).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "uri")]
pub struct UriAction {
    pub label: String,
    pub uri: String,
}

impl FlexBox {
    fn vertical(contents: Vec<Component>) -> Self {
        Self {
            layout: Layout::Vertical,
            contents,
            background_color: None,
            spacing: None,
        }
    }
}

impl Text {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A labelled, wrapping body line. The value is kept whole.
    fn field(label: &str, value: &str) -> Self {
        Self {
            text: format!("{label}：{value}"),
            size: Some("sm".into()),
            margin: Some("md".into()),
            wrap: true,
            ..Default::default()
        }
    }
}

// ── Builders ────────────────────────────────────────────────────────

/// Build the dispatch bubble for an order.
///
/// `dial_uri` and `map_url` come from [`crate::format`]; the builder does
/// no formatting of its own and has no side effects.
pub fn build_dispatch_bubble(order: &RepairOrder, dial_uri: &str, map_url: &str) -> Bubble {
    let header = FlexBox {
        background_color: Some(HEADER_COLOR.into()),
        ..FlexBox::vertical(vec![Component::Text(Text {
            weight: Some("bold".into()),
            size: Some("lg".into()),
            color: Some(TITLE_COLOR.into()),
            ..Text::new(HEADER_TITLE)
        })])
    };

    let body = FlexBox::vertical(vec![
        Component::Text(Text {
            weight: Some("bold".into()),
            size: Some("md".into()),
            wrap: true,
            ..Text::new(format!("👤 客戶：{}", order.customer_name))
        }),
        Component::Text(Text {
            color: Some(PHONE_COLOR.into()),
            action: Some(UriAction {
                label: CALL_LABEL.into(),
                uri: dial_uri.into(),
            }),
            ..Text::field("📞 電話", &order.phone)
        }),
        Component::Text(Text {
            color: Some(ISSUE_COLOR.into()),
            ..Text::field("🔧 項目", &order.issue_type)
        }),
        Component::Separator {
            margin: Some("lg".into()),
        },
        Component::Text(Text::field("📍 地址", &order.address)),
        Component::Text(Text::field("📝 詳情", &order.description)),
    ]);

    let footer = FlexBox {
        spacing: Some("sm".into()),
        ..FlexBox::vertical(vec![
            Component::Button(Button {
                style: ButtonStyle::Primary,
                color: Some(CALL_BUTTON_COLOR.into()),
                action: UriAction {
                    label: CALL_LABEL.into(),
                    uri: dial_uri.into(),
                },
            }),
            Component::Button(Button {
                style: ButtonStyle::Secondary,
                color: None,
                action: UriAction {
                    label: NAVIGATE_LABEL.into(),
                    uri: map_url.into(),
                },
            }),
        ])
    };

    Bubble {
        header,
        body,
        footer,
    }
}

/// Plain-text summary sent ahead of the bubble.
pub fn build_text_summary(order: &RepairOrder, dial_uri: &str, map_url: &str) -> String {
    format!(
        "🚨 新報修工單\n客戶：{}\n電話：{}（{}）\n地址：{}\n項目：{}\n詳情：{}\n導航：{}",
        order.customer_name,
        order.phone,
        dial_uri,
        order.address,
        order.issue_type,
        order.description,
        map_url,
    )
}

/// Cut `text` to the text-message limit, marking the cut with `…`.
fn fit_text_message(text: String) -> String {
    if text.encode_utf16().count() <= TEXT_MESSAGE_LIMIT {
        return text;
    }
    let mut units = 0;
    let mut out: String = text
        .chars()
        .take_while(|c| {
            units += c.len_utf16();
            units < TEXT_MESSAGE_LIMIT
        })
        .collect();
    out.push('…');
    out
}

/// Both messages for one order, summary first.
///
/// Only the summary is shortened when it is too long; the bubble always
/// carries every field in full.
pub fn build_dispatch_messages(order: &RepairOrder, dial_uri: &str, map_url: &str) -> Vec<PushMessage> {
    vec![
        PushMessage::Text {
            text: fit_text_message(build_text_summary(order, dial_uri, map_url)),
        },
        PushMessage::Flex {
            alt_text: ALT_TEXT.into(),
            contents: build_dispatch_bubble(order, dial_uri, map_url),
        },
    ]
}
