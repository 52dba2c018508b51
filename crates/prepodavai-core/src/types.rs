// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the ledger, the request store, the queue and delivery.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Identifier of a message sent through a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Renderer,
    Observability,
}

/// Kind of content a generation request produces.
///
/// The string form doubles as the `credit_costs.operation_type` key and the
/// `{type}` path segment of `POST /generate/{type}`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    Worksheet,
    Quiz,
    Vocabulary,
    LessonPlan,
    Feedback,
    ContentAdaptation,
    Message,
    ImageGeneration,
    Photosession,
    Presentation,
    Transcription,
    TextGeneration,
}

impl GenerationType {
    /// Whether `output` is an acceptable result for this type.
    pub fn accepts(&self, output: &GenerationOutput) -> bool {
        match self {
            GenerationType::ImageGeneration => matches!(output, GenerationOutput::Image { .. }),
            GenerationType::Photosession => matches!(
                output,
                GenerationOutput::PhotoSet { .. } | GenerationOutput::Image { .. }
            ),
            GenerationType::Presentation => {
                matches!(output, GenerationOutput::Presentation { .. })
            }
            _ => matches!(
                output,
                GenerationOutput::Text { .. } | GenerationOutput::Html { .. }
            ),
        }
    }
}

/// Lifecycle status of a generation request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationStatus::Pending)
    }

    /// Only `pending -> completed` and `pending -> failed` exist.
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        matches!(self, GenerationStatus::Pending) && next.is_terminal()
    }
}

/// Markup flavour of a text result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    #[default]
    Plain,
    Markdown,
}

/// Result payload of a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationOutput {
    Text {
        content: String,
        #[serde(default)]
        format: TextFormat,
    },
    Html {
        content: String,
    },
    Image {
        url: String,
    },
    PhotoSet {
        urls: Vec<String>,
    },
    Presentation {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
}

impl GenerationOutput {
    pub fn text(content: impl Into<String>) -> Self {
        GenerationOutput::Text {
            content: content.into(),
            format: TextFormat::Plain,
        }
    }

    /// Best-effort plain-text form, used when a rich delivery is not possible.
    pub fn plain_text(&self) -> String {
        match self {
            GenerationOutput::Text { content, .. } => content.clone(),
            GenerationOutput::Html { content } => strip_tags(content),
            GenerationOutput::Image { url } => url.clone(),
            GenerationOutput::PhotoSet { urls } => urls.join("\n"),
            GenerationOutput::Presentation { url, .. } => url.clone(),
        }
    }
}

/// Elements whose end starts a new line in the plain-text form.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "ul", "ol", "table",
    "blockquote", "pre", "section", "article", "header", "footer",
];

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag: Option<String> = None;
    for c in html.chars() {
        if let Some(name) = tag.as_mut() {
            if c == '>' {
                if breaks_line(name) {
                    out.push('\n');
                }
                tag = None;
            } else {
                name.push(c);
            }
        } else if c == '<' {
            tag = Some(String::new());
        } else {
            out.push(c);
        }
    }
    let text = decode_entities(&out);
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn breaks_line(tag: &str) -> bool {
    let tag = tag.trim().trim_end_matches('/').trim().to_ascii_lowercase();
    let name = tag.split_whitespace().next().unwrap_or("");
    match name.strip_prefix('/') {
        Some(closing) => BLOCK_TAGS.contains(&closing),
        None => name == "br",
    }
}

fn decode_entities(text: &str) -> String {
    // `&amp;` last, so `&amp;lt;` stays `&lt;`.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// A generation request as persisted in `generation_requests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    pub user_id: String,
    pub generation_type: GenerationType,
    pub input_params: serde_json::Value,
    pub status: GenerationStatus,
    pub result: Option<GenerationOutput>,
    pub error: Option<String>,
    pub credit_cost: i64,
    pub sent_to_telegram: bool,
    pub telegram_sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Leading parts of a multi-part delivery already sent.
    #[serde(default)]
    pub delivered_parts: u32,
}

/// Work item handed to a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub user_id: String,
    pub generation_type: GenerationType,
    pub input_params: serde_json::Value,
}

impl From<&GenerationRequest> for GenerationJob {
    fn from(req: &GenerationRequest) -> Self {
        Self {
            id: req.id.clone(),
            user_id: req.user_id.clone(),
            generation_type: req.generation_type,
            input_params: req.input_params.clone(),
        }
    }
}

/// Subscription lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// A user's credit subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub credits_balance: i64,
    pub extra_credits: i64,
    pub credits_used: i64,
    pub overage_credits_used: i64,
    pub status: SubscriptionStatus,
    pub allow_overage: bool,
    pub overage_cost_per_credit: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Subscription {
    /// Balance the transaction chain tracks: main balance plus bonus pool.
    pub fn spendable(&self) -> i64 {
        self.credits_balance + self.extra_credits
    }
}

/// Kind of ledger entry. The amount is always positive; the sign comes from here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Grant,
    Debit,
    Refund,
    Overage,
}

impl TransactionType {
    /// Signed effect of `amount` on the spendable balance.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransactionType::Grant | TransactionType::Refund => amount,
            TransactionType::Debit | TransactionType::Overage => -amount,
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: i64,
    pub user_id: String,
    pub subscription_id: String,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub generation_request_id: Option<String>,
    pub created_at: String,
}

/// Where a document to send comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    Bytes(Vec<u8>),
    Url(String),
}

/// Output of the rendering side-channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: &'static str,
}

/// Input to the rendering side-channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderInput {
    /// Plain or markdown text, escaped before wrapping.
    Text(String),
    /// HTML document or fragment.
    Html(String),
}
