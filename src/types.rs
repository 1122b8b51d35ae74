//! Core types of a parsed message tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::address::AddressList;
use crate::classify::BlockType;
use crate::crypto::{CryptoArena, CryptoId, CryptoInfo};

/// A typed run of decoded message text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextBlock {
    /// Semantic type assigned by the line classifier
    #[serde(rename = "type")]
    pub block_type: BlockType,

    /// Charset the text was decoded from
    pub charset: String,

    /// The text itself, line terminators included
    pub data: String,

    /// Crypto node of this block
    pub crypto: CryptoId,
}

/// A sanitized `text/html` part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HtmlBlock {
    pub charset: String,
    pub data: String,
    pub crypto: CryptoId,
}

/// A non-textual (or non-inline) leaf part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// 1-based position among counted leaf parts
    pub ordinal: usize,

    /// Raw `Content-Id` header, empty when absent
    pub content_id: String,

    /// File name, empty when absent
    pub filename: String,

    /// Lowercase `type/subtype`
    pub mime_type: String,

    /// Decoded payload length in bytes
    pub length: usize,

    /// Stable identifier (`part:N` or a safe content id)
    pub id: String,

    pub crypto: CryptoId,
}

/// Sections of a [`MessageTree`] that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeField {
    Headers,
    TextParts,
    HtmlParts,
    Attachments,
    Addresses,
    Crypto,
}

/// Selection of tree sections to populate; everything by default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedFields {
    only: Option<BTreeSet<TreeField>>,
}

impl WantedFields {
    /// Every section
    #[must_use]
    pub const fn all() -> Self {
        Self { only: None }
    }

    /// No section at all (dates are still parsed)
    #[must_use]
    pub const fn none() -> Self {
        Self {
            only: Some(BTreeSet::new()),
        }
    }

    /// Just the listed sections
    #[must_use]
    pub fn only(fields: impl IntoIterator<Item = TreeField>) -> Self {
        Self {
            only: Some(fields.into_iter().collect()),
        }
    }

    /// Add `field` to a restricted selection
    #[must_use]
    pub fn with(mut self, field: TreeField) -> Self {
        if let Some(only) = &mut self.only {
            only.insert(field);
        }
        self
    }

    #[must_use]
    pub fn wants(&self, field: TreeField) -> bool {
        self.only.as_ref().is_none_or(|only| only.contains(&field))
    }
}

/// Structured view of one message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageTree {
    /// Every header as `(name, decoded value)`, in message order
    pub headers: Vec<(String, String)>,

    /// Parsed `Date` header
    pub date: Option<DateTime<Utc>>,

    /// Parsed address headers keyed by lowercase name
    pub addresses: BTreeMap<String, AddressList>,

    pub text_parts: Vec<TextBlock>,

    pub html_parts: Vec<HtmlBlock>,

    pub attachments: Vec<AttachmentDescriptor>,

    /// Crypto state of every part, block and attachment
    pub crypto: CryptoArena,

    /// Message-level crypto status, when crypto was requested
    pub summary: Option<CryptoInfo>,
}

impl MessageTree {
    /// First value of header `name` (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All text blocks concatenated
    #[must_use]
    pub fn text(&self) -> String {
        self.text_parts.iter().map(|b| b.data.as_str()).collect()
    }

    /// Crypto state recorded on a text block
    #[must_use]
    pub fn block_crypto(&self, index: usize) -> Option<CryptoInfo> {
        self.text_parts
            .get(index)
            .map(|block| self.crypto.info(block.crypto))
    }

    /// Attachment with the given id
    #[must_use]
    pub fn attachment(&self, id: &str) -> Option<&AttachmentDescriptor> {
        self.attachments.iter().find(|a| a.id == id)
    }
}
