//! Message tree construction

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::address::{AddressHeaderParser, AddressList};
use crate::cache::{CacheKey, DecodeMode, ParseCache};
use crate::charset::decode_text;
use crate::classify::classify_text;
use crate::config::ParserConfig;
use crate::crypto::{CryptoArena, CryptoId, CryptoService};
use crate::error::Result;
use crate::html::{BasicSanitizer, HtmlSanitizer, html_to_text};
use crate::mime::{MimeMessage, MimePart, parse_raw};
use crate::overlay::overlay_crypto;
use crate::types::{
    AttachmentDescriptor, HtmlBlock, MessageTree, TextBlock, TreeField, WantedFields,
};

/// Headers parsed into [`MessageTree::addresses`]
pub const ADDRESS_HEADERS: [&str; 5] = ["reply-to", "from", "to", "cc", "bcc"];

/// `text/plain` payloads starting like this are treated as HTML
const HTML_LOOKING_STARTS: [&str; 6] = ["<di", "<ht", "<p>", "<p ", "<ta", "<bo"];

/// Builds [`MessageTree`]s from parsed MIME messages
pub struct TreeBuilder {
    config: ParserConfig,
    sanitizer: Box<dyn HtmlSanitizer + Send + Sync>,
    addresses: AddressHeaderParser,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl std::fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TreeBuilder {
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        let addresses = AddressHeaderParser::new(config.address.clone());
        Self {
            config,
            sanitizer: Box::new(BasicSanitizer),
            addresses,
        }
    }

    /// Replace the default HTML sanitizer
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: impl HtmlSanitizer + Send + Sync + 'static) -> Self {
        self.sanitizer = Box::new(sanitizer);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse raw bytes with mailparse and build their tree
    pub fn build_from_bytes(&self, raw: &[u8], want: &WantedFields) -> Result<MessageTree> {
        let parsed = parse_raw(raw)?;
        Ok(self.build(&parsed, want))
    }

    /// Walk `message` and populate the requested sections of a tree.
    ///
    /// Never fails: undecodable parts are logged and left out.
    #[must_use]
    pub fn build(&self, message: &dyn MimeMessage, want: &WantedFields) -> MessageTree {
        let mut tree = MessageTree {
            date: extract_date(message),
            ..MessageTree::default()
        };

        if want.wants(TreeField::Headers) {
            tree.headers = message.headers();
        }
        if want.wants(TreeField::Addresses) {
            tree.addresses = self.extract_addresses(message);
        }

        let want_text = want.wants(TreeField::TextParts);
        let want_html = want.wants(TreeField::HtmlParts);
        let want_attachments = want.wants(TreeField::Attachments);
        let mut html_blocks: Vec<HtmlBlock> = Vec::new();
        let mut ordinal = 0;

        for part in message.walk() {
            if !counts_as_leaf(part) {
                continue;
            }
            ordinal += 1;

            let mimetype = part.mimetype();
            let textual = matches!(mimetype.as_str(), "text/plain" | "text/html");

            if part.is_inline() && textual {
                let is_html = mimetype == "text/html";
                // HTML is still needed for the text fallback
                if !(want_text || (is_html && want_html)) {
                    continue;
                }
                let payload = match part.payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Skipping unreadable part #{ordinal}: {e}");
                        continue;
                    }
                };
                let part_crypto = tree.crypto.add_with(CryptoId::ROOT, part.crypto());
                let decoded = decode_text(
                    &payload,
                    part.charset().as_deref(),
                    &self.config.charset_priority,
                    self.config.binary_fallback,
                );

                if is_html {
                    let data = if decoded.text.trim().is_empty() {
                        String::new()
                    } else {
                        self.sanitizer.clean(&decoded.text)
                    };
                    html_blocks.push(HtmlBlock {
                        charset: decoded.charset,
                        data,
                        crypto: part_crypto,
                    });
                } else {
                    let start: String = decoded.text.chars().take(100).collect();
                    let start = start.trim();
                    let text = if HTML_LOOKING_STARTS.iter().any(|s| start.starts_with(s)) {
                        debug!("Converting HTML-looking text part #{ordinal}");
                        html_to_text(&decoded.text)
                    } else {
                        decoded.text
                    };
                    // Whitespace-only parts usually mean an HTML-only message
                    if text.trim().is_empty() {
                        continue;
                    }
                    add_text_blocks(&mut tree, &text, &decoded.charset, part_crypto);
                }
            } else if want_attachments
                && let Some(attachment) = describe_attachment(&mut tree.crypto, part, ordinal)
            {
                tree.attachments.push(attachment);
            }
        }

        if want_text
            && tree.text_parts.is_empty()
            && let Some(html) = html_blocks.first()
        {
            debug!("No text parts, deriving text from HTML");
            let text = html_to_text(&html.data);
            add_text_blocks(&mut tree, &text, &html.charset, html.crypto);
        }
        if want_html {
            tree.html_parts = html_blocks;
        }

        if want.wants(TreeField::Crypto) {
            tree.crypto.mix_bubbles();
            tree.summary = Some(tree.crypto.summary());
        }

        debug!(
            "Built tree: {} text blocks, {} html parts, {} attachments",
            tree.text_parts.len(),
            tree.html_parts.len(),
            tree.attachments.len()
        );
        tree
    }

    fn extract_addresses(&self, message: &dyn MimeMessage) -> BTreeMap<String, AddressList> {
        let mut addresses = BTreeMap::new();
        for name in ADDRESS_HEADERS {
            let Some(raw) = message.header_bytes(name) else {
                continue;
            };
            match self.addresses.parse_bytes(&raw) {
                Ok(list) => {
                    addresses.insert(name.to_string(), list);
                }
                Err(e) => warn!("Ignoring unparseable {name} header: {e}"),
            }
        }
        addresses
    }
}

fn describe_attachment(
    arena: &mut CryptoArena,
    part: &dyn MimePart,
    ordinal: usize,
) -> Option<AttachmentDescriptor> {
    let length = match part.payload() {
        Ok(payload) => payload.len(),
        Err(e) => {
            warn!("Skipping unreadable attachment #{ordinal}: {e}");
            return None;
        }
    };
    let content_id = part.header("content-id").unwrap_or_default();
    let id = attachment_id(None, &content_id, ordinal);
    Some(AttachmentDescriptor {
        ordinal,
        filename: part.filename().unwrap_or_default(),
        mime_type: part.mimetype(),
        length,
        id,
        content_id,
        crypto: arena.add_with(CryptoId::ROOT, part.crypto()),
    })
}

fn add_text_blocks(tree: &mut MessageTree, text: &str, charset: &str, parent: CryptoId) {
    for run in classify_text(text) {
        let crypto = tree.crypto.add(parent);
        tree.text_parts.push(TextBlock {
            block_type: run.block_type,
            charset: charset.to_string(),
            data: run.data,
            crypto,
        });
    }
}

/// Whether a part takes an ordinal: containers, the PGP/MIME version part
/// and decrypted-container placeholders do not.
fn counts_as_leaf(part: &dyn MimePart) -> bool {
    !(part.is_multipart()
        || part.mimetype() == "application/pgp-encrypted"
        || part.is_crypted_container())
}

/// Parse the `Date` header, falling back to mailparse's lenient parser for
/// values chrono rejects (mismatched weekdays, obsolete zones).
fn extract_date(message: &dyn MimeMessage) -> Option<DateTime<Utc>> {
    let headers = message.headers();
    let value = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("date"))
        .map(|(_, value)| value.trim())?;
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    match mailparse::dateparse(value) {
        // 0 means no day of month was found
        Ok(0) => None,
        Ok(timestamp) => DateTime::from_timestamp(timestamp, 0),
        Err(e) => {
            debug!("Unparseable date {value:?}: {e}");
            None
        }
    }
}

/// Stable attachment id: the explicit id, else a content id that is safe to
/// embed in URLs and paths, else `part:<ordinal>`.
#[must_use]
pub fn attachment_id(explicit: Option<&str>, content_id: &str, ordinal: usize) -> String {
    if let Some(id) = explicit.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let unsafe_char =
        |c: char| c.is_whitespace() || matches!(c, ':' | '/' | '.' | '\'' | '"' | '\\');
    if content_id.is_empty() || content_id.contains(unsafe_char) {
        format!("part:{ordinal}")
    } else {
        content_id.to_string()
    }
}

/// Build a tree straight from raw message bytes with default settings
pub fn build_tree(raw: &[u8], want: &WantedFields) -> Result<MessageTree> {
    TreeBuilder::default().build_from_bytes(raw, want)
}

/// A leaf part matched by [`find_attachments`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMatch {
    pub ordinal: usize,
    pub content_id: String,
    pub filename: String,
    pub mime_type: String,
}

/// Find leaf parts by selector: `*`, `#N`, `part:N`, a content id, a MIME
/// type, a file extension or an exact file name.
///
/// Ordinals follow the same counting rule as [`TreeBuilder::build`].
#[must_use]
pub fn find_attachments(message: &dyn MimeMessage, selector: &str) -> Vec<AttachmentMatch> {
    let extension = format!(".{}", selector.to_lowercase());
    let mut found = Vec::new();
    let mut ordinal = 0;
    for part in message.walk() {
        if !counts_as_leaf(part) {
            continue;
        }
        ordinal += 1;

        let content_id = part.header("content-id").unwrap_or_default();
        let filename = part.filename().unwrap_or_default();
        let mime_type = part.mimetype();
        let matches = selector == "*"
            || selector.strip_prefix('#').is_some_and(|n| n == ordinal.to_string())
            || selector
                .strip_prefix("part:")
                .is_some_and(|n| n == ordinal.to_string())
            || (!content_id.is_empty() && content_id == selector)
            || mime_type == selector
            || (!filename.is_empty()
                && (filename.to_lowercase().ends_with(&extension) || filename == selector));
        if matches {
            found.push(AttachmentMatch {
                ordinal,
                content_id,
                filename,
                mime_type,
            });
        }
    }
    found
}

/// Build (or fetch from `cache`) the tree of message `id`.
///
/// With a crypto service the tree is stored under the decrypted mode with
/// signatures verified and armor decrypted; without one under the raw mode.
pub fn view_message(
    cache: &ParseCache<MessageTree>,
    builder: &TreeBuilder,
    id: &str,
    raw: &[u8],
    crypto: Option<&dyn CryptoService>,
) -> Result<Arc<MessageTree>> {
    let mode = if crypto.is_some() {
        DecodeMode::Decrypted
    } else {
        DecodeMode::Raw
    };
    let key = CacheKey::new(id, mode);
    if let Some(tree) = cache.get(&key) {
        debug!("Parse cache hit for {id}");
        return Ok(tree);
    }

    let mut tree = builder.build_from_bytes(raw, &WantedFields::all())?;
    if let Some(service) = crypto {
        tree = overlay_crypto(tree, service, true, true);
    }
    let tree = Arc::new(tree);
    cache.put(key, Arc::clone(&tree));
    Ok(tree)
}
