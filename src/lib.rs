// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Message Tree Parser
//!
//! Turns raw, possibly malformed email messages into a tree of typed content
//! blocks, with OpenPGP results layered on top.
//!
//! # Features
//!
//! - Permissive parsing of address headers, including broken ones
//! - Classification of body text into text, quotes, signatures and armor
//! - Attachment descriptors with stable ids
//! - HTML sanitizing and HTML-to-text fallback
//! - Crypto overlay through a pluggable [`CryptoService`]
//! - A bounded, thread-safe cache of built trees
//!
//! # Example
//!
//! ```rust
//! use email_tree::{BlockType, WantedFields, build_tree};
//!
//! let raw = b"From: Bjarni [mailto:bre@klaki.net]\r\n\
//!             Subject: Hello\r\n\
//!             \r\n\
//!             Hi there\n-- \nSent from my phone\n";
//! let tree = build_tree(raw, &WantedFields::all()).unwrap();
//!
//! let from = &tree.addresses["from"].records[0];
//! assert_eq!(from.address, "bre@klaki.net");
//! assert_eq!(from.display_name, "Bjarni");
//!
//! assert_eq!(tree.text_parts[0].block_type, BlockType::Text);
//! assert_eq!(tree.text_parts[1].block_type, BlockType::Signature);
//! ```

mod address;
mod cache;
mod charset;
mod classify;
mod config;
mod crypto;
mod error;
mod html;
mod mime;
mod overlay;
mod parser;
mod types;

pub use address::{
    AddressHeaderParser, AddressList, AddressRecord, KeyDescriptor, NormalizeOptions, ParsePass,
    escape, extract_email_and_name, extract_emails, quote, run_pass, unescape,
};
pub use cache::{CacheKey, DecodeMode, ParseCache};
pub use charset::{
    BINARY_SUPPRESSED, DecodedText, EIGHT_BIT, decode_encoded_words, decode_header_bytes,
    decode_strict, decode_text, encode_text, q_encode,
};
pub use classify::{
    ARMOR_BEGIN_ENCRYPTED, ARMOR_BEGIN_SIGNATURE, ARMOR_BEGIN_SIGNED, ARMOR_END_ENCRYPTED,
    ARMOR_END_SIGNATURE, BlockState, BlockType, Run, classify_line, classify_text,
};
pub use config::{AddressConfig, BinaryFallback, DEFAULT_CACHE_CAPACITY, ParserConfig};
pub use crypto::{
    CryptoArena, CryptoId, CryptoInfo, CryptoNode, CryptoService, Decrypted, EncryptionStatus,
    SignatureStatus,
};
pub use error::{CryptoError, ParseError, Result};
pub use html::{BasicSanitizer, HtmlSanitizer, html_to_text};
pub use mime::{MimeMessage, MimePart, parse_raw};
pub use overlay::{overlay_crypto, overlay_crypto_with};
pub use parser::{
    ADDRESS_HEADERS, AttachmentMatch, TreeBuilder, attachment_id, build_tree, find_attachments,
    view_message,
};
pub use types::*;
