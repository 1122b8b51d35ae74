//! Access to an already-parsed MIME structure
//!
//! The tree builder never parses MIME itself. It walks a [`MimeMessage`],
//! which is implemented here for `mailparse::ParsedMail`.

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::crypto::CryptoInfo;
use crate::error::{ParseError, Result};

/// One node of a MIME structure
pub trait MimePart {
    /// Lowercase `type/subtype`
    fn mimetype(&self) -> String;

    /// True when the disposition is `inline` or absent
    fn is_inline(&self) -> bool;

    /// Charset declared in the `Content-Type` header, if any
    fn charset(&self) -> Option<String>;

    /// Payload with its transfer encoding removed
    fn payload(&self) -> Result<Vec<u8>>;

    /// First value of header `name` (case-insensitive)
    fn header(&self, name: &str) -> Option<String>;

    /// File name from `Content-Disposition` or the `Content-Type` name
    fn filename(&self) -> Option<String>;

    fn is_multipart(&self) -> bool {
        self.mimetype().starts_with("multipart/")
    }

    /// True for the opaque placeholder standing in for an encrypted
    /// container whose contents were decrypted elsewhere
    fn is_crypted_container(&self) -> bool {
        false
    }

    /// Crypto state the MIME layer already knows about (e.g. PGP/MIME)
    fn crypto(&self) -> CryptoInfo {
        CryptoInfo::default()
    }
}

/// A whole message
pub trait MimeMessage {
    /// Every header as `(name, decoded value)`, in order
    fn headers(&self) -> Vec<(String, String)>;

    /// Undecoded bytes of the first header called `name`
    fn header_bytes(&self, name: &str) -> Option<Vec<u8>>;

    /// Depth-first walk, each container before its children, starting with
    /// the message itself
    fn walk(&self) -> Vec<&dyn MimePart>;
}

impl MimePart for ParsedMail<'_> {
    fn mimetype(&self) -> String {
        self.ctype.mimetype.to_lowercase()
    }

    fn is_inline(&self) -> bool {
        // mailparse reports Inline when the header is missing
        matches!(
            self.get_content_disposition().disposition,
            DispositionType::Inline
        )
    }

    fn charset(&self) -> Option<String> {
        // ctype.charset defaults to us-ascii; only trust an explicit param
        self.ctype
            .params
            .contains_key("charset")
            .then(|| self.ctype.charset.clone())
    }

    fn payload(&self) -> Result<Vec<u8>> {
        self.get_body_raw()
            .map_err(|e| ParseError::Decode(e.to_string()))
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get_first_value(name)
    }

    fn filename(&self) -> Option<String> {
        let disposition = self.get_content_disposition();
        disposition
            .params
            .get("filename")
            .or_else(|| self.ctype.params.get("name"))
            .cloned()
    }
}

impl MimeMessage for ParsedMail<'_> {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect()
    }

    fn header_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.headers
            .iter()
            .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
            .map(|h| h.get_value_raw().to_vec())
    }

    fn walk(&self) -> Vec<&dyn MimePart> {
        let mut parts = Vec::new();
        collect_parts(self, &mut parts);
        parts
    }
}

fn collect_parts<'a>(mail: &'a ParsedMail<'_>, parts: &mut Vec<&'a dyn MimePart>) {
    parts.push(mail);
    for sub in &mail.subparts {
        collect_parts(sub, parts);
    }
}

/// Parse raw message bytes with mailparse
pub fn parse_raw(raw: &[u8]) -> Result<ParsedMail<'_>> {
    mailparse::parse_mail(raw).map_err(|e| ParseError::Structure(e.to_string()))
}
