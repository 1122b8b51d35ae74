//! Permissive parsing of address headers (`From`, `To`, `Cc`, ...)
//!
//! Real-world address headers are frequently broken: missing commas,
//! `[mailto:...]` decorations, unquoted names, addresses split around the
//! `@`, encoded-words glued to neighbouring text. The parser works in passes.
//! The first pass tokenizes the header as-is; if any group of tokens lacks an
//! address, later passes munge the text (inserting spaces, stripping angle
//! brackets and quotes) and loosen the address test before trying again.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::charset::{decode_encoded_words, decode_header_bytes, q_encode};
use crate::config::AddressConfig;
use crate::error::{ParseError, Result};

static TOKENIZER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<[^<>]*>",                    // <stuff>
        r"|\([^()]*\)",                 // (stuff)
        r"|\[[^\[\]]*\]",               // [stuff]
        r#"|"(?:\\\\|\\"|[^"])*""#,     // "stuff"
        r"|'(?:\\\\|\\'|[^'])*'",       // 'stuff'
        r"|=\?[^?\s]+\?[QqBb]\?[^?\s]+\?=", // =?stuff?=
        r"|,",
        r"|;",
        r"|\s+",
        r"|[^\s;,]+",
    ))
    .unwrap()
});

static SPACE_BEFORE_ANGLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S)(<)").unwrap());

static SPACE_BEFORE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S)(=\?)").unwrap());

static STRIPPED_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>"]"#).unwrap());

static IGNORED_GROUP_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^undisclosed").unwrap());

static MUNGE_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:\bmailto:|[\s"']|\?$)"#).unwrap());

static MAYBE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^()<>@,;:\\"\[\]\s\x00-\x19]+@[a-zA-Z0-9_.\-]+(?:#[A-Za-z0-9]+)?$"#).unwrap()
});

static ESCAPES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\\([\\"'])"#).unwrap());

static SHOULD_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"([\\"'])"#).unwrap());

static SHOULD_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^a-zA-Z0-9().:/_ '"+@-]"#).unwrap());

static LEADING_CRAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^['"<(]+"#).unwrap());

static TRAILING_CRAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['">);]+$"#).unwrap());

static WORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]+").unwrap());

/// An OpenPGP key reference attached to an address as `addr#fingerprint`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub fingerprint: String,
}

/// One `(name, address)` pair recovered from a header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressRecord {
    /// `local@domain`, without any key suffix
    pub address: String,

    /// Everything else in the group, cleaned up
    pub display_name: String,

    /// Keys named by a `#fingerprint` suffix
    pub keys: Vec<KeyDescriptor>,
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "<{}>", self.address)
        } else {
            write!(f, "{} <{}>", quote(&self.display_name), self.address)
        }
    }
}

/// Which pass of the parser produced a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParsePass {
    /// Header tokenized as-is
    Strict,
    /// Spaces inserted before `<` and encoded-words
    Spaced,
    /// As `Spaced`, with `<`, `>` and `"` removed
    Stripped,
}

impl ParsePass {
    const fn munges(self) -> bool {
        !matches!(self, Self::Strict)
    }
}

/// Options for [`AddressList::normalized_addresses`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Quote (or encode) display names
    pub quote: bool,
    /// Re-attach the first key fingerprint as `#fingerprint`
    pub with_keys: bool,
    /// Use the address as name when there is none
    pub force_name: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            quote: true,
            with_keys: false,
            force_name: false,
        }
    }
}

/// Parsed address header, tagged with the pass that succeeded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressList {
    pub pass: ParsePass,
    pub records: Vec<AddressRecord>,
}

impl AddressList {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, AddressRecord> {
        self.records.iter()
    }

    /// Re-serialize every record as `"Name" <address>`
    #[must_use]
    pub fn normalized_addresses(&self, options: NormalizeOptions) -> Vec<String> {
        self.records
            .iter()
            .map(|record| normalize_record(record, options))
            .collect()
    }

    /// All records normalized with default options, joined by `, `
    #[must_use]
    pub fn normalized(&self) -> String {
        self.normalized_addresses(NormalizeOptions::default())
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a AddressRecord;
    type IntoIter = std::slice::Iter<'a, AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn normalize_record(record: &AddressRecord, options: NormalizeOptions) -> String {
    let address = match record.keys.first() {
        Some(key) if options.with_keys => format!("<{}#{}>", record.address, key.fingerprint),
        _ => format!("<{}>", record.address),
    };
    let name = if record.display_name.is_empty() {
        if options.force_name {
            record.address.as_str()
        } else {
            return address;
        }
    } else {
        record.display_name.as_str()
    };
    if options.quote {
        format!("{} {address}", quote(name))
    } else {
        format!("{name} {address}")
    }
}

/// Parser for `From`/`To`/`Cc` style headers
#[derive(Debug, Clone, Default)]
pub struct AddressHeaderParser {
    config: AddressConfig,
}

impl AddressHeaderParser {
    #[must_use]
    pub const fn new(config: AddressConfig) -> Self {
        Self { config }
    }

    /// Parse raw header bytes, decoding them with the configured charsets
    pub fn parse_bytes(&self, data: &[u8]) -> Result<AddressList> {
        self.parse(&decode_header_bytes(data, &self.config.charset_order))
    }

    /// Parse a header value, falling back to sloppier passes as needed
    pub fn parse(&self, header: &str) -> Result<AddressList> {
        if self.config.strict {
            let records = run_pass(header, ParsePass::Strict, self.config.raise)?;
            return Ok(AddressList {
                pass: ParsePass::Strict,
                records,
            });
        }

        for pass in [ParsePass::Strict, ParsePass::Spaced] {
            let require_all = pass == ParsePass::Strict || self.config.raise;
            match run_pass(header, pass, require_all) {
                Ok(records) => return Ok(AddressList { pass, records }),
                Err(e) => debug!("Address pass {pass:?} failed: {e}"),
            }
        }

        let records = run_pass(header, ParsePass::Stripped, self.config.raise)?;
        Ok(AddressList {
            pass: ParsePass::Stripped,
            records,
        })
    }
}

/// Run a single pass over `header`.
///
/// With `require_all`, a group without an address fails the whole pass;
/// otherwise such groups are dropped.
pub fn run_pass(header: &str, pass: ParsePass, require_all: bool) -> Result<Vec<AddressRecord>> {
    let groups = group_tokens(&tokenize(header, pass));
    let mut records = Vec::with_capacity(groups.len());
    for group in &groups {
        match find_address(group, pass.munges()) {
            Some(record) => records.push(record),
            None if require_all => {
                return Err(ParseError::AddressNotFound(group.join(" ")));
            }
            None => warn!("Dropping address-less group {group:?}"),
        }
    }
    Ok(records)
}

fn tokenize(header: &str, pass: ParsePass) -> Vec<String> {
    let mut text = header.to_string();
    if pass.munges() {
        text = SPACE_BEFORE_ANGLE.replace_all(&text, "$1 $2").into_owned();
        text = SPACE_BEFORE_WORD.replace_all(&text, "$1 $2").into_owned();
    }
    if pass == ParsePass::Stripped {
        text = STRIPPED_CHARS.replace_all(&text, "").into_owned();
    }
    TOKENIZER
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn clean(token: &str) -> String {
    if let Some(q) = token.chars().next().filter(|c| *c == '"' || *c == '\'') {
        if token.len() == 1 {
            return String::new();
        }
        if token.ends_with(q) {
            return unescape(&token[1..token.len() - 1]);
        }
        return token.to_string();
    }
    if let Some(inner) = token
        .strip_prefix("[mailto:")
        .and_then(|t| t.strip_suffix(']'))
    {
        return format!("<{inner}>");
    }
    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return inner.to_string();
    }
    token.to_string()
}

fn group_tokens(tokens: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = vec![Vec::new()];
    for raw in tokens {
        let token = raw.trim();
        if (token == "," || token == ";")
            && let Some(current) = groups.last_mut()
            && !current.is_empty()
        {
            // Separators only close groups that already have an address
            if current.iter().any(|t| t.contains('@')) {
                groups.push(Vec::new());
                continue;
            }
            if current.iter().any(|t| IGNORED_GROUP_TOKEN.is_match(t)) {
                current.clear();
                continue;
            }
        }
        if !token.is_empty()
            && let Some(current) = groups.last_mut()
        {
            current.push(decode_encoded_words(&clean(token)));
        }
    }
    if groups.last().is_some_and(Vec::is_empty) {
        groups.pop();
    }
    groups
}

fn munged(token: &str, munge: bool) -> String {
    if munge {
        MUNGE_STRIP.replace_all(token, "").into_owned()
    } else {
        token.to_string()
    }
}

/// Rejoin `bre @klaki.net` and `bre@ klaki.net` style splits
fn rejoin_split_addresses(group: &mut Vec<String>) {
    for i in 0..group.len() {
        if i > 0 && i < group.len() && group[i].starts_with('@') {
            let tail = group.remove(i);
            group[i - 1].push_str(&tail);
        } else if i + 1 < group.len() && group[i].ends_with('@') {
            let tail = group.remove(i + 1);
            group[i].push_str(&tail);
        }
    }
}

fn find_address(group: &[String], munge: bool) -> Option<AddressRecord> {
    if group.is_empty() {
        return None;
    }
    let mut group = group.to_vec();
    if munge {
        rejoin_split_addresses(&mut group);
    }

    let angled = group.iter().enumerate().find_map(|(i, token)| {
        let inner = token.strip_prefix('<')?.strip_suffix('>')?;
        let candidate = munged(inner, munge);
        MAYBE_EMAIL.is_match(&candidate).then_some((i, candidate))
    });
    let found = angled.or_else(|| {
        group.iter().enumerate().find_map(|(i, token)| {
            let candidate = munged(token, munge);
            MAYBE_EMAIL.is_match(&candidate).then_some((i, candidate))
        })
    });

    let (index, email) = found?;
    group[index] = email;
    Some(record_at(group, index))
}

fn record_at(mut group: Vec<String>, index: usize) -> AddressRecord {
    for token in &mut group {
        if token.len() >= 2 && token.starts_with('(') && token.ends_with(')') {
            *token = token[1..token.len() - 1].to_string();
        }
    }
    let email = group.remove(index);
    let display_name = group
        .join(" ")
        .replace(" ,", ",")
        .replace(" ;", ";")
        .trim()
        .to_string();

    let at = email.find('@').unwrap_or(0);
    let (address, keys) = match email[at..].rsplit_once('#') {
        Some((domain, fingerprint)) => (
            format!("{}{domain}", &email[..at]),
            vec![KeyDescriptor {
                fingerprint: fingerprint.to_string(),
            }],
        ),
        None => (email, Vec::new()),
    };

    AddressRecord {
        address,
        display_name,
        keys,
    }
}

/// Remove backslash escapes in front of `\`, `"` and `'`
#[must_use]
pub fn unescape(s: &str) -> String {
    ESCAPES.replace_all(s, "$1").into_owned()
}

/// Backslash-escape `\`, `"` and `'`
#[must_use]
pub fn escape(s: &str) -> String {
    SHOULD_ESCAPE.replace_all(s, r"\$1").into_owned()
}

/// Quote a display name for a header: a double-quoted string when it only
/// uses safe ASCII, otherwise a UTF-8 `Q` encoded-word.
#[must_use]
pub fn quote(name: &str) -> String {
    if SHOULD_QUOTE.is_match(name) {
        format!("=?utf-8?Q?{}?=", q_encode(name))
    } else {
        format!("\"{}\"", escape(name))
    }
}

/// Scrape anything that looks like an address out of free text.
///
/// With `strip_keys`, `#fingerprint` suffixes are removed. Non-ASCII
/// characters are dropped since addresses may only contain ASCII.
#[must_use]
pub fn extract_emails(text: &str, strip_keys: bool) -> Vec<String> {
    let spaced = text.replace('<', " <").replace('(', " (");
    WORD_SPLIT
        .split(&spaced)
        .map(str::trim)
        .filter(|word| word.contains('@'))
        .map(|word| {
            let word = LEADING_CRAP.replace(word, "");
            let mut word = TRAILING_CRAP.replace(&word, "").into_owned();
            if strip_keys
                && let Some(at) = word.find('@')
                && let Some(hash) = word[at..].find('#')
            {
                word.truncate(at + hash);
            }
            word.chars().filter(char::is_ascii).collect::<String>()
        })
        .collect()
}

/// First address in `text` and whatever is left as a name.
/// The name falls back to the address when nothing remains.
#[must_use]
pub fn extract_email_and_name(text: &str) -> (String, String) {
    let email = extract_emails(text, true)
        .into_iter()
        .next()
        .unwrap_or_default();
    let mut rest = text.to_string();
    if !email.is_empty() {
        rest = rest.replace(&email, "");
    }
    let name = rest
        .replace("<>", "")
        .replace(['"', '(', ')'], "")
        .trim()
        .to_string();
    if name.is_empty() {
        (email.clone(), email)
    } else {
        (email, name)
    }
}
