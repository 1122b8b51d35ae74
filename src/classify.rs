//! Line-by-line classification of message text into typed blocks
//!
//! Each line is fed through a small state machine together with the state
//! left by the previous line. Consecutive lines of the same type are merged
//! into one run. Concatenating the runs in order always reproduces the input.

use serde::{Deserialize, Serialize};

/// OpenPGP armor header of a clear-signed message
pub const ARMOR_BEGIN_SIGNED: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
/// OpenPGP armor header of a detached signature
pub const ARMOR_BEGIN_SIGNATURE: &str = "-----BEGIN PGP SIGNATURE-----";
/// OpenPGP armor footer of a signature
pub const ARMOR_END_SIGNATURE: &str = "-----END PGP SIGNATURE-----";
/// OpenPGP armor header of an encrypted message
pub const ARMOR_BEGIN_ENCRYPTED: &str = "-----BEGIN PGP MESSAGE-----";
/// OpenPGP armor footer of an encrypted message
pub const ARMOR_END_ENCRYPTED: &str = "-----END PGP MESSAGE-----";

/// Signature separators, including the dash-escaped form found inside
/// clear-signed text.
const SIGNATURE_DELIMITERS: [&str; 4] = ["-- \n", "-- \r\n", "- --\n", "- --\r\n"];

/// Semantic type of a run of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Quote,
    Signature,
    PgpBeginSigned,
    PgpSignedText,
    PgpSignature,
    PgpBegin,
    PgpText,
    PgpEnd,
}

impl BlockType {
    /// True for the armor sub-states
    #[must_use]
    pub const fn is_pgp(self) -> bool {
        !matches!(self, Self::Text | Self::Quote | Self::Signature)
    }
}

/// Classifier state carried from one line to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlockState {
    #[default]
    Body,
    Quote,
    Signature,
    PgpBeginSigned,
    PgpSignedText,
    PgpSignature,
    PgpBegin,
    PgpText,
    PgpEnd,
}

/// A run of consecutive lines sharing one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub block_type: BlockType,
    pub data: String,
}

/// Classify one line (including its terminator) given the current state.
///
/// Every `(state, line)` pair yields exactly one result; anything not
/// matched by a more specific rule is body text.
#[must_use]
pub fn classify_line(line: &str, state: BlockState) -> (BlockState, BlockType) {
    use BlockState as S;
    use BlockType as T;

    if matches!(state, S::Body | S::Quote) && SIGNATURE_DELIMITERS.contains(&line) {
        return (S::Signature, T::Signature);
    }
    if state == S::Signature {
        return (S::Signature, T::Signature);
    }

    let stripped = line.trim_end();

    if stripped == ARMOR_BEGIN_SIGNED {
        return (S::PgpBeginSigned, T::PgpBeginSigned);
    }
    match state {
        S::PgpBeginSigned => {
            return if line.starts_with("Hash: ") || stripped.is_empty() {
                (S::PgpBeginSigned, T::PgpBeginSigned)
            } else {
                (S::PgpSignedText, T::PgpSignedText)
            };
        }
        S::PgpSignedText => {
            return if stripped == ARMOR_BEGIN_SIGNATURE {
                (S::PgpSignature, T::PgpSignature)
            } else {
                (S::PgpSignedText, T::PgpSignedText)
            };
        }
        S::PgpSignature => {
            // The END line still belongs to the signature block
            return if stripped == ARMOR_END_SIGNATURE {
                (S::PgpEnd, T::PgpSignature)
            } else {
                (S::PgpSignature, T::PgpSignature)
            };
        }
        _ => {}
    }

    if stripped == ARMOR_BEGIN_ENCRYPTED {
        return (S::PgpBegin, T::PgpBegin);
    }
    match state {
        S::PgpBegin => {
            return if line.contains(':') || stripped.is_empty() {
                (S::PgpBegin, T::PgpBegin)
            } else {
                (S::PgpText, T::PgpText)
            };
        }
        S::PgpText => {
            return if stripped == ARMOR_END_ENCRYPTED {
                (S::PgpEnd, T::PgpEnd)
            } else {
                (S::PgpText, T::PgpText)
            };
        }
        _ => {}
    }

    if state == S::Quote && stripped.is_empty() {
        return (S::Quote, T::Quote);
    }
    if line.starts_with('>') {
        return (S::Quote, T::Quote);
    }

    (S::Body, T::Text)
}

/// How many trailing lines of the previous run are an attribution
/// ("On Monday, bob@example.com wrote:") that belongs with the quote.
fn attribution_lines(lines: &[&str]) -> usize {
    match lines {
        [.., last] if last.contains('@') => 1,
        [_, .., before, last] if before.contains('@') && last.trim().is_empty() => 2,
        _ => 0,
    }
}

/// Split `text` into typed runs. Lines keep their terminators.
///
/// Armor that is never closed leaves the remaining input in its open state.
#[must_use]
pub fn classify_text(text: &str) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut state = BlockState::default();

    for line in text.split_inclusive('\n') {
        let (next, line_type) = classify_line(line, state);
        state = next;

        if runs.last().is_none_or(|run| run.block_type != line_type) {
            let carried = if line_type == BlockType::Quote {
                attribution_lines(&lines)
            } else {
                0
            };
            if carried > 0 {
                let keep = lines.len() - carried;
                if let Some(previous) = runs.last_mut() {
                    previous.data = lines[..keep].concat();
                }
                lines.drain(..keep);
            } else {
                lines.clear();
            }
            runs.push(Run {
                block_type: line_type,
                data: lines.concat(),
            });
        }

        if let Some(run) = runs.last_mut() {
            run.data.push_str(line);
        }
        lines.push(line);
    }

    runs
}
