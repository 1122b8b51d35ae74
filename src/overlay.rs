//! Applying crypto service results to a built message tree
//!
//! Text blocks are scanned in order for the three-block armor sequences
//! produced by the classifier. Each complete sequence is handed to the
//! [`CryptoService`]; successful results are recorded on the middle block
//! and the armor lines around it are blanked.

use tracing::{debug, warn};

use crate::charset::{decode_text, encode_text};
use crate::classify::BlockType;
use crate::config::BinaryFallback;
use crate::crypto::{CryptoService, EncryptionStatus};
use crate::types::MessageTree;

const VERIFY_RUN: [BlockType; 3] = [
    BlockType::PgpBeginSigned,
    BlockType::PgpSignedText,
    BlockType::PgpSignature,
];

const DECRYPT_RUN: [BlockType; 3] = [BlockType::PgpBegin, BlockType::PgpText, BlockType::PgpEnd];

/// Tracks progress through one expected block sequence
#[derive(Debug)]
struct RunTracker {
    sequence: [BlockType; 3],
    blocks: Vec<usize>,
}

impl RunTracker {
    const fn new(sequence: [BlockType; 3]) -> Self {
        Self {
            sequence,
            blocks: Vec::new(),
        }
    }

    /// Feed the block at `index`; returns the three block indices once the
    /// sequence completes.
    fn feed(&mut self, index: usize, block_type: BlockType) -> Option<[usize; 3]> {
        if block_type == self.sequence[0] {
            self.blocks.clear();
            self.blocks.push(index);
            return None;
        }
        if self.blocks.is_empty() || self.sequence.get(self.blocks.len()) != Some(&block_type) {
            self.blocks.clear();
            return None;
        }
        self.blocks.push(index);
        if let [first, middle, last] = self.blocks[..] {
            self.blocks.clear();
            return Some([first, middle, last]);
        }
        None
    }
}

fn armored_bytes(tree: &MessageTree, run: [usize; 3]) -> Vec<u8> {
    run.iter()
        .filter_map(|&i| tree.text_parts.get(i))
        .flat_map(|block| encode_text(&block.data, &block.charset))
        .collect()
}

fn blank(tree: &mut MessageTree, index: usize) {
    if let Some(block) = tree.text_parts.get_mut(index) {
        block.data.clear();
    }
}

/// Verify signed runs and/or decrypt encrypted runs, then recompute the
/// message-level summary. Decrypted payloads are decoded as UTF-8, falling
/// back to Latin-1.
#[must_use]
pub fn overlay_crypto(
    tree: MessageTree,
    service: &dyn CryptoService,
    verify: bool,
    decrypt: bool,
) -> MessageTree {
    let priority = ["utf-8".to_string(), "iso-8859-1".to_string()];
    overlay_crypto_with(tree, service, verify, decrypt, &priority)
}

/// As [`overlay_crypto`], decoding decrypted payloads with `priority`
#[must_use]
pub fn overlay_crypto_with(
    mut tree: MessageTree,
    service: &dyn CryptoService,
    verify: bool,
    decrypt: bool,
    priority: &[String],
) -> MessageTree {
    let mut signed = RunTracker::new(VERIFY_RUN);
    let mut encrypted = RunTracker::new(DECRYPT_RUN);

    for index in 0..tree.text_parts.len() {
        let block_type = tree.text_parts[index].block_type;

        if verify && let Some(run) = signed.feed(index, block_type) {
            match service.verify(&armored_bytes(&tree, run)) {
                Ok(status) => {
                    debug!("Signature on block {} is {status:?}", run[1]);
                    let node = tree.text_parts[run[1]].crypto;
                    tree.crypto.set_signature(node, status);
                    blank(&mut tree, run[0]);
                    blank(&mut tree, run[2]);
                }
                Err(e) => warn!("Signature verification failed: {e}"),
            }
        }

        if decrypt && let Some(run) = encrypted.feed(index, block_type) {
            match service.decrypt(&armored_bytes(&tree, run)) {
                Ok(result) => {
                    debug!("Decryption of block {} is {:?}", run[1], result.encryption);
                    let node = tree.text_parts[run[1]].crypto;
                    tree.crypto.set_signature(node, result.signature);
                    tree.crypto.set_encryption(node, result.encryption);
                    if result.encryption == EncryptionStatus::Decrypted {
                        let text = decode_text(
                            &result.plaintext,
                            None,
                            priority,
                            BinaryFallback::Suppress,
                        );
                        let middle = &mut tree.text_parts[run[1]];
                        middle.data = text.text;
                        middle.charset = text.charset;
                        blank(&mut tree, run[0]);
                        blank(&mut tree, run[2]);
                    }
                }
                Err(e) => warn!("Decryption failed: {e}"),
            }
        }
    }

    tree.crypto.mix_bubbles();
    tree.summary = Some(tree.crypto.summary());
    tree
}
