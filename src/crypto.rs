//! Cryptographic status tracking and the crypto backend interface
//!
//! Every MIME part, text block and attachment owns a slot in a flat
//! [`CryptoArena`]. Slots point at their enclosing slot by index, which is
//! all that is needed to fold per-block results into a per-message status.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Outcome of checking a signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    #[default]
    None,
    Unknown,
    Unverified,
    Verified,
    Expired,
    Revoked,
    Invalid,
    Error,
}

impl SignatureStatus {
    /// Statuses that must never be hidden by a successful sibling
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Expired | Self::Revoked | Self::Invalid | Self::Error)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Unknown => 1,
            Self::Unverified => 2,
            Self::Verified => 3,
            Self::Expired => 4,
            Self::Revoked => 5,
            Self::Invalid => 6,
            Self::Error => 7,
        }
    }

    /// Combine two statuses: failures beat successes, successes beat
    /// weaker non-default statuses, which beat `none`.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

/// Outcome of decrypting data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionStatus {
    #[default]
    None,
    Decrypted,
    MissingKey,
    Error,
}

impl EncryptionStatus {
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::MissingKey | Self::Error)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Decrypted => 1,
            Self::MissingKey => 2,
            Self::Error => 3,
        }
    }

    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

/// Signature and encryption state of one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CryptoInfo {
    pub signature: SignatureStatus,
    pub encryption: EncryptionStatus,
}

impl CryptoInfo {
    /// True for the `none/none` state
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            signature: self.signature.merge(other.signature),
            encryption: self.encryption.merge(other.encryption),
        }
    }
}

/// Index of a node in a [`CryptoArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CryptoId(usize);

impl CryptoId {
    /// The message-level node every arena starts with
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One slot of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoNode {
    /// State recorded directly on this node
    pub info: CryptoInfo,
    /// Enclosing node; `None` only for the root
    pub parent: Option<CryptoId>,
    /// State after folding in every descendant
    pub aggregate: CryptoInfo,
}

/// Flat store of crypto nodes.
///
/// Nodes are only appended and a child is always created after its parent,
/// so every parent index is smaller than its children's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoArena {
    nodes: Vec<CryptoNode>,
}

impl Default for CryptoArena {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![CryptoNode {
                info: CryptoInfo::default(),
                parent: None,
                aggregate: CryptoInfo::default(),
            }],
        }
    }

    /// Append a `none/none` node under `parent`
    pub fn add(&mut self, parent: CryptoId) -> CryptoId {
        self.add_with(parent, CryptoInfo::default())
    }

    /// Append a node carrying `info` under `parent`
    pub fn add_with(&mut self, parent: CryptoId, info: CryptoInfo) -> CryptoId {
        let id = CryptoId(self.nodes.len());
        self.nodes.push(CryptoNode {
            info,
            parent: Some(parent),
            aggregate: info,
        });
        id
    }

    #[must_use]
    pub fn node(&self, id: CryptoId) -> Option<&CryptoNode> {
        self.nodes.get(id.0)
    }

    /// State recorded directly on `id`
    #[must_use]
    pub fn info(&self, id: CryptoId) -> CryptoInfo {
        self.node(id).map(|n| n.info).unwrap_or_default()
    }

    /// State of `id` including its descendants, as of the last
    /// [`mix_bubbles`](Self::mix_bubbles)
    #[must_use]
    pub fn aggregate(&self, id: CryptoId) -> CryptoInfo {
        self.node(id).map(|n| n.aggregate).unwrap_or_default()
    }

    pub fn set_signature(&mut self, id: CryptoId, status: SignatureStatus) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.info.signature = status;
        }
    }

    pub fn set_encryption(&mut self, id: CryptoId, status: EncryptionStatus) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.info.encryption = status;
        }
    }

    /// Recompute every aggregate bottom-up.
    ///
    /// Only nodes whose aggregate is not `none/none` contribute to their
    /// parent. Running this twice gives the same result.
    pub fn mix_bubbles(&mut self) {
        for node in &mut self.nodes {
            node.aggregate = node.info;
        }
        for i in (1..self.nodes.len()).rev() {
            let child = self.nodes[i];
            if let Some(parent) = child.parent
                && parent.0 < i
                && !child.aggregate.is_default()
            {
                let target = &mut self.nodes[parent.0].aggregate;
                *target = target.merge(child.aggregate);
            }
        }
    }

    /// Message-level aggregate
    #[must_use]
    pub fn summary(&self) -> CryptoInfo {
        self.aggregate(CryptoId::ROOT)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root node exists from construction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Result of a successful call to [`CryptoService::decrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub signature: SignatureStatus,
    pub encryption: EncryptionStatus,
    pub plaintext: Vec<u8>,
}

/// The operations the overlay needs from an OpenPGP implementation
pub trait CryptoService {
    /// Check a complete clear-signed armor block
    fn verify(&self, signed: &[u8]) -> Result<SignatureStatus, CryptoError>;

    /// Decrypt a complete encrypted armor block
    fn decrypt(&self, armored: &[u8]) -> Result<Decrypted, CryptoError>;
}
