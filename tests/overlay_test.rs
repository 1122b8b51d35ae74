use email_tree::*;
use std::result::Result;
use std::cell::RefCell;

/// Scripted backend recording what it was asked to do
struct MockService {
    verify_result: Result<SignatureStatus, CryptoError>,
    decrypt_result: Result<Decrypted, CryptoError>,
    seen: RefCell<Vec<String>>,
}

impl MockService {
    fn new() -> Self {
        Self {
            verify_result: Ok(SignatureStatus::Verified),
            decrypt_result: Ok(Decrypted {
                signature: SignatureStatus::None,
                encryption: EncryptionStatus::Decrypted,
                plaintext: b"Secret plans\n".to_vec(),
            }),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl CryptoService for MockService {
    fn verify(&self, signed: &[u8]) -> Result<SignatureStatus, CryptoError> {
        self.seen
            .borrow_mut()
            .push(String::from_utf8_lossy(signed).into_owned());
        self.verify_result.clone()
    }

    fn decrypt(&self, armored: &[u8]) -> Result<Decrypted, CryptoError> {
        self.seen
            .borrow_mut()
            .push(String::from_utf8_lossy(armored).into_owned());
        self.decrypt_result.clone()
    }
}

const SIGNED: &str = "Intro\n\
                      -----BEGIN PGP SIGNED MESSAGE-----\n\
                      Hash: SHA256\n\
                      \n\
                      Signed body\n\
                      -----BEGIN PGP SIGNATURE-----\n\
                      \n\
                      iQEzBAEBCAAdFiEE\n\
                      -----END PGP SIGNATURE-----\n";

const ENCRYPTED: &str = "-----BEGIN PGP MESSAGE-----\n\
                         \n\
                         hQEMA2FzZGZhc2Rm\n\
                         -----END PGP MESSAGE-----\n";

fn tree_for(body: &str) -> MessageTree {
    let raw = format!("From: a@b.c\r\nSubject: test\r\n\r\n{body}");
    build_tree(raw.as_bytes(), &WantedFields::all()).unwrap()
}

fn data(tree: &MessageTree) -> Vec<&str> {
    tree.text_parts.iter().map(|b| b.data.as_str()).collect()
}

// --- Verification ---

#[test]
fn test_verify_success() {
    let service = MockService::new();
    let tree = overlay_crypto(tree_for(SIGNED), &service, true, false);

    assert_eq!(service.seen.borrow().len(), 1);
    assert_eq!(service.seen.borrow()[0], SIGNED.trim_start_matches("Intro\n"));

    assert_eq!(data(&tree), vec!["Intro\n", "", "Signed body\n", ""]);
    assert_eq!(
        tree.block_crypto(2).unwrap().signature,
        SignatureStatus::Verified
    );
    assert_eq!(tree.block_crypto(0), Some(CryptoInfo::default()));
    assert_eq!(tree.summary.unwrap().signature, SignatureStatus::Verified);
}

#[test]
fn test_verify_disabled() {
    let service = MockService::new();
    let before = tree_for(SIGNED);
    let tree = overlay_crypto(before.clone(), &service, false, true);
    assert!(service.seen.borrow().is_empty());
    assert_eq!(tree.text_parts, before.text_parts);
}

#[test]
fn test_invalid_signature_is_reported() {
    let mut service = MockService::new();
    service.verify_result = Ok(SignatureStatus::Invalid);
    let tree = overlay_crypto(tree_for(SIGNED), &service, true, false);
    assert_eq!(tree.summary.unwrap().signature, SignatureStatus::Invalid);
}

#[test]
fn test_invalid_beats_verified_across_runs() {
    struct Alternating(RefCell<u32>);
    impl CryptoService for Alternating {
        fn verify(&self, _: &[u8]) -> Result<SignatureStatus, CryptoError> {
            let mut calls = self.0.borrow_mut();
            *calls += 1;
            Ok(if *calls == 1 {
                SignatureStatus::Verified
            } else {
                SignatureStatus::Invalid
            })
        }
        fn decrypt(&self, _: &[u8]) -> Result<Decrypted, CryptoError> {
            Err(CryptoError::Backend("unused".into()))
        }
    }

    let body = format!("{SIGNED}between\n{}", SIGNED.trim_start_matches("Intro\n"));
    let service = Alternating(RefCell::new(0));
    let tree = overlay_crypto(tree_for(&body), &service, true, false);

    assert_eq!(*service.0.borrow(), 2);
    assert_eq!(tree.summary.unwrap().signature, SignatureStatus::Invalid);
}

#[test]
fn test_verify_error_leaves_blocks() {
    let mut service = MockService::new();
    service.verify_result = Err(CryptoError::Backend("gpg not found".into()));
    let before = tree_for(SIGNED);
    let tree = overlay_crypto(before.clone(), &service, true, false);
    assert_eq!(tree.text_parts, before.text_parts);
    assert_eq!(tree.summary, Some(CryptoInfo::default()));
}

// --- Decryption ---

#[test]
fn test_decrypt_success() {
    let service = MockService::new();
    let tree = overlay_crypto(tree_for(ENCRYPTED), &service, true, true);

    assert_eq!(service.seen.borrow()[0], ENCRYPTED);
    assert_eq!(data(&tree), vec!["", "Secret plans\n", ""]);
    assert_eq!(tree.text_parts[1].charset, "utf-8");
    assert_eq!(
        tree.block_crypto(1).unwrap().encryption,
        EncryptionStatus::Decrypted
    );
    assert_eq!(
        tree.summary,
        Some(CryptoInfo {
            signature: SignatureStatus::None,
            encryption: EncryptionStatus::Decrypted,
        })
    );
}

#[test]
fn test_decrypt_failure_leaves_blocks() {
    let mut service = MockService::new();
    service.decrypt_result = Err(CryptoError::Malformed("truncated".into()));
    let before = tree_for(ENCRYPTED);
    let tree = overlay_crypto(before.clone(), &service, true, true);

    assert_eq!(tree.text_parts, before.text_parts);
    assert_eq!(tree.summary, Some(CryptoInfo::default()));
}

#[test]
fn test_missing_key_keeps_armor() {
    let mut service = MockService::new();
    service.decrypt_result = Ok(Decrypted {
        signature: SignatureStatus::None,
        encryption: EncryptionStatus::MissingKey,
        plaintext: Vec::new(),
    });
    let before = tree_for(ENCRYPTED);
    let tree = overlay_crypto(before.clone(), &service, false, true);

    assert_eq!(data(&tree), data(&before));
    assert_eq!(
        tree.summary.unwrap().encryption,
        EncryptionStatus::MissingKey
    );
}

#[test]
fn test_binary_plaintext_is_suppressed() {
    let mut service = MockService::new();
    service.decrypt_result = Ok(Decrypted {
        signature: SignatureStatus::Verified,
        encryption: EncryptionStatus::Decrypted,
        plaintext: vec![0xff, 0xfe, 0x00, 0x81],
    });
    let priority = vec!["utf-8".to_string()];
    let tree = overlay_crypto_with(tree_for(ENCRYPTED), &service, false, true, &priority);

    assert_eq!(tree.text_parts[1].data, BINARY_SUPPRESSED);
    assert_eq!(
        tree.summary,
        Some(CryptoInfo {
            signature: SignatureStatus::Verified,
            encryption: EncryptionStatus::Decrypted,
        })
    );
}

#[test]
fn test_broken_sequence_is_not_sent() {
    let service = MockService::new();
    let body = "-----BEGIN PGP MESSAGE-----\n\nabc\n";
    let tree = overlay_crypto(tree_for(body), &service, true, true);
    assert!(service.seen.borrow().is_empty());
    assert_eq!(tree.summary, Some(CryptoInfo::default()));
}
