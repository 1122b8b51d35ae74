use email_tree::*;
use proptest::prelude::*;

fn types(runs: &[Run]) -> Vec<BlockType> {
    runs.iter().map(|r| r.block_type).collect()
}

fn joined(runs: &[Run]) -> String {
    runs.iter().map(|r| r.data.as_str()).collect()
}

const SIGNED: &str = "-----BEGIN PGP SIGNED MESSAGE-----\n\
                      Hash: SHA256\n\
                      \n\
                      Signed body\n\
                      -- \n\
                      -----BEGIN PGP SIGNATURE-----\n\
                      \n\
                      iQEzBAEBCAAdFiEE\n\
                      -----END PGP SIGNATURE-----\n";

const ENCRYPTED: &str = "-----BEGIN PGP MESSAGE-----\n\
                         Version: GnuPG v2\n\
                         \n\
                         hQEMA2FzZGZhc2Rm\n\
                         =abcd\n\
                         -----END PGP MESSAGE-----\n";

// --- Plain text ---

#[test]
fn test_signature_block() {
    let runs = classify_text("Hello\n-- \nSent from my phone\n");
    assert_eq!(types(&runs), vec![BlockType::Text, BlockType::Signature]);
    assert_eq!(runs[0].data, "Hello\n");
    assert_eq!(runs[1].data, "-- \nSent from my phone\n");
}

#[test]
fn test_signature_with_crlf() {
    let runs = classify_text("Hello\r\n-- \r\nBye\r\n");
    assert_eq!(types(&runs), vec![BlockType::Text, BlockType::Signature]);
}

#[test]
fn test_signature_swallows_rest() {
    let runs = classify_text("-- \nme\n> not a quote\n");
    assert_eq!(types(&runs), vec![BlockType::Signature]);
}

#[test]
fn test_quote_continues_over_blank_lines() {
    let runs = classify_text("> one\n\n> two\nreply\n");
    assert_eq!(types(&runs), vec![BlockType::Quote, BlockType::Text]);
    assert_eq!(runs[0].data, "> one\n\n> two\n");
}

#[test]
fn test_attribution_moves_into_quote() {
    let runs = classify_text("Sure.\nOn Monday, bob@example.com wrote:\n> question\n");
    assert_eq!(types(&runs), vec![BlockType::Text, BlockType::Quote]);
    assert_eq!(runs[0].data, "Sure.\n");
    assert_eq!(runs[1].data, "On Monday, bob@example.com wrote:\n> question\n");
}

#[test]
fn test_attribution_with_blank_line() {
    let runs = classify_text("Sure.\nbob@example.com wrote:\n\n> question\n");
    assert_eq!(runs[0].data, "Sure.\n");
    assert_eq!(runs[1].data, "bob@example.com wrote:\n\n> question\n");
}

#[test]
fn test_no_attribution_without_at_sign() {
    let runs = classify_text("Bob wrote:\n> question\n");
    assert_eq!(runs[0].data, "Bob wrote:\n");
    assert_eq!(runs[1].data, "> question\n");
}

#[test]
fn test_text_without_final_newline() {
    let runs = classify_text("no newline");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].data, "no newline");
}

#[test]
fn test_empty_input() {
    assert!(classify_text("").is_empty());
}

// --- Armor ---

#[test]
fn test_clear_signed_armor() {
    let text = format!("Intro\n{SIGNED}After\n");
    let runs = classify_text(&text);
    assert_eq!(
        types(&runs),
        vec![
            BlockType::Text,
            BlockType::PgpBeginSigned,
            BlockType::PgpSignedText,
            BlockType::PgpSignature,
            BlockType::Text,
        ]
    );
    assert_eq!(runs[2].data, "Signed body\n-- \n");
    assert!(runs[3].data.ends_with("-----END PGP SIGNATURE-----\n"));
    assert_eq!(joined(&runs), text);
}

#[test]
fn test_encrypted_armor() {
    let runs = classify_text(ENCRYPTED);
    assert_eq!(
        types(&runs),
        vec![BlockType::PgpBegin, BlockType::PgpText, BlockType::PgpEnd]
    );
    assert_eq!(runs[0].data, "-----BEGIN PGP MESSAGE-----\nVersion: GnuPG v2\n\n");
    assert_eq!(runs[1].data, "hQEMA2FzZGZhc2Rm\n=abcd\n");
    assert!(runs.iter().all(|r| r.block_type.is_pgp()));
}

#[test]
fn test_unterminated_armor_stays_open() {
    let runs = classify_text("-----BEGIN PGP MESSAGE-----\n\nabc\n-- \n> def\n");
    assert_eq!(types(&runs), vec![BlockType::PgpBegin, BlockType::PgpText]);
    assert_eq!(runs[1].data, "abc\n-- \n> def\n");
}

#[test]
fn test_classify_line_end_of_signature() {
    let (state, line_type) = classify_line("-----END PGP SIGNATURE-----\n", BlockState::PgpSignature);
    assert_eq!(state, BlockState::PgpEnd);
    assert_eq!(line_type, BlockType::PgpSignature);
    let (state, line_type) = classify_line("text\n", BlockState::PgpEnd);
    assert_eq!(state, BlockState::Body);
    assert_eq!(line_type, BlockType::Text);
}

#[test]
fn test_block_type_serializes_lowercase() {
    let json = serde_json::to_string(&BlockType::PgpBeginSigned).unwrap();
    assert_eq!(json, "\"pgpbeginsigned\"");
}

// --- Properties ---

fn line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("-- \n".to_string()),
        Just("> quoted\n".to_string()),
        Just("\n".to_string()),
        Just("bob@example.com wrote:\n".to_string()),
        Just(format!("{ARMOR_BEGIN_SIGNED}\n")),
        Just(format!("{ARMOR_BEGIN_SIGNATURE}\n")),
        Just(format!("{ARMOR_END_SIGNATURE}\n")),
        Just(format!("{ARMOR_BEGIN_ENCRYPTED}\n")),
        Just(format!("{ARMOR_END_ENCRYPTED}\n")),
        "[a-z :>@-]{0,12}\r?\n",
    ]
}

proptest! {
    #[test]
    fn classified_runs_reproduce_input(lines in prop::collection::vec(line(), 0..30)) {
        let text = lines.concat();
        let runs = classify_text(&text);
        prop_assert_eq!(joined(&runs), text);
    }

    #[test]
    fn classifier_accepts_any_text(text in ".*") {
        let runs = classify_text(&text);
        prop_assert_eq!(joined(&runs), text);
    }

    #[test]
    fn adjacent_runs_differ_in_type(lines in prop::collection::vec(line(), 0..30)) {
        let runs = classify_text(&lines.concat());
        for pair in runs.windows(2) {
            prop_assert_ne!(pair[0].block_type, pair[1].block_type);
        }
    }
}
