use email_tree::*;

const HEADER_DATA: &str = "
    bre@klaki.net  ,
    bre@klaki.net Bjarni ,
    bre@klaki.net bre@klaki.net,
    bre@klaki.net (bre@notmail.com),
    bre@klaki.net ((nested) bre@notmail.com comment),
    (FIXME: (nested) bre@wrongmail.com parser breaker) bre@klaki.net,
    undisclosed-recipients-gets-ignored:,
    Bjarni [mailto:bre@klaki.net],
    \"This is a key test\" <bre@klaki.net#61A015763D28D410A87B197328191D9B3B4199B4>,
    bre@klaki.net (Bjarni Runar Einar's son);
    Bjarni is bre @klaki.net,
    Bjarni =?iso-8859-1?Q?Runar?=Einarsson<' bre'@ klaki.net>,
";

const EXPECTED_NORMALIZED: [&str; 11] = [
    "<bre@klaki.net>",
    "\"Bjarni\" <bre@klaki.net>",
    "\"bre@klaki.net\" <bre@klaki.net>",
    "\"bre@notmail.com\" <bre@klaki.net>",
    "\"(nested bre@notmail.com comment)\" <bre@klaki.net>",
    "\"(FIXME: nested parser breaker) bre@klaki.net\" <bre@wrongmail.com>",
    "\"Bjarni\" <bre@klaki.net>",
    "\"This is a key test\" <bre@klaki.net>",
    "\"Bjarni Runar Einar\\'s son\" <bre@klaki.net>",
    "\"Bjarni is\" <bre@klaki.net>",
    "\"Bjarni Runar Einarsson\" <bre@klaki.net>",
];

fn parse(header: &str) -> AddressList {
    AddressHeaderParser::default().parse(header).unwrap()
}

// --- Multi-pass parsing ---

#[test]
fn test_messy_header_normalizes() {
    let list = parse(HEADER_DATA);
    assert_eq!(list.pass, ParsePass::Spaced);
    assert_eq!(
        list.normalized_addresses(NormalizeOptions::default()),
        EXPECTED_NORMALIZED
    );
}

#[test]
fn test_messy_header_second_entry() {
    let list = parse(HEADER_DATA);
    assert_eq!(list.records[1].display_name, "Bjarni");
    assert_eq!(list.records[1].address, "bre@klaki.net");
}

#[test]
fn test_mailto_brackets() {
    let list = parse("Bjarni [mailto:bre@klaki.net]");
    assert_eq!(list.pass, ParsePass::Strict);
    assert_eq!(list.len(), 1);
    assert_eq!(list.records[0].address, "bre@klaki.net");
    assert_eq!(list.records[0].display_name, "Bjarni");
}

#[test]
fn test_key_suffix_becomes_descriptor() {
    let list = parse(
        "\"This is a key test\" <bre@klaki.net#61A015763D28D410A87B197328191D9B3B4199B4>",
    );
    let record = &list.records[0];
    assert_eq!(record.address, "bre@klaki.net");
    assert_eq!(record.display_name, "This is a key test");
    assert_eq!(
        record.keys,
        vec![KeyDescriptor {
            fingerprint: "61A015763D28D410A87B197328191D9B3B4199B4".into()
        }]
    );
}

#[test]
fn test_normalize_with_keys() {
    let list = parse("Bjarni <b@c.x#61A015763D28D4>");
    let options = NormalizeOptions {
        with_keys: true,
        ..NormalizeOptions::default()
    };
    assert_eq!(
        list.normalized_addresses(options),
        vec!["\"Bjarni\" <b@c.x#61A015763D28D4>"]
    );
}

#[test]
fn test_unquoted_name_around_address() {
    assert_eq!(
        parse("Weird email@somewhere.com Header").normalized(),
        "\"Weird Header\" <email@somewhere.com>"
    );
}

#[test]
fn test_unicode_name() {
    let list = parse("Bjarni R\u{fa}nar <b@c.x#61A015763D28D4>");
    assert_eq!(list.records[0].display_name, "Bjarni R\u{fa}nar");
    assert_eq!(list.records[0].address, "b@c.x");
}

#[test]
fn test_unicode_name_is_encoded_when_quoted() {
    let list = parse("Bjarni R\u{fa}nar <b@c.x>");
    assert_eq!(list.normalized(), "=?utf-8?Q?Bjarni_R=C3=BAnar?= <b@c.x>");
}

#[test]
fn test_force_name_and_no_quote() {
    let list = parse("<a@b.c>, Alice <alice@b.c>");
    let options = NormalizeOptions {
        quote: false,
        force_name: true,
        ..NormalizeOptions::default()
    };
    assert_eq!(
        list.normalized_addresses(options),
        vec!["a@b.c <a@b.c>", "Alice <alice@b.c>"]
    );
}

#[test]
fn test_encoded_word_name() {
    let list = parse("=?utf-8?B?QmrDtnJr?= <bjork@example.is>");
    assert_eq!(list.records[0].display_name, "Bj\u{f6}rk");
}

#[test]
fn test_undisclosed_recipients_ignored() {
    let list = parse("undisclosed-recipients:;");
    assert!(list.is_empty());
}

#[test]
fn test_parse_bytes_latin1() {
    let parser = AddressHeaderParser::default();
    let list = parser.parse_bytes(b"J\xf3n <jon@example.is>").unwrap();
    assert_eq!(list.records[0].display_name, "J\u{f3}n");
}

// --- Error behaviour ---

#[test]
fn test_missing_address_dropped_by_default() {
    let list = parse("nobody here");
    assert_eq!(list.pass, ParsePass::Spaced);
    assert!(list.is_empty());
}

#[test]
fn test_comma_before_any_address_does_not_split() {
    let list = parse("nobody here, alice@example.com");
    assert_eq!(list.len(), 1);
    assert_eq!(list.records[0].address, "alice@example.com");
    assert_eq!(list.records[0].display_name, "nobody here,");
}

#[test]
fn test_raise_when_no_pass_succeeds() {
    let parser = AddressHeaderParser::new(AddressConfig {
        raise: true,
        ..AddressConfig::default()
    });
    let err = parser.parse("nobody here").unwrap_err();
    assert!(matches!(err, ParseError::AddressNotFound(_)));
}

#[test]
fn test_strict_only_runs_first_pass() {
    let parser = AddressHeaderParser::new(AddressConfig {
        strict: true,
        raise: true,
        ..AddressConfig::default()
    });
    assert!(parser.parse("Bjarni is bre @klaki.net").is_err());
    assert!(parser.parse("Bjarni <bre@klaki.net>").is_ok());
}

#[test]
fn test_raise_still_allows_later_passes() {
    let parser = AddressHeaderParser::new(AddressConfig {
        raise: true,
        ..AddressConfig::default()
    });
    let list = parser.parse("Bjarni is bre @klaki.net").unwrap();
    assert_eq!(list.pass, ParsePass::Spaced);
    assert_eq!(list.records[0].address, "bre@klaki.net");
}

#[test]
fn test_run_pass_directly() {
    let records = run_pass("a@b.c, d@e.f", ParsePass::Strict, true).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].address, "d@e.f");
}

// --- Quoting helpers ---

#[test]
fn test_escape_roundtrip() {
    let raw = r#"say "hi" \ it's"#;
    assert_eq!(escape(raw), r#"say \"hi\" \\ it\'s"#);
    assert_eq!(unescape(&escape(raw)), raw);
}

#[test]
fn test_quote_plain_name() {
    assert_eq!(quote("John Doe"), "\"John Doe\"");
}

#[test]
fn test_display_record() {
    let record = AddressRecord {
        address: "a@b.c".into(),
        display_name: String::new(),
        keys: Vec::new(),
    };
    assert_eq!(record.to_string(), "<a@b.c>");
}

// --- Free-text extraction ---

#[test]
fn test_extract_emails() {
    let found = extract_emails("Mail <bob@example.com> or (alice@example.org)", false);
    assert_eq!(found, vec!["bob@example.com", "alice@example.org"]);
}

#[test]
fn test_extract_emails_strips_keys() {
    let found = extract_emails("bob@example.com#ABCD1234", true);
    assert_eq!(found, vec!["bob@example.com"]);
}

#[test]
fn test_extract_email_and_name() {
    let (email, name) = extract_email_and_name("\"Bob Smith\" <bob@example.com>");
    assert_eq!(email, "bob@example.com");
    assert_eq!(name, "Bob Smith");
}

#[test]
fn test_extract_email_and_name_falls_back_to_address() {
    let (email, name) = extract_email_and_name("<bob@example.com>");
    assert_eq!(email, "bob@example.com");
    assert_eq!(name, "bob@example.com");
}
