pub mod common;

use common::MockLookup;
use dkim_domain_proof::{
    signature::CanonicalizationAlgorithm, Config, MemorySessionStore, VerificationError, Verifier,
};

const HEADER: &str = "From: Alice <alice@example.com>\r\n\
    To: bob@example.org\r\n\
    Subject: Verify 7f3a9c21\r\n\
    Date: Fri, 11 Jul 2003 21:00:37 -0700\r\n";

const BODY: &str = "Hello Bob,\r\n\
    \r\n\
    please verify  my domain.\t\r\n\
    \r\n\
    \r\n";

async fn make_verifier() -> Verifier<MockLookup, MemorySessionStore> {
    let resolver = MockLookup::from_records([(
        "sel1._domainkey.example.com".to_owned(),
        common::rsa_key_record().await,
    )]);

    Verifier::new(
        resolver,
        common::session_store("example.com", "7f3a9c21"),
        Config::default(),
    )
}

async fn make_message(canonicalization: &str, body_alg: CanonicalizationAlgorithm) -> String {
    let key = common::read_signing_key("tests/keys/rsa2048.pem").await.unwrap();

    let bh = common::body_hash_base64(body_alg, BODY);
    let tags = format!(
        "v=1; a=rsa-sha256; c={canonicalization}; d=example.com; s=sel1;\r\n\
        \th=from:subject:date; bh={bh}; b="
    );

    let header = common::sign(HEADER, &tags, &key);

    format!("{header}\r\n{BODY}")
}

#[tokio::test]
async fn verify_message_ok() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    for (c, body_alg) in [
        ("relaxed/relaxed", CanonicalizationAlgorithm::Relaxed),
        ("relaxed/simple", CanonicalizationAlgorithm::Simple),
        ("simple", CanonicalizationAlgorithm::Simple),
    ] {
        let message = make_message(c, body_alg).await;

        let outcome = verifier.verify_message(&message, "s1").await;

        assert!(outcome.is_ok(), "{c}: {:?}", outcome.status);
    }
}

#[tokio::test]
async fn verify_message_lf_line_endings() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let message = make_message("relaxed/simple", CanonicalizationAlgorithm::Simple).await;
    let message = message.replace("\r\n", "\n");

    let outcome = verifier.verify_message(&message, "s1").await;

    assert!(outcome.is_ok());
}

#[tokio::test]
async fn verify_message_body_tampered() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let message = make_message("relaxed/relaxed", CanonicalizationAlgorithm::Relaxed).await;
    let tampered = message.replace("please verify", "please ignore");

    let outcome = verifier.verify_message(&tampered, "s1").await;

    assert_eq!(outcome.error(), Some(&VerificationError::BodyHashMismatch));

    // the header alone still proves the domain
    let header = &tampered[..tampered.find("\r\n\r\n").unwrap() + 2];
    let outcome = verifier.verify_headers(header, "s1").await;

    assert!(outcome.is_ok());
}

#[tokio::test]
async fn verify_message_relaxed_body_whitespace() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let message = make_message("relaxed/relaxed", CanonicalizationAlgorithm::Relaxed).await;
    let changed = message.replace("verify  my domain.\t", "verify my domain.");
    let changed = format!("{changed}\r\n\r\n");

    assert!(verifier.verify_message(&changed, "s1").await.is_ok());

    let message = make_message("relaxed/simple", CanonicalizationAlgorithm::Simple).await;
    let changed = message.replace("verify  my domain.\t", "verify my domain.");

    assert_eq!(
        verifier.verify_message(&changed, "s1").await.failure_reason(),
        Some("BodyHashMismatch")
    );
}

#[tokio::test]
async fn verify_message_without_body_separator() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let message = make_message("relaxed/relaxed", CanonicalizationAlgorithm::Relaxed).await;
    let header = &message[..message.find("\r\n\r\n").unwrap() + 2];

    let outcome = verifier.verify_message(header, "s1").await;

    assert_eq!(outcome.failure_reason(), Some("MalformedHeaders"));
}

#[tokio::test]
async fn verify_message_missing_body_hash() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let key = common::read_signing_key("tests/keys/rsa2048.pem").await.unwrap();
    let header = common::sign(
        HEADER,
        "v=1; a=rsa-sha256; c=relaxed/relaxed; d=example.com; s=sel1; h=from:subject:date; b=",
        &key,
    );

    let outcome = verifier.verify_headers(&header, "s1").await;
    assert!(outcome.is_ok());

    let message = format!("{header}\r\n{BODY}");
    let outcome = verifier.verify_message(&message, "s1").await;
    assert_eq!(outcome.failure_reason(), Some("BodyHashMismatch"));
}

#[tokio::test]
async fn verify_message_malformed_body_hash() {
    let _ = tracing_subscriber::fmt::try_init();

    let verifier = make_verifier().await;

    let key = common::read_signing_key("tests/keys/rsa2048.pem").await.unwrap();
    let header = common::sign(
        HEADER,
        "v=1; a=rsa-sha256; c=relaxed/relaxed; d=example.com; s=sel1;\r\n\
        \th=from:subject:date; bh=not*base64; b=",
        &key,
    );

    let outcome = verifier.verify_headers(&header, "s1").await;
    assert!(outcome.is_ok());

    let message = format!("{header}\r\n{BODY}");
    let outcome = verifier.verify_message(&message, "s1").await;
    assert_eq!(outcome.error(), Some(&VerificationError::BodyHashMismatch));
}
