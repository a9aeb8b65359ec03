use dkim_domain_proof::{record::DkimKeyRecord, verifier::LookupTxt};
use hickory_resolver::TokioAsyncResolver;
use std::io::ErrorKind;

/// Look up a DKIM public key record published in live DNS.
#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_key_lookup() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = TokioAsyncResolver::tokio(Default::default(), Default::default());

    let answer = resolver
        .lookup_txt("20230601._domainkey.gmail.com")
        .await
        .unwrap();

    let records: Vec<DkimKeyRecord> = answer
        .into_iter()
        .filter_map(|txt| {
            let txt = txt.ok()?.concat();
            String::from_utf8(txt).ok()?.parse().ok()
        })
        .collect();

    assert_eq!(records.len(), 1);
    assert!(!records[0].key_data.is_empty());
}

#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_key_lookup_not_found() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = TokioAsyncResolver::tokio(Default::default(), Default::default());

    let result = resolver
        .lookup_txt("no-such-selector._domainkey.example.com")
        .await;

    assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
}
