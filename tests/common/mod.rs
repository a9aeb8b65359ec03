use dkim_domain_proof::{
    canonicalize,
    header::parse_header,
    signature::{Canonicalization, CanonicalizationAlgorithm},
    verifier::LookupTxt,
    MemorySessionStore, Session,
};
use ed25519_dalek::Signer as _;
use rsa::{pkcs8::DecodePrivateKey, Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    future::Future,
    io::{self, ErrorKind},
    pin::Pin,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::fs;

pub type LookupOutput = Vec<io::Result<Vec<Vec<u8>>>>;
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<LookupOutput>> + Send + 'a>>;

#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Serves the given TXT records; any other name is not found. Records are
    /// split into character-strings of at most 255 bytes, as in DNS.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (name, txt) in records {
            map.entry(name).or_default().push(txt);
        }
        let map = Arc::new(map);

        Self::new(move |name| {
            let txts = map.get(name).cloned();

            Box::pin(async move {
                match txts {
                    Some(txts) => Ok(txts
                        .iter()
                        .map(|txt| Ok(txt.as_bytes().chunks(255).map(|c| c.to_vec()).collect()))
                        .collect()),
                    None => Err(ErrorKind::NotFound.into()),
                }
            })
        })
    }
}

impl LookupTxt for MockLookup {
    type Answer = LookupOutput;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let domain = domain.to_owned();

        Box::pin(async move { self.0(&domain).await })
    }
}

pub enum SigningKey {
    Rsa(RsaPrivateKey),
    Ed25519(ed25519_dalek::SigningKey),
}

pub async fn read_public_key_file_base64(file_name: &str) -> io::Result<String> {
    let s = fs::read_to_string(file_name).await?;
    let mut key_base64: Vec<_> = s.lines().skip(1).collect();
    key_base64.pop();
    Ok(key_base64.join(""))
}

pub async fn read_signing_key(file_name: &str) -> io::Result<SigningKey> {
    let s = fs::read_to_string(file_name).await?;
    let key = RsaPrivateKey::from_pkcs8_pem(&s)
        .map_err(|_| io::Error::new(ErrorKind::InvalidData, "invalid private key"))?;
    Ok(SigningKey::Rsa(key))
}

pub fn ed25519_signing_key() -> SigningKey {
    SigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[7; 32]))
}

pub fn ed25519_public_key_base64() -> String {
    let key = ed25519_dalek::SigningKey::from_bytes(&[7; 32]).verifying_key();
    dkim_domain_proof::encode_base64(key.as_bytes())
}

pub async fn rsa_key_record() -> String {
    let base64 = read_public_key_file_base64("tests/keys/rsa2048pub.pem")
        .await
        .unwrap();
    format!("v=DKIM1; k=rsa; p={base64}")
}

pub fn body_hash_base64(algorithm: CanonicalizationAlgorithm, body: &str) -> String {
    dkim_domain_proof::encode_base64(canonicalize::body_hash(algorithm, body))
}

fn tag_value<'a>(tags: &'a str, name: &str) -> Option<&'a str> {
    tags.split(';')
        .filter_map(|tag| tag.split_once('='))
        .find(|(n, _)| n.trim() == name)
        .map(|(_, v)| v.trim())
}

/// Signs header text. The tags must end with an empty `b=` tag; the result is
/// the header text with the completed *DKIM-Signature* header field on top.
pub fn sign(header: &str, tags: &str, key: &SigningKey) -> String {
    assert!(tags.ends_with("b="), "tags must end with b=");

    let unsigned = format!("DKIM-Signature: {tags}\r\n{header}");
    let headers = parse_header(&unsigned).unwrap();
    let sig_header = headers.dkim_signatures().next().unwrap();

    let canonicalization: Canonicalization = tag_value(tags, "c")
        .map(|c| c.parse().unwrap())
        .unwrap_or_default();
    let signed_headers: Vec<Box<str>> = tag_value(tags, "h")
        .unwrap()
        .split(':')
        .map(|h| h.trim().to_ascii_lowercase().into())
        .collect();

    let input = canonicalize::signing_input(
        canonicalization.header,
        &headers,
        &signed_headers,
        sig_header,
    );
    let hash = Sha256::digest(&input);

    let signature = match key {
        SigningKey::Rsa(k) => k.sign(Pkcs1v15Sign::new::<Sha256>(), &hash).unwrap(),
        SigningKey::Ed25519(k) => k.sign(&hash).to_bytes().to_vec(),
    };

    let signature = dkim_domain_proof::encode_base64(signature);

    format!("DKIM-Signature: {tags}{signature}\r\n{header}")
}

pub fn session_store(domain: &str, nonce: &str) -> MemorySessionStore {
    let store = MemorySessionStore::new();
    store.insert(Session::new(
        "s1",
        domain,
        nonce,
        SystemTime::now(),
        Duration::from_secs(600),
    ));
    store
}
