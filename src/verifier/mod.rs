// dkim-domain-proof – domain ownership proofs from DKIM-signed email
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Verifier and supporting types.

mod cache;
mod lookup;
mod query;

pub use self::{
    cache::KeyCache,
    lookup::LookupTxt,
    query::key_query_name,
};

use crate::{
    binding::{check_binding, Binding, BindingState, DomainId},
    canonicalize,
    crypto,
    header::{parse_header, split_message, HeaderFields},
    session::{Session, SessionStore},
    signature::{parse_candidates, select_candidate, Canonicalization, SignatureAlgorithm},
    util::decode_base64,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::ErrorKind,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::{debug, trace};

/// Configuration for a verifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The maximum duration of public key record lookups. When this duration is
    /// exceeded verification fails with an internal error. Lookups are not
    /// retried.
    pub lookup_timeout: Duration,

    /// Only consider at most this number of *DKIM-Signature* header fields,
    /// any further ones are ignored.
    pub max_signatures: usize,

    /// Minimum acceptable key size in bits. An RSA public key below this limit
    /// is treated like a missing key.
    pub min_key_bits: usize,

    /// When this flag is set, signatures using the *ed25519-sha256* algorithm
    /// are supported.
    pub allow_ed25519: bool,

    /// The `SystemTime` value to use as the instant ‘now’.
    pub fixed_system_time: Option<SystemTime>,
}

impl Config {
    fn current_time(&self) -> SystemTime {
        self.fixed_system_time.unwrap_or_else(SystemTime::now)
    }

    /// Whether signatures with the given algorithm can be verified.
    pub fn supports(&self, algorithm: SignatureAlgorithm) -> bool {
        match algorithm {
            SignatureAlgorithm::RsaSha256 => true,
            SignatureAlgorithm::Ed25519Sha256 => self.allow_ed25519,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(5),
            max_signatures: 10,
            min_key_bits: 1024,
            allow_ed25519: true,
            fixed_system_time: None,
        }
    }
}

/// The reason a domain could not be proven.
///
/// All variants except `Internal` are an expected outcome for a message that
/// does not prove anything. `Internal` signals that the check itself could not
/// be completed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerificationError {
    NoDkimSignature,
    /// The selected signature uses an algorithm that is not supported; the
    /// `a=` value is attached.
    UnsupportedAlgorithm(Box<str>),
    KeyNotFound,
    InvalidSignature,
    BodyHashMismatch,
    SessionNotFound,
    DomainMismatch,
    NonceNotFound,
    SubjectNotSigned,
    MalformedHeaders,
    Internal(Box<str>),
}

impl VerificationError {
    /// The stable reason string for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoDkimSignature => "NoDkimSignature",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            Self::KeyNotFound => "KeyNotFound",
            Self::InvalidSignature => "InvalidSignature",
            Self::BodyHashMismatch => "BodyHashMismatch",
            Self::SessionNotFound => "SessionNotFound",
            Self::DomainMismatch => "DomainMismatch",
            Self::NonceNotFound => "NonceNotFound",
            Self::SubjectNotSigned => "SubjectNotSigned",
            Self::MalformedHeaders => "MalformedHeaders",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Whether this error arose in the DKIM stage, before any binding check.
    pub fn is_dkim_failure(&self) -> bool {
        matches!(
            self,
            Self::NoDkimSignature
                | Self::UnsupportedAlgorithm(_)
                | Self::KeyNotFound
                | Self::InvalidSignature
                | Self::BodyHashMismatch
                | Self::MalformedHeaders
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDkimSignature => write!(f, "no usable DKIM signature"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported signature algorithm \"{alg}\""),
            Self::KeyNotFound => write!(f, "no public key found"),
            Self::InvalidSignature => write!(f, "signature did not verify"),
            Self::BodyHashMismatch => write!(f, "body hash mismatch"),
            Self::SessionNotFound => write!(f, "session not found or expired"),
            Self::DomainMismatch => write!(f, "signing domain does not match claimed domain"),
            Self::NonceNotFound => write!(f, "nonce not found in subject"),
            Self::SubjectNotSigned => write!(f, "subject not covered by signature"),
            Self::MalformedHeaders => write!(f, "malformed header"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl Error for VerificationError {}

/// The verification status of a domain proof.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerificationStatus {
    Success,
    Failure(VerificationError),
}

/// The result of a verification call.
///
/// On success, the proven domain, the signed *Subject*, the signed header
/// names, and the domain identifier are available. Key material and signature
/// data are never part of the outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub domain: Option<String>,
    pub subject: Option<String>,
    pub signed_headers: Option<Vec<String>>,
    pub domain_id: Option<DomainId>,
}

impl VerificationOutcome {
    fn success(verified: VerifiedSignature, binding: Binding) -> Self {
        Self {
            status: VerificationStatus::Success,
            domain: Some(binding.domain.into()),
            subject: verified.subject.map(Into::into),
            signed_headers: Some(verified.signed_headers.iter().map(|h| h.to_string()).collect()),
            domain_id: Some(binding.domain_id),
        }
    }

    fn failure(error: VerificationError) -> Self {
        Self {
            status: VerificationStatus::Failure(error),
            domain: None,
            subject: None,
            signed_headers: None,
            domain_id: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, VerificationStatus::Success)
    }

    pub fn error(&self) -> Option<&VerificationError> {
        match &self.status {
            VerificationStatus::Success => None,
            VerificationStatus::Failure(error) => Some(error),
        }
    }

    /// The reason string of the failure, if verification failed.
    pub fn failure_reason(&self) -> Option<&'static str> {
        self.error().map(VerificationError::reason)
    }

    pub fn state(&self) -> BindingState {
        BindingState::from(&self.status)
    }
}

/// A DKIM signature that has been verified successfully.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifiedSignature {
    /// The signing domain, lower-cased.
    pub domain: Box<str>,
    pub selector: Box<str>,
    pub algorithm: SignatureAlgorithm,
    /// The unfolded value of the bottom-most *Subject* header field.
    pub subject: Option<Box<str>>,
    /// The signed header names, lower-cased, as listed in `h=`.
    pub signed_headers: Box<[Box<str>]>,
    pub(crate) body_hash: Option<Box<str>>,
    pub(crate) canonicalization: Canonicalization,
}

/// A verifier of domain proofs.
///
/// # Examples
///
/// ```
/// # async fn f() {
/// use dkim_domain_proof::{
///     verifier::LookupTxt, Config, MemorySessionStore, Session, Verifier,
/// };
/// use std::{future::{self, Ready}, io, time::{Duration, SystemTime}};
///
/// struct NoRecords;
///
/// impl LookupTxt for NoRecords {
///     type Answer = Vec<io::Result<Vec<Vec<u8>>>>;
///     type Query<'a> = Ready<io::Result<Self::Answer>>;
///
///     fn lookup_txt(&self, _: &str) -> Self::Query<'_> {
///         future::ready(Err(io::ErrorKind::NotFound.into()))
///     }
/// }
///
/// let sessions = MemorySessionStore::new();
/// sessions.insert(Session::new(
///     "s1", "example.com", "7f3a9c21", SystemTime::now(), Duration::from_secs(600),
/// ));
///
/// let verifier = Verifier::new(NoRecords, sessions, Config::default());
///
/// let header = "DKIM-Signature: a=rsa-sha256; d=example.com; s=sel1; h=from:subject; b=YWJj\r\n\
///               From: me@example.com\r\n\
///               Subject: Verify 7f3a9c21\r\n";
///
/// let outcome = verifier.verify_headers(header, "s1").await;
///
/// assert_eq!(outcome.failure_reason(), Some("KeyNotFound"));
/// # }
/// ```
pub struct Verifier<T, S> {
    resolver: T,
    sessions: S,
    config: Config,
    key_cache: Option<Arc<KeyCache>>,
}

impl<T, S> Verifier<T, S>
where
    T: LookupTxt,
    S: SessionStore,
{
    pub fn new(resolver: T, sessions: S, config: Config) -> Self {
        Self {
            resolver,
            sessions,
            config,
            key_cache: None,
        }
    }

    /// Uses the given cache for public keys.
    pub fn with_key_cache(mut self, key_cache: Arc<KeyCache>) -> Self {
        self.key_cache = Some(key_cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Verifies a domain proof from the header of a message.
    ///
    /// The body hash (`bh=`) is not checked: the signature over the header
    /// protects it, but whether it matches a body is not established.
    pub async fn verify_headers(&self, header: &str, session_id: &str) -> VerificationOutcome {
        let result = self.prove(session_id, header, false).await;
        finish(result)
    }

    /// Verifies a domain proof from a complete message, checking the body hash
    /// in addition to everything [`verify_headers`][Self::verify_headers]
    /// checks.
    pub async fn verify_message(&self, message: &str, session_id: &str) -> VerificationOutcome {
        let result = self.prove(session_id, message, true).await;
        finish(result)
    }

    async fn prove(
        &self,
        session_id: &str,
        text: &str,
        with_body: bool,
    ) -> Result<(VerifiedSignature, Binding), VerificationError> {
        let session = self.load_session(session_id).await?;

        let (headers, body) = if with_body {
            let (headers, body) =
                split_message(text).map_err(|_| VerificationError::MalformedHeaders)?;
            (headers, Some(body))
        } else {
            let headers = parse_header(text).map_err(|_| VerificationError::MalformedHeaders)?;
            (headers, None)
        };

        let verified = self.verify_dkim(&headers, Some(&*session.domain)).await?;

        if let Some(body) = body {
            check_body_hash(&verified, body)?;
        }

        let binding = check_binding(&session, &verified)?;

        Ok((verified, binding))
    }

    async fn load_session(&self, id: &str) -> Result<Session, VerificationError> {
        match self.sessions.get(id).await {
            Ok(Some(session)) => {
                if session.is_expired_at(self.config.current_time()) {
                    trace!("session expired");
                    Err(VerificationError::SessionNotFound)
                } else {
                    Ok(session)
                }
            }
            Ok(None) => Err(VerificationError::SessionNotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(VerificationError::SessionNotFound),
            Err(e) => {
                trace!("session lookup failed: {e}");
                Err(VerificationError::Internal("session lookup failed".into()))
            }
        }
    }

    /// Verifies a DKIM signature in the header, without any session.
    ///
    /// When several signatures are present, one whose domain equals
    /// `claimed_domain` is preferred, then one with a supported algorithm.
    pub async fn verify_dkim(
        &self,
        headers: &HeaderFields,
        claimed_domain: Option<&str>,
    ) -> Result<VerifiedSignature, VerificationError> {
        let candidates = parse_candidates(headers, self.config.max_signatures);

        let candidate = select_candidate(candidates, claimed_domain, |alg| self.config.supports(alg))
            .ok_or(VerificationError::NoDkimSignature)?;

        let header = candidate.header;
        let sig = candidate.signature;

        trace!(index = header.index, domain = %sig.domain, selector = %sig.selector, "selected DKIM signature");

        let algorithm = sig
            .signature_algorithm()
            .filter(|&alg| self.config.supports(alg))
            .ok_or_else(|| VerificationError::UnsupportedAlgorithm(sig.algorithm.clone()))?;

        let key = query::resolve_key(
            &self.resolver,
            self.key_cache.as_deref(),
            &self.config,
            &sig.selector,
            &sig.domain,
            algorithm.to_key_type(),
        )
        .await?;

        let signing_input = canonicalize::signing_input(
            sig.canonicalization.header,
            headers,
            &sig.signed_headers,
            header,
        );

        trace!(
            canonicalization = %sig.canonicalization,
            len = signing_input.len(),
            "constructed signing input"
        );

        if !crypto::verify_signature(algorithm, &key, &signing_input, &sig.signature_data) {
            return Err(VerificationError::InvalidSignature);
        }

        trace!("DKIM signature verified");

        Ok(VerifiedSignature {
            domain: sig.domain.to_lowercase().into(),
            selector: sig.selector,
            algorithm,
            subject: headers.last_named("Subject").map(|h| h.value.clone()),
            signed_headers: sig.signed_headers,
            body_hash: sig.body_hash,
            canonicalization: sig.canonicalization,
        })
    }
}

fn check_body_hash(verified: &VerifiedSignature, body: &str) -> Result<(), VerificationError> {
    let expected = verified
        .body_hash
        .as_deref()
        .ok_or(VerificationError::BodyHashMismatch)?;
    let expected = decode_base64(expected).map_err(|_| {
        trace!("body hash is not valid Base64");
        VerificationError::BodyHashMismatch
    })?;

    let actual = canonicalize::body_hash(verified.canonicalization.body, body);

    if actual != expected {
        trace!("body hash mismatch");
        return Err(VerificationError::BodyHashMismatch);
    }

    Ok(())
}

fn finish(result: Result<(VerifiedSignature, Binding), VerificationError>) -> VerificationOutcome {
    match result {
        Ok((verified, binding)) => {
            debug!(domain = %binding.domain, domain_id = %binding.domain_id, "domain proven");
            VerificationOutcome::success(verified, binding)
        }
        Err(e) => {
            debug!(reason = e.reason(), "domain not proven: {e}");
            VerificationOutcome::failure(e)
        }
    }
}
