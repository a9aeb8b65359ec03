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

//! Binding of a verified signature to a session.
//!
//! A valid signature proves only that the signing domain vouches for the
//! message. The session is proven when, in this order:
//!
//! 1. the signing domain equals the claimed domain exactly (a signature by
//!    `mail.example.com` does not prove `example.com`),
//! 2. the *Subject* contains the session nonce, ignoring case, and
//! 3. the *Subject* is among the header fields covered by the signature.

use crate::{
    session::Session,
    verifier::{VerificationError, VerificationStatus, VerifiedSignature},
};
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug, Display, Formatter};
use tracing::trace;

/// A stable identifier for a domain: the SHA-256 hash of the lower-cased
/// domain name.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct DomainId([u8; 32]);

impl DomainId {
    pub fn for_domain(domain: &str) -> Self {
        Self(Sha256::digest(domain.to_lowercase()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DomainId({self})")
    }
}

/// A domain proven for a session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Binding {
    pub domain: Box<str>,
    pub domain_id: DomainId,
}

/// The states a domain claim passes through.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BindingState {
    NoSession,
    HeadersSubmitted,
    SignatureInvalid,
    DomainMismatch,
    NonceMissing,
    SubjectUnsigned,
    Bound,
}

impl From<&VerificationStatus> for BindingState {
    fn from(status: &VerificationStatus) -> Self {
        use VerificationError::*;

        match status {
            VerificationStatus::Success => Self::Bound,
            VerificationStatus::Failure(error) => match error {
                SessionNotFound => Self::NoSession,
                DomainMismatch => Self::DomainMismatch,
                NonceNotFound => Self::NonceMissing,
                SubjectNotSigned => Self::SubjectUnsigned,
                Internal(_) => Self::HeadersSubmitted,
                NoDkimSignature
                | UnsupportedAlgorithm(_)
                | KeyNotFound
                | InvalidSignature
                | BodyHashMismatch
                | MalformedHeaders => Self::SignatureInvalid,
            },
        }
    }
}

/// Checks a verified signature against a session.
pub fn check_binding(
    session: &Session,
    verified: &VerifiedSignature,
) -> Result<Binding, VerificationError> {
    let domain = verified.domain.to_lowercase();

    if domain != session.domain.to_lowercase() {
        trace!(signing_domain = %domain, claimed_domain = %session.domain, "domain mismatch");
        return Err(VerificationError::DomainMismatch);
    }

    let nonce = session.nonce.to_lowercase();
    let nonce_found = !nonce.is_empty()
        && verified
            .subject
            .as_deref()
            .map_or(false, |s| s.to_lowercase().contains(&nonce));
    if !nonce_found {
        trace!("nonce not found in subject");
        return Err(VerificationError::NonceNotFound);
    }

    if !verified.signed_headers.iter().any(|h| h.eq_ignore_ascii_case("subject")) {
        trace!("subject not covered by signature");
        return Err(VerificationError::SubjectNotSigned);
    }

    Ok(Binding {
        domain_id: DomainId::for_domain(&domain),
        domain: domain.into(),
    })
}
