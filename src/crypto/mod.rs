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

//! Cryptographic verification of DKIM signatures.
//!
//! Both supported algorithms sign the SHA-256 hash of the signing input: RSA
//! with PKCS#1 v1.5 padding (RFC 6376), Ed25519 over the 32-byte digest (RFC
//! 8463).
//!
//! # Key formats
//!
//! RFC 6376 specifies RSAPublicKey (PKCS#1) as the format of RSA keys in DNS,
//! but what is actually published nearly everywhere is SubjectPublicKeyInfo.
//! RSA key data is therefore read as SubjectPublicKeyInfo first and as
//! RSAPublicKey second.
//!
//! Ed25519 key data is read as the 32 raw key bytes required by RFC 8463
//! first, and as SubjectPublicKeyInfo (the default output of OpenSSL) second.

mod ed25519;
mod rsa;

pub use self::{
    ed25519::{read_ed25519_verifying_key, verify_ed25519},
    rsa::{read_rsa_public_key, verify_rsa},
};

use crate::{signature::SignatureAlgorithm, util::CanonicalStr};
use ::rsa::RsaPublicKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use sha2::{Digest, Sha256};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};
use tracing::trace;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyType {
    Rsa,
    Ed25519,
}

impl CanonicalStr for KeyType {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ed25519 => "ed25519",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyingKey {
    Rsa(RsaPublicKey),
    Ed25519(Ed25519VerifyingKey),
}

impl VerifyingKey {
    /// Reads key data from a key record. RSA keys with a modulus smaller than
    /// `min_key_bits` are rejected.
    pub fn from_key_data(
        key_type: KeyType,
        key_data: &[u8],
        min_key_bits: usize,
    ) -> Result<Self, VerificationError> {
        match key_type {
            KeyType::Rsa => {
                let public_key = read_rsa_public_key(key_data, min_key_bits)?;
                Ok(Self::Rsa(public_key))
            }
            KeyType::Ed25519 => {
                let verifying_key = read_ed25519_verifying_key(key_data)?;
                Ok(Self::Ed25519(verifying_key))
            }
        }
    }

    pub fn to_key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// The key size in bits, for RSA keys.
    pub fn key_size(&self) -> Option<usize> {
        match self {
            Self::Rsa(public_key) => Some(self::rsa::get_public_key_size(public_key)),
            Self::Ed25519(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationError {
    InvalidKey,
    InsufficientKeySize,
    KeyTypeMismatch,
    InvalidSignature,
    VerificationFailure,
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key data"),
            Self::InsufficientKeySize => write!(f, "key too small"),
            Self::KeyTypeMismatch => write!(f, "key type does not match algorithm"),
            Self::InvalidSignature => write!(f, "invalid signature data"),
            Self::VerificationFailure => write!(f, "signature verification failed"),
        }
    }
}

impl Error for VerificationError {}

/// Verifies a signature over the signing input.
pub fn verify(
    algorithm: SignatureAlgorithm,
    key: &VerifyingKey,
    signing_input: &[u8],
    signature_data: &[u8],
) -> Result<(), VerificationError> {
    let hash = Sha256::digest(signing_input);

    match (algorithm, key) {
        (SignatureAlgorithm::RsaSha256, VerifyingKey::Rsa(public_key)) => {
            verify_rsa(public_key, &hash, signature_data)
        }
        (SignatureAlgorithm::Ed25519Sha256, VerifyingKey::Ed25519(verifying_key)) => {
            verify_ed25519(verifying_key, &hash, signature_data)
        }
        _ => Err(VerificationError::KeyTypeMismatch),
    }
}

/// Like [`verify`], but reports only whether the signature is valid.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    key: &VerifyingKey,
    signing_input: &[u8],
    signature_data: &[u8],
) -> bool {
    match verify(algorithm, key, signing_input, signature_data) {
        Ok(()) => true,
        Err(e) => {
            trace!(%algorithm, "signature not verified: {e}");
            false
        }
    }
}
