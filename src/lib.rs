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

//! A library for proving control of an email domain with an existing *DomainKeys
//! Identified Mail* (DKIM) signature, as described in [RFC 6376].
//!
//! The requester of a proof is issued a session carrying a claimed domain and a
//! short-lived nonce. They send themselves an email whose *Subject* contains the
//! nonce, and submit the delivered message’s header (or the whole message).
//! The engine then re-derives the exact signed byte sequence from the header,
//! fetches the signer’s public key from DNS, checks the signature, and finally
//! binds the verified signing domain to the session: the domains must be equal,
//! the *Subject* must contain the nonce, and the *Subject* must be covered by
//! the signature.
//!
//! Nothing parsed from the submitted text is trusted before the signature over
//! it has been verified.
//!
//! # Usage
//!
//! The type [`Verifier`] is the entry point. It is constructed from a
//! [`LookupTxt`][crate::verifier::LookupTxt] implementation (DNS), a
//! [`SessionStore`][crate::session::SessionStore] implementation, and a
//! [`Config`]. Each call to [`Verifier::verify_headers`] or
//! [`Verifier::verify_message`] returns a [`VerificationOutcome`].
//!
//! The low-level building blocks (header parsing, tag parsing,
//! canonicalisation, key record parsing, cryptography) are public as well.
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`LookupTxt`][crate::verifier::LookupTxt] available for the Hickory DNS
//! resolver.
//!
//! [RFC 6376]: https://www.rfc-editor.org/rfc/rfc6376

pub mod binding;
pub mod canonicalize;
pub mod crypto;
pub mod header;
mod parse;
pub mod record;
pub mod session;
pub mod signature;
mod tag_list;
mod util;
pub mod verifier;

pub use crate::{
    binding::{Binding, BindingState, DomainId},
    header::{HeaderFields, RawHeader},
    session::{MemorySessionStore, Session, SessionStore},
    signature::{DkimSignature, SignatureAlgorithm},
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
    verifier::{
        Config, KeyCache, VerificationError, VerificationOutcome, VerificationStatus,
        VerifiedSignature, Verifier,
    },
};
