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

#[cfg(feature = "hickory-resolver")]
mod hickory_resolver;

use std::{future::Future, io};

/// A trait for looking up DNS TXT records containing DKIM public key records.
///
/// The error type used here is `std::io::Error`. The following error kinds on
/// the query result are recognised and receive special treatment.
///
/// * `ErrorKind::NotFound` on the query: NXDOMAIN, no key record found
///
/// All other errors on the query, including `ErrorKind::TimedOut`, are
/// treated as a failure of the lookup itself rather than an absent key. The
/// inner, per-record `std::io::Error` can be used to signal errors with
/// individual TXT records; such records are skipped.
pub trait LookupTxt: Send + Sync {
    /// The answer consisting of TXT records found. Each record is given as the
    /// list of its character-strings, which are concatenated by the caller.
    type Answer: IntoIterator<Item = io::Result<Vec<Vec<u8>>>>;
    /// The future resolving to the query’s answer.
    type Query<'a>: Future<Output = io::Result<Self::Answer>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the domain’s TXT records in DNS.
    ///
    /// The domain will be passed to this trait as a string in lower-case
    /// A-label (ASCII) format, without trailing dot (eg
    /// `selector._domainkey.example.com`). It is to be queried as an absolute
    /// name.
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_>;
}
