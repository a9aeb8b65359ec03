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

use crate::{
    crypto::{KeyType, VerifyingKey},
    record::DkimKeyRecord,
    util::CanonicalStr,
    verifier::{Config, KeyCache, LookupTxt, VerificationError},
};
use std::{
    io::{self, ErrorKind},
    sync::Arc,
};
use tokio::time;
use tracing::trace;

/// Forms the name at which the key record for a selector and domain is
/// published, in lower-case A-label form. Returns `None` if no valid DNS name
/// results.
pub fn key_query_name(selector: &str, domain: &str) -> Option<String> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    let name = idna::domain_to_ascii(&format!("{selector}._domainkey.{domain}")).ok()?;
    let name = name.to_ascii_lowercase();

    let valid = name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        });

    valid.then_some(name)
}

/// Looks up the TXT records at the given name, joining the character-strings
/// of each record. Records that cannot be read as UTF-8 are skipped.
async fn look_up_records<T: LookupTxt + ?Sized>(
    resolver: &T,
    name: &str,
) -> io::Result<Vec<String>> {
    let txts = resolver.lookup_txt(name).await?;

    let mut result = vec![];

    for txt in txts {
        match txt.map(|fragments| fragments.concat()) {
            Ok(txt) => match String::from_utf8(txt) {
                Ok(s) => result.push(s),
                Err(_) => trace!("skipping TXT record that is not UTF-8"),
            },
            Err(e) => trace!("skipping unreadable TXT record: {e}"),
        }
    }

    Ok(result)
}

/// Resolves the public key for a selector and domain.
///
/// Absent records, records without usable key, and unacceptable keys are all
/// reported as `KeyNotFound`. A timeout or a failing transport is an internal
/// error. The lookup is attempted once.
pub async fn resolve_key<T: LookupTxt + ?Sized>(
    resolver: &T,
    cache: Option<&KeyCache>,
    config: &Config,
    selector: &str,
    domain: &str,
    key_type: KeyType,
) -> Result<Arc<VerifyingKey>, VerificationError> {
    let Some(name) = key_query_name(selector, domain) else {
        trace!(%domain, %selector, "cannot form key query name");
        return Err(VerificationError::KeyNotFound);
    };

    if let Some(key) = cache.and_then(|c| c.get(&name, key_type)) {
        trace!(%name, "using cached public key");
        return Ok(key);
    }

    trace!(%name, "looking up public key record");

    let txts = match time::timeout(config.lookup_timeout, look_up_records(resolver, &name)).await
    {
        Ok(Ok(txts)) => txts,
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            trace!(%name, "no key record found");
            return Err(VerificationError::KeyNotFound);
        }
        Ok(Err(e)) => {
            trace!(%name, "key record lookup failed: {e}");
            return Err(VerificationError::Internal("key lookup failed".into()));
        }
        Err(_) => {
            trace!(%name, "key record lookup timed out");
            return Err(VerificationError::Internal("key lookup timed out".into()));
        }
    };

    let key = txts
        .iter()
        .find_map(|txt| read_key(txt, key_type, config.min_key_bits))
        .ok_or(VerificationError::KeyNotFound)?;

    let key = Arc::new(key);

    if let Some(cache) = cache {
        cache.insert(&name, key_type, key.clone());
    }

    Ok(key)
}

fn read_key(txt: &str, key_type: KeyType, min_key_bits: usize) -> Option<VerifyingKey> {
    let record: DkimKeyRecord = match txt.parse() {
        Ok(r) => r,
        Err(e) => {
            trace!("unusable key record: {e}");
            return None;
        }
    };

    if record.key_type != key_type {
        trace!("key record has wrong key type");
        return None;
    }

    if record.testing {
        trace!("key record is in testing mode");
    }

    match VerifyingKey::from_key_data(key_type, &record.key_data, min_key_bits) {
        Ok(key) => {
            trace!(
                key_type = %key_type.canonical_str(),
                bits = ?key.key_size(),
                "accepted public key"
            );
            Some(key)
        }
        Err(e) => {
            trace!("unusable public key: {e}");
            None
        }
    }
}
