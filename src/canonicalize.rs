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

//! Header and body canonicalization (RFC 6376, section 3.4), and construction
//! of the signed byte sequence.

use crate::{
    header::{HeaderFields, RawHeader},
    parse::{is_fws, is_wsp, CRLF},
    signature::CanonicalizationAlgorithm,
};
use sha2::{Digest, Sha256};
use std::{borrow::Cow, collections::HashMap};

/// Canonicalizes a header field into some result vector, without a line
/// terminator.
pub fn canonicalize_header(
    result: &mut Vec<u8>,
    algorithm: CanonicalizationAlgorithm,
    name: &str,
    raw_block: &str,
) {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            result.extend(raw_block.bytes());
        }
        CanonicalizationAlgorithm::Relaxed => {
            let value = raw_block
                .split_once(':')
                .map(|(_, value)| value)
                .unwrap_or_default();

            result.extend(name.trim_matches(is_wsp).to_ascii_lowercase().bytes());
            result.push(b':');
            canonicalize_header_relaxed(result, value);
        }
    }
}

fn canonicalize_header_relaxed(result: &mut Vec<u8>, value: &str) {
    let value = value.trim_matches(is_fws);

    let mut compressing = false;
    for c in value.chars() {
        if is_fws(c) {
            if !compressing {
                result.push(b' ');
                compressing = true;
            }
        } else {
            let mut buf = [0; 4];
            result.extend(c.encode_utf8(&mut buf).bytes());
            compressing = false;
        }
    }
}

/// Selects the header fields covered by the signed header names.
///
/// For each name, in order, the bottom-most header field with that name not yet
/// selected is taken. Names without a remaining occurrence select nothing. The
/// header field at index `exclude` never takes part.
pub fn select_headers<'a>(
    headers: &'a HeaderFields,
    signed_headers: &[Box<str>],
    exclude: usize,
) -> Vec<&'a RawHeader> {
    let mut remaining: HashMap<Box<str>, Vec<&RawHeader>> = HashMap::new();

    for header in headers.as_ref().iter().filter(|h| h.index != exclude) {
        remaining
            .entry(header.name.to_ascii_lowercase().into())
            .or_default()
            .push(header);
    }

    signed_headers
        .iter()
        .filter_map(|name| remaining.get_mut(&*name.to_ascii_lowercase())?.pop())
        .collect()
}

/// Empties the value of the `b=` tag in a *DKIM-Signature* header field,
/// keeping everything else, folding whitespace included, as it is.
pub fn strip_signature_value(raw_block: &str) -> Cow<'_, str> {
    let Some(colon) = raw_block.find(':') else {
        return raw_block.into();
    };

    let mut start = colon + 1;

    for piece in raw_block[start..].split(';') {
        if let Some((name, _)) = piece.split_once('=') {
            if name.trim_matches(is_fws).eq_ignore_ascii_case("b") {
                let value_start = start + name.len() + 1;
                let value_end = start + piece.len();

                let mut result = String::with_capacity(raw_block.len());
                result.push_str(&raw_block[..value_start]);
                result.push_str(&raw_block[value_end..]);
                return result.into();
            }
        }
        start += piece.len() + 1;
    }

    raw_block.into()
}

/// Produces the byte sequence covered by a DKIM signature: the selected header
/// fields, each with CRLF, followed by the signature header field with empty
/// `b=` value and without CRLF.
pub fn signing_input(
    algorithm: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    signed_headers: &[Box<str>],
    signature_header: &RawHeader,
) -> Vec<u8> {
    let mut result = vec![];

    for header in select_headers(headers, signed_headers, signature_header.index) {
        canonicalize_header(&mut result, algorithm, &header.name, &header.raw_block);
        result.extend(CRLF.bytes());
    }

    let stripped = strip_signature_value(&signature_header.raw_block);
    canonicalize_header(&mut result, algorithm, &signature_header.name, &stripped);

    result
}

/// Canonicalizes a message body. Both CRLF and bare LF are accepted as line
/// terminator.
pub fn canonicalize_body(algorithm: CanonicalizationAlgorithm, body: &str) -> Vec<u8> {
    let mut result = vec![];
    let mut empty_lines = 0;

    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let line: Cow<'_, str> = match algorithm {
            CanonicalizationAlgorithm::Simple => line.into(),
            CanonicalizationAlgorithm::Relaxed => relax_body_line(line).into(),
        };

        if line.is_empty() {
            empty_lines += 1;
            continue;
        }

        for _ in 0..empty_lines {
            result.extend(CRLF.bytes());
        }
        empty_lines = 0;

        result.extend(line.bytes());
        result.extend(CRLF.bytes());
    }

    if result.is_empty() && algorithm == CanonicalizationAlgorithm::Simple {
        result.extend(CRLF.bytes());
    }

    result
}

fn relax_body_line(line: &str) -> String {
    let mut result = String::with_capacity(line.len());

    let mut compressing = false;
    for c in line.trim_end_matches(is_wsp).chars() {
        if is_wsp(c) {
            if !compressing {
                result.push(' ');
                compressing = true;
            }
        } else {
            result.push(c);
            compressing = false;
        }
    }

    result
}

/// Computes the SHA-256 hash of the canonicalized body.
pub fn body_hash(algorithm: CanonicalizationAlgorithm, body: &str) -> Vec<u8> {
    Sha256::digest(canonicalize_body(algorithm, body)).to_vec()
}
