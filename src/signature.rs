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

//! Representation of the *DKIM-Signature* header field.

use crate::{
    crypto::KeyType,
    header::{HeaderFields, RawHeader},
    tag_list::{parse_colon_separated_tag_value, TagList, TagListParseError},
    util::{decode_base64, CanonicalStr},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};
use tracing::trace;

/// A signature algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// The *rsa-sha256* signature algorithm.
    RsaSha256,
    /// The *ed25519-sha256* signature algorithm.
    Ed25519Sha256,
}

impl SignatureAlgorithm {
    /// Returns this signature algorithm’s key type.
    pub fn to_key_type(self) -> KeyType {
        match self {
            Self::RsaSha256 => KeyType::Rsa,
            Self::Ed25519Sha256 => KeyType::Ed25519,
        }
    }
}

impl CanonicalStr for SignatureAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519Sha256 => "ed25519-sha256",
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("rsa-sha256") {
            Ok(Self::RsaSha256)
        } else if s.eq_ignore_ascii_case("ed25519-sha256") {
            Ok(Self::Ed25519Sha256)
        } else {
            Err("unknown signature algorithm")
        }
    }
}

/// A canonicalization algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CanonicalizationAlgorithm {
    /// The *simple* canonicalization algorithm.
    #[default]
    Simple,
    /// The *relaxed* canonicalization algorithm.
    Relaxed,
}

impl CanonicalStr for CanonicalizationAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

impl Display for CanonicalizationAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for CanonicalizationAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("simple") {
            Ok(Self::Simple)
        } else if s.eq_ignore_ascii_case("relaxed") {
            Ok(Self::Relaxed)
        } else {
            Err("unknown canonicalization algorithm")
        }
    }
}

/// A pair of header/body canonicalization algorithms.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Canonicalization {
    /// The header canonicalization.
    pub header: CanonicalizationAlgorithm,
    /// The body canonicalization.
    pub body: CanonicalizationAlgorithm,
}

impl CanonicalStr for Canonicalization {
    fn canonical_str(&self) -> &'static str {
        use CanonicalizationAlgorithm::*;

        match (self.header, self.body) {
            (Simple, Simple) => "simple/simple",
            (Simple, Relaxed) => "simple/relaxed",
            (Relaxed, Simple) => "relaxed/simple",
            (Relaxed, Relaxed) => "relaxed/relaxed",
        }
    }
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl fmt::Debug for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", &self.header, &self.body)
    }
}

impl FromStr for Canonicalization {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if let Some((header, body)) = s.split_once('/') {
            Self {
                header: CanonicalizationAlgorithm::from_str(header)?,
                body: CanonicalizationAlgorithm::from_str(body)?,
            }
        } else {
            Self {
                header: CanonicalizationAlgorithm::from_str(s)?,
                body: Default::default(),
            }
        })
    }
}

/// An error that makes a *DKIM-Signature* header field unusable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DkimSignatureError {
    InvalidTagList,
    MissingDomainTag,
    MissingSelectorTag,
    MissingSignedHeadersTag,
    SignedHeadersEmpty,
    MissingSignatureTag,
    InvalidBase64,
    UnsupportedCanonicalization,
}

impl Display for DkimSignatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTagList => write!(f, "ill-formed tag list"),
            Self::MissingDomainTag => write!(f, "d= tag missing"),
            Self::MissingSelectorTag => write!(f, "s= tag missing"),
            Self::MissingSignedHeadersTag => write!(f, "h= tag missing"),
            Self::SignedHeadersEmpty => write!(f, "no signed headers"),
            Self::MissingSignatureTag => write!(f, "b= tag missing"),
            Self::InvalidBase64 => write!(f, "invalid Base64 data"),
            Self::UnsupportedCanonicalization => write!(f, "unsupported canonicalization"),
        }
    }
}

impl Error for DkimSignatureError {}

impl From<TagListParseError> for DkimSignatureError {
    fn from(_: TagListParseError) -> Self {
        Self::InvalidTagList
    }
}

/// The semantic content of a usable *DKIM-Signature* header field.
///
/// Tag values keep their case, except the signed header names, which are
/// lower-cased.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DkimSignature {
    /// The `a=` value as written, or the empty string if absent.
    pub algorithm: Box<str>,
    pub domain: Box<str>,
    pub selector: Box<str>,
    pub signed_headers: Box<[Box<str>]>,
    pub signature_data: Box<[u8]>,
    /// The `bh=` value as written. It is only decoded when a body is checked.
    pub body_hash: Option<Box<str>>,
    pub canonicalization: Canonicalization,
}

impl DkimSignature {
    /// The signature algorithm, if it is a known one.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        self.algorithm.parse().ok()
    }

    /// Whether the `d=` domain equals the given domain, ignoring case.
    pub fn domain_matches(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain)
    }

    /// Whether the header field name is listed in `h=`.
    pub fn signs_header(&self, name: &str) -> bool {
        self.signed_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }
}

impl FromStr for DkimSignature {
    type Err = DkimSignatureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let tags = TagList::from_str(value)?;

        let domain = tags
            .get("d")
            .filter(|v| !v.is_empty())
            .ok_or(DkimSignatureError::MissingDomainTag)?;

        let selector = tags
            .get("s")
            .filter(|v| !v.is_empty())
            .ok_or(DkimSignatureError::MissingSelectorTag)?;

        let signed_headers = tags
            .get("h")
            .ok_or(DkimSignatureError::MissingSignedHeadersTag)?;
        let signed_headers: Box<[Box<str>]> = parse_colon_separated_tag_value(signed_headers)
            .into_iter()
            .map(|name| name.to_ascii_lowercase().into())
            .collect();
        if signed_headers.is_empty() {
            return Err(DkimSignatureError::SignedHeadersEmpty);
        }

        let signature_data = tags
            .get("b")
            .ok_or(DkimSignatureError::MissingSignatureTag)?;
        let signature_data =
            decode_base64(signature_data).map_err(|_| DkimSignatureError::InvalidBase64)?;
        if signature_data.is_empty() {
            return Err(DkimSignatureError::MissingSignatureTag);
        }

        let body_hash = tags.get("bh").map(Into::into);

        let canonicalization = match tags.get("c") {
            Some(v) => v
                .parse()
                .map_err(|_| DkimSignatureError::UnsupportedCanonicalization)?,
            None => Default::default(),
        };

        Ok(Self {
            algorithm: tags.get("a").unwrap_or_default().into(),
            domain: domain.into(),
            selector: selector.into(),
            signed_headers,
            signature_data: signature_data.into(),
            body_hash,
            canonicalization,
        })
    }
}

/// A usable signature and the header field it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub header: &'a RawHeader,
    pub signature: DkimSignature,
}

/// Parses the first `max` *DKIM-Signature* header fields, dropping those that
/// are unusable.
pub fn parse_candidates(headers: &HeaderFields, max: usize) -> Vec<Candidate<'_>> {
    headers
        .dkim_signatures()
        .take(max)
        .filter_map(|header| match header.raw_value().parse() {
            Ok(signature) => Some(Candidate { header, signature }),
            Err(e) => {
                trace!(index = header.index, "skipping unusable DKIM signature: {e}");
                None
            }
        })
        .collect()
}

/// Picks the signature to verify.
///
/// Signatures whose domain matches the claimed domain are preferred, then
/// signatures with a supported algorithm; among equals the first one wins.
pub fn select_candidate<'a, F>(
    candidates: Vec<Candidate<'a>>,
    claimed_domain: Option<&str>,
    is_supported: F,
) -> Option<Candidate<'a>>
where
    F: Fn(SignatureAlgorithm) -> bool,
{
    let rank = |c: &Candidate<'_>| {
        let domain_match = claimed_domain.map_or(false, |d| c.signature.domain_matches(d));
        let supported = c.signature.signature_algorithm().map_or(false, &is_supported);
        (domain_match, supported)
    };

    let mut best: Option<((bool, bool), Candidate<'a>)> = None;

    for candidate in candidates {
        let r = rank(&candidate);
        if best.as_ref().map_or(true, |(best_rank, _)| r > *best_rank) {
            best = Some((r, candidate));
        }
    }

    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_header;

    #[test]
    fn dkim_signature_from_str_ok() {
        let example = " v = 1 ; a=RSA-SHA256; c=relaxed/simple; D=Example.COM; s=Sel1;\r\n\
            \th=From : Subject:\r\n\tDate; bh=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=;\r\n\
            \tb=YWJj\r\n\t ZGVm";

        let sig: DkimSignature = example.parse().unwrap();

        assert_eq!(&*sig.algorithm, "RSA-SHA256");
        assert_eq!(sig.signature_algorithm(), Some(SignatureAlgorithm::RsaSha256));
        assert_eq!(&*sig.domain, "Example.COM");
        assert!(sig.domain_matches("example.com"));
        assert_eq!(&*sig.selector, "Sel1");
        let signed_headers: Vec<_> = sig.signed_headers.iter().map(|h| &**h).collect();
        assert_eq!(signed_headers, ["from", "subject", "date"]);
        assert_eq!(&*sig.signature_data, b"abcdef");
        assert_eq!(
            sig.body_hash.as_deref(),
            Some("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=")
        );
        assert_eq!(
            sig.canonicalization,
            Canonicalization {
                header: CanonicalizationAlgorithm::Relaxed,
                body: CanonicalizationAlgorithm::Simple,
            }
        );
        assert!(sig.signs_header("SUBJECT"));
        assert!(!sig.signs_header("to"));
    }

    #[test]
    fn dkim_signature_defaults() {
        let sig: DkimSignature = "d=example.com; s=sel; h=from; b=YWJj".parse().unwrap();

        assert_eq!(&*sig.algorithm, "");
        assert_eq!(sig.signature_algorithm(), None);
        assert_eq!(sig.body_hash, None);
        assert_eq!(sig.canonicalization, Canonicalization::default());

        // bh= is not needed to verify the header
        let sig: DkimSignature = "d=example.com; s=sel; h=from; b=YWJj; bh=*invalid*"
            .parse()
            .unwrap();
        assert_eq!(sig.body_hash.as_deref(), Some("*invalid*"));

        let sig: DkimSignature = "d=example.com; s=sel; h=from; b=YWJj; c=relaxed"
            .parse()
            .unwrap();
        assert_eq!(
            sig.canonicalization.header,
            CanonicalizationAlgorithm::Relaxed
        );
        assert_eq!(sig.canonicalization.body, CanonicalizationAlgorithm::Simple);
    }

    #[test]
    fn dkim_signature_from_str_unusable() {
        fn parse(s: &str) -> Result<DkimSignature, DkimSignatureError> {
            s.parse()
        }

        use DkimSignatureError::*;

        assert_eq!(parse("s=sel; h=from; b=YWJj"), Err(MissingDomainTag));
        assert_eq!(parse("d=; s=sel; h=from; b=YWJj"), Err(MissingDomainTag));
        assert_eq!(parse("d=example.com; h=from; b=YWJj"), Err(MissingSelectorTag));
        assert_eq!(parse("d=example.com; s=sel; b=YWJj"), Err(MissingSignedHeadersTag));
        assert_eq!(parse("d=example.com; s=sel; h= : ; b=YWJj"), Err(SignedHeadersEmpty));
        assert_eq!(parse("d=example.com; s=sel; h=from"), Err(MissingSignatureTag));
        assert_eq!(parse("d=example.com; s=sel; h=from; b="), Err(MissingSignatureTag));
        assert_eq!(parse("d=example.com; s=sel; h=from; b=*"), Err(InvalidBase64));
        assert_eq!(
            parse("d=example.com; s=sel; h=from; b=YWJj; c=nofws"),
            Err(UnsupportedCanonicalization)
        );
        assert_eq!(
            parse("d=example.com; s=sel; h=from; b=YWJj; d=example.org"),
            Err(InvalidTagList)
        );
    }

    fn candidates_of(headers: &HeaderFields) -> Vec<Candidate<'_>> {
        parse_candidates(headers, 10)
    }

    #[test]
    fn select_candidate_prefers_claimed_domain() {
        let headers = parse_header(
            "DKIM-Signature: a=rsa-sha256; d=relay.example; s=s; h=from; b=YWJj\r\n\
             DKIM-Signature: a=unknown; d=Example.com; s=s; h=from; b=YWJj\r\n\
             DKIM-Signature: a=rsa-sha256; d=example.com; s=s; h=from; b=YWJj\r\n",
        )
        .unwrap();

        let c = select_candidate(candidates_of(&headers), Some("example.com"), |_| true).unwrap();
        assert_eq!(c.header.index, 2);

        let c = select_candidate(candidates_of(&headers), Some("other.example"), |_| true).unwrap();
        assert_eq!(c.header.index, 0);

        let c = select_candidate(candidates_of(&headers), None, |_| false).unwrap();
        assert_eq!(c.header.index, 0);
    }

    #[test]
    fn select_candidate_prefers_supported_algorithm() {
        let headers = parse_header(
            "DKIM-Signature: a=rsa-sha1; d=example.com; s=s; h=from; b=YWJj\r\n\
             DKIM-Signature: a=ed25519-sha256; d=example.com; s=s; h=from; b=YWJj\r\n\
             DKIM-Signature: a=rsa-sha256; d=example.com; s=s; h=from; b=YWJj\r\n",
        )
        .unwrap();

        let c = select_candidate(candidates_of(&headers), Some("example.com"), |_| true).unwrap();
        assert_eq!(c.header.index, 1);

        let c = select_candidate(candidates_of(&headers), Some("example.com"), |alg| {
            alg == SignatureAlgorithm::RsaSha256
        })
        .unwrap();
        assert_eq!(c.header.index, 2);
    }

    #[test]
    fn parse_candidates_skips_unusable() {
        let headers = parse_header(
            "DKIM-Signature: a=rsa-sha256; s=s; h=from; b=YWJj\r\n\
             From: me\r\n\
             DKIM-Signature: a=rsa-sha256; d=example.com; s=s; h=from; b=YWJj\r\n",
        )
        .unwrap();

        let candidates = candidates_of(&headers);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].header.index, 2);

        assert!(parse_candidates(&headers, 1).is_empty());
        assert!(select_candidate(vec![], None, |_| true).is_none());
    }
}
