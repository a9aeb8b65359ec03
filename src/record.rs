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

//! Parsing of DKIM public key records (RFC 6376, section 3.6.1).

use crate::{
    crypto::KeyType,
    tag_list::{parse_colon_separated_tag_value, TagList},
    util::decode_base64,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkimKeyRecordParseError {
    TagListSyntax,
    UnsupportedVersion,
    UnsupportedKeyType,
    NoSupportedHashAlgorithms,
    NotForEmail,
    RevokedKey,
    MissingKeyTag,
    InvalidBase64,
}

impl Display for DkimKeyRecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagListSyntax => write!(f, "invalid tag-list"),
            Self::UnsupportedVersion => write!(f, "unsupported version"),
            Self::UnsupportedKeyType => write!(f, "unsupported key type"),
            Self::NoSupportedHashAlgorithms => write!(f, "no supported hash algorithms"),
            Self::NotForEmail => write!(f, "key not for use with email"),
            Self::RevokedKey => write!(f, "key revoked"),
            Self::MissingKeyTag => write!(f, "p= tag missing"),
            Self::InvalidBase64 => write!(f, "invalid Base64 string"),
        }
    }
}

impl Error for DkimKeyRecordParseError {}

/// A DKIM public key record.
#[derive(Debug, PartialEq, Eq)]
pub struct DkimKeyRecord {
    pub key_type: KeyType,
    pub key_data: Box<[u8]>,
    /// Whether the `t=y` (testing) flag is set.
    pub testing: bool,
}

impl DkimKeyRecord {
    fn from_tag_list(tag_list: &TagList<'_>) -> Result<Self, DkimKeyRecordParseError> {
        let mut key_type = KeyType::Rsa;
        let mut key_data = None;
        let mut testing = false;

        for tag in tag_list.as_ref() {
            let value = tag.value;

            match &*tag.name {
                "v" => {
                    if value != "DKIM1" {
                        return Err(DkimKeyRecordParseError::UnsupportedVersion);
                    }
                }
                "h" => {
                    if !parse_colon_separated_tag_value(value)
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case("sha256"))
                    {
                        return Err(DkimKeyRecordParseError::NoSupportedHashAlgorithms);
                    }
                }
                "k" => {
                    if value.eq_ignore_ascii_case("ed25519") {
                        key_type = KeyType::Ed25519;
                    } else if !value.eq_ignore_ascii_case("rsa") {
                        return Err(DkimKeyRecordParseError::UnsupportedKeyType);
                    }
                }
                "p" => {
                    if value.is_empty() {
                        return Err(DkimKeyRecordParseError::RevokedKey);
                    }

                    let s = decode_base64(value)
                        .map_err(|_| DkimKeyRecordParseError::InvalidBase64)?;

                    key_data = Some(s.into());
                }
                "s" => {
                    if !parse_colon_separated_tag_value(value)
                        .iter()
                        .any(|&s| s == "*" || s.eq_ignore_ascii_case("email"))
                    {
                        return Err(DkimKeyRecordParseError::NotForEmail);
                    }
                }
                "t" => {
                    testing = parse_colon_separated_tag_value(value)
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case("y"));
                }
                // §3.6.1: ‘Other tags MAY be present and MUST be ignored by any
                // implementation that does not understand them.’
                _ => {}
            }
        }

        let key_data = key_data.ok_or(DkimKeyRecordParseError::MissingKeyTag)?;

        Ok(Self {
            key_type,
            key_data,
            testing,
        })
    }
}

impl FromStr for DkimKeyRecord {
    type Err = DkimKeyRecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag_list =
            TagList::from_str(s).map_err(|_| DkimKeyRecordParseError::TagListSyntax)?;

        Self::from_tag_list(&tag_list)
    }
}
