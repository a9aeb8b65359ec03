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

use crate::parse::is_fws;
use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};
use tracing::trace;

#[derive(Debug, PartialEq, Eq)]
pub struct TagSpec<'a> {
    /// The tag name, lower-cased.
    pub name: Box<str>,
    /// The tag value, surrounding whitespace removed, case preserved.
    pub value: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TagListParseError {
    DuplicateTag,
}

impl Display for TagListParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTag => write!(f, "duplicate tag"),
        }
    }
}

/// A list of `name=value` tags as found in *DKIM-Signature* headers and DKIM
/// key records.
#[derive(Debug, PartialEq, Eq)]
pub struct TagList<'a>(Vec<TagSpec<'a>>);

impl<'a> AsRef<[TagSpec<'a>]> for TagList<'a> {
    fn as_ref(&self) -> &[TagSpec<'a>] {
        &self.0
    }
}

impl<'a> TagList<'a> {
    /// Splits the input on `;`, then each piece on its first `=`.
    ///
    /// Parsing is lenient: empty pieces and pieces without `=` are ignored.
    /// Duplicate tag names make the whole tag list invalid (RFC 6376, section
    /// 3.2).
    pub fn from_str(val: &'a str) -> Result<Self, TagListParseError> {
        let mut tags = vec![];
        let mut names_seen = HashSet::new();

        for piece in val.split(';') {
            let Some((name, value)) = piece.split_once('=') else {
                if !piece.trim_matches(is_fws).is_empty() {
                    trace!("ignoring tag without value separator");
                }
                continue;
            };

            let name = name.trim_matches(is_fws).to_ascii_lowercase();
            if name.is_empty() {
                trace!("ignoring tag without name");
                continue;
            }

            if !names_seen.insert(name.clone()) {
                return Err(TagListParseError::DuplicateTag);
            }

            tags.push(TagSpec {
                name: name.into(),
                value: value.trim_matches(is_fws),
            });
        }

        Ok(Self(tags))
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.0
            .iter()
            .find(|tag| &*tag.name == name)
            .map(|tag| tag.value)
    }
}

/// Splits a colon-separated tag value such as `h=`, dropping empty entries.
pub fn parse_colon_separated_tag_value(value: &str) -> Vec<&str> {
    value
        .split(':')
        .map(|s| s.trim_matches(is_fws))
        .filter(|s| !s.is_empty())
        .collect()
}
