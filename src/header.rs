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

//! Parsing of raw header text into header fields.
//!
//! Header text is accepted with CRLF or bare LF line endings, even mixed. The
//! parser never fails on a single malformed line: lines without a colon (and
//! any continuation lines following them) are skipped, and scanning proceeds
//! with the next header field.

use crate::parse::{is_wsp, split_line, CRLF};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};
use tracing::trace;

pub const DKIM_SIGNATURE_NAME: &str = "DKIM-Signature";

/// A header field as received.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawHeader {
    /// The header field name as written, without trailing whitespace.
    pub name: Box<str>,
    /// The unfolded value, continuation lines trimmed and joined with a single
    /// space.
    pub value: Box<str>,
    /// The complete header field including the name, with the original folding
    /// whitespace; lines are joined with CRLF, there is no final CRLF.
    pub raw_block: Box<str>,
    /// The position among all header fields, in receipt order.
    pub index: usize,
}

impl RawHeader {
    /// Whether this header field has the given name (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// The raw text following the colon, folding whitespace included.
    pub fn raw_value(&self) -> &str {
        self.raw_block
            .split_once(':')
            .map(|(_, value)| value)
            .unwrap_or_default()
    }
}

/// An error that occurs when header text cannot be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderParseError {
    /// Not a single well-formed header field was found.
    NoHeaderFields,
    /// A message did not contain the empty line separating header and body.
    NoBodySeparator,
}

impl Display for HeaderParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHeaderFields => write!(f, "no header fields"),
            Self::NoBodySeparator => write!(f, "no separator between header and body"),
        }
    }
}

impl Error for HeaderParseError {}

/// The ordered, non-empty collection of header fields of a message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderFields(Box<[RawHeader]>);

impl HeaderFields {
    /// Iterates over all header fields with the given name, in receipt order.
    pub fn named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl DoubleEndedIterator<Item = &'a RawHeader> + 'b
    where
        'a: 'b,
    {
        self.0.iter().filter(move |h| h.is_named(name))
    }

    /// Returns the bottom-most header field with the given name.
    ///
    /// This is the occurrence that a signature listing the name once in its
    /// signed headers covers.
    pub fn last_named(&self, name: &str) -> Option<&RawHeader> {
        self.named(name).next_back()
    }

    /// Iterates over all *DKIM-Signature* header fields.
    pub fn dkim_signatures(&self) -> impl Iterator<Item = &RawHeader> {
        self.named(DKIM_SIGNATURE_NAME)
    }

    /// Returns the raw block of the first *DKIM-Signature* header field.
    pub fn first_dkim_signature_block(&self) -> Option<&str> {
        self.dkim_signatures().next().map(|h| &*h.raw_block)
    }
}

impl AsRef<[RawHeader]> for HeaderFields {
    fn as_ref(&self) -> &[RawHeader] {
        &self.0
    }
}

impl FromStr for HeaderFields {
    type Err = HeaderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_header(s)
    }
}

/// Parses header text. Parsing stops at the first empty line or at the end of
/// input.
///
/// # Examples
///
/// ```
/// use dkim_domain_proof::header::parse_header;
///
/// let headers = parse_header("Subject: Verify\n\tABC123\nFrom: me@example.com\n").unwrap();
///
/// let subject = headers.last_named("subject").unwrap();
/// assert_eq!(&*subject.value, "Verify ABC123");
/// assert_eq!(&*subject.raw_block, "Subject: Verify\r\n\tABC123");
/// ```
pub fn parse_header(text: &str) -> Result<HeaderFields, HeaderParseError> {
    let (headers, _) = parse_fields(text);
    if headers.is_empty() {
        return Err(HeaderParseError::NoHeaderFields);
    }
    Ok(HeaderFields(headers.into()))
}

/// Splits a complete message into its header fields and its body.
pub fn split_message(message: &str) -> Result<(HeaderFields, &str), HeaderParseError> {
    let (headers, body) = parse_fields(message);
    if headers.is_empty() {
        return Err(HeaderParseError::NoHeaderFields);
    }
    let body = body.ok_or(HeaderParseError::NoBodySeparator)?;
    Ok((HeaderFields(headers.into()), body))
}

struct PendingHeader {
    name: Box<str>,
    value: String,
    raw_block: String,
}

// Returns the parsed header fields and, if an empty line was found, the text
// after it.
fn parse_fields(text: &str) -> (Vec<RawHeader>, Option<&str>) {
    let mut headers = vec![];
    let mut current: Option<PendingHeader> = None;

    let mut rest = Some(text);
    let mut body = None;

    while let Some(s) = rest.filter(|s| !s.is_empty()) {
        let (line, next) = split_line(s);
        rest = next;

        if line.is_empty() {
            body = Some(rest.unwrap_or_default());
            break;
        }

        if line.starts_with(is_wsp) {
            match &mut current {
                Some(pending) => {
                    pending.raw_block.push_str(CRLF);
                    pending.raw_block.push_str(line);

                    let piece = line.trim_matches(is_wsp);
                    if !piece.is_empty() {
                        if !pending.value.is_empty() {
                            pending.value.push(' ');
                        }
                        pending.value.push_str(piece);
                    }
                }
                None => trace!("skipping continuation line without header field"),
            }
            continue;
        }

        if let Some(pending) = current.take() {
            headers.push(finish_header(pending, headers.len()));
        }

        current = match line.split_once(':') {
            Some((name, value)) => {
                let name = name.trim_end_matches(is_wsp);
                if is_field_name(name) {
                    Some(PendingHeader {
                        name: name.into(),
                        value: value.trim_matches(is_wsp).into(),
                        raw_block: line.into(),
                    })
                } else {
                    trace!("skipping header line with ill-formed name");
                    None
                }
            }
            None => {
                trace!("skipping header line without colon");
                None
            }
        };
    }

    if let Some(pending) = current {
        headers.push(finish_header(pending, headers.len()));
    }

    (headers, body)
}

fn finish_header(pending: PendingHeader, index: usize) -> RawHeader {
    RawHeader {
        name: pending.name,
        value: pending.value.into(),
        raw_block: pending.raw_block.into(),
        index,
    }
}

// RFC 5322, section 3.6.8: printable ASCII except colon
fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_graphic() && c != ':')
}
