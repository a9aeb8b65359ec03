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

//! Common parsing utilities.

pub const CRLF: &str = "\r\n";

// RFC 5234, appendix B.1

pub fn is_wsp(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// Whitespace that may occur in folded header text.
pub fn is_fws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Splits off the first line of the input, accepting both CRLF and bare LF as
/// line terminator. Returns the line without terminator and the remainder.
pub fn split_line(input: &str) -> (&str, Option<&str>) {
    match input.split_once('\n') {
        Some((line, rest)) => (line.strip_suffix('\r').unwrap_or(line), Some(rest)),
        None => (input.strip_suffix('\r').unwrap_or(input), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_line_ok() {
        assert_eq!(split_line("a\r\nb"), ("a", Some("b")));
        assert_eq!(split_line("a\nb\r\n"), ("a", Some("b\r\n")));
        assert_eq!(split_line("a\r"), ("a", None));
        assert_eq!(split_line("\n"), ("", Some("")));
        assert_eq!(split_line(""), ("", None));
    }
}
