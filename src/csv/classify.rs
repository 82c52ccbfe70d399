//! Byte classification tables driving the parser.

/// Role of a byte in the current parsing context.
///
/// The discriminants are chosen so that clearing the `Quote` bits turns
/// `Delimiter` and `Newline` into `NotSpecial` and `Quote` into
/// `QuoteEscapeQuote`, which is exactly what happens inside a quoted field.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseFlag {
    /// A quote inside, or terminating, a quoted field.
    QuoteEscapeQuote = 0,
    /// A quote that may open a quoted field.
    Quote = 0b011,
    NotSpecial = 0b100,
    Delimiter = 0b110,
    Newline = 0b111,
}

pub type ParseFlagMap = [ParseFlag; 256];
pub type WhitespaceMap = [bool; 256];

/// Reinterpret `flag` for the inside of a quoted field when `quote_escape`
/// is set.
#[inline]
#[must_use]
pub const fn quote_escape_flag(flag: ParseFlag, quote_escape: bool) -> ParseFlag {
    if !quote_escape {
        return flag;
    }
    match flag {
        ParseFlag::Quote => ParseFlag::QuoteEscapeQuote,
        ParseFlag::Delimiter | ParseFlag::Newline => ParseFlag::NotSpecial,
        other => other,
    }
}

/// Classify every byte for the given delimiter and optional quote character.
/// `\r` and `\n` are always newlines.
#[must_use]
pub fn make_parse_flags(delimiter: u8, quote: Option<u8>) -> ParseFlagMap {
    let mut flags = [ParseFlag::NotSpecial; 256];
    flags[usize::from(b'\r')] = ParseFlag::Newline;
    flags[usize::from(b'\n')] = ParseFlag::Newline;
    flags[usize::from(delimiter)] = ParseFlag::Delimiter;
    if let Some(quote) = quote {
        flags[usize::from(quote)] = ParseFlag::Quote;
    }
    flags
}

/// Mark the bytes to be trimmed from either end of unquoted fields.
#[must_use]
pub fn make_ws_flags(trim_chars: &[u8]) -> WhitespaceMap {
    let mut flags = [false; 256];
    for &ch in trim_chars {
        flags[usize::from(ch)] = true;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_flag_matches_bit_clearing() {
        let all = [
            ParseFlag::QuoteEscapeQuote,
            ParseFlag::Quote,
            ParseFlag::NotSpecial,
            ParseFlag::Delimiter,
            ParseFlag::Newline,
        ];
        for flag in all {
            let cleared = flag as u8 & !(ParseFlag::Quote as u8);
            assert_eq!(quote_escape_flag(flag, true) as u8, cleared);
            assert_eq!(quote_escape_flag(flag, false), flag);
        }
    }

    #[test]
    fn delimiter_and_quote_are_classified() {
        let flags = make_parse_flags(b';', Some(b'\''));
        assert_eq!(flags[usize::from(b';')], ParseFlag::Delimiter);
        assert_eq!(flags[usize::from(b'\'')], ParseFlag::Quote);
        assert_eq!(flags[usize::from(b'"')], ParseFlag::NotSpecial);
        assert_eq!(flags[usize::from(b'\r')], ParseFlag::Newline);

        let unquoted = make_parse_flags(b',', None);
        assert_eq!(unquoted[usize::from(b'"')], ParseFlag::NotSpecial);
    }
}
