//! Rich-text body encoding.
//!
//! Bodies are stored as RTF. The conversion is a seam: anything implementing
//! [`RichTextCodec`] can be plugged into a project handle. [`RtfCodec`] is the
//! bundled implementation. Reading is delegated to `rtf-parser`; writing emits
//! a small RTF subset that keeps paragraphs, tabs and Unicode text and no
//! formatting.

use rtf_parser::document::RtfDocument;
use thiserror::Error;

/// Failure to convert between plain text and the on-disk encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("input is not RTF (missing {{\\rtf header)")]
    NotRtf,
    #[error("malformed control sequence at character {0}")]
    ControlWord(usize),
    #[error("malformed RTF: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

/// Converts document bodies between plain text and their stored bytes.
pub trait RichTextCodec: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<String, CodecError>;
    fn encode(&self, text: &str) -> Result<Vec<u8>, CodecError>;
}

const HEADER: &str = "{\\rtf1\\ansi\\uc0{\\fonttbl\\f0\\fswiss Helvetica;}\\f0\\pard ";

/// RTF codec backed by `rtf-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtfCodec;

impl RichTextCodec for RtfCodec {
    fn decode(&self, raw: &[u8]) -> Result<String, CodecError> {
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text.to_string(),
            // RTF is nominally 7-bit; tolerate stray 8-bit bytes as Latin-1.
            Err(_) => raw.iter().map(|&b| b as char).collect(),
        };
        let text = text.trim();
        if !text.starts_with("{\\rtf") {
            return Err(CodecError::NotRtf);
        }
        check_unicode_escapes(text)?;

        let document = RtfDocument::try_from(text)
            .map_err(|e| CodecError::Malformed(format!("{:?}", e)))?;
        Ok(document.get_text())
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        let mut out = String::with_capacity(HEADER.len() + text.len() + 16);
        out.push_str(HEADER);

        let mut run = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    flush_run(&mut out, &mut run);
                    push_escape(&mut out, '\n');
                }
                ' '..='~' if !matches!(c, '\\' | '{' | '}') => run.push(c),
                _ => {
                    flush_run(&mut out, &mut run);
                    push_escape(&mut out, c);
                }
            }
        }
        flush_run(&mut out, &mut run);

        out.push('}');
        Ok(out.into_bytes())
    }
}

/// Plain text goes out literally, except spaces at either end of a run.
/// A reader may trim those against the surrounding control words.
fn flush_run(out: &mut String, run: &mut String) {
    let body = run.trim_matches(' ');
    let leading = run.len() - run.trim_start_matches(' ').len();
    let trailing = if body.is_empty() {
        0
    } else {
        run.len() - run.trim_end_matches(' ').len()
    };

    for _ in 0..leading {
        push_escape(out, ' ');
    }
    out.push_str(body);
    for _ in 0..trailing {
        push_escape(out, ' ');
    }
    run.clear();
}

/// One character as a `\u` group. Characters above the BMP become a
/// surrogate pair in the same group.
fn push_escape(out: &mut String, c: char) {
    let mut units = [0u16; 2];
    out.push('{');
    for unit in c.encode_utf16(&mut units) {
        out.push_str(&format!("\\u{}", unit));
    }
    out.push('}');
}

/// `\uN` must name a 16-bit unit, signed or unsigned. Anything else would be
/// wrapped into a different character.
fn check_unicode_escapes(text: &str) -> Result<(), CodecError> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    while pos < chars.len() {
        if chars[pos] != '\\' {
            pos += 1;
            continue;
        }
        let start = pos;
        match chars.get(pos + 1) {
            Some('u') if !chars.get(pos + 2).is_some_and(|c| c.is_ascii_alphabetic()) => {
                let mut end = pos + 2;
                if chars.get(end) == Some(&'-') {
                    end += 1;
                }
                while chars.get(end).is_some_and(|c| c.is_ascii_digit()) {
                    end += 1;
                }
                let digits: String = chars[pos + 2..end].iter().collect();
                match digits.parse::<i64>() {
                    Ok(value) if (-32768..=65535).contains(&value) => {}
                    _ => return Err(CodecError::ControlWord(start)),
                }
                pos = end;
            }
            // Escaped symbol, including `\\`.
            Some(_) => pos += 2,
            None => pos += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> String {
        let codec = RtfCodec;
        let bytes = codec.encode(text).unwrap();
        codec.decode(&bytes).unwrap()
    }

    #[test]
    fn test_round_trips_plain_text() {
        let text = "Chapter one.\n\n\tIt was a dark night; {braces} and \\backslashes\\ survive.";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn test_round_trips_unicode() {
        let text = "Café — naïve “quotes” 日本語 🚀 end";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn test_round_trips_edge_whitespace() {
        for text in ["", " leading", "trailing \n", "\n\n", "a\tb\t\tc", "x  y", "   "] {
            assert_eq!(round_trip(text), text);
        }
    }

    #[test]
    fn test_normalizes_carriage_returns() {
        assert_eq!(round_trip("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_encoded_output_is_ascii() {
        let bytes = RtfCodec.encode("Ünïcødé 🚀").unwrap();
        assert!(bytes.is_ascii());
        assert!(bytes.starts_with(b"{\\rtf1"));
    }

    #[test]
    fn test_escapes_edge_spaces_only() {
        let bytes = RtfCodec.encode(" a b ").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with("{\\u32}a b{\\u32}}"));
    }

    #[test]
    fn test_decodes_foreign_rtf() {
        let raw = br"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard Voici du texte en {\b gras}.\pard\par}";
        let text = RtfCodec.decode(raw).unwrap();
        assert!(text.starts_with("Voici du texte en gras."));
    }

    #[test]
    fn test_rejects_non_rtf() {
        assert_eq!(RtfCodec.decode(b"plain text"), Err(CodecError::NotRtf));
    }

    #[test]
    fn test_rejects_out_of_range_unicode_escape() {
        assert_eq!(
            RtfCodec.decode(br"{\rtf1 \u70000?}"),
            Err(CodecError::ControlWord(7))
        );
        assert!(matches!(
            RtfCodec.decode(br"{\rtf1 \u-40000?}"),
            Err(CodecError::ControlWord(_))
        ));
        assert!(matches!(
            RtfCodec.decode(br"{\rtf1 \u?}"),
            Err(CodecError::ControlWord(_))
        ));
    }

    #[test]
    fn test_ignores_escaped_backslash_before_u() {
        assert!(check_unicode_escapes(r"{\rtf1 \\u99999}").is_ok());
        assert!(check_unicode_escapes(r"{\rtf1 \uc1\u233?}").is_ok());
    }
}
