//! Java-style `.properties` parsing and rendering.
//!
//! Gradle scripts read `key.properties` through `java.util.Properties`, so the
//! parser follows the same text rules: `#`/`!` comments, `=`/`:`/whitespace
//! separators, backslash line continuations and `\uXXXX` escapes. Files are
//! decoded as ISO-8859-1, which is what `Properties.load(InputStream)` does.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use crate::error::{KeypropError, Result};

/// A parsed properties file. Later duplicates of a key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses properties text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut properties = Properties::new();

        for logical in logical_lines(content) {
            let (key, value) = split_key_value(&logical.text);
            let key = unescape(key, logical.line)?;
            let value = unescape(value, logical.line)?;
            properties.entries.insert(key, value);
        }

        Ok(properties)
    }

    /// Loads a properties file from disk.
    ///
    /// Returns `Ok(None)` if the file does not exist. Any other I/O failure
    /// (permissions, the path being a directory) is propagated.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No properties file at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(KeypropError::Io(e)),
        };

        let content: String = bytes.iter().map(|&b| b as char).collect();
        let properties = Self::parse(&content)?;
        tracing::debug!(
            "Loaded {} properties from {}",
            properties.len(),
            path.display()
        );

        Ok(Some(properties))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the entries as properties text, one `key=value` per line.
    ///
    /// The output only contains ASCII, so it reads back identically under
    /// both UTF-8 and ISO-8859-1 decoding.
    pub fn to_properties_string(&self) -> String {
        let mut output = String::new();
        for (key, value) in &self.entries {
            output.push_str(&escape_key(key));
            output.push('=');
            output.push_str(&escape_value(value));
            output.push('\n');
        }
        output
    }
}

impl FromStr for Properties {
    type Err = KeypropError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A logical line after comment removal and continuation joining.
struct LogicalLine {
    /// 1-based number of the natural line the logical line starts on.
    line: usize,
    text: String,
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Number of consecutive backslashes at the end of `s`.
fn trailing_backslashes(s: &str) -> usize {
    s.chars().rev().take_while(|&c| c == '\\').count()
}

/// Splits on `\n`, `\r\n` or a lone `\r`, like `java.util.Properties`.
fn natural_lines(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&content[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&content[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < content.len() {
        lines.push(&content[start..]);
    }

    lines
}

fn logical_lines(content: &str) -> Vec<LogicalLine> {
    let mut result = Vec::new();
    let mut lines = natural_lines(content).into_iter().enumerate();

    while let Some((index, raw)) = lines.next() {
        let trimmed = raw.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut text = trimmed.to_string();
        // An odd run of trailing backslashes escapes the line break.
        while trailing_backslashes(&text) % 2 == 1 {
            text.pop();
            match lines.next() {
                Some((_, next)) => text.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        result.push(LogicalLine {
            line: index + 1,
            text,
        });
    }

    result
}

/// Splits a logical line into its still-escaped key and value parts.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut value_start = line.len();
    let mut has_separator = false;
    let mut preceding_backslash = false;

    for (i, c) in line.char_indices() {
        if preceding_backslash {
            preceding_backslash = false;
            continue;
        }
        match c {
            '\\' => preceding_backslash = true,
            '=' | ':' => {
                key_end = i;
                value_start = i + 1;
                has_separator = true;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                value_start = i + c.len_utf8();
                break;
            }
            _ => {}
        }
    }

    let rest = line[value_start..].trim_start_matches(is_blank);
    let rest = if !has_separator && (rest.starts_with('=') || rest.starts_with(':')) {
        rest[1..].trim_start_matches(is_blank)
    } else {
        rest
    };

    (&line[..key_end], rest)
}

fn read_hex_unit(chars: &mut std::str::Chars<'_>, line: usize) -> Result<u16> {
    let mut value: u16 = 0;
    for _ in 0..4 {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| KeypropError::PropertiesParse {
                line,
                message: "malformed \\uxxxx encoding".to_string(),
            })?;
        value = (value << 4) | digit as u16;
    }
    Ok(value)
}

fn unescape(raw: &str, line: usize) -> Result<String> {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }

        match chars.next() {
            Some('u') => {
                let unit = read_hex_unit(&mut chars, line)?;
                let decoded = if (0xD800..0xDC00).contains(&unit) {
                    let mut lookahead = chars.clone();
                    let low = match (lookahead.next(), lookahead.next()) {
                        (Some('\\'), Some('u')) => read_hex_unit(&mut lookahead, line)?,
                        _ => {
                            return Err(KeypropError::PropertiesParse {
                                line,
                                message: format!("unpaired surrogate \\u{:04X}", unit),
                            });
                        }
                    };
                    chars = lookahead;
                    char::decode_utf16([unit, low]).next().and_then(|r| r.ok())
                } else {
                    char::from_u32(unit as u32)
                };
                let decoded = decoded.ok_or_else(|| KeypropError::PropertiesParse {
                    line,
                    message: format!("invalid unicode escape \\u{:04X}", unit),
                })?;
                output.push(decoded);
            }
            Some('t') => output.push('\t'),
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('f') => output.push('\x0c'),
            Some(other) => output.push(other),
            // A dangling backslash at the end of input is dropped.
            None => {}
        }
    }

    Ok(output)
}

fn escape(s: &str, escape_all_spaces: bool) -> String {
    let mut output = String::with_capacity(s.len());

    for (i, c) in s.chars().enumerate() {
        match c {
            ' ' if escape_all_spaces || i == 0 => output.push_str("\\ "),
            '\\' => output.push_str("\\\\"),
            '\t' => output.push_str("\\t"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\x0c' => output.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                output.push('\\');
                output.push(c);
            }
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    output.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => output.push(c),
        }
    }

    output
}

/// Escapes a key so it survives a parse round trip.
pub fn escape_key(key: &str) -> String {
    escape(key, true)
}

/// Escapes a value so it survives a parse round trip.
pub fn escape_value(value: &str) -> String {
    escape(value, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators() {
        let props = Properties::parse("a=1\nb:2\nc 3\nd = 4\ne\t:\t5\nf  =  6").unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.get("c"), Some("3"));
        assert_eq!(props.get("d"), Some("4"));
        assert_eq!(props.get("e"), Some("5"));
        assert_eq!(props.get("f"), Some("6"));
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let content = "# comment\n  ! another\n\n   \nkey=value\n";
        let props = Properties::parse(content).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key"), Some("value"));
    }

    #[test]
    fn test_parse_keeps_trailing_whitespace_in_value() {
        let props = Properties::parse("keyPassword=secret  ").unwrap();
        assert_eq!(props.get("keyPassword"), Some("secret  "));
    }

    #[test]
    fn test_parse_value_may_contain_separators() {
        let props = Properties::parse("url=https://example.com/a=b").unwrap();
        assert_eq!(props.get("url"), Some("https://example.com/a=b"));
    }

    #[test]
    fn test_parse_key_without_value() {
        let props = Properties::parse("emptyKey\nother=").unwrap();
        assert_eq!(props.get("emptyKey"), Some(""));
        assert_eq!(props.get("other"), Some(""));
    }

    #[test]
    fn test_parse_line_continuation() {
        let content = "storeFile=/very/long/\\\n    path/upload.jks\nnext=1";
        let props = Properties::parse(content).unwrap();
        assert_eq!(props.get("storeFile"), Some("/very/long/path/upload.jks"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn test_parse_even_backslashes_do_not_continue() {
        let content = "dir=C:\\\\\nnext=1";
        let props = Properties::parse(content).unwrap();
        assert_eq!(props.get("dir"), Some("C:\\"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn test_parse_escapes() {
        let content = r"my\ key=tab\there\u0041\=\:\#";
        let props = Properties::parse(content).unwrap();
        assert_eq!(props.get("my key"), Some("tab\thereA=:#"));
    }

    #[test]
    fn test_parse_surrogate_pair() {
        let props = Properties::parse(r"emoji=\uD83D\uDE00").unwrap();
        assert_eq!(props.get("emoji"), Some("\u{1F600}"));
    }

    #[test]
    fn test_parse_malformed_unicode_escape() {
        let err = Properties::parse("a=1\nbad=\\u12G4").unwrap_err();
        match err {
            KeypropError::PropertiesParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_duplicate_key_last_wins() {
        let props = Properties::parse("keyAlias=first\nkeyAlias=second").unwrap();
        assert_eq!(props.get("keyAlias"), Some("second"));
    }

    #[test]
    fn test_parse_crlf() {
        let props = Properties::parse("a=1\r\nb=2\r\n").unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
    }

    #[test]
    fn test_parse_cr_only_line_breaks() {
        let props = Properties::parse("keyAlias=upload\rkeyPassword=pw\r").unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("keyAlias"), Some("upload"));
        assert_eq!(props.get("keyPassword"), Some("pw"));
    }

    #[test]
    fn test_parse_mixed_line_breaks_keep_line_numbers() {
        let err = Properties::parse("a=1\rb=2\r\nc=3\nbad=\\u00\n").unwrap_err();
        match err {
            KeypropError::PropertiesParse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_continuation_across_cr() {
        let props = Properties::parse("storeFile=/keys/\\\r  upload.jks\r").unwrap();
        assert_eq!(props.get("storeFile"), Some("/keys/upload.jks"));
    }

    #[test]
    fn test_escape_value_windows_path() {
        let escaped = escape_value(r"C:\keys\upload.jks");
        assert_eq!(escaped, r"C\:\\keys\\upload.jks");
    }

    #[test]
    fn test_to_properties_string_reads_back() {
        let mut props = Properties::new();
        props.insert("storeFile", r"C:\keys\upload.jks");
        props.insert("storePassword", " p@ss=word#1 ");
        props.insert("keyAlias", "upload");
        props.insert("keyPassword", "pässwörd");

        let text = props.to_properties_string();
        assert!(text.is_ascii());
        assert_eq!(Properties::parse(&text).unwrap(), props);
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = Properties::load(&dir.path().join("key.properties")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Properties::load(dir.path());
        assert!(matches!(result, Err(KeypropError::Io(_))));
    }

    #[test]
    fn test_load_decodes_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.properties");
        std::fs::write(&path, b"keyPassword=caf\xe9\n").unwrap();

        let props = Properties::load(&path).unwrap().unwrap();
        assert_eq!(props.get("keyPassword"), Some("café"));
    }
}
