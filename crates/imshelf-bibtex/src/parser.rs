//! BibTeX parser
//!
//! Handles standard BibTeX format:
//! - @string definitions
//! - @preamble declarations
//! - @comment sections
//! - Braced and quoted field values
//! - String concatenation with #
//! - Nested braces in field values
//!
//! Parsing is all-or-nothing: the first malformed record fails the whole
//! input with a line-numbered [`ParseError`]. Callers that need per-record
//! tolerance (the export scan) parse one file at a time and skip failures
//! themselves.

use nom::{bytes::complete::take_while1, character::complete::char, IResult};
use std::collections::{HashMap, HashSet};

use crate::entry::{EntryType, Record};

/// Parse failure, pointing at the source line of the offending record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed record at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("unbalanced braces in record starting at line {line}")]
    UnbalancedBraces { line: usize },
    #[error("duplicate cite key `{key}` at line {line}")]
    DuplicateKey { key: String, line: usize },
}

/// Parse a BibTeX string into its records, in source order.
///
/// `@string` definitions are expanded into referencing field values;
/// `@preamble` and `@comment` blocks are consumed and dropped. Text between
/// entries is comment material, as in BibTeX proper.
pub fn parse(input: &str) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::new();
    let mut strings: HashMap<String, String> = HashMap::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    let mut remaining = skip_to_entry(input);
    while !remaining.is_empty() {
        let line = line_of(input, remaining);
        let (rest, parsed) = parse_at_entry(remaining, &strings).map_err(|e| match e {
            EntryError::Unbalanced => ParseError::UnbalancedBraces { line },
            EntryError::Syntax(message) => ParseError::Malformed { line, message },
        })?;

        match parsed {
            AtEntry::Record(record) => {
                if !seen_keys.insert(record.key.clone()) {
                    return Err(ParseError::DuplicateKey {
                        key: record.key,
                        line,
                    });
                }
                records.push(record);
            }
            AtEntry::StringDef(key, value) => {
                strings.insert(key, value);
            }
            AtEntry::Preamble | AtEntry::Comment => {}
        }

        remaining = skip_to_entry(rest);
    }

    Ok(records)
}

/// Result of parsing one @ block
enum AtEntry {
    Record(Record),
    StringDef(String, String),
    Preamble,
    Comment,
}

/// Entry-level failure, converted to a line-numbered [`ParseError`] above
enum EntryError {
    Unbalanced,
    Syntax(String),
}

type EResult<'a, T> = Result<(&'a str, T), EntryError>;

/// 1-based line number of `rest` within `input`
fn line_of(input: &str, rest: &str) -> usize {
    let consumed = input.len() - rest.len();
    input[..consumed].matches('\n').count() + 1
}

/// Skip whitespace, % line comments, and inter-entry junk up to the next @
fn skip_to_entry(input: &str) -> &str {
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'@' => break,
            b'%' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            _ => pos += 1,
        }
    }

    &input[pos..]
}

/// Adapt a nom token result to an entry-level error
fn token<'a, T>(result: IResult<&'a str, T>, expected: &str) -> EResult<'a, T> {
    result.map_err(|_| EntryError::Syntax(format!("expected {}", expected)))
}

fn skip_ws(input: &str) -> &str {
    input.trim_start()
}

/// Parse one @ block (record, @string, @preamble, or @comment)
fn parse_at_entry<'a>(input: &'a str, strings: &HashMap<String, String>) -> EResult<'a, AtEntry> {
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('@')(input), "`@`")?;
    let rest = skip_ws(rest);
    let (rest, block_type) = token(
        take_while1::<_, _, nom::error::Error<&str>>(|c: char| c.is_ascii_alphanumeric())(rest),
        "entry type",
    )?;

    match block_type.to_lowercase().as_str() {
        "string" => {
            let (rest, (key, value)) = parse_string_definition(rest, strings)?;
            Ok((rest, AtEntry::StringDef(key, value)))
        }
        "preamble" => {
            let (rest, _) = parse_preamble(rest, strings)?;
            Ok((rest, AtEntry::Preamble))
        }
        "comment" => {
            let (rest, _) = parse_comment_body(rest)?;
            Ok((rest, AtEntry::Comment))
        }
        _ => {
            let (rest, record) = parse_record_body(rest, block_type, strings)?;
            Ok((rest, AtEntry::Record(record)))
        }
    }
}

/// Parse a @string definition
fn parse_string_definition<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> EResult<'a, (String, String)> {
    let rest = skip_ws(input);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('{')(rest), "`{`")?;
    let rest = skip_ws(rest);
    let (rest, key) = token(
        take_while1::<_, _, nom::error::Error<&str>>(|c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        })(rest),
        "string name",
    )?;
    let rest = skip_ws(rest);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('=')(rest), "`=`")?;
    let rest = skip_ws(rest);
    let (rest, value) = parse_field_value(rest, strings)?;
    let rest = skip_ws(rest);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('}')(rest), "`}`")?;

    Ok((rest, (key.to_string(), value)))
}

/// Parse a @preamble block
fn parse_preamble<'a>(input: &'a str, strings: &HashMap<String, String>) -> EResult<'a, String> {
    let rest = skip_ws(input);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('{')(rest), "`{`")?;
    let rest = skip_ws(rest);
    let (rest, value) = parse_field_value(rest, strings)?;
    let rest = skip_ws(rest);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('}')(rest), "`}`")?;

    Ok((rest, value))
}

/// Parse a @comment body (braced block, or the rest of the line)
fn parse_comment_body(input: &str) -> EResult<'_, ()> {
    let rest = skip_ws(input);
    if rest.starts_with('{') {
        let (rest, _) = parse_braced_content(rest)?;
        Ok((rest, ()))
    } else {
        let pos = rest.find('\n').unwrap_or(rest.len());
        Ok((&rest[pos..], ()))
    }
}

/// Parse a record body: `{key, field = value, ...}`
fn parse_record_body<'a>(
    input: &'a str,
    entry_type: &str,
    strings: &HashMap<String, String>,
) -> EResult<'a, Record> {
    let rest = skip_ws(input);
    let (rest, _) = token(char::<_, nom::error::Error<&str>>('{')(rest), "`{`")?;
    let rest = skip_ws(rest);

    let (rest, cite_key) = token(
        take_while1::<_, _, nom::error::Error<&str>>(|c: char| {
            c.is_ascii_alphanumeric() || "_-:./+".contains(c)
        })(rest),
        "cite key",
    )?;
    let rest = skip_ws(rest);
    let (rest, _) = token(
        char::<_, nom::error::Error<&str>>(',')(rest),
        "`,` after cite key",
    )?;

    let (rest, fields) = parse_fields(rest, strings)?;

    let rest = skip_ws(rest);
    let (rest, _) = token(
        char::<_, nom::error::Error<&str>>('}')(rest),
        "`}` closing the record",
    )?;

    let mut record = Record::new(cite_key, EntryType::from_str(entry_type));
    for (name, value) in fields {
        record.push_field(name, value);
    }

    Ok((rest, record))
}

/// Parse the fields of a record up to (not including) the closing brace
fn parse_fields<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> EResult<'a, Vec<(String, String)>> {
    let mut fields = Vec::new();
    let mut remaining = input;

    loop {
        let rest = skip_ws(remaining);
        if rest.starts_with('}') || rest.is_empty() {
            return Ok((rest, fields));
        }

        let (rest, name) = token(
            take_while1::<_, _, nom::error::Error<&str>>(|c: char| {
                c.is_ascii_alphanumeric() || c == '_' || c == '-'
            })(rest),
            "field name",
        )?;
        let rest = skip_ws(rest);
        let (rest, _) = token(
            char::<_, nom::error::Error<&str>>('=')(rest),
            "`=` after field name",
        )?;
        let rest = skip_ws(rest);
        let (rest, value) = parse_field_value(rest, strings)?;
        fields.push((name.to_string(), value));

        // Optional comma; absent before the closing brace
        let rest = skip_ws(rest);
        remaining = rest.strip_prefix(',').unwrap_or(rest);
    }
}

/// Parse a field value: braced, quoted, bare number, or @string reference,
/// with `#` concatenation between parts
fn parse_field_value<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> EResult<'a, String> {
    let mut result = String::new();
    let mut remaining = input;

    loop {
        let rest = skip_ws(remaining);

        let (rest, part) = if rest.starts_with('{') {
            let (rest, content) = parse_braced_content(rest)?;
            // Drop the outer braces, keep nested ones
            (rest, content[1..content.len() - 1].to_string())
        } else if rest.starts_with('"') {
            parse_quoted_value(rest)?
        } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let (rest, digits) = token(
                take_while1::<_, _, nom::error::Error<&str>>(|c: char| c.is_ascii_digit())(rest),
                "number",
            )?;
            (rest, digits.to_string())
        } else {
            let (rest, name) = token(
                take_while1::<_, _, nom::error::Error<&str>>(|c: char| {
                    c.is_ascii_alphanumeric() || c == '_' || c == '-'
                })(rest),
                "field value",
            )?;
            // Unresolved references stay as written (e.g. month macros)
            let value = strings.get(name).cloned().unwrap_or_else(|| name.to_string());
            (rest, value)
        };

        result.push_str(&part);

        let rest = skip_ws(rest);
        if let Some(stripped) = rest.strip_prefix('#') {
            remaining = stripped;
        } else {
            return Ok((rest, result));
        }
    }
}

/// Parse braced content including nested braces, returning it with braces
fn parse_braced_content(input: &str) -> EResult<'_, &str> {
    debug_assert!(input.starts_with('{'));

    let bytes = input.as_bytes();
    let mut depth = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[pos + 1..], &input[..pos + 1]));
                }
            }
            b'\\' => {
                // Skip escaped character
                pos += 1;
            }
            _ => {}
        }
        pos += 1;
    }

    Err(EntryError::Unbalanced)
}

/// Parse a quoted value, honoring braces and backslash escapes
fn parse_quoted_value(input: &str) -> EResult<'_, String> {
    debug_assert!(input.starts_with('"'));

    let mut result = String::new();
    let mut brace_depth = 0;
    let mut chars = input.char_indices().skip(1);

    while let Some((pos, c)) = chars.next() {
        match c {
            '"' if brace_depth == 0 => {
                return Ok((&input[pos + 1..], result));
            }
            '{' => {
                brace_depth += 1;
                result.push('{');
            }
            '}' => {
                if brace_depth == 0 {
                    return Err(EntryError::Unbalanced);
                }
                brace_depth -= 1;
                result.push('}');
            }
            '\\' => {
                result.push('\\');
                if let Some((_, escaped)) = chars.next() {
                    result.push(escaped);
                }
            }
            c => result.push(c),
        }
    }

    Err(EntryError::Syntax("unterminated quoted value".to_string()))
}
