use crate::ast::Payload;
use crate::error::{ConvertError, Result};
use crate::kind::ContentRule;
use winnow::prelude::*;
use winnow::token::{rest, take_till, take_while};

/// Stands in for an escaped backslash while the other escapes are decoded.
const BACKSLASH_SENTINEL: char = '\u{1}';
const STRUCTURE_CONTENT_LEN: usize = 7;

/// One undecoded dump line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub level: usize,
    pub kind: &'a str,
    pub content: &'a str,
}

impl RawRecord<'_> {
    /// Whether the raw content holds a `\n` escape, which bumps the line
    /// counter for every node after this one.
    pub fn has_newline_escape(&self) -> bool {
        self.content.contains("\\n")
    }
}

fn record<'a>(input: &mut &'a str) -> ModalResult<RawRecord<'a>> {
    (
        take_while(0.., char::is_whitespace),
        take_till(1.., char::is_whitespace),
        take_while(0.., char::is_whitespace),
        rest,
    )
        .map(|(indent, kind, _, content): (&'a str, &'a str, &'a str, &'a str)| RawRecord {
            level: indent.chars().count() / 2,
            kind,
            content,
        })
        .parse_next(input)
}

/// Splits `<indent><kind> <content>`; `None` when the line has no kind.
pub fn parse_record(line: &str) -> Option<RawRecord<'_>> {
    record.parse(line.trim_end()).ok()
}

/// Decodes raw record content by the node kind's rule. `id` only labels
/// the error.
pub fn decode_content(rule: ContentRule, raw: &str, id: usize) -> Result<Payload> {
    let payload = match rule {
        ContentRule::None => Payload::Empty,
        ContentRule::Delimiters => {
            let chars: Vec<char> = raw.chars().collect();
            if chars.len() != STRUCTURE_CONTENT_LEN {
                return Err(ConvertError::StructureContent {
                    id,
                    content: raw.to_string(),
                });
            }
            Payload::Delimiters {
                start: chars[0],
                end: chars[STRUCTURE_CONTENT_LEN - 1],
            }
        }
        ContentRule::Whitespace => Payload::Text {
            content: unescape_layout(strip_quotes(raw)),
        },
        ContentRule::Comment => Payload::Text {
            content: decode_comment(raw),
        },
        ContentRule::Quoted => Payload::Text {
            content: strip_quotes(raw).to_string(),
        },
    };
    Ok(payload)
}

fn strip_quotes(raw: &str) -> &str {
    let mut chars = raw.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn unescape_layout(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t")
}

// `\\` must be shielded first, otherwise `\\n` would lose its backslash
// to the newline escape.
fn decode_comment(raw: &str) -> String {
    let shielded = raw.replace("\\\\", &BACKSLASH_SENTINEL.to_string());
    unescape_layout(strip_quotes(&shielded)).replace(BACKSLASH_SENTINEL, "\\")
}
