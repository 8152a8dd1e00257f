use crate::error::{TqlError, TqlErrorKind};
use crate::field_tree::FieldTree;
use crate::util::Code;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    String_,
    LBrak,
    RBrak,
    LParen,
    RParen,
    LCurly,
    RCurly,
    Plus,
    Star,
    DoubleGt,
    Gt,
    DoubleBar,
    Bar,
    Dollar,
    DoubleColon,
    Colon,
    Comma,
    DoubleAmpersand,
    Ampersand,
    At,
    Dot,
    Hash,
    DoubleTilde,
    ExmarkTilde,
    Tilde,
    Qmark,
    DoubleEq,
    ExmarkEq,
    Exmark,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) enum TokenValue {
    None,
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
}

impl Token {
    pub fn name(&self) -> &str {
        match &self.value {
            TokenValue::Str(s) => s.as_str(),
            _ => unreachable!("name() called on non-name/string token"),
        }
    }
    pub fn int(&self) -> i64 {
        match &self.value {
            TokenValue::Int(n) => *n,
            _ => unreachable!("int() called on non-number token"),
        }
    }
}

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]*").unwrap());
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());
static STRING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'([^']|\\.)*'").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t\n]+").unwrap());

static PUNCTUATIONS: Lazy<FieldTree<TokenKind>> = Lazy::new(|| {
    let mut tree = FieldTree::new();
    for (text, kind) in [
        ("[", TokenKind::LBrak),
        ("]", TokenKind::RBrak),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("{", TokenKind::LCurly),
        ("}", TokenKind::RCurly),
        ("+", TokenKind::Plus),
        ("*", TokenKind::Star),
        (">>", TokenKind::DoubleGt),
        (">", TokenKind::Gt),
        ("||", TokenKind::DoubleBar),
        ("|", TokenKind::Bar),
        ("$", TokenKind::Dollar),
        ("::", TokenKind::DoubleColon),
        (":", TokenKind::Colon),
        (",", TokenKind::Comma),
        ("&&", TokenKind::DoubleAmpersand),
        ("&", TokenKind::Ampersand),
        ("@", TokenKind::At),
        (".", TokenKind::Dot),
        ("#", TokenKind::Hash),
        ("~~", TokenKind::DoubleTilde),
        ("!~", TokenKind::ExmarkTilde),
        ("~", TokenKind::Tilde),
        ("?", TokenKind::Qmark),
        ("==", TokenKind::DoubleEq),
        ("!=", TokenKind::ExmarkEq),
        ("!", TokenKind::Exmark),
    ] {
        tree.insert(text.as_bytes(), kind).unwrap();
    }
    tree
});

/// Decode the escape sequences recognised inside a TQL string literal: the single
/// character escapes, `\NNN` octal, `\xHH`, `\uHHHH` and `\UHHHHHHHH`. Any other
/// `\c` is kept as the literal two characters `\c`.
pub fn decode_string(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let c = chars[i + 1];
        match c {
            '\\' => {
                out.push('\\');
                i += 2;
            }
            '\'' => {
                out.push('\'');
                i += 2;
            }
            '"' => {
                out.push('"');
                i += 2;
            }
            'a' => {
                out.push('\u{07}');
                i += 2;
            }
            'b' => {
                out.push('\u{08}');
                i += 2;
            }
            'f' => {
                out.push('\u{0C}');
                i += 2;
            }
            'n' => {
                out.push('\n');
                i += 2;
            }
            'r' => {
                out.push('\r');
                i += 2;
            }
            't' => {
                out.push('\t');
                i += 2;
            }
            'v' => {
                out.push('\u{0B}');
                i += 2;
            }
            'x' => {
                if let Some(code) = read_hex(&chars, i + 2, 2) {
                    out.push(code.1);
                    i = code.0;
                } else {
                    out.push('\\');
                    out.push(c);
                    i += 2;
                }
            }
            'u' => {
                if let Some(code) = read_hex(&chars, i + 2, 4) {
                    out.push(code.1);
                    i = code.0;
                } else {
                    out.push('\\');
                    out.push(c);
                    i += 2;
                }
            }
            'U' => {
                if let Some(code) = read_hex(&chars, i + 2, 8) {
                    out.push(code.1);
                    i = code.0;
                } else {
                    out.push('\\');
                    out.push(c);
                    i += 2;
                }
            }
            '0'..='7' => {
                let mut j = i + 1;
                let mut value = 0u32;
                let mut count = 0;
                while j < chars.len() && count < 3 && ('0'..='7').contains(&chars[j]) {
                    value = value * 8 + chars[j].to_digit(8).unwrap();
                    j += 1;
                    count += 1;
                }
                out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
                i = j;
            }
            _ => {
                out.push('\\');
                out.push(c);
                i += 2;
            }
        }
    }
    out
}

fn read_hex(chars: &[char], start: usize, digits: usize) -> Option<(usize, char)> {
    if start + digits > chars.len() {
        return None;
    }
    let slice: String = chars[start..start + digits].iter().collect();
    if !slice.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(&slice, 16).ok()?;
    char::from_u32(value).map(|c| (start + digits, c))
}

pub(crate) struct Lexer;

impl Lexer {
    /// Scan `code` into a token stream, appending a synthetic [TokenKind::Eof] token.
    pub fn tokenize(code: &Code) -> Result<Vec<Token>, TqlError> {
        let mut tokens = Vec::new();
        let mut pos = 0usize;
        let len = code.value.len();

        while pos < len {
            let rest = &code.value[pos..];

            if let Some(m) = SPACE_RE.find(rest) {
                pos += m.end();
                continue;
            }
            if let Some((kind, consumed)) = PUNCTUATIONS.find(rest) {
                if consumed > 0 {
                    tokens.push(Token {
                        kind,
                        start: pos,
                        end: pos + consumed,
                        value: TokenValue::None,
                    });
                    pos += consumed;
                    continue;
                }
            }
            if let Some(m) = STRING_RE.find(rest) {
                let raw = std::str::from_utf8(&rest[1..m.end() - 1]).unwrap_or("");
                tokens.push(Token {
                    kind: TokenKind::String_,
                    start: pos,
                    end: pos + m.end(),
                    value: TokenValue::Str(decode_string(raw)),
                });
                pos += m.end();
                continue;
            }
            if let Some(m) = NUMBER_RE.find(rest) {
                let raw = std::str::from_utf8(&rest[..m.end()]).unwrap_or("0");
                tokens.push(Token {
                    kind: TokenKind::Number,
                    start: pos,
                    end: pos + m.end(),
                    value: TokenValue::Int(raw.parse().unwrap_or(0)),
                });
                pos += m.end();
                continue;
            }
            if let Some(m) = NAME_RE.find(rest) {
                let raw = std::str::from_utf8(&rest[..m.end()]).unwrap_or("").to_string();
                tokens.push(Token {
                    kind: TokenKind::Name,
                    start: pos,
                    end: pos + m.end(),
                    value: TokenValue::Str(raw),
                });
                pos += m.end();
                continue;
            }

            let bad = rest.first().copied().unwrap_or(0) as char;
            return Err(TqlError::at(
                TqlErrorKind::IllegalCharacter,
                code,
                pos,
                format!("Illegal character {:?}", bad),
            ));
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            start: len,
            end: len,
            value: TokenValue::None,
        });
        Ok(tokens)
    }
}
