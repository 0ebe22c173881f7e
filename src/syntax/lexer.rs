//! Token scanner for C# source
//!
//! Produces just enough token structure for the declaration parser: identifiers, literals and
//! punctuation with their spans. Whitespace, comments and preprocessor directives are dropped.

use super::{Span, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// Any string literal form (regular, verbatim, interpolated, raw)
    Str,
    Char,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

const MULTI_CHAR_PUNCT: [&str; 7] = ["=>", "==", "!=", "<=", ">=", "::", "??"];

/// Split C# source into tokens
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Only whitespace seen since the last newline
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(c) = self.peek_char() {
            let start = self.pos;

            if c == '\n' {
                self.pos += 1;
                self.at_line_start = true;
                continue;
            }
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if c == '#' && self.at_line_start {
                self.skip_line();
                continue;
            }

            self.at_line_start = false;

            if self.starts_with("//") {
                self.skip_line();
            } else if self.starts_with("/*") {
                self.skip_block_comment(start)?;
            } else if let Some(prefix_len) = self.string_prefix() {
                self.scan_string(start, prefix_len)?;
            } else if c == '\'' {
                self.scan_char(start)?;
            } else if c.is_ascii_digit() {
                self.scan_number(start);
            } else if c == '@' || c == '_' || c.is_alphabetic() {
                self.scan_ident(start);
            } else {
                self.scan_punct(start, c);
            }
        }

        Ok(self.tokens)
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.pos..].starts_with(s)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
        });
    }

    fn skip_line(&mut self) {
        match self.source[self.pos..].find('\n') {
            Some(offset) => self.pos += offset,
            None => self.pos = self.source.len(),
        }
    }

    fn skip_block_comment(&mut self, start: usize) -> Result<(), SyntaxError> {
        match self.source[self.pos + 2..].find("*/") {
            Some(offset) => {
                self.pos += 2 + offset + 2;
                Ok(())
            }
            None => Err(SyntaxError::UnterminatedComment { offset: start }),
        }
    }

    /// Length of a string literal prefix (`"`, `@"`, `$"`, `$@"`, `@$"`, `$$"""`...) at `pos`
    fn string_prefix(&self) -> Option<usize> {
        let rest = &self.bytes[self.pos..];
        let markers = rest.iter().take_while(|b| matches!(b, b'@' | b'$')).count();
        if rest.get(markers) == Some(&b'"') && rest[..markers].iter().filter(|b| **b == b'@').count() <= 1 {
            Some(markers)
        } else {
            None
        }
    }

    fn scan_string(&mut self, start: usize, prefix_len: usize) -> Result<(), SyntaxError> {
        let prefix = &self.bytes[self.pos..self.pos + prefix_len];
        let verbatim = prefix.contains(&b'@');
        let interpolated = prefix.contains(&b'$');
        self.pos += prefix_len;

        let quotes = self.bytes[self.pos..].iter().take_while(|b| **b == b'"').count();
        if quotes >= 3 {
            return self.scan_raw_string(start, quotes);
        }

        // opening quote
        self.pos += 1;
        let mut brace_depth = 0usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\\' if !verbatim => self.pos += 2,
                b'"' if verbatim && self.bytes.get(self.pos + 1) == Some(&b'"') => self.pos += 2,
                b'"' if brace_depth == 0 => {
                    self.pos += 1;
                    self.push(TokenKind::Str, start);
                    return Ok(());
                }
                b'{' if interpolated => {
                    if self.bytes.get(self.pos + 1) == Some(&b'{') && brace_depth == 0 {
                        self.pos += 2;
                    } else {
                        brace_depth += 1;
                        self.pos += 1;
                    }
                }
                b'}' if interpolated && brace_depth > 0 => {
                    brace_depth -= 1;
                    self.pos += 1;
                }
                b'\n' if !verbatim && brace_depth == 0 => break,
                _ => self.pos += 1,
            }
        }

        Err(SyntaxError::UnterminatedLiteral { offset: start })
    }

    fn scan_raw_string(&mut self, start: usize, quotes: usize) -> Result<(), SyntaxError> {
        let fence = "\"".repeat(quotes);
        self.pos += quotes;
        match self.source[self.pos..].find(&fence) {
            Some(offset) => {
                self.pos += offset;
                // a closing run may be longer than the fence; the extra quotes belong to the content
                let run = self.bytes[self.pos..].iter().take_while(|b| **b == b'"').count();
                self.pos += run;
                self.push(TokenKind::Str, start);
                Ok(())
            }
            None => Err(SyntaxError::UnterminatedLiteral { offset: start }),
        }
    }

    fn scan_char(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.pos += 1;
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.pos += 1;
                    if let Some(escaped) = self.peek_char() {
                        self.pos += escaped.len_utf8();
                    }
                }
                '\'' => {
                    self.pos += 1;
                    self.push(TokenKind::Char, start);
                    return Ok(());
                }
                '\n' => break,
                other => self.pos += other.len_utf8(),
            }
        }
        Err(SyntaxError::UnterminatedLiteral { offset: start })
    }

    fn scan_number(&mut self, start: usize) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            let decimal_point = b == b'.'
                && self
                    .bytes
                    .get(self.pos + 1)
                    .is_some_and(|next| next.is_ascii_digit());
            if b.is_ascii_alphanumeric() || b == b'_' || decimal_point {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start);
    }

    fn scan_ident(&mut self, start: usize) {
        if self.bytes[self.pos] == b'@' {
            self.pos += 1;
        }
        while let Some(c) = self.peek_char() {
            if c == '_' || c.is_alphanumeric() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident, start);
    }

    fn scan_punct(&mut self, start: usize, c: char) {
        let len = MULTI_CHAR_PUNCT
            .iter()
            .find(|p| self.starts_with(p))
            .map(|p| p.len())
            .unwrap_or(c.len_utf8());
        self.pos += len;
        self.push(TokenKind::Punct, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.text(source))
            .collect()
    }

    #[test]
    fn test_identifiers_numbers_and_punctuation() {
        assert_eq!(
            texts("[Migration(202401011530)] class @X : Migration { }"),
            vec!["[", "Migration", "(", "202401011530", ")", "]", "class", "@X", ":", "Migration", "{", "}"]
        );
    }

    #[test]
    fn test_comments_and_preprocessor_lines_are_skipped() {
        let source = "#region Setup\n// class Hidden : Migration {}\n/* { */ class A {}\n  #endregion";
        assert_eq!(texts(source), vec!["class", "A", "{", "}"]);
    }

    #[test]
    fn test_string_forms_are_single_tokens() {
        let source = r#"a("x{y}\"", @"c:\""path""", $"{b}}}", $@"{c}", 'x', '\'', """raw " text""")"#;
        let tokens = tokenize(source).unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Punct,
                TokenKind::Str,
                TokenKind::Punct,
                TokenKind::Str,
                TokenKind::Punct,
                TokenKind::Str,
                TokenKind::Punct,
                TokenKind::Str,
                TokenKind::Punct,
                TokenKind::Char,
                TokenKind::Punct,
                TokenKind::Char,
                TokenKind::Punct,
                TokenKind::Str,
                TokenKind::Punct,
            ]
        );
        assert_eq!(tokens[14].text(source), r#""""raw " text""""#);
    }

    #[test]
    fn test_combined_operators() {
        assert_eq!(texts("a => b == c"), vec!["a", "=>", "b", "==", "c"]);
        assert_eq!(texts("List<List<int>>"), vec!["List", "<", "List", "<", "int", ">", ">"]);
        assert_eq!(texts("global::System"), vec!["global", "::", "System"]);
    }

    #[test]
    fn test_numbers_with_suffixes_and_decimals() {
        assert_eq!(texts("1.5f 0x1F 202401011530L"), vec!["1.5f", "0x1F", "202401011530L"]);
    }

    #[test]
    fn test_unterminated_input() {
        assert_eq!(
            tokenize("class A /* open"),
            Err(SyntaxError::UnterminatedComment { offset: 8 })
        );
        assert_eq!(
            tokenize("var s = \"open\nclass A {}"),
            Err(SyntaxError::UnterminatedLiteral { offset: 8 })
        );
    }
}
