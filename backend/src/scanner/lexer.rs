//! Minimal JavaScript lexer used to remove comments.
//!
//! It tracks just enough state to tell a comment from a `//` or `/*` inside a
//! string, template literal or regular expression literal. Everything that is
//! not a comment is copied through unchanged. A block comment becomes a single
//! space plus the newlines it spanned, so tokens never fuse and line numbers
//! are preserved.
//!
//! [`blank_literals`] additionally replaces the text of string and template
//! literals with spaces, keeping quotes, interpolated code and quoted property
//! keys, for checks that must only see code.

/// Words after which a `/` starts a regex literal rather than a division.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

#[derive(Debug, Clone, PartialEq)]
enum Prev {
    Start,
    /// A literal, or an identifier that is not a keyword.
    Value,
    Keyword,
    Punct(char),
}

impl Prev {
    fn regex_allowed(&self) -> bool {
        match self {
            Prev::Start | Prev::Keyword => true,
            Prev::Value => false,
            Prev::Punct(c) => !matches!(c, ')' | ']' | '}'),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    out: String,
    prev: Prev,
    braces: usize,
    /// Brace depth at which each open `${` interpolation resumes its template.
    templates: Vec<usize>,
    blank: bool,
}

impl Lexer {
    fn new(source: &str, blank: bool) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            out: String::with_capacity(source.len()),
            prev: Prev::Start,
            braces: 0,
            templates: Vec::new(),
            blank,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn emit(&mut self) {
        if let Some(c) = self.peek(0) {
            self.out.push(c);
            self.pos += 1;
        }
    }

    fn run(mut self) -> String {
        while let Some(c) = self.peek(0) {
            match c {
                '/' if self.peek(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek(1) == Some('*') => self.skip_block_comment(),
                '/' if self.prev.regex_allowed() => self.copy_regex(),
                '"' | '\'' => self.copy_string(c),
                '`' => {
                    self.emit();
                    self.copy_template_body();
                }
                '{' => {
                    self.braces += 1;
                    self.prev = Prev::Punct(c);
                    self.emit();
                }
                '}' => {
                    if self.templates.last() == Some(&self.braces) {
                        self.templates.pop();
                        self.braces = self.braces.saturating_sub(1);
                        self.emit();
                        self.copy_template_body();
                    } else {
                        self.braces = self.braces.saturating_sub(1);
                        self.prev = Prev::Punct(c);
                        self.emit();
                    }
                }
                c if c.is_whitespace() => self.emit(),
                c if is_ident_char(c) => self.copy_word(),
                _ => {
                    self.prev = Prev::Punct(c);
                    self.emit();
                }
            }
        }
        self.out
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        self.out.push(' ');
        while let Some(c) = self.peek(0) {
            if c == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                return;
            }
            if c == '\n' {
                self.out.push('\n');
            }
            self.pos += 1;
        }
    }

    fn copy_word(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(is_ident_char) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        self.out.push_str(&word);
        self.prev = if REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()) {
            Prev::Keyword
        } else {
            Prev::Value
        };
    }

    fn copy_string(&mut self, quote: char) {
        self.emit();
        let body_start = self.out.len();
        let mut closed = false;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    self.emit();
                    self.emit();
                }
                '\n' => break,
                c if c == quote => {
                    closed = true;
                    break;
                }
                _ => self.emit(),
            }
        }
        if self.blank && !self.is_property_key(body_start) {
            self.blank_from(body_start);
        }
        if closed {
            self.emit();
        }
        self.prev = Prev::Value;
    }

    /// Copy template text up to the closing backtick or the next `${`.
    fn copy_template_body(&mut self) {
        let body_start = self.out.len();
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    self.emit();
                    self.emit();
                }
                '`' => {
                    self.blank_template_text(body_start);
                    self.emit();
                    self.prev = Prev::Value;
                    return;
                }
                '$' if self.peek(1) == Some('{') => {
                    self.blank_template_text(body_start);
                    self.emit();
                    self.emit();
                    self.braces += 1;
                    self.templates.push(self.braces);
                    self.prev = Prev::Punct('{');
                    return;
                }
                _ => self.emit(),
            }
        }
        self.blank_template_text(body_start);
    }

    fn blank_template_text(&mut self, start: usize) {
        if self.blank {
            self.blank_from(start);
        }
    }

    /// Overwrite output from `start` with spaces, keeping newlines.
    fn blank_from(&mut self, start: usize) {
        let blanked: String = self.out[start..]
            .chars()
            .map(|c| if c == '\n' { '\n' } else { ' ' })
            .collect();
        self.out.truncate(start);
        self.out.push_str(&blanked);
    }

    /// A quoted identifier followed by `:` names an object property.
    fn is_property_key(&self, body_start: usize) -> bool {
        let body = &self.out[body_start..];
        if body.is_empty() || !body.chars().all(is_ident_char) {
            return false;
        }
        let mut i = self.pos + 1;
        while self.chars.get(i).is_some_and(|c| c.is_whitespace()) {
            i += 1;
        }
        self.chars.get(i) == Some(&':')
    }

    fn copy_regex(&mut self) {
        self.emit();
        let mut in_class = false;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    self.emit();
                    self.emit();
                }
                '\n' => break,
                '[' => {
                    in_class = true;
                    self.emit();
                }
                ']' => {
                    in_class = false;
                    self.emit();
                }
                '/' if !in_class => {
                    self.emit();
                    while self.peek(0).is_some_and(is_ident_char) {
                        self.emit();
                    }
                    break;
                }
                _ => self.emit(),
            }
        }
        self.prev = Prev::Value;
    }
}

/// Remove `//` and `/* */` comments from JavaScript source.
pub fn strip_comments(source: &str) -> String {
    Lexer::new(source, false).run()
}

/// Remove comments and blank out the text of string and template literals.
pub fn blank_literals(source: &str) -> String {
    Lexer::new(source, true).run()
}
