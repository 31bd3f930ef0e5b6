use logos::Logos;

/// The TPTP lexical grammar.
///
/// Word-ish tokens carry their text; quoted forms are unescaped. Comments
/// (`% ...` lines and `/* ... */` blocks) and whitespace are skipped.
#[derive(Logos, Clone, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"%[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    #[regex(r"[a-z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    LowerWord(String),

    #[regex(r"[A-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    UpperWord(String),

    /// 'single quoted', unescaped.
    #[regex(r"'([^'\\]|\\.)+'", |lex| unquote(lex.slice()))]
    SingleQuoted(String),

    /// "double quoted" distinct objects, unescaped.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    DoubleQuoted(String),

    #[regex(r"[+-]?[0-9]+", |lex| lex.slice().to_string())]
    Integer(String),

    /// n/d with d > 0; a zero denominator is a lexical error.
    #[regex(r"[+-]?[0-9]+/[0-9]+", |lex| {
        let text = lex.slice();
        let denominator = &text[text.find('/').unwrap() + 1..];
        if denominator.chars().all(|c| c == '0') {
            None
        } else {
            Some(text.to_string())
        }
    })]
    Rational(String),

    #[regex(r"[+-]?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[+-]?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Real(String),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    DollarWord(String),

    #[regex(r"\$\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    DollarDollarWord(String),

    // Connectives, longest spellings first so shorter ones cannot shadow
    // them. Logos resolves overlaps by match length, so the order here is
    // for the reader.
    #[token("<=>")]
    Iff,
    #[token("<~>")]
    Xor,
    #[token("=>")]
    Implies,
    #[token("<=")]
    If,
    #[token("~|")]
    Nor,
    #[token("~&")]
    Nand,
    #[token("|")]
    Or,
    #[token("&")]
    And,
    #[token("~")]
    Not,
    #[token("!=")]
    NotEquals,
    #[token("=")]
    Equals,
    #[token("!>")]
    TypeForall,
    #[token("?*")]
    TypeExists,
    #[token("@@+")]
    DoubleChoice,
    #[token("@@-")]
    DoubleDescription,
    #[token("@@=")]
    DefinedEquals,
    #[token("@+")]
    Choice,
    #[token("@-")]
    Description,
    #[token("!")]
    Forall,
    #[token("?")]
    Exists,
    #[token("^")]
    Lambda,
    #[token(">")]
    Arrow,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("@")]
    At,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(":")]
    Colon,
    #[token(":=")]
    Assign,
}

/// Strips the outer quotes and resolves the two escapes TPTP allows.
fn unquote(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A token with the byte range it came from, for error reporting.
pub type SpannedToken = (Token, std::ops::Range<usize>);

/// Tokenizes a whole input, or reports the byte offset of the first bad
/// character.
pub fn tokenize(text: &str) -> Result<Vec<SpannedToken>, usize> {
    let mut tokens = vec![];
    let mut lexer = Token::lexer(text);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

/// Converts a byte offset into a 1-indexed (line, column) pair.
pub fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in text.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
