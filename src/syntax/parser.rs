use serde::{Deserialize, Serialize};
use std::fmt;

use crate::status::Status;
use crate::syntax::tokenizer::{line_column, tokenize, SpannedToken, Token};

/// The input dialects. They share one expression grammar here; the richest
/// (THF) subsumes the others.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Language {
    Thf,
    Tff,
    Fof,
    Tcf,
    Cnf,
    Tpi,
}

impl Language {
    pub fn from_keyword(word: &str) -> Option<Language> {
        match word {
            "thf" => Some(Language::Thf),
            "tff" => Some(Language::Tff),
            "fof" => Some(Language::Fof),
            "tcf" => Some(Language::Tcf),
            "cnf" => Some(Language::Cnf),
            "tpi" => Some(Language::Tpi),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let keyword = match self {
            Language::Thf => "thf",
            Language::Tff => "tff",
            Language::Fof => "fof",
            Language::Tcf => "tcf",
            Language::Cnf => "cnf",
            Language::Tpi => "tpi",
        };
        write!(f, "{}", keyword)
    }
}

/// The role a statement plays in a problem.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Axiom,
    Hypothesis,
    Definition,
    Assumption,
    Lemma,
    Theorem,
    Corollary,
    Conjecture,
    NegatedConjecture,
    Plain,
    Type,
    FiDomain,
    FiFunctors,
    FiPredicates,
    Unknown,
}

impl Role {
    pub fn parse(word: &str) -> Role {
        match word {
            "axiom" => Role::Axiom,
            "hypothesis" => Role::Hypothesis,
            "definition" => Role::Definition,
            "assumption" => Role::Assumption,
            "lemma" => Role::Lemma,
            "theorem" => Role::Theorem,
            "corollary" => Role::Corollary,
            "conjecture" => Role::Conjecture,
            "negated_conjecture" => Role::NegatedConjecture,
            "plain" => Role::Plain,
            "type" => Role::Type,
            "fi_domain" => Role::FiDomain,
            "fi_functors" => Role::FiFunctors,
            "fi_predicates" => Role::FiPredicates,
            _ => Role::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Quantifier {
    Forall,
    Exists,
    Lambda,
    TypeForall,
    TypeExists,
    Choice,
    Description,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BinaryConn {
    Or,
    And,
    Implies,
    If,
    Iff,
    Xor,
    Nor,
    Nand,
    Equals,
    NotEquals,
    Arrow,
    Star,
    Plus,
}

/// One generic TPTP expression tree; formulas, terms and types all land
/// here and the encoder sorts them out.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A lower word or single-quoted name.
    Atom(String),

    /// An upper-word variable.
    Var(String),

    /// A `$`-word.
    Defined(String),

    /// A `$$`-word.
    System(String),

    /// A double-quoted distinct object.
    DistinctObject(String),

    Integer(String),
    Rational(String),
    Real(String),

    /// Functional application `f(a, b)` and folded `@` chains.
    App(Box<Expr>, Vec<Expr>),

    /// Negation.
    Not(Box<Expr>),

    Binary(BinaryConn, Box<Expr>, Box<Expr>),

    /// A quantifier block with its typed variable list.
    Quantified(Quantifier, Vec<(String, Option<Expr>)>, Box<Expr>),

    /// `name : type`.
    Typed(Box<Expr>, Box<Expr>),

    /// `[...]` and `{...}` lists, kept raw.
    Tuple(Vec<Expr>),
}

/// The optional `(source, [info...])` tail of an annotated statement,
/// kept as raw trees.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub source: Expr,
    pub info: Vec<Expr>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFormula {
    pub language: Language,
    pub name: String,
    pub role: Role,
    pub formula: Expr,
    pub annotations: Option<Annotations>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `include('file', [names]).` An empty name list means everything.
    Include { file: String, names: Vec<String> },
    Annotated(AnnotatedFormula),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Atom(name) => write!(f, "{}", name),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Defined(word) => write!(f, "{}", word),
            Expr::System(word) => write!(f, "{}", word),
            Expr::DistinctObject(text) => write!(f, "\"{}\"", text),
            Expr::Integer(text) | Expr::Rational(text) | Expr::Real(text) => {
                write!(f, "{}", text)
            }
            Expr::App(head, args) => {
                write!(f, "{}(", head)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Not(inner) => write!(f, "~({})", inner),
            Expr::Binary(conn, left, right) => {
                let symbol = match conn {
                    BinaryConn::Or => "|",
                    BinaryConn::And => "&",
                    BinaryConn::Implies => "=>",
                    BinaryConn::If => "<=",
                    BinaryConn::Iff => "<=>",
                    BinaryConn::Xor => "<~>",
                    BinaryConn::Nor => "~|",
                    BinaryConn::Nand => "~&",
                    BinaryConn::Equals => "=",
                    BinaryConn::NotEquals => "!=",
                    BinaryConn::Arrow => ">",
                    BinaryConn::Star => "*",
                    BinaryConn::Plus => "+",
                };
                write!(f, "({} {} {})", left, symbol, right)
            }
            Expr::Quantified(quantifier, variables, body) => {
                let symbol = match quantifier {
                    Quantifier::Forall => "!",
                    Quantifier::Exists => "?",
                    Quantifier::Lambda => "^",
                    Quantifier::TypeForall => "!>",
                    Quantifier::TypeExists => "?*",
                    Quantifier::Choice => "@+",
                    Quantifier::Description => "@-",
                };
                write!(f, "{}[", symbol)?;
                for (i, (name, ty)) in variables.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match ty {
                        Some(ty) => write!(f, "{}: {}", name, ty)?,
                        None => write!(f, "{}", name)?,
                    }
                }
                write!(f, "]: {}", body)
            }
            Expr::Typed(name, ty) => write!(f, "{}: {}", name, ty),
            Expr::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::Include { file, names } => {
                if names.is_empty() {
                    write!(f, "include('{}').", file)
                } else {
                    write!(f, "include('{}', [{}]).", file, names.join(", "))
                }
            }
            Statement::Annotated(formula) => {
                write!(
                    f,
                    "{}({}, {:?}, {}).",
                    formula.language, formula.name, formula.role, formula.formula
                )
            }
        }
    }
}

/// A syntax error with its 1-indexed position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn status(&self) -> Status {
        Status::SyntaxError
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl From<ParseError> for String {
    fn from(error: ParseError) -> Self {
        error.to_string()
    }
}

/// Parses a whole TPTP problem into its ordered statements.
pub fn parse_problem(text: &str) -> Result<Vec<Statement>, ParseError> {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(offset) => {
            let (line, column) = line_column(text, offset);
            return Err(ParseError {
                line,
                column,
                message: "unrecognized character".to_string(),
            });
        }
    };
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    let mut statements = vec![];
    while !parser.at_end() {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, message: &str) -> Result<T, ParseError> {
        let offset = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, span)| span.start)
            .unwrap_or(self.text.len());
        let (line, column) = line_column(self.text, offset);
        Err(ParseError {
            line,
            column,
            message: message.to_string(),
        })
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => self.error(&format!("expected {}", what)),
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let keyword = match self.advance() {
            Some(Token::LowerWord(word)) => word,
            _ => return self.error("expected a statement keyword"),
        };
        if keyword == "include" {
            return self.include_directive();
        }
        let Some(language) = Language::from_keyword(&keyword) else {
            return self.error(&format!("unknown statement keyword '{}'", keyword));
        };
        self.expect(Token::LParen, "'('")?;
        let name = self.name()?;
        self.expect(Token::Comma, "','")?;
        let role = match self.advance() {
            Some(Token::LowerWord(word)) => Role::parse(&word),
            _ => return self.error("expected a role"),
        };
        self.expect(Token::Comma, "','")?;
        let formula = self.expr()?;
        let annotations = if self.eat(&Token::Comma) {
            let source = self.expr()?;
            let info = if self.eat(&Token::Comma) {
                match self.expr()? {
                    Expr::Tuple(exprs) => exprs,
                    other => vec![other],
                }
            } else {
                vec![]
            };
            Some(Annotations { source, info })
        } else {
            None
        };
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::Period, "'.'")?;
        Ok(Statement::Annotated(AnnotatedFormula {
            language,
            name,
            role,
            formula,
            annotations,
        }))
    }

    fn include_directive(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let file = match self.advance() {
            Some(Token::SingleQuoted(file)) => file,
            _ => return self.error("expected a quoted file name"),
        };
        let mut names = vec![];
        if self.eat(&Token::Comma) {
            self.expect(Token::LBracket, "'['")?;
            if !self.eat(&Token::RBracket) {
                loop {
                    names.push(self.name()?);
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                    self.expect(Token::Comma, "','")?;
                }
            }
        }
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::Period, "'.'")?;
        Ok(Statement::Include { file, names })
    }

    /// A statement or include-list name: lower word, quoted, or numeric.
    fn name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::LowerWord(word)) => Ok(word),
            Some(Token::SingleQuoted(word)) => Ok(word),
            Some(Token::Integer(word)) => Ok(word),
            _ => self.error("expected a name"),
        }
    }

    /// Expressions, loosest binding first: `name : type` sits outermost,
    /// then the non-associative binary pairs, then the connective and type
    /// operators down to `@` application.
    fn expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.pair_expr()?;
        if self.eat(&Token::Colon) {
            let right = self.expr()?;
            return Ok(Expr::Typed(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn pair_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.or_expr()?;
        let conn = match self.peek() {
            Some(Token::Iff) => BinaryConn::Iff,
            Some(Token::Xor) => BinaryConn::Xor,
            Some(Token::Implies) => BinaryConn::Implies,
            Some(Token::If) => BinaryConn::If,
            Some(Token::Nor) => BinaryConn::Nor,
            Some(Token::Nand) => BinaryConn::Nand,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.or_expr()?;
        Ok(Expr::Binary(conn, Box::new(left), Box::new(right)))
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            expr = Expr::Binary(BinaryConn::Or, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.equality_expr()?;
            expr = Expr::Binary(BinaryConn::And, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn equality_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.arrow_expr()?;
        let conn = match self.peek() {
            Some(Token::Equals) | Some(Token::DefinedEquals) => BinaryConn::Equals,
            Some(Token::NotEquals) => BinaryConn::NotEquals,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.arrow_expr()?;
        Ok(Expr::Binary(conn, Box::new(left), Box::new(right)))
    }

    fn arrow_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.times_expr()?;
        if self.eat(&Token::Arrow) {
            // Right associative, as mapping types are.
            let right = self.arrow_expr()?;
            return Ok(Expr::Binary(BinaryConn::Arrow, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn times_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.app_expr()?;
        loop {
            let conn = match self.peek() {
                Some(Token::Star) => BinaryConn::Star,
                Some(Token::Plus) => BinaryConn::Plus,
                _ => return Ok(expr),
            };
            self.pos += 1;
            let right = self.app_expr()?;
            expr = Expr::Binary(conn, Box::new(expr), Box::new(right));
        }
    }

    fn app_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unitary_expr()?;
        while self.eat(&Token::At) {
            let arg = self.unitary_expr()?;
            expr = match expr {
                Expr::App(head, mut args) => {
                    args.push(arg);
                    Expr::App(head, args)
                }
                head => Expr::App(Box::new(head), vec![arg]),
            };
        }
        Ok(expr)
    }

    fn unitary_expr(&mut self) -> Result<Expr, ParseError> {
        let quantifier = match self.peek() {
            Some(Token::Forall) => Some(Quantifier::Forall),
            Some(Token::Exists) => Some(Quantifier::Exists),
            Some(Token::Lambda) => Some(Quantifier::Lambda),
            Some(Token::TypeForall) => Some(Quantifier::TypeForall),
            Some(Token::TypeExists) => Some(Quantifier::TypeExists),
            Some(Token::Choice) => Some(Quantifier::Choice),
            Some(Token::Description) => Some(Quantifier::Description),
            _ => None,
        };
        if let Some(quantifier) = quantifier {
            self.pos += 1;
            let variables = self.variable_list()?;
            self.expect(Token::Colon, "':'")?;
            // The body extends through an application chain, so
            // `^[X]: q @ X` means what it looks like; connectives still
            // need parentheses.
            let body = self.app_expr()?;
            return Ok(Expr::Quantified(quantifier, variables, Box::new(body)));
        }

        match self.advance() {
            Some(Token::Not) => {
                let inner = self.unitary_expr()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.tuple_items(Token::RBracket)?;
                Ok(Expr::Tuple(items))
            }
            Some(Token::LBrace) => {
                let items = self.tuple_items(Token::RBrace)?;
                Ok(Expr::Tuple(items))
            }
            Some(Token::LowerWord(word)) => self.maybe_args(Expr::Atom(word)),
            Some(Token::SingleQuoted(word)) => self.maybe_args(Expr::Atom(word)),
            Some(Token::UpperWord(word)) => Ok(Expr::Var(word)),
            Some(Token::DollarWord(word)) => self.maybe_args(Expr::Defined(word)),
            Some(Token::DollarDollarWord(word)) => self.maybe_args(Expr::System(word)),
            Some(Token::DoubleQuoted(word)) => Ok(Expr::DistinctObject(word)),
            Some(Token::Integer(word)) => Ok(Expr::Integer(word)),
            Some(Token::Rational(word)) => Ok(Expr::Rational(word)),
            Some(Token::Real(word)) => Ok(Expr::Real(word)),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                self.error("expected a formula")
            }
        }
    }

    /// Functional-notation arguments, if the head is directly applied.
    fn maybe_args(&mut self, head: Expr) -> Result<Expr, ParseError> {
        if !self.eat(&Token::LParen) {
            return Ok(head);
        }
        let mut args = vec![self.expr()?];
        while self.eat(&Token::Comma) {
            args.push(self.expr()?);
        }
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::App(Box::new(head), args))
    }

    fn tuple_items(&mut self, close: Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = vec![];
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma, "','")?;
        }
    }

    /// `[X, Y: type, ...]` variable lists of quantifier blocks.
    fn variable_list(&mut self) -> Result<Vec<(String, Option<Expr>)>, ParseError> {
        self.expect(Token::LBracket, "'['")?;
        let mut variables = vec![];
        loop {
            let name = match self.advance() {
                Some(Token::UpperWord(name)) => name,
                _ => return self.error("expected a variable"),
            };
            let ty = if self.eat(&Token::Colon) {
                Some(self.arrow_expr()?)
            } else {
                None
            };
            variables.push((name, ty));
            if self.eat(&Token::RBracket) {
                return Ok(variables);
            }
            self.expect(Token::Comma, "','")?;
        }
    }
}
