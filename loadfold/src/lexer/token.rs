//! Token definitions

use logos::Logos;

/// Decode the body of a string literal, resolving escapes.
fn unescape(lex: &mut logos::Lexer<Token>) -> Option<Vec<u8>> {
    let slice = lex.slice();
    let body = &slice[1..slice.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.bytes();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next()? {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'0' => out.push(0),
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'x' => {
                let high = (bytes.next()? as char).to_digit(16)?;
                let low = (bytes.next()? as char).to_digit(16)?;
                out.push((high * 16 + low) as u8);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Surface syntax token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // Keywords
    #[token("function")]
    Function,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("leave")]
    Leave,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"0x[0-9a-fA-F]+", |lex| lex.slice().to_string(), priority = 3)]
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Number(String),
    #[regex(r#""([^"\\\n]|\\.)*""#, unescape)]
    StringLit(Vec<u8>),

    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$.]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Punctuation
    #[token(":=")]
    Assign,
    #[token("->")]
    Arrow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Function => write!(f, "function"),
            Token::Let => write!(f, "let"),
            Token::If => write!(f, "if"),
            Token::Switch => write!(f, "switch"),
            Token::Case => write!(f, "case"),
            Token::Default => write!(f, "default"),
            Token::For => write!(f, "for"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Leave => write!(f, "leave"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Number(text) => write!(f, "{text}"),
            Token::StringLit(_) => write!(f, "string literal"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Assign => write!(f, ":="),
            Token::Arrow => write!(f, "->"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
        }
    }
}
