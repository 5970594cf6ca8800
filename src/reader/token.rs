// src/reader/token.rs
//! Token stream for the textual IR format, lexed with logos.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[token("graph")]
    Graph,
    #[token("entity")]
    Entity,
    #[token("size")]
    Size,
    #[token("align")]
    Align,
    #[token("default")]
    Default,
    #[token("keep")]
    Keep,
    #[token("labeled")]
    Labeled,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    /// `@name`: a graph or entity reference.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_.]*")]
    AtName,
    /// Integer or float literal; sign included.
    #[regex(r"-?[0-9]+(\.[0-9]+)?")]
    Number,
    /// Value names, block labels, opcodes and modes.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

/// A token with its source slice and 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
}

/// Tokenizes the whole input. Returns the tokens, or the 1-based line of
/// the first unrecognized character.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, usize> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let line = source[..span.start].bytes().filter(|&b| b == b'\n').count() + 1;
        match result {
            Ok(kind) => tokens.push(Token { kind, text: lexer.slice(), line }),
            Err(()) => return Err(line),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_statement() {
        let tokens = tokenize("t2 = add i32 t0, t1 # sum\n").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Equals,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident
            ]
        );
        assert_eq!(tokens[2].text, "add");
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("graph @m {\n  b0:\n}\n").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens.last().unwrap().line, 3);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(tokenize("t0 = $konst"), Err(1));
    }
}
