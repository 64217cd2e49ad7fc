use logos::Logos;
use smol_str::SmolStr;

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift both ends left by `offset`, clamping at zero.
    pub fn rebase(self, offset: u32) -> Span {
        Span {
            start: self.start.saturating_sub(offset),
            end: self.end.saturating_sub(offset),
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
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
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("#")]
    Hash,
    #[token("?")]
    Question,
    #[token("|")]
    Pipe,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,

    #[token("val")]
    Val,
    #[token("def")]
    Def,
    #[token("external")]
    External,
    #[token("type")]
    Type,
    #[token("union")]
    Union,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("fn")]
    Fn,
    #[token("match")]
    Match,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("is")]
    Is,
    #[token("untag")]
    Untag,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[0-9]+(\.[0-9]+)?", priority = 2, callback = |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Arbitrary-precision integer literal: `123n`. The digits are kept verbatim.
    #[regex(r"[0-9]+n", priority = 3, callback = |lex| {
        let slice = lex.slice();
        SmolStr::new(&slice[..slice.len() - 1])
    })]
    BigInteger(SmolStr),

    /// Identifiers name values, types, type variables and tags alike.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", priority = 1, callback = |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),
}

/// Lex source code into a list of (token, span) pairs.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<Span>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => errors.push(span),
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            lex_tokens("( ) [ ] { } , :"),
            vec![
                Token::LParen,
                Token::RParen,
                Token::LBracket,
                Token::RBracket,
                Token::LBrace,
                Token::RBrace,
                Token::Comma,
                Token::Colon,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex_tokens("42"), vec![Token::Number(42.0)]);
        assert_eq!(lex_tokens("0"), vec![Token::Number(0.0)]);
        assert_eq!(lex_tokens("3.25"), vec![Token::Number(3.25)]);
    }

    #[test]
    fn test_big_integers() {
        assert_eq!(
            lex_tokens("123456789012345678901234567890n"),
            vec![Token::BigInteger("123456789012345678901234567890".into())]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex_tokens("val def external type union return"),
            vec![
                Token::Val,
                Token::Def,
                Token::External,
                Token::Type,
                Token::Union,
                Token::Return,
            ]
        );
        assert_eq!(
            lex_tokens("if then else fn match is untag"),
            vec![
                Token::If,
                Token::Then,
                Token::Else,
                Token::Fn,
                Token::Match,
                Token::Is,
                Token::Untag,
            ]
        );
    }

    #[test]
    fn test_keyword_prefixed_identifiers() {
        assert_eq!(
            lex_tokens("value define iffy"),
            vec![
                Token::Ident("value".into()),
                Token::Ident("define".into()),
                Token::Ident("iffy".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex_tokens("+ - * / // % < > == = => -> # ? | ..."),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::SlashSlash,
                Token::Percent,
                Token::Lt,
                Token::Gt,
                Token::EqEq,
                Token::Assign,
                Token::FatArrow,
                Token::Arrow,
                Token::Hash,
                Token::Question,
                Token::Pipe,
                Token::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex_tokens("; this is a comment\n42"),
            vec![Token::Number(42.0)]
        );
    }

    #[test]
    fn test_tag_expression() {
        assert_eq!(
            lex_tokens("5 # Tag1"),
            vec![
                Token::Number(5.0),
                Token::Hash,
                Token::Ident("Tag1".into()),
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let (_, errors) = lex("val x = 1 @ 2");
        assert_eq!(errors, vec![Span::new(10, 11)]);
    }

    #[test]
    fn test_spans() {
        let (tokens, _) = lex("f(1, x)");
        assert_eq!(tokens[0], (Token::Ident("f".into()), Span::new(0, 1)));
        assert_eq!(tokens[1], (Token::LParen, Span::new(1, 2)));
        assert_eq!(tokens[2], (Token::Number(1.0), Span::new(2, 3)));
        assert_eq!(tokens[3], (Token::Comma, Span::new(3, 4)));
        assert_eq!(tokens[4], (Token::Ident("x".into()), Span::new(5, 6)));
        assert_eq!(tokens[5], (Token::RParen, Span::new(6, 7)));
    }
}
