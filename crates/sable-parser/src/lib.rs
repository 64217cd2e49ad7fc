use la_arena::Arena;
use sable_lexer::{lex, Span, Token};
use sable_syntax::*;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.span.start, self.span.end, self.message)
    }
}

impl std::error::Error for ParseError {}

pub fn parse(source: &str) -> (SourceFile, Vec<ParseError>) {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(tokens);
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|span| ParseError {
            message: "unexpected character".into(),
            span,
        })
        .collect();
    let body = parser.parse_file();
    errors.append(&mut parser.errors);
    let file = SourceFile {
        body,
        exprs: parser.exprs,
        type_exprs: parser.type_exprs,
    };
    (file, errors)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    exprs: Arena<Expr>,
    type_exprs: Arena<TypeExpr>,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Self {
            tokens,
            pos: 0,
            exprs: Arena::new(),
            type_exprs: Arena::new(),
            errors: Vec::new(),
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|(_, s)| Span::new(s.end, s.end))
                    .unwrap_or(Span::new(0, 0))
            })
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(0, 0))
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(tok) => format!("{:?}", tok),
            None => "end of input".into(),
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            self.advance().map(|(_, span)| span)
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected {:?}, found {}", expected, self.found()),
                span,
            );
            None
        }
    }

    fn expect_ident(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Ident(_)) = self.peek() {
            if let Some((Token::Ident(s), span)) = self.advance() {
                return Some((s, span));
            }
        }
        let span = self.peek_span();
        self.error(format!("expected identifier, found {}", self.found()), span);
        None
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(ParseError { message, span });
    }

    fn at_declaration_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Val | Token::Def | Token::External | Token::Type | Token::Union)
        )
    }

    /// Skip tokens until the next declaration keyword, `return`, or an unmatched `}`.
    fn recover_to_declaration(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::RBrace if depth == 0 => return,
                Token::RBrace => depth -= 1,
                Token::Val | Token::Def | Token::External | Token::Type | Token::Union
                | Token::Return
                    if depth == 0 =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ── Allocators ────────────────────────────────────────────────

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.alloc(Expr { kind, span })
    }

    fn alloc_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.type_exprs.alloc(TypeExpr { kind, span })
    }

    /// Placeholder for an expression that failed to parse; an error has already been recorded.
    fn error_expr(&mut self) -> ExprId {
        let span = self.peek_span();
        self.alloc_expr(ExprKind::Null, span)
    }

    // ── Bodies ────────────────────────────────────────────────────

    fn parse_file(&mut self) -> Body {
        let body = self.parse_body();
        if !self.at_end() {
            let span = self.peek_span();
            self.error(
                format!("unexpected {} after return expression", self.found()),
                span,
            );
        }
        body
    }

    /// `declaration* return expr`
    fn parse_body(&mut self) -> Body {
        let start = self.peek_span();
        let mut declarations = Vec::new();
        loop {
            if self.at_declaration_start() {
                match self.parse_declaration() {
                    Some(decl) => declarations.push(decl),
                    None => self.recover_to_declaration(),
                }
            } else if self.eat(&Token::Return) {
                let result = match self.parse_expr() {
                    Some(e) => e,
                    None => self.error_expr(),
                };
                return Body {
                    declarations,
                    result,
                    span: start.merge(self.prev_span()),
                };
            } else {
                let span = self.peek_span();
                self.error(
                    format!("expected declaration or 'return', found {}", self.found()),
                    span,
                );
                if self.at_end() || self.check(&Token::RBrace) {
                    let result = self.error_expr();
                    return Body {
                        declarations,
                        result,
                        span: start.merge(span),
                    };
                }
                self.advance();
                self.recover_to_declaration();
            }
        }
    }

    // ── Declarations ──────────────────────────────────────────────

    fn parse_declaration(&mut self) -> Option<Declaration> {
        let (tok, start) = self.advance()?;
        match tok {
            Token::Val => self.parse_value(start).map(Declaration::Value),
            Token::Def => self.parse_function(start, false).map(Declaration::Function),
            Token::External => {
                self.expect(&Token::Def)?;
                self.parse_function(start, true).map(Declaration::Function)
            }
            Token::Type => self.parse_type_alias(start).map(Declaration::TypeAlias),
            Token::Union => self.parse_union(start).map(Declaration::Union),
            other => {
                self.error(format!("expected declaration, found {:?}", other), start);
                None
            }
        }
    }

    fn parse_value(&mut self, start: Span) -> Option<ValueDecl> {
        let (name, name_span) = self.expect_ident()?;
        let type_ann = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&Token::Assign)?;
        let value = self.parse_expr()?;
        Some(ValueDecl {
            name,
            name_span,
            type_ann,
            value,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_function(&mut self, start: Span, external: bool) -> Option<FunctionDecl> {
        let (name, name_span) = self.expect_ident()?;
        let generics = self.parse_generics()?;
        let params = self.parse_params()?;

        if external {
            // Foreign declarations have no body to infer from.
            self.expect(&Token::Colon)?;
            let return_type = self.parse_type()?;
            return Some(FunctionDecl {
                name,
                name_span,
                generics,
                params,
                return_type: Some(return_type),
                body: None,
                span: start.merge(self.prev_span()),
            });
        }

        let return_type = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.eat(&Token::Assign) {
            let result = self.parse_expr()?;
            Body {
                declarations: Vec::new(),
                result,
                span: self.exprs[result].span,
            }
        } else if self.eat(&Token::LBrace) {
            let body = self.parse_body();
            self.expect(&Token::RBrace)?;
            body
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected '=' or '{{' to start function body, found {}", self.found()),
                span,
            );
            return None;
        };

        Some(FunctionDecl {
            name,
            name_span,
            generics,
            params,
            return_type,
            body: Some(body),
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_type_alias(&mut self, start: Span) -> Option<TypeAliasDecl> {
        let (name, name_span) = self.expect_ident()?;
        let generics = self.parse_generics()?;
        self.expect(&Token::Assign)?;
        let target = self.parse_type()?;
        Some(TypeAliasDecl {
            name,
            name_span,
            generics,
            target,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_union(&mut self, start: Span) -> Option<UnionDecl> {
        let (name, name_span) = self.expect_ident()?;
        let generics = self.parse_generics()?;
        self.expect(&Token::Assign)?;
        let mut alternatives = vec![self.parse_alternative()?];
        while self.eat(&Token::Pipe) {
            alternatives.push(self.parse_alternative()?);
        }
        Some(UnionDecl {
            name,
            name_span,
            generics,
            alternatives,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_alternative(&mut self) -> Option<Alternative> {
        let (tag, tag_span) = self.expect_ident()?;
        self.expect(&Token::Colon)?;
        let payload = self.parse_type()?;
        Some(Alternative {
            tag,
            payload,
            span: tag_span.merge(self.prev_span()),
        })
    }

    /// `[A, B]`, or nothing.
    fn parse_generics(&mut self) -> Option<Vec<Generic>> {
        let mut generics = Vec::new();
        if !self.eat(&Token::LBracket) {
            return Some(generics);
        }
        loop {
            let (name, span) = self.expect_ident()?;
            generics.push(Generic { name, span });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBracket)?;
        Some(generics)
    }

    /// `(a: T, b: U)` or `(...items: T)`
    fn parse_params(&mut self) -> Option<Params> {
        self.expect(&Token::LParen)?;
        if self.eat(&Token::Ellipsis) {
            let param = self.parse_param()?;
            self.expect(&Token::RParen)?;
            return Some(Params::Vararg(param));
        }
        let mut params = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            params.push(self.parse_param()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Some(Params::Basic(params))
    }

    fn parse_param(&mut self) -> Option<Param> {
        let (name, name_span) = self.expect_ident()?;
        self.expect(&Token::Colon)?;
        let type_ann = self.parse_type()?;
        Some(Param {
            name,
            name_span,
            type_ann,
            span: name_span.merge(self.prev_span()),
        })
    }

    // ── Type expressions ──────────────────────────────────────────

    fn parse_type(&mut self) -> Option<TypeExprId> {
        let mut ty = self.parse_type_primary()?;
        while self.eat(&Token::Question) {
            let span = self.type_exprs[ty].span.merge(self.prev_span());
            ty = self.alloc_type(TypeExprKind::Nullable(ty), span);
        }
        Some(ty)
    }

    fn parse_type_primary(&mut self) -> Option<TypeExprId> {
        let start = self.peek_span();
        match self.peek() {
            Some(Token::Ident(_)) => {
                let (name, _) = self.expect_ident()?;
                let mut args = Vec::new();
                if self.eat(&Token::LBracket) {
                    loop {
                        args.push(self.parse_type()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                let span = start.merge(self.prev_span());
                Some(self.alloc_type(TypeExprKind::Named { name, args }, span))
            }
            Some(Token::LBrace) => {
                self.advance();
                let mut fields = Vec::new();
                while !self.at_end() && !self.check(&Token::RBrace) {
                    let (name, _) = self.expect_ident()?;
                    self.expect(&Token::Colon)?;
                    fields.push((name, self.parse_type()?));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                let span = start.merge(self.prev_span());
                Some(self.alloc_type(TypeExprKind::Object(fields), span))
            }
            Some(Token::LBracket) => self.parse_function_type(start),
            Some(Token::LParen) if self.at_function_type_params() => {
                self.parse_function_type(start)
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(&Token::RParen)?;
                Some(inner)
            }
            _ => {
                self.error(format!("expected type, found {}", self.found()), start);
                None
            }
        }
    }

    /// At `(`, decide between a function type's parameter list and a parenthesized type.
    fn at_function_type_params(&self) -> bool {
        match self.peek_nth(1) {
            Some(Token::RParen | Token::Ellipsis) => true,
            Some(Token::Ident(_)) => matches!(self.peek_nth(2), Some(Token::Colon)),
            _ => false,
        }
    }

    fn parse_function_type(&mut self, start: Span) -> Option<TypeExprId> {
        let generics = self.parse_generics()?;
        let params = self.parse_params()?;
        self.expect(&Token::Arrow)?;
        let return_type = self.parse_type()?;
        let span = start.merge(self.prev_span());
        Some(self.alloc_type(
            TypeExprKind::Function {
                generics,
                params,
                return_type,
            },
            span,
        ))
    }

    // ── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self) -> Option<ExprId> {
        self.parse_or()
    }

    fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        let span = self.exprs[lhs].span.merge(self.exprs[rhs].span);
        self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, span)
    }

    fn parse_or(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_comparison(&mut self) -> Option<ExprId> {
        let lhs = self.parse_tagged()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::EqEq) => BinaryOp::Eq,
            _ => return Some(lhs),
        };
        self.advance();
        let rhs = self.parse_tagged()?;
        Some(self.binary(op, lhs, rhs))
    }

    /// `value # Tag` and `value is Tag`, left-associative.
    fn parse_tagged(&mut self) -> Option<ExprId> {
        let mut value = self.parse_additive()?;
        loop {
            let is_tag = match self.peek() {
                Some(Token::Hash) => true,
                Some(Token::Is) => false,
                _ => return Some(value),
            };
            self.advance();
            let (tag, tag_span) = self.expect_ident()?;
            let span = self.exprs[value].span.merge(tag_span);
            let kind = if is_tag {
                ExprKind::Tag { value, tag }
            } else {
                ExprKind::Is { value, tag }
            };
            value = self.alloc_expr(kind, span);
        }
    }

    fn parse_additive(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::SlashSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Option<ExprId> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let operand = self.parse_unary()?;
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand,
                }
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand,
                }
            }
            Some(Token::Untag) => {
                self.advance();
                ExprKind::Untag(self.parse_unary()?)
            }
            _ => return self.parse_postfix(),
        };
        let span = start.merge(self.prev_span());
        Some(self.alloc_expr(kind, span))
    }

    fn parse_postfix(&mut self) -> Option<ExprId> {
        let mut expr = self.parse_primary()?;
        loop {
            let start = self.exprs[expr].span;
            if self.eat(&Token::Dot) {
                let (field, _) = self.expect_ident()?;
                let span = start.merge(self.prev_span());
                expr = self.alloc_expr(ExprKind::Field { object: expr, field }, span);
            } else if self.check(&Token::LParen) || self.check(&Token::LBracket) {
                let mut type_args = Vec::new();
                if self.eat(&Token::LBracket) {
                    loop {
                        type_args.push(self.parse_type()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                let args = self.parse_args()?;
                let span = start.merge(self.prev_span());
                expr = self.alloc_expr(
                    ExprKind::Call {
                        callee: expr,
                        type_args,
                        args,
                    },
                    span,
                );
            } else {
                return Some(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Option<Vec<ExprId>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<ExprId> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                ExprKind::Number(n)
            }
            Some(Token::BigInteger(digits)) => {
                let digits = digits.clone();
                self.advance();
                ExprKind::BigInteger(digits)
            }
            Some(Token::True) => {
                self.advance();
                ExprKind::Bool(true)
            }
            Some(Token::False) => {
                self.advance();
                ExprKind::Bool(false)
            }
            Some(Token::Null) => {
                self.advance();
                ExprKind::Null
            }
            Some(Token::Ident(_)) => {
                let (name, _) = self.expect_ident()?;
                ExprKind::Var(name)
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Some(inner);
            }
            Some(Token::LBrace) => {
                self.advance();
                ExprKind::Object(self.parse_field_inits()?)
            }
            Some(Token::If) => {
                self.advance();
                let condition = self.parse_expr()?;
                self.expect(&Token::Then)?;
                let then_branch = self.parse_expr()?;
                self.expect(&Token::Else)?;
                let else_branch = self.parse_expr()?;
                ExprKind::If {
                    condition,
                    then_branch,
                    else_branch,
                }
            }
            Some(Token::Fn) => {
                self.advance();
                let generics = self.parse_generics()?;
                let params = self.parse_params()?;
                let return_type = if self.eat(&Token::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.expect(&Token::FatArrow)?;
                let body = self.parse_expr()?;
                ExprKind::Lambda {
                    generics,
                    params,
                    return_type,
                    body,
                }
            }
            Some(Token::Match) => {
                self.advance();
                let scrutinee = self.parse_expr()?;
                self.expect(&Token::LBrace)?;
                let mut arms = Vec::new();
                while !self.at_end() && !self.check(&Token::RBrace) {
                    arms.push(self.parse_match_arm()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                ExprKind::Match { scrutinee, arms }
            }
            _ => {
                self.error(format!("expected expression, found {}", self.found()), start);
                return None;
            }
        };
        let span = start.merge(self.prev_span());
        Some(self.alloc_expr(kind, span))
    }

    /// Fields of an object literal, after the opening `{`.
    fn parse_field_inits(&mut self) -> Option<Vec<FieldInit>> {
        let mut fields = Vec::new();
        while !self.at_end() && !self.check(&Token::RBrace) {
            let (name, name_span) = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_expr()?;
            fields.push(FieldInit {
                name,
                value,
                span: name_span.merge(self.prev_span()),
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Some(fields)
    }

    fn parse_match_arm(&mut self) -> Option<MatchArm> {
        let (tag, tag_span) = self.expect_ident()?;
        let (binding, binding_span) = self.expect_ident()?;
        self.expect(&Token::FatArrow)?;
        let body = self.parse_expr()?;
        Some(MatchArm {
            tag,
            tag_span,
            binding,
            binding_span,
            body,
            span: tag_span.merge(self.prev_span()),
        })
    }
}
