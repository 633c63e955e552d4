//! Recursive Descent Parser
//!
//! Consumes the token stream and produces pooled AST nodes. Expressions use
//! precedence climbing; statements are dispatched on the leading keyword.
//!
//! Grammar (precedence low to high):
//!   statement   ::= assignment | if | foreach | continue | break | return | funcdef | expr
//!   assignment  ::= postfix ('=' | '+=' | '-=' | '*=' | '/=' | '%=') expr
//!   expr        ::= ternary
//!   ternary     ::= or_expr ('?' expr ':' expr)?
//!   or_expr     ::= and_expr ('or' and_expr)*
//!   and_expr    ::= cmp_expr ('and' cmp_expr)*
//!   cmp_expr    ::= add_expr (('=='|'!='|'<'|'<='|'>'|'>='|'in'|'not' 'in') add_expr)*
//!   add_expr    ::= mul_expr (('+'|'-') mul_expr)*
//!   mul_expr    ::= unary (('*'|'/'|'%') unary)*
//!   unary       ::= ('not'|'-') unary | postfix
//!   postfix     ::= atom ('(' args ')' | '[' expr ']' | '.' ident)*

use crate::ast::types::{
    ArgsNode, AssignOp, AstPool, BinOp, NodeId, NodeKind, ParamDecl, ParsedFile, UnaryOp,
};
use crate::diagnostics::Span;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::types::{ParseError, MAX_PARSER_DEPTH};

/// Language surface selected for a parse. The `func` definition statement is
/// only part of the extended surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Standard,
    Extended,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pool: AstPool,
    depth: usize,
    mode: ParseMode,
    /// Nesting counters for continue/break/return placement checks.
    loop_depth: usize,
    func_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, mode: ParseMode) -> Self {
        Self {
            tokens,
            pos: 0,
            pool: AstPool::new(),
            depth: 0,
            mode,
            loop_depth: 0,
            func_depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<ParsedFile, ParseError> {
        let body = self.parse_block(&[TokenKind::Eof])?;
        Ok(ParsedFile { pool: self.pool, body })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected '{}'", kind.as_str())))
        }
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(
            format!("{}, got '{}'", expected, token.kind.as_str()),
            token.span,
        )
    }

    fn enter(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            return Err(ParseError::new("expression nesting too deep", span));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- statements ----

    /// Parse statements until one of `terminators` is reached. The
    /// terminator token is not consumed.
    fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Vec<NodeId>, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if terminators.contains(&self.peek_kind()) {
                return Ok(body);
            }
            if self.peek_kind() == TokenKind::Eof {
                return Err(self.unexpected("unexpected end of file"));
            }
            body.push(self.parse_statement()?);
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                }
                k if terminators.contains(&k) => {}
                TokenKind::Eof => {}
                _ => return Err(self.unexpected("expected end of line")),
            }
        }
    }

    fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        match self.peek_kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Func => self.parse_funcdef(),
            TokenKind::Continue => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(ParseError::new("continue outside of a loop", span));
                }
                Ok(self.pool.push(NodeKind::Continue, span))
            }
            TokenKind::Break => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(ParseError::new("break outside of a loop", span));
                }
                Ok(self.pool.push(NodeKind::Break, span))
            }
            TokenKind::Return => {
                self.advance();
                if self.func_depth == 0 {
                    return Err(ParseError::new("return outside of a function", span));
                }
                let value = if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Ok(self.pool.push(NodeKind::Return(value), span))
            }
            _ => self.parse_assignment_or_expr(),
        }
    }

    fn parse_assignment_or_expr(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let lhs = self.parse_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            TokenKind::PercentAssign => AssignOp::Mod,
            _ => return Ok(lhs),
        };
        let op_span = self.advance().span;
        match &self.pool.get(lhs).kind {
            NodeKind::Identifier(_) | NodeKind::Member { .. } => {}
            _ => {
                return Err(ParseError::new(
                    "assignment target must be an identifier",
                    op_span,
                ));
            }
        }
        let value = self.parse_expr()?;
        Ok(self.pool.push(NodeKind::Assign { target: lhs, op, value }, span))
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let span = self.expect(TokenKind::If)?.span;
        let mut clauses = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::Elif, TokenKind::Else, TokenKind::Endif])?;
        clauses.push((cond, body));
        let mut else_body = None;
        loop {
            match self.peek_kind() {
                TokenKind::Elif => {
                    self.advance();
                    let cond = self.parse_expr()?;
                    let body =
                        self.parse_block(&[TokenKind::Elif, TokenKind::Else, TokenKind::Endif])?;
                    clauses.push((cond, body));
                }
                TokenKind::Else => {
                    self.advance();
                    else_body = Some(self.parse_block(&[TokenKind::Endif])?);
                    self.expect(TokenKind::Endif)?;
                    break;
                }
                TokenKind::Endif => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("expected 'elif', 'else' or 'endif'")),
            }
        }
        Ok(self.pool.push(NodeKind::If { clauses, else_body }, span))
    }

    fn parse_foreach(&mut self) -> Result<NodeId, ParseError> {
        let span = self.expect(TokenKind::Foreach)?.span;
        let first = self.expect(TokenKind::Identifier)?;
        let mut vars = vec![first.value];
        if self.accept(TokenKind::Comma) {
            let second = self.expect(TokenKind::Identifier)?;
            vars.push(second.value);
        }
        self.expect(TokenKind::Colon)?;
        let iterable = self.parse_expr()?;
        self.loop_depth += 1;
        let body = self.parse_block(&[TokenKind::Endforeach]);
        self.loop_depth -= 1;
        let body = body?;
        self.expect(TokenKind::Endforeach)?;
        Ok(self.pool.push(NodeKind::Foreach { vars, iterable, body }, span))
    }

    fn parse_funcdef(&mut self) -> Result<NodeId, ParseError> {
        let span = self.expect(TokenKind::Func)?.span;
        if self.mode != ParseMode::Extended {
            return Err(ParseError::new(
                "function definitions require the extended language surface",
                span,
            ));
        }
        let name = self.expect(TokenKind::Identifier)?.value;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        loop {
            if self.peek_kind() == TokenKind::RParen {
                break;
            }
            let p = self.expect(TokenKind::Identifier)?;
            let type_name = if self.peek_kind() == TokenKind::Identifier {
                Some(self.advance().value)
            } else {
                None
            };
            let default = if self.accept(TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(ParamDecl { name: p.value, type_name, default, span: p.span });
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = if self.accept(TokenKind::Arrow) {
            Some(self.expect(TokenKind::Identifier)?.value)
        } else {
            None
        };
        self.func_depth += 1;
        let saved_loop_depth = std::mem::take(&mut self.loop_depth);
        let body = self.parse_block(&[TokenKind::Endfunc]);
        self.loop_depth = saved_loop_depth;
        self.func_depth -= 1;
        let body = body?;
        self.expect(TokenKind::Endfunc)?;
        Ok(self.pool.push(NodeKind::FuncDef { name, params, return_type, body }, span))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        self.enter(span)?;
        let result = self.parse_ternary();
        self.leave();
        result
    }

    fn parse_ternary(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let cond = self.parse_or()?;
        if !self.accept(TokenKind::Question) {
            return Ok(cond);
        }
        let if_true = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        // Right-associative: the false arm may itself be a ternary.
        let if_false = self.parse_expr()?;
        Ok(self.pool.push(NodeKind::Ternary { cond, if_true, if_false }, span))
    }

    fn parse_or(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let mut lhs = self.parse_and()?;
        while self.accept(TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = self.pool.push(NodeKind::Binary { op: BinOp::Or, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let mut lhs = self.parse_comparison()?;
        while self.accept(TokenKind::And) {
            let rhs = self.parse_comparison()?;
            lhs = self.pool.push(NodeKind::Binary { op: BinOp::And, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::In => BinOp::In,
                TokenKind::Not => {
                    // 'not in' is the only postfix use of 'not'.
                    self.advance();
                    self.expect(TokenKind::In)?;
                    let rhs = self.parse_additive()?;
                    lhs = self.pool.push(NodeKind::Binary { op: BinOp::NotIn, lhs, rhs }, span);
                    continue;
                }
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = self.pool.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
    }

    fn parse_additive(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = self.pool.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = self.pool.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let span = self.peek().span;
        match self.peek_kind() {
            TokenKind::Not => {
                self.advance();
                let rhs = self.parse_unary()?;
                Ok(self.pool.push(NodeKind::Unary { op: UnaryOp::Not, rhs }, span))
            }
            TokenKind::Minus => {
                self.advance();
                let rhs = self.parse_unary()?;
                Ok(self.pool.push(NodeKind::Unary { op: UnaryOp::Neg, rhs }, span))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            let span = self.peek().span;
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RParen)?;
                    match self.pool.get(expr).kind.clone() {
                        NodeKind::Member { receiver, name } => {
                            expr = self
                                .pool
                                .push(NodeKind::MethodCall { receiver, name, args }, span);
                        }
                        _ => {
                            expr = self.pool.push(NodeKind::Call { callee: expr, args }, span);
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = self.pool.push(NodeKind::Index { receiver: expr, index }, span);
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect(TokenKind::Identifier)?.value;
                    expr = self.pool.push(NodeKind::Member { receiver: expr, name }, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<ArgsNode, ParseError> {
        let mut args = ArgsNode::default();
        loop {
            if self.peek_kind() == TokenKind::RParen {
                return Ok(args);
            }
            // A kwarg is an identifier immediately followed by ':'.
            if self.peek_kind() == TokenKind::Identifier
                && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::Colon)
            {
                let key = self.advance();
                self.advance(); // ':'
                let value = self.parse_expr()?;
                args.kwargs.push((key.value, key.span, value));
            } else {
                if !args.kwargs.is_empty() {
                    return Err(self
                        .unexpected("positional arguments must precede keyword arguments"));
                }
                args.pos.push(self.parse_expr()?);
            }
            if !self.accept(TokenKind::Comma) {
                return Ok(args);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<NodeId, ParseError> {
        let token = self.advance();
        let span = token.span;
        match token.kind {
            TokenKind::True => Ok(self.pool.push(NodeKind::Bool(true), span)),
            TokenKind::False => Ok(self.pool.push(NodeKind::Bool(false), span)),
            TokenKind::Number => Ok(self.pool.push(NodeKind::Number(token.number), span)),
            TokenKind::Str => Ok(self.pool.push(NodeKind::Str(token.value), span)),
            TokenKind::FStr => Ok(self.pool.push(NodeKind::FStr(token.value), span)),
            TokenKind::Identifier => Ok(self.pool.push(NodeKind::Identifier(token.value), span)),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                loop {
                    if self.peek_kind() == TokenKind::RBracket {
                        break;
                    }
                    items.push(self.parse_expr()?);
                    if !self.accept(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(self.pool.push(NodeKind::Array(items), span))
            }
            TokenKind::LBrace => {
                let mut pairs = Vec::new();
                loop {
                    if self.peek_kind() == TokenKind::RBrace {
                        break;
                    }
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    pairs.push((key, value));
                    if !self.accept(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(self.pool.push(NodeKind::Dict(pairs), span))
            }
            _ => Err(ParseError::new(
                format!("expected an expression, got '{}'", token.kind.as_str()),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceId;
    use crate::parser::lexer::Lexer;

    fn parse(input: &str) -> ParsedFile {
        let tokens = Lexer::new(input, SourceId(0)).tokenize().unwrap();
        Parser::new(tokens, ParseMode::Standard).parse().unwrap()
    }

    fn parse_err(input: &str) -> ParseError {
        let tokens = Lexer::new(input, SourceId(0)).tokenize().unwrap();
        Parser::new(tokens, ParseMode::Standard).parse().unwrap_err()
    }

    #[test]
    fn test_call_statement() {
        let file = parse("project('hello', 'c')");
        assert_eq!(file.body.len(), 1);
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Call { args, .. } => assert_eq!(args.pos.len(), 2),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment() {
        let file = parse("x = 1 + 2 * 3");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Assign { op: AssignOp::Assign, value, .. } => {
                // Multiplication binds tighter than addition.
                match &file.pool.get(*value).kind {
                    NodeKind::Binary { op: BinOp::Add, .. } => {}
                    other => panic!("expected add at top, got {:?}", other),
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_kwargs_after_positional() {
        let file = parse("executable('t', 'm.c', install: true)");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Call { args, .. } => {
                assert_eq!(args.pos.len(), 2);
                assert_eq!(args.kwargs.len(), 1);
                assert_eq!(args.kwargs[0].0, "install");
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_positional_after_kwarg_rejected() {
        let err = parse_err("f(a: 1, 2)");
        assert!(err.message.contains("positional"));
    }

    #[test]
    fn test_if_elif_else() {
        let file = parse("if a\nx = 1\nelif b\nx = 2\nelse\nx = 3\nendif");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::If { clauses, else_body } => {
                assert_eq!(clauses.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_foreach_two_vars() {
        let file = parse("foreach k, v : d\nx = k\nendforeach");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Foreach { vars, .. } => assert_eq!(vars.len(), 2),
            other => panic!("expected foreach, got {:?}", other),
        }
    }

    #[test]
    fn test_break_outside_loop_rejected() {
        let err = parse_err("break");
        assert!(err.message.contains("loop"));
    }

    #[test]
    fn test_method_chain() {
        let file = parse("x = 'a b'.split(' ')[0]");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Assign { value, .. } => match &file.pool.get(*value).kind {
                NodeKind::Index { receiver, .. } => {
                    assert!(matches!(
                        file.pool.get(*receiver).kind,
                        NodeKind::MethodCall { .. }
                    ));
                }
                other => panic!("expected index, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary_right_assoc() {
        let file = parse("x = a ? b : c ? d : e");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Assign { value, .. } => match &file.pool.get(*value).kind {
                NodeKind::Ternary { if_false, .. } => {
                    assert!(matches!(file.pool.get(*if_false).kind, NodeKind::Ternary { .. }));
                }
                other => panic!("expected ternary, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in() {
        let file = parse("x = 'a' not in ['b']");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Assign { value, .. } => {
                assert!(matches!(
                    file.pool.get(*value).kind,
                    NodeKind::Binary { op: BinOp::NotIn, .. }
                ));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_dict_literal() {
        let file = parse("d = {'a': 1, 'b': 2}");
        match &file.pool.get(file.body[0]).kind {
            NodeKind::Assign { value, .. } => match &file.pool.get(*value).kind {
                NodeKind::Dict(pairs) => assert_eq!(pairs.len(), 2),
                other => panic!("expected dict, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_func_requires_extended() {
        let err = parse_err("func f()\nendfunc");
        assert!(err.message.contains("extended"));
    }

    #[test]
    fn test_func_extended() {
        let tokens =
            Lexer::new("func add(a int, b int) -> int\nreturn a + b\nendfunc", SourceId(0))
                .tokenize()
                .unwrap();
        let file = Parser::new(tokens, ParseMode::Extended).parse().unwrap();
        match &file.pool.get(file.body[0]).kind {
            NodeKind::FuncDef { name, params, return_type, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params.len(), 2);
                assert_eq!(return_type.as_deref(), Some("int"));
            }
            other => panic!("expected funcdef, got {:?}", other),
        }
    }

    #[test]
    fn test_first_error_ends_parse() {
        let err = parse_err("x = = 1");
        assert!(err.message.contains("expected an expression"));
    }
}
