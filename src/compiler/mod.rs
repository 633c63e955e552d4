//! Bytecode Compiler
//!
//! Linearizes the AST into a flat instruction stream plus constant and name
//! tables. One program exists per evaluated source file; function bodies
//! compile into their own programs referenced from the constant table.
//!
//! Compound assignment is rewritten as a plain rebind of `lhs op rhs`, and
//! f-strings lower to a `.format()` call on the template with each `@var@`
//! replaced by a positional placeholder.

pub mod bytecode;

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::types::{
    ArgsNode, AssignOp, AstPool, BinOp, NodeId, NodeKind, ParamDecl, UnaryOp,
};
use crate::compiler::bytecode::{Const, FuncProto, Instr, ParamProto, Program, NO_VAR};
use crate::diagnostics::{ErrorKind, InterpError, InterpResult, SourceId, Span};

struct LoopCtx {
    iter_ip: u32,
    breaks: Vec<usize>,
}

pub struct Compiler<'a> {
    pool: &'a AstPool,
    prog: Program,
    name_idx: HashMap<String, u32>,
    loops: Vec<LoopCtx>,
    in_function: bool,
}

/// Compile a parsed file into a runnable program.
pub fn compile(pool: &AstPool, body: &[NodeId], source: SourceId) -> InterpResult<Program> {
    let mut c = Compiler::new(pool, source);
    for &stmt in body {
        c.compile_statement(stmt)?;
    }
    let end_span = body.last().map(|&n| pool.get(n).span).unwrap_or_default();
    c.emit(Instr::Halt, end_span);
    Ok(c.prog)
}

impl<'a> Compiler<'a> {
    fn new(pool: &'a AstPool, source: SourceId) -> Self {
        Self {
            pool,
            prog: Program::new(source),
            name_idx: HashMap::new(),
            loops: Vec::new(),
            in_function: false,
        }
    }

    fn emit(&mut self, instr: Instr, span: Span) -> usize {
        self.prog.instrs.push(instr);
        self.prog.spans.push(span);
        self.prog.instrs.len() - 1
    }

    fn patch(&mut self, at: usize, instr: Instr) {
        self.prog.instrs[at] = instr;
    }

    fn here(&self) -> u32 {
        self.prog.instrs.len() as u32
    }

    fn name(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.name_idx.get(s) {
            return idx;
        }
        let idx = self.prog.names.len() as u32;
        self.prog.names.push(s.to_string());
        self.name_idx.insert(s.to_string(), idx);
        idx
    }

    fn constant(&mut self, c: Const) -> u32 {
        self.prog.consts.push(c);
        (self.prog.consts.len() - 1) as u32
    }

    fn emit_const(&mut self, c: Const, span: Span) {
        let idx = self.constant(c);
        self.emit(Instr::Const(idx), span);
    }

    // ---- statements ----

    fn compile_statement(&mut self, node: NodeId) -> InterpResult<()> {
        let span = self.pool.get(node).span;
        match &self.pool.get(node).kind {
            NodeKind::Assign { target, op, value } => {
                self.compile_assign(*target, *op, *value, span)
            }
            NodeKind::If { clauses, else_body } => self.compile_if(clauses, else_body, span),
            NodeKind::Foreach { vars, iterable, body } => {
                self.compile_foreach(vars, *iterable, body, span)
            }
            NodeKind::Continue => {
                let ctx = self.loops.last().expect("parser rejects stray continue");
                let target = ctx.iter_ip;
                self.emit(Instr::Jump(target), span);
                Ok(())
            }
            NodeKind::Break => {
                let at = self.emit(Instr::Jump(0), span);
                self.loops.last_mut().expect("parser rejects stray break").breaks.push(at);
                Ok(())
            }
            NodeKind::Return(value) => {
                match value {
                    Some(v) => self.compile_expr(*v)?,
                    None => self.emit_const(Const::Null, span),
                }
                self.emit(Instr::Ret, span);
                Ok(())
            }
            NodeKind::FuncDef { name, params, return_type, body } => {
                let proto = self.compile_function(name, params, return_type.clone(), body, span)?;
                self.emit_const(Const::Func(Rc::new(proto)), span);
                let idx = self.name(&name.clone());
                self.emit(Instr::StoreLocal(idx), span);
                Ok(())
            }
            _ => {
                self.compile_expr(node)?;
                self.emit(Instr::Pop, span);
                Ok(())
            }
        }
    }

    fn compile_assign(
        &mut self,
        target: NodeId,
        op: AssignOp,
        value: NodeId,
        span: Span,
    ) -> InterpResult<()> {
        match self.pool.get(target).kind.clone() {
            NodeKind::Identifier(name) => {
                if op != AssignOp::Assign {
                    // Compound assignment always rebinds.
                    let idx = self.name(&name);
                    self.emit(Instr::Load(idx), self.pool.get(target).span);
                    self.compile_expr(value)?;
                    self.emit(binop_instr(assign_binop(op)), span);
                } else {
                    self.compile_expr(value)?;
                }
                let idx = self.name(&name);
                self.emit(Instr::StoreLocal(idx), span);
                Ok(())
            }
            NodeKind::Member { receiver, name } => {
                if op != AssignOp::Assign {
                    return Err(InterpError::new(
                        ErrorKind::Parse,
                        "compound assignment is not allowed on members",
                    )
                    .at(span));
                }
                self.compile_expr(receiver)?;
                self.compile_expr(value)?;
                let idx = self.name(&name);
                self.emit(Instr::StoreMember(idx), span);
                Ok(())
            }
            _ => Err(InterpError::new(ErrorKind::Parse, "invalid assignment target").at(span)),
        }
    }

    fn compile_if(
        &mut self,
        clauses: &[(NodeId, Vec<NodeId>)],
        else_body: &Option<Vec<NodeId>>,
        span: Span,
    ) -> InterpResult<()> {
        let mut end_jumps = Vec::new();
        for (cond, body) in clauses {
            self.compile_expr(*cond)?;
            let skip = self.emit(Instr::JumpIfFalse(0), span);
            for &stmt in body {
                self.compile_statement(stmt)?;
            }
            end_jumps.push(self.emit(Instr::Jump(0), span));
            let here = self.here();
            self.patch(skip, Instr::JumpIfFalse(here));
        }
        if let Some(body) = else_body {
            for &stmt in body {
                self.compile_statement(stmt)?;
            }
        }
        let here = self.here();
        for at in end_jumps {
            self.patch(at, Instr::Jump(here));
        }
        Ok(())
    }

    fn compile_foreach(
        &mut self,
        vars: &[String],
        iterable: NodeId,
        body: &[NodeId],
        span: Span,
    ) -> InterpResult<()> {
        self.compile_expr(iterable)?;
        let var = self.name(&vars[0]);
        let var2 = if vars.len() > 1 { self.name(&vars[1]) } else { NO_VAR };
        self.emit(Instr::ForPrep { var, var2 }, span);
        let iter_ip = self.here();
        let iter_at = self.emit(Instr::ForIter { exit: 0 }, span);
        self.loops.push(LoopCtx { iter_ip, breaks: Vec::new() });
        let mut result = Ok(());
        for &stmt in body {
            result = self.compile_statement(stmt);
            if result.is_err() {
                break;
            }
        }
        let ctx = self.loops.pop().expect("loop context pushed above");
        result?;
        self.emit(Instr::Jump(iter_ip), span);
        let end = self.here();
        self.patch(iter_at, Instr::ForIter { exit: end });
        for at in ctx.breaks {
            self.patch(at, Instr::Jump(end));
        }
        self.emit(Instr::ForEnd, span);
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: &str,
        params: &[ParamDecl],
        return_type: Option<String>,
        body: &[NodeId],
        span: Span,
    ) -> InterpResult<FuncProto> {
        let mut proto_params = Vec::new();
        let mut seen_default = false;
        for p in params {
            let default = match p.default {
                Some(d) => Some(self.literal_const(d)?),
                None => {
                    if seen_default {
                        return Err(InterpError::new(
                            ErrorKind::Parse,
                            "required parameter after optional parameter",
                        )
                        .at(p.span));
                    }
                    None
                }
            };
            if default.is_some() {
                seen_default = true;
            }
            proto_params.push(ParamProto {
                name: p.name.clone(),
                type_name: p.type_name.clone(),
                default,
            });
        }

        let mut sub = Compiler::new(self.pool, self.prog.source);
        sub.in_function = true;
        sub.emit(Instr::PushScope, span);
        // The caller pushes arguments left to right; pop them in reverse.
        for p in params.iter().rev() {
            let idx = sub.name(&p.name);
            sub.emit(Instr::StoreLocal(idx), span);
        }
        // The function result is the returned value or the value of the
        // final expression statement.
        for (i, &stmt) in body.iter().enumerate() {
            let last = i == body.len() - 1;
            let is_expr = !matches!(
                sub.pool.get(stmt).kind,
                NodeKind::Assign { .. }
                    | NodeKind::If { .. }
                    | NodeKind::Foreach { .. }
                    | NodeKind::Continue
                    | NodeKind::Break
                    | NodeKind::Return(_)
                    | NodeKind::FuncDef { .. }
            );
            if last && is_expr {
                sub.compile_expr(stmt)?;
                let s = sub.pool.get(stmt).span;
                sub.emit(Instr::PopScope, s);
                sub.emit(Instr::Ret, s);
                return Ok(FuncProto {
                    name: name.to_string(),
                    params: proto_params,
                    return_type,
                    program: sub.prog,
                });
            }
            sub.compile_statement(stmt)?;
        }
        sub.emit_const(Const::Null, span);
        sub.emit(Instr::PopScope, span);
        sub.emit(Instr::Ret, span);
        Ok(FuncProto {
            name: name.to_string(),
            params: proto_params,
            return_type,
            program: sub.prog,
        })
    }

    fn literal_const(&self, node: NodeId) -> InterpResult<Const> {
        let n = self.pool.get(node);
        match &n.kind {
            NodeKind::Bool(b) => Ok(Const::Bool(*b)),
            NodeKind::Number(v) => Ok(Const::Number(*v)),
            NodeKind::Str(s) => Ok(Const::Str(s.clone())),
            _ => Err(InterpError::new(
                ErrorKind::Parse,
                "parameter defaults must be literal values",
            )
            .at(n.span)),
        }
    }

    // ---- expressions ----

    fn compile_expr(&mut self, node: NodeId) -> InterpResult<()> {
        let span = self.pool.get(node).span;
        match self.pool.get(node).kind.clone() {
            NodeKind::Bool(b) => {
                self.emit_const(Const::Bool(b), span);
            }
            NodeKind::Number(v) => {
                self.emit_const(Const::Number(v), span);
            }
            NodeKind::Str(s) => {
                self.emit_const(Const::Str(s), span);
            }
            NodeKind::FStr(s) => {
                self.compile_fstring(&s, span)?;
            }
            NodeKind::Identifier(name) => {
                let idx = self.name(&name);
                self.emit(Instr::Load(idx), span);
            }
            NodeKind::Array(items) => {
                for &item in &items {
                    self.compile_expr(item)?;
                }
                self.emit(Instr::BuildArray(items.len() as u32), span);
            }
            NodeKind::Dict(pairs) => {
                for &(k, v) in &pairs {
                    self.compile_expr(k)?;
                    self.compile_expr(v)?;
                }
                self.emit(Instr::BuildDict(pairs.len() as u32), span);
            }
            NodeKind::Unary { op, rhs } => {
                self.compile_expr(rhs)?;
                let instr = match op {
                    UnaryOp::Not => Instr::Not,
                    UnaryOp::Neg => Instr::Neg,
                };
                self.emit(instr, span);
            }
            NodeKind::Binary { op: BinOp::And, lhs, rhs } => {
                // Both operands go through the boolean check; the result is
                // always a fresh bool.
                self.compile_expr(lhs)?;
                let short_lhs = self.emit(Instr::JumpIfFalse(0), span);
                self.compile_expr(rhs)?;
                let short_rhs = self.emit(Instr::JumpIfFalse(0), span);
                self.emit_const(Const::Bool(true), span);
                let done = self.emit(Instr::Jump(0), span);
                let here = self.here();
                self.patch(short_lhs, Instr::JumpIfFalse(here));
                self.patch(short_rhs, Instr::JumpIfFalse(here));
                self.emit_const(Const::Bool(false), span);
                let here = self.here();
                self.patch(done, Instr::Jump(here));
            }
            NodeKind::Binary { op: BinOp::Or, lhs, rhs } => {
                self.compile_expr(lhs)?;
                let short_lhs = self.emit(Instr::JumpIfTrue(0), span);
                self.compile_expr(rhs)?;
                let short_rhs = self.emit(Instr::JumpIfTrue(0), span);
                self.emit_const(Const::Bool(false), span);
                let done = self.emit(Instr::Jump(0), span);
                let here = self.here();
                self.patch(short_lhs, Instr::JumpIfTrue(here));
                self.patch(short_rhs, Instr::JumpIfTrue(here));
                self.emit_const(Const::Bool(true), span);
                let here = self.here();
                self.patch(done, Instr::Jump(here));
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(binop_instr(op), span);
            }
            NodeKind::Ternary { cond, if_true, if_false } => {
                self.compile_expr(cond)?;
                let to_else = self.emit(Instr::JumpIfFalse(0), span);
                self.compile_expr(if_true)?;
                let to_end = self.emit(Instr::Jump(0), span);
                let here = self.here();
                self.patch(to_else, Instr::JumpIfFalse(here));
                self.compile_expr(if_false)?;
                let here = self.here();
                self.patch(to_end, Instr::Jump(here));
            }
            NodeKind::Index { receiver, index } => {
                self.compile_expr(receiver)?;
                self.compile_expr(index)?;
                self.emit(Instr::Index, span);
            }
            NodeKind::Member { receiver, name } => {
                self.compile_expr(receiver)?;
                let idx = self.name(&name);
                self.emit(Instr::Member(idx), span);
            }
            NodeKind::Call { callee, args } => {
                match self.pool.get(callee).kind.clone() {
                    NodeKind::Identifier(name) => {
                        let idx = self.name(&name);
                        self.emit(Instr::LoadCallable(idx), self.pool.get(callee).span);
                    }
                    _ => self.compile_expr(callee)?,
                }
                let (nargs, nkwargs) = self.compile_args(&args)?;
                self.emit(Instr::Call { nargs, nkwargs }, span);
            }
            NodeKind::MethodCall { receiver, name, args } => {
                self.compile_expr(receiver)?;
                let (nargs, nkwargs) = self.compile_args(&args)?;
                let idx = self.name(&name);
                self.emit(Instr::MethodCall { name: idx, nargs, nkwargs }, span);
            }
            NodeKind::Assign { .. }
            | NodeKind::If { .. }
            | NodeKind::Foreach { .. }
            | NodeKind::Continue
            | NodeKind::Break
            | NodeKind::Return(_)
            | NodeKind::FuncDef { .. } => {
                return Err(
                    InterpError::new(ErrorKind::Parse, "statement used as an expression").at(span)
                );
            }
        }
        Ok(())
    }

    fn compile_args(&mut self, args: &ArgsNode) -> InterpResult<(u16, u16)> {
        for &a in &args.pos {
            self.compile_expr(a)?;
        }
        for (key, key_span, value) in &args.kwargs {
            self.emit_const(Const::Str(key.clone()), *key_span);
            self.compile_expr(*value)?;
        }
        Ok((args.pos.len() as u16, args.kwargs.len() as u16))
    }

    /// Lower an f-string to `'template'.format(v1, v2, ...)` with each
    /// `@var@` replaced by a positional placeholder.
    fn compile_fstring(&mut self, raw: &str, span: Span) -> InterpResult<()> {
        let mut template = String::new();
        let mut vars: Vec<String> = Vec::new();
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '@' {
                // Scan for a closing '@' around a valid identifier.
                let mut j = i + 1;
                while j < chars.len()
                    && (chars[j].is_ascii_alphanumeric() || chars[j] == '_')
                {
                    j += 1;
                }
                if j > i + 1 && j < chars.len() && chars[j] == '@' {
                    let name: String = chars[i + 1..j].iter().collect();
                    let pos = match vars.iter().position(|v| v == &name) {
                        Some(p) => p,
                        None => {
                            vars.push(name);
                            vars.len() - 1
                        }
                    };
                    template.push_str(&format!("@{}@", pos));
                    i = j + 1;
                    continue;
                }
            }
            template.push(chars[i]);
            i += 1;
        }
        self.emit_const(Const::Str(template), span);
        let nargs = vars.len() as u16;
        for v in &vars {
            let idx = self.name(v);
            self.emit(Instr::Load(idx), span);
        }
        let fmt = self.name("format");
        self.emit(Instr::MethodCall { name: fmt, nargs, nkwargs: 0 }, span);
        Ok(())
    }
}

fn assign_binop(op: AssignOp) -> BinOp {
    match op {
        AssignOp::Add => BinOp::Add,
        AssignOp::Sub => BinOp::Sub,
        AssignOp::Mul => BinOp::Mul,
        AssignOp::Div => BinOp::Div,
        AssignOp::Mod => BinOp::Mod,
        AssignOp::Assign => unreachable!("plain assignment handled by caller"),
    }
}

fn binop_instr(op: BinOp) -> Instr {
    match op {
        BinOp::Add => Instr::Add,
        BinOp::Sub => Instr::Sub,
        BinOp::Mul => Instr::Mul,
        BinOp::Div => Instr::Div,
        BinOp::Mod => Instr::Mod,
        BinOp::Eq => Instr::Eq,
        BinOp::Ne => Instr::Ne,
        BinOp::Lt => Instr::Lt,
        BinOp::Le => Instr::Le,
        BinOp::Gt => Instr::Gt,
        BinOp::Ge => Instr::Ge,
        BinOp::In => Instr::In,
        BinOp::NotIn => Instr::NotIn,
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops compiled separately"),
    }
}
