//! VM Execution Loop
//!
//! A stack machine over the compiled instruction stream. The operand stack
//! carries value handles paired with the span that produced them so
//! argument errors anchor to their source. Nested evaluation (subdir,
//! subprojects, user function calls) re-enters through a fresh `Vm` over
//! the same workspace.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::compiler::bytecode::{Const, FuncProto, Instr, Program, NO_VAR};
use crate::diagnostics::{ErrorKind, InterpError, InterpResult, Span};
use crate::functions;
use crate::object::{CaptureData, FuncDef, Obj, Value};
use crate::typecheck::{tag_from_name, typecheck, tag_to_string};
use crate::vm::ops;
use crate::vm::{ArgValue, Args};
use crate::workspace::{Workspace, MAX_CALL_DEPTH};

struct ForFrame {
    container: Obj,
    index: usize,
    var: u32,
    var2: u32,
}

pub struct Vm<'w> {
    pub wk: &'w mut Workspace,
    stack: Vec<(Obj, Span)>,
    iter_frames: Vec<ForFrame>,
    current_span: Span,
    /// Set by subdir_done() to stop the current file's execution.
    halted: bool,
}

impl<'w> Vm<'w> {
    pub fn new(wk: &'w mut Workspace) -> Self {
        Self {
            wk,
            stack: Vec::new(),
            iter_frames: Vec::new(),
            current_span: Span::default(),
            halted: false,
        }
    }

    /// Location of the instruction currently executing; natives use this
    /// to anchor diagnostics.
    pub fn span(&self) -> Span {
        self.current_span
    }

    /// Stop executing the current program after the active native call
    /// returns.
    pub fn request_halt(&mut self) {
        self.halted = true;
    }

    fn push(&mut self, obj: Obj, span: Span) {
        self.stack.push((obj, span));
    }

    fn pop(&mut self) -> (Obj, Span) {
        self.stack.pop().expect("operand stack underflow")
    }

    pub fn run(&mut self, prog: &Program) -> InterpResult<Obj> {
        let mut ip = 0usize;
        loop {
            let instr = prog.instrs[ip];
            let span = prog.spans[ip];
            self.current_span = span;
            ip += 1;
            match instr {
                Instr::Const(idx) => {
                    let obj = self.materialize_const(prog.constant(idx));
                    self.push(obj, span);
                }
                Instr::Load(name) => {
                    let name = prog.name(name);
                    match self.wk.lookup_var(name) {
                        Some(obj) => self.push(obj, span),
                        None => {
                            return Err(InterpError::new(
                                ErrorKind::UnknownVariable,
                                format!("variable '{}' is not defined", name),
                            )
                            .at(span));
                        }
                    }
                }
                Instr::LoadCallable(name) => {
                    let name_str = prog.name(name);
                    match self.wk.lookup_var(name_str) {
                        Some(obj) => self.push(obj, span),
                        None => {
                            let id = self.wk.store.strings.intern(name_str);
                            let obj = self.wk.store.push(Value::FuncRef(id));
                            self.push(obj, span);
                        }
                    }
                }
                Instr::StoreLocal(name) => {
                    let (value, _) = self.pop();
                    let name = prog.name(name).to_string();
                    self.wk.set_var(&name, value);
                }
                Instr::StoreMember(name) => {
                    let (value, _) = self.pop();
                    let (receiver, _) = self.pop();
                    let name = prog.name(name).to_string();
                    self.store_member(receiver, &name, value)
                        .map_err(|e| e.or_at(span))?;
                }
                Instr::Pop => {
                    self.pop();
                }
                Instr::Jump(target) => {
                    ip = target as usize;
                }
                Instr::JumpIfFalse(target) => {
                    if !self.pop_condition().map_err(|e| e.or_at(span))? {
                        ip = target as usize;
                    }
                }
                Instr::JumpIfTrue(target) => {
                    if self.pop_condition().map_err(|e| e.or_at(span))? {
                        ip = target as usize;
                    }
                }
                Instr::Call { nargs, nkwargs } => {
                    let args = self.pop_args(nargs, nkwargs, span)?;
                    let (callee, callee_span) = self.pop();
                    let result = self
                        .dispatch_call(callee, &args)
                        .map_err(|e| e.or_at(callee_span))?;
                    self.push(result, span);
                    if self.halted {
                        return Ok(Obj::NULL);
                    }
                }
                Instr::MethodCall { name, nargs, nkwargs } => {
                    let args = self.pop_args(nargs, nkwargs, span)?;
                    let (receiver, _) = self.pop();
                    let name = prog.name(name).to_string();
                    let result = functions::call_method(self, receiver, &name, &args)
                        .map_err(|e| e.or_at(span))?;
                    self.push(result, span);
                    if self.halted {
                        return Ok(Obj::NULL);
                    }
                }
                Instr::Index => {
                    let (idx, _) = self.pop();
                    let (receiver, _) = self.pop();
                    let result =
                        ops::index(&mut self.wk.store, receiver, idx).map_err(|e| e.or_at(span))?;
                    self.push(result, span);
                }
                Instr::Member(name) => {
                    let (receiver, _) = self.pop();
                    let name = prog.name(name).to_string();
                    let result = self.member(receiver, &name).map_err(|e| e.or_at(span))?;
                    self.push(result, span);
                }
                Instr::Neg => {
                    let (value, _) = self.pop();
                    match self.wk.store.as_number(value) {
                        Some(n) => {
                            let obj = self.wk.store.new_number(-n);
                            self.push(obj, span);
                        }
                        None => {
                            if value.is_disabler() {
                                self.push(Obj::DISABLER, span);
                            } else {
                                return Err(InterpError::new(
                                    ErrorKind::Type,
                                    "unary minus expects a number",
                                )
                                .at(span));
                            }
                        }
                    }
                }
                Instr::Not => {
                    let (value, _) = self.pop();
                    match self.wk.store.as_bool(value) {
                        Some(b) => {
                            let obj = self.wk.store.new_bool(!b);
                            self.push(obj, span);
                        }
                        None => {
                            if value.is_disabler() {
                                self.push(Obj::DISABLER, span);
                            } else {
                                return Err(InterpError::new(
                                    ErrorKind::Type,
                                    "'not' expects a boolean",
                                )
                                .at(span));
                            }
                        }
                    }
                }
                Instr::Add | Instr::Sub | Instr::Mul | Instr::Div | Instr::Mod => {
                    let (rhs, _) = self.pop();
                    let (lhs, _) = self.pop();
                    if lhs.is_disabler() || rhs.is_disabler() {
                        self.push(Obj::DISABLER, span);
                        continue;
                    }
                    let store = &mut self.wk.store;
                    let result = match instr {
                        Instr::Add => ops::add(store, lhs, rhs),
                        Instr::Sub => ops::sub(store, lhs, rhs),
                        Instr::Mul => ops::mul(store, lhs, rhs),
                        Instr::Div => ops::div(store, lhs, rhs),
                        _ => ops::modulo(store, lhs, rhs),
                    }
                    .map_err(|e| e.or_at(span))?;
                    self.push(result, span);
                }
                Instr::Eq | Instr::Ne => {
                    let (rhs, _) = self.pop();
                    let (lhs, _) = self.pop();
                    let equal = self.wk.store.obj_equal(lhs, rhs);
                    let result = if instr == Instr::Eq { equal } else { !equal };
                    let obj = self.wk.store.new_bool(result);
                    self.push(obj, span);
                }
                Instr::Lt | Instr::Le | Instr::Gt | Instr::Ge => {
                    let (rhs, _) = self.pop();
                    let (lhs, _) = self.pop();
                    if lhs.is_disabler() || rhs.is_disabler() {
                        self.push(Obj::DISABLER, span);
                        continue;
                    }
                    let check: fn(std::cmp::Ordering) -> bool = match instr {
                        Instr::Lt => |o| o == std::cmp::Ordering::Less,
                        Instr::Le => |o| o != std::cmp::Ordering::Greater,
                        Instr::Gt => |o| o == std::cmp::Ordering::Greater,
                        _ => |o| o != std::cmp::Ordering::Less,
                    };
                    let result = ops::relational(&self.wk.store, lhs, rhs, check)
                        .map_err(|e| e.or_at(span))?;
                    let obj = self.wk.store.new_bool(result);
                    self.push(obj, span);
                }
                Instr::In | Instr::NotIn => {
                    let (container, _) = self.pop();
                    let (item, _) = self.pop();
                    if container.is_disabler() || item.is_disabler() {
                        self.push(Obj::DISABLER, span);
                        continue;
                    }
                    let found = ops::contains(&self.wk.store, item, container)
                        .map_err(|e| e.or_at(span))?;
                    let result = if instr == Instr::In { found } else { !found };
                    let obj = self.wk.store.new_bool(result);
                    self.push(obj, span);
                }
                Instr::BuildArray(n) => {
                    let mut items = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        items.push(self.pop().0);
                    }
                    items.reverse();
                    let obj = self.wk.store.new_array(items);
                    self.push(obj, span);
                }
                Instr::BuildDict(n) => {
                    let mut pairs = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        let (value, _) = self.pop();
                        let (key, _) = self.pop();
                        pairs.push((key, value));
                    }
                    pairs.reverse();
                    let obj = ops::build_dict(&mut self.wk.store, pairs)
                        .map_err(|e| e.or_at(span))?;
                    self.push(obj, span);
                }
                Instr::ForPrep { var, var2 } => {
                    let (container, cspan) = self.pop();
                    let ty = self.wk.store.obj_type(container);
                    if var2 == NO_VAR {
                        if ty != crate::object::ObjType::Array {
                            return Err(InterpError::new(
                                ErrorKind::Type,
                                format!("foreach expects an array, got {}", ty.as_str()),
                            )
                            .at(cspan));
                        }
                    } else if ty != crate::object::ObjType::Dict {
                        return Err(InterpError::new(
                            ErrorKind::Type,
                            format!("two-variable foreach expects a dict, got {}", ty.as_str()),
                        )
                        .at(cspan));
                    }
                    self.wk.iter_lock(container);
                    self.iter_frames.push(ForFrame { container, index: 0, var, var2 });
                }
                Instr::ForIter { exit } => {
                    let frame = self.iter_frames.last().expect("iteration frame missing");
                    let container = frame.container;
                    let index = frame.index;
                    let (var, var2) = (frame.var, frame.var2);
                    enum Step {
                        Array(Obj),
                        Dict(String, Obj),
                        Done,
                    }
                    let step = match self.wk.store.get(container) {
                        Value::Array(items) => match items.get(index) {
                            Some(&o) => Step::Array(o),
                            None => Step::Done,
                        },
                        Value::Dict(map) => match map.get_index(index) {
                            Some((k, &v)) => Step::Dict(k.clone(), v),
                            None => Step::Done,
                        },
                        _ => unreachable!("ForPrep typechecks the container"),
                    };
                    match step {
                        Step::Array(element) => {
                            let name = prog.name(var).to_string();
                            self.wk.set_var(&name, element);
                            self.iter_frames.last_mut().expect("frame").index += 1;
                        }
                        Step::Dict(key, value) => {
                            let key_obj = self.wk.store.new_str(&key);
                            let name = prog.name(var).to_string();
                            self.wk.set_var(&name, key_obj);
                            let name2 = prog.name(var2).to_string();
                            self.wk.set_var(&name2, value);
                            self.iter_frames.last_mut().expect("frame").index += 1;
                        }
                        Step::Done => {
                            ip = exit as usize;
                        }
                    }
                }
                Instr::ForEnd => {
                    let frame = self.iter_frames.pop().expect("iteration frame missing");
                    self.wk.iter_unlock(frame.container);
                }
                Instr::Ret => {
                    let (value, _) = self.pop();
                    return Ok(value);
                }
                Instr::Halt => {
                    return Ok(Obj::NULL);
                }
                Instr::PushScope => {
                    self.wk.current_project_mut().scopes.push(IndexMap::new());
                }
                Instr::PopScope => {
                    let project = self.wk.current_project_mut();
                    if project.scopes.len() > 1 {
                        project.scopes.pop();
                    }
                }
            }
        }
    }

    fn materialize_const(&mut self, c: &Const) -> Obj {
        match c {
            Const::Null => Obj::NULL,
            Const::Bool(b) => self.wk.store.new_bool(*b),
            Const::Number(n) => self.wk.store.new_number(*n),
            Const::Str(s) => self.wk.store.new_str(s),
            Const::Func(proto) => self
                .wk
                .store
                .push(Value::Func(Box::new(FuncDef { proto: Rc::clone(proto) }))),
        }
    }

    fn pop_condition(&mut self) -> InterpResult<bool> {
        let (value, span) = self.pop();
        // A disabled value never takes the branch.
        if value.is_disabler() {
            return Ok(false);
        }
        self.wk.store.as_bool(value).ok_or_else(|| {
            InterpError::new(
                ErrorKind::Type,
                format!(
                    "condition must be a boolean, got {}",
                    self.wk.store.obj_type(value).as_str()
                ),
            )
            .at(span)
        })
    }

    /// Pop a call's arguments following the stack layout emitted by the
    /// compiler: kwarg (key, value) pairs on top, positionals below.
    fn pop_args(&mut self, nargs: u16, nkwargs: u16, span: Span) -> InterpResult<Args> {
        let mut kwargs = Vec::with_capacity(nkwargs as usize);
        for _ in 0..nkwargs {
            let (value, vspan) = self.pop();
            let (key, _) = self.pop();
            let key = self.wk.store.get_str(key).to_string();
            kwargs.push((key, ArgValue { val: value, span: vspan }));
        }
        kwargs.reverse();
        let mut pos = Vec::with_capacity(nargs as usize);
        for _ in 0..nargs {
            let (value, vspan) = self.pop();
            pos.push(ArgValue { val: value, span: vspan });
        }
        pos.reverse();
        Ok(Args { pos, kwargs, span })
    }

    fn dispatch_call(&mut self, callee: Obj, args: &Args) -> InterpResult<Obj> {
        match self.wk.store.get(callee).clone() {
            Value::FuncRef(id) => {
                let name = self.wk.store.str_value(id).to_string();
                functions::call_kernel(self, &name, args)
            }
            Value::Func(def) => self.call_user_function(def.proto, None, args),
            Value::Capture(cap) => {
                self.call_user_function(cap.proto, Some(cap.scopes), args)
            }
            Value::Disabler => Ok(Obj::DISABLER),
            other => Err(InterpError::new(
                ErrorKind::Type,
                format!("{} object is not callable", other.obj_type().as_str()),
            )),
        }
    }

    /// Run a user-defined function or capture. Arguments are bound by the
    /// function prologue; the caller only validates and pushes them.
    pub fn call_user_function(
        &mut self,
        proto: Rc<FuncProto>,
        capture_scopes: Option<Vec<IndexMap<String, Obj>>>,
        args: &Args,
    ) -> InterpResult<Obj> {
        if args.any_disabler() {
            return Ok(Obj::DISABLER);
        }
        if let Some((key, arg)) = args.kwargs.first() {
            return Err(InterpError::new(
                ErrorKind::InvalidKwarg,
                format!("{}() takes no keyword argument '{}'", proto.name, key),
            )
            .at(arg.span));
        }
        let required = proto.params.iter().filter(|p| p.default.is_none()).count();
        if args.pos.len() < required {
            return Err(InterpError::new(
                ErrorKind::MissingArg,
                format!(
                    "{}() requires {} arguments, got {}",
                    proto.name,
                    required,
                    args.pos.len()
                ),
            )
            .at(args.span));
        }
        if args.pos.len() > proto.params.len() {
            return Err(InterpError::new(
                ErrorKind::Type,
                format!(
                    "{}() accepts at most {} arguments, got {}",
                    proto.name,
                    proto.params.len(),
                    args.pos.len()
                ),
            )
            .at(args.span));
        }
        if self.wk.call_depth >= MAX_CALL_DEPTH {
            return Err(InterpError::new(
                ErrorKind::Usage,
                format!("call depth limit exceeded in {}()", proto.name),
            )
            .at(args.span));
        }

        // Gather the value for every parameter: provided or default.
        let mut values = Vec::with_capacity(proto.params.len());
        for (i, param) in proto.params.iter().enumerate() {
            let value = match args.pos.get(i) {
                Some(arg) => {
                    if let Some(type_name) = &param.type_name {
                        let tag = tag_from_name(type_name).ok_or_else(|| {
                            InterpError::new(
                                ErrorKind::Type,
                                format!("unknown type annotation '{}'", type_name),
                            )
                            .at(arg.span)
                        })?;
                        if !typecheck(&self.wk.store, arg.val, tag) {
                            return Err(InterpError::new(
                                ErrorKind::Type,
                                format!(
                                    "{}() argument '{}' expects {}, got {}",
                                    proto.name,
                                    param.name,
                                    tag_to_string(tag),
                                    self.wk.store.obj_type(arg.val).as_str()
                                ),
                            )
                            .at(arg.span));
                        }
                    }
                    arg.val
                }
                None => {
                    let default = param.default.clone().expect("arity checked above");
                    self.materialize_const(&default)
                }
            };
            values.push(value);
        }

        let saved_scopes = match capture_scopes {
            Some(snapshot) => Some(std::mem::replace(
                &mut self.wk.current_project_mut().scopes,
                snapshot,
            )),
            None => None,
        };
        let scope_depth = self.wk.current_project().scopes.len();

        self.wk.call_depth += 1;
        let result = {
            let mut sub = Vm::new(&mut *self.wk);
            let span = args.span;
            for value in values {
                sub.push(value, span);
            }
            sub.run(&proto.program)
        };
        self.wk.call_depth -= 1;

        // Unwind the function scope however the body exited.
        self.wk.current_project_mut().scopes.truncate(scope_depth);
        if let Some(saved) = saved_scopes {
            self.wk.current_project_mut().scopes = saved;
        }
        let result = result?;

        if let Some(return_type) = &proto.return_type {
            if let Some(tag) = tag_from_name(return_type) {
                if !typecheck(&self.wk.store, result, tag) {
                    return Err(InterpError::new(
                        ErrorKind::ReturnTypeMismatch,
                        format!(
                            "{}() declares return type {} but returned {}",
                            proto.name,
                            return_type,
                            self.wk.store.obj_type(result).as_str()
                        ),
                    )
                    .at(args.span));
                }
            }
        }
        Ok(result)
    }

    fn store_member(&mut self, receiver: Obj, name: &str, value: Obj) -> InterpResult<()> {
        // Functions exported through a module close over the scope chain at
        // assignment time.
        let value = match self.wk.store.get(value).clone() {
            Value::Func(def) => {
                let scopes = self.wk.current_project().scopes.clone();
                self.wk
                    .store
                    .push(Value::Capture(Box::new(CaptureData { proto: def.proto, scopes })))
            }
            _ => value,
        };
        match self.wk.store.get_mut(receiver) {
            Value::Module(module) => {
                module.exports.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(InterpError::new(
                ErrorKind::Type,
                format!("cannot assign to member of {}", other.obj_type().as_str()),
            )),
        }
    }

    fn member(&mut self, receiver: Obj, name: &str) -> InterpResult<Obj> {
        match self.wk.store.get(receiver) {
            Value::Disabler => Ok(Obj::DISABLER),
            Value::Module(module) => match module.exports.get(name) {
                Some(&obj) => Ok(obj),
                None => Err(InterpError::new(
                    ErrorKind::UnknownMethod,
                    format!("module '{}' exports no '{}'", module.name, name),
                )),
            },
            other => Err(InterpError::new(
                ErrorKind::Type,
                format!("{} has no members", other.obj_type().as_str()),
            )),
        }
    }
}
