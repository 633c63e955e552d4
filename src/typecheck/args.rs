//! Argument Binding
//!
//! Declarative signatures for native functions. A builder describes the
//! positional, optional, glob and keyword arguments; `bind` walks the call's
//! arguments, typechecks each one at its own source location, applies
//! listify coercion, and either returns the bound set or signals a disabler
//! short-circuit for the machine to propagate.

use indexmap::IndexMap;

use crate::diagnostics::{ErrorKind, InterpError, InterpResult, Span};
use crate::object::{Obj, ObjStore};
use crate::typecheck::{tag_to_string, typecheck, TypeTag, TAG_LISTIFY, TAG_MASK};
use crate::vm::{ArgValue, Args, Vm};

/// Result of binding: either every argument bound, or a disabler was seen
/// and the call must evaluate to the disabler.
#[derive(Debug)]
pub enum Binding {
    Bound(BoundArgs),
    Disabled,
}

impl Binding {
    /// The bound arguments, or None when a disabler short-circuited.
    pub fn into_bound(self) -> Option<BoundArgs> {
        match self {
            Binding::Bound(b) => Some(b),
            Binding::Disabled => None,
        }
    }
}

struct Spec {
    name: &'static str,
    tag: TypeTag,
}

pub struct ArgParser {
    fname: String,
    pos: Vec<Spec>,
    opt_pos: Vec<Spec>,
    glob: Option<Spec>,
    kws: Vec<Spec>,
    immune: bool,
}

impl ArgParser {
    pub fn new(fname: &str) -> Self {
        Self {
            fname: fname.to_string(),
            pos: Vec::new(),
            opt_pos: Vec::new(),
            glob: None,
            kws: Vec::new(),
            immune: false,
        }
    }

    /// Required positional argument.
    pub fn pos(mut self, name: &'static str, tag: TypeTag) -> Self {
        self.pos.push(Spec { name, tag });
        self
    }

    /// Optional positional argument, filled in order after the required
    /// ones.
    pub fn opt_pos(mut self, name: &'static str, tag: TypeTag) -> Self {
        self.opt_pos.push(Spec { name, tag });
        self
    }

    /// Zero or more trailing positional arguments.
    pub fn glob(mut self, name: &'static str, tag: TypeTag) -> Self {
        self.glob = Some(Spec { name, tag });
        self
    }

    pub fn kw(mut self, name: &'static str, tag: TypeTag) -> Self {
        self.kws.push(Spec { name, tag });
        self
    }

    /// Bind even when a disabler appears among the arguments.
    pub fn disabler_immune(mut self) -> Self {
        self.immune = true;
        self
    }

    pub fn bind(self, vm: &mut Vm, args: &Args) -> InterpResult<Binding> {
        if !self.immune && args.any_disabler() {
            return Ok(Binding::Disabled);
        }

        let mut bound = BoundArgs {
            pos: Vec::new(),
            opt_pos: vec![None; self.opt_pos.len()],
            glob: Vec::new(),
            kw: IndexMap::new(),
            span: args.span,
        };

        if args.pos.len() < self.pos.len() {
            return Err(InterpError::new(
                ErrorKind::MissingArg,
                format!(
                    "{}() requires {} positional arguments, got {}",
                    self.fname,
                    self.pos.len(),
                    args.pos.len()
                ),
            )
            .at(args.span));
        }

        let mut cursor = 0usize;
        for spec in &self.pos {
            let arg = args.pos[cursor];
            let value = self.check(vm, spec, arg)?;
            bound.pos.push(ArgValue { val: value, span: arg.span });
            cursor += 1;
        }
        for (i, spec) in self.opt_pos.iter().enumerate() {
            if cursor >= args.pos.len() {
                break;
            }
            let arg = args.pos[cursor];
            let value = self.check(vm, spec, arg)?;
            bound.opt_pos[i] = Some(ArgValue { val: value, span: arg.span });
            cursor += 1;
        }
        if cursor < args.pos.len() {
            match &self.glob {
                Some(spec) => {
                    for arg in &args.pos[cursor..] {
                        let value = self.check(vm, spec, *arg)?;
                        bound.glob.push(ArgValue { val: value, span: arg.span });
                    }
                }
                None => {
                    return Err(InterpError::new(
                        ErrorKind::Type,
                        format!(
                            "{}() accepts at most {} positional arguments, got {}",
                            self.fname,
                            self.pos.len() + self.opt_pos.len(),
                            args.pos.len()
                        ),
                    )
                    .at(args.pos[cursor].span));
                }
            }
        }

        for (key, arg) in &args.kwargs {
            let spec = match self.kws.iter().find(|s| s.name == key) {
                Some(spec) => spec,
                None => {
                    return Err(InterpError::new(
                        ErrorKind::InvalidKwarg,
                        format!("{}() got an unknown keyword argument '{}'", self.fname, key),
                    )
                    .at(arg.span));
                }
            };
            if bound.kw.contains_key(spec.name) {
                return Err(InterpError::new(
                    ErrorKind::DuplicateKwarg,
                    format!("{}() got keyword argument '{}' twice", self.fname, key),
                )
                .at(arg.span));
            }
            let value = self.check(vm, spec, *arg)?;
            bound.kw.insert(spec.name, ArgValue { val: value, span: arg.span });
        }

        Ok(Binding::Bound(bound))
    }

    fn check(&self, vm: &mut Vm, spec: &Spec, arg: ArgValue) -> InterpResult<Obj> {
        if spec.tag & TAG_LISTIFY != 0 {
            // Flatten into a fresh array and check every element.
            let mut items = Vec::new();
            vm.wk.store.flatten_into(arg.val, &mut items);
            for &item in &items {
                if item.is_null() {
                    continue;
                }
                if !typecheck(&vm.wk.store, item, spec.tag & !TAG_LISTIFY) {
                    return Err(self.mismatch(vm, spec, item, arg.span));
                }
            }
            let items: Vec<Obj> = items.into_iter().filter(|o| !o.is_null()).collect();
            return Ok(vm.wk.store.new_array(items));
        }
        if !typecheck(&vm.wk.store, arg.val, spec.tag) {
            return Err(self.mismatch(vm, spec, arg.val, arg.span));
        }
        Ok(arg.val)
    }

    fn mismatch(&self, vm: &Vm, spec: &Spec, got: Obj, span: Span) -> InterpError {
        InterpError::new(
            ErrorKind::Type,
            format!(
                "{}() argument '{}' expects {}, got {}",
                self.fname,
                spec.name,
                tag_to_string(spec.tag & !TAG_MASK),
                vm.wk.store.obj_type(got).as_str()
            ),
        )
        .at(span)
    }
}

/// Bound arguments handed to a native function body.
#[derive(Debug)]
pub struct BoundArgs {
    pos: Vec<ArgValue>,
    opt_pos: Vec<Option<ArgValue>>,
    glob: Vec<ArgValue>,
    kw: IndexMap<&'static str, ArgValue>,
    span: Span,
}

impl BoundArgs {
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn pos(&self, i: usize) -> Obj {
        self.pos[i].val
    }

    pub fn pos_span(&self, i: usize) -> Span {
        self.pos[i].span
    }

    pub fn opt_pos(&self, i: usize) -> Option<ArgValue> {
        self.opt_pos.get(i).copied().flatten()
    }

    pub fn glob(&self) -> &[ArgValue] {
        &self.glob
    }

    pub fn kw(&self, name: &str) -> Option<Obj> {
        self.kw.get(name).map(|a| a.val)
    }

    pub fn kw_arg(&self, name: &str) -> Option<&ArgValue> {
        self.kw.get(name)
    }

    pub fn kw_span(&self, name: &str) -> Span {
        self.kw.get(name).map(|a| a.span).unwrap_or(self.span)
    }

    // ---- typed accessors ----

    pub fn kw_str(&self, store: &ObjStore, name: &str) -> Option<String> {
        self.kw(name).and_then(|o| store.as_str(o)).map(|s| s.to_string())
    }

    pub fn kw_bool(&self, store: &ObjStore, name: &str, default: bool) -> bool {
        self.kw(name).and_then(|o| store.as_bool(o)).unwrap_or(default)
    }

    pub fn kw_number(&self, store: &ObjStore, name: &str) -> Option<i64> {
        self.kw(name).and_then(|o| store.as_number(o))
    }

    /// Elements of a listified keyword argument.
    pub fn kw_objs(&self, store: &ObjStore, name: &str) -> Vec<Obj> {
        match self.kw(name) {
            Some(obj) => store.as_array(obj).map(|s| s.to_vec()).unwrap_or_else(|| vec![obj]),
            None => Vec::new(),
        }
    }

    /// String contents of a listified keyword argument of strings/files.
    pub fn kw_strs(&self, store: &ObjStore, name: &str) -> Vec<String> {
        self.kw_objs(store, name)
            .into_iter()
            .filter_map(|o| store.path_like(o).map(|s| s.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecheck::{TC_BOOL, TC_NUMBER, TC_STRING};
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn sarg(wk: &mut Workspace, s: &str) -> ArgValue {
        ArgValue { val: wk.store.new_str(s), span: Span::default() }
    }

    #[test]
    fn test_positional_binding() {
        let mut wk = setup();
        let a = sarg(&mut wk, "hello");
        let mut vm = Vm::new(&mut wk);
        let args = Args { pos: vec![a], kwargs: vec![], span: Span::default() };
        let binding = ArgParser::new("f").pos("name", TC_STRING).bind(&mut vm, &args).unwrap();
        match binding {
            Binding::Bound(b) => assert_eq!(vm.wk.store.as_str(b.pos(0)), Some("hello")),
            Binding::Disabled => panic!("unexpected disabler"),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let mut wk = setup();
        let n = ArgValue { val: wk.store.new_number(3), span: Span::default() };
        let mut vm = Vm::new(&mut wk);
        let args = Args { pos: vec![n], kwargs: vec![], span: Span::default() };
        let err = ArgParser::new("f").pos("name", TC_STRING).bind(&mut vm, &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_unknown_kwarg() {
        let mut wk = setup();
        let a = sarg(&mut wk, "x");
        let mut vm = Vm::new(&mut wk);
        let args = Args {
            pos: vec![],
            kwargs: vec![("nope".to_string(), a)],
            span: Span::default(),
        };
        let err = ArgParser::new("f").kw("yes", TC_STRING).bind(&mut vm, &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidKwarg);
    }

    #[test]
    fn test_duplicate_kwarg() {
        let mut wk = setup();
        let a = sarg(&mut wk, "x");
        let b = sarg(&mut wk, "y");
        let mut vm = Vm::new(&mut wk);
        let args = Args {
            pos: vec![],
            kwargs: vec![("k".to_string(), a), ("k".to_string(), b)],
            span: Span::default(),
        };
        let err = ArgParser::new("f").kw("k", TC_STRING).bind(&mut vm, &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateKwarg);
    }

    #[test]
    fn test_disabler_short_circuits() {
        let mut wk = setup();
        let mut vm = Vm::new(&mut wk);
        let args = Args {
            pos: vec![ArgValue { val: Obj::DISABLER, span: Span::default() }],
            kwargs: vec![],
            span: Span::default(),
        };
        let binding = ArgParser::new("f").pos("x", TC_STRING).bind(&mut vm, &args).unwrap();
        assert!(matches!(binding, Binding::Disabled));
    }

    #[test]
    fn test_listify_wraps_and_flattens() {
        let mut wk = setup();
        let a = wk.store.new_str("a");
        let b = wk.store.new_str("b");
        let inner = wk.store.new_array(vec![b]);
        let nested = wk.store.new_array(vec![a, inner]);
        let mut vm = Vm::new(&mut wk);
        let args = Args {
            pos: vec![ArgValue { val: nested, span: Span::default() }],
            kwargs: vec![],
            span: Span::default(),
        };
        let binding = ArgParser::new("f")
            .pos("xs", TAG_LISTIFY | TC_STRING)
            .bind(&mut vm, &args)
            .unwrap();
        match binding {
            Binding::Bound(bound) => {
                let items = vm.wk.store.as_array(bound.pos(0)).unwrap();
                assert_eq!(items.len(), 2);
            }
            Binding::Disabled => panic!("unexpected disabler"),
        }
    }

    #[test]
    fn test_glob_collects_rest() {
        let mut wk = setup();
        let a = sarg(&mut wk, "a");
        let b = sarg(&mut wk, "b");
        let c = sarg(&mut wk, "c");
        let mut vm = Vm::new(&mut wk);
        let args = Args { pos: vec![a, b, c], kwargs: vec![], span: Span::default() };
        let binding = ArgParser::new("f")
            .pos("first", TC_STRING)
            .glob("rest", TC_STRING | TC_BOOL | TC_NUMBER)
            .bind(&mut vm, &args)
            .unwrap();
        match binding {
            Binding::Bound(bound) => assert_eq!(bound.glob().len(), 2),
            Binding::Disabled => panic!("unexpected disabler"),
        }
    }
}
