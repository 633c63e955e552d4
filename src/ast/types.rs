//! AST Node Types
//!
//! The parser produces nodes into an `AstPool`; node references are 32-bit
//! indices into that pool. Every node carries the source location of the
//! token that introduced it.

use crate::diagnostics::Span;

/// Index of a node in its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Binary operators, precedence handled by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Assignment flavors. Compound assignment is rewritten by the compiler to
/// a plain rebind of `lhs op rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Argument list of a call: positional nodes plus keyword pairs.
/// Keywords always follow all positional arguments.
#[derive(Debug, Clone, Default)]
pub struct ArgsNode {
    pub pos: Vec<NodeId>,
    pub kwargs: Vec<(String, Span, NodeId)>,
}

/// A declared parameter of a user-defined function.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<NodeId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Bool(bool),
    Number(i64),
    Str(String),
    FStr(String),
    Identifier(String),
    Array(Vec<NodeId>),
    Dict(Vec<(NodeId, NodeId)>),
    Unary { op: UnaryOp, rhs: NodeId },
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
    Ternary { cond: NodeId, if_true: NodeId, if_false: NodeId },
    Assign { target: NodeId, op: AssignOp, value: NodeId },
    Index { receiver: NodeId, index: NodeId },
    Member { receiver: NodeId, name: String },
    Call { callee: NodeId, args: ArgsNode },
    MethodCall { receiver: NodeId, name: String, args: ArgsNode },
    If { clauses: Vec<(NodeId, Vec<NodeId>)>, else_body: Option<Vec<NodeId>> },
    Foreach { vars: Vec<String>, iterable: NodeId, body: Vec<NodeId> },
    Continue,
    Break,
    Return(Option<NodeId>),
    FuncDef {
        name: String,
        params: Vec<ParamDecl>,
        return_type: Option<String>,
        body: Vec<NodeId>,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Flat storage for a parsed file's nodes.
#[derive(Debug, Default)]
pub struct AstPool {
    nodes: Vec<Node>,
}

impl AstPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A fully parsed source file: pool plus top-level statement list.
#[derive(Debug)]
pub struct ParsedFile {
    pub pool: AstPool,
    pub body: Vec<NodeId>,
}
