//! High-level AST for one script *before* it is lowered to byte-code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
}

/// A named integer visible to script compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub name: String,
    pub value: i32,
}

impl Declaration {
    pub fn constant(name: impl Into<String>, value: i32) -> Self {
        Self {
            kind: DeclarationKind::Const,
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i32),
    Str(String),
    Ident(String),
    /// `name(args…)` – a local function, an inlined one or an engine builtin.
    Call { name: String, args: Vec<Expr> },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// `{ … }`
    Block(Vec<Stmt>),

    /// `var name [= init];`
    Var { name: String, init: Option<Expr> },

    /// `const NAME = 42;` inside a function body.
    Const { name: String, value: i32 },

    /// `name = value;`
    Assign { name: String, value: Expr },

    /// Bare expression, usually a call.
    Expr(Expr),

    /// `if (cond) then [else otherwise]`
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },

    /// `while (cond) body`
    While { cond: Expr, body: Box<Stmt> },

    /// `for (init; cond; step) body`
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },

    Break,
    Continue,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    /// 1-based source line the statement starts on.
    pub line: usize,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(line: usize, kind: StmtKind) -> Self {
        Self { line, kind }
    }

    pub fn empty_block() -> Self {
        Self::new(0, StmtKind::Block(Vec::new()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    /// Never compiled on its own, expanded at every call site.
    Inlined,
}

/// One script function, from parsing until it is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    /// Script number, set when the function is bound as a free local function.
    pub id: Option<u16>,
    pub body: Stmt,
    pub line: usize,
    pub bytecode: Option<Vec<u8>>,
}

impl Function {
    pub fn new(kind: FunctionKind, name: impl Into<String>, body: Stmt, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            id: None,
            body,
            line,
            bytecode: None,
        }
    }

    /// Empty function used when a room doesn't define the one it needs.
    pub fn stub(name: impl Into<String>) -> Self {
        Self::new(FunctionKind::Normal, name, Stmt::empty_block(), 0)
    }

    pub fn is_inlined(&self) -> bool {
        self.kind == FunctionKind::Inlined
    }
}
