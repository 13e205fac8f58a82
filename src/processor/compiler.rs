//! Lowers a function's AST to bytecode against the room's scopes.

use log::debug;

use super::ast::{Expr, Function, Stmt, StmtKind, UnOp};
use super::bytecode::{self, Op};
use super::context::{Context, ContextKind, Symbol};
use crate::error::CompileError;

type Result<T> = std::result::Result<T, CompileError>;

/// Placeholder target of a jump that is patched later.
const UNPATCHED: usize = usize::MAX;

/// Compiles one standalone function under the room scope.
pub fn compile_function(function: &Function, room: &Context<'_>) -> Result<Vec<u8>> {
    let mut compiler = Compiler::new(room, &function.name);
    let mut scope = room.push(ContextKind::Function);
    compiler.stmt(&function.body, &mut scope)?;
    compiler.emit(Op::Return);
    debug_assert!(compiler.loops.is_empty() && compiler.inlining.is_empty());

    let bytes = bytecode::encode(&function.name, &compiler.ops)?;
    debug!(
        "compiled `{}`: {} ops, {} bytes, {} locals",
        function.name,
        compiler.ops.len(),
        bytes.len(),
        compiler.next_local
    );
    Ok(bytes)
}

#[derive(Default)]
struct LoopJumps {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// An inlined body being expanded; its `return`s jump past the body.
struct InlineFrame {
    name: String,
    returns: Vec<usize>,
}

struct Compiler<'r> {
    room: &'r Context<'r>,
    function: String,
    ops: Vec<Op>,
    next_local: usize,
    line: usize,
    loops: Vec<LoopJumps>,
    inlining: Vec<InlineFrame>,
}

impl<'r> Compiler<'r> {
    fn new(room: &'r Context<'r>, function: &str) -> Self {
        Self {
            room,
            function: function.to_string(),
            ops: Vec::new(),
            next_local: 0,
            line: 0,
            loops: Vec::new(),
            inlining: Vec::new(),
        }
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.ops[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) => *t = target,
            other => unreachable!("patching a non-jump instruction {other:?}"),
        }
    }

    fn alloc_local(&mut self) -> Result<u8> {
        let slot =
            u8::try_from(self.next_local).map_err(|_| CompileError::TooManyLocals(self.function.clone()))?;
        self.next_local += 1;
        Ok(slot)
    }

    fn invalid(&self, message: impl Into<String>) -> CompileError {
        CompileError::InvalidStatement {
            function: self.function.clone(),
            line: self.line,
            message: message.into(),
        }
    }

    fn unresolved(&self, name: &str) -> CompileError {
        CompileError::Symbol {
            function: self.function.clone(),
            name: name.to_string(),
            line: self.line,
        }
    }

    fn word(&self, value: i64) -> Result<i16> {
        i16::try_from(value).map_err(|_| CompileError::ValueOutOfRange {
            function: self.function.clone(),
            line: self.line,
            value,
        })
    }

    fn stmt(&mut self, stmt: &Stmt, scope: &mut Context<'_>) -> Result<()> {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let mut inner = scope.push(ContextKind::Block);
                for s in stmts {
                    self.stmt(s, &mut inner)?;
                }
            }
            StmtKind::Var { name, init } => {
                let slot = self.alloc_local()?;
                match init {
                    Some(init) => self.value(init, scope)?,
                    None => {
                        self.emit(Op::PushWord(0));
                    }
                }
                self.emit(Op::StoreLocal(slot));
                scope.declare_local(name.as_str(), slot);
            }
            StmtKind::Const { name, value } => {
                scope.declare_const(super::ast::Declaration::constant(name.as_str(), *value));
            }
            StmtKind::Assign { name, value } => {
                let store = match scope.resolve(name) {
                    Some(Symbol::Local(slot)) => Op::StoreLocal(slot),
                    Some(Symbol::Global(id)) => Op::StoreGlobal(id),
                    Some(_) => return Err(self.invalid(format!("can't assign to `{name}`"))),
                    None => return Err(self.unresolved(name)),
                };
                self.value(value, scope)?;
                self.emit(store);
            }
            StmtKind::Expr(expr) => {
                if self.expr(expr, scope)? {
                    self.emit(Op::Pop);
                }
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.value(cond, scope)?;
                let skip_then = self.emit(Op::JumpIfFalse(UNPATCHED));
                self.branch(then, scope)?;
                match otherwise {
                    Some(otherwise) => {
                        let skip_else = self.emit(Op::Jump(UNPATCHED));
                        let else_start = self.here();
                        self.patch(skip_then, else_start);
                        self.branch(otherwise, scope)?;
                        let end = self.here();
                        self.patch(skip_else, end);
                    }
                    None => {
                        let end = self.here();
                        self.patch(skip_then, end);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                let start = self.here();
                self.value(cond, scope)?;
                let exit = self.emit(Op::JumpIfFalse(UNPATCHED));
                self.loop_body(body, scope, start, Some(exit))?;
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let mut outer = scope.push(ContextKind::Block);
                if let Some(init) = init {
                    self.stmt(init, &mut outer)?;
                }
                let start = self.here();
                let exit = match cond {
                    Some(cond) => {
                        self.value(cond, &outer)?;
                        Some(self.emit(Op::JumpIfFalse(UNPATCHED)))
                    }
                    None => None,
                };

                self.loops.push(LoopJumps::default());
                {
                    let mut inner = outer.push(ContextKind::Loop);
                    self.stmt(body, &mut inner)?;
                }
                let jumps = self.pop_loop();
                let continue_at = self.here();
                if let Some(step) = step {
                    self.stmt(step, &mut outer)?;
                }
                self.emit(Op::Jump(start));
                self.close_loop(jumps, exit, continue_at);
            }
            StmtKind::Break | StmtKind::Continue => {
                if !scope.in_loop() {
                    let what = if stmt.kind == StmtKind::Break { "break" } else { "continue" };
                    return Err(self.invalid(format!("`{what}` outside of a loop")));
                }
                let jump = self.emit(Op::Jump(UNPATCHED));
                if let Some(jumps) = self.loops.last_mut() {
                    match stmt.kind {
                        StmtKind::Break => jumps.breaks.push(jump),
                        _ => jumps.continues.push(jump),
                    }
                }
            }
            StmtKind::Return => {
                if self.inlining.is_empty() {
                    self.emit(Op::Return);
                } else {
                    let jump = self.emit(Op::Jump(UNPATCHED));
                    if let Some(frame) = self.inlining.last_mut() {
                        frame.returns.push(jump);
                    }
                }
            }
        }
        Ok(())
    }

    /// Branches of an `if` get their own scope even without braces.
    fn branch(&mut self, stmt: &Stmt, scope: &Context<'_>) -> Result<()> {
        let mut inner = scope.push(ContextKind::Block);
        self.stmt(stmt, &mut inner)
    }

    fn loop_body(
        &mut self,
        body: &Stmt,
        scope: &Context<'_>,
        start: usize,
        exit: Option<usize>,
    ) -> Result<()> {
        self.loops.push(LoopJumps::default());
        {
            let mut inner = scope.push(ContextKind::Loop);
            self.stmt(body, &mut inner)?;
        }
        let jumps = self.pop_loop();
        self.emit(Op::Jump(start));
        self.close_loop(jumps, exit, start);
        Ok(())
    }

    fn pop_loop(&mut self) -> LoopJumps {
        self.loops.pop().unwrap_or_default()
    }

    /// Points the exit test and `break`s past the loop, `continue`s at `continue_at`.
    fn close_loop(&mut self, jumps: LoopJumps, exit: Option<usize>, continue_at: usize) {
        let end = self.here();
        for at in exit.into_iter().chain(jumps.breaks) {
            self.patch(at, end);
        }
        for at in jumps.continues {
            self.patch(at, continue_at);
        }
    }

    /// Compiles an operand, which must leave a value.
    fn value(&mut self, expr: &Expr, scope: &Context<'_>) -> Result<()> {
        if self.expr(expr, scope)? {
            return Ok(());
        }
        let name = match expr {
            Expr::Call { name, .. } => name.clone(),
            _ => String::new(),
        };
        Err(CompileError::VoidValue {
            function: self.function.clone(),
            line: self.line,
            name,
        })
    }

    /// Returns whether a value was left on the stack.
    fn expr(&mut self, expr: &Expr, scope: &Context<'_>) -> Result<bool> {
        match expr {
            Expr::Int(v) => {
                let v = self.word((*v).into())?;
                self.emit(Op::PushWord(v));
            }
            Expr::Str(s) => {
                self.emit(Op::PushString(s.clone()));
            }
            Expr::Ident(name) => match scope.resolve(name) {
                Some(Symbol::Const(v)) => {
                    let v = self.word(v.into())?;
                    self.emit(Op::PushWord(v));
                }
                Some(Symbol::Local(slot)) => {
                    self.emit(Op::LoadLocal(slot));
                }
                Some(Symbol::Global(id)) => {
                    self.emit(Op::LoadGlobal(id));
                }
                Some(Symbol::Function(_) | Symbol::Builtin(_)) => {
                    return Err(self.invalid(format!("`{name}` is a function, call it with `{name}()`")));
                }
                None => return Err(self.unresolved(name)),
            },
            Expr::Call { name, args } => return self.call(name, args, scope),
            Expr::Unary(op, operand) => {
                self.value(operand, scope)?;
                self.emit(match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                });
            }
            Expr::Binary(op, lhs, rhs) => {
                self.value(lhs, scope)?;
                self.value(rhs, scope)?;
                self.emit(Op::Binary(*op));
            }
        }
        Ok(true)
    }

    fn call(&mut self, name: &str, args: &[Expr], scope: &Context<'_>) -> Result<bool> {
        let arity_error = |expected: usize| CompileError::Arity {
            function: self.function.clone(),
            line: self.line,
            name: name.to_string(),
            expected,
            found: args.len(),
        };

        match scope.resolve(name) {
            Some(Symbol::Builtin(builtin)) => {
                if args.len() != builtin.arity {
                    return Err(arity_error(builtin.arity));
                }
                for arg in args {
                    self.value(arg, scope)?;
                }
                self.emit(Op::CallBuiltin {
                    id: builtin.id,
                    argc: args.len() as u8,
                });
                Ok(builtin.returns)
            }
            Some(Symbol::Function(function)) => {
                if !args.is_empty() {
                    return Err(arity_error(0));
                }
                if function.is_inlined() {
                    self.inline(function)?;
                    return Ok(false);
                }
                match function.id {
                    Some(id) => {
                        self.emit(Op::StartScript(id));
                        Ok(false)
                    }
                    None => Err(self.invalid(format!("`{name}` has no script number"))),
                }
            }
            Some(_) => Err(self.invalid(format!("`{name}` is not a function"))),
            None => Err(self.unresolved(name)),
        }
    }

    /// Expands an inlined function in place. Its body sees the room scope,
    /// not the caller's locals, and shares the caller's local frame.
    fn inline(&mut self, function: &Function) -> Result<()> {
        if self.inlining.iter().any(|f| f.name == function.name) {
            return Err(CompileError::RecursiveInline(function.name.clone()));
        }
        let call_line = self.line;
        self.inlining.push(InlineFrame {
            name: function.name.clone(),
            returns: Vec::new(),
        });

        let room = self.room;
        let mut scope = room.push(ContextKind::Function);
        self.stmt(&function.body, &mut scope)?;

        if let Some(frame) = self.inlining.pop() {
            let end = self.here();
            for at in frame.returns {
                self.patch(at, end);
            }
        }
        self.line = call_line;
        Ok(())
    }
}
