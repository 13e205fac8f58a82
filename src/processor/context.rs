//! Lexical scopes used while compiling a room.
//!
//! A scope only borrows its parent, so every nested compile step gets its
//! own `Context` value on the Rust stack. Dropping it is the "pop"; there is
//! no shared stack that could be left unbalanced.

use std::borrow::Cow;

use super::ast::{Declaration, Function};
use super::engine::{self, Builtin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Room,
    Function,
    Block,
    Loop,
}

/// What an identifier turned out to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol<'a> {
    Const(i32),
    Local(u8),
    Global(u16),
    Function(&'a Function),
    Builtin(&'static Builtin),
}

#[derive(Debug)]
pub struct Context<'a> {
    kind: ContextKind,
    declarations: Cow<'a, [Declaration]>,
    functions: &'a [Function],
    locals: Vec<(String, u8)>,
    parent: Option<&'a Context<'a>>,
}

impl<'a> Context<'a> {
    /// Outermost scope of a room: its registry and its free functions.
    pub fn room(declarations: &'a [Declaration], functions: &'a [Function]) -> Self {
        Self {
            kind: ContextKind::Room,
            declarations: Cow::Borrowed(declarations),
            functions,
            locals: Vec::new(),
            parent: None,
        }
    }

    /// Opens a nested scope.
    pub fn push<'b>(&'b self, kind: ContextKind) -> Context<'b> {
        Context {
            kind,
            declarations: Cow::Owned(Vec::new()),
            functions: &[],
            locals: Vec::new(),
            parent: Some(self),
        }
    }

    pub fn declare_const(&mut self, declaration: Declaration) {
        self.declarations.to_mut().push(declaration);
    }

    pub fn declare_local(&mut self, name: impl Into<String>, slot: u8) {
        self.locals.push((name.into(), slot));
    }

    /// Innermost match wins. Engine variables and builtins come last.
    pub fn resolve(&self, name: &str) -> Option<Symbol<'a>> {
        // later declarations in the same scope shadow earlier ones
        if let Some((_, slot)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Some(Symbol::Local(*slot));
        }
        if let Some(decl) = self.declarations.iter().rev().find(|d| d.name == name) {
            return Some(Symbol::Const(decl.value));
        }
        if let Some(function) = self.functions.iter().find(|f| f.name == name) {
            return Some(Symbol::Function(function));
        }
        match self.parent {
            Some(parent) => parent.resolve(name),
            None => engine::global(name)
                .map(Symbol::Global)
                .or_else(|| engine::builtin_named(name).map(Symbol::Builtin)),
        }
    }

    /// `break` and `continue` are legal when a loop encloses the current
    /// scope without crossing a function boundary.
    pub fn in_loop(&self) -> bool {
        match self.kind {
            ContextKind::Loop => true,
            ContextKind::Function | ContextKind::Room => false,
            ContextKind::Block => self.parent.is_some_and(|p| p.in_loop()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ast::FunctionKind;
    use crate::processor::ast::Stmt;

    #[test]
    fn test_shadowing() {
        let room_decls = vec![Declaration::constant("LIMIT", 10)];
        let room = Context::room(&room_decls, &[]);
        assert_eq!(room.resolve("LIMIT"), Some(Symbol::Const(10)));

        let mut function = room.push(ContextKind::Function);
        function.declare_const(Declaration::constant("LIMIT", 3));
        assert_eq!(function.resolve("LIMIT"), Some(Symbol::Const(3)));

        let mut block = function.push(ContextKind::Block);
        block.declare_local("LIMIT", 0);
        assert_eq!(block.resolve("LIMIT"), Some(Symbol::Local(0)));

        drop(block);
        assert_eq!(function.resolve("LIMIT"), Some(Symbol::Const(3)));
        assert_eq!(room.resolve("LIMIT"), Some(Symbol::Const(10)));
    }

    #[test]
    fn test_functions_and_engine_fallback() {
        let functions = vec![Function::new(
            FunctionKind::Normal,
            "open_door",
            Stmt::empty_block(),
            1,
        )];
        let room = Context::room(&[], &functions);
        let block = room.push(ContextKind::Function);

        assert!(matches!(block.resolve("open_door"), Some(Symbol::Function(f)) if f.name == "open_door"));
        assert_eq!(block.resolve("ego"), Some(Symbol::Global(1)));
        assert!(matches!(block.resolve("print"), Some(Symbol::Builtin(b)) if b.id == 1));
        assert_eq!(block.resolve("missing"), None);
    }

    #[test]
    fn test_loop_legality() {
        let room = Context::room(&[], &[]);
        let function = room.push(ContextKind::Function);
        assert!(!function.in_loop());

        let body = function.push(ContextKind::Loop);
        let nested = body.push(ContextKind::Block);
        assert!(nested.in_loop());

        // an inlined body reopens a function scope inside the loop
        let inlined = nested.push(ContextKind::Function);
        assert!(!inlined.push(ContextKind::Block).in_loop());
    }
}
