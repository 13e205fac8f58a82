//! Errors raised while compiling a room and while packing blocks.
//!
//! Fatal conditions are `Err` values; the non-fatal ones are `Warning`s that
//! end up on the compiled room.

use thiserror::Error;

/// Malformed script source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Anything that aborts the compilation of a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("script `{script}`, {source}")]
    Syntax {
        script: String,
        #[source]
        source: SyntaxError,
    },

    #[error("function `{function}`, line {line}: unresolved symbol `{name}`")]
    Symbol {
        function: String,
        name: String,
        line: usize,
    },

    #[error("function `{0}` is reserved and can't be inlined")]
    ReservedFunction(String),

    #[error("symbol `{0}` is declared more than once")]
    DuplicateSymbol(String),

    #[error("function `{function}`, line {line}: {message}")]
    InvalidStatement {
        function: String,
        line: usize,
        message: String,
    },

    #[error("function `{function}`, line {line}: `{name}` expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("function `{function}`, line {line}: `{name}` doesn't return a value")]
    VoidValue {
        function: String,
        line: usize,
        name: String,
    },

    #[error("function `{function}`, line {line}: {value} doesn't fit in a word")]
    ValueOutOfRange {
        function: String,
        line: usize,
        value: i64,
    },

    #[error("function `{0}` uses more than 256 local variables")]
    TooManyLocals(String),

    #[error("inlined function `{0}` ends up calling itself")]
    RecursiveInline(String),

    #[error("function `{0}` is too large, a jump doesn't fit in 16 bits")]
    FunctionTooLarge(String),

    #[error("no room IDs left, a game holds at most 255 rooms")]
    TooManyRooms,
}

/// Conditions that are reported but let the room compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("the local palette needs {required} colors, only {capacity} fit")]
    PaletteOverflow { required: usize, capacity: usize },

    #[error("room doesn't contain any {0}")]
    MissingResource(String),

    #[error("couldn't find the `{0}` function, using an empty one")]
    MissingFunction(String),
}

/// Failures of the block serializer.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block `{tag}`: offset {offset} doesn't fit in its offset table")]
    OffsetOverflow { tag: String, offset: usize },

    #[error("block `{tag}`: {size} bytes doesn't fit in 32 bits")]
    TooLarge { tag: String, size: usize },

    #[error("block `{tag}`: wrote {written} bytes, computed {expected}")]
    SizeMismatch {
        tag: String,
        expected: usize,
        written: usize,
    },

    #[error("block `{tag}`: {count} entries don't fit in its count field")]
    TooMany { tag: String, count: usize },

    #[error("index {0} can't be written as a two digit tag suffix")]
    TagIndex(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
