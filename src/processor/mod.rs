//! Component 3 – the functional core.
//!
//! Scripts are parsed against each room's symbols and lowered to bytecode;
//! everything else in a room is carried through for the writer.
pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod lexer;
pub mod registry;
pub mod room;
pub mod script_parser;

use anyhow::{Context, Result};
use log::warn;

use crate::model::{ProcessedGame, RawGame};
use room::Session;

/// Runs every processing pass and returns a read-only structure for writers.
pub fn run(raw: RawGame) -> Result<ProcessedGame> {
    let mut session = Session::new();
    let mut rooms = Vec::with_capacity(raw.rooms.len());

    for sources in raw.rooms {
        let name = sources.name.clone();
        let room = session
            .compile_room(sources)
            .with_context(|| format!("Failed to compile room `{name}`"))?;
        if !room.warnings.is_empty() {
            warn!("Room `{name}` compiled with {} warning(s)", room.warnings.len());
        }
        rooms.push(room);
    }

    Ok(ProcessedGame { rooms })
}
