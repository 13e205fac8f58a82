//! Room-scoped table of named constants.

use std::collections::HashMap;

use log::debug;

use super::ast::Declaration;
use super::engine;
use crate::error::CompileError;
use crate::model::{Costume, Map, Object, Palette};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    declarations: Vec<Declaration>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails on a name that is already taken.
    pub fn insert(&mut self, declaration: Declaration) -> Result<(), CompileError> {
        if self.get(&declaration.name).is_some() {
            return Err(CompileError::DuplicateSymbol(declaration.name));
        }
        self.index
            .insert(declaration.name.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn into_declarations(self) -> Vec<Declaration> {
        self.declarations
    }

    /// Engine constants, then palette cycles, objects, costumes with their
    /// anims, and walk boxes. Scripts parse only after this is complete.
    pub fn build(
        palette: &Palette,
        objects: &[Object],
        costumes: &[Costume],
        map: &Map,
    ) -> Result<Self, CompileError> {
        let mut registry = Self::new();

        for (name, value) in engine::CONSTANTS {
            registry.insert(Declaration::constant(*name, *value))?;
        }

        debug!("Adding room local resource declarations...");
        for cycle in palette.cycles() {
            registry.insert(Declaration::constant(&cycle.name, cycle.id.into()))?;
        }
        for object in objects {
            registry.insert(Declaration::constant(&object.name, object.id.into()))?;
        }
        for costume in costumes {
            registry.insert(Declaration::constant(&costume.name, costume.id.into()))?;
            for anim in &costume.anims {
                registry.insert(Declaration::constant(&anim.name, anim.id.into()))?;
            }
        }
        for walk_box in &map.boxes {
            registry.insert(Declaration::constant(&walk_box.name, walk_box.id.into()))?;
        }

        Ok(registry)
    }
}
