//! Turns the sources of one room into a compiled `Room`.

use std::collections::HashSet;

use log::{debug, error, info, warn};

use super::ast::{Declaration, Function};
use super::compiler::compile_function;
use super::context::Context;
use super::registry::Registry;
use super::script_parser::parse_script;
use crate::error::{CompileError, Warning};
use crate::model::{Color, Costume, Image, Map, Object, Palette, RoomSources, ScriptSource, ZPlane};

/// First script number handed to a room's local functions. Lower numbers
/// belong to the engine.
pub const MIN_LOCAL_ID: u16 = 200;

/// A room after parsing, binding and compilation.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: u8,
    pub name: String,
    pub background: Image,
    pub zplanes: Vec<ZPlane>,
    pub palette: Palette,
    pub objects: Vec<Object>,
    pub map: Map,
    pub costumes: Vec<Costume>,
    pub declarations: Vec<Declaration>,
    pub entry: Function,
    pub exit: Function,
    /// Free local functions in script order, inlined ones included.
    pub functions: Vec<Function>,
    pub warnings: Vec<Warning>,
}

/// Role of a parsed function inside its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Entry,
    Exit,
    /// Verb of the object at this index.
    Verb(usize),
    Free,
}

/// Entry, exit and verbs must be real scripts.
pub fn classify(function: &Function, objects: &[Object]) -> Result<Binding, CompileError> {
    let binding = match function.name.as_str() {
        "entry" => Binding::Entry,
        "exit" => Binding::Exit,
        name => objects
            .iter()
            .position(|o| o.verb_name() == name)
            .map_or(Binding::Free, Binding::Verb),
    };
    if binding != Binding::Free && function.is_inlined() {
        return Err(CompileError::ReservedFunction(function.name.clone()));
    }
    Ok(binding)
}

/// State shared by every room compiled in one run.
#[derive(Debug)]
pub struct Session {
    next_room_id: u8,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self { next_room_id: 1 }
    }

    fn take_room_id(&mut self) -> Result<u8, CompileError> {
        let id = self.next_room_id;
        if id == 0 {
            return Err(CompileError::TooManyRooms);
        }
        self.next_room_id = id.wrapping_add(1);
        Ok(id)
    }

    pub fn compile_room(&mut self, sources: RoomSources) -> Result<Room, CompileError> {
        let RoomSources {
            name,
            background,
            zplanes,
            mut palette,
            mut objects,
            map,
            mut costumes,
            scripts,
        } = sources;

        let id = self.take_room_id()?;
        info!("Room `{name}` gets id {id}");

        let mut warnings = Vec::new();
        let mut registry = Registry::build(&palette, &objects, &costumes, &map)?;

        if let Some(w) = merge_local_colors(&mut palette, &mut objects, &mut costumes) {
            report(&name, w, &mut warnings);
        }

        info!("Parsing room `{name}`...");
        let bound = bind_scripts(&name, &scripts, &mut objects, &mut warnings)?;
        for declaration in bound.declarations {
            registry.insert(declaration)?;
        }

        let Bound {
            mut entry,
            mut exit,
            mut functions,
            ..
        } = bound;

        info!("Compiling room `{name}`...");
        compile_all(&registry, &mut functions, &mut entry, &mut exit, &mut objects)?;

        Ok(Room {
            id,
            name,
            background,
            zplanes,
            palette,
            objects,
            map,
            costumes,
            declarations: registry.into_declarations(),
            entry,
            exit,
            functions,
            warnings,
        })
    }
}

/// Appends object and costume colors after the room's own colors.
///
/// Only the first image of an object brings colors, but every image of that
/// object is told where they start.
pub fn merge_local_colors(
    palette: &mut Palette,
    objects: &mut [Object],
    costumes: &mut [Costume],
) -> Option<Warning> {
    let original = palette.color_count();
    let mut local: Vec<Color> = Vec::new();

    for object in objects.iter_mut() {
        let Some(first) = object.images.first() else {
            continue;
        };
        let colors = first.colors.clone();
        let base = (original + local.len()) as u16;
        for image in &mut object.images {
            image.palette_base = base;
        }
        local.extend(colors);
    }

    for costume in costumes.iter_mut() {
        costume.palette_base = (original + local.len()) as u16;
        local.extend_from_slice(&costume.colors);
    }

    let required = original + local.len();
    let overflow = (required > Palette::MAX_COLORS).then(|| Warning::PaletteOverflow {
        required,
        capacity: Palette::MAX_COLORS,
    });

    palette.resize(required);
    for (i, color) in local.into_iter().enumerate() {
        palette.set_color(original + i, color);
    }
    overflow
}

/// Log line of a warning raised while assembling `room`.
fn room_message(room: &str, warning: &Warning) -> String {
    format!("room `{room}`: {warning}")
}

/// Logs `warning` and keeps it for the compiled room.
fn report(room: &str, warning: Warning, warnings: &mut Vec<Warning>) {
    match warning {
        Warning::PaletteOverflow { .. } => error!("{}", room_message(room, &warning)),
        _ => warn!("{}", room_message(room, &warning)),
    }
    warnings.push(warning);
}

struct Bound {
    declarations: Vec<Declaration>,
    entry: Function,
    exit: Function,
    functions: Vec<Function>,
}

/// Parses every script of the room and gives each function its place.
fn bind_scripts(
    room: &str,
    scripts: &[ScriptSource],
    objects: &mut [Object],
    warnings: &mut Vec<Warning>,
) -> Result<Bound, CompileError> {
    if scripts.is_empty() {
        report(room, Warning::MissingResource("scripts".into()), warnings);
    }

    let mut declarations = Vec::new();
    let mut entry = None;
    let mut exit = None;
    let mut functions = Vec::new();
    let mut seen = HashSet::new();
    let mut next_id = MIN_LOCAL_ID;

    for script in scripts {
        debug!("Parsing `{}`...", script.name);
        let parsed = parse_script(&script.text).map_err(|source| CompileError::Syntax {
            script: script.name.clone(),
            source,
        })?;
        declarations.extend(parsed.declarations);

        for mut function in parsed.functions {
            if !seen.insert(function.name.clone()) {
                return Err(CompileError::DuplicateSymbol(function.name));
            }
            match classify(&function, objects)? {
                Binding::Entry => entry = Some(function),
                Binding::Exit => exit = Some(function),
                Binding::Verb(i) => {
                    debug!("Attaching verb to object `{}`", objects[i].name);
                    objects[i].verb = Some(function);
                }
                Binding::Free => {
                    if !function.is_inlined() {
                        function.id = Some(next_id);
                        next_id += 1;
                    }
                    functions.push(function);
                }
            }
        }
    }

    let mut stub = |function: &str| {
        report(room, Warning::MissingFunction(function.into()), warnings);
        Function::stub(function)
    };
    let entry = entry.unwrap_or_else(|| stub("entry"));
    let exit = exit.unwrap_or_else(|| stub("exit"));

    for object in objects.iter_mut().filter(|o| o.verb.is_none()) {
        debug!("Object `{}` has no verb, using an empty one", object.name);
        object.verb = Some(Function::stub(object.verb_name()));
    }

    Ok(Bound {
        declarations,
        entry,
        exit,
        functions,
    })
}

/// Local functions, then entry and exit, then object verbs, all under one
/// room scope.
fn compile_all(
    registry: &Registry,
    functions: &mut [Function],
    entry: &mut Function,
    exit: &mut Function,
    objects: &mut [Object],
) -> Result<(), CompileError> {
    let (local, entry_code, exit_code, verbs) = {
        let room = Context::room(registry.declarations(), functions);
        let local = functions
            .iter()
            .filter(|f| !f.is_inlined())
            .map(|f| compile_function(f, &room))
            .collect::<Result<Vec<_>, _>>()?;
        let entry_code = compile_function(entry, &room)?;
        let exit_code = compile_function(exit, &room)?;
        let verbs = objects
            .iter()
            .filter_map(|o| o.verb.as_ref())
            .map(|f| compile_function(f, &room))
            .collect::<Result<Vec<_>, _>>()?;
        (local, entry_code, exit_code, verbs)
    };

    let targets = functions.iter_mut().filter(|f| !f.is_inlined());
    for (function, code) in targets.zip(local) {
        function.bytecode = Some(code);
    }
    entry.bytecode = Some(entry_code);
    exit.bytecode = Some(exit_code);
    let verb_slots = objects.iter_mut().filter_map(|o| o.verb.as_mut());
    for (verb, code) in verb_slots.zip(verbs) {
        verb.bytecode = Some(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cycle;
    use crate::processor::ast::{FunctionKind, Stmt};

    fn image(colors: usize) -> Image {
        Image::new(1, 1, vec![0], vec![Color::from([7, 7, 7]); colors]).unwrap()
    }

    fn object(id: u16, name: &str, images: Vec<Image>) -> Object {
        Object {
            id,
            name: name.into(),
            x: 0,
            y: 0,
            images,
            verb: None,
        }
    }

    fn costume(id: u16, name: &str, colors: usize) -> Costume {
        Costume {
            id,
            name: name.into(),
            colors: vec![Color::from([1, 1, 1]); colors],
            frames: vec![],
            anims: vec![],
            palette_base: 0,
        }
    }

    fn sources(objects: Vec<Object>, scripts: &[(&str, &str)]) -> RoomSources {
        RoomSources {
            name: "test".into(),
            background: image(0),
            zplanes: vec![],
            palette: Palette::new(vec![Color::default(); 16], vec![]),
            objects,
            map: Map::default(),
            costumes: vec![],
            scripts: scripts
                .iter()
                .map(|(name, text)| ScriptSource {
                    name: name.to_string(),
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_verbs_and_entry_are_bound() {
        let objects = vec![object(10, "door", vec![]), object(11, "window", vec![])];
        let src = r#"
            function door_verb() { }
            function window_verb() { }
            function entry() { }
        "#;
        let room = Session::new()
            .compile_room(sources(objects, &[("main", src)]))
            .unwrap();

        assert!(room.functions.is_empty());
        assert_eq!(room.entry.name, "entry");
        assert_eq!(room.entry.line, 4);
        assert_eq!(room.exit.line, 0, "exit is synthesized");
        for (object, name) in room.objects.iter().zip(["door_verb", "window_verb"]) {
            let verb = object.verb.as_ref().unwrap();
            assert_eq!(verb.name, name);
            assert!(verb.line > 0);
            assert_eq!(verb.bytecode, Some(vec![0x40]));
        }
        assert_eq!(room.warnings, vec![Warning::MissingFunction("exit".into())]);
    }

    #[test]
    fn test_local_ids_follow_script_order() {
        let scripts = [
            ("a", "function one() { } inline function helper() { } function two() { }"),
            ("b", "function three() { two(); }"),
        ];
        let room = Session::new().compile_room(sources(vec![], &scripts)).unwrap();

        let ids: Vec<_> = room.functions.iter().map(|f| (f.name.as_str(), f.id)).collect();
        assert_eq!(
            ids,
            vec![
                ("one", Some(200)),
                ("helper", None),
                ("two", Some(201)),
                ("three", Some(202)),
            ]
        );
        assert_eq!(room.functions[1].bytecode, None, "inlined functions aren't compiled");
        assert_eq!(room.functions[3].bytecode, Some(vec![0x30, 201, 0, 0x40]));
    }

    #[test]
    fn test_no_scripts_synthesizes_everything() {
        let objects = vec![object(10, "door", vec![])];
        let room = Session::new().compile_room(sources(objects, &[])).unwrap();

        assert_eq!(
            room.warnings,
            vec![
                Warning::MissingResource("scripts".into()),
                Warning::MissingFunction("entry".into()),
                Warning::MissingFunction("exit".into()),
            ]
        );
        assert_eq!(room.entry.bytecode, Some(vec![0x40]));
        assert_eq!(room.exit.bytecode, Some(vec![0x40]));
        let verb = room.objects[0].verb.as_ref().unwrap();
        assert_eq!(verb.name, "door_verb");
        assert_eq!(verb.kind, FunctionKind::Normal);
        assert_eq!(verb.bytecode, Some(vec![0x40]));
    }

    #[test]
    fn test_reserved_functions_cant_be_inlined() {
        let objects = vec![object(10, "door", vec![])];
        for name in ["entry", "exit", "door_verb"] {
            let src = format!("inline function {name}() {{ }}");
            let err = Session::new()
                .compile_room(sources(objects.clone(), &[("main", &src)]))
                .unwrap_err();
            assert_eq!(err, CompileError::ReservedFunction(name.into()));
        }
    }

    #[test]
    fn test_first_object_match_wins() {
        let objects = vec![object(1, "door", vec![])];
        let f = Function::new(FunctionKind::Normal, "door_verb", Stmt::empty_block(), 1);
        assert_eq!(classify(&f, &objects), Ok(Binding::Verb(0)));
        let f = Function::stub("doorverb");
        assert_eq!(classify(&f, &objects), Ok(Binding::Free));
    }

    #[test]
    fn test_room_ids_are_sequential() {
        let mut session = Session::new();
        let first = session.compile_room(sources(vec![], &[])).unwrap();
        let second = session.compile_room(sources(vec![], &[])).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(Session::new().compile_room(sources(vec![], &[])).unwrap().id, 1);
    }

    #[test]
    fn test_errors_abort_the_room() {
        let test_cases = vec![
            ("function entry() { oops(); }", "unresolved symbol `oops`"),
            ("function entry() {", "script `main`, line 1"),
            ("function f() { } function f() { }", "`f` is declared more than once"),
            ("const TRUE = 3;", "`TRUE` is declared more than once"),
        ];
        for (src, message) in test_cases {
            let err = Session::new()
                .compile_room(sources(vec![], &[("main", src)]))
                .unwrap_err();
            assert!(err.to_string().contains(message), "source: {src}, got: {err}");
        }
    }

    #[test]
    fn test_script_constants_are_visible_everywhere() {
        let scripts = [
            ("consts", "const OPEN = 1;"),
            ("main", "function entry() { setObjectState(door, OPEN); }"),
        ];
        let objects = vec![object(10, "door", vec![])];
        let room = Session::new().compile_room(sources(objects, &scripts)).unwrap();
        assert_eq!(
            room.entry.bytecode,
            Some(vec![0x01, 10, 0, 0x01, 1, 0, 0x31, 9, 2, 0x40])
        );
        assert!(room.declarations.iter().any(|d| d.name == "OPEN"));
    }

    #[test]
    fn test_warnings_name_their_room() {
        let mut warnings = Vec::new();
        report("attic", Warning::MissingFunction("exit".into()), &mut warnings);
        assert_eq!(warnings, vec![Warning::MissingFunction("exit".into())]);
        assert_eq!(
            room_message("attic", &warnings[0]),
            "room `attic`: couldn't find the `exit` function, using an empty one"
        );
        let overflow = Warning::PaletteOverflow {
            required: 261,
            capacity: 256,
        };
        assert_eq!(
            room_message("attic", &overflow),
            "room `attic`: the local palette needs 261 colors, only 256 fit"
        );
    }

    #[test]
    fn test_local_colors_are_merged() {
        let mut palette = Palette::new(vec![Color::default(); 10], vec![]);
        let mut objects = vec![
            object(1, "lamp", vec![image(2), image(3)]),
            object(2, "ghost", vec![]),
            object(3, "rug", vec![image(4)]),
        ];
        let mut costumes = vec![costume(1, "bob", 5)];

        let overflow = merge_local_colors(&mut palette, &mut objects, &mut costumes);
        assert_eq!(overflow, None);

        // lamp: only its first image contributes, both images get base 10
        assert_eq!(objects[0].images[0].palette_base, 10);
        assert_eq!(objects[0].images[1].palette_base, 10);
        assert_eq!(objects[2].images[0].palette_base, 12);
        assert_eq!(costumes[0].palette_base, 16);
        assert_eq!(palette.color_count(), 21);
        assert_eq!(palette.colors()[10], Color::from([7, 7, 7]));
        assert_eq!(palette.colors()[16], Color::from([1, 1, 1]));
    }

    #[test]
    fn test_palette_overflow_is_not_fatal() {
        let mut src = sources(vec![], &[]);
        src.palette = Palette::new(
            vec![Color::default(); 250],
            vec![Cycle {
                id: 1,
                name: "fire".into(),
                start: 0,
                end: 3,
                delay: 10,
            }],
        );
        src.costumes = vec![costume(1, "bob", 11)];

        let room = Session::new().compile_room(src).unwrap();
        assert_eq!(
            room.warnings[0],
            Warning::PaletteOverflow {
                required: 261,
                capacity: 256,
            }
        );
        assert_eq!(room.palette.color_count(), 261);
    }
}
