//! Symbols the engine provides to every room: constants, global variables
//! and builtin functions. All their IDs stay below `MIN_LOCAL_ID`.

pub const CONSTANTS: &[(&str, i32)] = &[
    ("FALSE", 0),
    ("TRUE", 1),
    ("VERB_WALK_TO", 1),
    ("VERB_LOOK_AT", 2),
    ("VERB_PICK_UP", 3),
    ("VERB_USE", 4),
    ("VERB_OPEN", 5),
    ("VERB_CLOSE", 6),
    ("VERB_PUSH", 7),
    ("VERB_PULL", 8),
    ("VERB_TALK_TO", 9),
    ("VERB_GIVE", 10),
    ("DIR_LEFT", 0),
    ("DIR_RIGHT", 1),
    ("DIR_DOWN", 2),
    ("DIR_UP", 3),
];

/// Engine variables scripts can read and write.
pub const GLOBALS: &[(&str, u16)] = &[
    ("ego", 1),
    ("verb", 2),
    ("room", 3),
    ("object", 4),
    ("timer", 5),
    ("result", 6),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub name: &'static str,
    pub id: u8,
    pub arity: usize,
    /// Whether the call leaves a value on the stack.
    pub returns: bool,
}

const fn builtin(name: &'static str, id: u8, arity: usize, returns: bool) -> Builtin {
    Builtin {
        name,
        id,
        arity,
        returns,
    }
}

pub const BUILTINS: &[Builtin] = &[
    builtin("print", 1, 1, false),
    builtin("say", 2, 2, false),
    builtin("delay", 3, 1, false),
    builtin("loadRoom", 4, 1, false),
    builtin("putActor", 5, 3, false),
    builtin("walkActor", 6, 3, false),
    builtin("setActorCostume", 7, 2, false),
    builtin("animateActor", 8, 2, false),
    builtin("setObjectState", 9, 2, false),
    builtin("getObjectState", 10, 1, true),
    builtin("cyclePalette", 11, 1, false),
    builtin("random", 12, 1, true),
    builtin("actorInBox", 13, 2, true),
];

pub fn global(name: &str) -> Option<u16> {
    GLOBALS.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
}

pub fn builtin_named(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}
