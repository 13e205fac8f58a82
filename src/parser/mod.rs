//! Component 2 – reads a game directory into `RawGame`.
//!
//! ```text
//! game.json                          {"rooms": [...]}
//! rooms/<room>/room.json             background, masks, palette, boxes
//! rooms/<room>/objects/objects.json  optional
//! rooms/<room>/costumes/costumes.json optional
//! rooms/<room>/scripts/scripts.json  optional, one `<name>.sgc` per entry
//! ```
//!
//! Image and mask files are resolved relative to the descriptor naming them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::model::{
    Anim, Bitmap, Color, Costume, Cycle, Image, Map, Object, Palette, RawGame, RoomSources, ScriptSource,
    WalkBox, ZPlane,
};

pub const SCRIPT_EXTENSION: &str = "sgc";

#[derive(Debug, Deserialize)]
pub struct GameDescriptor {
    pub rooms: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomDescriptor {
    pub background: String,
    #[serde(default)]
    pub zplanes: Vec<String>,
    #[serde(default)]
    pub palette: PaletteDescriptor,
    #[serde(default)]
    pub boxes: Vec<BoxDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaletteDescriptor {
    #[serde(default)]
    pub colors: Vec<[u8; 3]>,
    #[serde(default)]
    pub cycles: Vec<CycleDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct CycleDescriptor {
    pub name: String,
    pub start: u8,
    pub end: u8,
    pub delay: u16,
}

#[derive(Debug, Deserialize)]
pub struct BoxDescriptor {
    pub name: String,
    pub corners: [[i16; 2]; 4],
    #[serde(default)]
    pub flags: u8,
    #[serde(default = "full_scale")]
    pub scale: u8,
}

fn full_scale() -> u8 {
    255
}

#[derive(Debug, Deserialize)]
pub struct ObjectManifest {
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectDescriptor {
    pub id: u16,
    #[serde(default)]
    pub x: i16,
    #[serde(default)]
    pub y: i16,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostumeManifest {
    pub costumes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostumeDescriptor {
    pub id: u16,
    #[serde(default)]
    pub colors: Vec<[u8; 3]>,
    #[serde(default)]
    pub frames: Vec<String>,
    #[serde(default)]
    pub anims: Vec<AnimDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct AnimDescriptor {
    pub name: String,
    pub frames: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptManifest {
    pub scripts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageDescriptor {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub colors: Vec<[u8; 3]>,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct MaskDescriptor {
    pub width: u16,
    pub height: u16,
    pub rows: Vec<String>,
}

/// Loads `game.json` and every room it lists, in order.
pub fn load_game(dir: &Path) -> Result<RawGame> {
    let game: GameDescriptor = read_json(&dir.join("game.json"))?;
    info!("Found {} room(s)", game.rooms.len());

    let rooms = game
        .rooms
        .iter()
        .map(|name| load_room(&dir.join("rooms").join(name), name))
        .collect::<Result<Vec<_>>>()?;
    Ok(RawGame { rooms })
}

pub fn load_room(dir: &Path, name: &str) -> Result<RoomSources> {
    info!("Loading room `{name}`...");
    let room: RoomDescriptor = read_json(&dir.join("room.json"))?;

    let background = load_image(&dir.join(&room.background))?;
    let zplanes = room
        .zplanes
        .iter()
        .map(|file| load_mask(&dir.join(file), &background))
        .collect::<Result<Vec<_>>>()?;

    let cycles = room
        .palette
        .cycles
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let id = u8::try_from(i + 1).map_err(|_| anyhow!("room `{name}` has too many cycles"))?;
            Ok(Cycle {
                id,
                name: c.name,
                start: c.start,
                end: c.end,
                delay: c.delay,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let palette = Palette::new(colors(room.palette.colors), cycles);

    let boxes = room
        .boxes
        .into_iter()
        .enumerate()
        .map(|(i, b)| {
            let id = u8::try_from(i).map_err(|_| anyhow!("room `{name}` has too many boxes"))?;
            Ok(WalkBox {
                id,
                name: b.name,
                corners: b.corners.map(|[x, y]| (x, y)),
                flags: b.flags,
                scale: b.scale,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let objects = load_objects(&dir.join("objects"))?;
    let costumes = load_costumes(&dir.join("costumes"))?;
    let scripts = load_scripts(&dir.join("scripts"))?;
    debug!(
        "Room `{name}`: {} object(s), {} costume(s), {} script(s)",
        objects.len(),
        costumes.len(),
        scripts.len()
    );

    Ok(RoomSources {
        name: name.to_string(),
        background,
        zplanes,
        palette,
        objects,
        map: Map { boxes },
        costumes,
        scripts,
    })
}

fn load_objects(dir: &Path) -> Result<Vec<Object>> {
    let Some(manifest) = read_manifest::<ObjectManifest>(&dir.join("objects.json"))? else {
        return Ok(Vec::new());
    };
    manifest
        .objects
        .into_iter()
        .map(|name| {
            let obj_dir = dir.join(&name);
            let desc: ObjectDescriptor = read_json(&obj_dir.join("object.json"))?;
            let images = desc
                .images
                .iter()
                .map(|file| load_image(&obj_dir.join(file)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Object {
                id: desc.id,
                name,
                x: desc.x,
                y: desc.y,
                images,
                verb: None,
            })
        })
        .collect()
}

fn load_costumes(dir: &Path) -> Result<Vec<Costume>> {
    let Some(manifest) = read_manifest::<CostumeManifest>(&dir.join("costumes.json"))? else {
        return Ok(Vec::new());
    };
    manifest
        .costumes
        .into_iter()
        .map(|name| {
            let cost_dir = dir.join(&name);
            let desc: CostumeDescriptor = read_json(&cost_dir.join("costume.json"))?;
            let frames = desc
                .frames
                .iter()
                .map(|file| load_image(&cost_dir.join(file)))
                .collect::<Result<Vec<_>>>()?;
            let anims = desc
                .anims
                .into_iter()
                .enumerate()
                .map(|(i, a)| {
                    if let Some(bad) = a.frames.iter().find(|&&f| f as usize >= frames.len()) {
                        return Err(anyhow!("costume `{name}`: anim `{}` uses missing frame {bad}", a.name));
                    }
                    let id = u8::try_from(i).map_err(|_| anyhow!("costume `{name}` has too many anims"))?;
                    Ok(Anim {
                        id,
                        name: a.name,
                        frames: a.frames,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Costume {
                id: desc.id,
                name,
                colors: colors(desc.colors),
                frames,
                anims,
                palette_base: 0,
            })
        })
        .collect()
}

fn load_scripts(dir: &Path) -> Result<Vec<ScriptSource>> {
    let Some(manifest) = read_manifest::<ScriptManifest>(&dir.join("scripts.json"))? else {
        return Ok(Vec::new());
    };
    manifest
        .scripts
        .into_iter()
        .map(|name| {
            let path = dir.join(&name).with_extension(SCRIPT_EXTENSION);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Reading {}", path.display()))?;
            Ok(ScriptSource { name, text })
        })
        .collect()
}

fn load_image(path: &Path) -> Result<Image> {
    let desc: ImageDescriptor = read_json(path)?;
    Image::new(desc.width, desc.height, desc.pixels, colors(desc.colors))
        .with_context(|| format!("Invalid image {}", path.display()))
}

/// Masks must cover the background exactly.
fn load_mask(path: &Path, background: &Image) -> Result<ZPlane> {
    let desc: MaskDescriptor = read_json(path)?;
    if (desc.width, desc.height) != (background.width, background.height) {
        return Err(anyhow!(
            "mask {} is {}x{}, the background is {}x{}",
            path.display(),
            desc.width,
            desc.height,
            background.width,
            background.height
        ));
    }
    let plane = ZPlane::from_rows(&desc.rows).with_context(|| format!("Invalid mask {}", path.display()))?;
    if (plane.width(), plane.height()) != (desc.width, desc.height) {
        return Err(anyhow!("mask {} rows don't match its declared size", path.display()));
    }
    Ok(plane)
}

fn colors(raw: Vec<[u8; 3]>) -> Vec<Color> {
    raw.into_iter().map(Color::from).collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Parsing {}", path.display()))
}

/// `None` when the manifest doesn't exist.
fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("No {}", path.display());
        return Ok(None);
    }
    read_json(path).map(Some)
}
