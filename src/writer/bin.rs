//! Packs compiled rooms into the resource file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use super::block::{Block, Part, indexed_tag};
use super::zplane::zplane_block;
use crate::error::BlockError;
use crate::model::{Costume, Image, Object, Palette, ProcessedGame};
use crate::processor::ast::Function;
use crate::processor::room::Room;

/// Builds the whole file in memory, then writes it in one go.
pub fn emit(game: &ProcessedGame, path: &Path) -> Result<()> {
    let bytes = game_block(game)?
        .to_bytes()
        .with_context(|| "Serializing resource file")?;
    fs::write(path, &bytes).with_context(|| format!("Writing {}", path.display()))?;
    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn game_block(game: &ProcessedGame) -> Result<Block> {
    let mut lecf = Block::container(*b"LECF");
    for room in &game.rooms {
        let lflf = room_file(room).with_context(|| format!("Packing room `{}`", room.name))?;
        lecf.push_block(lflf);
    }
    Ok(lecf)
}

/// `LFLF`: the room itself followed by its costumes.
pub fn room_file(room: &Room) -> Result<Block, BlockError> {
    let mut lflf = Block::container(*b"LFLF");
    lflf.push_block(room_block(room)?);
    for costume in &room.costumes {
        lflf.push_block(costume_block(costume)?);
    }
    Ok(lflf)
}

pub fn room_block(room: &Room) -> Result<Block, BlockError> {
    debug!("Packing room `{}` ({})", room.name, room.id);
    let mut block = Block::container(*b"ROOM");

    let mut rmhd = Vec::new();
    put_u16(&mut rmhd, room.background.width);
    put_u16(&mut rmhd, room.background.height);
    put_u16(&mut rmhd, count("RMHD", room.objects.len())?);
    rmhd.push(room.id);
    rmhd.push(count("RMHD", room.zplanes.len())?);
    block.push_block(Block::leaf(*b"RMHD", rmhd));

    block.push_block(cycles_block(&room.palette));
    block.push_block(palette_block(&room.palette));

    let mut rmim = Block::container(*b"RMIM");
    rmim.push_block(Block::leaf(*b"IM00", room.background.pixels.clone()));
    for (i, zplane) in room.zplanes.iter().enumerate() {
        rmim.push_block(zplane_block(zplane, i)?);
    }
    block.push_block(rmim);

    for object in &room.objects {
        block.push_block(object_image_block(object)?);
    }
    for object in &room.objects {
        block.push_block(object_code_block(object));
    }

    block.push_block(Block::leaf(*b"EXCD", code(&room.exit)));
    block.push_block(Block::leaf(*b"ENCD", code(&room.entry)));

    for function in room.functions.iter().filter(|f| !f.is_inlined()) {
        let Some(id) = function.id else { continue };
        let mut lscr = Vec::new();
        put_u16(&mut lscr, id);
        lscr.extend_from_slice(&code(function));
        block.push_block(Block::leaf(*b"LSCR", lscr));
    }

    let mut boxd = Vec::new();
    for walk_box in &room.map.boxes {
        for (x, y) in walk_box.corners {
            put_i16(&mut boxd, x);
            put_i16(&mut boxd, y);
        }
        boxd.push(walk_box.flags);
        boxd.push(walk_box.scale);
    }
    block.push_block(Block::leaf(*b"BOXD", boxd));

    Ok(block)
}

fn cycles_block(palette: &Palette) -> Block {
    let mut cycl = Vec::new();
    for cycle in palette.cycles() {
        cycl.extend_from_slice(&[cycle.id, cycle.start, cycle.end]);
        put_u16(&mut cycl, cycle.delay);
    }
    Block::leaf(*b"CYCL", cycl)
}

/// Colors past `MAX_COLORS` are dropped.
fn palette_block(palette: &Palette) -> Block {
    let clut = palette
        .colors()
        .iter()
        .take(Palette::MAX_COLORS)
        .flat_map(|c| [c.r, c.g, c.b])
        .collect();
    Block::leaf(*b"CLUT", clut)
}

fn object_image_block(object: &Object) -> Result<Block, BlockError> {
    let (width, height, base) = object
        .images
        .first()
        .map_or((0, 0, 0), |i| (i.width, i.height, i.palette_base));

    let mut imhd = Vec::new();
    put_u16(&mut imhd, object.id);
    put_i16(&mut imhd, object.x);
    put_i16(&mut imhd, object.y);
    put_u16(&mut imhd, width);
    put_u16(&mut imhd, height);
    put_u16(&mut imhd, base);
    imhd.push(count("IMHD", object.images.len())?);

    let mut obim = Block::container(*b"OBIM");
    obim.push_block(Block::leaf(*b"IMHD", imhd));
    for (i, image) in object.images.iter().enumerate() {
        obim.push_block(Block::leaf(indexed_tag(*b"IM", i + 1)?, image.pixels.clone()));
    }
    Ok(obim)
}

fn object_code_block(object: &Object) -> Block {
    let mut name = object.name.as_bytes().to_vec();
    name.push(0);
    let verb = object.verb.as_ref().map(code).unwrap_or_default();

    Block::new(*b"OBCD")
        .with(leaf_part(*b"CDHD", object.id.to_le_bytes().to_vec()))
        .with(leaf_part(*b"VERB", verb))
        .with(leaf_part(*b"OBNA", name))
}

pub fn costume_block(costume: &Costume) -> Result<Block, BlockError> {
    let mut chdr = Vec::new();
    put_u16(&mut chdr, costume.id);
    put_u16(&mut chdr, costume.palette_base);
    chdr.push(count("CHDR", costume.anims.len())?);
    chdr.push(count("CHDR", costume.frames.len())?);

    let mut cost = Block::container(*b"COST");
    cost.push_block(Block::leaf(*b"CHDR", chdr));
    for anim in &costume.anims {
        let mut data = vec![anim.id, count("ANIM", anim.frames.len())?];
        data.extend_from_slice(&anim.frames);
        cost.push_block(Block::leaf(*b"ANIM", data));
    }
    for frame in &costume.frames {
        cost.push_block(frame_block(frame));
    }
    Ok(cost)
}

fn frame_block(frame: &Image) -> Block {
    let mut data = Vec::with_capacity(4 + frame.pixels.len());
    put_u16(&mut data, frame.width);
    put_u16(&mut data, frame.height);
    data.extend_from_slice(&frame.pixels);
    Block::leaf(*b"FRAM", data)
}

fn code(function: &Function) -> Vec<u8> {
    function.bytecode.clone().unwrap_or_default()
}

fn leaf_part(tag: [u8; 4], bytes: Vec<u8>) -> Part {
    Part::Block(Block::leaf(tag, bytes))
}

fn count<T: TryFrom<usize>>(tag: &str, n: usize) -> Result<T, BlockError> {
    T::try_from(n).map_err(|_| BlockError::TooMany {
        tag: tag.to_string(),
        count: n,
    })
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Anim, Color, Cycle, Map, RoomSources, ScriptSource, WalkBox, ZPlane};
    use crate::processor::room::Session;

    fn tags(block: &Block) -> Vec<String> {
        block.children().map(Block::tag_name).collect()
    }

    fn compiled_room(palette: Palette, scripts: &str) -> Room {
        let door = Object {
            id: 10,
            name: "door".into(),
            x: -4,
            y: 20,
            images: vec![Image::new(2, 1, vec![1, 2], vec![Color::from([9, 9, 9])]).unwrap()],
            verb: None,
        };
        let bob = Costume {
            id: 3,
            name: "bob".into(),
            colors: vec![Color::from([5, 5, 5])],
            frames: vec![Image::new(1, 2, vec![0, 1], vec![]).unwrap()],
            anims: vec![Anim {
                id: 0,
                name: "stand".into(),
                frames: vec![0, 0],
            }],
            palette_base: 0,
        };
        let sources = RoomSources {
            name: "hall".into(),
            background: Image::new(16, 2, vec![0; 32], vec![]).unwrap(),
            zplanes: vec![ZPlane::new(16, 2)],
            palette,
            objects: vec![door],
            map: Map {
                boxes: vec![WalkBox {
                    id: 0,
                    name: "floor".into(),
                    corners: [(0, 0), (15, 0), (15, 1), (0, 1)],
                    flags: 0,
                    scale: 255,
                }],
            },
            costumes: vec![bob],
            scripts: vec![ScriptSource {
                name: "main".into(),
                text: scripts.into(),
            }],
        };
        Session::new().compile_room(sources).unwrap()
    }

    fn child<'a>(block: &'a Block, tag: &[u8; 4]) -> &'a Block {
        block.children().find(|b| &b.tag() == tag).unwrap()
    }

    fn payload(block: &Block) -> &[u8] {
        match block.parts() {
            [Part::Bytes(bytes)] => bytes.as_slice(),
            _ => panic!("{} is not a leaf", block.tag_name()),
        }
    }

    #[test]
    fn test_room_layout() {
        let src = "function entry() { } function helper() { } inline function quick() { }";
        let room = compiled_room(Palette::new(vec![Color::default(); 4], vec![]), src);
        let file = room_file(&room).unwrap();
        assert_eq!(tags(&file), vec!["ROOM", "COST"]);

        let block = child(&file, b"ROOM");
        assert_eq!(
            tags(block),
            vec!["RMHD", "CYCL", "CLUT", "RMIM", "OBIM", "OBCD", "EXCD", "ENCD", "LSCR", "BOXD"]
        );
        assert_eq!(payload(child(block, b"RMHD")), &[16, 0, 2, 0, 1, 0, 1, 1]);
        assert_eq!(tags(child(block, b"RMIM")), vec!["IM00", "ZP00"]);
        assert_eq!(payload(child(block, b"LSCR")), &[200, 0, 0x40]);
        assert_eq!(payload(child(block, b"BOXD")).len(), 18);

        // palette: 4 room colors, the door brings 1, bob 1
        assert_eq!(payload(child(block, b"CLUT")).len(), 6 * 3);
        let imhd = child(child(block, b"OBIM"), b"IMHD");
        assert_eq!(payload(imhd), &[10, 0, 0xFC, 0xFF, 20, 0, 2, 0, 1, 0, 4, 0, 1]);

        let obcd = child(block, b"OBCD");
        assert_eq!(tags(obcd), vec!["CDHD", "VERB", "OBNA"]);
        assert_eq!(payload(child(obcd, b"VERB")), &[0x40]);
        assert_eq!(payload(child(obcd, b"OBNA")), b"door\0");
    }

    #[test]
    fn test_costume_layout() {
        let room = compiled_room(Palette::new(vec![Color::default(); 4], vec![]), "");
        let cost = costume_block(&room.costumes[0]).unwrap();
        assert_eq!(tags(&cost), vec!["CHDR", "ANIM", "FRAM"]);
        assert_eq!(payload(child(&cost, b"CHDR")), &[3, 0, 5, 0, 1, 1]);
        assert_eq!(payload(child(&cost, b"ANIM")), &[0, 2, 0, 0]);
        assert_eq!(payload(child(&cost, b"FRAM")), &[1, 0, 2, 0, 0, 1]);
    }

    #[test]
    fn test_cycles() {
        let cycles = vec![Cycle {
            id: 1,
            name: "lava".into(),
            start: 2,
            end: 3,
            delay: 0x0102,
        }];
        let room = compiled_room(Palette::new(vec![Color::default(); 4], cycles), "");
        let block = room_block(&room).unwrap();
        assert_eq!(payload(child(&block, b"CYCL")), &[1, 2, 3, 2, 1]);
    }

    #[test]
    fn test_overflowing_palette_still_packs() {
        let room = compiled_room(Palette::new(vec![Color::default(); 253], vec![]), "");
        assert_eq!(room.palette.color_count(), 255);
        let room = compiled_room(Palette::new(vec![Color::default(); 259], vec![]), "");
        assert!(!room.warnings.is_empty());
        let block = room_block(&room).unwrap();
        assert_eq!(payload(child(&block, b"CLUT")).len(), Palette::MAX_COLORS * 3);
    }

    #[test]
    fn test_game_file() {
        let room = compiled_room(Palette::default(), "");
        let game = ProcessedGame {
            rooms: vec![room.clone(), room],
        };
        let lecf = game_block(&game).unwrap();
        assert_eq!(tags(&lecf), vec!["LFLF", "LFLF"]);
        let bytes = lecf.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"LECF");
        assert_eq!(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len());
    }

    fn full_screen_room(session: &mut Session, name: &str) -> Room {
        let mut mask = ZPlane::new(320, 200);
        mask.set(3, 150, true);
        let sources = RoomSources {
            name: name.into(),
            background: Image::new(320, 200, vec![1; 320 * 200], vec![]).unwrap(),
            zplanes: vec![mask],
            palette: Palette::new((0..16).map(|i| Color::from([i, i, i])).collect(), vec![]),
            objects: vec![],
            map: Map { boxes: vec![] },
            costumes: vec![],
            scripts: vec![ScriptSource {
                name: "main".into(),
                text: "function entry() { } function helper() { }".into(),
            }],
        };
        session.compile_room(sources).unwrap()
    }

    #[test]
    fn test_full_screen_room() {
        let room = full_screen_room(&mut Session::new(), "street");
        let block = room_block(&room).unwrap();
        assert_eq!(tags(&block), vec!["RMHD", "CYCL", "CLUT", "RMIM", "EXCD", "ENCD", "LSCR", "BOXD"]);
        // everything after the background sits past 64K
        let offsets = block.offsets().unwrap();
        assert!(offsets[4] > u16::MAX as u32, "{offsets:?}");

        let bytes = block.to_bytes().unwrap();
        assert_eq!(bytes.len(), block.size());
        assert_eq!(&bytes[8..12], &offsets[0].to_le_bytes());
        assert_eq!(&bytes[offsets[6] as usize..][..4], b"LSCR");
    }

    #[test]
    fn test_two_full_screen_rooms() {
        let mut session = Session::new();
        let game = ProcessedGame {
            rooms: vec![full_screen_room(&mut session, "street"), full_screen_room(&mut session, "alley")],
        };
        let lecf = game_block(&game).unwrap();
        let offsets = lecf.offsets().unwrap();
        assert_eq!(offsets[0], 16);
        assert!(offsets[1] > u16::MAX as u32);

        let bytes = lecf.to_bytes().unwrap();
        assert_eq!(bytes.len(), lecf.size());
        assert_eq!(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len());
        assert_eq!(&bytes[offsets[1] as usize..][..4], b"LFLF");
    }
}
