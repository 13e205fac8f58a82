//! Plain room data, as handed from the descriptor loader to the compiler
//! and from the compiler to the writers.

use anyhow::{Result, anyhow};

use crate::processor::ast::Function;
use crate::processor::room::Room;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Anything that can be read as a one-bit-per-pixel mask.
pub trait Bitmap {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn pixel(&self, x: u16, y: u16) -> bool;
}

/// A transparency mask aligned to the room's pixel grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZPlane {
    width: u16,
    height: u16,
    bits: Vec<bool>,
}

impl ZPlane {
    /// Fully clear mask.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Builds a mask from rows of `0`/`1` characters, top row first.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let width = u16::try_from(width).map_err(|_| anyhow!("mask is too wide: {width}"))?;
        let height = u16::try_from(rows.len())
            .map_err(|_| anyhow!("mask is too tall: {}", rows.len()))?;

        let mut plane = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width as usize {
                return Err(anyhow!(
                    "mask row {y} has {} pixels, expected {width}",
                    row.len()
                ));
            }
            for (x, c) in row.chars().enumerate() {
                let bit = match c {
                    '0' => false,
                    '1' => true,
                    other => return Err(anyhow!("invalid mask pixel `{other}` in row {y}")),
                };
                plane.set(x as u16, y as u16, bit);
            }
        }
        Ok(plane)
    }

    pub fn set(&mut self, x: u16, y: u16, bit: bool) {
        let idx = y as usize * self.width as usize + x as usize;
        self.bits[idx] = bit;
    }
}

impl Bitmap for ZPlane {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn pixel(&self, x: u16, y: u16) -> bool {
        self.bits[y as usize * self.width as usize + x as usize]
    }
}

/// Indexed-color picture together with the colors it was drawn with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
    pub colors: Vec<Color>,
    /// Where this image's own colors start in the room palette.
    pub palette_base: u16,
}

impl Image {
    pub fn new(width: u16, height: u16, pixels: Vec<u8>, colors: Vec<Color>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "image has {} pixels, {width}x{height} needs {expected}",
                pixels.len()
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
            colors,
            palette_base: 0,
        })
    }

    pub fn pixel(&self, x: u16, y: u16) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

/// Range of palette entries rotated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub id: u8,
    pub name: String,
    pub start: u8,
    pub end: u8,
    pub delay: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<Color>,
    cycles: Vec<Cycle>,
}

impl Palette {
    pub const MAX_COLORS: usize = 256;

    pub fn new(colors: Vec<Color>, cycles: Vec<Cycle>) -> Self {
        Self { colors, cycles }
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// New entries are black.
    pub fn resize(&mut self, count: usize) {
        self.colors.resize(count, Color::default());
    }

    pub fn set_color(&mut self, index: usize, color: Color) {
        self.colors[index] = color;
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn cycle(&self, index: usize) -> Option<&Cycle> {
        self.cycles.get(index)
    }
}

/// Interactive room object.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: u16,
    pub name: String,
    pub x: i16,
    pub y: i16,
    pub images: Vec<Image>,
    pub verb: Option<Function>,
}

impl Object {
    pub fn verb_name(&self) -> String {
        format!("{}_verb", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anim {
    pub id: u8,
    pub name: String,
    /// Indices into the costume's frames.
    pub frames: Vec<u8>,
}

/// Actor sprite set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Costume {
    pub id: u16,
    pub name: String,
    pub colors: Vec<Color>,
    pub frames: Vec<Image>,
    pub anims: Vec<Anim>,
    pub palette_base: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkBox {
    pub id: u8,
    pub name: String,
    /// Upper-left, upper-right, lower-right, lower-left.
    pub corners: [(i16, i16); 4],
    pub flags: u8,
    pub scale: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Map {
    pub boxes: Vec<WalkBox>,
}

/// One entry of a room's script manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub name: String,
    pub text: String,
}

/// Everything a room is made of, before compilation.
#[derive(Debug, Clone)]
pub struct RoomSources {
    pub name: String,
    pub background: Image,
    pub zplanes: Vec<ZPlane>,
    pub palette: Palette,
    pub objects: Vec<Object>,
    pub map: Map,
    pub costumes: Vec<Costume>,
    pub scripts: Vec<ScriptSource>,
}

/// Entire game as it comes out of the descriptor loader.
#[derive(Debug, Clone)]
pub struct RawGame {
    pub rooms: Vec<RoomSources>,
}

/// Fully compiled output handed to `writer`.
#[derive(Debug)]
pub struct ProcessedGame {
    pub rooms: Vec<Room>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zplane_from_rows() {
        let plane = ZPlane::from_rows(&["0110", "1001"]).unwrap();
        assert_eq!(plane.width(), 4);
        assert_eq!(plane.height(), 2);
        assert!(!plane.pixel(0, 0));
        assert!(plane.pixel(1, 0));
        assert!(plane.pixel(0, 1));
        assert!(plane.pixel(3, 1));
    }

    #[test]
    fn test_zplane_rejects_ragged_rows() {
        let err = ZPlane::from_rows(&["0110", "10"]).unwrap_err();
        assert!(err.to_string().contains("row 1"), "got: {err}");

        let err = ZPlane::from_rows(&["01x0"]).unwrap_err();
        assert!(err.to_string().contains("invalid mask pixel"), "got: {err}");
    }

    #[test]
    fn test_image_pixel_count_checked() {
        assert!(Image::new(2, 2, vec![0; 4], vec![]).is_ok());
        assert!(Image::new(2, 2, vec![0; 3], vec![]).is_err());
    }

    #[test]
    fn test_palette_resize_pads_with_black() {
        let mut palette = Palette::new(vec![Color::from([1, 2, 3])], vec![]);
        palette.resize(3);
        palette.set_color(2, Color::from([9, 9, 9]));
        assert_eq!(palette.color_count(), 3);
        assert_eq!(palette.colors()[1], Color::default());
        assert_eq!(palette.colors()[2], Color { r: 9, g: 9, b: 9 });
    }
}
