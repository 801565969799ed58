use std::fs;
use std::io::{Error, Read};
use std::mem;
use std::path::Path;
use serde::Serialize;
use log::trace;

use crate::error::FlxError;
use crate::flx::flxreader::*;

/*
    attribute table raw structure, one record per shape, no header
 */
#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
struct TfaRecord {
    flags: u8,
    class: u8,
    size: u8,
}

const TFA_RECORD_SIZE: usize = mem::size_of::<TfaRecord>();

impl FlxStruct for TfaRecord {
    const SIZE: usize = TFA_RECORD_SIZE;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(TfaRecord {
            flags: flx_read_u8(reader)?,
            class: flx_read_u8(reader)?,
            size: flx_read_u8(reader)?,
        })
    }
}

// byte 0 |7|6|5|4|3|2|1|0|
//        |Z|Z|Z|W|O|A|R|U|   Z: z tiles, W: water, O: obstacle, A: animated, R: rotatable, U: unknown
const UNKNOWN: u8   = 0b0000_0001;
const ROTATABLE: u8 = 0b0000_0010;
const ANIMATED: u8  = 0b0000_0100;
const OBSTACLE: u8  = 0b0000_1000;
const WATER: u8     = 0b0001_0000;
const Z_TILES_SHIFT: usize = 5;

// byte 1 |7|6|5|4|3|2|1|0|
//        |S|V|D|T|C|C|C|C|   S: unselectable, V: vehicle, D: door, T: trap, C: shape type
const SHAPE_TYPE_MASK: u8 = 0b0000_1111;
const TRAP: u8         = 0b0001_0000;
const DOOR: u8         = 0b0010_0000;
const VEHICLE: u8      = 0b0100_0000;
const UNSELECTABLE: u8 = 0b1000_0000;

// byte 2 |7|6|5|4|3|2|1|0|
//        |T|L|Y|Y|Y|X|X|X|   T: translucent, L: light source, Y/X: tile size minus one
const X_TILES_MASK: u8 = 0b0000_0111;
const Y_TILES_SHIFT: usize = 3;
const LIGHT_SOURCE: u8 = 0b0100_0000;
const TRANSLUCENT: u8  = 0b1000_0000;


/// decoded attributes of a shape
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ShapeAttributes {
    pub unknown: bool,
    pub rotatable: bool,
    pub animated: bool,
    pub obstacle: bool,
    pub water: bool,
    pub z_tiles: u8,

    pub shape_type: u8,
    pub trap: bool,
    pub door: bool,
    pub vehicle: bool,
    pub unselectable: bool,

    /// footprint in tiles, already incremented
    pub x_tiles: u8,
    pub y_tiles: u8,
    pub light_source: bool,
    pub translucent: bool,

    /// not stored in the table, filled in from the shape record
    pub frame_count: usize,
}

impl ShapeAttributes {
    fn from_record(record: TfaRecord) -> Self {
        let TfaRecord { flags, class, size } = record;

        Self {
            unknown: flags & UNKNOWN != 0,
            rotatable: flags & ROTATABLE != 0,
            animated: flags & ANIMATED != 0,
            obstacle: flags & OBSTACLE != 0,
            water: flags & WATER != 0,
            z_tiles: flags >> Z_TILES_SHIFT,

            shape_type: class & SHAPE_TYPE_MASK,
            trap: class & TRAP != 0,
            door: class & DOOR != 0,
            vehicle: class & VEHICLE != 0,
            unselectable: class & UNSELECTABLE != 0,

            x_tiles: (size & X_TILES_MASK) + 1,
            y_tiles: ((size >> Y_TILES_SHIFT) & X_TILES_MASK) + 1,
            light_source: size & LIGHT_SOURCE != 0,
            translucent: size & TRANSLUCENT != 0,

            frame_count: 0,
        }
    }

    #[inline]
    pub fn with_frame_count(self, frame_count: usize) -> Self {
        Self { frame_count, ..self }
    }
}


/// decodes the 3 byte record of `shape`
pub fn decode_attributes(buffer: &[u8], shape: usize) -> Result<ShapeAttributes, FlxError> {
    let offset = shape.checked_mul(TFA_RECORD_SIZE)
        .ok_or(FlxError::OutOfRange { offset: usize::MAX, size: TFA_RECORD_SIZE, len: buffer.len() })?;
    let record: TfaRecord = read_struct(buffer, offset)?;
    Ok(ShapeAttributes::from_record(record))
}


/// TileAttributes stores the decoded attribute table, indexed by shape number
pub struct TileAttributes {
    shapes: Vec<ShapeAttributes>,
}

impl TileAttributes {
    pub fn decode(buffer: &[u8]) -> Result<Self, FlxError> {
        let records: Vec<TfaRecord> = read_structs(buffer, 0, buffer.len() / TFA_RECORD_SIZE)?;

        Ok(Self {
            shapes: records.into_iter().map(ShapeAttributes::from_record).collect(),
        })
    }

    /// Tries to read the table from a file
    pub fn read(path: &Path) -> Result<Self, FlxError> {
        trace!("TileAttributes::read {}", path.display());
        Self::decode(&fs::read(path)?)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, shape: usize) -> Result<&ShapeAttributes, FlxError> {
        self.shapes.get(shape).ok_or(FlxError::IndexOutOfRange { index: shape, count: self.shapes.len() })
    }
}
