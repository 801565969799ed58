use std::io::{Cursor, Error, ErrorKind, Read};
use std::iter;
use std::mem;
use log::{trace, warn};

use crate::error::FlxError;
use crate::flx::FlxSlice;
use crate::flx::archive::FlxArchive;
use crate::flx::flxreader::*;
use crate::render::indexed_image::IndexedImage;

/*
    shape raw structures
 */
#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
struct ShapeHeader {
    total_length: u32,          // equals to the record length for framed shapes
    first_frame_offset: u32,    // also the first entry of the frame offset table
}

#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
struct FrameHeader {
    max_x: u16,
    min_x_inv: u16,     // left edge is -min_x_inv
    min_y_inv: u16,     // top edge is -min_y_inv
    max_y: u16,
}

const SHAPE_HEADER_SIZE: usize = mem::size_of::<ShapeHeader>();
const FRAME_HEADER_SIZE: usize = mem::size_of::<FrameHeader>();

/// raw tiles are 8x8 blocks of palette indices without any header
pub const TILE_SIZE: usize = 8;
pub const RAW_TILE_SIZE: usize = TILE_SIZE * TILE_SIZE;

impl FlxStruct for ShapeHeader {
    const SIZE: usize = SHAPE_HEADER_SIZE;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(ShapeHeader {
            total_length: flx_read_u32(reader)?,
            first_frame_offset: flx_read_u32(reader)?,
        })
    }
}

impl FlxStruct for FrameHeader {
    const SIZE: usize = FRAME_HEADER_SIZE;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(FrameHeader {
            max_x: flx_read_u16(reader)?,
            min_x_inv: flx_read_u16(reader)?,
            min_y_inv: flx_read_u16(reader)?,
            max_y: flx_read_u16(reader)?,
        })
    }
}


/// on-disk variant of a shape record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    /// header, frame offset table and span encoded frames
    Framed { num_frames: usize },
    /// back to back 8x8 blocks
    RawTiles { num_frames: usize },
}

impl ShapeKind {
    #[inline]
    pub fn num_frames(&self) -> usize {
        match self {
            ShapeKind::Framed { num_frames } |
            ShapeKind::RawTiles { num_frames } => *num_frames
        }
    }
}


/// result of decoding one frame of a shape
#[derive(Debug, Clone)]
pub struct ShapeFrame {
    /// `None` if the frame bounding box does not fit on the screen
    pub image: Option<IndexedImage>,
    pub requested_frame: usize,
    /// frame that was actually decoded
    pub frame_num: usize,
    pub num_frames: usize,
}

impl ShapeFrame {
    #[inline]
    pub fn was_clamped(&self) -> bool {
        self.requested_frame != self.frame_num
    }
}


/// returns the record bytes, `offset..offset+length` must lie inside the buffer
fn shape_record(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8], FlxError> {
    check_range(buffer, offset, length)?;
    Ok(&buffer[offset..offset + length])
}

fn record_kind(record: &[u8]) -> Result<ShapeKind, FlxError> {
    if record.len() >= SHAPE_HEADER_SIZE {
        let header: ShapeHeader = read_struct(record, 0)?;
        let total_length = header.total_length as usize;

        if total_length == record.len() {
            let first_frame_offset = header.first_frame_offset as usize;
            let num_frames = first_frame_offset.saturating_sub(4) / 4;
            return Ok(ShapeKind::Framed { num_frames });
        }
    }

    Ok(ShapeKind::RawTiles { num_frames: record.len() / RAW_TILE_SIZE })
}

/// decides which variant the record at `offset` is
pub fn shape_kind(buffer: &[u8], offset: usize, length: usize) -> Result<ShapeKind, FlxError> {
    record_kind(shape_record(buffer, offset, length)?)
}

pub fn frame_count(buffer: &[u8], offset: usize, length: usize) -> Result<usize, FlxError> {
    Ok(shape_kind(buffer, offset, length)?.num_frames())
}


/// Decodes frame `frame` of the shape record located at `offset` with `length` bytes.
/// Frame numbers past the end are clamped to the last frame.
pub fn decode_shape_frame(buffer: &[u8], offset: usize, length: usize, frame: usize) -> Result<ShapeFrame, FlxError> {
    let record = shape_record(buffer, offset, length)?;
    let kind = record_kind(record)?;
    let num_frames = kind.num_frames();

    if num_frames == 0 {
        return Err(FlxError::IndexOutOfRange { index: frame, count: 0 });
    }

    let frame_num = if frame >= num_frames {
        warn!("shape at {offset}: frame {frame} requested, only {num_frames} frames, using {}", num_frames - 1);
        num_frames - 1
    } else {
        frame
    };

    let image = match kind {
        ShapeKind::Framed { num_frames } => {
            let frame_offsets: Vec<u32> = read_structs(record, 4, num_frames)?;
            let frame_offset = frame_offsets[frame_num] as usize;
            trace!("shape at {offset}: frame {frame_num} at +{frame_offset}");
            decode_framed(record, offset, frame_offset)?
        }
        ShapeKind::RawTiles { .. } => {
            let start = frame_num * RAW_TILE_SIZE;
            Some(decode_raw_tile(&record[start..start + RAW_TILE_SIZE])?)
        }
    };

    Ok(ShapeFrame { image, requested_frame: frame, frame_num, num_frames })
}


/// Raw tiles have their hotspot at the bottom right pixel, the box is (-7, -7, 0, 0).
fn decode_raw_tile(block: &[u8]) -> Result<IndexedImage, FlxError> {
    let last = TILE_SIZE as i32 - 1;
    let mut image = IndexedImage::new(-last, -last, 0, 0)?;

    for (row, pixels) in block.chunks_exact(TILE_SIZE).enumerate() {
        image.set_span(-last, row as i32 - last, pixels);
    }

    Ok(image)
}

/// `base` is the absolute offset of `record`, only used for error reports
fn decode_framed(record: &[u8], base: usize, frame_offset: usize) -> Result<Option<IndexedImage>, FlxError> {
    let header: FrameHeader = read_struct(record, frame_offset)?;

    let left = -(header.min_x_inv as i32);
    let top = -(header.min_y_inv as i32);
    let right = header.max_x as i32;
    let bottom = header.max_y as i32;

    let mut image = match IndexedImage::new(left, top, right, bottom) {
        Ok(image) => image,
        Err(FlxError::OversizedImage { width, height }) => {
            // misresolved offsets produce these, the frame is treated as missing
            warn!("frame at {}: {width}x{height} bounding box is too large, skipped", base + frame_offset);
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let reader = &mut Cursor::new(record);
    reader.set_position((frame_offset + FRAME_HEADER_SIZE) as u64);

    loop {
        let span_offset = base + reader.position() as usize;
        let malformed = |_: Error| FlxError::MalformedSpan { offset: span_offset };

        let block_data = flx_read_u16(reader).map_err(malformed)?;
        if block_data == 0 {
            break;
        }

        let x = flx_read_i16(reader).map_err(malformed)? as i32;
        let y = flx_read_i16(reader).map_err(malformed)? as i32;
        let block_len = (block_data >> 1) as usize;

        let pixels = match block_data & 1 {
            0 => read_raw_span(reader, block_len),
            _ => read_rle_span(reader, block_len),
        };
        let pixels = pixels.map_err(malformed)?;

        if !image.set_span(x, y, &pixels) {
            return Err(FlxError::MalformedSpan { offset: span_offset });
        }
    }

    Ok(Some(image))
}

fn read_raw_span<R: Read>(reader: &mut R, block_len: usize) -> Result<Vec<u8>, Error> {
    let mut pixels = vec![0; block_len];
    reader.read_exact(&mut pixels)?;
    Ok(pixels)
}

/// Each sub-run starts with a header byte, the high 7 bits are the run length.
/// Bit 0 clear: that many literal bytes follow. Bit 0 set: one byte follows, repeated.
/// The runs must add up to exactly `block_len` pixels.
fn read_rle_span<R: Read>(reader: &mut R, block_len: usize) -> Result<Vec<u8>, Error> {
    let mut pixels = Vec::with_capacity(block_len);

    while pixels.len() < block_len {
        let run_header = flx_read_u8(reader)?;
        let run_len = (run_header >> 1) as usize;

        if pixels.len() + run_len > block_len {
            return Err(Error::new(ErrorKind::InvalidData, format!("run of {run_len} overflows span of {block_len}")));
        }

        if run_header & 1 == 0 {
            pixels.extend(read_raw_span(reader, run_len)?);
        } else {
            let index = flx_read_u8(reader)?;
            pixels.extend(iter::repeat(index).take(run_len));
        }
    }

    Ok(pixels)
}


impl FlxArchive {
    /// decodes a frame of the shape stored in record `shape`
    pub fn shape_frame(&self, shape: usize, frame: usize) -> Result<ShapeFrame, FlxError> {
        let FlxSlice { offset, length } = self.record_range(shape)?;
        decode_shape_frame(self.data(), offset, length, frame)
    }

    pub fn shape_frame_count(&self, shape: usize) -> Result<usize, FlxError> {
        let FlxSlice { offset, length } = self.record_range(shape)?;
        frame_count(self.data(), offset, length)
    }
}
