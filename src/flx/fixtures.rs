//! Hand-built byte images of the formats, shared by the unit tests.

use crate::flx::archive::FLX_MAGIC;

pub fn build_archive(records: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();

    let mut comment = [0u8; 80];
    comment[..12].copy_from_slice(b"test archive");
    comment[12] = 0x1A;
    data.extend_from_slice(&comment);
    data.extend_from_slice(&FLX_MAGIC.to_le_bytes());
    data.extend_from_slice(&(records.len() as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 40]);

    let mut offset = 0x80 + records.len() * 8;
    for record in records {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        data.extend_from_slice(&(record.len() as u32).to_le_bytes());
        offset += record.len();
    }

    for record in records {
        data.extend_from_slice(record);
    }

    data
}

/// framed shape record: total length, frame offset table, frames
pub fn framed_shape(frames: &[Vec<u8>]) -> Vec<u8> {
    let table_end = 4 + 4 * frames.len();
    let total = table_end + frames.iter().map(|f| f.len()).sum::<usize>();

    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(&(total as u32).to_le_bytes());

    let mut offset = table_end;
    for frame in frames {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += frame.len();
    }

    for frame in frames {
        data.extend_from_slice(frame);
    }

    data
}

/// frame descriptor followed by the given spans and the terminator
pub fn frame(max_x: u16, min_x_inv: u16, min_y_inv: u16, max_y: u16, spans: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    for v in [max_x, min_x_inv, min_y_inv, max_y] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    for span in spans {
        data.extend_from_slice(span);
    }
    data.extend_from_slice(&0u16.to_le_bytes());
    data
}

fn span_header(block_data: u16, x: i16, y: i16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&block_data.to_le_bytes());
    data.extend_from_slice(&x.to_le_bytes());
    data.extend_from_slice(&y.to_le_bytes());
    data
}

pub fn raw_span(x: i16, y: i16, pixels: &[u8]) -> Vec<u8> {
    let mut data = span_header((pixels.len() as u16) << 1, x, y);
    data.extend_from_slice(pixels);
    data
}

/// `payload` is the already encoded sequence of sub-runs
pub fn rle_span(x: i16, y: i16, block_len: u16, payload: &[u8]) -> Vec<u8> {
    let mut data = span_header((block_len << 1) | 1, x, y);
    data.extend_from_slice(payload);
    data
}

/// palette record with channel value `i % 64` for every channel of entry `i`
pub fn ramp_palette() -> Vec<u8> {
    (0..256usize).flat_map(|i| {
        let v = (i % 64) as u8;
        [v, v, v]
    }).collect()
}

/// records of 256 little-endian u16 cells, `cell(record, index)` gives the value
pub fn u16_table(records: usize, cell: impl Fn(usize, usize) -> u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(records * 512);
    for r in 0..records {
        for i in 0..256 {
            data.extend_from_slice(&cell(r, i).to_le_bytes());
        }
    }
    data
}
