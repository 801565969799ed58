use std::fs;
use std::io::{Error, Read};
use std::mem;
use std::path::Path;
use log::{debug, trace};

use crate::error::FlxError;
use crate::flx::FlxSlice;
use crate::flx::flxreader::*;

pub const FLX_MAGIC: u32 = 0xFFFF_1A00;
pub const FLX_TABLE_OFFSET: usize = 0x80;

/*
    flx file raw structures, full set of fields
 */
#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
pub struct FlxHeader {
    comment: [u8; 80],
    magic: u32,         // must be FLX_MAGIC
    num_records: u32,
    reserved: [u32; 10],
}

#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
struct FlxRecordEntry {
    offset: u32,    // absolute, from the start of the file
    length: u32,
}

// MUST BE 0x80 bytes, the record table starts right after the header
const FLX_HEADER_SIZE: usize = mem::size_of::<FlxHeader>();
const FLX_RECORD_ENTRY_SIZE: usize = mem::size_of::<FlxRecordEntry>();


impl FlxStruct for FlxHeader {
    const SIZE: usize = FLX_HEADER_SIZE;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(FlxHeader {
            comment: flx_read_fixed_bytes(reader)?,
            magic: flx_read_u32(reader)?,
            num_records: flx_read_u32(reader)?,
            reserved: <[u32; 10]>::read(reader)?,
        })
    }
}

impl FlxStruct for FlxRecordEntry {
    const SIZE: usize = FLX_RECORD_ENTRY_SIZE;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(FlxRecordEntry {
            offset: flx_read_u32(reader)?,
            length: flx_read_u32(reader)?,
        })
    }
}

impl FlxHeader {
    #[inline]
    pub fn num_records(&self) -> usize {
        self.num_records as usize
    }

    /// text of the comment field, up to the first NUL or EOF (0x1A) marker
    pub fn comment(&self) -> String {
        let comment = self.comment;
        let end = comment.iter().position(|&c| c == 0 || c == 0x1A).unwrap_or(comment.len());
        String::from_utf8_lossy(&comment[..end]).trim_end().to_owned()
    }
}


/// reads the header and refuses to go any further if the signature does not match
pub fn read_header(buffer: &[u8]) -> Result<FlxHeader, FlxError> {
    let header: FlxHeader = read_struct(buffer, 0)?;

    let magic = header.magic;
    if magic != FLX_MAGIC {
        return Err(FlxError::BadMagic { magic });
    }

    Ok(header)
}

/// reads the table of contents, one slice per record
pub fn read_record_table(buffer: &[u8], header: &FlxHeader) -> Result<Vec<FlxSlice>, FlxError> {
    let records = header.num_records();

    let fits = records.checked_mul(FLX_RECORD_ENTRY_SIZE)
        .and_then(|size| size.checked_add(FLX_TABLE_OFFSET))
        .map_or(false, |end| end <= buffer.len());
    if !fits {
        return Err(FlxError::TruncatedTable { records, len: buffer.len() });
    }

    let entries: Vec<FlxRecordEntry> = read_structs(buffer, FLX_TABLE_OFFSET, records)?;

    Ok(entries.into_iter()
        .map(|entry| FlxSlice { offset: entry.offset as usize, length: entry.length as usize })
        .collect())
}


/// FlxArchive owns the bytes of one flx container and its table of contents.
/// Records are addressed by their number in the table.
pub struct FlxArchive {
    data: Vec<u8>,
    comment: String,
    records: Vec<FlxSlice>,
}

impl FlxArchive {
    pub fn open(data: Vec<u8>) -> Result<Self, FlxError> {
        let header = read_header(&data)?;
        let records = read_record_table(&data, &header)?;
        let comment = header.comment();

        debug!("flx archive '{comment}' with {} records, {} bytes", records.len(), data.len());

        Ok(Self { data, comment, records })
    }

    /// Tries to read an archive from a file
    pub fn read(path: &Path) -> Result<Self, FlxError> {
        trace!("FlxArchive::read {}", path.display());
        Self::open(fs::read(path)?)
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[inline]
    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    pub fn record_range(&self, record: usize) -> Result<FlxSlice, FlxError> {
        self.records.get(record)
            .copied()
            .ok_or(FlxError::IndexOutOfRange { index: record, count: self.records.len() })
    }

    /// returns the bytes of the record, the range is checked against the loaded buffer
    pub fn record(&self, record: usize) -> Result<&[u8], FlxError> {
        let FlxSlice { offset, length } = self.record_range(record)?;
        check_range(&self.data, offset, length)?;
        Ok(&self.data[offset..offset + length])
    }

    #[inline]
    pub fn is_empty_record(&self, record: usize) -> bool {
        matches!(self.records.get(record), Some(FlxSlice { length: 0, .. }))
    }
}
