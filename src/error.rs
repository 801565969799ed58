#[derive(Debug, thiserror::Error)]
pub enum FlxError {
    #[error("Bad archive signature: {magic:#010x}")]
    BadMagic { magic: u32 },
    #[error("Index {index} is out of range, {count} entries available")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("Malformed span data at offset {offset}")]
    MalformedSpan { offset: usize },
    #[error("Image of {width}x{height} does not fit the working surface")]
    OversizedImage { width: i32, height: i32 },
    #[error("Read of {size} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfRange { offset: usize, size: usize, len: usize },
    #[error("Record table of {records} entries does not fit in {len} bytes")]
    TruncatedTable { records: usize, len: usize },
    #[error("Config error: {source}")]
    ConfigError {
        #[from]
        source: serde_json::Error,
    },
    #[error("IOError: {source}")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}
