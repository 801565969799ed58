//! Session configuration, read from an optional json file

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use log::trace;

use crate::error::FlxError;
use crate::flx::ChannelScale;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// directory with the data files, file names below are relative to it
    pub data_dir: PathBuf,
    pub shapes_file: String,
    pub palettes_file: String,
    pub attributes_file: String,
    pub chunks_file: String,
    pub map_file: String,

    /// record of the palettes archive used for display
    pub palette_index: usize,
    pub channel_scale: ChannelScale,

    pub http_address: SocketAddr,

    pub start_tile_x: isize,
    pub start_tile_y: isize,
    /// interval between render ticks of the viewer
    pub tick_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("STATIC"),
            shapes_file: "SHAPES.VGA".to_owned(),
            palettes_file: "PALETTES.FLX".to_owned(),
            attributes_file: "TFA.DAT".to_owned(),
            chunks_file: "U7CHUNKS".to_owned(),
            map_file: "U7MAP".to_owned(),
            palette_index: 0,
            channel_scale: ChannelScale::Shift,
            http_address: ([127, 0, 0, 1], 3000).into(),
            start_tile_x: 1024,
            start_tile_y: 1024,
            tick_millis: 100,
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, FlxError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self, FlxError> {
        trace!("Config::read {}", path.display());
        Self::parse(&fs::read_to_string(path)?)
    }

    #[inline]
    pub fn shapes_path(&self) -> PathBuf {
        self.data_dir.join(&self.shapes_file)
    }

    #[inline]
    pub fn palettes_path(&self) -> PathBuf {
        self.data_dir.join(&self.palettes_file)
    }

    #[inline]
    pub fn attributes_path(&self) -> PathBuf {
        self.data_dir.join(&self.attributes_file)
    }

    #[inline]
    pub fn chunks_path(&self) -> PathBuf {
        self.data_dir.join(&self.chunks_file)
    }

    #[inline]
    pub fn map_path(&self) -> PathBuf {
        self.data_dir.join(&self.map_file)
    }
}
