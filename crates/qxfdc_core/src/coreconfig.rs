/*
    QxFDC
    MB8877 floppy disk controller emulation for the Yamaha QX1

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    coreconfig.rs

    Controller configuration, read from TOML.
*/

//! Every field has a default, so an empty configuration file describes a standard MB8877
//! attached to a Yamaha QX1 drive.
//!
//! ```toml
//! variant = "Mb8877"
//! ignore_crc = false
//! register_poke = "Absorb"
//!
//! [timing]
//! step_rates_us = [6000.0, 12000.0, 20000.0, 30000.0]
//!
//! [geometry]
//! tracks = 80
//! zone_boundary = 40
//!
//! [[geometry.zones]]
//! sectors = 5
//! sector_size = 1024
//! interleave = [0, 3, 1, 4, 2]
//! side1_base = 5
//!
//! [[geometry.zones]]
//! sectors = 9
//! sector_size = 512
//! ```

use std::path::{Path, PathBuf};

use crate::device_types::geometry::{GeometryError, SectorOrder, ZoneLayout, ZonedGeometry};
use serde_derive::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file '{0}' could not be found")]
    NotFound(PathBuf),
    #[error("IO error reading configuration file '{0}': {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Error parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

/// The chip variant. The MB8876 is an MB8877 with an inverted data bus.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum FdcVariant {
    #[default]
    Mb8877,
    Mb8876,
}

/// What happens when the host writes the Track or Sector register while a Read or Write Sector
/// command is busy.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum RegisterPokePolicy {
    /// Store the value. If no data has moved yet, restart the search with the new address.
    #[default]
    Absorb,
    /// Store the value. It takes effect at the next search.
    Latch,
    /// Ignore the write.
    Reject,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FdcTiming {
    /// Head step delay for each of the four step rate codes.
    pub step_rates_us: [f64; 4],
    /// Delay before a Type I command that needs no step completes.
    pub seek_end_us: f64,
    /// Delay before the searched record arrives under the head.
    pub search_us: f64,
    /// Search delay of the first data command after a Type I command.
    pub settle_us: f64,
    /// Extra delay added when the E flag of a Type II or III command is set.
    pub head_settle_us: f64,
    /// Delays of the two multi-sector continuation steps.
    pub multi1_us: f64,
    pub multi2_us: f64,
    /// Delay before a Force Interrupt takes effect.
    pub type4_us: f64,
    /// Time allowed for the host to service DRQ, in addition to the search delay.
    pub lost_sector_us: f64,
    pub lost_address_us: f64,
    pub lost_track_us: f64,
    /// Length of a raw track for Read Track and Write Track.
    pub raw_track_len: usize,
}

impl Default for FdcTiming {
    fn default() -> Self {
        Self {
            step_rates_us: [6000.0, 12000.0, 20000.0, 30000.0],
            seek_end_us: 300.0,
            search_us: 200.0,
            settle_us: 70000.0,
            head_settle_us: 15000.0,
            multi1_us: 30.0,
            multi2_us: 60.0,
            type4_us: 100.0,
            lost_sector_us: 30000.0,
            lost_address_us: 10000.0,
            lost_track_us: 150000.0,
            raw_track_len: 0x1800,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ZoneConfig {
    pub sectors: u8,
    pub sector_size: usize,
    #[serde(default)]
    pub interleave: Vec<u8>,
    #[serde(default)]
    pub side1_base: u8,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub tracks: u8,
    pub sides: u8,
    pub zone_boundary: u8,
    pub sector_order: SectorOrder,
    pub zones: Vec<ZoneConfig>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tracks: 80,
            sides: 2,
            zone_boundary: 40,
            sector_order: SectorOrder::Logical,
            zones: vec![
                ZoneConfig {
                    sectors: 5,
                    sector_size: 1024,
                    interleave: vec![0, 3, 1, 4, 2],
                    side1_base: 5,
                },
                ZoneConfig {
                    sectors: 9,
                    sector_size: 512,
                    interleave: Vec::new(),
                    side1_base: 0,
                },
            ],
        }
    }
}

impl From<&ZoneConfig> for ZoneLayout {
    fn from(zone: &ZoneConfig) -> Self {
        ZoneLayout::new(zone.sectors, zone.sector_size, &zone.interleave, zone.side1_base)
    }
}

impl TryFrom<&GeometryConfig> for ZonedGeometry {
    type Error = GeometryError;

    fn try_from(config: &GeometryConfig) -> Result<Self, Self::Error> {
        // A single zone describes a uniform disk.
        let zones = match config.zones.as_slice() {
            [only] => [ZoneLayout::from(only), ZoneLayout::from(only)],
            [zone0, zone1] => [ZoneLayout::from(zone0), ZoneLayout::from(zone1)],
            other => return Err(GeometryError::BadZoneCount(other.len())),
        };
        ZonedGeometry::new(
            config.tracks,
            config.sides,
            config.zone_boundary,
            zones,
            config.sector_order,
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FdcConfig {
    #[serde(default)]
    pub variant: FdcVariant,
    /// Do not report CRC errors on sectors whose stored CRC does not match their data.
    #[serde(default)]
    pub ignore_crc: bool,
    #[serde(default)]
    pub register_poke: RegisterPokePolicy,
    #[serde(default)]
    pub timing: FdcTiming,
    #[serde(default)]
    pub geometry: GeometryConfig,
}

impl FdcConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: FdcConfig = toml::from_str(toml_str)?;
        // Validate now so a bad geometry is reported when the file is loaded.
        config.media_geometry()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml_str = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(path.to_path_buf(), e)),
        };
        log::debug!("Loading configuration from {}", path.display());
        FdcConfig::from_toml_str(&toml_str)
    }

    /// Build the media geometry described by this configuration.
    pub fn media_geometry(&self) -> Result<ZonedGeometry, ConfigError> {
        Ok(ZonedGeometry::try_from(&self.geometry)?)
    }
}
