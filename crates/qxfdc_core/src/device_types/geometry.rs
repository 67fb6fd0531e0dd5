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

    device_types::geometry.rs

    Two-zone disk geometry and sector address resolution.
*/

//! Define a [ZonedGeometry] that represents a disk whose tracks are split into two zones, each
//! with its own sector count, sector size and interleave. The QX1 formats its outer 40 tracks
//! with five 1024-byte sectors and the inner tracks with nine 512-byte sectors.
//!
//! The backing store holds all of side 0, followed by all of side 1. Within a side, tracks are
//! stored in order, and within a track sectors are stored by logical index unless the geometry
//! specifies [SectorOrder::Physical].

use crate::device_types::chs::{DiskChs, DiskChsn};
use serde_derive::Deserialize;
use std::fmt::Display;
use thiserror::Error;

pub const MAX_SECTORS_PER_TRACK: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Geometry must have between 1 and 255 tracks")]
    BadTrackCount,
    #[error("Geometry must have 1 or 2 sides, not {0}")]
    BadSideCount(u8),
    #[error("Zone {0}: sector count must be between 1 and 64")]
    BadSectorCount(usize),
    #[error("Zone {0}: sector size {1} is not a power of two between 128 and 2048")]
    BadSectorSize(usize, usize),
    #[error("Zone {0}: interleave table is not a permutation of the zone's sectors")]
    BadInterleave(usize),
    #[error("Zone {0}: sector ids overflow a byte")]
    BadSectorBase(usize),
    #[error("Geometry must define 1 or 2 zones, not {0}")]
    BadZoneCount(usize),
}

/// How sectors of a track are ordered in the backing store.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum SectorOrder {
    /// Sectors are stored by logical index: sector id minus the side's base id.
    #[default]
    Logical,
    /// Sectors are stored in the order they pass under the head.
    Physical,
}

/// The sector layout of every track in one zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneLayout {
    pub(crate) sectors: u8,
    pub(crate) sector_size: usize,
    /// Physical slot -> logical sector index.
    pub(crate) interleave: Vec<u8>,
    /// The id of the first sector on side 1. Side 0 always starts at 0.
    pub(crate) side1_base: u8,
}

impl ZoneLayout {
    /// Create a new zone. An empty interleave table means sequential order.
    pub fn new(sectors: u8, sector_size: usize, interleave: &[u8], side1_base: u8) -> Self {
        let interleave = if interleave.is_empty() {
            (0..sectors).collect()
        }
        else {
            interleave.to_vec()
        };
        Self {
            sectors,
            sector_size,
            interleave,
            side1_base,
        }
    }

    fn validate(&self, zone: usize) -> Result<(), GeometryError> {
        if self.sectors == 0 || self.sectors as usize > MAX_SECTORS_PER_TRACK {
            return Err(GeometryError::BadSectorCount(zone));
        }
        if !self.sector_size.is_power_of_two() || !(128..=2048).contains(&self.sector_size) {
            return Err(GeometryError::BadSectorSize(zone, self.sector_size));
        }
        if self.interleave.len() != self.sectors as usize {
            return Err(GeometryError::BadInterleave(zone));
        }
        let mut seen = [false; MAX_SECTORS_PER_TRACK];
        for &logical in &self.interleave {
            if logical >= self.sectors || seen[logical as usize] {
                return Err(GeometryError::BadInterleave(zone));
            }
            seen[logical as usize] = true;
        }
        if self.side1_base as usize + self.sectors as usize > 256 {
            return Err(GeometryError::BadSectorBase(zone));
        }
        Ok(())
    }

    #[inline]
    pub fn sectors(&self) -> u8 {
        self.sectors
    }
    #[inline]
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }
    #[inline]
    pub fn interleave(&self) -> &[u8] {
        &self.interleave
    }
    /// The size code recorded in the id fields of this zone.
    pub fn size_code(&self) -> u8 {
        DiskChsn::bytes_to_n(self.sector_size)
    }
    pub fn track_size(&self) -> usize {
        self.sectors as usize * self.sector_size
    }
    /// The id of the first sector on the specified side.
    pub fn sector_base(&self, side: u8) -> u8 {
        if side == 1 {
            self.side1_base
        }
        else {
            0
        }
    }
    /// Return the physical slot holding the specified logical sector index.
    pub fn slot_of(&self, logical: u8) -> Option<usize> {
        self.interleave.iter().position(|&l| l == logical)
    }
}

/// A disk geometry made of two zones split at a track boundary. Tracks below the boundary use
/// zone 0, tracks at or above it use zone 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZonedGeometry {
    pub(crate) tracks: u8,
    pub(crate) sides: u8,
    pub(crate) zone_boundary: u8,
    pub(crate) zones: [ZoneLayout; 2],
    pub(crate) order: SectorOrder,
}

impl Default for ZonedGeometry {
    fn default() -> Self {
        Self::qx1()
    }
}

impl Display for ZonedGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[tracks:{} sides:{} zone0:{}x{} zone1:{}x{} boundary:{}]",
            self.tracks,
            self.sides,
            self.zones[0].sectors,
            self.zones[0].sector_size,
            self.zones[1].sectors,
            self.zones[1].sector_size,
            self.zone_boundary
        )
    }
}

impl ZonedGeometry {
    pub fn new(
        tracks: u8,
        sides: u8,
        zone_boundary: u8,
        zones: [ZoneLayout; 2],
        order: SectorOrder,
    ) -> Result<Self, GeometryError> {
        if tracks == 0 {
            return Err(GeometryError::BadTrackCount);
        }
        if sides == 0 || sides > 2 {
            return Err(GeometryError::BadSideCount(sides));
        }
        for (i, zone) in zones.iter().enumerate() {
            zone.validate(i)?;
        }
        Ok(Self {
            tracks,
            sides,
            zone_boundary,
            zones,
            order,
        })
    }

    /// The geometry of a Yamaha QX1 disk.
    pub fn qx1() -> Self {
        Self {
            tracks: 80,
            sides: 2,
            zone_boundary: 40,
            zones: [
                ZoneLayout::new(5, 1024, &[0, 3, 1, 4, 2], 5),
                ZoneLayout::new(9, 512, &[], 0),
            ],
            order: SectorOrder::Logical,
        }
    }

    #[inline]
    pub fn tracks(&self) -> u8 {
        self.tracks
    }
    #[inline]
    pub fn sides(&self) -> u8 {
        self.sides
    }
    #[inline]
    pub fn max_track(&self) -> u8 {
        self.tracks - 1
    }
    #[inline]
    pub fn zone_boundary(&self) -> u8 {
        self.zone_boundary
    }
    #[inline]
    pub fn order(&self) -> SectorOrder {
        self.order
    }

    /// Return the zone layout used by the specified track.
    pub fn zone(&self, track: u8) -> &ZoneLayout {
        if track < self.zone_boundary {
            &self.zones[0]
        }
        else {
            &self.zones[1]
        }
    }

    /// Return a boolean indicating whether the track and side exist on this geometry.
    pub fn contains(&self, track: u8, side: u8) -> bool {
        track < self.tracks && side < self.sides
    }

    pub fn track_size(&self, track: u8) -> usize {
        self.zone(track).track_size()
    }

    /// Total size of the tracks preceding `track` on one side.
    fn preceding_size(&self, track: u8) -> usize {
        let zone0_tracks = track.min(self.zone_boundary) as usize;
        let zone1_tracks = track.saturating_sub(self.zone_boundary) as usize;
        zone0_tracks * self.zones[0].track_size() + zone1_tracks * self.zones[1].track_size()
    }

    /// Size in bytes of one side of the disk.
    pub fn side_size(&self) -> usize {
        self.preceding_size(self.tracks)
    }

    pub fn total_size(&self) -> usize {
        self.side_size() * self.sides as usize
    }

    /// Return the byte offset of the start of the specified track, or None if it does not exist.
    pub fn track_offset(&self, track: u8, side: u8) -> Option<usize> {
        if !self.contains(track, side) {
            return None;
        }
        Some(side as usize * self.side_size() + self.preceding_size(track))
    }

    /// Return the id field of the sector in the specified physical slot of a track.
    pub fn sector_id(&self, track: u8, side: u8, slot: usize) -> Option<DiskChsn> {
        if !self.contains(track, side) {
            return None;
        }
        let zone = self.zone(track);
        let logical = *zone.interleave.get(slot)?;
        Some(DiskChsn::new(
            track,
            side,
            zone.sector_base(side) + logical,
            zone.size_code(),
        ))
    }

    /// Convert a track, side and sector id to a byte offset into the backing store.
    /// Returns None if no such sector exists on this geometry.
    pub fn locate(&self, track: u8, side: u8, sector: u8) -> Option<usize> {
        let track_offset = self.track_offset(track, side)?;
        let zone = self.zone(track);
        let logical = sector.checked_sub(zone.sector_base(side))?;
        if logical >= zone.sectors {
            return None;
        }
        let index = match self.order {
            SectorOrder::Logical => logical as usize,
            SectorOrder::Physical => zone.slot_of(logical)?,
        };
        Some(track_offset + index * zone.sector_size)
    }

    /// Convert a [DiskChs] to a byte offset into the backing store.
    pub fn locate_chs(&self, chs: DiskChs) -> Option<usize> {
        self.locate(chs.c, chs.h, chs.s)
    }
}
