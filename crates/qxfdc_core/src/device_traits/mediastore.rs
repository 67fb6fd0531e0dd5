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

    device_traits::mediastore.rs

    Defines the MediaStore trait which any backing store for a virtual disk
    (memory buffer, image file, SD card) must implement.
*/

use std::sync::{Arc, RwLock};

use crate::device_types::{
    chs::{DiskChs, DiskChsn},
    geometry::{ZoneLayout, ZonedGeometry},
};
use thiserror::Error;

/// The byte value a freshly formatted sector is filled with.
pub const FORMAT_FILL_BYTE: u8 = 0xE5;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("No media inserted")]
    NotInserted,
    #[error("Media is write protected")]
    WriteProtected,
    #[error("Access out of range: offset {offset:#X} length {len}")]
    OutOfRange { offset: usize, len: usize },
    #[error("Track {0} side {1} does not exist on this media")]
    BadTrack(u8, u8),
    #[error("Image size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("Media is locked by another user")]
    Locked,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-sector metadata that a flat sector image cannot represent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SectorMeta {
    /// The sector was written with a deleted data address mark.
    pub deleted: bool,
    /// The data CRC recorded for the sector. Sectors without a recorded CRC are not checked.
    pub crc: Option<u16>,
}

pub trait MediaStore {
    fn is_inserted(&self) -> bool;

    fn is_write_protected(&self) -> bool;

    fn geometry(&self) -> &ZonedGeometry;

    /// Return the layout of the zone containing the specified track, or None if the track does not
    /// exist on the media.
    fn track_geometry(&self, track: u8) -> Option<&ZoneLayout> {
        let geometry = self.geometry();
        if track > geometry.max_track() {
            None
        }
        else {
            Some(geometry.zone(track))
        }
    }

    /// Return the id field of the sector in the specified physical slot.
    fn sector_id(&self, track: u8, side: u8, slot: usize) -> Option<DiskChsn> {
        self.geometry().sector_id(track, side, slot)
    }

    /// Fill `buf` with bytes starting at the absolute offset.
    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<(), MediaError>;

    /// Write `data` starting at the absolute offset.
    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), MediaError>;

    fn sector_meta(&self, chs: DiskChs) -> SectorMeta;

    fn set_sector_meta(&mut self, chs: DiskChs, meta: SectorMeta);

    /// Read the data of the sector with the specified id.
    fn read_sector(&self, chs: DiskChs) -> Result<Vec<u8>, MediaError> {
        let geometry = self.geometry();
        let offset = geometry
            .locate_chs(chs)
            .ok_or(MediaError::BadTrack(chs.c(), chs.h()))?;
        let mut buf = vec![0; geometry.zone(chs.c()).sector_size()];
        self.read_bytes(offset, &mut buf)?;
        Ok(buf)
    }

    /// Prepare a track for a raw write: every sector is erased to the format fill byte and its
    /// metadata cleared.
    fn make_track(&mut self, track: u8, side: u8) -> Result<(), MediaError> {
        if self.is_write_protected() {
            return Err(MediaError::WriteProtected);
        }
        let geometry = self.geometry().clone();
        let offset = geometry.track_offset(track, side).ok_or(MediaError::BadTrack(track, side))?;
        let zone = geometry.zone(track);
        let blank = vec![FORMAT_FILL_BYTE; zone.track_size()];
        self.write_bytes(offset, &blank)?;

        let base = zone.sector_base(side);
        for s in base..base + zone.sectors() {
            self.set_sector_meta(DiskChs::new(track, side, s), SectorMeta::default());
        }
        Ok(())
    }

    /// Store a raw track image as written by the host with Write Track.
    fn write_track(&mut self, track: u8, side: u8, raw: &[u8]) -> Result<(), MediaError>;
}

/// A handle to a media store shared between the controller and the application that owns it.
pub type SharedMedia = Arc<RwLock<dyn MediaStore + Send + Sync>>;
