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

    media::memory.rs

    A MediaStore backed by a memory buffer.
*/

use crate::{
    device_traits::mediastore::{MediaError, MediaStore, SectorMeta, FORMAT_FILL_BYTE},
    device_types::{chs::DiskChs, geometry::ZonedGeometry},
};
use qxfdc_common::QxHashMap;

pub struct MemoryMedia {
    geometry: ZonedGeometry,
    data: Vec<u8>,
    meta: QxHashMap<DiskChs, SectorMeta>,
    raw_tracks: QxHashMap<(u8, u8), Vec<u8>>,
    inserted: bool,
    write_protected: bool,
    write_count: usize,
}

impl MemoryMedia {
    /// Create a new, freshly formatted disk.
    pub fn new(geometry: ZonedGeometry) -> Self {
        let size = geometry.total_size();
        Self {
            geometry,
            data: vec![FORMAT_FILL_BYTE; size],
            meta: QxHashMap::default(),
            raw_tracks: QxHashMap::default(),
            inserted: true,
            write_protected: false,
            write_count: 0,
        }
    }

    /// Create a disk from a raw sector image. The image must match the size of the geometry.
    pub fn from_bytes(geometry: ZonedGeometry, data: Vec<u8>) -> Result<Self, MediaError> {
        let expected = geometry.total_size();
        if data.len() != expected {
            return Err(MediaError::SizeMismatch {
                expected,
                found: data.len(),
            });
        }
        let mut media = MemoryMedia::new(geometry);
        media.data = data;
        Ok(media)
    }

    pub fn set_write_protected(&mut self, state: bool) {
        self.write_protected = state;
    }

    pub fn set_inserted(&mut self, state: bool) {
        self.inserted = state;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn raw_track(&self, track: u8, side: u8) -> Option<&[u8]> {
        self.raw_tracks.get(&(track, side)).map(|t| t.as_slice())
    }

    /// The number of successful write operations performed on this media.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), MediaError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(MediaError::OutOfRange { offset, len }),
        }
    }
}

impl MediaStore for MemoryMedia {
    fn is_inserted(&self) -> bool {
        self.inserted
    }

    fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    fn geometry(&self) -> &ZonedGeometry {
        &self.geometry
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<(), MediaError> {
        if !self.inserted {
            return Err(MediaError::NotInserted);
        }
        self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), MediaError> {
        if !self.inserted {
            return Err(MediaError::NotInserted);
        }
        if self.write_protected {
            return Err(MediaError::WriteProtected);
        }
        self.check_range(offset, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        self.write_count += 1;
        Ok(())
    }

    fn sector_meta(&self, chs: DiskChs) -> SectorMeta {
        self.meta.get(&chs).copied().unwrap_or_default()
    }

    fn set_sector_meta(&mut self, chs: DiskChs, meta: SectorMeta) {
        if meta == SectorMeta::default() {
            self.meta.remove(&chs);
        }
        else {
            self.meta.insert(chs, meta);
        }
    }

    fn write_track(&mut self, track: u8, side: u8, raw: &[u8]) -> Result<(), MediaError> {
        if self.write_protected {
            return Err(MediaError::WriteProtected);
        }
        if !self.geometry.contains(track, side) {
            return Err(MediaError::BadTrack(track, side));
        }
        self.raw_tracks.insert((track, side), raw.to_vec());
        self.write_count += 1;
        Ok(())
    }
}
