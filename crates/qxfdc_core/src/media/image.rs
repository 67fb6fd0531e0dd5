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

    media::image.rs

    A MediaStore backed by a flat sector image in a file or any other
    seekable stream. The image is cached in memory and written through to the
    stream on every write.
*/

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::{
    device_traits::mediastore::{MediaError, MediaStore, SectorMeta},
    device_types::{chs::DiskChs, geometry::ZonedGeometry},
};
use qxfdc_common::QxHashMap;

pub struct ImageMedia<S> {
    geometry: ZonedGeometry,
    /// None for images opened read-only.
    stream: Option<S>,
    content: Vec<u8>,
    meta: QxHashMap<DiskChs, SectorMeta>,
    raw_tracks: QxHashMap<(u8, u8), Vec<u8>>,
    write_protected: bool,
    path: Option<PathBuf>,
}

impl ImageMedia<File> {
    /// Open an image file. If the file cannot be opened for writing it is opened read-only and the
    /// media reports itself write protected.
    pub fn open(path: impl AsRef<Path>, geometry: ZonedGeometry, write_protect: bool) -> Result<Self, MediaError> {
        let path = path.as_ref();

        let (file, readonly) = if write_protect {
            (OpenOptions::new().read(true).open(path)?, true)
        }
        else {
            match OpenOptions::new().read(true).write(true).open(path) {
                Ok(file) => (file, false),
                Err(e) => {
                    log::warn!("Opening {} read-only: {}", path.display(), e);
                    (OpenOptions::new().read(true).open(path)?, true)
                }
            }
        };

        let mut media = ImageMedia::load(file, geometry, readonly)?;
        media.path = Some(path.to_path_buf());
        Ok(media)
    }
}

impl<S: Read + Write + Seek> ImageMedia<S> {
    /// Load an image from a stream. The stream is kept for write-through unless `write_protect`
    /// is set.
    pub fn from_stream(stream: S, geometry: ZonedGeometry, write_protect: bool) -> Result<Self, MediaError> {
        ImageMedia::load(stream, geometry, write_protect)
    }

    fn load(mut stream: S, geometry: ZonedGeometry, write_protect: bool) -> Result<Self, MediaError> {
        let mut content = Vec::new();
        stream.seek(SeekFrom::Start(0))?;
        stream.read_to_end(&mut content)?;

        let expected = geometry.total_size();
        if content.len() != expected {
            return Err(MediaError::SizeMismatch {
                expected,
                found: content.len(),
            });
        }

        log::debug!("Loaded {} byte image with geometry {}", content.len(), geometry);
        Ok(Self {
            geometry,
            stream: if write_protect { None } else { Some(stream) },
            content,
            meta: QxHashMap::default(),
            raw_tracks: QxHashMap::default(),
            write_protected: write_protect,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn raw_track(&self, track: u8, side: u8) -> Option<&[u8]> {
        self.raw_tracks.get(&(track, side)).map(|t| t.as_slice())
    }

    /// Release the backing stream.
    pub fn into_inner(self) -> Option<S> {
        self.stream
    }
}

impl<S: Read + Write + Seek> MediaStore for ImageMedia<S> {
    fn is_inserted(&self) -> bool {
        true
    }

    fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    fn geometry(&self) -> &ZonedGeometry {
        &self.geometry
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<(), MediaError> {
        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= self.content.len())
            .ok_or(MediaError::OutOfRange { offset, len: buf.len() })?;
        buf.copy_from_slice(&self.content[offset..end]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), MediaError> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.content.len())
            .ok_or(MediaError::OutOfRange { offset, len: data.len() })?;

        let stream = match (self.write_protected, self.stream.as_mut()) {
            (false, Some(stream)) => stream,
            _ => return Err(MediaError::WriteProtected),
        };

        stream.seek(SeekFrom::Start(offset as u64))?;
        stream.write_all(data)?;
        stream.flush()?;
        self.content[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn sector_meta(&self, chs: DiskChs) -> SectorMeta {
        self.meta.get(&chs).copied().unwrap_or_default()
    }

    fn set_sector_meta(&mut self, chs: DiskChs, meta: SectorMeta) {
        self.meta.insert(chs, meta);
    }

    fn write_track(&mut self, track: u8, side: u8, raw: &[u8]) -> Result<(), MediaError> {
        if self.write_protected {
            return Err(MediaError::WriteProtected);
        }
        if !self.geometry.contains(track, side) {
            return Err(MediaError::BadTrack(track, side));
        }
        // A flat sector image has nowhere to keep address marks and gaps, so the raw track is
        // held for the lifetime of the media only.
        log::debug!("Raw track {}:{} written ({} bytes), not persisted", track, side, raw.len());
        self.raw_tracks.insert((track, side), raw.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn image() -> (ZonedGeometry, Cursor<Vec<u8>>) {
        let geom = ZonedGeometry::qx1();
        let size = geom.total_size();
        (geom, Cursor::new(vec![0u8; size]))
    }

    #[test]
    fn test_write_through() {
        let (geom, cursor) = image();
        let offset = geom.locate(41, 0, 3).unwrap();
        let mut media = ImageMedia::from_stream(cursor, geom, false).unwrap();
        media.write_bytes(offset, &[0x5A; 512]).unwrap();

        let mut buf = [0u8; 512];
        media.read_bytes(offset, &mut buf).unwrap();
        assert_eq!(buf, [0x5A; 512]);

        let backing = media.into_inner().unwrap().into_inner();
        assert_eq!(&backing[offset..offset + 512], &[0x5A; 512]);
    }

    #[test]
    fn test_write_protected_stream() {
        let (geom, cursor) = image();
        let mut media = ImageMedia::from_stream(cursor, geom, true).unwrap();
        assert!(media.is_write_protected());
        assert!(matches!(media.write_bytes(0, &[1]), Err(MediaError::WriteProtected)));
        assert!(media.into_inner().is_none());
    }

    #[test]
    fn test_size_mismatch() {
        let geom = ZonedGeometry::qx1();
        let result = ImageMedia::from_stream(Cursor::new(vec![0u8; 1000]), geom, false);
        assert!(matches!(result, Err(MediaError::SizeMismatch { found: 1000, .. })));
    }
}
