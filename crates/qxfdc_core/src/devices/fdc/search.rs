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

    devices::fdc::search.rs

    Rotational sector search.
*/

//! A real disk keeps spinning between commands, so a search for a sector begins with whichever
//! id field passes under the head next, not with the first sector of the track. [RotationalSearch]
//! keeps a cursor into the physical slot order of the track that persists between searches.

use crate::{device_traits::mediastore::MediaStore, device_types::chs::DiskChsn};

#[derive(Copy, Clone, Debug, Default)]
pub struct RotationalSearch {
    cursor: usize,
}

impl RotationalSearch {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// The physical slot that will pass under the head next.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Return the number of slots on the track, or None if the track is not readable.
    fn slots(media: &dyn MediaStore, track: u8, side: u8) -> Option<usize> {
        if !media.is_inserted() || !media.geometry().contains(track, side) {
            return None;
        }
        media
            .track_geometry(track)
            .map(|zone| zone.sectors() as usize)
            .filter(|&n| n > 0)
    }

    /// Scan one full rotation of the track for the sector `wanted`, starting at the cursor.
    /// If `side_compare` is given, the side field of the id must match it as well.
    /// On a match the cursor moves just past the matching slot and the slot and id are returned.
    pub fn search_sector(
        &mut self,
        media: &dyn MediaStore,
        track: u8,
        side: u8,
        wanted: u8,
        side_compare: Option<u8>,
    ) -> Option<(usize, DiskChsn)> {
        let n = RotationalSearch::slots(media, track, side)?;
        if self.cursor >= n {
            self.cursor = 0;
        }

        for i in 0..n {
            let slot = (self.cursor + i) % n;
            let Some(id) = media.sector_id(track, side, slot) else {
                continue;
            };
            if id.s() != wanted {
                continue;
            }
            if side_compare.is_some_and(|s| id.h() != s) {
                continue;
            }
            self.cursor = (slot + 1) % n;
            return Some((slot, id));
        }
        None
    }

    /// Return the id field under the head and advance the cursor past it.
    pub fn next_address(&mut self, media: &dyn MediaStore, track: u8, side: u8) -> Option<(usize, DiskChsn)> {
        let n = RotationalSearch::slots(media, track, side)?;
        if self.cursor >= n {
            self.cursor = 0;
        }
        let slot = self.cursor;
        let id = media.sector_id(track, side, slot)?;
        self.cursor = (slot + 1) % n;
        Some((slot, id))
    }
}
