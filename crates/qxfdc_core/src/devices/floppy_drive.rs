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

    devices::floppy_drive.rs

    Implements a floppy drive: head position, motor and an optional media
    store shared with the owning application.
*/

use crate::device_traits::mediastore::SharedMedia;

/// Acquire a read lock on shared media without blocking. A contended lock yields the fallback.
#[macro_export]
macro_rules! read_lock_or {
    ($arc_lock:expr, $fallback:expr) => {{
        match $arc_lock.try_read() {
            Ok(guard) => guard,
            Err(_) => {
                log::error!("Failed to acquire media read lock");
                return $fallback;
            }
        }
    }};
}

/// Acquire a write lock on shared media without blocking. A contended lock yields the fallback.
#[macro_export]
macro_rules! write_lock_or {
    ($arc_lock:expr, $fallback:expr) => {{
        match $arc_lock.try_write() {
            Ok(guard) => guard,
            Err(_) => {
                log::error!("Failed to acquire media write lock");
                return $fallback;
            }
        }
    }};
}

#[derive(Default)]
pub struct FloppyDiskDrive {
    pub(crate) drive_n: usize,
    pub(crate) track: u8,
    pub(crate) motor_on: bool,
    pub(crate) access: bool,
    media: Option<SharedMedia>,
}

impl FloppyDiskDrive {
    pub fn new(drive_n: usize) -> Self {
        Self {
            drive_n,
            ..Default::default()
        }
    }

    /// Return the track the head is physically positioned over.
    #[inline]
    pub fn track(&self) -> u8 {
        self.track
    }

    pub fn set_track(&mut self, track: u8) {
        self.track = track;
    }

    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn set_motor(&mut self, state: bool) {
        if state != self.motor_on {
            log::trace!("Drive {}: turning motor {}", self.drive_n, if state { "on" } else { "off" });
        }
        self.motor_on = state;
    }

    pub fn insert(&mut self, media: SharedMedia) {
        log::debug!("Drive {}: media inserted", self.drive_n);
        self.media = Some(media);
    }

    pub fn eject(&mut self) -> Option<SharedMedia> {
        log::debug!("Drive {}: media ejected", self.drive_n);
        self.media.take()
    }

    pub fn media(&self) -> Option<&SharedMedia> {
        self.media.as_ref()
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    /// Return true if media is present and reports itself inserted.
    pub fn is_inserted(&self) -> bool {
        let Some(media) = &self.media else {
            return false;
        };
        let media = read_lock_or!(media, false);
        media.is_inserted()
    }

    /// A drive is ready when media is inserted and the motor is running.
    pub fn is_ready(&self) -> bool {
        self.motor_on && self.is_inserted()
    }

    pub fn is_write_protected(&self) -> bool {
        let Some(media) = &self.media else {
            return false;
        };
        let media = read_lock_or!(media, false);
        media.is_inserted() && media.is_write_protected()
    }

    /// The highest track the head can reach. Without media the head can travel 80 tracks.
    pub fn max_track(&self) -> u8 {
        let Some(media) = &self.media else {
            return 79;
        };
        let media = read_lock_or!(media, 79);
        media.geometry().max_track()
    }

    /// The number of sectors on the track under the head, if the media is readable.
    pub fn sectors_per_track(&self) -> Option<u8> {
        let media = self.media.as_ref()?;
        let media = read_lock_or!(media, None);
        media.track_geometry(self.track).map(|zone| zone.sectors())
    }

    /// Move the head one track in the specified direction, clamped to the travel of the drive.
    pub fn step(&mut self, inward: bool) {
        let max = self.max_track();
        if inward {
            self.track = self.track.saturating_add(1).min(max);
        }
        else {
            self.track = self.track.saturating_sub(1);
        }
    }

    /// Return and clear the access flag.
    pub fn take_access(&mut self) -> bool {
        std::mem::take(&mut self.access)
    }
}
