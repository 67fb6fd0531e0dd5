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

    device_types::chs.rs

    Sector addressing types.
*/

//! Define a [DiskChs] that represents track, side, sector addressing, and a [DiskChsn] that
//! adds the size code carried in a sector's id field.

use std::fmt::Display;

/// A structure representing a track, side and sector id address
///  - Track (c)
///  - Side (h)
///  - Sector ID (s)
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DiskChs {
    pub(crate) c: u8,
    pub(crate) h: u8,
    pub(crate) s: u8,
}

impl From<(u8, u8, u8)> for DiskChs {
    fn from((c, h, s): (u8, u8, u8)) -> Self {
        Self { c, h, s }
    }
}

impl From<DiskChs> for (u8, u8, u8) {
    fn from(chs: DiskChs) -> Self {
        (chs.c, chs.h, chs.s)
    }
}

impl Display for DiskChs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} s:{:2}]", self.c, self.h, self.s)
    }
}

impl DiskChs {
    pub fn new(c: u8, h: u8, s: u8) -> Self {
        Self { c, h, s }
    }
    #[inline]
    pub fn get(&self) -> (u8, u8, u8) {
        (self.c, self.h, self.s)
    }
    /// Return the track (c) field.
    #[inline]
    pub fn c(&self) -> u8 {
        self.c
    }
    /// Return the side (h) field.
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return the sector id (s) field.
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
}

/// A sector id field as recorded on the disk surface: track, side, sector id and size code (n).
/// The size of the sector in bytes is `128 << n`.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DiskChsn {
    pub(crate) chs: DiskChs,
    pub(crate) n:   u8,
}

impl Display for DiskChsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} s:{:2} n:{}]", self.chs.c, self.chs.h, self.chs.s, self.n)
    }
}

impl DiskChsn {
    pub fn new(c: u8, h: u8, s: u8, n: u8) -> Self {
        Self {
            chs: DiskChs::new(c, h, s),
            n,
        }
    }
    #[inline]
    pub fn chs(&self) -> DiskChs {
        self.chs
    }
    #[inline]
    pub fn c(&self) -> u8 {
        self.chs.c
    }
    #[inline]
    pub fn h(&self) -> u8 {
        self.chs.h
    }
    #[inline]
    pub fn s(&self) -> u8 {
        self.chs.s
    }
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
    /// Return the size of the sector in bytes, as encoded by the size code.
    pub fn size(&self) -> usize {
        DiskChsn::n_to_bytes(self.n)
    }
    /// The four id bytes in the order they appear on disk and in a Read Address record.
    pub fn id_bytes(&self) -> [u8; 4] {
        [self.chs.c, self.chs.h, self.chs.s, self.n]
    }
    /// Convert a size code to a size in bytes. Codes above 7 are clamped.
    pub fn n_to_bytes(n: u8) -> usize {
        128usize << n.min(7)
    }
    /// Convert a size in bytes to a size code. Sizes between codes round up.
    pub fn bytes_to_n(size: usize) -> u8 {
        let mut n = 0;
        let mut s = 128;
        while s < size && n < 7 {
            s <<= 1;
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_codes() {
        assert_eq!(DiskChsn::bytes_to_n(128), 0);
        assert_eq!(DiskChsn::bytes_to_n(256), 1);
        assert_eq!(DiskChsn::bytes_to_n(512), 2);
        assert_eq!(DiskChsn::bytes_to_n(1024), 3);
        assert_eq!(DiskChsn::bytes_to_n(2048), 4);
        for n in 0..5 {
            assert_eq!(DiskChsn::bytes_to_n(DiskChsn::n_to_bytes(n)), n);
        }
    }

    #[test]
    fn test_id_bytes() {
        let id = DiskChsn::new(12, 1, 7, 3);
        assert_eq!(id.id_bytes(), [12, 1, 7, 3]);
        assert_eq!(id.size(), 1024);
        assert_eq!(id.chs(), DiskChs::from((12, 1, 7)));
    }
}
