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

    devices::fdc::crc.rs

    CRC16-CCITT as used for id and data records: polynomial 0x1021, seed
    0xFFFF, no reflection.
*/

pub const CRC_SEED: u16 = 0xFFFF;
pub const CRC_POLY: u16 = 0x1021;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    pub fn new() -> Self {
        Self { value: CRC_SEED }
    }

    pub fn reset(&mut self) {
        self.value = CRC_SEED;
    }

    /// Feed one byte into the accumulator.
    pub fn compute(&mut self, byte: u8) {
        self.value ^= (byte as u16) << 8;
        for _ in 0..8 {
            self.value = if self.value & 0x8000 != 0 {
                (self.value << 1) ^ CRC_POLY
            }
            else {
                self.value << 1
            };
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.compute(byte);
        }
    }

    #[inline]
    pub fn value(&self) -> u16 {
        self.value
    }

    /// The first CRC byte as it follows a record on disk.
    #[inline]
    pub fn msb(&self) -> u8 {
        (self.value >> 8) as u8
    }

    #[inline]
    pub fn lsb(&self) -> u8 {
        self.value as u8
    }

    /// Compare the accumulated value against a stored CRC.
    pub fn check(&self, msb: u8, lsb: u8) -> bool {
        self.value == u16::from_be_bytes([msb, lsb])
    }
}

/// Compute the CRC of a complete record.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.value()
}
