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

    devices::fdc::data_adapter.rs

    Byte-streaming transfer unit for data-bearing commands.
*/

//! The DataAdapter serves or collects one byte per Data register access. Sector transfers feed
//! every byte through a CRC accumulator so the record can be verified (reads) or its CRC
//! generated (writes) once the last byte has moved.

use crate::devices::fdc::crc::Crc16;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransferState {
    #[default]
    Idle,
    Reading,
    Writing,
}

#[derive(Default)]
pub struct DataAdapter {
    state: TransferState,
    data: Vec<u8>,
    cursor: usize,
    crc: Option<Crc16>,
}

impl DataAdapter {
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Begin serving `data` to the host. If `track_crc` is set, served bytes are fed to the CRC.
    pub fn begin_read(&mut self, data: Vec<u8>, track_crc: bool) {
        self.state = TransferState::Reading;
        self.data = data;
        self.cursor = 0;
        self.crc = track_crc.then(Crc16::new);
    }

    /// Begin collecting `len` bytes from the host.
    pub fn begin_write(&mut self, len: usize, track_crc: bool) {
        self.state = TransferState::Writing;
        self.data = vec![0; len];
        self.cursor = 0;
        self.crc = track_crc.then(Crc16::new);
    }

    /// Serve the next byte. Returns None if no read is in progress or the buffer is exhausted.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.state != TransferState::Reading {
            return None;
        }
        let byte = *self.data.get(self.cursor)?;
        self.cursor += 1;
        if let Some(crc) = &mut self.crc {
            crc.compute(byte);
        }
        Some(byte)
    }

    /// Collect the next byte. Returns false if no write is in progress or the buffer is full.
    pub fn write_byte(&mut self, byte: u8) -> bool {
        if self.state != TransferState::Writing || self.cursor >= self.data.len() {
            return false;
        }
        self.data[self.cursor] = byte;
        self.cursor += 1;
        if let Some(crc) = &mut self.crc {
            crc.compute(byte);
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.state != TransferState::Idle && self.cursor >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    pub fn crc(&self) -> Option<Crc16> {
        self.crc
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// End the transfer and return the buffer.
    pub fn finish(&mut self) -> Vec<u8> {
        self.state = TransferState::Idle;
        self.cursor = 0;
        self.crc = None;
        std::mem::take(&mut self.data)
    }

    pub fn reset(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::fdc::crc::crc16;

    #[test]
    fn test_read_stream() {
        let mut adapter = DataAdapter::default();
        adapter.begin_read(vec![1, 2, 3], true);
        assert_eq!(adapter.read_byte(), Some(1));
        assert!(!adapter.is_complete());
        assert_eq!(adapter.read_byte(), Some(2));
        assert_eq!(adapter.read_byte(), Some(3));
        assert!(adapter.is_complete());
        assert_eq!(adapter.read_byte(), None);
        assert_eq!(adapter.crc().unwrap().value(), crc16(&[1, 2, 3]));
    }

    #[test]
    fn test_write_stream() {
        let mut adapter = DataAdapter::default();
        adapter.begin_write(2, false);
        assert!(adapter.write_byte(0xAA));
        assert_eq!(adapter.remaining(), 1);
        assert!(adapter.write_byte(0x55));
        assert!(!adapter.write_byte(0x00));
        assert!(adapter.is_complete());
        assert!(adapter.crc().is_none());
        assert_eq!(adapter.finish(), vec![0xAA, 0x55]);
        assert_eq!(adapter.state(), TransferState::Idle);
        assert!(!adapter.is_complete());
    }

    #[test]
    fn test_direction_is_enforced() {
        let mut adapter = DataAdapter::default();
        assert_eq!(adapter.read_byte(), None);
        adapter.begin_read(vec![9], false);
        assert!(!adapter.write_byte(1));
    }
}
