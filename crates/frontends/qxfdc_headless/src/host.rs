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

    qxfdc_headless::host.rs

    A host session drives the controller through its register protocol the
    way the QX1's CPU does: issue a command, service DRQ, wait for IRQ.
*/

use anyhow::{bail, Result};
use qxfdc_core::{
    device_types::fdc::{ST_CRCERR, ST_LOSTDATA, ST_NOTREADY, ST_RECNFND, ST_SEEKERR},
    devices::fdc::crc::crc16,
    FloppyController,
    IoDevice,
};

pub const PORT_STATUS: u16 = 0;
pub const PORT_TRACK: u16 = 1;
pub const PORT_SECTOR: u16 = 2;
pub const PORT_DATA: u16 = 3;

pub const HOST_TICK_US: f64 = 50.0;
/// Longest a single command may run before the host gives up on it.
pub const HOST_TIMEOUT_US: f64 = 10_000_000.0;

pub const CMD_RESTORE: u8 = 0x08;
pub const CMD_SEEK_VERIFY: u8 = 0x1C;
pub const CMD_READ_SECTOR: u8 = 0x80;
pub const CMD_READ_ADDRESS: u8 = 0xC0;

/// Status bits that fail a read.
pub const READ_ERRORS: u8 = ST_NOTREADY | ST_RECNFND | ST_CRCERR | ST_LOSTDATA;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IdRecord {
    pub track: u8,
    pub side: u8,
    pub sector: u8,
    pub size_code: u8,
    pub crc: u16,
}

impl IdRecord {
    pub fn from_bytes(bytes: &[u8]) -> Option<IdRecord> {
        match bytes {
            &[track, side, sector, size_code, msb, lsb] => Some(IdRecord {
                track,
                side,
                sector,
                size_code,
                crc: u16::from_be_bytes([msb, lsb]),
            }),
            _ => None,
        }
    }

    pub fn crc_ok(&self) -> bool {
        crc16(&[self.track, self.side, self.sector, self.size_code]) == self.crc
    }
}

#[derive(Clone, Debug)]
pub struct SectorRead {
    pub sector: u8,
    pub data: Vec<u8>,
    pub status: u8,
}

impl SectorRead {
    pub fn is_ok(&self) -> bool {
        self.status & READ_ERRORS == 0
    }
}

pub struct HostSession<'a> {
    fdc: &'a mut FloppyController,
    elapsed_us: f64,
}

impl<'a> HostSession<'a> {
    pub fn new(fdc: &'a mut FloppyController) -> Self {
        Self { fdc, elapsed_us: 0.0 }
    }

    /// Emulated time spent by this session.
    pub fn elapsed_us(&self) -> f64 {
        self.elapsed_us
    }

    fn command(&mut self, cmd: u8) {
        log::debug!("Host command: {:02X}", cmd);
        self.fdc.write_u8(PORT_STATUS, cmd);
    }

    /// Run the controller until it raises IRQ, collecting any bytes it offers on DRQ.
    /// Returns the status register read that acknowledges the interrupt.
    fn complete(&mut self, mut buf: Option<&mut Vec<u8>>) -> Result<u8> {
        let start = self.elapsed_us;
        loop {
            while self.fdc.drq() {
                let byte = self.fdc.read_u8(PORT_DATA);
                if let Some(buf) = buf.as_mut() {
                    buf.push(byte);
                }
            }
            if self.fdc.irq() {
                return Ok(self.fdc.read_u8(PORT_STATUS));
            }
            if self.elapsed_us - start > HOST_TIMEOUT_US {
                bail!("Controller timed out during {}", self.fdc.command_type());
            }
            self.fdc.run(HOST_TICK_US);
            self.elapsed_us += HOST_TICK_US;
        }
    }

    pub fn restore(&mut self) -> Result<u8> {
        self.command(CMD_RESTORE);
        self.complete(None)
    }

    /// Seek to `track` and select `side`, verifying that the head landed on the right track.
    pub fn seek(&mut self, track: u8, side: u8) -> Result<u8> {
        self.fdc.set_side(side);
        self.fdc.write_u8(PORT_DATA, track);
        self.command(CMD_SEEK_VERIFY);
        let status = self.complete(None)?;
        if status & ST_SEEKERR != 0 {
            bail!("Seek error on track {} side {} (status {:02X})", track, side, status);
        }
        if status & ST_NOTREADY != 0 {
            bail!("Drive not ready");
        }
        Ok(status)
    }

    /// Read the next id field passing under the head.
    pub fn read_address(&mut self) -> Result<(Option<IdRecord>, u8)> {
        let mut buf = Vec::with_capacity(6);
        self.command(CMD_READ_ADDRESS);
        let status = self.complete(Some(&mut buf))?;
        Ok((IdRecord::from_bytes(&buf), status))
    }

    /// Read `count` consecutive id fields of the current track.
    pub fn read_ids(&mut self, count: usize) -> Result<Vec<IdRecord>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            match self.read_address()? {
                (Some(id), status) if status & READ_ERRORS == 0 => ids.push(id),
                (_, status) => {
                    log::warn!("Read Address failed with status {:02X}", status);
                    break;
                }
            }
        }
        Ok(ids)
    }

    pub fn read_sector(&mut self, sector: u8) -> Result<SectorRead> {
        let mut data = Vec::new();
        self.fdc.write_u8(PORT_SECTOR, sector);
        self.command(CMD_READ_SECTOR);
        let status = self.complete(Some(&mut data))?;
        Ok(SectorRead { sector, data, status })
    }

    pub fn track_register(&mut self) -> u8 {
        self.fdc.read_u8(PORT_TRACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qxfdc_core::{
        device_traits::mediastore::{MediaStore, SectorMeta},
        device_types::{chs::DiskChs, geometry::ZonedGeometry},
        media::MemoryMedia,
        FdcConfig,
    };
    use std::sync::{Arc, RwLock};

    fn controller(media: MemoryMedia) -> FloppyController {
        let mut fdc = FloppyController::new(FdcConfig::default());
        fdc.insert_media(0, Arc::new(RwLock::new(media)));
        fdc.set_motor(true);
        fdc
    }

    #[test]
    fn test_seek_and_read_ids() {
        let mut fdc = controller(MemoryMedia::new(ZonedGeometry::qx1()));
        let mut session = HostSession::new(&mut fdc);
        session.restore().unwrap();
        session.seek(3, 1).unwrap();
        assert_eq!(session.track_register(), 3);

        let ids = session.read_ids(5).unwrap();
        let mut sectors: Vec<u8> = ids.iter().map(|id| id.sector).collect();
        assert!(ids.iter().all(|id| id.track == 3 && id.side == 1 && id.crc_ok()));
        sectors.sort_unstable();
        assert_eq!(sectors, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_read_sector_reports_errors() {
        let mut media = MemoryMedia::new(ZonedGeometry::qx1());
        media.set_sector_meta(
            DiskChs::new(0, 0, 2),
            SectorMeta {
                deleted: false,
                crc: Some(0),
            },
        );
        let mut fdc = controller(media);
        let mut session = HostSession::new(&mut fdc);

        let good = session.read_sector(1).unwrap();
        assert!(good.is_ok());
        assert_eq!(good.data.len(), 1024);

        let bad = session.read_sector(2).unwrap();
        assert!(!bad.is_ok());
        assert_ne!(bad.status & ST_CRCERR, 0);

        let missing = session.read_sector(12).unwrap();
        assert_ne!(missing.status & ST_RECNFND, 0);
        assert!(missing.data.is_empty());
    }

    #[test]
    fn test_id_record_crc() {
        let id = IdRecord::from_bytes(&[0, 0, 0, 3, 0xB4, 0xA3]).unwrap();
        assert!(id.crc_ok());
        let id = IdRecord::from_bytes(&[0, 0, 0, 3, 0xB4, 0xA4]).unwrap();
        assert!(!id.crc_ok());
        assert!(IdRecord::from_bytes(&[0, 0, 0]).is_none());
    }
}
