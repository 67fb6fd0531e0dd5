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

    devices::fdc::tests.rs

    Controller tests. These drive the controller through its ports and the
    run() clock only, the way a host would.
*/

use std::sync::{Arc, RwLock};

use super::{
    crc::crc16,
    scheduler::EventKind,
    ControllerPhase,
    FloppyController,
};
use crate::{
    bus::IoDevice,
    coreconfig::{FdcConfig, FdcVariant, RegisterPokePolicy},
    device_traits::mediastore::{MediaStore, SectorMeta, FORMAT_FILL_BYTE},
    device_types::{
        chs::DiskChs,
        fdc::{
            CommandType,
            ST_BUSY,
            ST_CRCERR,
            ST_HEADENG,
            ST_INDEX,
            ST_LOSTDATA,
            ST_NOTREADY,
            ST_RECNFND,
            ST_RECTYPE,
            ST_SEEKERR,
            ST_TRACK00,
            ST_WRITEFAULT,
            ST_WRITEP,
        },
        geometry::ZonedGeometry,
    },
    media::MemoryMedia,
};

const PORT_STATUS: u16 = 0;
const PORT_TRACK: u16 = 1;
const PORT_SECTOR: u16 = 2;
const PORT_DATA: u16 = 3;

const TICK_US: f64 = 10.0;
const MAX_TICKS: usize = 1_000_000;

const ERROR_BITS: u8 = ST_CRCERR | ST_RECNFND | ST_LOSTDATA | ST_WRITEFAULT;

struct TestRig {
    fdc: FloppyController,
    media: Arc<RwLock<MemoryMedia>>,
}

impl TestRig {
    fn new(config: FdcConfig) -> Self {
        let geometry = ZonedGeometry::qx1();
        let data = (0..geometry.total_size()).map(|i| (i % 251) as u8).collect();
        let media = MemoryMedia::from_bytes(geometry, data).unwrap();
        TestRig::with_media(config, media)
    }

    fn with_media(config: FdcConfig, media: MemoryMedia) -> Self {
        let media = Arc::new(RwLock::new(media));
        let mut fdc = FloppyController::new(config);
        fdc.insert_media(0, media.clone());
        fdc.set_motor(true);
        TestRig { fdc, media }
    }

    fn command(&mut self, cmd: u8) {
        self.fdc.write_u8(PORT_STATUS, cmd);
    }

    fn status(&mut self) -> u8 {
        self.fdc.read_u8(PORT_STATUS)
    }

    fn wait_irq(&mut self) {
        for _ in 0..MAX_TICKS {
            if self.fdc.irq() {
                return;
            }
            self.fdc.run(TICK_US);
        }
        panic!("Timed out waiting for IRQ");
    }

    fn seek(&mut self, track: u8) {
        self.fdc.write_u8(PORT_DATA, track);
        self.command(0x10);
        self.wait_irq();
        self.status();
    }

    /// Read every byte offered on DRQ until the command completes.
    fn read_until_irq(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..MAX_TICKS {
            while self.fdc.drq() {
                out.push(self.fdc.read_u8(PORT_DATA));
            }
            if self.fdc.irq() {
                return out;
            }
            self.fdc.run(TICK_US);
        }
        panic!("Timed out reading data");
    }

    /// Supply bytes from `data` on DRQ until the command completes. Returns the count written.
    fn write_until_irq(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        for _ in 0..MAX_TICKS {
            while self.fdc.drq() && written < data.len() {
                self.fdc.write_u8(PORT_DATA, data[written]);
                written += 1;
            }
            if self.fdc.irq() {
                return written;
            }
            self.fdc.run(TICK_US);
        }
        panic!("Timed out writing data");
    }

    fn image(&self, offset: usize, len: usize) -> Vec<u8> {
        self.media.read().unwrap().data()[offset..offset + len].to_vec()
    }
}

fn default_rig() -> TestRig {
    TestRig::new(FdcConfig::default())
}

#[test]
fn test_restore_reports_track0() {
    let mut rig = default_rig();
    rig.seek(7);
    assert_eq!(rig.fdc.physical_track(), 7);

    rig.command(0x08);
    rig.wait_irq();
    let status = rig.status();
    assert_eq!(status & ST_BUSY, 0);
    assert_ne!(status & ST_TRACK00, 0);
    assert_ne!(status & ST_HEADENG, 0);
    assert_eq!(rig.fdc.track_register(), 0);
    assert_eq!(rig.fdc.data_register(), 0);
    assert_eq!(rig.fdc.physical_track(), 0);
}

#[test]
fn test_seek_issues_one_step_per_track() {
    let mut rig = default_rig();
    rig.seek(10);
    assert_eq!(rig.fdc.scheduler().fired_count(EventKind::Seek), 10);
    assert_eq!(rig.fdc.physical_track(), 10);
    assert_eq!(rig.fdc.track_register(), 10);
    assert_eq!(rig.status() & ST_TRACK00, 0);
}

#[test]
fn test_seek_to_current_track_completes() {
    let mut rig = default_rig();
    rig.seek(0);
    assert_eq!(rig.fdc.scheduler().fired_count(EventKind::Seek), 0);
    assert_eq!(rig.fdc.scheduler().fired_count(EventKind::SeekEnd), 1);
}

#[test]
fn test_seek_is_clamped_to_last_track() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_DATA, 200);
    rig.command(0x13);
    rig.wait_irq();
    assert_eq!(rig.fdc.physical_track(), 79);
}

#[test]
fn test_second_seek_supersedes_first() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_DATA, 10);
    rig.command(0x10);
    rig.fdc.run(18_001.0);
    assert_eq!(rig.fdc.physical_track(), 3);
    assert_ne!(rig.status() & ST_BUSY, 0);

    rig.fdc.write_u8(PORT_DATA, 5);
    rig.command(0x10);
    rig.wait_irq();
    assert_eq!(rig.fdc.physical_track(), 5);
    assert_eq!(rig.fdc.track_register(), 5);
    assert_eq!(rig.fdc.scheduler().fired_count(EventKind::Seek), 5);
}

#[test]
fn test_step_commands() {
    let mut rig = default_rig();
    rig.seek(4);

    // Step-in with update
    rig.command(0x50);
    rig.wait_irq();
    rig.status();
    assert_eq!(rig.fdc.physical_track(), 5);
    assert_eq!(rig.fdc.track_register(), 5);

    // Step-out without update leaves the track register alone
    rig.command(0x60);
    rig.wait_irq();
    rig.status();
    assert_eq!(rig.fdc.physical_track(), 4);
    assert_eq!(rig.fdc.track_register(), 5);

    // Step repeats the last direction
    rig.command(0x30);
    rig.wait_irq();
    assert_eq!(rig.fdc.physical_track(), 3);
    assert_eq!(rig.fdc.track_register(), 3);
}

#[test]
fn test_verify_reports_seek_error() {
    let mut rig = default_rig();

    // Step-in with verify but no update: the ids on track 1 do not match the track register.
    rig.command(0x44);
    rig.wait_irq();
    assert_ne!(rig.status() & ST_SEEKERR, 0);

    // Seek with verify updates the track register and verifies cleanly.
    rig.fdc.write_u8(PORT_DATA, 12);
    rig.command(0x14);
    rig.wait_irq();
    assert_eq!(rig.status() & ST_SEEKERR, 0);
}

#[test]
fn test_index_pulse_once_per_rotation() {
    let mut rig = default_rig();
    rig.command(0x00);
    rig.wait_irq();

    // Track 0 carries 5 sectors.
    let pulses: Vec<bool> = (0..10).map(|_| rig.status() & ST_INDEX != 0).collect();
    assert_eq!(
        pulses,
        vec![true, false, false, false, false, true, false, false, false, false]
    );
}

#[test]
fn test_restore_without_media_reports_seek_error() {
    let mut fdc = FloppyController::new(FdcConfig::default());
    fdc.set_motor(true);
    fdc.write_u8(PORT_STATUS, 0x00);
    for _ in 0..MAX_TICKS {
        if fdc.irq() {
            break;
        }
        fdc.run(TICK_US);
    }
    assert!(fdc.irq());

    let status = fdc.read_u8(PORT_STATUS);
    assert_ne!(status & ST_SEEKERR, 0);
    assert_ne!(status & ST_NOTREADY, 0);
    assert_eq!(status & ST_INDEX, 0);
    assert_eq!(status & ST_BUSY, 0);
}

#[test]
fn test_seek_off_media_reports_seek_error_without_verify() {
    let mut rig = default_rig();
    rig.seek(3);
    assert_eq!(rig.status() & ST_SEEKERR, 0);

    assert!(rig.fdc.eject_media(0).is_some());
    rig.fdc.write_u8(PORT_DATA, 5);
    rig.command(0x10);
    rig.wait_irq();
    assert_ne!(rig.status() & ST_SEEKERR, 0);
    assert_eq!(rig.fdc.physical_track(), 5);
}

#[test]
fn test_write_protect_shown_for_type1() {
    let mut media = MemoryMedia::new(ZonedGeometry::qx1());
    media.set_write_protected(true);
    let mut rig = TestRig::with_media(FdcConfig::default(), media);
    rig.seek(1);
    assert_ne!(rig.status() & ST_WRITEP, 0);
}

#[test]
fn test_status_reads_clear_irq() {
    let mut rig = default_rig();
    rig.command(0x00);
    rig.wait_irq();
    assert!(rig.fdc.irq());
    rig.status();
    assert!(!rig.fdc.irq());
}

#[test]
fn test_force_interrupt_while_busy() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_DATA, 20);
    rig.command(0x10);
    rig.fdc.run(1_000.0);
    assert_ne!(rig.status() & ST_BUSY, 0);

    rig.command(0xD8);
    assert!(rig.fdc.irq());
    assert_eq!(rig.status() & ST_BUSY, 0);

    rig.fdc.run(200_000.0);
    assert_eq!(rig.status(), 0);
    assert_eq!(rig.fdc.physical_track(), 0);
    assert_eq!(rig.fdc.command_type(), CommandType::ForceInterrupt);
}

#[test]
fn test_force_interrupt_index_condition() {
    let mut rig = default_rig();
    rig.command(0xD4);
    assert!(!rig.fdc.irq());
    rig.fdc.run(50.0);
    assert!(!rig.fdc.irq());
    rig.fdc.run(100.0);
    assert!(rig.fdc.irq());
}

#[test]
fn test_force_interrupt_ready_transition() {
    let mut rig = default_rig();
    rig.command(0xD2);
    rig.fdc.run(200.0);
    assert!(!rig.fdc.irq());

    rig.fdc.set_motor(false);
    assert!(rig.fdc.irq());
    assert_eq!(rig.status(), ST_NOTREADY);
}

#[test]
fn test_busy_commands_are_ignored() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    assert_eq!(rig.fdc.command_type(), CommandType::ReadSector);

    rig.fdc.write_u8(PORT_DATA, 10);
    rig.command(0x10);
    assert_eq!(rig.fdc.command_type(), CommandType::ReadSector);

    let data = rig.read_until_irq();
    assert_eq!(data.len(), 1024);
    assert_eq!(rig.fdc.physical_track(), 0);
}

#[test]
fn test_status_is_busy_only_while_searching() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 2);
    rig.command(0x80);
    assert_eq!(rig.status(), ST_BUSY);
    rig.read_until_irq();
    assert_eq!(rig.status() & (ST_BUSY | ERROR_BITS), 0);
}

#[test]
fn test_read_sector() {
    let mut rig = default_rig();
    rig.seek(2);
    rig.fdc.write_u8(PORT_SECTOR, 3);
    rig.command(0x88);
    let data = rig.read_until_irq();

    let offset = ZonedGeometry::qx1().locate(2, 0, 3).unwrap();
    assert_eq!(data, rig.image(offset, 1024));
    assert_eq!(rig.status() & ERROR_BITS, 0);
    assert_eq!(rig.fdc.take_access_flags(), 0x01);
    assert_eq!(rig.fdc.take_access_flags(), 0x00);
}

#[test]
fn test_read_multi_reads_whole_track() {
    let mut rig = default_rig();
    rig.command(0x00);
    rig.wait_irq();
    rig.status();

    rig.fdc.write_u8(PORT_SECTOR, 0);
    rig.command(0x90);
    let data = rig.read_until_irq();

    assert_eq!(data.len(), 5 * 1024);
    assert_eq!(data, rig.image(0, 5 * 1024));
    assert_eq!(rig.fdc.sector_register(), 5);
    assert_eq!(rig.status() & (ST_BUSY | ERROR_BITS), 0);
}

#[test]
fn test_read_multi_side1_outer_zone() {
    let mut rig = default_rig();
    rig.seek(50);
    rig.fdc.set_side(1);
    rig.fdc.write_u8(PORT_SECTOR, 4);
    rig.command(0x90);
    let data = rig.read_until_irq();

    let geometry = ZonedGeometry::qx1();
    let offset = geometry.locate(50, 1, 4).unwrap();
    assert_eq!(data.len(), 5 * 512);
    assert_eq!(data, rig.image(offset, 5 * 512));
    assert_eq!(rig.fdc.sector_register(), 9);
}

#[test]
fn test_sector_not_found() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 9);
    rig.command(0x80);
    assert!(rig.fdc.irq());
    assert_ne!(rig.status() & ST_RECNFND, 0);
}

#[test]
fn test_side_compare_mismatch() {
    let mut rig = default_rig();
    rig.fdc.set_side(0);
    rig.fdc.write_u8(PORT_SECTOR, 0);
    rig.command(0x8A);
    assert!(rig.fdc.irq());
    assert_ne!(rig.status() & ST_RECNFND, 0);
    assert_eq!(rig.fdc.scheduler().fired_count(EventKind::Search), 0);
}

#[test]
fn test_not_ready() {
    let mut rig = default_rig();
    rig.fdc.set_motor(false);
    rig.fdc.write_u8(PORT_SECTOR, 0);
    rig.command(0x80);
    assert!(rig.fdc.irq());
    assert_ne!(rig.status() & ST_NOTREADY, 0);
}

#[test]
fn test_lost_data_when_drq_ignored() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    rig.wait_irq();
    let status = rig.status();
    assert_ne!(status & ST_LOSTDATA, 0);
    assert_eq!(status & ST_BUSY, 0);
    assert!(!rig.fdc.drq());
}

#[test]
fn test_write_sector_and_read_back() {
    let mut rig = default_rig();
    rig.seek(45);
    rig.fdc.write_u8(PORT_SECTOR, 6);
    rig.command(0xA0);
    let payload: Vec<u8> = (0..512).map(|i| (i * 3) as u8).collect();
    assert_eq!(rig.write_until_irq(&payload), 512);
    assert_eq!(rig.status() & ERROR_BITS, 0);

    let offset = ZonedGeometry::qx1().locate(45, 0, 6).unwrap();
    assert_eq!(rig.image(offset, 512), payload);
    let meta = rig.media.read().unwrap().sector_meta(DiskChs::new(45, 0, 6));
    assert_eq!(meta.crc, Some(crc16(&payload)));
    assert!(!meta.deleted);

    rig.command(0x80);
    assert_eq!(rig.read_until_irq(), payload);
    assert_eq!(rig.status() & ERROR_BITS, 0);
}

#[test]
fn test_deleted_mark_round_trip() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 2);
    rig.command(0xA1);
    rig.write_until_irq(&[0x11; 1024]);
    rig.status();

    rig.command(0x80);
    rig.read_until_irq();
    assert_ne!(rig.status() & ST_RECTYPE, 0);
}

#[test]
fn test_write_protected_write_faults() {
    let mut media = MemoryMedia::new(ZonedGeometry::qx1());
    media.set_write_protected(true);
    let mut rig = TestRig::with_media(FdcConfig::default(), media);

    rig.fdc.write_u8(PORT_SECTOR, 0);
    rig.command(0xA0);
    assert!(rig.fdc.irq());
    assert!(!rig.fdc.drq());
    assert_ne!(rig.status() & ST_WRITEFAULT, 0);
    assert_eq!(rig.media.read().unwrap().write_count(), 0);
    assert!(rig.image(0, 1024).iter().all(|&b| b == FORMAT_FILL_BYTE));
}

#[test]
fn test_crc_error_reported() {
    let mut rig = default_rig();
    rig.media.write().unwrap().set_sector_meta(
        DiskChs::new(0, 0, 1),
        SectorMeta {
            deleted: false,
            crc: Some(0x1234),
        },
    );
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    rig.read_until_irq();
    assert_ne!(rig.status() & ST_CRCERR, 0);
}

#[test]
fn test_crc_error_ignored() {
    let config = FdcConfig {
        ignore_crc: true,
        ..Default::default()
    };
    let mut rig = TestRig::new(config);
    rig.media.write().unwrap().set_sector_meta(
        DiskChs::new(0, 0, 1),
        SectorMeta {
            deleted: false,
            crc: Some(0x1234),
        },
    );
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    rig.read_until_irq();
    assert_eq!(rig.status() & ST_CRCERR, 0);
}

#[test]
fn test_read_address() {
    let mut rig = default_rig();
    rig.command(0xC0);
    let record = rig.read_until_irq();
    assert_eq!(record, vec![0, 0, 0, 3, 0xB4, 0xA3]);
    assert_eq!(rig.fdc.sector_register(), 0);
    rig.status();

    // The next id under the head follows the interleave.
    rig.command(0xC0);
    let record = rig.read_until_irq();
    let crc = crc16(&[0, 0, 3, 3]);
    assert_eq!(record, vec![0, 0, 3, 3, (crc >> 8) as u8, crc as u8]);
}

#[test]
fn test_read_address_copies_track() {
    let mut rig = default_rig();
    rig.seek(33);
    rig.command(0xC4);
    let record = rig.read_until_irq();
    assert_eq!(record[0], 33);
    assert_eq!(rig.fdc.sector_register(), 33);
}

#[test]
fn test_read_track() {
    let mut rig = default_rig();
    rig.command(0xE0);
    let raw = rig.read_until_irq();
    assert_eq!(raw.len(), 0x1800);

    // The data register overruns once the last byte of the track has been read.
    let status = rig.status();
    assert_ne!(status & ST_LOSTDATA, 0);
    assert_eq!(status & (ERROR_BITS & !ST_LOSTDATA), 0);
    assert_eq!(rig.fdc.command_type(), CommandType::Idle);
}

#[test]
fn test_write_track_formats() {
    let mut rig = default_rig();
    rig.seek(1);
    rig.command(0xF0);
    let written = rig.write_until_irq(&[0x4E; 0x1800]);
    assert_eq!(written, 0x1800);
    assert_eq!(rig.status() & ERROR_BITS, 0);

    let geometry = ZonedGeometry::qx1();
    let offset = geometry.track_offset(1, 0).unwrap();
    assert!(rig.image(offset, 5 * 1024).iter().all(|&b| b == FORMAT_FILL_BYTE));
    assert_eq!(rig.media.read().unwrap().raw_track(1, 0).map(|t| t.len()), Some(0x1800));
}

#[test]
fn test_write_track_protected() {
    let mut media = MemoryMedia::new(ZonedGeometry::qx1());
    media.set_write_protected(true);
    let mut rig = TestRig::with_media(FdcConfig::default(), media);
    rig.command(0xF0);
    assert!(rig.fdc.irq());
    assert_ne!(rig.status() & ST_WRITEFAULT, 0);
}

#[test]
fn test_mb8876_inverts_bus() {
    let config = FdcConfig {
        variant: FdcVariant::Mb8876,
        ..Default::default()
    };
    let mut rig = TestRig::new(config);
    rig.fdc.write_u8(PORT_SECTOR, !3);
    assert_eq!(rig.fdc.sector_register(), 3);
    assert_eq!(rig.fdc.read_u8(PORT_SECTOR), !3);
    rig.fdc.write_u8(PORT_TRACK, !0);
    assert_eq!(rig.fdc.track_register(), 0);
}

fn poke_during_search(policy: RegisterPokePolicy) -> (TestRig, Vec<u8>) {
    let config = FdcConfig {
        register_poke: policy,
        ..Default::default()
    };
    let mut rig = TestRig::new(config);
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    rig.fdc.write_u8(PORT_SECTOR, 4);
    let data = rig.read_until_irq();
    (rig, data)
}

#[test]
fn test_register_poke_absorb() {
    let (rig, data) = poke_during_search(RegisterPokePolicy::Absorb);
    assert_eq!(rig.fdc.sector_register(), 4);
    assert_eq!(data, rig.image(4 * 1024, 1024));
}

#[test]
fn test_register_poke_absorb_before_first_byte() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    for _ in 0..MAX_TICKS {
        if rig.fdc.drq() {
            break;
        }
        rig.fdc.run(TICK_US);
    }
    assert!(rig.fdc.drq());

    rig.fdc.write_u8(PORT_SECTOR, 3);
    assert!(!rig.fdc.drq());
    let data = rig.read_until_irq();
    assert_eq!(rig.fdc.sector_register(), 3);
    assert_eq!(data, rig.image(3 * 1024, 1024));
    assert_eq!(rig.status() & ERROR_BITS, 0);
}

#[test]
fn test_register_poke_after_first_byte_is_kept() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_SECTOR, 1);
    rig.command(0x80);
    for _ in 0..MAX_TICKS {
        if rig.fdc.drq() {
            break;
        }
        rig.fdc.run(TICK_US);
    }
    let first = rig.fdc.read_u8(PORT_DATA);
    rig.fdc.write_u8(PORT_SECTOR, 3);

    let mut data = vec![first];
    data.extend(rig.read_until_irq());
    assert_eq!(rig.fdc.sector_register(), 3);
    assert_eq!(data, rig.image(1024, 1024));
}

#[test]
fn test_register_poke_latch() {
    let (rig, data) = poke_during_search(RegisterPokePolicy::Latch);
    assert_eq!(rig.fdc.sector_register(), 4);
    assert_eq!(data, rig.image(1024, 1024));
}

#[test]
fn test_register_poke_reject() {
    let (rig, data) = poke_during_search(RegisterPokePolicy::Reject);
    assert_eq!(rig.fdc.sector_register(), 1);
    assert_eq!(data, rig.image(1024, 1024));
}

#[test]
fn test_stale_events_are_discarded() {
    let mut rig = default_rig();
    rig.fdc
        .scheduler_mut()
        .schedule(EventKind::Lost, 10.0, CommandType::ReadSector);
    rig.fdc.run(20.0);
    assert_eq!(rig.fdc.scheduler().stale_count(EventKind::Lost), 1);
    assert!(!rig.fdc.irq());
    assert_eq!(rig.fdc.command_type(), CommandType::Idle);
    assert_eq!(rig.fdc.phase(), ControllerPhase::Idle);
}

#[test]
fn test_debug_state() {
    let mut rig = default_rig();
    rig.fdc.write_u8(PORT_DATA, 3);
    rig.command(0x10);
    let state = rig.fdc.get_debug_state();
    assert_eq!(state.command_type, CommandType::Seek);
    assert_eq!(state.pending_events.len(), 1);
    assert_eq!(state.pending_events[0].0, EventKind::Seek);
    assert!(!state.cmd_log.is_empty());
    assert_ne!(state.status_register & ST_BUSY, 0);
}

#[test]
fn test_eject_is_not_ready() {
    let mut rig = default_rig();
    assert!(rig.fdc.eject_media(0).is_some());
    rig.command(0x00);
    rig.wait_irq();
    assert_ne!(rig.status() & ST_NOTREADY, 0);
}
