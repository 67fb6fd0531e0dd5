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

    devices::fdc::track_image.rs

    Builds the raw track image returned by Read Track.
*/

//! The backing store only holds sector data, but Read Track returns everything that passes under
//! the head during one revolution: gaps, sync fields, address marks, id fields and data fields,
//! each record followed by its CRC. The layout generated here is
//!
//! ```text
//!   GAP 0 (80 x 4E)  SYNC (12 x 00)  IAM (3 x C2, FC)  GAP 1 (50 x 4E)
//!   per slot, in physical order:
//!     SYNC (12 x 00)  IDAM (3 x A1, FE)  C H S N  CRC  GAP 2 (22 x 4E)
//!     SYNC (12 x 00)  DAM (3 x A1, FB or F8)  data  CRC  GAP 3 (54 x 4E)
//!   GAP 4 (4E) up to the raw track length
//! ```
//!
//! A track that does not exist on the media reads back as noise.

use crate::{
    device_traits::mediastore::MediaStore,
    devices::fdc::crc::Crc16,
};
use rand::Rng;

pub const GAP_BYTE: u8 = 0x4E;
pub const SYNC_BYTE: u8 = 0x00;
pub const IAM_SYNC: u8 = 0xC2;
pub const IAM: u8 = 0xFC;
pub const AM_SYNC: u8 = 0xA1;
pub const IDAM: u8 = 0xFE;
pub const DAM: u8 = 0xFB;
pub const DDAM: u8 = 0xF8;

pub const GAP0_LEN: usize = 80;
pub const GAP1_LEN: usize = 50;
pub const GAP2_LEN: usize = 22;
pub const GAP3_LEN: usize = 54;
pub const GAP4_MIN_LEN: usize = 22;
pub const SYNC_LEN: usize = 12;

fn push_n(buf: &mut Vec<u8>, byte: u8, n: usize) {
    buf.resize(buf.len() + n, byte);
}

fn push_record(buf: &mut Vec<u8>, mark: u8, record: &[u8]) {
    push_n(buf, SYNC_BYTE, SYNC_LEN);
    push_n(buf, AM_SYNC, 3);
    buf.push(mark);
    buf.extend_from_slice(record);
    let mut crc = Crc16::new();
    crc.update(record);
    buf.push(crc.msb());
    buf.push(crc.lsb());
}

/// Return a track of random bytes, as read from an unformatted track.
pub fn noise_track(raw_len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; raw_len];
    rand::rng().fill(&mut buf[..]);
    buf
}

/// Build the raw image of the specified track. The result is padded with gap bytes to at least
/// `raw_len` bytes.
pub fn build_track_image(media: &dyn MediaStore, track: u8, side: u8, raw_len: usize) -> Vec<u8> {
    let geometry = media.geometry();
    if !media.is_inserted() || !geometry.contains(track, side) {
        log::debug!("build_track_image(): track {}:{} unformatted", track, side);
        return noise_track(raw_len);
    }
    let zone = geometry.zone(track);

    let mut buf = Vec::with_capacity(raw_len);
    push_n(&mut buf, GAP_BYTE, GAP0_LEN);
    push_n(&mut buf, SYNC_BYTE, SYNC_LEN);
    push_n(&mut buf, IAM_SYNC, 3);
    buf.push(IAM);
    push_n(&mut buf, GAP_BYTE, GAP1_LEN);

    for slot in 0..zone.sectors() as usize {
        let Some(id) = media.sector_id(track, side, slot) else {
            continue;
        };
        push_record(&mut buf, IDAM, &id.id_bytes());
        push_n(&mut buf, GAP_BYTE, GAP2_LEN);

        let data = media.read_sector(id.chs()).unwrap_or_else(|e| {
            log::warn!("build_track_image(): failed to read sector {}: {}", id, e);
            vec![0; id.size()]
        });
        let mark = if media.sector_meta(id.chs()).deleted { DDAM } else { DAM };
        push_record(&mut buf, mark, &data);
        push_n(&mut buf, GAP_BYTE, GAP3_LEN);
    }

    push_n(&mut buf, GAP_BYTE, GAP4_MIN_LEN);
    if buf.len() < raw_len {
        buf.resize(raw_len, GAP_BYTE);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device_traits::mediastore::SectorMeta,
        device_types::{chs::DiskChs, geometry::ZonedGeometry},
        devices::fdc::crc::crc16,
        media::MemoryMedia,
    };

    const HEADER_LEN: usize = GAP0_LEN + SYNC_LEN + 4 + GAP1_LEN;
    const RAW_LEN: usize = 0x1800;

    #[test]
    fn test_track_header() {
        let media = MemoryMedia::new(ZonedGeometry::qx1());
        let image = build_track_image(&media, 0, 0, RAW_LEN);
        assert_eq!(image.len(), RAW_LEN);
        assert_eq!(&image[..GAP0_LEN], &[GAP_BYTE; GAP0_LEN]);
        assert_eq!(&image[GAP0_LEN + SYNC_LEN..GAP0_LEN + SYNC_LEN + 4], &[0xC2, 0xC2, 0xC2, 0xFC]);

        let id = HEADER_LEN + SYNC_LEN;
        assert_eq!(&image[id..id + 10], &[0xA1, 0xA1, 0xA1, 0xFE, 0, 0, 0, 3, 0xB4, 0xA3]);
    }

    #[test]
    fn test_sectors_in_physical_order() {
        let geom = ZonedGeometry::qx1();
        let mut media = MemoryMedia::new(geom.clone());
        for s in 0..5u8 {
            let offset = geom.locate(1, 0, s).unwrap();
            media.write_bytes(offset, &[s; 1024]).unwrap();
        }
        media.set_sector_meta(
            DiskChs::new(1, 0, 4),
            SectorMeta {
                deleted: true,
                crc: None,
            },
        );
        let image = build_track_image(&media, 1, 0, RAW_LEN);

        let slot_len = SYNC_LEN + 4 + 4 + 2 + GAP2_LEN + SYNC_LEN + 4 + 1024 + 2 + GAP3_LEN;
        for (slot, &s) in [0u8, 3, 1, 4, 2].iter().enumerate() {
            let base = HEADER_LEN + slot * slot_len;
            assert_eq!(image[base + SYNC_LEN + 6], s, "slot {slot} id");
            let dam = base + SYNC_LEN + 10 + GAP2_LEN + SYNC_LEN + 3;
            let expected_mark = if s == 4 { DDAM } else { DAM };
            assert_eq!(image[dam], expected_mark);
            let data = &image[dam + 1..dam + 1 + 1024];
            assert!(data.iter().all(|&b| b == s));
            let crc = crc16(data);
            assert_eq!(image[dam + 1025], (crc >> 8) as u8);
            assert_eq!(image[dam + 1026], crc as u8);
        }
    }

    #[test]
    fn test_zone1_fits_raw_length() {
        let media = MemoryMedia::new(ZonedGeometry::qx1());
        let image = build_track_image(&media, 60, 1, RAW_LEN);
        assert_eq!(image.len(), RAW_LEN);
    }

    #[test]
    fn test_missing_track_is_noise() {
        let media = MemoryMedia::new(ZonedGeometry::qx1());
        let image = build_track_image(&media, 90, 0, RAW_LEN);
        assert_eq!(image.len(), RAW_LEN);
    }
}
