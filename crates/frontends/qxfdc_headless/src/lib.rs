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

    qxfdc_headless::lib.rs

    Headless frontend for QxFDC. Mounts disk images in the emulated
    controller and inspects them with the same register protocol the QX1
    uses: listing id fields, dumping sectors, or verifying a whole disk.
*/

pub mod cmdline;
pub mod host;
pub mod mount;

use std::{
    io::Write,
    sync::{Arc, RwLock},
};

use anyhow::{bail, Context};
use colored::Colorize;
use qxfdc_core::{device_types::geometry::ZonedGeometry, media::ImageMedia, FdcConfig, FloppyController};

use crate::{
    cmdline::{cli_args, HostMode},
    host::HostSession,
};

/// Return the (track, side) pairs selected by the optional track and side filters.
pub fn select_tracks(geometry: &ZonedGeometry, track: Option<u8>, side: Option<u8>) -> anyhow::Result<Vec<(u8, u8)>> {
    if let Some(t) = track {
        if t > geometry.max_track() {
            bail!("Track {} out of range (last track is {})", t, geometry.max_track());
        }
    }
    if let Some(s) = side {
        if s >= geometry.sides() {
            bail!("Side {} out of range (media has {} sides)", s, geometry.sides());
        }
    }

    let sides: Vec<u8> = match side {
        Some(s) => vec![s],
        None => (0..geometry.sides()).collect(),
    };
    // Side 0 of the whole disk is stored before side 1, so walk the disk in that order.
    let selected = sides
        .iter()
        .flat_map(|&s| {
            let tracks = match track {
                Some(t) => t..=t,
                None => 0..=geometry.max_track(),
            };
            tracks.map(move |t| (t, s))
        })
        .collect();
    Ok(selected)
}

fn hex_dump(out: &mut impl Write, data: &[u8]) -> std::io::Result<()> {
    for (i, row) in data.chunks(16).enumerate() {
        write!(out, "{:04X}:", i * 16)?;
        for byte in row {
            write!(out, " {:02X}", byte)?;
        }
        let ascii: String = row
            .iter()
            .map(|&b| match b {
                0x20..=0x7E => b as char,
                _ => '.',
            })
            .collect();
        writeln!(out, "{:>width$}|{}|", "", ascii, width = (16 - row.len()) * 3 + 2)?;
    }
    Ok(())
}

/// List the id fields of each selected track.
pub fn list_ids(
    session: &mut HostSession,
    geometry: &ZonedGeometry,
    tracks: &[(u8, u8)],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for &(track, side) in tracks {
        session.seek(track, side)?;
        let zone = geometry.zone(track);
        let ids = session.read_ids(zone.sectors() as usize)?;
        write!(out, "T{:02} H{}:", track, side)?;
        for id in &ids {
            let mark = if id.crc_ok() { "" } else { "!" };
            write!(out, " [{} {} {} {}{}]", id.track, id.side, id.sector, id.size_code, mark)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Hex dump every sector of each selected track.
pub fn dump_sectors(
    session: &mut HostSession,
    geometry: &ZonedGeometry,
    tracks: &[(u8, u8)],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for &(track, side) in tracks {
        session.seek(track, side)?;
        let zone = geometry.zone(track);
        let base = zone.sector_base(side);
        for sector in base..base + zone.sectors() {
            let read = session.read_sector(sector)?;
            writeln!(
                out,
                "Track {} side {} sector {} ({} bytes, status {:02X})",
                track,
                side,
                sector,
                read.data.len(),
                read.status
            )?;
            hex_dump(out, &read.data)?;
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub sectors: usize,
    pub bytes: usize,
    /// (track, side, sector, status) of every failed read.
    pub failures: Vec<(u8, u8, u8, u8)>,
}

/// Read every sector of each selected track and collect the failures.
pub fn verify(
    session: &mut HostSession,
    geometry: &ZonedGeometry,
    tracks: &[(u8, u8)],
    out: &mut impl Write,
) -> anyhow::Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for &(track, side) in tracks {
        session.seek(track, side)?;
        let zone = geometry.zone(track);
        let base = zone.sector_base(side);
        for sector in base..base + zone.sectors() {
            let read = session.read_sector(sector)?;
            report.sectors += 1;
            report.bytes += read.data.len();
            if !read.is_ok() {
                writeln!(
                    out,
                    "{} track {} side {} sector {}: status {:02X}",
                    "FAIL".red(),
                    track,
                    side,
                    sector,
                    read.status
                )?;
                report.failures.push((track, side, sector, read.status));
            }
        }
    }

    let summary = format!(
        "{} sectors ({} bytes) read, {} failed, {:.1}s emulated",
        report.sectors,
        report.bytes,
        report.failures.len(),
        session.elapsed_us() / 1_000_000.0
    );
    match report.failures.is_empty() {
        true => writeln!(out, "{}", summary.green())?,
        false => writeln!(out, "{}", summary.red())?,
    }
    Ok(report)
}

pub fn run() -> anyhow::Result<()> {
    env_logger::init();

    log::debug!("Reading command line arguments...");
    let args = cli_args().run();

    let config = match &args.config_file {
        Some(path) => FdcConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FdcConfig::default(),
    };
    let geometry = config.media_geometry()?;
    log::debug!("Media geometry: {}", geometry);

    if args.mounts.is_empty() {
        bail!("No media mounted. Use --mount 0:disk.img");
    }

    let mut fdc = FloppyController::new(config);
    for mount in &args.mounts {
        let media = ImageMedia::open(&mount.path, geometry.clone(), mount.write_protect())
            .with_context(|| format!("Failed to mount {}", mount.path.display()))?;
        log::info!("Mounted {} in drive {}", mount.path.display(), mount.drive);
        fdc.insert_media(mount.drive, Arc::new(RwLock::new(media)));
    }
    fdc.set_drive_select(args.drive);
    fdc.set_motor(true);

    let tracks = select_tracks(&geometry, args.track, args.side)?;
    let mut out = std::io::stdout().lock();
    let mut session = HostSession::new(&mut fdc);
    session.restore()?;

    match args.mode {
        HostMode::Ids => list_ids(&mut session, &geometry, &tracks, &mut out)?,
        HostMode::Dump => dump_sectors(&mut session, &geometry, &tracks, &mut out)?,
        HostMode::Verify => {
            let report = verify(&mut session, &geometry, &tracks, &mut out)?;
            if !report.failures.is_empty() {
                bail!("{} of {} sectors failed verification", report.failures.len(), report.sectors);
            }
        }
    }
    Ok(())
}
