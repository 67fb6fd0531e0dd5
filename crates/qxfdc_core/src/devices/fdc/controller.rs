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

    devices::fdc::controller.rs

    Implements the MB8877 (FD1793 compatible) floppy disk controller as used
    by the Yamaha QX1 sequencer.

    The host sees four registers. Commands are decoded from the upper nibble
    of the command byte and run as a chain of timed events, so that the host
    observes BUSY, DRQ and IRQ in the order the real part produces them.
*/

use std::collections::VecDeque;

use crate::{
    bus::{FdcPort, FdcSignalEvent, IoDevice},
    coreconfig::{FdcConfig, FdcVariant, RegisterPokePolicy},
    device_traits::mediastore::{MediaError, SectorMeta, SharedMedia},
    device_types::{
        chs::DiskChsn,
        fdc::{
            CommandType,
            StatusKind,
            TypeICommand,
            TypeIICommand,
            TypeIIICommand,
            TypeIOp,
            TypeIVCommand,
            INT_IMMEDIATE,
            INT_INDEX_PULSE,
            INT_NOT_READY_TO_READY,
            INT_READY_TO_NOT_READY,
            ST_BUSY,
            ST_CRCERR,
            ST_DRQ,
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
    },
    devices::{
        fdc::{
            crc::Crc16,
            data_adapter::{DataAdapter, TransferState},
            scheduler::{EventKind, EventScheduler},
            search::RotationalSearch,
            track_image,
        },
        floppy_drive::FloppyDiskDrive,
    },
    read_lock_or,
    write_lock_or,
};

use qxfdc_common::HistoryBuffer;
use strum_macros::Display;

pub const FDC_MAX_DRIVES: usize = 4;
pub const FDC_LOG_LEN: usize = 1000;
/// Signal events are dropped oldest first if the host never drains them.
pub const FDC_MAX_SIGNAL_EVENTS: usize = 256;
/// Index pulse period reported while the sector count of the track is unknown.
pub const DEFAULT_INDEX_PERIOD: usize = 16;

/// Access flag bits returned by [FloppyController::take_access_flags], one per drive.
pub const ACCESS_DRIVE0: u8 = 0x01;

#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum ControllerPhase {
    #[default]
    Idle,
    Seeking,
    Settling,
    Searching,
    Transferring,
    ReadingTrack,
    WritingTrack,
    ForceInterrupt,
}

type CommandDispatchFn = fn(&mut FloppyController) -> Continuation;
pub enum Continuation {
    CommandComplete,
    ContinueAsOperation,
}

/// Commands indexed by the upper nibble of the command byte.
const COMMAND_TABLE: [CommandDispatchFn; 16] = [
    FloppyController::command_restore,
    FloppyController::command_seek,
    FloppyController::command_step,
    FloppyController::command_step,
    FloppyController::command_step_in,
    FloppyController::command_step_in,
    FloppyController::command_step_out,
    FloppyController::command_step_out,
    FloppyController::command_read_sector,
    FloppyController::command_read_sector,
    FloppyController::command_write_sector,
    FloppyController::command_write_sector,
    FloppyController::command_read_address,
    FloppyController::command_force_interrupt,
    FloppyController::command_read_track,
    FloppyController::command_write_track,
];

#[derive(Clone, Debug, Default)]
pub struct FdcDebugState {
    pub irq: bool,
    pub drq: bool,
    pub phase: ControllerPhase,
    pub command_type: CommandType,
    pub status_kind: StatusKind,
    pub status_register: u8,
    pub command_register: u8,
    pub track_register: u8,
    pub sector_register: u8,
    pub data_register: u8,
    pub drive_select: usize,
    pub side: u8,
    pub physical_track: u8,
    pub rotation_cursor: usize,
    pub interrupt_condition: u8,
    pub transfer_position: usize,
    pub transfer_len: usize,
    pub pending_events: Vec<(EventKind, f64)>,
    pub last_data_read: u8,
    pub last_data_written: u8,
    pub cmd_log: Vec<String>,
}

pub struct FloppyController {
    config: FdcConfig,
    phase: ControllerPhase,
    command_type: CommandType,
    status_kind: StatusKind,
    status: u8,

    command_register: u8,
    track_register: u8,
    sector_register: u8,
    data_register: u8,

    drives: [FloppyDiskDrive; FDC_MAX_DRIVES],
    drive_select: usize,
    side: u8,

    seek_target: u8,
    step_inward: bool,
    settle_pending: bool,
    search: RotationalSearch,
    side_compare: Option<u8>,
    interrupt_condition: u8,
    index_counter: usize,

    irq: bool,
    drq: bool,
    adapter: DataAdapter,
    scheduler: EventScheduler,
    transfer_id: Option<DiskChsn>,
    expected_crc: Option<u16>,
    write_deleted: bool,

    signal_events: VecDeque<FdcSignalEvent>,
    last_data_read: u8,
    last_data_written: u8,
    cmd_log: HistoryBuffer<String>,
}

impl Default for FloppyController {
    fn default() -> Self {
        Self::new(FdcConfig::default())
    }
}

impl FloppyController {
    pub fn new(config: FdcConfig) -> Self {
        Self {
            config,
            phase: ControllerPhase::Idle,
            command_type: CommandType::Idle,
            status_kind: StatusKind::TypeI,
            status: 0,
            command_register: 0,
            track_register: 0,
            sector_register: 0,
            data_register: 0,
            drives: std::array::from_fn(FloppyDiskDrive::new),
            drive_select: 0,
            side: 0,
            seek_target: 0,
            step_inward: true,
            settle_pending: false,
            search: RotationalSearch::new(),
            side_compare: None,
            interrupt_condition: 0,
            index_counter: 0,
            irq: false,
            drq: false,
            adapter: DataAdapter::default(),
            scheduler: EventScheduler::new(),
            transfer_id: None,
            expected_crc: None,
            write_deleted: false,
            signal_events: VecDeque::new(),
            last_data_read: 0,
            last_data_written: 0,
            cmd_log: HistoryBuffer::new(FDC_LOG_LEN),
        }
    }

    /// Reset the controller. Registers are cleared, all heads return to track 0 and pending
    /// events are discarded. Inserted media and motor state are kept.
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        self.adapter.reset();
        self.phase = ControllerPhase::Idle;
        self.command_type = CommandType::Idle;
        self.status_kind = StatusKind::TypeI;
        self.status = 0;
        self.command_register = 0;
        self.track_register = 0;
        self.sector_register = 0;
        self.data_register = 0;
        self.seek_target = 0;
        self.step_inward = true;
        self.settle_pending = false;
        self.search = RotationalSearch::new();
        self.side_compare = None;
        self.interrupt_condition = 0;
        self.index_counter = 0;
        self.transfer_id = None;
        self.expected_crc = None;
        self.write_deleted = false;
        for drive in self.drives.iter_mut() {
            drive.set_track(0);
        }
        self.set_drq(false);
        self.set_irq(false);
        self.log_str("Controller reset");
    }

    pub fn config(&self) -> &FdcConfig {
        &self.config
    }

    pub fn drive(&self, drive_n: usize) -> Option<&FloppyDiskDrive> {
        self.drives.get(drive_n)
    }

    fn selected(&self) -> &FloppyDiskDrive {
        &self.drives[self.drive_select]
    }

    fn selected_mut(&mut self) -> &mut FloppyDiskDrive {
        &mut self.drives[self.drive_select]
    }

    fn selected_media(&self) -> Option<SharedMedia> {
        self.selected().media().cloned()
    }

    fn drive_ready(&self) -> bool {
        self.selected().is_ready()
    }

    /// The track the selected drive's head is positioned over.
    pub fn physical_track(&self) -> u8 {
        self.selected().track()
    }

    pub fn track_register(&self) -> u8 {
        self.track_register
    }

    pub fn sector_register(&self) -> u8 {
        self.sector_register
    }

    pub fn data_register(&self) -> u8 {
        self.data_register
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    #[cfg(test)]
    pub(crate) fn scheduler_mut(&mut self) -> &mut EventScheduler {
        &mut self.scheduler
    }

    pub fn irq(&self) -> bool {
        self.irq
    }

    pub fn drq(&self) -> bool {
        self.drq
    }

    /// Drain the IRQ and DRQ transitions that occurred since the last call.
    pub fn take_signal_events(&mut self) -> Vec<FdcSignalEvent> {
        self.signal_events.drain(..).collect()
    }

    /// Return a bitmask of the drives whose data port was accessed since the last call.
    pub fn take_access_flags(&mut self) -> u8 {
        self.drives
            .iter_mut()
            .enumerate()
            .fold(0, |flags, (i, drive)| match drive.take_access() {
                true => flags | (ACCESS_DRIVE0 << i),
                false => flags,
            })
    }

    pub fn insert_media(&mut self, drive_n: usize, media: SharedMedia) {
        if drive_n >= FDC_MAX_DRIVES {
            log::error!("insert_media(): invalid drive: {}", drive_n);
            return;
        }
        let was_ready = self.drive_ready();
        self.drives[drive_n].insert(media);
        log::debug!("Media inserted into drive {}", drive_n);
        self.check_ready_transition(was_ready);
    }

    pub fn eject_media(&mut self, drive_n: usize) -> Option<SharedMedia> {
        if drive_n >= FDC_MAX_DRIVES {
            log::error!("eject_media(): invalid drive: {}", drive_n);
            return None;
        }
        let was_ready = self.drive_ready();
        let media = self.drives[drive_n].eject();
        if media.is_some() {
            log::debug!("Media ejected from drive {}", drive_n);
        }
        self.check_ready_transition(was_ready);
        media
    }

    pub fn set_drive_select(&mut self, drive_n: usize) {
        let was_ready = self.drive_ready();
        self.drive_select = drive_n % FDC_MAX_DRIVES;
        self.check_ready_transition(was_ready);
    }

    pub fn drive_select(&self) -> usize {
        self.drive_select
    }

    pub fn set_side(&mut self, side: u8) {
        self.side = side & 0x01;
    }

    pub fn side(&self) -> u8 {
        self.side
    }

    /// Drive the motor line. The line is shared by all drives.
    pub fn set_motor(&mut self, state: bool) {
        let was_ready = self.drive_ready();
        for drive in self.drives.iter_mut() {
            drive.set_motor(state);
        }
        self.check_ready_transition(was_ready);
    }

    /// Raise IRQ on a ready line edge if a Force Interrupt armed the matching condition.
    fn check_ready_transition(&mut self, was_ready: bool) {
        let ready = self.drive_ready();
        if ready == was_ready || self.command_type != CommandType::ForceInterrupt {
            return;
        }
        let condition = match ready {
            true => INT_NOT_READY_TO_READY,
            false => INT_READY_TO_NOT_READY,
        };
        if self.interrupt_condition & condition != 0 {
            self.log_str(&format!("Ready transition {} -> {} raised interrupt", was_ready, ready));
            self.set_irq(true);
        }
    }

    fn set_irq(&mut self, state: bool) {
        if self.irq != state {
            self.irq = state;
            self.push_signal(FdcSignalEvent::Irq(state));
        }
    }

    fn set_drq(&mut self, state: bool) {
        if self.drq != state {
            self.drq = state;
            self.push_signal(FdcSignalEvent::Drq(state));
        }
    }

    fn push_signal(&mut self, event: FdcSignalEvent) {
        if self.signal_events.len() >= FDC_MAX_SIGNAL_EVENTS {
            self.signal_events.pop_front();
        }
        self.signal_events.push_back(event);
    }

    /// Apply the data bus polarity of the configured part. The MB8876 has an inverted bus.
    fn bus_polarity(&self, byte: u8) -> u8 {
        match self.config.variant {
            FdcVariant::Mb8877 => byte,
            FdcVariant::Mb8876 => !byte,
        }
    }

    /// Compose the status register without side effects.
    fn compute_status(&self) -> u8 {
        let ready = self.drive_ready();

        if self.status_kind == StatusKind::TypeIV {
            return match ready {
                true => 0,
                false => ST_NOTREADY,
            };
        }
        if matches!(self.phase, ControllerPhase::Settling | ControllerPhase::Searching) {
            return ST_BUSY;
        }

        let mut status = self.status;
        match ready {
            true => status &= !ST_NOTREADY,
            false => status |= ST_NOTREADY,
        }

        let shows_wp = self.status_kind == StatusKind::TypeI || self.command_type.is_write();
        if shows_wp && self.selected().is_write_protected() {
            status |= ST_WRITEP;
        }
        else {
            status &= !ST_WRITEP;
        }

        if self.status_kind == StatusKind::TypeI {
            if self.physical_track() == 0 {
                status |= ST_TRACK00;
            }
            else {
                status &= !ST_TRACK00;
            }
            if ready && self.index_counter == 0 {
                status |= ST_INDEX;
            }
            else {
                status &= !ST_INDEX;
            }
        }
        else if self.drq {
            status |= ST_DRQ;
        }
        else {
            status &= !ST_DRQ;
        }

        if self.command_type.is_busy() {
            status |= ST_BUSY;
        }
        else {
            status &= !ST_BUSY;
        }
        status
    }

    fn handle_status_register_read(&mut self) -> u8 {
        let status = self.compute_status();

        // The index pulse comes around once per rotation, one sector period at a time.
        if self.status_kind == StatusKind::TypeI && self.drive_ready() {
            let period = match self.selected().sectors_per_track() {
                Some(n) if n > 0 => n as usize,
                _ => DEFAULT_INDEX_PERIOD,
            };
            self.index_counter = (self.index_counter + 1) % period;
        }
        self.set_irq(false);
        status
    }

    fn handle_data_register_read(&mut self) -> u8 {
        if !self.drq || self.adapter.state() != TransferState::Reading {
            return self.data_register;
        }
        if let Some(byte) = self.adapter.read_byte() {
            self.data_register = byte;
            self.last_data_read = byte;
            self.selected_mut().access = true;
        }
        if self.adapter.is_complete() {
            self.end_of_read_record();
        }
        self.data_register
    }

    fn handle_data_register_write(&mut self, data: u8) {
        self.data_register = data;
        if !self.drq || self.adapter.state() != TransferState::Writing {
            return;
        }
        if self.adapter.write_byte(data) {
            self.last_data_written = data;
            self.selected_mut().access = true;
        }
        if self.adapter.is_complete() {
            self.end_of_write_record();
        }
    }

    /// Handle a host write to the track or sector register.
    fn handle_address_register_write(&mut self, port: FdcPort, data: u8) {
        let store = |fdc: &mut FloppyController| match port {
            FdcPort::Track => fdc.track_register = data,
            _ => fdc.sector_register = data,
        };

        if !self.command_type.is_sector_transfer() {
            store(self);
            return;
        }

        match self.config.register_poke {
            RegisterPokePolicy::Reject => {
                log::warn!(
                    "Write of {:02X} to {} ignored: {} in progress",
                    data,
                    port,
                    self.command_type
                );
            }
            RegisterPokePolicy::Latch => store(self),
            RegisterPokePolicy::Absorb => {
                store(self);
                // A record picks up the new value until its first byte moves.
                if self.adapter.position() == 0 {
                    self.log_str(&format!("{} changed to {:02X} before transfer, restarting", port, data));
                    self.scheduler.cancel_all();
                    self.adapter.reset();
                    self.set_drq(false);
                    self.transfer_id = None;
                    self.status &= !ST_RECTYPE;
                    self.start_sector_search(false);
                }
            }
        }
    }

    fn handle_command_register_write(&mut self, cmd: u8) {
        let force_interrupt = cmd & 0xF0 == 0xD0;
        if !force_interrupt && self.command_type.is_busy() {
            if self.command_type.is_type1() && cmd & 0x80 == 0 {
                log::debug!("Command {:02X} supersedes {} in progress", cmd, self.command_type);
            }
            else {
                log::warn!("Command {:02X} ignored: controller busy with {}", cmd, self.command_type);
                return;
            }
        }

        self.command_register = cmd;
        self.set_irq(false);

        let command_fn = COMMAND_TABLE[(cmd >> 4) as usize];
        match command_fn(self) {
            Continuation::CommandComplete => {
                log::trace!("Command {:02X} complete", cmd);
            }
            Continuation::ContinueAsOperation => {
                log::trace!("Command {:02X} continues as {}", cmd, self.phase);
            }
        }
    }

    /// Terminate the current command, merging `error_bits` into the status register.
    fn end_command(&mut self, error_bits: u8) -> Continuation {
        self.status |= error_bits;
        self.scheduler.cancel_all();
        self.adapter.reset();
        self.transfer_id = None;
        self.expected_crc = None;
        self.set_drq(false);
        self.log_str(&format!(
            "{} ended with status {:02X}",
            self.command_type, self.status
        ));
        self.command_type = CommandType::Idle;
        self.phase = ControllerPhase::Idle;
        self.set_irq(true);
        Continuation::CommandComplete
    }

    /// Begin a Type I command moving the head to `target`.
    fn begin_type1(&mut self, target: u8) -> Continuation {
        let cmd = TypeICommand::from_bytes([self.command_register]);

        self.scheduler.cancel_all();
        self.adapter.reset();
        self.transfer_id = None;
        self.set_drq(false);
        self.command_type = CommandType::Seek;
        self.status_kind = StatusKind::TypeI;
        self.status = match cmd.head_load() {
            true => ST_HEADENG,
            false => 0,
        };
        self.settle_pending = true;
        self.seek_target = target;
        self.phase = ControllerPhase::Seeking;

        let current = self.physical_track();
        let log_str = format!(
            "op: {:?} track: {} target: {} rate: {} verify: {}",
            TypeIOp::decode(self.command_register),
            current,
            target,
            cmd.step_rate(),
            cmd.verify()
        );
        self.log_cmd("begin_type1", &log_str);

        if current == target {
            self.scheduler
                .schedule(EventKind::SeekEnd, self.config.timing.seek_end_us, self.command_type);
        }
        else {
            let rate = self.config.timing.step_rates_us[cmd.step_rate() as usize];
            self.scheduler.schedule(EventKind::Seek, rate, self.command_type);
        }
        Continuation::ContinueAsOperation
    }

    fn step_target(&self, inward: bool) -> u8 {
        let current = self.physical_track();
        match inward {
            true => current.saturating_add(1).min(self.selected().max_track()),
            false => current.saturating_sub(1),
        }
    }

    pub fn command_restore(&mut self) -> Continuation {
        self.step_inward = true;
        self.begin_type1(0)
    }

    pub fn command_seek(&mut self) -> Continuation {
        let target = self.data_register.min(self.selected().max_track());
        let current = self.physical_track();
        if target != current {
            self.step_inward = target > current;
        }
        self.begin_type1(target)
    }

    pub fn command_step(&mut self) -> Continuation {
        let target = self.step_target(self.step_inward);
        self.begin_type1(target)
    }

    pub fn command_step_in(&mut self) -> Continuation {
        self.step_inward = true;
        let target = self.step_target(true);
        self.begin_type1(target)
    }

    pub fn command_step_out(&mut self) -> Continuation {
        self.step_inward = false;
        let target = self.step_target(false);
        self.begin_type1(target)
    }

    /// Move the head one track toward the seek target.
    fn on_seek_step(&mut self) {
        let cmd = TypeICommand::from_bytes([self.command_register]);
        let current = self.physical_track();
        let inward = self.seek_target > current;
        self.selected_mut().step(inward);
        let next = self.physical_track();
        if cmd.update() {
            self.track_register = next;
        }

        // A head pinned at a stop ends the seek where it is.
        if next == self.seek_target || next == current {
            self.finish_type1();
        }
        else {
            let rate = self.config.timing.step_rates_us[cmd.step_rate() as usize];
            self.scheduler.schedule(EventKind::Seek, rate, self.command_type);
        }
    }

    fn finish_type1(&mut self) {
        let cmd = TypeICommand::from_bytes([self.command_register]);

        match TypeIOp::decode(self.command_register) {
            TypeIOp::Restore => {
                self.track_register = 0;
                self.data_register = 0;
                self.index_counter = 0;
                self.status |= ST_TRACK00 | ST_INDEX | ST_HEADENG;
            }
            _ if cmd.update() => self.track_register = self.physical_track(),
            _ => {}
        }
        let result = match self.track_readable() {
            true if cmd.verify() => self.verify_track(),
            true => 0,
            false => ST_SEEKERR,
        };
        self.status |= result;

        self.log_cmd(
            "finish_type1",
            &format!(
                "track: {} tr: {} status: {:02X}",
                self.physical_track(),
                self.track_register,
                self.status
            ),
        );
        self.scheduler.cancel(EventKind::Seek);
        self.command_type = CommandType::Idle;
        self.phase = ControllerPhase::Idle;
        self.set_irq(true);
    }

    /// Whether the head sits over a track of inserted media.
    fn track_readable(&self) -> bool {
        let Some(media) = self.selected().media() else {
            return false;
        };
        let media = read_lock_or!(media, false);
        let (track, side) = (self.physical_track(), self.side);
        media.is_inserted() && media.geometry().contains(track, side) && media.track_geometry(track).is_some()
    }

    /// Check that the id fields of the track under the head carry the track register.
    fn verify_track(&self) -> u8 {
        let Some(media) = self.selected().media() else {
            return ST_SEEKERR;
        };
        let media = read_lock_or!(media, ST_SEEKERR);
        let (track, side) = (self.physical_track(), self.side);

        let Some(zone) = media.track_geometry(track) else {
            return ST_SEEKERR;
        };
        let found = (0..zone.sectors() as usize)
            .filter_map(|slot| media.sector_id(track, side, slot))
            .any(|id| id.c() == self.track_register);
        match found {
            true => 0,
            false => ST_SEEKERR,
        }
    }

    pub fn command_read_sector(&mut self) -> Continuation {
        let cmd = TypeIICommand::from_bytes([self.command_register]);
        self.command_type = match cmd.multiple() {
            true => CommandType::ReadMulti,
            false => CommandType::ReadSector,
        };
        self.begin_type2(cmd)
    }

    pub fn command_write_sector(&mut self) -> Continuation {
        let cmd = TypeIICommand::from_bytes([self.command_register]);
        self.command_type = match cmd.multiple() {
            true => CommandType::WriteMulti,
            false => CommandType::WriteSector,
        };
        self.write_deleted = cmd.deleted_mark();
        self.begin_type2(cmd)
    }

    fn begin_type2(&mut self, cmd: TypeIICommand) -> Continuation {
        self.scheduler.cancel_all();
        self.adapter.reset();
        self.set_drq(false);
        self.status_kind = StatusKind::TypeII;
        self.status = 0;
        self.side_compare = cmd.side_compare().then_some(cmd.side() as u8);

        let log_str = format!(
            "track: {} side: {} sector: {} compare: {:?} delay: {}",
            self.physical_track(),
            self.side,
            self.sector_register,
            self.side_compare,
            cmd.delay()
        );
        self.log_cmd("begin_type2", &log_str);

        if !self.drive_ready() {
            return self.end_command(ST_NOTREADY);
        }
        if self.command_type.is_write() && self.selected().is_write_protected() {
            return self.end_command(ST_WRITEFAULT);
        }
        if self.side_compare.is_some_and(|s| s != self.side) {
            return self.end_command(ST_RECNFND);
        }
        self.start_sector_search(cmd.delay())
    }

    /// Search the current track for the sector register and arm the transfer of the match.
    fn start_sector_search(&mut self, delay: bool) -> Continuation {
        let Some(media) = self.selected_media() else {
            return self.end_command(ST_NOTREADY);
        };
        let (track, side, wanted) = (self.physical_track(), self.side, self.sector_register);
        let reading = !self.command_type.is_write();

        let found = {
            let media = read_lock_or!(media, self.end_command(ST_NOTREADY));
            self.search
                .search_sector(&*media, track, side, wanted, self.side_compare)
                .map(|(_, id)| {
                    let payload = reading.then(|| (media.read_sector(id.chs()), media.sector_meta(id.chs())));
                    (id, payload)
                })
        };

        let Some((id, payload)) = found else {
            log::debug!("Sector {} not found on track {} side {}", wanted, track, side);
            return self.end_command(ST_RECNFND);
        };

        match payload {
            Some((Ok(data), meta)) => {
                if meta.deleted {
                    self.status |= ST_RECTYPE;
                }
                self.expected_crc = meta.crc;
                self.adapter.begin_read(data, true);
            }
            Some((Err(e), _)) => {
                log::error!("Failed to read sector {}: {}", id, e);
                return self.end_command(ST_RECNFND);
            }
            None => {
                self.expected_crc = None;
                self.adapter.begin_write(id.size(), true);
            }
        }
        self.transfer_id = Some(id);

        let search_time = self.search_time(delay);
        let lost_time = search_time + self.config.timing.lost_sector_us;
        self.scheduler.schedule(EventKind::Search, search_time, self.command_type);
        self.scheduler.schedule(EventKind::Lost, lost_time, self.command_type);
        Continuation::ContinueAsOperation
    }

    /// Return the delay until the searched record arrives, entering the matching phase.
    fn search_time(&mut self, delay: bool) -> f64 {
        let timing = &self.config.timing;
        let mut time = match self.settle_pending {
            true => timing.settle_us,
            false => timing.search_us,
        };
        if delay {
            time += timing.head_settle_us;
        }
        self.phase = match self.settle_pending {
            true => ControllerPhase::Settling,
            false => ControllerPhase::Searching,
        };
        self.settle_pending = false;
        time
    }

    fn begin_type3(&mut self) -> Option<Continuation> {
        self.scheduler.cancel_all();
        self.adapter.reset();
        self.transfer_id = None;
        self.expected_crc = None;
        self.set_drq(false);
        self.status_kind = StatusKind::TypeIII;
        self.status = 0;

        if !self.drive_ready() {
            return Some(self.end_command(ST_NOTREADY));
        }
        if self.command_type.is_write() && self.selected().is_write_protected() {
            return Some(self.end_command(ST_WRITEFAULT));
        }
        None
    }

    pub fn command_read_address(&mut self) -> Continuation {
        let cmd = TypeIIICommand::from_bytes([self.command_register]);
        self.command_type = CommandType::ReadAddress;
        if let Some(result) = self.begin_type3() {
            return result;
        }
        let Some(media) = self.selected_media() else {
            return self.end_command(ST_NOTREADY);
        };
        let (track, side) = (self.physical_track(), self.side);

        let found = {
            let media = read_lock_or!(media, self.end_command(ST_NOTREADY));
            self.search.next_address(&*media, track, side)
        };
        let Some((slot, id)) = found else {
            return self.end_command(ST_RECNFND);
        };

        let id_bytes = id.id_bytes();
        let mut crc = Crc16::new();
        crc.update(&id_bytes);
        let mut record = id_bytes.to_vec();
        record.extend_from_slice(&[crc.msb(), crc.lsb()]);

        // The track field of the id lands in the sector register.
        self.sector_register = id.c();
        self.adapter.begin_read(record, false);
        self.log_cmd("command_read_address", &format!("slot: {} id: {}", slot, id));

        let search_time = self.search_time(cmd.delay());
        let lost_time = search_time + self.config.timing.lost_address_us;
        self.scheduler.schedule(EventKind::Search, search_time, self.command_type);
        self.scheduler.schedule(EventKind::Lost, lost_time, self.command_type);
        Continuation::ContinueAsOperation
    }

    pub fn command_read_track(&mut self) -> Continuation {
        let cmd = TypeIIICommand::from_bytes([self.command_register]);
        self.command_type = CommandType::ReadTrack;
        if let Some(result) = self.begin_type3() {
            return result;
        }
        let Some(media) = self.selected_media() else {
            return self.end_command(ST_NOTREADY);
        };
        let (track, side) = (self.physical_track(), self.side);
        let raw_len = self.config.timing.raw_track_len;

        let image = {
            let media = read_lock_or!(media, self.end_command(ST_NOTREADY));
            track_image::build_track_image(&*media, track, side, raw_len)
        };
        self.adapter.begin_read(image, false);
        self.log_cmd("command_read_track", &format!("track: {} side: {}", track, side));

        let search_time = self.search_time(cmd.delay());
        let lost_time = search_time + self.config.timing.lost_track_us;
        self.scheduler.schedule(EventKind::Search, search_time, self.command_type);
        self.scheduler.schedule(EventKind::Lost, lost_time, self.command_type);
        Continuation::ContinueAsOperation
    }

    pub fn command_write_track(&mut self) -> Continuation {
        let cmd = TypeIIICommand::from_bytes([self.command_register]);
        self.command_type = CommandType::WriteTrack;
        if let Some(result) = self.begin_type3() {
            return result;
        }
        let (track, side) = (self.physical_track(), self.side);
        self.adapter.begin_write(self.config.timing.raw_track_len, false);
        self.log_cmd("command_write_track", &format!("track: {} side: {}", track, side));

        let search_time = self.search_time(cmd.delay());
        let lost_time = search_time + self.config.timing.lost_track_us;
        self.scheduler.schedule(EventKind::Search, search_time, self.command_type);
        self.scheduler.schedule(EventKind::Lost, lost_time, self.command_type);
        Continuation::ContinueAsOperation
    }

    pub fn command_force_interrupt(&mut self) -> Continuation {
        let cmd = TypeIVCommand::from_bytes([self.command_register]);
        let conditions = cmd.conditions();

        if self.command_type.is_busy() {
            self.log_cmd(
                "command_force_interrupt",
                &format!("aborting {} conditions: {:04b}", self.command_type, conditions),
            );
            self.interrupt_condition = conditions;
        }
        else {
            self.status = 0;
            self.status_kind = StatusKind::TypeI;
            self.interrupt_condition ^= conditions;
            self.log_cmd(
                "command_force_interrupt",
                &format!("idle, conditions now: {:04b}", self.interrupt_condition),
            );
        }

        self.scheduler.cancel_all();
        self.adapter.reset();
        self.transfer_id = None;
        self.expected_crc = None;
        self.set_drq(false);
        self.command_type = CommandType::ForceInterrupt;
        self.phase = ControllerPhase::ForceInterrupt;

        if conditions & INT_IMMEDIATE != 0 {
            self.set_irq(true);
        }
        self.scheduler
            .schedule(EventKind::Type4, self.config.timing.type4_us, self.command_type);
        Continuation::CommandComplete
    }

    fn on_search(&mut self) {
        self.phase = match self.command_type {
            CommandType::ReadTrack => ControllerPhase::ReadingTrack,
            CommandType::WriteTrack => ControllerPhase::WritingTrack,
            _ => ControllerPhase::Transferring,
        };
        self.set_drq(true);
    }

    fn on_type4(&mut self) {
        self.status_kind = StatusKind::TypeIV;
        if self.interrupt_condition & INT_INDEX_PULSE != 0 {
            self.set_irq(true);
        }
    }

    fn on_lost(&mut self) {
        if self.command_type.is_busy() {
            log::warn!(
                "Lost data: host did not service DRQ during {} ({} of {} bytes)",
                self.command_type,
                self.adapter.position(),
                self.adapter.len()
            );
            self.end_command(ST_LOSTDATA);
        }
    }

    fn on_multi_advance(&mut self) {
        self.sector_register = self.sector_register.wrapping_add(1);
    }

    fn on_multi_continue(&mut self) {
        if self.track_end_sector().is_some_and(|end| self.sector_register >= end) {
            self.log_str(&format!("{} reached end of track", self.command_type));
            self.end_command(0);
            return;
        }
        self.start_sector_search(false);
    }

    /// The first sector id past the last sector of the current track and side.
    fn track_end_sector(&self) -> Option<u8> {
        let media = self.selected().media()?;
        let media = read_lock_or!(media, None);
        media
            .track_geometry(self.physical_track())
            .map(|zone| zone.sector_base(self.side) + zone.sectors())
    }

    fn end_of_read_record(&mut self) {
        self.set_drq(false);
        self.scheduler.cancel(EventKind::Lost);

        match self.command_type {
            CommandType::ReadSector | CommandType::ReadMulti => {
                let computed = self.adapter.crc().map(|crc| crc.value());
                let crc_ok = match (self.expected_crc, computed) {
                    (Some(stored), Some(computed)) => stored == computed || self.config.ignore_crc,
                    _ => true,
                };
                self.adapter.finish();
                if !crc_ok {
                    log::warn!("CRC error reading sector {:?}", self.transfer_id);
                    self.end_command(ST_CRCERR);
                    return;
                }
                self.sector_done();
            }
            CommandType::ReadAddress => {
                self.adapter.finish();
                self.end_command(0);
            }
            // Reading past the last byte of the track overruns the data register.
            CommandType::ReadTrack => {
                self.adapter.finish();
                self.end_command(ST_LOSTDATA);
            }
            _ => {}
        }
    }

    fn end_of_write_record(&mut self) {
        self.set_drq(false);
        self.scheduler.cancel(EventKind::Lost);

        match self.command_type {
            CommandType::WriteSector | CommandType::WriteMulti => {
                let crc = self.adapter.crc().map(|crc| crc.value());
                let data = self.adapter.finish();
                let Some(id) = self.transfer_id else {
                    self.end_command(ST_WRITEFAULT);
                    return;
                };
                if let Err(e) = self.commit_sector(id, &data, crc) {
                    log::error!("Failed to write sector {}: {}", id, e);
                    self.end_command(ST_WRITEFAULT);
                    return;
                }
                self.sector_done();
            }
            CommandType::WriteTrack => {
                let raw = self.adapter.finish();
                match self.commit_track(&raw) {
                    Ok(()) => {
                        self.end_command(0);
                    }
                    Err(e) => {
                        log::error!("Failed to write track {}: {}", self.physical_track(), e);
                        self.end_command(ST_WRITEFAULT);
                    }
                }
            }
            _ => {}
        }
    }

    /// Complete one sector of a Type II command.
    fn sector_done(&mut self) {
        self.transfer_id = None;
        if self.command_type.is_multi() {
            self.phase = ControllerPhase::Searching;
            self.scheduler
                .schedule(EventKind::Multi1, self.config.timing.multi1_us, self.command_type);
            self.scheduler
                .schedule(EventKind::Multi2, self.config.timing.multi2_us, self.command_type);
        }
        else {
            self.end_command(0);
        }
    }

    fn commit_sector(&mut self, id: DiskChsn, data: &[u8], crc: Option<u16>) -> Result<(), MediaError> {
        let media = self.selected_media().ok_or(MediaError::NotInserted)?;
        let mut media = write_lock_or!(media, Err(MediaError::Locked));
        let offset = media
            .geometry()
            .locate_chs(id.chs())
            .ok_or(MediaError::BadTrack(id.c(), id.h()))?;
        media.write_bytes(offset, data)?;
        media.set_sector_meta(
            id.chs(),
            SectorMeta {
                deleted: self.write_deleted,
                crc,
            },
        );
        Ok(())
    }

    fn commit_track(&mut self, raw: &[u8]) -> Result<(), MediaError> {
        let (track, side) = (self.physical_track(), self.side);
        let media = self.selected_media().ok_or(MediaError::NotInserted)?;
        let mut media = write_lock_or!(media, Err(MediaError::Locked));
        media.make_track(track, side)?;
        media.write_track(track, side, raw)
    }

    /// Advance time by `us` microseconds, firing every event that comes due.
    pub fn run(&mut self, us: f64) {
        let until = self.scheduler.now() + us;
        while let Some(event) = self.scheduler.pop_due(until) {
            if event.owner != self.command_type {
                self.scheduler.note_stale(event.kind);
                log::trace!(
                    "Discarding stale {} event of {}, now running {}",
                    event.kind,
                    event.owner,
                    self.command_type
                );
                continue;
            }
            self.on_event(event.kind);
        }
        self.scheduler.advance_to(until);
    }

    fn on_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::Seek => self.on_seek_step(),
            EventKind::SeekEnd => self.finish_type1(),
            EventKind::Search => self.on_search(),
            EventKind::Type4 => self.on_type4(),
            EventKind::Multi1 => self.on_multi_advance(),
            EventKind::Multi2 => self.on_multi_continue(),
            EventKind::Lost => self.on_lost(),
        }
    }

    pub fn log_cmd(&mut self, func: &str, s: &str) {
        self.cmd_log.push(format!("{}: {}", self.command_type, s));
        log::trace!("{}(): {}", func, s);
    }

    pub fn log_str(&mut self, s: &str) {
        self.cmd_log.push(s.to_string());
        log::trace!("{}", s);
    }

    pub fn get_debug_state(&self) -> FdcDebugState {
        FdcDebugState {
            irq: self.irq,
            drq: self.drq,
            phase: self.phase,
            command_type: self.command_type,
            status_kind: self.status_kind,
            status_register: self.compute_status(),
            command_register: self.command_register,
            track_register: self.track_register,
            sector_register: self.sector_register,
            data_register: self.data_register,
            drive_select: self.drive_select,
            side: self.side,
            physical_track: self.physical_track(),
            rotation_cursor: self.search.cursor(),
            interrupt_condition: self.interrupt_condition,
            transfer_position: self.adapter.position(),
            transfer_len: self.adapter.len(),
            pending_events: self
                .scheduler
                .pending()
                .iter()
                .map(|event| (event.kind, event.fire_time))
                .collect(),
            last_data_read: self.last_data_read,
            last_data_written: self.last_data_written,
            cmd_log: self.cmd_log.as_vec(),
        }
    }
}

impl IoDevice for FloppyController {
    fn read_u8(&mut self, port: u16) -> u8 {
        let byte = match FdcPort::from(port) {
            FdcPort::CommandStatus => self.handle_status_register_read(),
            FdcPort::Track => self.track_register,
            FdcPort::Sector => self.sector_register,
            FdcPort::Data => self.handle_data_register_read(),
        };
        self.bus_polarity(byte)
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        let data = self.bus_polarity(data);
        match FdcPort::from(port) {
            FdcPort::CommandStatus => self.handle_command_register_write(data),
            port @ (FdcPort::Track | FdcPort::Sector) => self.handle_address_register_write(port, data),
            FdcPort::Data => self.handle_data_register_write(data),
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (String::from("FDC Command/Status Register"), FdcPort::CommandStatus.into()),
            (String::from("FDC Track Register"), FdcPort::Track.into()),
            (String::from("FDC Sector Register"), FdcPort::Sector.into()),
            (String::from("FDC Data Register"), FdcPort::Data.into()),
        ]
    }
}
