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

    device_types::fdc.rs

    Defines types common to the MB8877/FD179x family of floppy disk controllers:
    status register bits, command byte layouts and command classification.
*/

use modular_bitfield::{bitfield, prelude::*};
use strum_macros::{Display, EnumIter};

// Status Register Bit Definitions
// --------------------------------------------------------------------------------
// Several bits change meaning depending on the type of the last command executed.
pub const ST_BUSY: u8 = 0b0000_0001;
pub const ST_INDEX: u8 = 0b0000_0010; // Type I
pub const ST_DRQ: u8 = 0b0000_0010; // Type II, III
pub const ST_TRACK00: u8 = 0b0000_0100; // Type I
pub const ST_LOSTDATA: u8 = 0b0000_0100; // Type II, III
pub const ST_CRCERR: u8 = 0b0000_1000;
pub const ST_SEEKERR: u8 = 0b0001_0000; // Type I
pub const ST_RECNFND: u8 = 0b0001_0000; // Type II, III
pub const ST_HEADENG: u8 = 0b0010_0000; // Type I
pub const ST_RECTYPE: u8 = 0b0010_0000; // Read Sector
pub const ST_WRITEFAULT: u8 = 0b0010_0000; // Write Sector, Write Track
pub const ST_WRITEP: u8 = 0b0100_0000;
pub const ST_NOTREADY: u8 = 0b1000_0000;

// Command byte flags shared across types
pub const CMD_TRACK_UPDATE: u8 = 0b0001_0000;
pub const CMD_HEAD_LOAD: u8 = 0b0000_1000;
pub const CMD_VERIFY: u8 = 0b0000_0100;

// Force Interrupt conditions
pub const INT_NOT_READY_TO_READY: u8 = 0b0000_0001;
pub const INT_READY_TO_NOT_READY: u8 = 0b0000_0010;
pub const INT_INDEX_PULSE: u8 = 0b0000_0100;
pub const INT_IMMEDIATE: u8 = 0b0000_1000;

/// The command currently owning the controller. Scheduled events are tagged with the command
/// type that registered them and are discarded if it no longer matches when they fire.
#[derive(Copy, Clone, Debug, Default, Display, EnumIter, PartialEq, Eq)]
pub enum CommandType {
    #[default]
    Idle,
    Seek,
    ReadSector,
    ReadMulti,
    WriteSector,
    WriteMulti,
    ReadAddress,
    ReadTrack,
    WriteTrack,
    ForceInterrupt,
}

impl CommandType {
    /// Return true if a command of this type holds the BUSY bit while in progress.
    pub fn is_busy(&self) -> bool {
        !matches!(self, CommandType::Idle | CommandType::ForceInterrupt)
    }

    pub fn is_type1(&self) -> bool {
        matches!(self, CommandType::Seek)
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, CommandType::ReadMulti | CommandType::WriteMulti)
    }

    /// Return true for commands that transfer data from the host to the media.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            CommandType::WriteSector | CommandType::WriteMulti | CommandType::WriteTrack
        )
    }

    pub fn is_sector_transfer(&self) -> bool {
        matches!(
            self,
            CommandType::ReadSector | CommandType::ReadMulti | CommandType::WriteSector | CommandType::WriteMulti
        )
    }
}

/// Selects how the status register bits are interpreted on read. This follows the family of
/// the last command executed, and becomes [StatusKind::TypeIV] once a Force Interrupt has
/// taken effect.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    TypeI,
    TypeII,
    TypeIII,
    TypeIV,
}

/// Type I command byte: Restore, Seek, Step, Step-In, Step-Out.
/// For the Seek and Restore commands, the update bit is part of the opcode.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeICommand {
    pub step_rate: B2,
    pub verify: bool,
    pub head_load: bool,
    pub update: bool,
    pub op: B3,
}

/// Type II command byte: Read Sector, Write Sector.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeIICommand {
    pub deleted_mark: bool,
    pub side_compare: bool,
    pub delay: bool,
    pub side: bool,
    pub multiple: bool,
    pub op: B3,
}

/// Type III command byte: Read Address, Read Track, Write Track.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeIIICommand {
    #[skip]
    unused_lo: B2,
    pub delay: bool,
    #[skip]
    unused_hi: B1,
    pub op: B4,
}

/// Type IV command byte: Force Interrupt.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeIVCommand {
    pub conditions: B4,
    pub op: B4,
}

/// The Type I opcodes as decoded from the top three bits.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum TypeIOp {
    Restore,
    Seek,
    Step,
    StepIn,
    StepOut,
}

impl TypeIOp {
    pub fn decode(cmd: u8) -> TypeIOp {
        match cmd >> 4 {
            0x0 => TypeIOp::Restore,
            0x1 => TypeIOp::Seek,
            0x2 | 0x3 => TypeIOp::Step,
            0x4 | 0x5 => TypeIOp::StepIn,
            _ => TypeIOp::StepOut,
        }
    }
}
