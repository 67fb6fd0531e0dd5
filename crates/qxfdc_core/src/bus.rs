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

    bus.rs

    The register-level interface a host sees: four 8-bit ports, plus the
    IRQ and DRQ output lines.
*/

use std::fmt::Display;

/// The four controller ports. Port numbers are decoded modulo 4.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FdcPort {
    /// Write: Command register. Read: Status register.
    CommandStatus,
    Track,
    Sector,
    Data,
}

impl From<u16> for FdcPort {
    fn from(port: u16) -> Self {
        match port & 0x03 {
            0 => FdcPort::CommandStatus,
            1 => FdcPort::Track,
            2 => FdcPort::Sector,
            _ => FdcPort::Data,
        }
    }
}

impl From<FdcPort> for u16 {
    fn from(port: FdcPort) -> Self {
        match port {
            FdcPort::CommandStatus => 0,
            FdcPort::Track => 1,
            FdcPort::Sector => 2,
            FdcPort::Data => 3,
        }
    }
}

impl Display for FdcPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FdcPort::CommandStatus => write!(f, "Command/Status"),
            FdcPort::Track => write!(f, "Track"),
            FdcPort::Sector => write!(f, "Sector"),
            FdcPort::Data => write!(f, "Data"),
        }
    }
}

/// A change of one of the controller's output lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FdcSignalEvent {
    Irq(bool),
    Drq(bool),
}

pub trait IoDevice {
    /// Read a byte from the specified port.
    fn read_u8(&mut self, port: u16) -> u8;

    /// Write a byte to the specified port.
    fn write_u8(&mut self, port: u16, data: u8);

    /// Return a list of ports the device should service, comprised of a vector of tuples of
    /// (port description, port number).
    fn port_list(&self) -> Vec<(String, u16)>;
}
