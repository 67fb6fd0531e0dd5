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

    qxfdc_headless::cmdline.rs

    Command line arguments.
*/

use std::{path::PathBuf, str::FromStr};

use crate::mount::MountSpec;

use bpaf::{Bpaf, Parser};
use strum_macros::Display;

#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum HostMode {
    /// List the id fields of each track with Read Address.
    #[default]
    Ids,
    /// Hex dump sector data.
    Dump,
    /// Read every sector and report errors.
    Verify,
}

impl FromStr for HostMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String>
    where
        Self: Sized,
    {
        match s.to_lowercase().as_str() {
            "ids" => Ok(HostMode::Ids),
            "dump" => Ok(HostMode::Dump),
            "verify" => Ok(HostMode::Verify),
            _ => Err("Bad value for mode".to_string()),
        }
    }
}

fn mount_arg() -> impl Parser<Vec<MountSpec>> {
    bpaf::short('m')
        .long("mount")
        .help("Mount a disk image with syntax: 0:disk.img or 0:disk.img?wp")
        .argument::<String>("mountspec")
        .parse(|s| s.parse::<MountSpec>())
        .many()
}

#[derive(Bpaf, Debug, Default)]
#[bpaf(options, version, generate(cli_args))]
pub struct CmdLineArgs {
    /// Controller configuration file (TOML)
    #[bpaf(long("config"), long("config_file"))]
    pub config_file: Option<PathBuf>,

    /// Drive to operate on
    #[bpaf(long, argument("DRIVE"), fallback(0))]
    pub drive: usize,

    /// One of: ids, dump, verify
    #[bpaf(long, argument("MODE"), fallback(HostMode::Ids))]
    pub mode: HostMode,

    /// Restrict the operation to a single track
    #[bpaf(long)]
    pub track: Option<u8>,

    /// Restrict the operation to a single side
    #[bpaf(long)]
    pub side: Option<u8>,

    #[bpaf(external(mount_arg))]
    pub mounts: Vec<MountSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpaf::Args;

    #[test]
    fn test_parse_args() {
        let args = cli_args()
            .run_inner(Args::from(&[
                "--mode", "verify", "--track", "12", "-m", "0:a.img?wp", "--mount", "1:b.img",
            ]))
            .unwrap();
        assert_eq!(args.mode, HostMode::Verify);
        assert_eq!(args.track, Some(12));
        assert_eq!(args.side, None);
        assert_eq!(args.drive, 0);
        assert_eq!(args.mounts.len(), 2);
        assert!(args.mounts[0].write_protect());
        assert_eq!(args.mounts[1].drive, 1);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("DUMP".parse::<HostMode>(), Ok(HostMode::Dump));
        assert!("format".parse::<HostMode>().is_err());
    }
}
