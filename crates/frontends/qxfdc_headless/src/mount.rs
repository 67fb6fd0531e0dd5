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

    qxfdc_headless::mount.rs

    Parse media mount specifications given on the command line.
*/
use qxfdc_common::QxHashMap;
use std::{path::PathBuf, str::FromStr};

#[derive(Debug, PartialEq)]
pub struct MountSpec {
    pub drive:   usize,
    pub path:    PathBuf,
    pub options: QxHashMap<String, String>,
}

impl MountSpec {
    /// Mount the image read-only. Set with the `wp` option.
    pub fn write_protect(&self) -> bool {
        self.options.get("wp").is_some_and(|v| v != "false" && v != "0")
    }
}

impl FromStr for MountSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split once for optional options
        let (main, opt_str) = match s.split_once('?') {
            Some((left, right)) => (left, Some(right)),
            None => (s, None),
        };

        let (drive_str, path_str) = main.split_once(':').ok_or("Missing drive number")?;
        if path_str.is_empty() {
            return Err("Missing file path".to_string());
        }

        let drive: usize = drive_str
            .parse()
            .map_err(|_| format!("Invalid drive number: {drive_str}"))?;
        if drive > 3 {
            return Err(format!("Drive number out of range: {drive}"));
        }

        let path = PathBuf::from(path_str);
        let mut options = QxHashMap::default();

        if let Some(opts) = opt_str {
            for entry in opts.split('&').filter(|e| !e.is_empty()) {
                let (k, v) = entry.split_once('=').unwrap_or((entry, "true"));
                options.insert(k.to_string(), v.to_string());
            }
        }

        Ok(MountSpec { drive, path, options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let spec: MountSpec = "1:disks/song.img".parse().unwrap();
        assert_eq!(spec.drive, 1);
        assert_eq!(spec.path, PathBuf::from("disks/song.img"));
        assert!(!spec.write_protect());
    }

    #[test]
    fn test_parse_options() {
        let spec: MountSpec = "0:song.img?wp&label=demo".parse().unwrap();
        assert!(spec.write_protect());
        assert_eq!(spec.options.get("label").map(String::as_str), Some("demo"));

        let spec: MountSpec = "0:song.img?wp=false".parse().unwrap();
        assert!(!spec.write_protect());
    }

    #[test]
    fn test_parse_errors() {
        assert!("song.img".parse::<MountSpec>().is_err());
        assert!("x:song.img".parse::<MountSpec>().is_err());
        assert!("4:song.img".parse::<MountSpec>().is_err());
        assert!("0:".parse::<MountSpec>().is_err());
    }
}
