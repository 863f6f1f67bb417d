// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Args;
use log::info;

use super::{printers::InfoPrinter, Smrl1bError};
use crate::quality::QualityFlags;

#[derive(Debug, Args)]
#[clap(arg_required_else_help = true)]
pub(super) struct DescribeQualityArgs {
    /// The quality value of a spectrum, e.g. 129 or 0x0081.
    #[clap(name = "QUALITY")]
    quality: String,
}

impl DescribeQualityArgs {
    pub(super) fn run(self) -> Result<(), Smrl1bError> {
        let bits = parse_quality(&self.quality)?;
        let flags = QualityFlags::from_bits_retain(bits);

        let mut printer = InfoPrinter::new(format!("Quality {bits:#06x}").into());
        if flags.is_empty() {
            printer.push_line("No problems".into());
        } else {
            printer.push_block(flags.names().into_iter().map(Into::into).collect());
        }
        let unknown = bits & !QualityFlags::all().bits();
        if unknown != 0 {
            printer.push_line(format!("Unknown bits: {unknown:#06x}").into());
        }
        printer.display();

        if !flags.is_empty() {
            info!("{}", flags.describe());
        }
        Ok(())
    }
}

fn parse_quality(s: &str) -> Result<u16, Smrl1bError> {
    let s = s.trim();
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    result.map_err(|_| Smrl1bError::QualityValue(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("129").unwrap(), 129);
        assert_eq!(parse_quality("0x0081").unwrap(), 0x81);
        assert_eq!(parse_quality(" 0X400 ").unwrap(), 0x400);
        assert!(matches!(
            parse_quality("0x10000"),
            Err(Smrl1bError::QualityValue(_))
        ));
        assert!(parse_quality("-1").is_err());
        assert!(parse_quality("Tspill").is_err());
    }
}
