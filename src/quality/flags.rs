// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

bitflags! {
    /// The quality of a Level-1b spectrum. Every set bit is a failed check;
    /// flags only accumulate.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct QualityFlags: u16 {
        /// The spillover temperature is out of range.
        const TSPILL = 0x0001;
        /// The receiver temperature is out of range.
        const TREC = 0x0002;
        /// The noise is out of range.
        const NOISE = 0x0004;
        /// The tangent altitude isn't monotonic.
        const SCANNING = 0x0008;
        /// Too few target spectra in the scan.
        const NUM_SPECTRA = 0x0010;
        /// Unphysical brightness temperature.
        const TB = 0x0020;
        /// Unexpected integration time.
        const INTEGRATION_TIME = 0x0040;
        /// Not observed between two accepted sky-beam 1 references.
        const OBSERVATION_SEQUENCE = 0x0080;
        /// The surrounding references have different integration times.
        const REFERENCE_INTTIME = 0x0100;
        /// The moon is within the main beam.
        const MOON_IN_MAIN_BEAM = 0x0200;
        /// The 572 GHz frequency offset couldn't be determined.
        const FREQUENCY_UNCORRECTED = 0x0400;
    }
}

bitflags! {
    /// Celestial objects hit by a beam.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct SkyBeamHit: u16 {
        const EARTH = 0x0001;
        const MOON = 0x0002;
        const GALAXY = 0x0004;
        const SUN = 0x0008;
        const MOON_MAIN_BEAM = 0x0200;
    }
}

impl SkyBeamHit {
    /// Objects that make a sky-beam 1 reference unusable.
    pub const OBSTRUCTING: SkyBeamHit = SkyBeamHit::EARTH
        .union(SkyBeamHit::MOON)
        .union(SkyBeamHit::SUN);

    pub fn is_obstructed(self) -> bool {
        self.intersects(Self::OBSTRUCTING)
    }
}

const DESCRIPTIONS: [(QualityFlags, &str, &str); 11] = [
    (
        QualityFlags::TSPILL,
        "Tspill",
        "Tspill is outside of valid range. ",
    ),
    (QualityFlags::TREC, "Trec", "Trec is outside of valid range. "),
    (QualityFlags::NOISE, "Noise", "Noise is outside of valid range. "),
    (
        QualityFlags::SCANNING,
        "Scanning",
        "Tangent altitude is not decreasing or increasing as expected. ",
    ),
    (
        QualityFlags::NUM_SPECTRA,
        "nr of spectra",
        "The scan consists of less than five spectra. ",
    ),
    (QualityFlags::TB, "Tb", "Tb is outside of valid range. "),
    (
        QualityFlags::INTEGRATION_TIME,
        "Tint",
        "Integration time is outside valid range. ",
    ),
    (
        QualityFlags::OBSERVATION_SEQUENCE,
        "Ref1",
        "At least one atmospheric spectrum is not collected between two sky beam 1 references. ",
    ),
    (
        QualityFlags::REFERENCE_INTTIME,
        "Ref2",
        "Surrounding references have different integration times. ",
    ),
    (
        QualityFlags::MOON_IN_MAIN_BEAM,
        "Moon",
        "The moon is within the main beam. ",
    ),
    (
        QualityFlags::FREQUENCY_UNCORRECTED,
        "Frequency",
        "The frequency offset could not be determined. ",
    ),
];

impl QualityFlags {
    /// The short names of the set flags.
    pub fn names(self) -> Vec<&'static str> {
        DESCRIPTIONS
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, name, _)| *name)
            .collect()
    }

    /// A message summarising the quality. Empty if no flags are set.
    pub fn describe(self) -> String {
        let mut message = String::new();
        for (_, _, text) in DESCRIPTIONS.iter().filter(|(flag, _, _)| self.contains(*flag)) {
            if message.is_empty() {
                message.push_str("The Quality of Level1B data for this scan is limited: ");
            }
            message.push_str(text);
        }
        message
    }
}
