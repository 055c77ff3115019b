//! Frequency bands, 802.11 standards and channel bandwidths.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating frequency band of a radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FreqBand {
    #[serde(rename = "2.4GHz")]
    Band2_4GHz,
    #[serde(rename = "5GHz")]
    Band5GHz,
    #[serde(rename = "6GHz")]
    Band6GHz,
}

impl FreqBand {
    pub const ALL: [FreqBand; 3] = [FreqBand::Band2_4GHz, FreqBand::Band5GHz, FreqBand::Band6GHz];

    /// Channels usable in this band when the driver does not report a list.
    pub fn default_channels(&self) -> Vec<u8> {
        match self {
            FreqBand::Band2_4GHz => (1..=13).collect(),
            FreqBand::Band5GHz => vec![
                36, 40, 44, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136,
                140, 144, 149, 153, 157, 161, 165,
            ],
            FreqBand::Band6GHz => (0..59u8).map(|i| 1 + 4 * i).collect(),
        }
    }

    /// Standards a radio on this band typically supports.
    pub fn default_standards(&self) -> StandardSet {
        match self {
            FreqBand::Band2_4GHz => StandardSet::from_iter([
                Standard::B,
                Standard::G,
                Standard::N,
                Standard::Ax,
            ]),
            FreqBand::Band5GHz => {
                StandardSet::from_iter([Standard::A, Standard::N, Standard::Ac, Standard::Ax])
            }
            FreqBand::Band6GHz => StandardSet::from_iter([Standard::Ax]),
        }
    }

    /// Widest bandwidth usable on this band without extra capabilities.
    pub fn default_bandwidth(&self) -> ChannelBandwidth {
        match self {
            FreqBand::Band2_4GHz => ChannelBandwidth::Bw20,
            FreqBand::Band5GHz => ChannelBandwidth::Bw80,
            FreqBand::Band6GHz => ChannelBandwidth::Bw160,
        }
    }
}

impl fmt::Display for FreqBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FreqBand::Band2_4GHz => "2.4GHz",
            FreqBand::Band5GHz => "5GHz",
            FreqBand::Band6GHz => "6GHz",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FreqBand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.4GHz" | "2.4" | "2g" => Ok(FreqBand::Band2_4GHz),
            "5GHz" | "5" | "5g" => Ok(FreqBand::Band5GHz),
            "6GHz" | "6" | "6g" => Ok(FreqBand::Band6GHz),
            _ => Err(ParseError::InvalidBand(s.to_string())),
        }
    }
}

/// One IEEE 802.11 PHY standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Standard {
    A = 0,
    B = 1,
    G = 2,
    N = 3,
    Ac = 4,
    Ax = 5,
    Be = 6,
}

impl Standard {
    pub const ALL: [Standard; 7] = [
        Standard::A,
        Standard::B,
        Standard::G,
        Standard::N,
        Standard::Ac,
        Standard::Ax,
        Standard::Be,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Standard::A => "a",
            Standard::B => "b",
            Standard::G => "g",
            Standard::N => "n",
            Standard::Ac => "ac",
            Standard::Ax => "ax",
            Standard::Be => "be",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Standard {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Standard::ALL
            .into_iter()
            .find(|std| std.to_string() == s)
            .ok_or_else(|| ParseError::InvalidStandard(s.to_string()))
    }
}

/// A set of standards, stored as a bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StandardSet(u8);

impl StandardSet {
    pub const EMPTY: StandardSet = StandardSet(0);

    pub fn contains(&self, std: Standard) -> bool {
        self.0 & std.bit() != 0
    }

    pub fn insert(&mut self, std: Standard) {
        self.0 |= std.bit();
    }

    pub fn remove(&mut self, std: Standard) {
        self.0 &= !std.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_subset_of(&self, other: &StandardSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Standard> + '_ {
        Standard::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
}

impl FromIterator<Standard> for StandardSet {
    fn from_iter<I: IntoIterator<Item = Standard>>(iter: I) -> Self {
        let mut set = StandardSet::EMPTY;
        for std in iter {
            set.insert(std);
        }
        set
    }
}

impl fmt::Display for StandardSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for StandardSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Standard::from_str)
            .collect()
    }
}

impl TryFrom<String> for StandardSet {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StandardSet> for String {
    fn from(set: StandardSet) -> String {
        set.to_string()
    }
}

/// Operating standards of a radio: either driver-chosen or an explicit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingStandards {
    Auto,
    Set(StandardSet),
}

impl OperatingStandards {
    /// Returns the effective set given the radio's supported standards.
    pub fn effective(&self, supported: StandardSet) -> StandardSet {
        match self {
            OperatingStandards::Auto => supported,
            OperatingStandards::Set(set) => *set,
        }
    }
}

impl Default for OperatingStandards {
    fn default() -> Self {
        OperatingStandards::Auto
    }
}

impl fmt::Display for OperatingStandards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingStandards::Auto => write!(f, "auto"),
            OperatingStandards::Set(set) => write!(f, "{}", set),
        }
    }
}

impl FromStr for OperatingStandards {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(OperatingStandards::Auto)
        } else {
            Ok(OperatingStandards::Set(s.parse()?))
        }
    }
}

/// Channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelBandwidth {
    #[serde(rename = "20MHz")]
    Bw20,
    #[serde(rename = "40MHz")]
    Bw40,
    #[serde(rename = "80MHz")]
    Bw80,
    #[serde(rename = "160MHz")]
    Bw160,
    #[serde(rename = "320MHz")]
    Bw320,
}

impl ChannelBandwidth {
    pub const fn mhz(&self) -> u32 {
        match self {
            ChannelBandwidth::Bw20 => 20,
            ChannelBandwidth::Bw40 => 40,
            ChannelBandwidth::Bw80 => 80,
            ChannelBandwidth::Bw160 => 160,
            ChannelBandwidth::Bw320 => 320,
        }
    }
}

impl fmt::Display for ChannelBandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

impl FromStr for ChannelBandwidth {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches("MHz") {
            "20" => Ok(ChannelBandwidth::Bw20),
            "40" => Ok(ChannelBandwidth::Bw40),
            "80" => Ok(ChannelBandwidth::Bw80),
            "160" => Ok(ChannelBandwidth::Bw160),
            "320" => Ok(ChannelBandwidth::Bw320),
            _ => Err(ParseError::InvalidBandwidth(s.to_string())),
        }
    }
}
