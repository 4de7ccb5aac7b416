//! Pricing context dimensions and their multiplier tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MizanError;

/// Saudi region the work is priced for.
///
/// Regions outside the table are kept by name and priced at the Riyadh
/// baseline (multiplier 1.00).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    #[default]
    Riyadh,
    Jeddah,
    Dammam,
    Makkah,
    Khobar,
    Abha,
    Taif,
    Tabuk,
    Hail,
    Qassim,
    Other(String),
}

impl Region {
    pub fn as_str(&self) -> &str {
        match self {
            Region::Riyadh => "riyadh",
            Region::Jeddah => "jeddah",
            Region::Dammam => "dammam",
            Region::Makkah => "makkah",
            Region::Khobar => "khobar",
            Region::Abha => "abha",
            Region::Taif => "taif",
            Region::Tabuk => "tabuk",
            Region::Hail => "hail",
            Region::Qassim => "qassim",
            Region::Other(name) => name,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Region::Riyadh => 1.00,
            Region::Jeddah => 1.08,
            Region::Dammam => 1.05,
            Region::Makkah => 1.12,
            Region::Khobar => 1.06,
            Region::Abha => 0.98,
            Region::Taif => 1.07,
            Region::Tabuk => 1.02,
            Region::Hail => 1.00,
            Region::Qassim => 1.03,
            Region::Other(_) => 1.00,
        }
    }
}

impl From<&str> for Region {
    fn from(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "riyadh" => Region::Riyadh,
            "jeddah" => Region::Jeddah,
            "dammam" => Region::Dammam,
            "makkah" => Region::Makkah,
            "khobar" => Region::Khobar,
            "abha" => Region::Abha,
            "taif" => Region::Taif,
            "tabuk" => Region::Tabuk,
            "hail" => Region::Hail,
            "qassim" => Region::Qassim,
            _ => Region::Other(name),
        }
    }
}

impl From<String> for Region {
    fn from(name: String) -> Self {
        Region::from(name.as_str())
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        match region {
            Region::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Region {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Region::from(s))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Material and finish grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Economy,
    #[default]
    Standard,
    Premium,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Economy => "economy",
            Quality::Standard => "standard",
            Quality::Premium => "premium",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Quality::Economy => 0.80,
            Quality::Standard => 1.00,
            Quality::Premium => 1.30,
        }
    }
}

/// Season the work is carried out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Season::Spring => 1.00,
            Season::Summer => 1.05,
            Season::Autumn => 0.98,
            Season::Winter => 1.02,
        }
    }
}

/// Project scale. Larger projects buy in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ProjectSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectSize::Small => "small",
            ProjectSize::Medium => "medium",
            ProjectSize::Large => "large",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            ProjectSize::Small => 1.10,
            ProjectSize::Medium => 1.00,
            ProjectSize::Large => 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Urgency::Normal => 1.00,
            Urgency::Urgent => 1.15,
        }
    }
}

macro_rules! impl_parse_display {
    ($($ty:ident: [$($variant:ident),+]),+ $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = MizanError;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    let wanted = s.trim().to_lowercase();
                    [$($ty::$variant),+]
                        .into_iter()
                        .find(|v| v.as_str() == wanted)
                        .ok_or_else(|| {
                            MizanError::InvalidInput(format!(
                                concat!("unknown ", stringify!($ty), " '{}'"),
                                s
                            ))
                        })
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

impl_parse_display! {
    Quality: [Economy, Standard, Premium],
    Season: [Spring, Summer, Autumn, Winter],
    ProjectSize: [Small, Medium, Large],
    Urgency: [Normal, Urgent],
}

/// The five dimensions a price is adjusted for.
///
/// The default context (riyadh, standard, spring, medium, normal) has a
/// combined multiplier of exactly 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PricingContext {
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub season: Season,
    #[serde(default)]
    pub project_size: ProjectSize,
    #[serde(default)]
    pub urgency: Urgency,
}

impl PricingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: impl Into<Region>) -> Self {
        self.region = region.into();
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn season(mut self, season: Season) -> Self {
        self.season = season;
        self
    }

    pub fn project_size(mut self, size: ProjectSize) -> Self {
        self.project_size = size;
        self
    }

    pub fn urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// The multipliers in application order: region, quality, season,
    /// project size, urgency.
    pub fn multipliers(&self) -> [f64; 5] {
        [
            self.region.multiplier(),
            self.quality.multiplier(),
            self.season.multiplier(),
            self.project_size.multiplier(),
            self.urgency.multiplier(),
        ]
    }
}
