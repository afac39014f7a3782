use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Register a legal entity is recorded in.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryType {
    /// Handelsregister Abteilung A (sole traders, partnerships).
    #[serde(rename = "HRA")]
    Hra,
    /// Handelsregister Abteilung B (corporations).
    #[serde(rename = "HRB")]
    Hrb,
    /// Genossenschaftsregister.
    #[serde(rename = "GnR")]
    GnR,
    /// Partnerschaftsregister.
    #[serde(rename = "PR")]
    Pr,
    /// Vereinsregister.
    #[serde(rename = "VR")]
    Vr,
}

impl RegistryType {
    pub const ALL: [RegistryType; 5] = [
        RegistryType::Hra,
        RegistryType::Hrb,
        RegistryType::GnR,
        RegistryType::Pr,
        RegistryType::Vr,
    ];

    /// The code used on the portal and in its search form.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryType::Hra => "HRA",
            RegistryType::Hrb => "HRB",
            RegistryType::GnR => "GnR",
            RegistryType::Pr => "PR",
            RegistryType::Vr => "VR",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RegistryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HRA" => Ok(RegistryType::Hra),
            "HRB" => Ok(RegistryType::Hrb),
            "GnR" => Ok(RegistryType::GnR),
            "PR" => Ok(RegistryType::Pr),
            "VR" => Ok(RegistryType::Vr),
            _ => Err(()),
        }
    }
}
