use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EntryError;

/// Beamline stations that ship logs to the central server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Station {
    #[serde(rename = "IR")]
    Ir,
    #[serde(rename = "XAFS/XRF")]
    XafsXrf,
    #[serde(rename = "MS/XPD")]
    MsXpd,
    #[serde(rename = "BEATS")]
    Beats,
    #[serde(rename = "HESEB")]
    Heseb,
    #[serde(rename = "TXPES")]
    Txpes,
}

impl Station {
    pub const ALL: [Station; 6] = [
        Station::Ir,
        Station::XafsXrf,
        Station::MsXpd,
        Station::Beats,
        Station::Heseb,
        Station::Txpes,
    ];

    /// Name as it appears in the catalog and in notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            Station::Ir => "IR",
            Station::XafsXrf => "XAFS/XRF",
            Station::MsXpd => "MS/XPD",
            Station::Beats => "BEATS",
            Station::Heseb => "HESEB",
            Station::Txpes => "TXPES",
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Station {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Station::ALL
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EntryError::UnknownStation(s.to_string()))
    }
}
