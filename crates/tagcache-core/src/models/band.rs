//! Brawl Stars band (clan) data.

use serde::{Deserialize, Serialize};

/// Bands hold at most this many members.
pub const BAND_CAPACITY: u32 = 50;

const BADGE_URL_BASE: &str =
    "https://raw.githubusercontent.com/smlbiobot/smlbiobot.github.io/master/img/bs-badge";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandProfile {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub badge: Option<i64>,
    pub score: Option<i64>,
    pub required_score: Option<i64>,
    #[serde(rename = "type")]
    pub band_type: Option<String>,
    pub member_count: Option<u32>,
    #[serde(default)]
    pub members: Vec<BandMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandMember {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub experience_level: Option<i64>,
    pub trophies: Option<i64>,
}

impl BandProfile {
    /// Member count in `#/50` form.
    pub fn member_count_display(&self) -> String {
        format!("{}/{}", self.member_count.unwrap_or(0), BAND_CAPACITY)
    }

    pub fn badge_url(&self) -> Option<String> {
        self.badge.map(|badge| format!("{}/{}.png", BADGE_URL_BASE, badge))
    }

    /// Members sorted by trophies, highest first.
    pub fn roster(&self) -> Vec<&BandMember> {
        let mut members: Vec<&BandMember> = self.members.iter().collect();
        members.sort_by(|a, b| b.trophies.unwrap_or(0).cmp(&a.trophies.unwrap_or(0)));
        members
    }
}
