//! Clash Royale player profile.
//!
//! Every field is optional: the profile API has changed shape several times
//! and cached snapshots may predate the current one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub trophies: Option<i64>,
    pub global_rank: Option<i64>,
    pub experience: Option<Experience>,
    pub clan: Option<PlayerClan>,
    pub arena: Option<Arena>,
    pub stats: Option<PlayerStats>,
    pub games: Option<Games>,
    #[serde(default)]
    pub previous_seasons: Vec<Season>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub level: Option<i64>,
    pub xp: Option<i64>,
    pub xp_required_for_level_up: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerClan {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arena {
    pub name: Option<String>,
    pub arena: Option<String>,
    #[serde(rename = "arenaID")]
    pub arena_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub max_trophies: Option<i64>,
    pub legendary_trophies: Option<i64>,
    pub challenge_cards_won: Option<i64>,
    pub challenge_max_wins: Option<i64>,
    pub tournament_cards_won: Option<i64>,
    pub total_donations: Option<i64>,
    pub cards_found: Option<i64>,
    pub favorite_card: Option<String>,
    pub three_crown_wins: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Games {
    pub total: Option<i64>,
    pub tournament_games: Option<i64>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
    pub draws: Option<i64>,
    pub current_win_streak: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_number: Option<i64>,
    pub season_highest: Option<i64>,
    pub season_ending: Option<i64>,
    pub season_end_global_rank: Option<i64>,
}

/// Leagues start after arena 11.
const LAST_ARENA_ID: i64 = 11;

impl PlayerProfile {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown player")
    }

    /// "Clan name #TAG", or `None` when the player has no clan.
    pub fn clan_name_tag(&self) -> Option<String> {
        let clan = self.clan.as_ref()?;
        let name = clan.name.as_deref().unwrap_or("Unknown clan");
        match clan.tag.as_deref() {
            Some(tag) => Some(format!("{} #{}", name, tag)),
            None => Some(name.to_string()),
        }
    }

    pub fn level(&self) -> Option<i64> {
        self.experience.as_ref().and_then(|e| e.level)
    }

    /// Win ratio over wins and losses only; draws include 2v2 games.
    pub fn win_ratio(&self) -> Option<f64> {
        let games = self.games.as_ref()?;
        let wins = games.wins.unwrap_or(0);
        let losses = games.losses.unwrap_or(0);
        if wins + losses == 0 {
            return None;
        }
        Some(wins as f64 / (wins + losses) as f64)
    }

    pub fn win_streak(&self) -> i64 {
        self.games
            .as_ref()
            .and_then(|g| g.current_win_streak)
            .unwrap_or(0)
            .max(0)
    }

    pub fn tourney_cards_per_game(&self) -> Option<f64> {
        let won = self.stats.as_ref()?.tournament_cards_won?;
        let games = self.games.as_ref()?.tournament_games?;
        if games == 0 {
            return None;
        }
        Some(won as f64 / games as f64)
    }

    /// League number, 0 while the player is still in an arena.
    pub fn league(&self) -> i64 {
        self.arena
            .as_ref()
            .and_then(|a| a.arena_id)
            .map(|id| (id - LAST_ARENA_ID).max(0))
            .unwrap_or(0)
    }

    /// Finished seasons, oldest first.
    pub fn seasons(&self) -> Vec<&Season> {
        let mut seasons: Vec<&Season> = self.previous_seasons.iter().collect();
        seasons.sort_by_key(|s| s.season_number);
        seasons
    }
}
