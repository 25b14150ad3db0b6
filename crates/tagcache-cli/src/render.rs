//! Plain-text rendering of snapshots and refresh results.

use std::fmt::Write as _;

use tagcache_core::cache::{FetchOutcome, RefreshSummary, Snapshot, StoreError};
use tagcache_core::config::ProfileKind;
use tagcache_core::models::{BandProfile, MemberId, PlayerProfile};
use tagcache_core::utils::{format_age_verbose, format_thousands, truncate_string};

/// Roster lines shown for a band.
const ROSTER_LIMIT: usize = 10;

/// Longest member name shown in a roster line.
const NAME_WIDTH: usize = 16;

fn opt_number(value: Option<i64>) -> String {
    value.map(format_thousands).unwrap_or_else(|| "-".to_string())
}

/// Render the result of a fetch the way a chat command would reply.
pub fn render_fetch(
    result: &Result<FetchOutcome, StoreError>,
    kind: ProfileKind,
    member: Option<MemberId>,
) -> String {
    match result {
        Ok(FetchOutcome::Fresh(snapshot)) => render_snapshot(snapshot, kind, member),
        Ok(FetchOutcome::Stale { snapshot, .. }) => format!(
            "Unable to load from API. Showing cached data from: {}.\n\n{}",
            format_age_verbose(snapshot.age()),
            render_snapshot(snapshot, kind, member)
        ),
        Err(StoreError::Unavailable { .. }) => "Unable to load from API.".to_string(),
        Err(e) => e.to_string(),
    }
}

pub fn render_snapshot(snapshot: &Snapshot, kind: ProfileKind, member: Option<MemberId>) -> String {
    let rendered = match kind {
        ProfileKind::Player => serde_json::from_value::<PlayerProfile>(snapshot.data.clone())
            .ok()
            .map(|player| render_player(&player, member)),
        ProfileKind::Band => serde_json::from_value::<BandProfile>(snapshot.data.clone())
            .ok()
            .map(|band| render_band(&band)),
    };
    rendered.unwrap_or_else(|| {
        serde_json::to_string_pretty(&snapshot.data).unwrap_or_else(|_| snapshot.data.to_string())
    })
}

pub fn render_player(player: &PlayerProfile, member: Option<MemberId>) -> String {
    let mut out = String::new();
    let tag = player.tag.as_deref().unwrap_or("?");
    let _ = writeln!(out, "{} #{}", player.display_name(), tag);

    match (player.clan_name_tag(), player.clan.as_ref().and_then(|c| c.role.as_deref())) {
        (Some(clan), Some(role)) => {
            let _ = writeln!(out, "{} ({})", clan, role);
        }
        (Some(clan), None) => {
            let _ = writeln!(out, "{}", clan);
        }
        (None, _) => {
            let _ = writeln!(out, "Not in clan");
        }
    }

    let best = player.stats.as_ref().and_then(|s| s.max_trophies);
    let _ = writeln!(
        out,
        "Trophies: {} (best {})",
        opt_number(player.trophies),
        opt_number(best)
    );
    if let Some(ref arena) = player.arena {
        let _ = writeln!(
            out,
            "Arena: {} - {}",
            arena.name.as_deref().unwrap_or("?"),
            arena.arena.as_deref().unwrap_or("?")
        );
    }
    if player.league() > 0 {
        let _ = writeln!(out, "League: {}", player.league());
    }
    if let Some(level) = player.level() {
        let _ = writeln!(out, "Level: {}", level);
    }
    if let Some(rank) = player.global_rank {
        let _ = writeln!(out, "Global rank: {}", format_thousands(rank));
    }

    if let Some(ref games) = player.games {
        let ratio = player
            .win_ratio()
            .map(|r| format!(" ({:.1}%)", r * 100.0))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "Wins/Losses/Draws: {}/{}/{}{}",
            opt_number(games.wins),
            opt_number(games.losses),
            opt_number(games.draws),
            ratio
        );
        let _ = writeln!(out, "Win streak: {}", player.win_streak());
    }

    if let Some(ref stats) = player.stats {
        let _ = writeln!(out, "Three crown wins: {}", opt_number(stats.three_crown_wins));
        let _ = writeln!(out, "Cards found: {}", opt_number(stats.cards_found));
        let _ = writeln!(out, "Total donations: {}", opt_number(stats.total_donations));
        if let Some(ref card) = stats.favorite_card {
            let _ = writeln!(out, "Favorite card: {}", card.replace('_', " "));
        }
    }
    if let Some(per_game) = player.tourney_cards_per_game() {
        let _ = writeln!(out, "Tourney cards/game: {:.2}", per_game);
    }

    let seasons = player.seasons();
    if !seasons.is_empty() {
        let _ = writeln!(out, "Seasons:");
        for season in seasons {
            let _ = writeln!(
                out,
                "  S{}: highest {}, ending {}",
                season.season_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                opt_number(season.season_highest),
                opt_number(season.season_ending)
            );
        }
    }

    let discord = member
        .map(|id| format!("<@{}>", id))
        .unwrap_or_else(|| "_".to_string());
    let _ = write!(out, "Discord: {}", discord);
    out
}

pub fn render_band(band: &BandProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} #{}",
        band.name.as_deref().unwrap_or("Unknown band"),
        band.tag.as_deref().unwrap_or("?")
    );
    if let Some(ref description) = band.description {
        let _ = writeln!(out, "{}", description);
    }
    let _ = writeln!(out, "Band Trophies: {}", opt_number(band.score));
    let _ = writeln!(out, "Type: {}", band.band_type.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "Required Trophies: {}", opt_number(band.required_score));
    let _ = write!(out, "Members: {}", band.member_count_display());
    if let Some(url) = band.badge_url() {
        let _ = write!(out, "\nBadge: {}", url);
    }

    let roster = band.roster();
    if !roster.is_empty() {
        let _ = write!(out, "\nRoster:");
        for (i, member) in roster.iter().take(ROSTER_LIMIT).enumerate() {
            let name = truncate_string(member.name.as_deref().unwrap_or("?"), NAME_WIDTH);
            let _ = write!(
                out,
                "\n{:>3}. {:<width$} {:>7} {}",
                i + 1,
                name,
                opt_number(member.trophies),
                member.role.as_deref().unwrap_or(""),
                width = NAME_WIDTH
            );
        }
        if roster.len() > ROSTER_LIMIT {
            let _ = write!(out, "\n     ... and {} more", roster.len() - ROSTER_LIMIT);
        }
    }
    out
}

pub fn render_summary(summary: &RefreshSummary) -> String {
    let mut out = format!(
        "Refreshed {} of {} tags.",
        summary.refreshed,
        summary.attempted()
    );
    let groups = [
        ("Serving cached data", &summary.stale),
        ("No data available", &summary.unavailable),
        ("Could not save", &summary.failed),
    ];
    for (label, tags) in groups {
        if !tags.is_empty() {
            let list: Vec<String> = tags.iter().map(|t| t.hashed()).collect();
            let _ = write!(out, "\n{}: {}", label, list.join(", "));
        }
    }
    out
}
