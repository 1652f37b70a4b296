//! Rendering of polled server state into a [`RenderedStatus`].
//!
//! The output is platform neutral; the artifact channel decides how fields
//! and the description are laid out on the destination.

use chrono::{DateTime, Utc};

use crate::models::{MonitorConfig, Player, RenderedStatus, RuleSet, ServerSummary, StatusField};

/// Maximum number of players listed individually.
pub const MAX_LISTED_PLAYERS: usize = 50;

/// Rule key holding the number of in-game days the server has been running.
const RULE_DAYS_RUNNING: &str = "days-runningv2";

/// Rule key flagging whether blood bound equipment is enabled.
const RULE_BLOOD_BOUND: &str = "blood-bound-enabled";

/// Render the current state of `monitor`'s server.
///
/// Player gear levels and the server description are included only when the
/// corresponding display toggle is set on the monitor.
pub fn render_status(
    monitor: &MonitorConfig,
    summary: &ServerSummary,
    players: &[Player],
    rules: &RuleSet,
    now: DateTime<Utc>,
) -> RenderedStatus {
    let mut fields = vec![field("Ip Address", monitor.address(), true)];

    if let Some(version) = summary.game_version.as_deref().filter(|v| !v.is_empty()) {
        fields.push(field("Server Version", version.to_string(), true));
    }

    fields.push(field(
        "Online count",
        format!("{}/{}", summary.player_count, summary.max_players),
        true,
    ));
    fields.push(field("Map", summary.map.clone(), true));

    if let Some(days) = rules.get(RULE_DAYS_RUNNING) {
        fields.push(field("Days running", days.to_string(), true));
    }
    if let Some(enabled) = rules.get(RULE_BLOOD_BOUND) {
        let value = if is_truthy(enabled) { "yes" } else { "no" };
        fields.push(field("Blood Bound Equipment", value.to_string(), true));
    }

    fields.push(field(
        "Online players",
        render_players(players, monitor.display_player_gear_level),
        false,
    ));

    let description = if monitor.display_server_description {
        server_description(rules)
    } else {
        None
    };

    RenderedStatus {
        title: summary.name.clone(),
        description,
        fields,
        timestamp: now,
    }
}

/// Join the `desc0`, `desc1`, ... rules into the server description.
///
/// Stops at the first missing index. Returns `None` when `desc0` is absent or
/// the joined text is blank.
pub fn server_description(rules: &RuleSet) -> Option<String> {
    let description: String = (0..)
        .map(|i| rules.get(&format!("desc{i}")))
        .take_while(Option::is_some)
        .flatten()
        .collect();

    if description.trim().is_empty() {
        None
    } else {
        Some(description)
    }
}

/// Format a connection duration in seconds as `"45m"`, `"3h"` or `"3h 45m"`.
///
/// # Examples
///
/// ```
/// use status_core::render::format_online_duration;
///
/// assert_eq!(format_online_duration(59), "0m");
/// assert_eq!(format_online_duration(45 * 60), "45m");
/// assert_eq!(format_online_duration(3 * 3600), "3h");
/// assert_eq!(format_online_duration(3 * 3600 + 45 * 60), "3h 45m");
/// ```
pub fn format_online_duration(secs: u64) -> String {
    let total_mins = secs / 60;
    if total_mins < 60 {
        format!("{}m", total_mins)
    } else {
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn field(name: &str, value: String, inline: bool) -> StatusField {
    StatusField {
        name: name.to_string(),
        value,
        inline,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn render_players(players: &[Player], show_gear_level: bool) -> String {
    if players.is_empty() {
        return "No players online".to_string();
    }

    let mut lines: Vec<String> = players
        .iter()
        .take(MAX_LISTED_PLAYERS)
        .map(|p| {
            let mut line = format!(
                "{} (online {})",
                display_name(&p.name),
                format_online_duration(p.duration_secs)
            );
            if show_gear_level {
                line.push_str(&format!(" - Gear Level: {}", p.score));
            }
            line
        })
        .collect();

    if players.len() > MAX_LISTED_PLAYERS {
        lines.push(format!("... and {} more", players.len() - MAX_LISTED_PLAYERS));
    }

    lines.join("\n")
}

/// Players that are still loading in report an empty name.
fn display_name(name: &str) -> &str {
    if name.trim().is_empty() {
        "(connecting)"
    } else {
        name
    }
}
