use crate::settings::{parse_timestamp, ViewSettings};
use crate::state::{Snapshot, SortConfig, SortDirection, SortKey};

/// Fixed era progression, oldest first. Filters compare by 1-based index;
/// the table displays the name.
pub const ERA_ORDER: [&str; 21] = [
    "IronAge",
    "EarlyMiddleAge",
    "HighMiddleAge",
    "LateMiddleAge",
    "ColonialAge",
    "IndustrialAge",
    "ProgressiveEra",
    "ModernEra",
    "PostModernEra",
    "ContemporaryEra",
    "TomorrowEra",
    "FutureEra",
    "ArcticFuture",
    "OceanicFuture",
    "VirtualFuture",
    "SpaceAgeMars",
    "SpaceAgeAsteroidBelt",
    "SpaceAgeVenus",
    "SpaceAgeJupiterMoon",
    "SpaceAgeTitan",
    "SpaceAgeSpaceHub",
];

/// 1-based index of an era name; None for unknown names.
pub fn era_index(name: &str) -> Option<i64> {
    ERA_ORDER
        .iter()
        .position(|era| *era == name)
        .map(|idx| idx as i64 + 1)
}

/// Display name for a 1-based era index.
pub fn era_name(era_nr: i64) -> Option<&'static str> {
    if era_nr < 1 {
        return None;
    }
    ERA_ORDER.get(era_nr as usize - 1).copied()
}

/// A named, declarative settings bundle. Plain data; adding an entry to
/// `PRESETS` is all it takes to ship a new one.
#[derive(Debug, Clone)]
pub struct Preset {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub min_era_name: Option<&'static str>,
    pub min_points: Option<i64>,
    pub min_battles: Option<i64>,
    pub excluded_guilds: &'static [&'static str],
    pub show_invitation: bool,
    pub exclude_contacted: bool,
    /// Auto-pick a comparison snapshot at least this many days older.
    pub auto_comparison_min_days: Option<i64>,
    pub sort: Option<SortConfig>,
}

pub static PRESETS: [Preset; 2] = [
    Preset {
        id: "default",
        label: "Default",
        description: "Blank preset with all filters cleared.",
        min_era_name: None,
        min_points: None,
        min_battles: None,
        excluded_guilds: &[],
        show_invitation: true,
        exclude_contacted: false,
        auto_comparison_min_days: None,
        sort: Some(SortConfig {
            key: SortKey::Points,
            direction: SortDirection::Desc,
        }),
    },
    Preset {
        id: "recruit",
        label: "Recruit",
        description: "High-end players for recruitment.",
        min_era_name: Some("FutureEra"),
        min_points: Some(10_000_000),
        min_battles: Some(10_000),
        excluded_guilds: &[
            "𝕯𝖊𝖘𝖕𝖊𝖗𝖆𝖉𝖔𝖘",
            "Outsiders",
            "🥇 Neuaufsteher 🥇",
            "Force of Nature",
            "Only Ronin`s",
            "🐉DragonRocker🏴‍☠️",
            "FunFighters",
            "Black Phönix",
        ],
        show_invitation: true,
        exclude_contacted: false,
        auto_comparison_min_days: Some(14),
        sort: Some(SortConfig {
            key: SortKey::BattlesDiff,
            direction: SortDirection::Desc,
        }),
    },
];

pub fn find(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Another snapshot described relative to the active one, in whole days.
#[derive(Debug, Clone)]
pub struct ComparisonOption {
    pub id: u32,
    pub diff_days: i64,
    pub label: String,
}

/// Day offsets of every other snapshot relative to the base snapshot's
/// capture time, sorted ascending. Positive means older than the base.
pub fn comparison_options(snapshots: &[Snapshot], base_id: u32) -> Vec<ComparisonOption> {
    let Some(base) = snapshots
        .iter()
        .find(|s| s.id == base_id)
        .and_then(|s| parse_timestamp(&s.captured_at))
    else {
        return Vec::new();
    };

    let mut options: Vec<ComparisonOption> = snapshots
        .iter()
        .filter(|s| s.id != base_id)
        .filter_map(|s| {
            let captured = parse_timestamp(&s.captured_at)?;
            let diff_days =
                ((base - captured).num_seconds() as f64 / 86_400.0).round() as i64;
            Some(ComparisonOption {
                id: s.id,
                diff_days,
                label: offset_label(diff_days),
            })
        })
        .collect();
    options.sort_by_key(|o| o.diff_days);
    options
}

fn offset_label(diff_days: i64) -> String {
    let magnitude = diff_days.abs();
    let unit = if magnitude == 1 { "day" } else { "days" };
    if diff_days >= 0 {
        format!("{magnitude} {unit} ago")
    } else {
        format!("{magnitude} {unit} ahead")
    }
}

/// Smallest offset at least `min_days` old; else the largest offset on the
/// table; else nothing.
pub fn pick_auto_comparison(options: &[ComparisonOption], min_days: i64) -> Option<u32> {
    options
        .iter()
        .find(|o| o.diff_days >= min_days)
        .or_else(|| options.last())
        .map(|o| o.id)
}

/// Resolve a preset into concrete settings for the active snapshot, plus the
/// sort override if the preset declares one.
pub fn resolve(
    preset: &Preset,
    snapshot_id: Option<u32>,
    options: &[ComparisonOption],
) -> (ViewSettings, Option<SortConfig>) {
    let mut settings = ViewSettings::new(snapshot_id);

    if let Some(name) = preset.min_era_name
        && let Some(index) = era_index(name)
    {
        settings.min_era = index.to_string();
    }
    if let Some(points) = preset.min_points {
        settings.min_points = points.to_string();
    }
    if let Some(battles) = preset.min_battles {
        settings.min_battles = battles.to_string();
    }
    settings.excluded_guilds = preset
        .excluded_guilds
        .iter()
        .map(|g| g.to_string())
        .collect();
    settings.show_invitation = preset.show_invitation;
    settings.exclude_contacted = preset.exclude_contacted;

    if let Some(min_days) = preset.auto_comparison_min_days {
        settings.comparison_snapshot_id = pick_auto_comparison(options, min_days);
    }

    settings.normalize();
    (settings, preset.sort)
}
