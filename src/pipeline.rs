use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::settings::{
    canonical_guild_name, parse_numeric_filter, parse_timestamp, ViewSettings,
};
use crate::state::{PlayerRow, SortConfig, SortDirection, SortKey, Tab, TabKind};

/// A player row plus the battle-count delta against the comparison snapshot.
/// Recomputed whenever any input changes, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRow {
    pub row: PlayerRow,
    pub battles_diff: Option<i64>,
}

/// Bounds parsed once per derivation from the raw settings text. Unparsable
/// text degrades to "no constraint".
#[derive(Debug, Clone)]
pub struct RowFilter {
    min_era: Option<i64>,
    min_points: Option<i64>,
    max_points: Option<i64>,
    min_battles: Option<i64>,
    max_battles: Option<i64>,
    excluded: HashSet<String>,
    cutoff: Option<DateTime<Utc>>,
    exclude_contacted: bool,
}

impl RowFilter {
    pub fn from_settings(settings: &ViewSettings) -> Self {
        let cutoff = if settings.show_invitation {
            parse_timestamp(&settings.invitation_cutoff)
        } else {
            None
        };
        Self {
            min_era: parse_numeric_filter(&settings.min_era),
            min_points: parse_numeric_filter(&settings.min_points),
            max_points: parse_numeric_filter(&settings.max_points),
            min_battles: parse_numeric_filter(&settings.min_battles),
            max_battles: parse_numeric_filter(&settings.max_battles),
            excluded: settings
                .excluded_guilds
                .iter()
                .map(|g| canonical_guild_name(g))
                .collect(),
            cutoff,
            exclude_contacted: settings.exclude_contacted,
        }
    }

    pub fn keep(&self, row: &PlayerRow) -> bool {
        if let Some(min_era) = self.min_era
            && row.era_nr < min_era
        {
            return false;
        }
        if let Some(min) = self.min_points
            && row.points < min
        {
            return false;
        }
        if let Some(max) = self.max_points
            && row.points > max
        {
            return false;
        }
        if let Some(min) = self.min_battles
            && row.battles < min
        {
            return false;
        }
        if let Some(max) = self.max_battles
            && row.battles > max
        {
            return false;
        }
        if !self.excluded.is_empty() {
            let name = row.guild_name.as_deref().unwrap_or("");
            if self.excluded.contains(&canonical_guild_name(name)) {
                return false;
            }
        }
        if self.exclude_contacted
            && row
                .recruitment_last_contacted_at
                .as_deref()
                .is_some_and(|d| !d.is_empty())
        {
            return false;
        }
        if let Some(cutoff) = self.cutoff
            && let Some(contacted) = row
                .recruitment_last_contacted_at
                .as_deref()
                .and_then(parse_timestamp)
            && contacted > cutoff
        {
            // Contacted after the cutoff means too recent to approach again.
            return false;
        }
        true
    }
}

/// Full derivation for one tab: scope, filter, diff, diff-filter, sort.
/// Missing cache entries yield an empty result rather than an error.
pub fn derive_rows(cache: &HashMap<u32, Vec<PlayerRow>>, tab: &Tab) -> Vec<ComputedRow> {
    let base: &[PlayerRow] = tab
        .settings
        .snapshot_id
        .and_then(|id| cache.get(&id))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let filter = RowFilter::from_settings(&tab.settings);
    let comparison = tab
        .settings
        .comparison_snapshot_id
        .and_then(|id| cache.get(&id));
    let battles_by_player: Option<HashMap<u32, i64>> = comparison.map(|rows| {
        rows.iter().map(|r| (r.player_id, r.battles)).collect()
    });

    let mut rows: Vec<ComputedRow> = base
        .iter()
        .filter(|row| in_tab_scope(row, &tab.kind))
        .filter(|row| filter.keep(row))
        .map(|row| ComputedRow {
            battles_diff: battles_by_player
                .as_ref()
                .and_then(|lookup| lookup.get(&row.player_id))
                .map(|prev| row.battles - prev),
            row: row.clone(),
        })
        .collect();

    let min_diff = parse_numeric_filter(&tab.settings.min_battles_diff);
    let max_diff = parse_numeric_filter(&tab.settings.max_battles_diff);
    if min_diff.is_some() || max_diff.is_some() {
        // A row without a diff fails any configured diff bound.
        rows.retain(|r| {
            let Some(diff) = r.battles_diff else {
                return false;
            };
            min_diff.is_none_or(|min| diff >= min) && max_diff.is_none_or(|max| diff <= max)
        });
    }

    sort_rows(&mut rows, tab.sort);
    rows
}

fn in_tab_scope(row: &PlayerRow, kind: &TabKind) -> bool {
    match kind {
        TabKind::All => true,
        TabKind::Guild {
            guild_id,
            guild_name,
        } => match (guild_id, row.guild_id) {
            (Some(target), Some(have)) => *target == have,
            _ => row.guild_name.as_deref() == Some(guild_name.as_str()),
        },
    }
}

/// Stable sort by the tab's sort config. Numeric keys compare numerically
/// with absent values ordered first on ascending; text keys compare
/// case-insensitively with absent values as the empty string. The invitation
/// column sorts by contact timestamp, never-contacted first on ascending.
pub fn sort_rows(rows: &mut [ComputedRow], sort: SortConfig) {
    let key = sort.key;
    let cmp = move |a: &ComputedRow, b: &ComputedRow| -> std::cmp::Ordering {
        match key {
            SortKey::PlayerId => a.row.player_id.cmp(&b.row.player_id),
            SortKey::GuildId => a.row.guild_id.cmp(&b.row.guild_id),
            SortKey::EraNr => a.row.era_nr.cmp(&b.row.era_nr),
            SortKey::Points => a.row.points.cmp(&b.row.points),
            SortKey::Battles => a.row.battles.cmp(&b.row.battles),
            SortKey::BattlesDiff => a.battles_diff.cmp(&b.battles_diff),
            SortKey::PlayerName => fold_text(Some(&a.row.player_name))
                .cmp(&fold_text(Some(&b.row.player_name))),
            SortKey::GuildName => fold_text(a.row.guild_name.as_deref())
                .cmp(&fold_text(b.row.guild_name.as_deref())),
            SortKey::RecruitmentStatus => contact_ts(&a.row).cmp(&contact_ts(&b.row)),
        }
    };
    match sort.direction {
        SortDirection::Asc => rows.sort_by(cmp),
        SortDirection::Desc => rows.sort_by(move |a, b| cmp(b, a)),
    }
}

fn fold_text(value: Option<&str>) -> String {
    value.unwrap_or("").to_lowercase()
}

fn contact_ts(row: &PlayerRow) -> i64 {
    row.recruitment_last_contacted_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Distinct guild names present in a row set, deduplicated canonically and
/// sorted; feeds the exclusion suggestions in the settings panel.
pub fn available_guilds(rows: &[PlayerRow]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        let Some(name) = row.guild_name.as_deref() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if seen.insert(canonical_guild_name(name)) {
            names.push(name.to_string());
        }
    }
    names.sort();
    names
}

/// Guild suggestions matching a query, canonical substring match, capped.
pub fn suggest_guilds(available: &[String], query: &str, limit: usize) -> Vec<String> {
    let needle = canonical_guild_name(query.trim());
    available
        .iter()
        .filter(|name| needle.is_empty() || canonical_guild_name(name).contains(&needle))
        .take(limit)
        .cloned()
        .collect()
}
