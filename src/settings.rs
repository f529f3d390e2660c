use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Per-view filter configuration. Numeric filter fields keep the raw operator
/// text; they are parsed leniently at filter time so a half-typed value never
/// blocks the view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewSettings {
    pub snapshot_id: Option<u32>,
    pub comparison_snapshot_id: Option<u32>,
    pub min_era: String,
    pub min_points: String,
    pub max_points: String,
    pub min_battles: String,
    pub max_battles: String,
    pub min_battles_diff: String,
    pub max_battles_diff: String,
    pub excluded_guilds: Vec<String>,
    pub show_invitation: bool,
    pub invitation_cutoff: String,
    pub exclude_contacted: bool,
}

impl ViewSettings {
    pub fn new(snapshot_id: Option<u32>) -> Self {
        Self {
            snapshot_id,
            comparison_snapshot_id: None,
            min_era: String::new(),
            min_points: String::new(),
            max_points: String::new(),
            min_battles: String::new(),
            max_battles: String::new(),
            min_battles_diff: String::new(),
            max_battles_diff: String::new(),
            excluded_guilds: Vec::new(),
            show_invitation: false,
            invitation_cutoff: String::new(),
            exclude_contacted: false,
        }
    }

    /// Drop empty guild entries and deduplicate by canonical form. First
    /// occurrence wins; order is otherwise preserved.
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.excluded_guilds.retain(|name| {
            let key = canonical_guild_name(name);
            if key.is_empty() {
                return false;
            }
            seen.insert(key)
        });
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn excludes_guild(&self, name: &str) -> bool {
        let key = canonical_guild_name(name);
        self.excluded_guilds
            .iter()
            .any(|g| canonical_guild_name(g) == key)
    }
}

/// Canonical form used for guild-name equality: NFKD decompose, strip
/// combining marks, keep only letters and digits, lowercase. "Foo Bar" and
/// "foo-bar" collapse to the same key; "FooBarBaz" does not.
pub fn canonical_guild_name(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lenient numeric filter parse. Empty input means "no constraint", as does
/// anything that still fails to parse after separators are stripped.
pub fn parse_numeric_filter(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '\'')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

/// Parse the timestamp shapes the service emits: RFC 3339 first, then common
/// naive layouts, then a plain date. Unparsable input is treated as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Keep only the characters a numeric filter box accepts.
pub fn sanitize_numeric_input(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect()
}
