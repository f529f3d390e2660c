use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::presets;
use crate::settings::{canonical_guild_name, parse_timestamp, ViewSettings};

/// One point-in-time capture of the player table, as listed by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u32,
    pub label: String,
    pub captured_at: String,
}

/// One player in one snapshot. The three recruitment fields are the only
/// mutable part and only change through a confirmed service update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub player_id: u32,
    pub player_name: String,
    #[serde(default)]
    pub guild_id: Option<u32>,
    #[serde(default)]
    pub guild_name: Option<String>,
    pub era_nr: i64,
    pub points: i64,
    pub battles: i64,
    #[serde(default)]
    pub recruitment_status: Option<String>,
    #[serde(default)]
    pub recruitment_note: Option<String>,
    #[serde(default)]
    pub recruitment_last_contacted_at: Option<String>,
}

/// Recruitment patch payload. Empty strings clear the corresponding field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentUpdate {
    #[serde(default)]
    pub recruitment_status: String,
    #[serde(default)]
    pub recruitment_note: String,
    #[serde(default)]
    pub recruitment_last_contacted_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    PlayerId,
    PlayerName,
    GuildId,
    GuildName,
    EraNr,
    Points,
    Battles,
    BattlesDiff,
    RecruitmentStatus,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::PlayerId => "Player ID",
            SortKey::PlayerName => "Player",
            SortKey::GuildId => "Guild ID",
            SortKey::GuildName => "Guild",
            SortKey::EraNr => "Era",
            SortKey::Points => "Points",
            SortKey::Battles => "Battles",
            SortKey::BattlesDiff => "Battles Δ",
            SortKey::RecruitmentStatus => "Invitation",
        }
    }

    pub fn next(self) -> SortKey {
        match self {
            SortKey::PlayerId => SortKey::PlayerName,
            SortKey::PlayerName => SortKey::GuildId,
            SortKey::GuildId => SortKey::GuildName,
            SortKey::GuildName => SortKey::EraNr,
            SortKey::EraNr => SortKey::Points,
            SortKey::Points => SortKey::Battles,
            SortKey::Battles => SortKey::BattlesDiff,
            SortKey::BattlesDiff => SortKey::RecruitmentStatus,
            SortKey::RecruitmentStatus => SortKey::PlayerId,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

pub const DEFAULT_SORT: SortConfig = SortConfig {
    key: SortKey::Points,
    direction: SortDirection::Desc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabKind {
    All,
    Guild {
        guild_id: Option<u32>,
        guild_name: String,
    },
}

/// An independent named view with its own filters and sort order.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: String,
    pub label: String,
    pub kind: TabKind,
    pub sort: SortConfig,
    pub settings: ViewSettings,
}

pub const ALL_TAB_ID: &str = "all";

fn all_tab(settings: ViewSettings) -> Tab {
    Tab {
        id: ALL_TAB_ID.to_string(),
        label: "All Players".to_string(),
        kind: TabKind::All,
        sort: DEFAULT_SORT,
        settings,
    }
}

/// A single editable field of the active tab's settings.
#[derive(Debug, Clone)]
pub enum SettingsChange {
    SnapshotId(Option<u32>),
    ComparisonSnapshotId(Option<u32>),
    MinEra(String),
    MinPoints(String),
    MaxPoints(String),
    MinBattles(String),
    MaxBattles(String),
    MinBattlesDiff(String),
    MaxBattlesDiff(String),
    AddExcludedGuild(String),
    RemoveExcludedGuild(String),
    ShowInvitation(bool),
    InvitationCutoff(String),
    ExcludeContacted(bool),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub snapshots: Vec<Snapshot>,
    /// Snapshot id -> player rows. Append-only for the session; a failed load
    /// never inserts an entry.
    pub player_cache: HashMap<u32, Vec<PlayerRow>>,
    /// Ids with a fetch currently in flight, tracked apart from the cache.
    pub loading_snapshots: HashSet<u32>,
    /// Ids whose last fetch failed. Held back from automatic reloads until
    /// the next user action so a dead service is not hammered every frame.
    pub failed_snapshots: HashSet<u32>,
    pub tabs: Vec<Tab>,
    pub active_tab_id: String,
    pub error: Option<String>,
    /// Inline per-player messages for failed recruitment updates.
    pub row_notices: HashMap<u32, String>,
    pub logs: VecDeque<String>,
    pub selected: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            player_cache: HashMap::with_capacity(8),
            loading_snapshots: HashSet::new(),
            failed_snapshots: HashSet::new(),
            tabs: Vec::new(),
            active_tab_id: ALL_TAB_ID.to_string(),
            error: None,
            row_notices: HashMap::new(),
            logs: VecDeque::with_capacity(200),
            selected: 0,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs
            .iter()
            .find(|t| t.id == self.active_tab_id)
            .or_else(|| self.tabs.first())
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        let pos = self
            .tabs
            .iter()
            .position(|t| t.id == self.active_tab_id)
            .unwrap_or(0);
        self.tabs.get_mut(pos)
    }

    pub fn active_snapshot(&self) -> Option<&Snapshot> {
        let id = self.active_tab()?.settings.snapshot_id?;
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Every user action re-arms loads for ids whose last fetch failed.
    fn clear_load_failures(&mut self) {
        self.failed_snapshots.clear();
    }

    pub fn select_tab(&mut self, id: &str) {
        if self.tabs.iter().any(|t| t.id == id) {
            self.active_tab_id = id.to_string();
            self.selected = 0;
            self.clear_load_failures();
        }
    }

    pub fn select_next_tab(&mut self) {
        let Some(pos) = self.tabs.iter().position(|t| t.id == self.active_tab_id) else {
            return;
        };
        let next = (pos + 1) % self.tabs.len();
        self.active_tab_id = self.tabs[next].id.clone();
        self.selected = 0;
        self.clear_load_failures();
    }

    /// Open (or re-activate) the drill-down tab for a guild. Existing tabs are
    /// matched by guild id when both sides carry one, else by canonical name,
    /// so the same guild never gets two tabs.
    pub fn open_guild_tab(&mut self, guild_id: Option<u32>, guild_name: Option<&str>) {
        let label = match guild_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match guild_id {
                Some(id) => format!("Guild {id}"),
                None => "Guild".to_string(),
            },
        };
        let canon = canonical_guild_name(&label);

        let existing = self.tabs.iter().find(|t| match &t.kind {
            TabKind::Guild {
                guild_id: tab_guild,
                guild_name: tab_name,
            } => match (guild_id, tab_guild) {
                (Some(target), Some(have)) => target == *have,
                _ => canonical_guild_name(tab_name) == canon,
            },
            TabKind::All => false,
        });
        if let Some(tab) = existing {
            self.active_tab_id = tab.id.clone();
            self.selected = 0;
            self.clear_load_failures();
            return;
        }

        let settings = self
            .active_tab()
            .map(|t| t.settings.clone())
            .unwrap_or_else(|| ViewSettings::new(self.snapshots.first().map(|s| s.id)))
            .normalized();

        let key = guild_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| canon.clone());
        let tab = Tab {
            id: format!("guild-{key}-{}", self.tabs.len() + 1),
            label: label.clone(),
            kind: TabKind::Guild {
                guild_id,
                guild_name: label,
            },
            sort: DEFAULT_SORT,
            settings,
        };
        self.active_tab_id = tab.id.clone();
        self.selected = 0;
        self.tabs.push(tab);
        self.clear_load_failures();
    }

    /// The "all" tab cannot be closed; closing the active guild tab falls
    /// back to "all".
    pub fn close_tab(&mut self, id: &str) {
        if id == ALL_TAB_ID {
            return;
        }
        self.tabs.retain(|t| t.id != id);
        if self.active_tab_id == id {
            self.active_tab_id = ALL_TAB_ID.to_string();
            self.selected = 0;
        }
    }

    pub fn update_active_settings(&mut self, change: SettingsChange) {
        let Some(tab) = self.active_tab_mut() else {
            return;
        };
        let settings = &mut tab.settings;
        match change {
            SettingsChange::SnapshotId(id) => settings.snapshot_id = id,
            SettingsChange::ComparisonSnapshotId(id) => settings.comparison_snapshot_id = id,
            SettingsChange::MinEra(v) => settings.min_era = v,
            SettingsChange::MinPoints(v) => settings.min_points = v,
            SettingsChange::MaxPoints(v) => settings.max_points = v,
            SettingsChange::MinBattles(v) => settings.min_battles = v,
            SettingsChange::MaxBattles(v) => settings.max_battles = v,
            SettingsChange::MinBattlesDiff(v) => settings.min_battles_diff = v,
            SettingsChange::MaxBattlesDiff(v) => settings.max_battles_diff = v,
            SettingsChange::AddExcludedGuild(name) => settings.excluded_guilds.push(name),
            SettingsChange::RemoveExcludedGuild(name) => {
                let key = canonical_guild_name(&name);
                settings
                    .excluded_guilds
                    .retain(|g| canonical_guild_name(g) != key);
            }
            SettingsChange::ShowInvitation(on) => settings.show_invitation = on,
            SettingsChange::InvitationCutoff(v) => settings.invitation_cutoff = v,
            SettingsChange::ExcludeContacted(on) => settings.exclude_contacted = on,
        }
        settings.normalize();
        self.clear_load_failures();
    }

    /// Copy the active tab's settings onto every tab; each tab keeps its own
    /// sort order.
    pub fn apply_settings_to_all(&mut self) {
        let Some(source) = self.active_tab().map(|t| t.settings.clone()) else {
            return;
        };
        let source = source.normalized();
        for tab in &mut self.tabs {
            tab.settings = source.clone();
        }
        self.clear_load_failures();
    }

    pub fn cycle_active_sort_key(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.sort.key = tab.sort.key.next();
        }
    }

    pub fn toggle_active_sort_direction(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.sort.direction = tab.sort.direction.toggled();
        }
    }

    /// Snapshot ids some tab needs (primary or comparison) that are neither
    /// cached nor already being fetched.
    pub fn needed_snapshot_ids(&self) -> Vec<u32> {
        let mut needed: Vec<u32> = Vec::new();
        for tab in &self.tabs {
            for id in [tab.settings.snapshot_id, tab.settings.comparison_snapshot_id]
                .into_iter()
                .flatten()
            {
                if self.player_cache.contains_key(&id)
                    || self.loading_snapshots.contains(&id)
                    || self.failed_snapshots.contains(&id)
                {
                    continue;
                }
                if !needed.contains(&id) {
                    needed.push(id);
                }
            }
        }
        needed
    }

    pub fn mark_loading(&mut self, snapshot_id: u32) {
        self.loading_snapshots.insert(snapshot_id);
    }

    pub fn is_loading(&self, snapshot_id: Option<u32>) -> bool {
        snapshot_id.is_some_and(|id| {
            self.loading_snapshots.contains(&id) && !self.player_cache.contains_key(&id)
        })
    }

    /// Apply a named preset to the active tab. Settings are rebuilt from the
    /// blank default; the preset's sort (if any) replaces the tab's.
    pub fn apply_preset(&mut self, preset_id: &str) {
        let Some(preset) = presets::find(preset_id) else {
            return;
        };
        let snapshot_id = self
            .active_tab()
            .and_then(|t| t.settings.snapshot_id)
            .or_else(|| self.snapshots.first().map(|s| s.id));
        let options = match snapshot_id {
            Some(id) => presets::comparison_options(&self.snapshots, id),
            None => Vec::new(),
        };
        let (settings, sort) = presets::resolve(preset, snapshot_id, &options);
        let label = preset.label;
        if let Some(tab) = self.active_tab_mut() {
            tab.settings = settings;
            if let Some(sort) = sort {
                tab.sort = sort;
            }
        }
        self.push_log(format!("[INFO] Preset applied: {label}"));
    }

    pub fn clamp_selection(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn select_next(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }
}

/// State mutations emitted by the provider thread.
#[derive(Debug, Clone)]
pub enum Delta {
    SetSnapshots(Vec<Snapshot>),
    SnapshotListFailed {
        message: String,
    },
    SnapshotLoaded {
        snapshot_id: u32,
        rows: Vec<PlayerRow>,
    },
    SnapshotLoadFailed {
        snapshot_id: u32,
        message: String,
    },
    RecruitmentSaved {
        snapshot_id: u32,
        player_id: u32,
        update: RecruitmentUpdate,
    },
    RecruitmentFailed {
        player_id: u32,
        message: String,
    },
    Log(String),
}

/// Work requests for the provider thread.
#[derive(Debug, Clone)]
pub enum ProviderCommand {
    LoadSnapshotList,
    LoadSnapshot {
        snapshot_id: u32,
    },
    UpdateRecruitment {
        snapshot_id: u32,
        player_id: u32,
        update: RecruitmentUpdate,
    },
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetSnapshots(mut snapshots) => {
            snapshots.sort_by(|a, b| {
                parse_timestamp(&b.captured_at).cmp(&parse_timestamp(&a.captured_at))
            });
            if state.tabs.is_empty() {
                let settings = ViewSettings::new(snapshots.first().map(|s| s.id));
                state.tabs.push(all_tab(settings));
                state.active_tab_id = ALL_TAB_ID.to_string();
            }
            state.push_log(format!("[INFO] Snapshots loaded: {}", snapshots.len()));
            state.snapshots = snapshots;
        }
        Delta::SnapshotListFailed { message } => {
            state.error = Some("Failed to load snapshots.".to_string());
            state.push_log(format!("[WARN] Snapshot list error: {message}"));
        }
        Delta::SnapshotLoaded { snapshot_id, rows } => {
            state.loading_snapshots.remove(&snapshot_id);
            state.failed_snapshots.remove(&snapshot_id);
            state.push_log(format!(
                "[INFO] Snapshot {snapshot_id} loaded ({} rows)",
                rows.len()
            ));
            state.player_cache.insert(snapshot_id, rows);
        }
        Delta::SnapshotLoadFailed {
            snapshot_id,
            message,
        } => {
            // The cache stays unpopulated so a later attempt can retry.
            state.loading_snapshots.remove(&snapshot_id);
            state.failed_snapshots.insert(snapshot_id);
            state.error = Some("Failed to load player data.".to_string());
            state.push_log(format!("[WARN] Snapshot {snapshot_id} error: {message}"));
        }
        Delta::RecruitmentSaved {
            snapshot_id,
            player_id,
            update,
        } => {
            if let Some(rows) = state.player_cache.get_mut(&snapshot_id) {
                for row in rows.iter_mut().filter(|r| r.player_id == player_id) {
                    row.recruitment_status = non_empty(update.recruitment_status.clone());
                    row.recruitment_note = non_empty(update.recruitment_note.clone());
                    row.recruitment_last_contacted_at =
                        non_empty(update.recruitment_last_contacted_at.clone());
                }
            }
            state.row_notices.remove(&player_id);
            state.push_log(format!("[INFO] Recruitment saved for player {player_id}"));
        }
        Delta::RecruitmentFailed { player_id, message } => {
            state.row_notices.insert(player_id, message.clone());
            state.push_log(format!(
                "[WARN] Recruitment update failed for player {player_id}: {message}"
            ));
        }
        Delta::Log(message) => state.push_log(message),
    }
}
