use std::collections::HashMap;

use foe_scout::pipeline::{available_guilds, derive_rows, sort_rows, suggest_guilds, ComputedRow};
use foe_scout::settings::ViewSettings;
use foe_scout::state::{
    PlayerRow, SortConfig, SortDirection, SortKey, Tab, TabKind, DEFAULT_SORT,
};

fn row(player_id: u32, points: i64, battles: i64) -> PlayerRow {
    PlayerRow {
        player_id,
        player_name: format!("Player {player_id}"),
        guild_id: None,
        guild_name: None,
        era_nr: 10,
        points,
        battles,
        recruitment_status: None,
        recruitment_note: None,
        recruitment_last_contacted_at: None,
    }
}

fn all_tab(settings: ViewSettings) -> Tab {
    Tab {
        id: "all".to_string(),
        label: "All Players".to_string(),
        kind: TabKind::All,
        sort: DEFAULT_SORT,
        settings,
    }
}

#[test]
fn battles_diff_against_older_snapshot() {
    // Snapshot 2 is current, snapshot 1 is the comparison dataset.
    let mut cache = HashMap::new();
    cache.insert(2, vec![row(7, 1_000, 100)]);
    cache.insert(1, vec![row(7, 900, 80)]);

    let mut settings = ViewSettings::new(Some(2));
    settings.comparison_snapshot_id = Some(1);
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].battles_diff, Some(20));
}

#[test]
fn battles_diff_is_absent_for_players_missing_from_comparison() {
    let mut cache = HashMap::new();
    cache.insert(2, vec![row(7, 1_000, 100), row(8, 500, 50)]);
    cache.insert(1, vec![row(7, 900, 80)]);

    let mut settings = ViewSettings::new(Some(2));
    settings.comparison_snapshot_id = Some(1);
    let mut rows = derive_rows(&cache, &all_tab(settings));
    rows.sort_by_key(|r| r.row.player_id);
    assert_eq!(rows[0].battles_diff, Some(20));
    assert_eq!(rows[1].battles_diff, None);
}

#[test]
fn unloaded_comparison_behaves_like_no_comparison() {
    let mut cache = HashMap::new();
    cache.insert(2, vec![row(7, 1_000, 100)]);

    let mut settings = ViewSettings::new(Some(2));
    settings.comparison_snapshot_id = Some(99);
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows[0].battles_diff, None);
}

#[test]
fn diff_bound_without_comparison_excludes_every_row() {
    let mut cache = HashMap::new();
    cache.insert(2, vec![row(7, 1_000, 100), row(8, 500, 50)]);

    let mut settings = ViewSettings::new(Some(2));
    settings.min_battles_diff = "0".to_string();
    let rows = derive_rows(&cache, &all_tab(settings));
    assert!(rows.is_empty());
}

#[test]
fn excluded_guild_matches_canonical_form() {
    let mut with_guild = row(1, 100, 10);
    with_guild.guild_name = Some("foo-bar".to_string());
    let mut other = row(2, 100, 10);
    other.guild_name = Some("FooBarBaz".to_string());

    let mut cache = HashMap::new();
    cache.insert(1, vec![with_guild, other]);

    let mut settings = ViewSettings::new(Some(1));
    settings.excluded_guilds = vec!["Foo Bar".to_string()];
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.guild_name.as_deref(), Some("FooBarBaz"));
}

#[test]
fn min_era_is_inclusive() {
    let mut older = row(1, 100, 10);
    older.era_nr = 11;
    let mut newer = row(2, 100, 10);
    newer.era_nr = 12;

    let mut cache = HashMap::new();
    cache.insert(1, vec![older, newer]);

    let mut settings = ViewSettings::new(Some(1));
    settings.min_era = "12".to_string();
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.player_id, 2);
}

#[test]
fn points_and_battles_bounds_are_inclusive() {
    let mut cache = HashMap::new();
    cache.insert(1, vec![row(1, 100, 10), row(2, 200, 20), row(3, 300, 30)]);

    let mut settings = ViewSettings::new(Some(1));
    settings.min_points = "200".to_string();
    settings.max_points = "300".to_string();
    settings.min_battles = "20".to_string();
    settings.max_battles = "20".to_string();
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.player_id, 2);
}

#[test]
fn exclude_contacted_drops_rows_with_a_contact_date() {
    let mut contacted = row(1, 100, 10);
    contacted.recruitment_last_contacted_at = Some("2024-02-01".to_string());
    let never = row(2, 100, 10);

    let mut cache = HashMap::new();
    cache.insert(1, vec![contacted, never]);

    let mut settings = ViewSettings::new(Some(1));
    settings.exclude_contacted = true;
    let rows = derive_rows(&cache, &all_tab(settings));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.player_id, 2);
}

#[test]
fn invitation_cutoff_excludes_only_recent_contacts() {
    let mut recent = row(1, 100, 10);
    recent.recruitment_last_contacted_at = Some("2024-03-05".to_string());
    let mut old = row(2, 100, 10);
    old.recruitment_last_contacted_at = Some("2024-02-01".to_string());
    let never = row(3, 100, 10);

    let mut cache = HashMap::new();
    cache.insert(1, vec![recent, old, never]);

    let mut settings = ViewSettings::new(Some(1));
    settings.show_invitation = true;
    settings.invitation_cutoff = "2024-03-01".to_string();
    let rows = derive_rows(&cache, &all_tab(settings.clone()));
    let ids: Vec<u32> = rows.iter().map(|r| r.row.player_id).collect();
    assert_eq!(ids, vec![2, 3]);

    // An unparsable cutoff constrains nothing.
    settings.invitation_cutoff = "not a date".to_string();
    assert_eq!(derive_rows(&cache, &all_tab(settings.clone())).len(), 3);

    // The cutoff is inert while the invitation column is hidden.
    settings.invitation_cutoff = "2024-03-01".to_string();
    settings.show_invitation = false;
    assert_eq!(derive_rows(&cache, &all_tab(settings)).len(), 3);
}

#[test]
fn tightening_a_bound_never_grows_the_result() {
    let mut cache = HashMap::new();
    cache.insert(
        1,
        (0..50).map(|i| row(i, (i as i64) * 37 % 500, 10)).collect(),
    );

    let mut previous = usize::MAX;
    for min in [0, 100, 200, 300, 400, 500] {
        let mut settings = ViewSettings::new(Some(1));
        settings.min_points = min.to_string();
        let count = derive_rows(&cache, &all_tab(settings)).len();
        assert!(count <= previous, "min_points={min} grew the result");
        previous = count;
    }
}

#[test]
fn guild_tab_scopes_by_id_with_name_fallback() {
    let mut by_id = row(1, 100, 10);
    by_id.guild_id = Some(5);
    by_id.guild_name = Some("Alpha".to_string());
    let mut by_name = row(2, 100, 10);
    by_name.guild_name = Some("Alpha".to_string());
    let mut other = row(3, 100, 10);
    other.guild_id = Some(6);
    other.guild_name = Some("Beta".to_string());

    let mut cache = HashMap::new();
    cache.insert(1, vec![by_id, by_name, other]);

    let tab = Tab {
        id: "guild-5-2".to_string(),
        label: "Alpha".to_string(),
        kind: TabKind::Guild {
            guild_id: Some(5),
            guild_name: "Alpha".to_string(),
        },
        sort: SortConfig {
            key: SortKey::PlayerId,
            direction: SortDirection::Asc,
        },
        settings: ViewSettings::new(Some(1)),
    };
    let rows = derive_rows(&cache, &tab);
    let ids: Vec<u32> = rows.iter().map(|r| r.row.player_id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn missing_base_snapshot_yields_no_rows() {
    let cache = HashMap::new();
    let rows = derive_rows(&cache, &all_tab(ViewSettings::new(Some(1))));
    assert!(rows.is_empty());
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let mut rows: Vec<ComputedRow> = [(1, 100), (2, 200), (3, 100), (4, 100)]
        .into_iter()
        .map(|(id, points)| ComputedRow {
            row: row(id, points, 10),
            battles_diff: None,
        })
        .collect();
    sort_rows(
        &mut rows,
        SortConfig {
            key: SortKey::Points,
            direction: SortDirection::Asc,
        },
    );
    let ids: Vec<u32> = rows.iter().map(|r| r.row.player_id).collect();
    // Players 1, 3 and 4 tie on points and keep their incoming order.
    assert_eq!(ids, vec![1, 3, 4, 2]);
}

#[test]
fn never_contacted_sorts_first_ascending() {
    let mut contacted = row(1, 100, 10);
    contacted.recruitment_last_contacted_at = Some("2024-02-01".to_string());
    let never = row(2, 100, 10);
    let mut rows = vec![
        ComputedRow {
            row: contacted,
            battles_diff: None,
        },
        ComputedRow {
            row: never,
            battles_diff: None,
        },
    ];
    sort_rows(
        &mut rows,
        SortConfig {
            key: SortKey::RecruitmentStatus,
            direction: SortDirection::Asc,
        },
    );
    assert_eq!(rows[0].row.player_id, 2);

    sort_rows(
        &mut rows,
        SortConfig {
            key: SortKey::RecruitmentStatus,
            direction: SortDirection::Desc,
        },
    );
    assert_eq!(rows[0].row.player_id, 1);
}

#[test]
fn name_sort_is_case_insensitive_with_absent_as_empty() {
    let mut a = row(1, 100, 10);
    a.guild_name = Some("zeta".to_string());
    let mut b = row(2, 100, 10);
    b.guild_name = Some("Alpha".to_string());
    let c = row(3, 100, 10);
    let mut rows: Vec<ComputedRow> = [a, b, c]
        .into_iter()
        .map(|row| ComputedRow {
            row,
            battles_diff: None,
        })
        .collect();
    sort_rows(
        &mut rows,
        SortConfig {
            key: SortKey::GuildName,
            direction: SortDirection::Asc,
        },
    );
    let ids: Vec<u32> = rows.iter().map(|r| r.row.player_id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[test]
fn missing_diff_sorts_before_any_value_ascending() {
    let mut rows: Vec<ComputedRow> = [(1, Some(5)), (2, None), (3, Some(-2))]
        .into_iter()
        .map(|(id, diff)| ComputedRow {
            row: row(id, 100, 10),
            battles_diff: diff,
        })
        .collect();
    sort_rows(
        &mut rows,
        SortConfig {
            key: SortKey::BattlesDiff,
            direction: SortDirection::Asc,
        },
    );
    let ids: Vec<u32> = rows.iter().map(|r| r.row.player_id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[test]
fn available_guilds_dedupes_and_sorts() {
    let mut a = row(1, 100, 10);
    a.guild_name = Some("Zeta".to_string());
    let mut b = row(2, 100, 10);
    b.guild_name = Some("zéta".to_string());
    let mut c = row(3, 100, 10);
    c.guild_name = Some("Alpha".to_string());
    let d = row(4, 100, 10);

    let guilds = available_guilds(&[a, b, c, d]);
    assert_eq!(guilds, vec!["Alpha", "Zeta"]);
}

#[test]
fn suggest_guilds_filters_by_canonical_substring() {
    let available = vec![
        "Force of Nature".to_string(),
        "FunFighters".to_string(),
        "Outsiders".to_string(),
    ];
    assert_eq!(
        suggest_guilds(&available, "fun", 10),
        vec!["FunFighters".to_string()]
    );
    assert_eq!(suggest_guilds(&available, "", 2).len(), 2);
}
