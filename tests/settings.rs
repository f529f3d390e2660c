use foe_scout::settings::{
    canonical_guild_name, parse_numeric_filter, parse_timestamp, sanitize_numeric_input,
    ViewSettings,
};

#[test]
fn canonical_guild_name_ignores_case_diacritics_and_punctuation() {
    assert_eq!(canonical_guild_name("Foo Bar"), "foobar");
    assert_eq!(canonical_guild_name("foo-bar"), "foobar");
    assert_eq!(canonical_guild_name("FÖO.BÀR!"), "foobar");
    assert_ne!(canonical_guild_name("FooBarBaz"), canonical_guild_name("Foo Bar"));
}

#[test]
fn canonical_guild_name_folds_styled_unicode_letters() {
    // Mathematical fraktur decomposes to plain letters under NFKD.
    assert_eq!(canonical_guild_name("𝕯𝖊𝖘𝖕𝖊𝖗𝖆𝖉𝖔𝖘"), "desperados");
    assert_eq!(canonical_guild_name("Black Phönix"), "blackphonix");
}

#[test]
fn normalize_dedupes_by_canonical_form_and_is_idempotent() {
    let mut settings = ViewSettings::new(Some(1));
    settings.excluded_guilds = vec![
        "Foo Bar".to_string(),
        "foo-bar".to_string(),
        "".to_string(),
        "FooBarBaz".to_string(),
        "FOO BAR".to_string(),
    ];
    settings.normalize();
    assert_eq!(settings.excluded_guilds, vec!["Foo Bar", "FooBarBaz"]);

    let again = settings.clone().normalized();
    assert_eq!(again, settings);
}

#[test]
fn excludes_guild_matches_canonical_form() {
    let mut settings = ViewSettings::new(Some(1));
    settings.excluded_guilds = vec!["Foo Bar".to_string()];
    assert!(settings.excludes_guild("foo-bar"));
    assert!(!settings.excludes_guild("FooBarBaz"));
}

#[test]
fn parse_numeric_filter_strips_separators() {
    assert_eq!(parse_numeric_filter("1,000,000"), Some(1_000_000));
    assert_eq!(parse_numeric_filter("10'000"), Some(10_000));
    assert_eq!(parse_numeric_filter(" 42 "), Some(42));
    assert_eq!(parse_numeric_filter("-5"), Some(-5));
}

#[test]
fn parse_numeric_filter_degrades_to_no_constraint() {
    assert_eq!(parse_numeric_filter(""), None);
    assert_eq!(parse_numeric_filter("   "), None);
    assert_eq!(parse_numeric_filter("abc"), None);
    assert_eq!(parse_numeric_filter("1.5"), None);
}

#[test]
fn parse_timestamp_accepts_common_layouts() {
    assert!(parse_timestamp("2024-01-15T08:30:00Z").is_some());
    assert!(parse_timestamp("2024-01-15T08:30:00").is_some());
    assert!(parse_timestamp("2024-01-15 08:30:00").is_some());
    assert!(parse_timestamp("2024-01-15").is_some());
    assert!(parse_timestamp("").is_none());
    assert!(parse_timestamp("not a date").is_none());
}

#[test]
fn parse_timestamp_orders_plain_dates() {
    let earlier = parse_timestamp("2024-01-01").unwrap();
    let later = parse_timestamp("2024-01-15").unwrap();
    assert!(earlier < later);
}

#[test]
fn sanitize_numeric_input_keeps_digits_and_minus() {
    assert_eq!(sanitize_numeric_input("12a'b3-"), "123-");
    assert_eq!(sanitize_numeric_input("x"), "");
}
