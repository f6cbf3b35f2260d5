// tests/config_load.rs
use feed_accumulator::config::{load_default, load_from, ENV_CONFIG_PATH};
use std::path::PathBuf;
use std::{env, fs};

#[test]
fn explicit_paths_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("feeds.toml");
    fs::write(
        &p_toml,
        r#"
feeds_dir = "public/feeds"
public_base_url = "https://pub.test/feeds"
timezone_label = "HKT"
utc_offset_minutes = 480
fetch_attempts = 0

[[sources]]
url = "https://a.test/rss"
"#,
    )
    .unwrap();
    let cfg = load_from(&p_toml).unwrap();
    assert_eq!(cfg.feeds_dir, PathBuf::from("public/feeds"));
    assert_eq!(cfg.fetch_attempts, 1);
    assert_eq!(cfg.timezone_label, "HKT");
    assert_eq!(cfg.store_path("a"), PathBuf::from("public/feeds/a.xml"));
    assert_eq!(cfg.published_feed_url("a"), "https://pub.test/feeds/a.xml");

    let p_json = dir.path().join("feeds.json");
    fs::write(
        &p_json,
        r#"{"sources": [{"url": "https://b.test/rss"}, {"fetchrss_url": " https://b.test/rss "}]}"#,
    )
    .unwrap();
    let cfg = load_from(&p_json).unwrap();
    assert_eq!(cfg.source_urls(), vec!["https://b.test/rss"]);
    assert_eq!(cfg.published_feed_url("b"), "feeds/b.xml");

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[[sources]\nurl=").unwrap();
    assert!(load_from(&broken).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // keep the repo's own config/ out of the picture
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) nothing at all
    assert!(load_default().is_err());

    // 2) JSON fallback
    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/feeds.json",
        r#"{"feeds": [{"fetchrss_url": "https://json.test"}]}"#,
    )
    .unwrap();
    assert_eq!(load_default().unwrap().source_urls(), vec!["https://json.test"]);

    // 3) TOML wins over JSON
    fs::write("config/feeds.toml", "[[sources]]\nurl = \"https://toml.test\"\n").unwrap();
    assert_eq!(load_default().unwrap().source_urls(), vec!["https://toml.test"]);

    // 4) env beats both
    let p_env = tmp.path().join("elsewhere.json");
    fs::write(&p_env, r#"{"sources": [{"url": "https://env.test"}]}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, &p_env);
    assert_eq!(load_default().unwrap().source_urls(), vec!["https://env.test"]);

    // 5) env pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(load_default().is_err());

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(old).unwrap();
}
