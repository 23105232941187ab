// tests/config.rs
use std::{env, fs};

use telegraph_ingest::config::{load_default, load_from, ENV_PATH};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("telegraph.toml");
    fs::write(
        &p_toml,
        r#"
source_url = "https://mirror.test/telegraph"
fetch_limit = 5
detail_jitter = false
"#,
    )
    .unwrap();
    let c = load_from(&p_toml).unwrap();
    assert_eq!(c.source_url, "https://mirror.test/telegraph");
    assert_eq!(c.fetch_limit, 5);
    assert!(!c.detail_jitter);
    assert_eq!(c.interval_minutes, 5);

    let p_json = dir.path().join("telegraph.json");
    fs::write(&p_json, r#"{"store_capacity": 50, "bind_addr": "127.0.0.1:9000"}"#).unwrap();
    let j = load_from(&p_json).unwrap();
    assert_eq!(j.store_capacity, 50);
    assert_eq!(j.bind_addr, "127.0.0.1:9000");

    let bad = dir.path().join("telegraph.toml.bak");
    fs::write(&bad, "this is = = not config").unwrap();
    assert!(load_from(&bad).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ isn't picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var(ENV_PATH);

    // 1) Nothing on disk -> built-in defaults
    let c = load_default().unwrap();
    assert_eq!(c.fetch_limit, 20);

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("telegraph.toml"), "fetch_limit = 3").unwrap();
    assert_eq!(load_default().unwrap().fetch_limit, 3);

    // 3) Env wins
    let p_env = tmp.path().join("override.json");
    fs::write(&p_env, r#"{"fetch_limit": 9}"#).unwrap();
    env::set_var(ENV_PATH, p_env.display().to_string());
    assert_eq!(load_default().unwrap().fetch_limit, 9);

    // 4) Env pointing nowhere is an error, not a silent default
    env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(load_default().is_err());
    env::remove_var(ENV_PATH);

    env::set_current_dir(&old).unwrap();
}
