use ps_domain::config::Config;

#[test]
fn default_origin_is_public_service() {
    let config = Config::default();
    assert_eq!(config.client.origin, "pubsub.pubnub.com");
    assert!(!config.client.ssl);
}

#[test]
fn default_reconnect_is_flat_and_unbounded() {
    let config = Config::default();
    assert_eq!(config.reconnect.initial_delay_ms, 5_000);
    assert_eq!(config.reconnect.max_delay_ms, 5_000);
    assert_eq!(config.reconnect.backoff_factor, 1.0);
    assert_eq!(config.reconnect.max_attempts, 0);
}

#[test]
fn client_section_parses() {
    let toml_str = r#"
[client]
publish_key = "pub-c-1"
subscribe_key = "sub-c-1"
cipher_key = "enigma"
ssl = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.client.publish_key, "pub-c-1");
    assert_eq!(config.client.subscribe_key, "sub-c-1");
    assert_eq!(config.client.cipher(), Some("enigma"));
    assert!(config.client.secret().is_none());
    assert_eq!(config.client.origin_url(), "https://pubsub.pubnub.com");
}

#[test]
fn reconnect_section_parses_partial() {
    let toml_str = r#"
[reconnect]
backoff_factor = 2.0
max_attempts = 8
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.reconnect.backoff_factor, 2.0);
    assert_eq!(config.reconnect.max_attempts, 8);
    assert_eq!(config.reconnect.initial_delay_ms, 5_000);
}

#[test]
fn logging_defaults_to_info_text() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.logging.filter, "info");
    assert!(!config.logging.json);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = Config::load_or_default("/nonexistent/pubsub.toml");
    assert_eq!(config.client.subscribe_key, "demo");
}

#[test]
fn load_reports_parse_errors() {
    let path = std::env::temp_dir().join(format!("ps-config-{}.toml", std::process::id()));
    std::fs::write(&path, "[client\nbroken").unwrap();
    let result = Config::load(path.to_str().unwrap());
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(ps_domain::error::Error::Toml(_))));
}
