use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use ps_client::{event_channel, PubSubClient, PubSubClientBuilder};
use ps_domain::config::{Config, ConfigSeverity};
use serde_json::Value;

/// Timetokens count 100ns ticks since the Unix epoch.
const TICKS_PER_SECOND: u64 = 10_000_000;

const REDACTED: &str = "********";

fn client(config: &Config) -> anyhow::Result<PubSubClient> {
    PubSubClientBuilder::from_config(config)
        .build()
        .context("building client")
}

pub async fn time(config: &Config) -> anyhow::Result<()> {
    let timetoken = client(config)?.time().await;
    if timetoken == 0 {
        bail!("service unreachable");
    }
    match render_timetoken(timetoken) {
        Some(utc) => println!("{timetoken}\t{}", utc.to_rfc3339()),
        None => println!("{timetoken}"),
    }
    Ok(())
}

pub async fn publish(config: &Config, channel: &str, raw: String) -> anyhow::Result<()> {
    let result = client(config)?.publish(channel, parse_message(raw)).await;
    println!("{}", result.to_value());
    if !result.is_success() {
        bail!("publish failed: {}", result.description);
    }
    Ok(())
}

pub async fn history(config: &Config, channel: &str, limit: Option<u32>) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(config.client.history_limit);
    let records = client(config)?.history(channel, limit).await?;
    for record in records {
        println!("{record}");
    }
    Ok(())
}

pub async fn subscribe(config: &Config, channels: &[String]) -> anyhow::Result<()> {
    let (callback, mut events) = event_channel();
    let client = PubSubClientBuilder::from_config(config)
        .callback(callback)
        .build()
        .context("building client")?;

    for channel in channels {
        client.subscribe(channel);
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", serde_json::to_string(&event)?);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, unsubscribing");
                break;
            }
        }
    }

    client.unsubscribe_all();
    Ok(())
}

pub fn uuid() {
    println!("{}", PubSubClient::uuid());
}

/// Print config issues. Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    for issue in &issues {
        println!("{issue}");
    }
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count,
        issues.len() - error_count,
    );

    error_count == 0
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

/// Copy of `config` with signing and cipher keys masked.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for key in [&mut config.client.secret_key, &mut config.client.cipher_key] {
        if key.as_deref().is_some_and(|k| !k.is_empty()) {
            *key = Some(REDACTED.to_owned());
        }
    }
    config
}

fn parse_message(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn render_timetoken(timetoken: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(timetoken / TICKS_PER_SECOND).ok()?;
    let nanos = ((timetoken % TICKS_PER_SECOND) * 100) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
}
