use std::net::SocketAddr;

use chrono_tz::Tz;

use crate::scheduler::Slot;
use crate::transport::ChatTarget;

pub const DEFAULT_TIMEZONE: &str = "Europe/Belgrade";
pub const DEFAULT_SLOTS: &str = "10:00,13:00,16:00,19:00,22:00";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub target: ChatTarget,
    pub timezone: Tz,
    pub slots: Vec<Slot>,
    pub database_url: String,
    pub http_addr: Option<SocketAddr>,
    pub api_token: Option<String>,
    pub poll_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let var_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let bot_token = var("TG_BOT_TOKEN")
            .ok_or_else(|| "Missing required environment variable: TG_BOT_TOKEN".to_string())?;

        let target = match (var("TG_CHANNEL"), var("TG_CHANNEL_ID")) {
            (Some(handle), _) => ChatTarget::Handle(handle.trim().to_string()),
            (None, Some(id)) => ChatTarget::Id(
                id.trim()
                    .parse()
                    .map_err(|e| format!("Invalid TG_CHANNEL_ID: {e}"))?,
            ),
            (None, None) => {
                return Err(
                    "Set TG_CHANNEL (e.g. @your_channel) or TG_CHANNEL_ID (-100...)".to_string(),
                );
            }
        };

        let tz_name = var_or("TZ", DEFAULT_TIMEZONE);
        let timezone: Tz = tz_name
            .trim()
            .parse()
            .map_err(|e| format!("Invalid TZ '{tz_name}': {e}"))?;

        let slots = parse_slots(&var_or("POST_SLOTS", DEFAULT_SLOTS))?;

        let database_url = var_or("SLOTPOST_DATABASE_URL", "sqlite://queue.db");

        let http_addr: Option<SocketAddr> = var("SLOTPOST_HTTP_ADDR")
            .map(|addr| {
                addr.trim()
                    .parse()
                    .map_err(|e| format!("Invalid SLOTPOST_HTTP_ADDR: {e}"))
            })
            .transpose()?;

        let api_token = var("SLOTPOST_API_TOKEN");

        let poll_timeout_secs: u64 = var_or("SLOTPOST_POLL_TIMEOUT", "25")
            .trim()
            .parse()
            .map_err(|e| format!("Invalid SLOTPOST_POLL_TIMEOUT: {e}"))?;

        let log_level = var_or("SLOTPOST_LOG_LEVEL", "info");

        Ok(Config {
            bot_token,
            target,
            timezone,
            slots,
            database_url,
            http_addr,
            api_token,
            poll_timeout_secs,
            log_level,
        })
    }
}

/// Parse `HH:MM,HH:MM,...` into a sorted set of distinct slots.
pub fn parse_slots(raw: &str) -> Result<Vec<Slot>, String> {
    let mut slots = raw
        .split(',')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            chunk
                .parse::<Slot>()
                .map_err(|e| format!("Invalid POST_SLOTS entry '{chunk}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    slots.sort();
    slots.dedup();

    if slots.is_empty() {
        return Err("POST_SLOTS must contain at least one HH:MM time".to_string());
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_applied() {
        let config = Config::from_lookup(lookup(&[
            ("TG_BOT_TOKEN", "123:abc"),
            ("TG_CHANNEL", "@news"),
        ]))
        .unwrap();

        assert_eq!(config.target, ChatTarget::Handle("@news".into()));
        assert_eq!(config.timezone, chrono_tz::Europe::Belgrade);
        assert_eq!(config.slots.len(), 5);
        assert_eq!(config.slots[0].to_string(), "10:00");
        assert_eq!(config.database_url, "sqlite://queue.db");
        assert!(config.http_addr.is_none());
        assert_eq!(config.poll_timeout_secs, 25);
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[("TG_CHANNEL", "@news")])).unwrap_err();
        assert!(err.contains("TG_BOT_TOKEN"));
    }

    #[test]
    fn missing_destination_is_fatal() {
        let err = Config::from_lookup(lookup(&[("TG_BOT_TOKEN", "t")])).unwrap_err();
        assert!(err.contains("TG_CHANNEL"));
    }

    #[test]
    fn handle_takes_precedence_over_numeric_id() {
        let config = Config::from_lookup(lookup(&[
            ("TG_BOT_TOKEN", "t"),
            ("TG_CHANNEL", "@news"),
            ("TG_CHANNEL_ID", "-100200"),
        ]))
        .unwrap();
        assert_eq!(config.target, ChatTarget::Handle("@news".into()));

        let config = Config::from_lookup(lookup(&[
            ("TG_BOT_TOKEN", "t"),
            ("TG_CHANNEL_ID", "-100200"),
        ]))
        .unwrap();
        assert_eq!(config.target, ChatTarget::Id(-100200));
    }

    #[test]
    fn invalid_channel_id_rejected() {
        assert!(
            Config::from_lookup(lookup(&[("TG_BOT_TOKEN", "t"), ("TG_CHANNEL_ID", "news")]))
                .is_err()
        );
    }

    #[test]
    fn unknown_timezone_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TG_BOT_TOKEN", "t"),
            ("TG_CHANNEL", "@news"),
            ("TZ", "Mars/Olympus"),
        ]))
        .unwrap_err();
        assert!(err.contains("Invalid TZ"));
    }

    #[test]
    fn slots_sorted_and_deduplicated() {
        let slots = parse_slots("22:00, 09:30,,22:00,9:30").unwrap();
        let rendered: Vec<String> = slots.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["09:30", "22:00"]);
    }

    #[test]
    fn malformed_slot_rejected() {
        assert!(parse_slots("10:00,25:00").is_err());
        assert!(parse_slots("noon").is_err());
        assert!(parse_slots(" , ").is_err());
    }
}
