use std::num::ParseIntError;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

/// USBVIDH/USBVIDL factory value.
pub const DEFAULT_VENDOR_ID: u16 = 0x04D8;
/// USBPIDH/USBPIDL factory value.
pub const DEFAULT_PRODUCT_ID: u16 = 0x00DD;

/// Pause after a cancel the chip reports as having had nothing to cancel.
const DEFAULT_SETTLE_DELAY_MS: u64 = 20;

/// Bridge identity and transfer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub settle_delay_ms: u64,
    /// Ceiling on GetData polls per read. `None` polls until the device
    /// delivers, which can block forever on a wedged chip.
    pub max_polls: Option<u32>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_polls: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with `MCP2221_VID`, `MCP2221_PID`, `MCP2221_SETTLE_MS`
    /// and `MCP2221_MAX_POLLS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "MCP2221_VID", parse_u16) {
            config.vendor_id = v;
        }
        if let Some(v) = parse_var(&lookup, "MCP2221_PID", parse_u16) {
            config.product_id = v;
        }
        if let Some(v) = parse_var(&lookup, "MCP2221_SETTLE_MS", |s| s.parse::<u64>().ok()) {
            config.settle_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MCP2221_MAX_POLLS", |s| s.parse::<u32>().ok()) {
            config.max_polls = Some(v);
        }
        config
    }

    /// Replace only the settings that were given explicitly, e.g. on a
    /// command line or as keyword arguments.
    pub fn overlay(
        mut self,
        vendor_id: Option<u16>,
        product_id: Option<u16>,
        max_polls: Option<u32>,
    ) -> Self {
        if let Some(vid) = vendor_id {
            self.vendor_id = vid;
        }
        if let Some(pid) = product_id {
            self.product_id = pid;
        }
        if max_polls.is_some() {
            self.max_polls = max_polls;
        }
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("ignoring {key}={raw:?}: not a valid value");
    }
    parsed
}

/// Hex with a `0x` prefix, or plain decimal. Shared by the environment
/// overlay and the probe's command line so `1240` means the same everywhere.
pub fn parse_u16(s: &str) -> Option<u16> {
    parse_int(s, u16::from_str_radix)
}

/// Same rules as [`parse_u16`], for addresses and data bytes.
pub fn parse_u8(s: &str) -> Option<u8> {
    parse_int(s, u8::from_str_radix)
}

fn parse_int<T>(s: &str, from_radix: fn(&str, u32) -> Result<T, ParseIntError>) -> Option<T> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => from_radix(hex, 16).ok(),
        None => from_radix(s, 10).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_factory_identity() {
        let config = BridgeConfig::default();
        assert_eq!(config.vendor_id, 0x04D8);
        assert_eq!(config.product_id, 0x00DD);
        assert_eq!(config.settle_delay(), Duration::from_millis(20));
        assert_eq!(config.max_polls, None);
    }

    #[test]
    fn env_overrides() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            ("MCP2221_VID", "0x1234"),
            ("MCP2221_PID", "221"),
            ("MCP2221_SETTLE_MS", "5"),
            ("MCP2221_MAX_POLLS", "100"),
        ]));
        assert_eq!(config.vendor_id, 0x1234);
        assert_eq!(config.product_id, 221);
        assert_eq!(config.settle_delay_ms, 5);
        assert_eq!(config.max_polls, Some(100));
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            ("MCP2221_VID", "0xZZZZ"),
            ("MCP2221_MAX_POLLS", "-3"),
        ]));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn explicit_settings_override_only_what_they_name() {
        let base = BridgeConfig::from_lookup(lookup_from(&[
            ("MCP2221_SETTLE_MS", "5"),
            ("MCP2221_MAX_POLLS", "10"),
        ]));

        assert_eq!(base.clone().overlay(None, None, None), base);

        let config = base.overlay(Some(0x1234), None, Some(3));
        assert_eq!(config.vendor_id, 0x1234);
        assert_eq!(config.product_id, DEFAULT_PRODUCT_ID);
        assert_eq!(config.settle_delay_ms, 5);
        assert_eq!(config.max_polls, Some(3));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: BridgeConfig = serde_json::from_str(r#"{"max_polls": 32}"#).unwrap();
        assert_eq!(config.max_polls, Some(32));
        assert_eq!(config.vendor_id, DEFAULT_VENDOR_ID);
    }

    #[test]
    fn parse_u16_forms() {
        assert_eq!(parse_u16("0x00dd"), Some(0xDD));
        assert_eq!(parse_u16("0X04D8"), Some(0x04D8));
        assert_eq!(parse_u16("1240"), Some(1240));
        assert_eq!(parse_u16("70000"), None);
    }

    #[test]
    fn decimal_and_hex_agree_with_the_cli() {
        assert_eq!(parse_u16("1240"), Some(0x04D8));
        assert_eq!(parse_u16("0x1240"), Some(0x1240));
        assert_eq!(parse_u8("24"), Some(0x18));
        assert_eq!(parse_u8("0x18"), Some(0x18));
        assert_eq!(parse_u8(" 0xff "), Some(0xFF));
        assert_eq!(parse_u8("ff"), None);
        assert_eq!(parse_u8("256"), None);
    }
}
