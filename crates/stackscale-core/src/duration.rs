//! Human-readable durations ("250us", "500ms", "30s", "5m", "1h", "7d").

use std::time::Duration;

/// Parse a duration string like "30s", "5m", "1h" or "7d". Sub-second
/// values take "ms", "us" or "ns".
///
/// A bare integer is read as seconds. Returns `None` for anything else.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    for (suffix, per_sec) in [("ms", 1_000), ("us", 1_000_000), ("ns", 1_000_000_000)] {
        if let Some(v) = s.strip_suffix(suffix) {
            return v.trim().parse::<u128>().ok().and_then(|n| subsecond_units(n, per_sec));
        }
    }
    let (digits, unit_secs) = if let Some(v) = s.strip_suffix('s') {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3600)
    } else if let Some(v) = s.strip_suffix('d') {
        (v, 86_400)
    } else {
        (s, 1)
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_secs))
        .map(Duration::from_secs)
}

fn subsecond_units(n: u128, per_sec: u128) -> Option<Duration> {
    let secs = u64::try_from(n / per_sec).ok()?;
    let nanos = (n % per_sec) * (1_000_000_000 / per_sec);
    Some(Duration::new(secs, nanos as u32))
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos % 1_000 != 0 {
        return format!("{}ns", d.as_nanos());
    }
    if nanos % 1_000_000 != 0 {
        return format!("{}us", d.as_micros());
    }
    if nanos != 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    match secs {
        0 => "0s".to_string(),
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

/// Serde adapter storing a `Duration` as a human-readable string.
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {raw:?}")))
    }
}
