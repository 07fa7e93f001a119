use std::path::PathBuf;

use chrono::NaiveDate;
use chrono_tz::Tz;

/// Runtime settings, read from `CHAIRTIME_*` environment variables.
/// Unparseable values fall back to their defaults with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub seed_path: Option<PathBuf>,
    /// Day to print; today in `tz` when unset.
    pub date: Option<NaiveDate>,
    pub tz: Tz,
    pub metrics_port: Option<u16>,
    /// Keep following the store after printing the agenda.
    pub listen: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed_path: None,
            date: None,
            tz: Tz::UTC,
            metrics_port: None,
            listen: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            seed_path: get("CHAIRTIME_SEED").filter(|s| !s.is_empty()).map(PathBuf::from),
            date: parse_or_warn(&get, "CHAIRTIME_DATE", |s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
            }),
            tz: parse_or_warn(&get, "CHAIRTIME_TZ", |s| s.parse::<Tz>().ok())
                .unwrap_or(defaults.tz),
            metrics_port: parse_or_warn(&get, "CHAIRTIME_METRICS_PORT", |s| s.parse().ok()),
            listen: get("CHAIRTIME_LISTEN")
                .is_some_and(|s| matches!(s.as_str(), "1" | "true" | "yes")),
        }
    }
}

fn parse_or_warn<F, T, P>(get: &F, key: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = get(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        tracing::warn!("ignoring {key}={raw:?}: not a valid value");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), Config::default());
    }

    #[test]
    fn reads_every_variable() {
        let c = config(&[
            ("CHAIRTIME_SEED", "salon.json"),
            ("CHAIRTIME_DATE", "2026-03-02"),
            ("CHAIRTIME_TZ", "Europe/Berlin"),
            ("CHAIRTIME_METRICS_PORT", "9100"),
            ("CHAIRTIME_LISTEN", "1"),
        ]);
        assert_eq!(c.seed_path, Some(PathBuf::from("salon.json")));
        assert_eq!(c.date, NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(c.tz, chrono_tz::Europe::Berlin);
        assert_eq!(c.metrics_port, Some(9100));
        assert!(c.listen);
    }

    #[test]
    fn bad_values_fall_back() {
        let c = config(&[
            ("CHAIRTIME_DATE", "tomorrow"),
            ("CHAIRTIME_TZ", "Mars/Olympus"),
            ("CHAIRTIME_METRICS_PORT", "99999"),
            ("CHAIRTIME_LISTEN", "0"),
        ]);
        assert_eq!(c, Config::default());
    }
}
