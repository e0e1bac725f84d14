use std::time::Duration;

use serde::Serialize;
use size_format::SizeFormatterBinary as SF;

use super::engine::EngineStats;

/// Progress of the active transfer, recomputed on every polling tick.
///
/// Downloaded bytes and the completed fraction never go backwards within one
/// transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Fraction complete in 0..=1.
    pub fraction: f64,
    pub download_speed: Speed,
    pub upload_speed: Speed,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub time_remaining: Option<DurationWithHumanReadable>,
    pub peers: usize,
}

impl ProgressSnapshot {
    pub fn from_engine(stats: EngineStats, previous: Option<&ProgressSnapshot>) -> Self {
        let downloaded_bytes = match previous {
            Some(p) => stats.downloaded_bytes.max(p.downloaded_bytes),
            None => stats.downloaded_bytes,
        };
        let fraction = match (stats.progress, stats.total_bytes) {
            (Some(p), _) if p.is_finite() => p,
            (_, 0) => 0f64,
            (_, total) => downloaded_bytes as f64 / total as f64,
        }
        .clamp(0f64, 1f64);
        let fraction = match previous {
            Some(p) => fraction.max(p.fraction),
            None => fraction,
        };

        let remaining_bytes = stats.total_bytes.saturating_sub(downloaded_bytes);
        let time_remaining = stats
            .time_remaining
            .or_else(|| {
                if stats.download_speed == 0 || remaining_bytes == 0 {
                    return None;
                }
                Some(Duration::from_secs(remaining_bytes / stats.download_speed))
            })
            .map(DurationWithHumanReadable);

        Self {
            fraction,
            download_speed: Speed(stats.download_speed),
            upload_speed: Speed(stats.upload_speed),
            downloaded_bytes,
            total_bytes: stats.total_bytes,
            time_remaining,
            peers: stats.peers,
        }
    }

    pub fn percent(&self) -> u32 {
        (self.fraction * 100f64).floor() as u32
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}%, down {}, up {}, {} / {}",
            self.percent(),
            self.download_speed,
            self.upload_speed,
            SF::new(self.downloaded_bytes),
            SF::new(self.total_bytes)
        )?;
        if let Some(eta) = &self.time_remaining {
            write!(f, ", eta {eta}")?;
        }
        write!(f, ", peers: {}", self.peers)
    }
}

fn format_seconds_to_time(seconds: u64, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    if days > 0 {
        write!(f, "{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        write!(f, "{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        write!(f, "{minutes}m {seconds}s")
    } else {
        write!(f, "{seconds}s")
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DurationWithHumanReadable(pub Duration);

impl core::fmt::Display for DurationWithHumanReadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> core::fmt::Result {
        format_seconds_to_time(self.0.as_secs(), f)
    }
}

impl core::fmt::Debug for DurationWithHumanReadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Serialize for DurationWithHumanReadable {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Tmp {
            duration: Duration,
            human_readable: String,
        }
        Tmp {
            duration: self.0,
            human_readable: format!("{self}"),
        }
        .serialize(serializer)
    }
}

/// Transfer rate in bytes per second.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Speed(pub u64);

impl core::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/s", SF::new(self.0))
    }
}

impl core::fmt::Debug for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Serialize for Speed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Tmp {
            bytes_per_second: u64,
            human_readable: String,
        }
        Tmp {
            bytes_per_second: self.0,
            human_readable: format!("{self}"),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_from_bytes_when_engine_has_none() {
        let s = ProgressSnapshot::from_engine(
            EngineStats {
                downloaded_bytes: 250,
                total_bytes: 1000,
                ..Default::default()
            },
            None,
        );
        assert_eq!(s.fraction, 0.25);
        assert_eq!(s.percent(), 25);
        assert_eq!(s.time_remaining, None);
    }

    #[test]
    fn test_never_goes_backwards() {
        let first = ProgressSnapshot::from_engine(
            EngineStats {
                progress: Some(0.5),
                downloaded_bytes: 500,
                total_bytes: 1000,
                ..Default::default()
            },
            None,
        );
        let second = ProgressSnapshot::from_engine(
            EngineStats {
                progress: Some(0.4),
                downloaded_bytes: 400,
                total_bytes: 1000,
                ..Default::default()
            },
            Some(&first),
        );
        assert_eq!(second.fraction, 0.5);
        assert_eq!(second.downloaded_bytes, 500);
    }

    #[test]
    fn test_eta_is_estimated_from_speed() {
        let s = ProgressSnapshot::from_engine(
            EngineStats {
                downloaded_bytes: 0,
                total_bytes: 3_600 * 100,
                download_speed: 100,
                ..Default::default()
            },
            None,
        );
        assert_eq!(
            s.time_remaining,
            Some(DurationWithHumanReadable(Duration::from_secs(3600)))
        );
        assert_eq!(s.time_remaining.unwrap().to_string(), "1h 0m 0s");
    }

    #[test]
    fn test_human_readable_durations() {
        let fmt = |secs| DurationWithHumanReadable(Duration::from_secs(secs)).to_string();
        assert_eq!(fmt(5), "5s");
        assert_eq!(fmt(65), "1m 5s");
        assert_eq!(fmt(90_061), "1d 1h 1m 1s");
    }

    #[test]
    fn test_display() {
        let s = ProgressSnapshot::from_engine(
            EngineStats {
                progress: Some(0.999),
                downloaded_bytes: 999,
                total_bytes: 1000,
                peers: 3,
                ..Default::default()
            },
            None,
        );
        let text = s.to_string();
        assert!(text.starts_with("99%"), "{text}");
        assert!(text.ends_with("peers: 3"), "{text}");
    }
}
