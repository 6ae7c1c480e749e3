//! Completion estimates for in-flight shard recoveries.
//!
//! An estimate comes from a single sample (bytes recovered so far over time
//! elapsed so far) and assumes the rate stays constant.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cluster::{ClusterStateReader, RecoveryRecord};
use crate::error::{OpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySample {
    pub elapsed: Duration,
    pub bytes_total: u64,
    pub bytes_recovered: u64,
}

impl RecoverySample {
    pub fn new(elapsed: Duration, bytes_total: u64, bytes_recovered: u64) -> Self {
        Self {
            elapsed,
            bytes_total,
            bytes_recovered,
        }
    }

    pub fn from_record(record: &RecoveryRecord) -> Result<Self> {
        Ok(Self {
            elapsed: parse_elapsed(&record.elapsed)?,
            bytes_total: record.bytes_total,
            bytes_recovered: record.bytes_recovered,
        })
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.bytes_total.saturating_sub(self.bytes_recovered)
    }

    /// Bytes per second observed so far.
    pub fn rate(&self) -> Result<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Err(OpsError::degenerate("no time has elapsed, rate is undefined"));
        }
        Ok(self.bytes_recovered as f64 / secs)
    }

    pub fn eta(&self) -> Result<Duration> {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Err(OpsError::degenerate("no time has elapsed, rate is undefined"));
        }
        if self.bytes_recovered == 0 {
            return Err(OpsError::degenerate("nothing recovered yet, rate is zero"));
        }
        let remaining = self.remaining_bytes();
        if remaining == 0 {
            return Ok(Duration::ZERO);
        }
        // remaining / (recovered / secs), reordered to keep exact results exact.
        let eta_secs = remaining as f64 * secs / self.bytes_recovered as f64;
        Duration::try_from_secs_f64(eta_secs)
            .map_err(|e| OpsError::degenerate(format!("estimate out of range: {}", e)))
    }
}

/// Parses a cluster time value such as `350ms`, `1.5m`, `2h` or `12d`.
pub fn parse_elapsed(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| OpsError::degenerate(format!("missing time unit in {:?}", text)))?;
    let (number, unit) = text.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| OpsError::degenerate(format!("invalid time value {:?}", text)))?;
    let nanos_per_unit = match unit {
        "nanos" => 1.0,
        "micros" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        "d" => 86400e9,
        _ => {
            return Err(OpsError::degenerate(format!(
                "unknown time unit {:?} in {:?}",
                unit, text
            )))
        }
    };
    let nanos = (value * nanos_per_unit).round();
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(OpsError::degenerate(format!("time value out of range: {:?}", text)));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eta {
    Known(Duration),
    Unknown { reason: String },
}

impl Eta {
    pub fn known(&self) -> Option<Duration> {
        match self {
            Eta::Known(d) => Some(*d),
            Eta::Unknown { .. } => None,
        }
    }
}

impl From<Result<Duration>> for Eta {
    fn from(r: Result<Duration>) -> Self {
        match r {
            Ok(d) => Eta::Known(d),
            Err(e) => Eta::Unknown {
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryProgress {
    pub record: RecoveryRecord,
    pub eta: Eta,
}

pub struct RecoveryMonitor {
    reader: Arc<dyn ClusterStateReader>,
}

impl RecoveryMonitor {
    pub fn new(reader: Arc<dyn ClusterStateReader>) -> Self {
        Self { reader }
    }

    /// One progress entry per active recovery; rows that cannot be estimated
    /// carry `Eta::Unknown` instead of failing the whole listing.
    pub async fn active(&self) -> Result<Vec<RecoveryProgress>> {
        let records = self.reader.get_recoveries().await?;
        debug!(count = records.len(), "estimating recoveries");
        Ok(records
            .into_iter()
            .map(|record| {
                let eta = RecoverySample::from_record(&record)
                    .and_then(|s| s.eta())
                    .into();
                RecoveryProgress { record, eta }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeCluster;

    fn record(elapsed: &str, total: u64, recovered: u64) -> RecoveryRecord {
        RecoveryRecord {
            index: "logs".to_string(),
            shard: 0,
            stage: "index".to_string(),
            recovery_type: "peer".to_string(),
            source_node: "es-1".to_string(),
            target_node: "es-2".to_string(),
            elapsed: elapsed.to_string(),
            bytes_total: total,
            bytes_recovered: recovered,
        }
    }

    #[test]
    fn test_eta_two_hours_quarter_done() {
        let sample = RecoverySample::new(Duration::from_secs(2 * 3600), 400, 100);
        assert_eq!(sample.eta().unwrap(), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_eta_from_record() {
        let sample = RecoverySample::from_record(&record("2h", 400, 100)).unwrap();
        assert_eq!(sample.eta().unwrap(), Duration::from_secs(21600));
    }

    #[test]
    fn test_eta_zero_elapsed_is_degenerate() {
        let sample = RecoverySample::new(Duration::ZERO, 400, 100);
        assert!(matches!(
            sample.eta(),
            Err(OpsError::DegenerateComputation { .. })
        ));
        assert!(sample.rate().is_err());
    }

    #[test]
    fn test_eta_nothing_recovered_is_degenerate() {
        let sample = RecoverySample::new(Duration::from_secs(30), 400, 0);
        assert!(matches!(
            sample.eta(),
            Err(OpsError::DegenerateComputation { .. })
        ));
        assert_eq!(sample.rate().unwrap(), 0.0);
    }

    #[test]
    fn test_eta_complete_is_zero() {
        let sample = RecoverySample::new(Duration::from_secs(30), 400, 400);
        assert_eq!(sample.eta().unwrap(), Duration::ZERO);
        let sample = RecoverySample::new(Duration::from_secs(30), 400, 500);
        assert_eq!(sample.eta().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_eta_empty_recovery_is_degenerate() {
        let sample = RecoverySample::new(Duration::from_secs(30), 0, 0);
        assert!(matches!(
            sample.eta(),
            Err(OpsError::DegenerateComputation { .. })
        ));
    }

    #[test]
    fn test_parse_elapsed_units() {
        assert_eq!(parse_elapsed("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_elapsed("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_elapsed("350ms").unwrap(), Duration::from_millis(350));
        assert_eq!(parse_elapsed("12s").unwrap(), Duration::from_secs(12));
        assert_eq!(parse_elapsed("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_elapsed("500micros").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_elapsed(" 7nanos ").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parse_elapsed_rejects_garbage() {
        for bad in ["", "12", "h", "1.2.3s", "5 weeks", "10y", "-1s"] {
            assert!(
                matches!(parse_elapsed(bad), Err(OpsError::DegenerateComputation { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_monitor_reports_known_and_unknown() {
        let mut fake = FakeCluster::new();
        fake.recoveries = vec![
            record("2h", 400, 100),
            record("0s", 400, 0),
            record("soon", 400, 10),
        ];
        let monitor = RecoveryMonitor::new(Arc::new(fake));
        let progress = monitor.active().await.unwrap();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].eta, Eta::Known(Duration::from_secs(21600)));
        assert!(progress[1].eta.known().is_none());
        assert!(matches!(progress[2].eta, Eta::Unknown { .. }));
    }
}
