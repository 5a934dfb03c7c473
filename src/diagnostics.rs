//! Connection quality statistics and the periodic stats poller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::consts::PACKET_LOSS_WARN_RATE;
use crate::transport::{ConnectionState, Transport};

/// A point-in-time snapshot of transport statistics.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ConnectionStats {
    pub connection_state: ConnectionState,
    /// Raw ICE state as reported by the transport, e.g. `checking`.
    pub ice_state: Option<String>,
    pub inbound_packets: u64,
    pub inbound_bytes: u64,
    pub inbound_packets_lost: Option<i64>,
    /// Seconds.
    pub jitter: Option<f64>,
    pub outbound_packets: u64,
    pub outbound_bytes: u64,
    /// Outbound packets the remote peer reported missing.
    pub outbound_packets_lost: Option<i64>,
    /// Seconds.
    pub round_trip_time: Option<f64>,
}

impl ConnectionStats {
    pub fn inbound_loss_rate(&self) -> Option<f64> {
        loss_rate(self.inbound_packets, self.inbound_packets_lost)
    }

    pub fn outbound_loss_rate(&self) -> Option<f64> {
        loss_rate(self.outbound_packets, self.outbound_packets_lost)
    }
}

fn loss_rate(delivered: u64, lost: Option<i64>) -> Option<f64> {
    let lost = lost?.max(0) as f64;
    let total = delivered as f64 + lost;
    if total == 0.0 {
        return None;
    }
    Some(lost / total)
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualityIssue {
    IceFailure(String),
    NoInboundAudio,
    /// Fraction of packets lost, `0.0..=1.0`.
    HighPacketLoss(f64),
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssue::IceFailure(state) => write!(f, "ICE connection {state}"),
            QualityIssue::NoInboundAudio => f.write_str("No audio packets received"),
            QualityIssue::HighPacketLoss(rate) => write!(f, "High packet loss: {:.1}%", rate * 100.0),
        }
    }
}

/// Inspects a stats snapshot for conditions worth telling the user about.
pub fn analyze(stats: &ConnectionStats) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    match stats.ice_state.as_deref() {
        Some(state @ ("failed" | "disconnected")) => issues.push(QualityIssue::IceFailure(state.to_string())),
        _ if stats.connection_state.is_failure() => {
            issues.push(QualityIssue::IceFailure(stats.connection_state.to_string()))
        }
        _ => {}
    }

    if stats.inbound_packets == 0 {
        issues.push(QualityIssue::NoInboundAudio);
    }

    let worst = [stats.inbound_loss_rate(), stats.outbound_loss_rate()]
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<f64>, rate| Some(acc.map_or(rate, |a| a.max(rate))));
    if let Some(rate) = worst {
        if rate > PACKET_LOSS_WARN_RATE {
            issues.push(QualityIssue::HighPacketLoss(rate));
        }
    }

    issues
}

pub(crate) fn log_stats(stats: &ConnectionStats) {
    tracing::debug!(
        state = %stats.connection_state,
        ice = stats.ice_state.as_deref().unwrap_or("unknown"),
        inbound_packets = stats.inbound_packets,
        inbound_bytes = stats.inbound_bytes,
        outbound_packets = stats.outbound_packets,
        outbound_bytes = stats.outbound_bytes,
        rtt = ?stats.round_trip_time,
        jitter = ?stats.jitter,
        "connection stats"
    );
}

/// Polls transport statistics on a fixed interval until dropped.
#[derive(Debug)]
pub struct StatsPoller {
    handle: JoinHandle<()>,
}

impl StatsPoller {
    pub fn start(transport: Arc<dyn Transport>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let stats = transport.stats().await;
                log_stats(&stats);
                for issue in analyze(&stats) {
                    tracing::warn!("audio quality: {issue}");
                }
            }
        });
        Self { handle }
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> ConnectionStats {
        ConnectionStats {
            connection_state: ConnectionState::Connected,
            ice_state: Some("connected".to_string()),
            inbound_packets: 500,
            inbound_bytes: 40_000,
            inbound_packets_lost: Some(2),
            outbound_packets: 480,
            outbound_bytes: 38_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_connection_has_no_issues() {
        assert!(analyze(&healthy()).is_empty());
    }

    #[test]
    fn test_detects_silence_and_ice_failure() {
        let stats = ConnectionStats {
            connection_state: ConnectionState::Failed,
            ice_state: Some("failed".to_string()),
            ..Default::default()
        };
        let issues = analyze(&stats);
        assert_eq!(
            issues,
            vec![QualityIssue::IceFailure("failed".to_string()), QualityIssue::NoInboundAudio]
        );
        assert_eq!(issues[0].to_string(), "ICE connection failed");
    }

    #[test]
    fn test_packet_loss_threshold() {
        let mut stats = healthy();
        stats.inbound_packets_lost = Some(100);
        let issues = analyze(&stats);
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            QualityIssue::HighPacketLoss(rate) => assert!((rate - 100.0 / 600.0).abs() < 1e-9),
            other => panic!("unexpected issue {other:?}"),
        }
        assert_eq!(issues[0].to_string(), "High packet loss: 16.7%");

        stats.inbound_packets_lost = Some(50);
        assert!(analyze(&stats).is_empty());
    }

    #[test]
    fn test_loss_rate_without_traffic() {
        assert_eq!(ConnectionStats::default().inbound_loss_rate(), None);
    }
}
