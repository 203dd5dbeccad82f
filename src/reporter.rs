//! Snapshot fan-out to the presentation sink and the telemetry transport.
//!
//! Every metric goes out as its own retained message, payload formatted
//! with two decimals.  Metrics of a group that was not refreshed this tick
//! are skipped.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, warn};

use crate::app::events::PresentationView;
use crate::app::ports::{NetworkPort, PresentationSink, TelemetryTransport};
use crate::connectivity::ConnectivityManager;
use crate::readings::Snapshot;

pub type Topic = String<64>;
pub type Payload = String<48>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    Gas,
    Altitude,
    Lpg,
    Co,
    Smoke,
    Sound,
}

impl Metric {
    pub const ALL: [Self; 9] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Gas,
        Self::Altitude,
        Self::Lpg,
        Self::Co,
        Self::Smoke,
        Self::Sound,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Gas => "gas",
            Self::Altitude => "altitude",
            Self::Lpg => "lpg",
            Self::Co => "co",
            Self::Smoke => "smoke",
            Self::Sound => "sound",
        }
    }

    /// Value in the snapshot, or `None` when its group is stale.
    pub fn value(self, s: &Snapshot) -> Option<f32> {
        let env = &s.environment;
        let gas = &s.gas;
        match self {
            Self::Temperature => s.environment_fresh.then_some(env.temperature_c),
            Self::Humidity => s.environment_fresh.then_some(env.humidity_pct),
            Self::Pressure => s.environment_fresh.then_some(env.pressure_hpa),
            Self::Gas => s.environment_fresh.then_some(env.gas_resistance_kohm),
            Self::Altitude => s.environment_fresh.then_some(env.altitude_m),
            Self::Lpg => s.gas_fresh.then_some(gas.lpg_ppm),
            Self::Co => s.gas_fresh.then_some(gas.co_ppm),
            Self::Smoke => s.gas_fresh.then_some(gas.smoke_ppm),
            Self::Sound => Some(s.sound.level_db),
        }
    }
}

pub fn format_payload(value: f32) -> Payload {
    let mut out = Payload::new();
    // Capacity covers the widest finite f32 at two decimals.
    let _ = write!(out, "{:.2}", value);
    out
}

/// Outcome of publishing one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: u8,
    pub failed: u8,
    /// Metrics left out because their group was stale.
    pub skipped: u8,
}

pub struct Reporter {
    prefix: String<32>,
    pending: Option<Snapshot>,
}

impl Reporter {
    pub fn new(topic_prefix: &str) -> Self {
        let mut prefix = String::new();
        if prefix.push_str(topic_prefix).is_err() {
            warn!("reporter: topic prefix too long, using bare keys");
            prefix.clear();
        }
        Self {
            prefix,
            pending: None,
        }
    }

    /// `prefix/key`, or the bare key when no prefix is set.
    pub fn topic(&self, metric: Metric) -> Topic {
        let mut t = Topic::new();
        let _ = t.push_str(&self.prefix);
        if !self.prefix.is_empty() && !self.prefix.ends_with('/') {
            let _ = t.push('/');
        }
        let _ = t.push_str(metric.key());
        t
    }

    /// Send the per-group views to the display.
    pub fn render(&self, snapshot: &Snapshot, sink: &mut impl PresentationSink) {
        sink.render(&PresentationView::Sound(snapshot.sound));
        if snapshot.environment_fresh {
            sink.render(&PresentationView::Environment(snapshot.environment));
        }
        if snapshot.gas_fresh {
            sink.render(&PresentationView::Gas(snapshot.gas));
        }
    }

    /// Publish now, reconnecting to completion first if the link is down.
    pub fn publish<N, T, D>(
        &mut self,
        snapshot: &Snapshot,
        conn: &mut ConnectivityManager<N, T>,
        delay: &mut D,
    ) -> PublishSummary
    where
        N: NetworkPort,
        T: TelemetryTransport,
        D: DelayNs,
    {
        if !conn.connected() {
            conn.reconnect(delay);
        }
        self.pending = None;
        self.send(snapshot, conn)
    }

    /// Queue `snapshot` (replacing any older one) and send it if the link
    /// is up.  Returns `None` while it stays queued.
    pub fn try_publish<N, T>(
        &mut self,
        snapshot: &Snapshot,
        conn: &mut ConnectivityManager<N, T>,
    ) -> Option<(u64, PublishSummary)>
    where
        N: NetworkPort,
        T: TelemetryTransport,
    {
        self.pending = Some(*snapshot);
        self.flush(conn)
    }

    /// Send the queued snapshot once the link is up.
    pub fn flush<N, T>(&mut self, conn: &mut ConnectivityManager<N, T>) -> Option<(u64, PublishSummary)>
    where
        N: NetworkPort,
        T: TelemetryTransport,
    {
        if !conn.connected() {
            return None;
        }
        let snapshot = self.pending.take()?;
        Some((snapshot.tick, self.send(&snapshot, conn)))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn send<N, T>(&self, snapshot: &Snapshot, conn: &mut ConnectivityManager<N, T>) -> PublishSummary
    where
        N: NetworkPort,
        T: TelemetryTransport,
    {
        let mut summary = PublishSummary::default();
        for metric in Metric::ALL {
            let Some(value) = metric.value(snapshot) else {
                summary.skipped += 1;
                continue;
            };
            let topic = self.topic(metric);
            let payload = format_payload(value);
            match conn.publish(&topic, payload.as_bytes(), true) {
                Ok(()) => {
                    debug!("reporter: {} = {}", topic, payload);
                    summary.published += 1;
                }
                Err(e) => {
                    warn!("reporter: publish {} failed: {}", topic, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
