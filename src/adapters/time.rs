//! ESP32 time adapter.
//!
//! Provides monotonic time queries for the main loop and a blocking delay
//! for host builds.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//!   Delays use `esp_idf_hal::delay::FreeRtos`.
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` and
//!   `std::thread::sleep` for host-side runs.

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic, wraps at `u64::MAX`).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a read of the RTC counter.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic, wraps at `u64::MAX`).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Milliseconds since boot.
    pub fn uptime_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }
}

/// Time between consecutive main-loop steps.
///
/// Each lap takes a single clock reading and keeps it as the start of the
/// next lap, so the laps add up to the wall time that passed.
#[derive(Debug, Clone, Copy)]
pub struct StepTimer {
    last_ms: u64,
}

impl StepTimer {
    pub fn start(now_ms: u64) -> Self {
        Self { last_ms: now_ms }
    }

    /// Milliseconds since the previous lap, clamped to `u32`.
    pub fn lap(&mut self, now_ms: u64) -> u32 {
        let delta = now_ms.saturating_sub(self.last_ms).min(u64::from(u32::MAX)) as u32;
        self.last_ms = self.last_ms.max(now_ms);
        delta
    }
}

/// Blocking `DelayNs` backed by `std::thread::sleep`.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDelay;

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::delay::DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
