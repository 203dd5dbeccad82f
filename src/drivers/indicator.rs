//! NeoPixel strip and buzzer drivers.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: the WS2812 strip is clocked out through an RMT TX channel,
//! the buzzer is a plain GPIO output configured by hw_init.
//! On host/test: the frame buffer and buzzer level are tracked in-memory.

#[cfg(target_os = "espidf")]
use log::warn;

use crate::drivers::alert_patterns::{OFF, Rgb};
use crate::drivers::hw_init;
use crate::pins::NUM_PIXELS;

/// Colours cycled on every pixel during the bring-up self-test.
pub const SELF_TEST_COLOURS: [Rgb; 3] = [(255, 0, 0), (0, 255, 0), (0, 0, 255)];
pub const SELF_TEST_STEP_MS: u32 = 500;

/// `(pixel, colour)` steps of the self-test, one per [`SELF_TEST_STEP_MS`].
pub fn self_test_steps() -> impl Iterator<Item = (usize, Rgb)> {
    (0..NUM_PIXELS).flat_map(|i| SELF_TEST_COLOURS.into_iter().map(move |c| (i, c)))
}

// ── WS2812 over RMT ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod ws2812 {
    use core::time::Duration;

    use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};
    use esp_idf_svc::sys::EspError;

    use super::{NUM_PIXELS, Rgb};

    const BITS: usize = 24 * NUM_PIXELS;

    pub struct Ws2812 {
        tx: TxRmtDriver<'static>,
        zero: (Pulse, Pulse),
        one: (Pulse, Pulse),
    }

    impl Ws2812 {
        pub fn new(tx: TxRmtDriver<'static>) -> Result<Self, EspError> {
            let hz = tx.counter_clock()?;
            let zero = (
                Pulse::new_with_duration(hz, PinState::High, &Duration::from_nanos(350))?,
                Pulse::new_with_duration(hz, PinState::Low, &Duration::from_nanos(800))?,
            );
            let one = (
                Pulse::new_with_duration(hz, PinState::High, &Duration::from_nanos(700))?,
                Pulse::new_with_duration(hz, PinState::Low, &Duration::from_nanos(600))?,
            );
            Ok(Self { tx, zero, one })
        }

        /// Clock out one frame, GRB order, MSB first.
        pub fn write(&mut self, frame: &[Rgb; NUM_PIXELS]) -> Result<(), EspError> {
            let mut signal = FixedLengthSignal::<BITS>::new();
            for (p, &(r, g, b)) in frame.iter().enumerate() {
                let grb = (u32::from(g) << 16) | (u32::from(r) << 8) | u32::from(b);
                for bit in 0..24 {
                    let pulses = if grb & (1 << (23 - bit)) != 0 {
                        &self.one
                    } else {
                        &self.zero
                    };
                    signal.set(p * 24 + bit, pulses)?;
                }
            }
            self.tx.start_blocking(&signal)
        }
    }
}

// ── Pixel strip ──────────────────────────────────────────────

pub struct PixelStrip {
    frame: [Rgb; NUM_PIXELS],
    #[cfg(target_os = "espidf")]
    out: ws2812::Ws2812,
}

impl PixelStrip {
    #[cfg(target_os = "espidf")]
    pub fn new(
        tx: esp_idf_hal::rmt::TxRmtDriver<'static>,
    ) -> Result<Self, crate::error::InitError> {
        let out = ws2812::Ws2812::new(tx).map_err(|_| crate::error::InitError::IndicatorFailed)?;
        Ok(Self {
            frame: [OFF; NUM_PIXELS],
            out,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            frame: [OFF; NUM_PIXELS],
        }
    }

    pub fn fill(&mut self, colour: Rgb) {
        self.frame = [colour; NUM_PIXELS];
    }

    /// Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, colour: Rgb) {
        if let Some(px) = self.frame.get_mut(index) {
            *px = colour;
        }
    }

    pub fn clear(&mut self) {
        self.fill(OFF);
    }

    pub fn frame(&self) -> &[Rgb; NUM_PIXELS] {
        &self.frame
    }

    /// Latch the frame buffer onto the strip.
    #[cfg(target_os = "espidf")]
    pub fn show(&mut self) {
        if let Err(e) = self.out.write(&self.frame) {
            warn!("pixels: RMT write failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn show(&mut self) {}
}

#[cfg(not(target_os = "espidf"))]
impl Default for PixelStrip {
    fn default() -> Self {
        Self::new()
    }
}

// ── Buzzer ───────────────────────────────────────────────────

pub struct Buzzer {
    gpio: i32,
    on: bool,
}

impl Buzzer {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, on: false }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(self.gpio, on);
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
