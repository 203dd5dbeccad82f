//! Presentation sink adapter.
//!
//! Keeps the latest view of each group for the display page renderer and
//! mirrors every view to the debug log.  Layout, fonts and animation are
//! the renderer's business; this adapter only holds what to show.

use log::debug;

use crate::app::events::PresentationView;
use crate::app::ports::PresentationSink;
use crate::readings::{EnvironmentalReading, GasReading, SoundReading};

#[derive(Debug, Default)]
pub struct DisplayBoard {
    gas: Option<GasReading>,
    environment: Option<EnvironmentalReading>,
    sound: Option<SoundReading>,
    renders: u32,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gas(&self) -> Option<&GasReading> {
        self.gas.as_ref()
    }

    pub fn environment(&self) -> Option<&EnvironmentalReading> {
        self.environment.as_ref()
    }

    pub fn sound(&self) -> Option<&SoundReading> {
        self.sound.as_ref()
    }

    pub fn renders(&self) -> u32 {
        self.renders
    }
}

impl PresentationSink for DisplayBoard {
    fn render(&mut self, view: &PresentationView) {
        self.renders = self.renders.wrapping_add(1);
        match *view {
            PresentationView::Gas(g) => {
                debug!(
                    "display: LPG {:.1} | CO {:.1} | Smoke {:.1} ppm",
                    g.lpg_ppm, g.co_ppm, g.smoke_ppm
                );
                self.gas = Some(g);
            }
            PresentationView::Environment(e) => {
                debug!(
                    "display: {:.1}C {:.1}% {:.1}hPa {:.1}kOhm {:.1}m",
                    e.temperature_c, e.humidity_pct, e.pressure_hpa, e.gas_resistance_kohm, e.altitude_m
                );
                self.environment = Some(e);
            }
            PresentationView::Sound(s) => {
                debug!("display: sound {:.1} dB", s.level_db);
                self.sound = Some(s);
            }
        }
    }
}
