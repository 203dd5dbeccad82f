//! Peripheral drivers, hardware initialisation, and the alert sequencer.

pub mod alert_patterns;
pub mod bme680;
pub mod hw_init;
pub mod indicator;
