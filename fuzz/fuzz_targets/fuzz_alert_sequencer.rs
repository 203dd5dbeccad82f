//! Fuzz target: `AlertSequencer` trigger/advance interleavings
//!
//! Each input byte is one operation: the low two bits pick trigger
//! (Safe / Warning / Danger) or advance, the remaining bits scale the
//! advance step.
//!
//! Invariants checked:
//! - No panics or overflow under any sequence
//! - The buzzer only sounds while a Danger pattern is running
//! - Remaining time never exceeds the running pattern's length
//!
//! cargo fuzz run fuzz_alert_sequencer

#![no_main]

use envguard::classifier::HazardStatus;
use envguard::drivers::alert_patterns::{pattern_for, AlertSequencer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut seq = AlertSequencer::new();

    for &byte in data {
        let out = match byte & 0b11 {
            0 => {
                seq.trigger(HazardStatus::Safe);
                seq.output()
            }
            1 => {
                seq.trigger(HazardStatus::Warning);
                seq.output()
            }
            2 => {
                seq.trigger(HazardStatus::Danger);
                seq.output()
            }
            _ => seq.advance(u32::from(byte >> 2) * 100),
        };

        if out.buzzer {
            assert_eq!(seq.active_status(), Some(HazardStatus::Danger));
        }
        if let Some(active) = seq.active_status() {
            assert!(seq.remaining_ms() <= pattern_for(active).total_ms());
        }
    }

    // Long enough to drain the running pattern and anything queued behind it.
    seq.advance(u32::MAX);
    seq.advance(u32::MAX);
    assert!(seq.is_idle());
});
