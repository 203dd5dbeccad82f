//! Fuzz target: `SystemConfig::from_json` / `SystemConfig::resolve`
//!
//! Feeds arbitrary bytes as a build-time override document and checks
//! that the loader never panics and never hands back a configuration that
//! fails its own validation.
//!
//! cargo fuzz run fuzz_config_override

#![no_main]

use envguard::config::SystemConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = SystemConfig::from_json(doc) {
        assert!(config.validate().is_ok(), "from_json accepted an invalid config");
    }

    // Fallback path: always usable.
    let resolved = SystemConfig::resolve(Some(doc));
    assert!(resolved.validate().is_ok());
    assert!(resolved.reconnect_interval_ms > 0);
});
