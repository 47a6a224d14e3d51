//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary input through `AppConfig::parse()`, covering both TOML
//! decoding and the discovery/transport/logging validation rules.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = sockrelay_config::AppConfig::parse(s) {
        // A config that parsed must survive a render/parse round trip.
        let rendered = toml::to_string(&config).expect("valid config must serialize");
        sockrelay_config::AppConfig::parse(&rendered).expect("rendered config must reparse");
    }
});
