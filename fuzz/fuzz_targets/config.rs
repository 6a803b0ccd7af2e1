//! Fuzz target for config.toml parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use meeting_lists::config::ListsConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = toml::from_str::<ListsConfig>(content) else {
        return;
    };
    // Validation may reject, but must not panic.
    let _ = config.validate();
});
