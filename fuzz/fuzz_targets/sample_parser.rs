#![no_main]

use libfuzzer_sys::fuzz_target;
use gpuperf::orchestrator::parse_samples;

fuzz_target!(|data: &[u8]| {
    // Runner output is untrusted; parsing must reject, never panic
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = parse_samples(input);
    }
});
