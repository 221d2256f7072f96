#![no_main]

use gpuperf::measurement::MeasurementSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any set that decodes must satisfy the summary invariants
    if let Ok(set) = serde_json::from_slice::<MeasurementSet>(data) {
        assert!(set.count() > 0);
        assert!(set.min() <= set.mean() && set.mean() <= set.max());
        assert!(set.std_dev() >= 0.0);
    }
});
