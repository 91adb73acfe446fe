#![no_main]

use aptly_publish::publish_prefix_segment;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(prefix) = std::str::from_utf8(data) else {
        return;
    };

    let segment = publish_prefix_segment(prefix);
    assert!(!segment.is_empty());
    assert!(!segment.contains('/'));
});
