#![no_main]

use aptly_config::parse_config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = parse_config(text) {
        // Whatever parses must render and parse back to the same thing.
        if let Ok(rendered) = config.to_toml() {
            let reparsed = parse_config(&rendered).expect("rendered config parses");
            assert_eq!(reparsed, config);
        }
        let masked = config.masked();
        assert_eq!(masked.url(), config.url());
        let _ = config.server_endpoint();
    }
});
