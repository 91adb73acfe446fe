#![no_main]

use aptly_response::{UPLOADED_FILES_KEY, decode, normalize, pretty_json};
use aptly_types::NullReporter;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let result = normalize(raw, &mut NullReporter);
    let _ = pretty_json(raw);

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => assert_eq!(result.fields(), &map),
        Ok(Value::Array(items)) => {
            assert_eq!(result.len(), 1);
            assert_eq!(result.get(UPLOADED_FILES_KEY), Some(&Value::Array(items)));
        }
        _ => {
            assert!(decode(raw).is_err());
            assert!(result.is_empty());
        }
    }
});
