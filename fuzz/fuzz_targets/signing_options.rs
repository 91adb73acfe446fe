#![no_main]

use aptly_signing::{Passphrase, build};
use aptly_types::{PassphraseSource, SigningConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut parts = text.split('\0').map(str::to_string);

    let config = SigningConfig {
        enabled: flags & 1 != 0,
        passphrase_source: match ((flags >> 1) & 0x3f) % 3 {
            0 => PassphraseSource::None,
            1 => PassphraseSource::Passphrase,
            _ => PassphraseSource::PassphraseFile,
        },
        gpg_key: parts.next().unwrap_or_default(),
        keyring: parts.next().unwrap_or_default(),
        secret_keyring: parts.next().unwrap_or_default(),
        passphrase: parts.next().unwrap_or_default(),
        passphrase_file: parts.next().unwrap_or_default(),
    };

    let password_configured = flags & 0x80 != 0;
    let options = build(&config, password_configured);
    assert_eq!(options.skip, !config.enabled);
    assert_eq!(options.batch, config.enabled && password_configured);
    match &options.passphrase {
        Some(Passphrase::Inline(p)) | Some(Passphrase::File(p)) => assert!(!p.is_empty()),
        None => {}
    }

    let json = serde_json::to_value(&options).expect("serialize");
    let object = json.as_object().expect("object");
    assert!(!(object.contains_key("Passphrase") && object.contains_key("PassphraseFile")));
});
