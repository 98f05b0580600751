#![no_main]
use libfuzzer_sys::fuzz_target;
use ipspatch::ips::{self, PatchReader};

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    let Ok(patches) = ips::decode_memory(data) else {
        return;
    };

    // Anything accepted must re-encode to the same bytes, short of a lone
    // byte trailing the EOF marker.
    let encoded = ips::encode_to_vec(&patches).unwrap();
    assert!(data.starts_with(&encoded));
    assert!(data.len() - encoded.len() <= 1);

    // Applying to a small fixed buffer may fail but must not panic.
    let mut target = vec![0u8; 4096];
    let _ = ips::apply_all(PatchReader::new(data), &mut target, |_, _| {});
});
