#![no_main]
use libfuzzer_sys::fuzz_target;
use ipspatch::ips::{self, Patch};

fuzz_target!(|data: &[u8]| {
    // Carve the input into patches: 3 bytes offset, 1 control byte, payload.
    let mut patches = Vec::new();
    let mut rest = data;
    while rest.len() >= 5 {
        let loc = u32::from_be_bytes([0, rest[0], rest[1], rest[2]]);
        let ctl = rest[3];
        rest = &rest[4..];
        if ctl & 0x80 != 0 {
            let len = u16::from(ctl & 0x7F).max(1) * 3;
            patches.push(Patch::rle(loc, len, rest[0]).unwrap());
            rest = &rest[1..];
        } else {
            let n = (usize::from(ctl).max(1)).min(rest.len());
            patches.push(Patch::literal(loc, rest[..n].to_vec()).unwrap());
            rest = &rest[n..];
        }
    }

    let encoded = ips::encode_to_vec(&patches).unwrap();
    let decoded = ips::decode_memory(&encoded).unwrap();
    assert_eq!(decoded, patches);
});
