use ipspatch::ips::{self, MAX_LOCATION, Patch, PatchReader, PatchStream};
use proptest::prelude::*;

fn patch_strategy() -> impl Strategy<Value = Patch> {
    prop_oneof![
        (0..=MAX_LOCATION, proptest::collection::vec(any::<u8>(), 1..512))
            .prop_map(|(loc, values)| Patch::literal(loc, values).unwrap()),
        (0..=MAX_LOCATION, 1..=u16::MAX, any::<u8>())
            .prop_map(|(loc, len, value)| Patch::rle(loc, len, value).unwrap()),
    ]
}

proptest! {
    #[test]
    fn prop_encode_decode_roundtrip(
        patches in proptest::collection::vec(patch_strategy(), 0..32)
    ) {
        let bytes = ips::encode_to_vec(&patches).unwrap();
        let decoded = ips::decode_memory(&bytes).unwrap();
        prop_assert_eq!(&decoded, &patches);
        prop_assert_eq!(ips::encode_to_vec(&decoded).unwrap(), bytes);
    }

    #[test]
    fn prop_encoded_len_matches_wire(
        patches in proptest::collection::vec(patch_strategy(), 0..16)
    ) {
        let bytes = ips::encode_to_vec(&patches).unwrap();
        let body: usize = patches.iter().map(Patch::encoded_len).sum();
        prop_assert_eq!(bytes.len(), 5 + body + 3);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        // Anything that decodes must re-encode to the same bytes, short of a
        // lone byte trailing the EOF marker.
        if let Ok(patches) = ips::decode_memory(&data) {
            let encoded = ips::encode_to_vec(&patches).unwrap();
            prop_assert!(data.starts_with(&encoded));
            prop_assert!(data.len() - encoded.len() <= 1);
        }
    }

    #[test]
    fn prop_stream_agrees_with_reader(
        patches in proptest::collection::vec(patch_strategy(), 0..16),
        cut in any::<prop::sample::Index>(),
        capacity in 1usize..8,
    ) {
        let mut bytes = ips::encode_to_vec(&patches).unwrap();
        // Truncate somewhere to exercise error paths too.
        let keep = cut.index(bytes.len() + 1);
        bytes.truncate(keep);

        let sync: Vec<_> = PatchReader::new(bytes.as_slice()).collect();
        let mut stream = PatchStream::with_capacity(std::io::Cursor::new(bytes), capacity).unwrap();
        let streamed: Vec<Patch> = stream.by_ref().collect();
        let status = stream.finish();

        let sync_ok: Vec<Patch> = sync.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        prop_assert_eq!(&streamed, &sync_ok);
        prop_assert_eq!(status.is_ok(), sync.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn prop_apply_matches_reference(
        size in 1usize..1024,
        ops in proptest::collection::vec((any::<prop::sample::Index>(), 1usize..64, any::<u8>(), any::<bool>()), 0..16)
    ) {
        let mut patches = Vec::new();
        let mut reference = vec![0u8; size];
        for (start, len, value, rle) in ops {
            let loc = start.index(size);
            let len = len.min(size - loc);
            let patch = if rle {
                Patch::rle(loc as u32, len as u16, value).unwrap()
            } else {
                let values: Vec<u8> = (0..len).map(|i| value.wrapping_add(i as u8)).collect();
                Patch::literal(loc as u32, values).unwrap()
            };
            for i in 0..len {
                reference[loc + i] = if rle { value } else { value.wrapping_add(i as u8) };
            }
            patches.push(patch);
        }

        let bytes = ips::encode_to_vec(&patches).unwrap();
        let mut target = vec![0u8; size];
        let stats = ips::apply_all(PatchReader::new(bytes.as_slice()), &mut target, |_, _| {}).unwrap();
        prop_assert_eq!(stats.patches, patches.len() as u64);
        prop_assert_eq!(target, reference);
    }
}
