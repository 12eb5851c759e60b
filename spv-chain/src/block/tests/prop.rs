use proptest::{arbitrary::any, prelude::*};

use crate::serialization::{BitcoinDeserialize, BitcoinDeserializeInto, BitcoinSerialize};

use super::super::*;
use super::generate;

proptest! {
    #[test]
    fn block_hash_roundtrip(hash in any::<Hash>()) {
        spv_test::init();

        let bytes = hash.bitcoin_serialize_to_vec()?;
        let other_hash: Hash = bytes.as_slice().bitcoin_deserialize_into()?;

        prop_assert_eq![hash, other_hash];
    }

    #[test]
    fn block_hash_display_fromstr_roundtrip(hash in any::<Hash>()) {
        spv_test::init();

        let display = format!("{}", hash);
        let parsed = display.parse::<Hash>().expect("hash should parse");
        prop_assert_eq!(hash, parsed);
    }

    #[test]
    fn blockheader_roundtrip(header in any::<Header>()) {
        spv_test::init();

        let bytes = header.bitcoin_serialize_to_vec().unwrap();
        prop_assert_eq!(bytes.len(), Header::len());
        let other_header = bytes.as_slice().bitcoin_deserialize_into()?;

        prop_assert_eq![header, other_header];
    }

    #[test]
    fn counted_header_roundtrip(header in any::<Header>(), count in 0usize..10_000) {
        spv_test::init();

        let counted = CountedHeader { header, transaction_count: count };
        let bytes = counted.bitcoin_serialize_to_vec()?;
        let other: CountedHeader = bytes.as_slice().bitcoin_deserialize_into()?;

        prop_assert_eq![counted, other];
    }
}

#[test]
fn deserialized_header_caches_its_hash() {
    spv_test::init();

    let original = generate::orphan_header();
    let bytes = original.bitcoin_serialize_to_vec().unwrap();
    let parsed = Header::bitcoin_deserialize(bytes.as_slice()).unwrap();

    // equal headers, and the parsed copy already knows its hash
    assert_eq!(original, parsed);
    assert_eq!(original.hash(), parsed.hash());
}

#[test]
fn generated_chain_links_parents() {
    spv_test::init();

    let headers = generate::chain(crate::parameters::Network::Testnet, 5);
    for pair in headers.windows(2) {
        assert_eq!(pair[1].previous_block_hash, pair[0].hash());
    }
}

#[test]
fn truncated_header_fails() {
    spv_test::init();

    let bytes = generate::orphan_header().bitcoin_serialize_to_vec().unwrap();
    assert!(Header::bitcoin_deserialize(&bytes[..79]).is_err());
}
