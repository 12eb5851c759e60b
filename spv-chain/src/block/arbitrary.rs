use crate::work::difficulty::CompactDifficulty;

use super::*;

use chrono::{TimeZone, Utc};
use proptest::{
    arbitrary::{any, Arbitrary},
    prelude::*,
};

impl Arbitrary for Hash {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        any::<[u8; 32]>().prop_map(Hash).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for merkle::Root {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        any::<[u8; 32]>().prop_map(merkle::Root).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Height {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (0u32..u32::MAX).prop_map(Height).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Header {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            any::<u32>(),
            any::<Hash>(),
            any::<merkle::Root>(),
            // time is interpreted as u32 on the wire, but rust timestamps are i64
            (0i64..(u32::MAX as i64)),
            any::<u32>(),
            any::<u32>(),
        )
            .prop_map(
                |(version, previous_block_hash, merkle_root, timestamp, bits, nonce)| {
                    Header::new(
                        version,
                        previous_block_hash,
                        merkle_root,
                        Utc.timestamp_opt(timestamp, 0).unwrap(),
                        CompactDifficulty(bits),
                        nonce,
                    )
                },
            )
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
