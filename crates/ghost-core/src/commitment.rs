//! Commitment codec.
//!
//! The preimage mirrors the on-ledger struct layout so that any
//! implementation, in any language, produces byte-identical digests:
//!
//! ```text
//! [0..32)    owner              32 raw bytes
//! [32..40)   order_id           u64 LE
//! [40..42)   market_index       u16 LE
//! [42..50)   trigger_price      u64 LE
//! [50]       trigger_condition  u8 (above=0, below=1)
//! [51]       side               u8 (long=0, short=1)
//! [52..60)   base_asset_amount  u64 LE
//! [60]       reduce_only        u8 (0/1)
//! [61..69)   expiry             i64 LE (0 encoded explicitly)
//! [69..101)  feed_id            32 raw bytes
//! ```
//!
//! The salt is not part of the preimage. Digest: BLAKE3-256.

use crate::error::Result;
use crate::order::Order;
use crate::types::CommitmentHash;

/// Length of the commitment preimage in bytes.
pub const COMMITMENT_PREIMAGE_LEN: usize = 101;

/// Build the canonical preimage for an order.
///
/// Fails with `CoreError::Encoding` if a field is out of its declared range.
pub fn commitment_preimage(order: &Order) -> Result<Vec<u8>> {
    order.validate()?;

    let mut data = Vec::with_capacity(COMMITMENT_PREIMAGE_LEN);
    data.extend_from_slice(order.owner.as_bytes());
    data.extend_from_slice(&order.order_id.to_le_bytes());
    data.extend_from_slice(&order.market_index.to_le_bytes());
    data.extend_from_slice(&order.trigger_price.to_le_bytes());
    data.push(order.trigger_condition.commitment_code());
    data.push(order.side.code());
    data.extend_from_slice(&order.base_asset_amount.to_le_bytes());
    data.push(u8::from(order.reduce_only));
    data.extend_from_slice(&order.expiry.to_le_bytes());
    data.extend_from_slice(order.feed_id.as_bytes());

    debug_assert_eq!(data.len(), COMMITMENT_PREIMAGE_LEN);
    Ok(data)
}

/// Compute the commitment hash of an order.
pub fn hash_order(order: &Order) -> Result<CommitmentHash> {
    let preimage = commitment_preimage(order)?;
    Ok(CommitmentHash::new(*blake3::hash(&preimage).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderSide, TriggerCondition, MARKET_INDEX_LIMIT};
    use crate::types::{FeedId, Pubkey, Salt};
    use crate::CoreError;

    fn sample_order() -> Order {
        Order {
            owner: Pubkey::new([3; 32]),
            order_id: 12345,
            market_index: 0,
            trigger_price: 180_000_000,
            trigger_condition: TriggerCondition::Below,
            side: OrderSide::Long,
            base_asset_amount: 1_000_000,
            reduce_only: false,
            expiry: 0,
            feed_id: FeedId::new([0xef; 32]),
            salt: Some(Salt::new([42; 16])),
        }
    }

    #[test]
    fn test_hash_deterministic() {
        let order = sample_order();
        assert_eq!(hash_order(&order).unwrap(), hash_order(&order).unwrap());
        assert_eq!(hash_order(&order).unwrap().to_hex().len(), 64);
    }

    #[test]
    fn test_salt_does_not_affect_hash() {
        let order = sample_order();
        let resalted = Order {
            salt: Some(Salt::new([1; 16])),
            ..order.clone()
        };
        let unsalted = Order {
            salt: None,
            ..order.clone()
        };
        let h = hash_order(&order).unwrap();
        assert_eq!(h, hash_order(&resalted).unwrap());
        assert_eq!(h, hash_order(&unsalted).unwrap());
    }

    #[test]
    fn test_every_hashed_field_changes_hash() {
        let base = sample_order();
        let base_hash = hash_order(&base).unwrap();

        let variants = vec![
            Order { owner: Pubkey::new([4; 32]), ..base.clone() },
            Order { order_id: 12346, ..base.clone() },
            Order { market_index: 1, ..base.clone() },
            Order { trigger_price: 170_000_000, ..base.clone() },
            Order { trigger_condition: TriggerCondition::Above, ..base.clone() },
            Order { side: OrderSide::Short, ..base.clone() },
            Order { base_asset_amount: 1_000_001, ..base.clone() },
            Order { reduce_only: true, ..base.clone() },
            Order { expiry: 1_700_000_000, ..base.clone() },
            Order { feed_id: FeedId::new([0xee; 32]), ..base.clone() },
        ];

        for (i, variant) in variants.iter().enumerate() {
            assert_ne!(
                hash_order(variant).unwrap(),
                base_hash,
                "variant {i} should change the hash"
            );
        }
    }

    #[test]
    fn test_preimage_layout_offsets() {
        let order = Order {
            reduce_only: true,
            expiry: 1_700_000_000,
            ..sample_order()
        };
        let pre = commitment_preimage(&order).unwrap();

        assert_eq!(pre.len(), COMMITMENT_PREIMAGE_LEN);
        assert_eq!(&pre[0..32], &[3u8; 32]);
        assert_eq!(u64::from_le_bytes(pre[32..40].try_into().unwrap()), 12345);
        assert_eq!(u16::from_le_bytes(pre[40..42].try_into().unwrap()), 0);
        assert_eq!(u64::from_le_bytes(pre[42..50].try_into().unwrap()), 180_000_000);
        assert_eq!(pre[50], 1); // below
        assert_eq!(pre[51], 0); // long
        assert_eq!(u64::from_le_bytes(pre[52..60].try_into().unwrap()), 1_000_000);
        assert_eq!(pre[60], 1);
        assert_eq!(i64::from_le_bytes(pre[61..69].try_into().unwrap()), 1_700_000_000);
        assert_eq!(&pre[69..101], &[0xef; 32]);
    }

    #[test]
    fn test_zero_expiry_is_encoded_not_omitted() {
        let pre = commitment_preimage(&sample_order()).unwrap();
        assert_eq!(&pre[61..69], &[0u8; 8]);
    }

    #[test]
    fn test_matches_direct_blake3() {
        let order = sample_order();
        let pre = commitment_preimage(&order).unwrap();
        let expected = *blake3::hash(&pre).as_bytes();
        assert_eq!(hash_order(&order).unwrap().0, expected);
    }

    #[test]
    fn test_known_digest() {
        // Fixed vector for cross-implementation checks
        assert_eq!(
            hash_order(&sample_order()).unwrap().to_hex(),
            "2ae0416a1fc4e03a2df0e2c1d3e325106c5764a58987fe73da106fb1bb869be3"
        );
    }

    #[test]
    fn test_out_of_range_market_rejected() {
        let order = Order {
            market_index: MARKET_INDEX_LIMIT,
            ..sample_order()
        };
        tokio_test::assert_err!(hash_order(&order));
        assert!(matches!(hash_order(&order), Err(CoreError::Encoding(_))));
    }
}
