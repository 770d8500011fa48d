//! Fixed-offset account layout.
//!
//! ```text
//! [0..8)      discriminator
//! [8..40)     owner
//! [40..48)    order_counter   u64 LE
//! [48]        delegated       u8 (0/1)
//! [49]        bump            u8
//! [50..562)   16 x 32-byte hash slots
//! [562]       count           u8
//! [563..691)  4 x 32-byte authorized executor slots
//! [691]       executor_count  u8
//! ```
//!
//! Parsing never trusts a plausible-looking buffer: every field is range
//! checked and the active slots must be unique.

use ghost_core::{CommitmentHash, Pubkey};

use crate::account::{NullifierAccount, MAX_COMMITMENTS, MAX_EXECUTORS};
use crate::error::LayoutError;

/// `sha256("account:ExecutorAuthority")[..8]`.
pub const ACCOUNT_DISCRIMINATOR: [u8; 8] = [0xfe, 0x53, 0x04, 0x74, 0x1b, 0x70, 0xde, 0xcc];

/// Serialized account size in bytes.
pub const ACCOUNT_LEN: usize =
    8 + 32 + 8 + 1 + 1 + 32 * MAX_COMMITMENTS + 1 + 32 * MAX_EXECUTORS + 1;

/// Sequential little-endian reader over a byte slice.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Fail early if the whole record cannot fit.
    pub(crate) fn require(&self, len: usize) -> Result<(), LayoutError> {
        if self.data.len() < len {
            return Err(LayoutError::Truncated {
                expected: len,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], LayoutError> {
        let end = self.offset + N;
        let slice = self.data.get(self.offset..end).ok_or(LayoutError::Truncated {
            expected: end,
            actual: self.data.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, LayoutError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, LayoutError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, LayoutError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64, LayoutError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub(crate) fn bool(&mut self, field: &'static str) -> Result<bool, LayoutError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(LayoutError::OutOfRange {
                field,
                reason: format!("expected 0 or 1, got {other}"),
            }),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.offset
    }
}

impl NullifierAccount {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ACCOUNT_LEN);
        data.extend_from_slice(&ACCOUNT_DISCRIMINATOR);
        data.extend_from_slice(self.owner.as_bytes());
        data.extend_from_slice(&self.order_counter.to_le_bytes());
        data.push(u8::from(self.delegated));
        data.push(self.bump);
        for (i, slot) in self.raw_slots().iter().enumerate() {
            if i < self.count() {
                data.extend_from_slice(slot.as_bytes());
            } else {
                data.extend_from_slice(&[0u8; 32]);
            }
        }
        // count <= 16 always fits
        data.push(self.count() as u8);
        let executors = self.executors().len();
        for (i, slot) in self.raw_executor_slots().iter().enumerate() {
            if i < executors {
                data.extend_from_slice(slot.as_bytes());
            } else {
                data.extend_from_slice(&[0u8; 32]);
            }
        }
        data.push(executors as u8);
        debug_assert_eq!(data.len(), ACCOUNT_LEN);
        data
    }

    /// Parse raw account bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LayoutError> {
        let mut r = ByteReader::new(data);
        r.require(ACCOUNT_LEN)?;

        if r.array::<8>()? != ACCOUNT_DISCRIMINATOR {
            return Err(LayoutError::OutOfRange {
                field: "discriminator",
                reason: "not a nullifier account".to_string(),
            });
        }

        let owner = Pubkey::new(r.array()?);
        let order_counter = r.u64()?;
        let delegated = r.bool("delegated")?;
        let bump = r.u8()?;

        let mut slots = [CommitmentHash::default(); MAX_COMMITMENTS];
        for slot in &mut slots {
            *slot = CommitmentHash::new(r.array()?);
        }

        let count = r.u8()?;
        if usize::from(count) > MAX_COMMITMENTS {
            return Err(LayoutError::OutOfRange {
                field: "count",
                reason: format!("{count} exceeds {MAX_COMMITMENTS}"),
            });
        }
        if u64::from(count) > order_counter {
            return Err(LayoutError::OutOfRange {
                field: "order_counter",
                reason: format!("{order_counter} below active count {count}"),
            });
        }

        let active = &slots[..usize::from(count)];
        for (i, h) in active.iter().enumerate() {
            if active[i + 1..].contains(h) {
                return Err(LayoutError::OutOfRange {
                    field: "hashes",
                    reason: format!("duplicate active hash {}", h.short()),
                });
            }
        }
        if slots[usize::from(count)..]
            .iter()
            .any(|h| *h != CommitmentHash::default())
        {
            return Err(LayoutError::OutOfRange {
                field: "hashes",
                reason: "non-zero unused slot".to_string(),
            });
        }

        let mut executors = [Pubkey::default(); MAX_EXECUTORS];
        for slot in &mut executors {
            *slot = Pubkey::new(r.array()?);
        }
        let executor_count = r.u8()?;
        if usize::from(executor_count) > MAX_EXECUTORS {
            return Err(LayoutError::OutOfRange {
                field: "executor_count",
                reason: format!("{executor_count} exceeds {MAX_EXECUTORS}"),
            });
        }
        let authorized = &executors[..usize::from(executor_count)];
        for (i, e) in authorized.iter().enumerate() {
            if authorized[i + 1..].contains(e) {
                return Err(LayoutError::OutOfRange {
                    field: "executors",
                    reason: format!("duplicate executor {}", e.short()),
                });
            }
        }
        if executors[usize::from(executor_count)..]
            .iter()
            .any(|e| *e != Pubkey::default())
        {
            return Err(LayoutError::OutOfRange {
                field: "executors",
                reason: "non-zero unused slot".to_string(),
            });
        }

        debug_assert_eq!(r.position(), ACCOUNT_LEN);
        Ok(Self::from_parts(
            owner,
            order_counter,
            delegated,
            bump,
            slots,
            count,
            executors,
            executor_count,
        ))
    }
}
