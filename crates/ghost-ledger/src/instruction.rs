//! Nullifier program instructions.
//!
//! Every instruction starts with an 8-byte discriminator
//! (`sha256("global:<name>")[..8]`). Account order is fixed:
//! `[0]` the nullifier account (writable), `[1]` the signer (the owner for
//! owner-side instructions, the executor payer for `ConsumeAndExecute`).

use ghost_core::{CommitmentHash, FeedId, Order, OrderSide, Pubkey, TriggerCondition};
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};
use crate::layout::ByteReader;

pub const INIT_EXECUTOR: [u8; 8] = [0xc3, 0x44, 0x74, 0xad, 0x37, 0xad, 0x9f, 0x1f];
pub const CREATE_ENCRYPTED_ORDER: [u8; 8] = [0x81, 0x59, 0x60, 0x83, 0x71, 0x88, 0xdb, 0xcd];
pub const DELEGATE_EXECUTOR: [u8; 8] = [0x99, 0x0f, 0x08, 0xdb, 0x23, 0xb6, 0xbc, 0x38];
pub const UNDELEGATE_EXECUTOR: [u8; 8] = [0x1a, 0x33, 0xaf, 0x48, 0x63, 0xe7, 0x1d, 0x73];
pub const CANCEL_ENCRYPTED_ORDER: [u8; 8] = [0xa5, 0x19, 0x60, 0x75, 0x76, 0xd6, 0xda, 0x55];
pub const AUTHORIZE_EXECUTOR: [u8; 8] = [0x0a, 0x2f, 0xf9, 0xf9, 0x50, 0x6a, 0x9b, 0x1a];
pub const CONSUME_AND_EXECUTE: [u8; 8] = [0xd6, 0xbb, 0x16, 0x2a, 0x72, 0x56, 0x6b, 0xe1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    #[must_use]
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    #[must_use]
    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// Encoded instruction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// Signer account, if the instruction carries one at the conventional slot.
    #[must_use]
    pub fn signer(&self) -> Option<Pubkey> {
        self.accounts
            .get(1)
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
    }

    #[must_use]
    pub fn target_account(&self) -> Option<Pubkey> {
        self.accounts.first().map(|meta| meta.pubkey)
    }
}

/// Revealed order fields plus execution parameters.
///
/// The owner is not carried; the program takes it from the nullifier
/// account, so a revealed order can only match its own owner's commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeArgs {
    pub order_id: u64,
    pub market_index: u16,
    pub trigger_price: u64,
    pub trigger_condition: TriggerCondition,
    pub side: OrderSide,
    pub base_asset_amount: u64,
    pub reduce_only: bool,
    pub expiry: i64,
    pub feed_id: FeedId,
    pub current_price: u64,
    pub keep_delegated: bool,
}

impl ConsumeArgs {
    /// Encoded size without the discriminator.
    pub const LEN: usize = 8 + 2 + 8 + 1 + 1 + 8 + 1 + 8 + 32 + 8 + 1;

    #[must_use]
    pub fn from_order(order: &Order, current_price: u64, keep_delegated: bool) -> Self {
        Self {
            order_id: order.order_id,
            market_index: order.market_index,
            trigger_price: order.trigger_price,
            trigger_condition: order.trigger_condition,
            side: order.side,
            base_asset_amount: order.base_asset_amount,
            reduce_only: order.reduce_only,
            expiry: order.expiry,
            feed_id: order.feed_id,
            current_price,
            keep_delegated,
        }
    }

    /// Reassemble the order as the program sees it.
    #[must_use]
    pub fn to_order(&self, owner: Pubkey) -> Order {
        Order {
            owner,
            order_id: self.order_id,
            market_index: self.market_index,
            trigger_price: self.trigger_price,
            trigger_condition: self.trigger_condition,
            side: self.side,
            base_asset_amount: self.base_asset_amount,
            reduce_only: self.reduce_only,
            expiry: self.expiry,
            feed_id: self.feed_id,
            salt: None,
        }
    }

    fn write(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&self.order_id.to_le_bytes());
        data.extend_from_slice(&self.market_index.to_le_bytes());
        data.extend_from_slice(&self.trigger_price.to_le_bytes());
        data.push(self.trigger_condition.commitment_code());
        data.push(self.side.code());
        data.extend_from_slice(&self.base_asset_amount.to_le_bytes());
        data.push(u8::from(self.reduce_only));
        data.extend_from_slice(&self.expiry.to_le_bytes());
        data.extend_from_slice(self.feed_id.as_bytes());
        data.extend_from_slice(&self.current_price.to_le_bytes());
        data.push(u8::from(self.keep_delegated));
    }

    fn read(r: &mut ByteReader<'_>) -> LedgerResult<Self> {
        Ok(Self {
            order_id: r.u64()?,
            market_index: r.u16()?,
            trigger_price: r.u64()?,
            trigger_condition: TriggerCondition::from_commitment_code(r.u8()?)?,
            side: OrderSide::from_code(r.u8()?)?,
            base_asset_amount: r.u64()?,
            reduce_only: r.bool("reduce_only")?,
            expiry: r.i64()?,
            feed_id: FeedId::new(r.array()?),
            current_price: r.u64()?,
            keep_delegated: r.bool("keep_delegated")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerInstruction {
    InitExecutor,
    CreateEncryptedOrder { commitment: CommitmentHash },
    DelegateExecutor,
    UndelegateExecutor,
    CancelEncryptedOrder { commitment: CommitmentHash },
    /// Owner grants (`authorize = true`) or revokes an executor's right to
    /// consume commitments.
    AuthorizeExecutor { executor: Pubkey, authorize: bool },
    ConsumeAndExecute(ConsumeArgs),
}

impl LedgerInstruction {
    #[must_use]
    pub fn discriminator(&self) -> [u8; 8] {
        match self {
            Self::InitExecutor => INIT_EXECUTOR,
            Self::CreateEncryptedOrder { .. } => CREATE_ENCRYPTED_ORDER,
            Self::DelegateExecutor => DELEGATE_EXECUTOR,
            Self::UndelegateExecutor => UNDELEGATE_EXECUTOR,
            Self::CancelEncryptedOrder { .. } => CANCEL_ENCRYPTED_ORDER,
            Self::AuthorizeExecutor { .. } => AUTHORIZE_EXECUTOR,
            Self::ConsumeAndExecute(_) => CONSUME_AND_EXECUTE,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitExecutor => "init_executor",
            Self::CreateEncryptedOrder { .. } => "create_encrypted_order",
            Self::DelegateExecutor => "delegate_executor",
            Self::UndelegateExecutor => "undelegate_executor",
            Self::CancelEncryptedOrder { .. } => "cancel_encrypted_order",
            Self::AuthorizeExecutor { .. } => "authorize_executor",
            Self::ConsumeAndExecute(_) => "consume_and_execute",
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + ConsumeArgs::LEN);
        data.extend_from_slice(&self.discriminator());
        match self {
            Self::CreateEncryptedOrder { commitment } | Self::CancelEncryptedOrder { commitment } => {
                data.extend_from_slice(commitment.as_bytes());
            }
            Self::AuthorizeExecutor {
                executor,
                authorize,
            } => {
                data.extend_from_slice(executor.as_bytes());
                data.push(u8::from(*authorize));
            }
            Self::ConsumeAndExecute(args) => args.write(&mut data),
            Self::InitExecutor | Self::DelegateExecutor | Self::UndelegateExecutor => {}
        }
        data
    }

    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        let mut r = ByteReader::new(data);
        let disc = r.array::<8>()?;

        let ix = match disc {
            INIT_EXECUTOR => Self::InitExecutor,
            CREATE_ENCRYPTED_ORDER => Self::CreateEncryptedOrder {
                commitment: CommitmentHash::new(r.array()?),
            },
            DELEGATE_EXECUTOR => Self::DelegateExecutor,
            UNDELEGATE_EXECUTOR => Self::UndelegateExecutor,
            CANCEL_ENCRYPTED_ORDER => Self::CancelEncryptedOrder {
                commitment: CommitmentHash::new(r.array()?),
            },
            AUTHORIZE_EXECUTOR => Self::AuthorizeExecutor {
                executor: Pubkey::new(r.array()?),
                authorize: r.bool("authorize")?,
            },
            CONSUME_AND_EXECUTE => Self::ConsumeAndExecute(ConsumeArgs::read(&mut r)?),
            other => {
                return Err(LedgerError::InvalidInstruction(format!(
                    "unknown discriminator {other:02x?}"
                )))
            }
        };

        if r.position() != data.len() {
            return Err(LedgerError::InvalidInstruction(format!(
                "{} trailing bytes after {}",
                data.len() - r.position(),
                ix.name()
            )));
        }
        Ok(ix)
    }

    /// Wrap into a submittable instruction targeting `account` signed by `signer`.
    #[must_use]
    pub fn into_instruction(self, program_id: Pubkey, account: Pubkey, signer: Pubkey) -> Instruction {
        Instruction {
            program_id,
            accounts: vec![
                AccountMeta::writable(account, false),
                AccountMeta::writable(signer, true),
            ],
            data: self.encode(),
        }
    }
}
