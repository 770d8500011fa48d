//! Trigger-market placement encoder.
//!
//! Wire layout consumed by the perp program. Offsets are a protocol, not a
//! struct: do not reorder.
//!
//! ```text
//! [0]        instruction discriminator (23)
//! [1]        order type (2 = trigger market)
//! [2]        direction (long=0, short=1)
//! [3..5)     market index      u16 LE
//! [5..13)    base amount       u64 LE
//! [13]       reduce only       u8 (0/1)
//! [14..22)   trigger price     u64 LE
//! [22]       trigger condition (above=1, below=2)
//! ```

use ghost_core::{Order, OrderSide, Pubkey, TriggerCondition};
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};
use crate::instruction::{AccountMeta, Instruction};
use crate::layout::ByteReader;

pub const PLACEMENT_DISCRIMINATOR: u8 = 23;
pub const TRIGGER_MARKET_ORDER_TYPE: u8 = 2;
pub const PLACEMENT_LEN: usize = 23;

/// Perp-side trigger condition code. Distinct from the commitment encoding.
#[must_use]
pub fn placement_condition_code(condition: TriggerCondition) -> u8 {
    match condition {
        TriggerCondition::Above => 1,
        TriggerCondition::Below => 2,
    }
}

fn condition_from_placement_code(code: u8) -> LedgerResult<TriggerCondition> {
    match code {
        1 => Ok(TriggerCondition::Above),
        2 => Ok(TriggerCondition::Below),
        other => Err(LedgerError::InvalidInstruction(format!(
            "placement condition code {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub direction: OrderSide,
    pub market_index: u16,
    pub base_asset_amount: u64,
    pub trigger_price: u64,
    pub trigger_condition: TriggerCondition,
    pub reduce_only: bool,
}

impl Placement {
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            direction: order.side,
            market_index: order.market_index,
            base_asset_amount: order.base_asset_amount,
            trigger_price: order.trigger_price,
            trigger_condition: order.trigger_condition,
            reduce_only: order.reduce_only,
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; PLACEMENT_LEN] {
        let mut data = [0u8; PLACEMENT_LEN];
        data[0] = PLACEMENT_DISCRIMINATOR;
        data[1] = TRIGGER_MARKET_ORDER_TYPE;
        data[2] = self.direction.code();
        data[3..5].copy_from_slice(&self.market_index.to_le_bytes());
        data[5..13].copy_from_slice(&self.base_asset_amount.to_le_bytes());
        data[13] = u8::from(self.reduce_only);
        data[14..22].copy_from_slice(&self.trigger_price.to_le_bytes());
        data[22] = placement_condition_code(self.trigger_condition);
        data
    }

    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        let mut r = ByteReader::new(data);
        r.require(PLACEMENT_LEN)?;

        let disc = r.u8()?;
        let order_type = r.u8()?;
        if disc != PLACEMENT_DISCRIMINATOR || order_type != TRIGGER_MARKET_ORDER_TYPE {
            return Err(LedgerError::InvalidInstruction(format!(
                "not a trigger-market placement (disc {disc}, type {order_type})"
            )));
        }

        let direction = OrderSide::from_code(r.u8()?)?;
        let market_index = r.u16()?;
        let base_asset_amount = r.u64()?;
        let reduce_only = r.bool("reduce_only")?;
        let trigger_price = r.u64()?;
        let trigger_condition = condition_from_placement_code(r.u8()?)?;

        Ok(Self {
            direction,
            market_index,
            base_asset_amount,
            trigger_price,
            trigger_condition,
            reduce_only,
        })
    }
}

/// Build the placement instruction for `program_id` with caller-supplied accounts.
#[must_use]
pub fn encode_placement(
    placement: &Placement,
    program_id: Pubkey,
    accounts: Vec<AccountMeta>,
) -> Instruction {
    Instruction {
        program_id,
        accounts,
        data: placement.encode().to_vec(),
    }
}
