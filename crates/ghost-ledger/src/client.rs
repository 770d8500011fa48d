//! Ledger client abstraction.

use std::sync::Arc;

use ghost_core::{BoxFuture, Pubkey, TxSignature};

use crate::account::NullifierAccount;
use crate::address::derive_account_address;
use crate::error::LedgerResult;
use crate::instruction::Instruction;

/// Read and write access to the ledger.
///
/// `submit` returns only after the instruction is confirmed; an `Err`
/// means it was not applied.
pub trait LedgerClient: Send + Sync {
    /// Program that owns the nullifier accounts.
    fn program_id(&self) -> Pubkey;

    /// Raw account bytes, `None` if the address holds no account.
    fn fetch_account(&self, address: Pubkey) -> BoxFuture<'_, LedgerResult<Option<Vec<u8>>>>;

    fn submit(&self, instruction: Instruction) -> BoxFuture<'_, LedgerResult<TxSignature>>;
}

pub type DynLedgerClient = Arc<dyn LedgerClient>;

/// Derive, fetch and parse `owner`'s nullifier account.
pub async fn fetch_nullifier_account(
    client: &dyn LedgerClient,
    owner: &Pubkey,
) -> LedgerResult<Option<NullifierAccount>> {
    let (address, _) = derive_account_address(&client.program_id(), owner);
    match client.fetch_account(address).await? {
        Some(data) => Ok(Some(NullifierAccount::from_bytes(&data)?)),
        None => Ok(None),
    }
}
