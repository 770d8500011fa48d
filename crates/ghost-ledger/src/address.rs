//! Account address derivation.

use ghost_core::Pubkey;

/// Seed prefix for nullifier accounts.
pub const ACCOUNT_SEED: &[u8] = b"executor";

/// Bump stored in every derived account.
pub const DEFAULT_BUMP: u8 = 255;

/// Derive the nullifier account address for `owner` under `program_id`.
///
/// `blake3("executor" || program_id || owner || bump)`. One account per owner.
#[must_use]
pub fn derive_account_address(program_id: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ACCOUNT_SEED);
    hasher.update(program_id.as_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(&[DEFAULT_BUMP]);
    (Pubkey::new(*hasher.finalize().as_bytes()), DEFAULT_BUMP)
}
