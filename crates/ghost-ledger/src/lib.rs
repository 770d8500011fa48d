//! Nullifier ledger for ghost orders.
//!
//! Models the on-ledger side of the pipeline: a per-owner account holding up
//! to 16 outstanding commitment hashes, the binary layout it is stored in,
//! the instructions that mutate it, and the trigger-market placement the
//! execute instruction emits.
//!
//! # Key Components
//!
//! - [`NullifierAccount`]: add/remove/cancel state machine and the
//!   authorized executor list
//! - [`LedgerInstruction`]: discriminated instruction codec
//! - [`Placement`]: fixed-offset placement encoder
//! - [`LedgerClient`]: fetch/submit seam used by the monitor
//! - [`MemoryLedger`]: in-process ledger applying instructions atomically

pub mod account;
pub mod address;
pub mod client;
pub mod error;
pub mod instruction;
pub mod layout;
pub mod memory;
pub mod placement;

pub use account::{NullifierAccount, MAX_COMMITMENTS, MAX_EXECUTORS};
pub use address::{derive_account_address, ACCOUNT_SEED, DEFAULT_BUMP};
pub use client::{fetch_nullifier_account, DynLedgerClient, LedgerClient};
pub use error::{LayoutError, LedgerError, LedgerResult};
pub use instruction::{AccountMeta, ConsumeArgs, Instruction, LedgerInstruction};
pub use layout::{ACCOUNT_DISCRIMINATOR, ACCOUNT_LEN};
pub use memory::{ExecutedPlacement, MemoryLedger};
pub use placement::{encode_placement, Placement, PLACEMENT_LEN};
