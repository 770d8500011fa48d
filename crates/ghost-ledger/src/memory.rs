//! In-process ledger.
//!
//! Applies encoded instructions to nullifier accounts under one lock, so an
//! instruction either lands completely (hash removed and placement recorded)
//! or not at all. Used by the simulation binary and throughout the tests.
//!
//! A successful `ConsumeAndExecute` emits the trigger-market placement as a
//! wire-encoded instruction for the perp program; the recorded
//! [`Placement`] is what that program would decode from it.

use std::collections::HashMap;

use ghost_core::{BoxFuture, CommitmentHash, Pubkey, TxSignature, TriggerDecision};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::NullifierAccount;
use crate::address::derive_account_address;
use crate::client::LedgerClient;
use crate::error::{LedgerError, LedgerResult};
use crate::instruction::{AccountMeta, ConsumeArgs, Instruction, LedgerInstruction};
use crate::placement::{encode_placement, Placement};

/// A trade emitted by a successful `ConsumeAndExecute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedPlacement {
    pub owner: Pubkey,
    pub commitment: CommitmentHash,
    /// Placement instruction handed to the perp program.
    pub instruction: Instruction,
    /// `instruction.data` decoded.
    pub placement: Placement,
    pub execution_price: u64,
    pub signature: TxSignature,
    pub slot: u64,
}

#[derive(Default)]
struct LedgerState {
    /// Keyed by derived account address.
    accounts: HashMap<Pubkey, NullifierAccount>,
    placements: Vec<ExecutedPlacement>,
    slot: u64,
    fail_next: u32,
    clock: Option<i64>,
}

pub struct MemoryLedger {
    program_id: Pubkey,
    perp_program_id: Pubkey,
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            perp_program_id: Pubkey::default(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Target program for emitted placements.
    #[must_use]
    pub fn with_perp_program(mut self, perp_program_id: Pubkey) -> Self {
        self.perp_program_id = perp_program_id;
        self
    }

    #[must_use]
    pub fn perp_program_id(&self) -> Pubkey {
        self.perp_program_id
    }

    /// Make the next `n` submissions fail without being applied.
    pub fn fail_next_submissions(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Pin the ledger clock (unix seconds) used for expiry checks.
    pub fn set_clock(&self, unix: i64) {
        self.state.lock().clock = Some(unix);
    }

    #[must_use]
    pub fn account(&self, owner: &Pubkey) -> Option<NullifierAccount> {
        let (address, _) = derive_account_address(&self.program_id, owner);
        self.state.lock().accounts.get(&address).cloned()
    }

    #[must_use]
    pub fn placements(&self) -> Vec<ExecutedPlacement> {
        self.state.lock().placements.clone()
    }

    #[must_use]
    pub fn slot(&self) -> u64 {
        self.state.lock().slot
    }

    /// Apply one instruction atomically.
    pub fn apply(&self, ix: &Instruction) -> LedgerResult<TxSignature> {
        let mut state = self.state.lock();

        if state.fail_next > 0 {
            state.fail_next -= 1;
            warn!(remaining = state.fail_next, "Injected submission failure");
            return Err(LedgerError::Submission("injected failure".to_string()));
        }

        if ix.program_id != self.program_id {
            return Err(LedgerError::InvalidInstruction(format!(
                "wrong program {}",
                ix.program_id.short()
            )));
        }
        let decoded = LedgerInstruction::decode(&ix.data)?;
        let address = ix
            .target_account()
            .ok_or_else(|| LedgerError::InvalidInstruction("missing account".to_string()))?;
        let signer = ix.signer().ok_or(LedgerError::Unauthorized)?;

        // A commitment lives in at most one account
        if let LedgerInstruction::CreateEncryptedOrder { commitment } = &decoded {
            let elsewhere = state
                .accounts
                .iter()
                .any(|(other, account)| *other != address && account.has_hash(commitment));
            if elsewhere {
                return Err(LedgerError::DuplicateHash(*commitment));
            }
        }

        let now = state.clock.unwrap_or_else(ghost_core::unix_now);
        let slot = state.slot + 1;
        let signature = confirmation_signature(slot, &ix.data);

        // Work on a copy; commit only if every check passes
        let existing = state.accounts.get(&address).cloned();
        let (account, placement) =
            self.transition(existing, &decoded, address, signer, now, slot, signature)?;

        state.accounts.insert(address, account);
        if let Some(placement) = placement {
            state.placements.push(placement);
        }
        state.slot = slot;

        debug!(
            instruction = decoded.name(),
            slot,
            signature = %signature.short(),
            "Instruction applied"
        );
        Ok(signature)
    }

    #[allow(clippy::too_many_arguments)]
    fn transition(
        &self,
        existing: Option<NullifierAccount>,
        ix: &LedgerInstruction,
        address: Pubkey,
        signer: Pubkey,
        now: i64,
        slot: u64,
        signature: TxSignature,
    ) -> LedgerResult<(NullifierAccount, Option<ExecutedPlacement>)> {
        // Owner-side instructions must be signed by the owner whose
        // derived address they target.
        let owner_checked = || -> LedgerResult<()> {
            let (expected, _) = derive_account_address(&self.program_id, &signer);
            if expected != address {
                return Err(LedgerError::Unauthorized);
            }
            Ok(())
        };

        match ix {
            LedgerInstruction::InitExecutor => {
                owner_checked()?;
                if existing.is_some() {
                    return Err(LedgerError::AlreadyInitialized(signer));
                }
                let (_, bump) = derive_account_address(&self.program_id, &signer);
                info!(owner = %signer.short(), "Nullifier account initialized");
                Ok((NullifierAccount::initialize(signer, bump), None))
            }
            LedgerInstruction::CreateEncryptedOrder { commitment } => {
                owner_checked()?;
                let mut account = existing.unwrap_or_else(|| {
                    let (_, bump) = derive_account_address(&self.program_id, &signer);
                    NullifierAccount::initialize(signer, bump)
                });
                account.add_hash(*commitment)?;
                Ok((account, None))
            }
            LedgerInstruction::DelegateExecutor => {
                owner_checked()?;
                let mut account = existing.ok_or(LedgerError::AccountNotFound(signer))?;
                account.delegate();
                Ok((account, None))
            }
            LedgerInstruction::UndelegateExecutor => {
                owner_checked()?;
                let mut account = existing.ok_or(LedgerError::AccountNotFound(signer))?;
                account.undelegate();
                Ok((account, None))
            }
            LedgerInstruction::CancelEncryptedOrder { commitment } => {
                owner_checked()?;
                let mut account = existing.ok_or(LedgerError::AccountNotFound(signer))?;
                account.cancel_hash(commitment)?;
                Ok((account, None))
            }
            LedgerInstruction::AuthorizeExecutor {
                executor,
                authorize,
            } => {
                owner_checked()?;
                let mut account = existing.ok_or(LedgerError::AccountNotFound(signer))?;
                if *authorize {
                    account.authorize_executor(*executor)?;
                    info!(owner = %signer.short(), executor = %executor.short(), "Executor authorized");
                } else {
                    account.revoke_executor(executor);
                    info!(owner = %signer.short(), executor = %executor.short(), "Executor revoked");
                }
                Ok((account, None))
            }
            LedgerInstruction::ConsumeAndExecute(args) => {
                let mut account = existing.ok_or(LedgerError::AccountNotFound(address))?;
                if !account.may_execute(&signer) {
                    return Err(LedgerError::ExecutorNotAuthorized(signer));
                }
                let (commitment, placement) = consume(&mut account, args, now)?;
                let instruction = encode_placement(
                    &placement,
                    self.perp_program_id,
                    vec![
                        AccountMeta::readonly(account.owner, false),
                        AccountMeta::writable(signer, true),
                    ],
                );
                let placement = Placement::decode(&instruction.data)?;
                let executed = ExecutedPlacement {
                    owner: account.owner,
                    commitment,
                    instruction,
                    placement,
                    execution_price: args.current_price,
                    signature,
                    slot,
                };
                info!(
                    owner = %account.owner.short(),
                    commitment = %executed.commitment.short(),
                    market = executed.placement.market_index,
                    price = args.current_price,
                    "Commitment consumed and placement recorded"
                );
                Ok((account, Some(executed)))
            }
        }
    }
}

fn consume(
    account: &mut NullifierAccount,
    args: &ConsumeArgs,
    now: i64,
) -> LedgerResult<(CommitmentHash, Placement)> {
    let order = args.to_order(account.owner);
    let commitment = order.commitment()?;

    if !account.has_hash(&commitment) {
        return Err(LedgerError::HashNotFound(commitment));
    }
    match order.evaluate(args.current_price, now) {
        TriggerDecision::Expired => return Err(LedgerError::Expired),
        TriggerDecision::Wait => {
            return Err(LedgerError::TriggerNotMet {
                current: args.current_price,
                trigger: args.trigger_price,
            })
        }
        TriggerDecision::Fire => {}
    }

    account.remove_hash(&commitment)?;
    if !args.keep_delegated {
        account.undelegate();
    }
    Ok((commitment, Placement::from_order(&order)))
}

fn confirmation_signature(slot: u64, data: &[u8]) -> TxSignature {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&slot.to_le_bytes());
    hasher.update(data);
    TxSignature::new(*hasher.finalize().as_bytes())
}

impl LedgerClient for MemoryLedger {
    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    fn fetch_account(&self, address: Pubkey) -> BoxFuture<'_, LedgerResult<Option<Vec<u8>>>> {
        let data = self
            .state
            .lock()
            .accounts
            .get(&address)
            .map(NullifierAccount::to_bytes);
        Box::pin(async move { Ok(data) })
    }

    fn submit(&self, instruction: Instruction) -> BoxFuture<'_, LedgerResult<TxSignature>> {
        Box::pin(async move { self.apply(&instruction) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch_nullifier_account;
    use ghost_core::{FeedId, Order, OrderSide, TriggerCondition};

    const PROGRAM: Pubkey = Pubkey::new([0x42; 32]);
    const OWNER: Pubkey = Pubkey::new([1; 32]);
    const EXECUTOR: Pubkey = Pubkey::new([2; 32]);
    const NOW: i64 = 1_700_000_000;

    fn ledger() -> MemoryLedger {
        let ledger = MemoryLedger::new(PROGRAM);
        ledger.set_clock(NOW);
        ledger
    }

    fn address() -> Pubkey {
        derive_account_address(&PROGRAM, &OWNER).0
    }

    fn owner_ix(ix: LedgerInstruction) -> Instruction {
        ix.into_instruction(PROGRAM, address(), OWNER)
    }

    fn order() -> Order {
        Order {
            owner: OWNER,
            order_id: 1,
            market_index: 0,
            trigger_price: 180_000_000,
            trigger_condition: TriggerCondition::Below,
            side: OrderSide::Long,
            base_asset_amount: 1_000_000,
            reduce_only: false,
            expiry: 0,
            feed_id: FeedId::new([0xef; 32]),
            salt: None,
        }
    }

    fn consume_ix(order: &Order, price: u64, keep_delegated: bool) -> Instruction {
        LedgerInstruction::ConsumeAndExecute(ConsumeArgs::from_order(order, price, keep_delegated))
            .into_instruction(PROGRAM, address(), EXECUTOR)
    }

    fn authorize(executor: Pubkey, authorize: bool) -> Instruction {
        owner_ix(LedgerInstruction::AuthorizeExecutor {
            executor,
            authorize,
        })
    }

    fn place_and_delegate(ledger: &MemoryLedger, order: &Order) {
        let commitment = order.commitment().unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::CreateEncryptedOrder { commitment }))
            .unwrap();
        ledger.apply(&authorize(EXECUTOR, true)).unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::DelegateExecutor))
            .unwrap();
    }

    #[test]
    fn test_init_then_reinit_fails() {
        let ledger = ledger();
        ledger.apply(&owner_ix(LedgerInstruction::InitExecutor)).unwrap();
        assert!(matches!(
            ledger.apply(&owner_ix(LedgerInstruction::InitExecutor)),
            Err(LedgerError::AlreadyInitialized(_))
        ));
        assert_eq!(ledger.slot(), 1);
    }

    #[test]
    fn test_create_auto_initializes() {
        let ledger = ledger();
        let commitment = order().commitment().unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::CreateEncryptedOrder { commitment }))
            .unwrap();

        let account = ledger.account(&OWNER).unwrap();
        assert_eq!(account.owner, OWNER);
        assert!(account.has_hash(&commitment));
        assert_eq!(account.bump, 255);
    }

    #[test]
    fn test_wrong_signer_unauthorized() {
        let ledger = ledger();
        let ix = LedgerInstruction::InitExecutor.into_instruction(PROGRAM, address(), EXECUTOR);
        assert!(matches!(ledger.apply(&ix), Err(LedgerError::Unauthorized)));
        assert!(ledger.account(&OWNER).is_none());
    }

    #[test]
    fn test_consume_removes_hash_and_records_placement() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);

        let sig = ledger.apply(&consume_ix(&order, 179_000_000, true)).unwrap();

        let account = ledger.account(&OWNER).unwrap();
        assert!(account.is_empty());
        assert!(account.delegated);

        let placements = ledger.placements();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].signature, sig);
        assert_eq!(placements[0].execution_price, 179_000_000);
        assert_eq!(placements[0].placement, Placement::from_order(&order));
    }

    #[test]
    fn test_consume_emits_wire_placement() {
        let perp = Pubkey::new([0x77; 32]);
        let ledger = ledger().with_perp_program(perp);
        let order = Order {
            side: OrderSide::Short,
            trigger_condition: TriggerCondition::Above,
            trigger_price: 200_000_000,
            ..order()
        };
        place_and_delegate(&ledger, &order);
        ledger.apply(&consume_ix(&order, 200_000_000, true)).unwrap();

        let executed = &ledger.placements()[0];
        assert_eq!(executed.instruction.program_id, perp);
        assert_eq!(executed.instruction.data.len(), crate::PLACEMENT_LEN);
        assert_eq!(executed.instruction.data[0], 23);
        assert_eq!(executed.instruction.data[2], 1);
        assert_eq!(executed.instruction.data[22], 1);
        assert_eq!(
            executed.instruction.signer(),
            Some(EXECUTOR)
        );
        assert_eq!(executed.placement, Placement::from_order(&order));
    }

    #[test]
    fn test_unauthorized_executor_rejected() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);
        ledger.apply(&authorize(EXECUTOR, false)).unwrap();

        assert!(matches!(
            ledger.apply(&consume_ix(&order, 179_000_000, true)),
            Err(LedgerError::ExecutorNotAuthorized(key)) if key == EXECUTOR
        ));
        assert_eq!(ledger.account(&OWNER).unwrap().count(), 1);
        assert!(ledger.placements().is_empty());
    }

    #[test]
    fn test_owner_may_consume_own_commitment() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);
        let ix = LedgerInstruction::ConsumeAndExecute(ConsumeArgs::from_order(
            &order,
            179_000_000,
            true,
        ))
        .into_instruction(PROGRAM, address(), OWNER);
        ledger.apply(&ix).unwrap();
        assert!(ledger.account(&OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_authorize_requires_owner_and_limit() {
        let ledger = ledger();
        ledger.apply(&owner_ix(LedgerInstruction::InitExecutor)).unwrap();

        let forged = LedgerInstruction::AuthorizeExecutor {
            executor: EXECUTOR,
            authorize: true,
        }
        .into_instruction(PROGRAM, address(), EXECUTOR);
        assert!(matches!(ledger.apply(&forged), Err(LedgerError::Unauthorized)));

        for n in 10..14 {
            ledger.apply(&authorize(Pubkey::new([n; 32]), true)).unwrap();
        }
        assert!(matches!(
            ledger.apply(&authorize(EXECUTOR, true)),
            Err(LedgerError::MaxExecutorsReached { .. })
        ));
        assert_eq!(ledger.account(&OWNER).unwrap().executors().len(), 4);
    }

    #[test]
    fn test_commitment_unique_across_accounts() {
        let ledger = ledger();
        let commitment = order().commitment().unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::CreateEncryptedOrder { commitment }))
            .unwrap();

        let other = Pubkey::new([3; 32]);
        let (other_address, _) = derive_account_address(&PROGRAM, &other);
        let squat = LedgerInstruction::CreateEncryptedOrder { commitment }
            .into_instruction(PROGRAM, other_address, other);
        assert!(matches!(
            ledger.apply(&squat),
            Err(LedgerError::DuplicateHash(_))
        ));
        assert!(ledger.account(&other).is_none());
    }

    #[test]
    fn test_second_consume_is_hash_not_found() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);
        ledger.apply(&consume_ix(&order, 179_000_000, true)).unwrap();

        assert!(matches!(
            ledger.apply(&consume_ix(&order, 179_000_000, true)),
            Err(LedgerError::HashNotFound(_))
        ));
        assert_eq!(ledger.placements().len(), 1);
    }

    #[test]
    fn test_consume_without_delegation_is_atomic_failure() {
        let ledger = ledger();
        let order = order();
        let commitment = order.commitment().unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::CreateEncryptedOrder { commitment }))
            .unwrap();
        ledger.apply(&authorize(EXECUTOR, true)).unwrap();

        assert!(matches!(
            ledger.apply(&consume_ix(&order, 179_000_000, true)),
            Err(LedgerError::NotDelegated)
        ));
        assert!(ledger.account(&OWNER).unwrap().has_hash(&commitment));
        assert!(ledger.placements().is_empty());
    }

    #[test]
    fn test_consume_trigger_not_met() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);

        assert!(matches!(
            ledger.apply(&consume_ix(&order, 181_000_000, true)),
            Err(LedgerError::TriggerNotMet { .. })
        ));
        assert_eq!(ledger.account(&OWNER).unwrap().count(), 1);
    }

    #[test]
    fn test_consume_expired() {
        let ledger = ledger();
        let order = Order {
            expiry: NOW - 10,
            ..order()
        };
        place_and_delegate(&ledger, &order);

        assert!(matches!(
            ledger.apply(&consume_ix(&order, 179_000_000, true)),
            Err(LedgerError::Expired)
        ));
    }

    #[test]
    fn test_tampered_reveal_not_found() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);

        let tampered = Order {
            base_asset_amount: 9_000_000,
            ..order
        };
        assert!(matches!(
            ledger.apply(&consume_ix(&tampered, 179_000_000, true)),
            Err(LedgerError::HashNotFound(_))
        ));
    }

    #[test]
    fn test_consume_can_undelegate() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);
        ledger.apply(&consume_ix(&order, 179_000_000, false)).unwrap();
        assert!(!ledger.account(&OWNER).unwrap().delegated);
    }

    #[test]
    fn test_cancel_blocked_while_delegated() {
        let ledger = ledger();
        let order = order();
        let commitment = order.commitment().unwrap();
        place_and_delegate(&ledger, &order);

        assert!(matches!(
            ledger.apply(&owner_ix(LedgerInstruction::CancelEncryptedOrder { commitment })),
            Err(LedgerError::Delegated)
        ));
        ledger
            .apply(&owner_ix(LedgerInstruction::UndelegateExecutor))
            .unwrap();
        ledger
            .apply(&owner_ix(LedgerInstruction::CancelEncryptedOrder { commitment }))
            .unwrap();
        assert!(ledger.account(&OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_injected_failure_not_applied() {
        let ledger = ledger();
        ledger.fail_next_submissions(1);
        let commitment = order().commitment().unwrap();
        let ix = owner_ix(LedgerInstruction::CreateEncryptedOrder { commitment });

        let err = ledger.apply(&ix).unwrap_err();
        assert!(err.is_transient());
        assert!(ledger.account(&OWNER).is_none());

        ledger.apply(&ix).unwrap();
        assert_eq!(ledger.account(&OWNER).unwrap().count(), 1);
    }

    #[test]
    fn test_wrong_program_rejected() {
        let ledger = ledger();
        let ix = LedgerInstruction::InitExecutor.into_instruction(
            Pubkey::new([0; 32]),
            address(),
            OWNER,
        );
        assert!(matches!(
            ledger.apply(&ix),
            Err(LedgerError::InvalidInstruction(_))
        ));
    }

    #[test]
    fn test_signatures_unique_per_slot() {
        let ledger = ledger();
        let a = ledger
            .apply(&owner_ix(LedgerInstruction::InitExecutor))
            .unwrap();
        let b = ledger
            .apply(&owner_ix(LedgerInstruction::DelegateExecutor))
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_client_fetch_parses_account() {
        let ledger = ledger();
        let order = order();
        place_and_delegate(&ledger, &order);

        let account = fetch_nullifier_account(&ledger, &OWNER).await.unwrap().unwrap();
        assert!(account.has_hash(&order.commitment().unwrap()));
        assert!(account.delegated);

        let missing = fetch_nullifier_account(&ledger, &EXECUTOR).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_submit_via_trait() {
        let ledger = ledger();
        let sig = ledger
            .submit(owner_ix(LedgerInstruction::InitExecutor))
            .await
            .unwrap();
        assert_eq!(sig.to_hex().len(), 64);
    }
}
