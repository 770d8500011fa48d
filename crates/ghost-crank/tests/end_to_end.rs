//! End-to-end pipeline tests.
//!
//! Intake -> seal -> nullifier registration -> monitor decrypt -> trigger
//! -> consume-and-execute, against the in-process ledger.

use std::sync::Arc;
use std::time::Duration;

use ghost_core::{FeedId, Order, OrderSide, Pubkey, TriggerCondition, TriggerDecision};
use ghost_crank::{AppConfig, Application};
use ghost_envelope::{open, ExecutorKeypair};
use ghost_ledger::{
    derive_account_address, ConsumeArgs, LedgerError, LedgerInstruction,
};
use ghost_monitor::{MonitorEvent, OrderRef, OrderStatus};

const OWNER: Pubkey = Pubkey::new([0x11; 32]);
const FEED: FeedId = FeedId::new([0xef; 32]);

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.monitor.poll_interval_ms = 20;
    config.monitor.retry_base_delay_ms = 0;
    config.api.enabled = false;
    config.auto_start = false;
    config.ledger.program_id = Pubkey::new([0x42; 32]);
    config.ledger.perp_program_id = Pubkey::new([0x77; 32]);
    config
}

fn sol_long_stop() -> Order {
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
        feed_id: FEED,
        salt: None,
    }
}

fn app_with_key() -> (Application, Arc<ExecutorKeypair>) {
    let keypair = Arc::new(ExecutorKeypair::generate());
    let app = Application::with_keypair(test_config(), Some(keypair.clone())).unwrap();
    (app, keypair)
}

#[tokio::test]
async fn test_full_pipeline_executes_once() {
    let (app, keypair) = app_with_key();
    let prices = app.static_prices().unwrap().clone();
    prices.set_price(FEED, 181_000_000);

    // Intake: commitment is a 64-char hex string
    let receipt = app.intake().submit(sol_long_stop(), true).await.unwrap();
    assert_eq!(receipt.commitment.to_hex().len(), 64);

    // Only the executor recovers the order
    let opened = open(&receipt.envelope, &keypair).unwrap();
    assert_eq!(opened.trigger_price, 180_000_000);
    assert_eq!(opened.commitment().unwrap(), receipt.commitment);
    assert!(open(&receipt.envelope, &ExecutorKeypair::generate()).is_err());

    let order_ref = OrderRef::new(OWNER, receipt.commitment);
    assert!(app.monitor().add_order(order_ref).await);
    assert_eq!(app.ledger().account(&OWNER).unwrap().count(), 1);

    // Above trigger: waits
    assert_eq!(app.monitor().tick().await.waiting, 1);
    assert_eq!(
        app.monitor().order_status(&order_ref).unwrap().status,
        OrderStatus::Active
    );

    // Price drop fires
    prices.set_price(FEED, 179_000_000);
    assert_eq!(opened.evaluate(179_000_000, 0), TriggerDecision::Fire);
    assert_eq!(app.monitor().tick().await.triggered, 1);

    let account = app.ledger().account(&OWNER).unwrap();
    assert_eq!(account.count(), 0);
    assert!(!account.has_hash(&receipt.commitment));
    assert!(account.delegated);

    let placements = app.ledger().placements();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].execution_price, 179_000_000);
    assert_eq!(placements[0].placement.trigger_price, 180_000_000);
    assert_eq!(placements[0].instruction.program_id, Pubkey::new([0x77; 32]));
    assert_eq!(placements[0].instruction.data.len(), 23);

    // Replaying the same revealed order is rejected
    let program_id = app.config().ledger.program_id;
    let (address, _) = derive_account_address(&program_id, &OWNER);
    let replay = LedgerInstruction::ConsumeAndExecute(ConsumeArgs::from_order(
        &opened,
        179_000_000,
        true,
    ))
    .into_instruction(program_id, address, Pubkey::new(*keypair.public_key().as_bytes()));
    let err = app.ledger().apply(&replay).unwrap_err();
    assert!(matches!(err, LedgerError::HashNotFound(_)));
}

#[tokio::test]
async fn test_background_loop_emits_triggered_event() {
    let (app, _) = app_with_key();
    let prices = app.static_prices().unwrap().clone();
    let mut events = app.monitor().subscribe();

    let receipt = app.intake().submit(sol_long_stop(), true).await.unwrap();
    let order_ref = OrderRef::new(OWNER, receipt.commitment);
    assert!(app.monitor().add_order(order_ref).await);

    prices.set_price(FEED, 179_500_000);
    app.monitor().start().unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(event @ MonitorEvent::OrderTriggered { .. }) = events.recv().await {
                break event;
            }
        }
    })
    .await
    .unwrap();

    match event {
        MonitorEvent::OrderTriggered {
            order_ref: fired,
            owner,
            signature,
            ..
        } => {
            assert_eq!(fired, order_ref);
            assert_eq!(owner, OWNER);
            assert_eq!(signature, app.ledger().placements()[0].signature);
        }
        other => panic!("unexpected event {other:?}"),
    }

    app.monitor().shutdown().await;
    assert!(!app.monitor().is_running());
}

#[tokio::test]
async fn test_above_condition_short() {
    let (app, _) = app_with_key();
    let prices = app.static_prices().unwrap().clone();

    let take_profit = Order {
        order_id: 2,
        trigger_price: 200_000_000,
        trigger_condition: TriggerCondition::Above,
        side: OrderSide::Short,
        reduce_only: true,
        ..sol_long_stop()
    };
    let receipt = app.intake().submit(take_profit, true).await.unwrap();
    assert!(
        app.monitor()
            .add_order(OrderRef::new(OWNER, receipt.commitment))
            .await
    );

    prices.set_price(FEED, 199_999_999);
    assert_eq!(app.monitor().tick().await.triggered, 0);

    prices.set_price(FEED, 200_000_000);
    assert_eq!(app.monitor().tick().await.triggered, 1);

    let placement = &app.ledger().placements()[0].placement;
    assert!(placement.reduce_only);
    assert_eq!(placement.encode()[2], 1); // short
    assert_eq!(placement.encode()[22], 1); // above
}

#[tokio::test]
async fn test_run_until_without_key_stays_up() {
    let mut config = test_config();
    config.auto_start = true;
    config.executor.public_key = Some(ExecutorKeypair::generate().public_key());

    let app = Application::new(config).unwrap();
    assert!(app.static_prices().is_some());

    tokio_test::assert_ok!(app.run_until(async {}).await);
}
