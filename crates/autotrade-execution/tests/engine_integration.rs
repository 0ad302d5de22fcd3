//! 모의 브로커 위에서 실행 파이프라인 전체를 검증하는 통합 테스트.

use std::sync::Arc;

use autotrade_broker::{BrokerConnector, PaperBroker};
use autotrade_core::config::{ExecutionConfig, PaperBrokerConfig};
use autotrade_core::{OrderStatus, OrderType};
use autotrade_execution::TradingFacade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn paper_broker(starting_cash: Decimal) -> Arc<PaperBroker> {
    Arc::new(PaperBroker::new(PaperBrokerConfig {
        starting_cash,
        ..Default::default()
    }))
}

fn fast_config() -> ExecutionConfig {
    ExecutionConfig {
        poll_interval_ms: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_buy_order_full_lifecycle() {
    let facade = TradingFacade::new(paper_broker(dec!(1000000)), ExecutionConfig::default());

    let order_id = facade
        .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Market)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    // 틱 하나 안에서 체결 완료까지 관측된다
    let order = facade.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled_quantity, 100);
    assert!(order.broker_order_id.is_some());

    let trades = facade.get_trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].pnl, Decimal::ZERO);

    let position = facade.get_position("7203").await.unwrap();
    assert_eq!(position.quantity, 100);
    assert_eq!(position.average_price, dec!(2500));
    assert_eq!(position.unrealized_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn test_direction_reversal_end_to_end() {
    let facade = TradingFacade::new(paper_broker(dec!(1000000)), ExecutionConfig::default());

    // 롱 100 @ 10
    facade
        .place_buy_order("X", 100, Some(dec!(10)), OrderType::Market)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    // 매도 150 @ 12: 100 청산 + 숏 50 신규
    facade
        .place_sell_order("X", 150, Some(dec!(12)), OrderType::Market)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    let position = facade.get_position("X").await.unwrap();
    assert_eq!(position.quantity, -50);
    assert_eq!(position.average_price, dec!(12));
    assert_eq!(position.realized_pnl, dec!(200));

    let summary = facade.get_trading_summary().await;
    assert_eq!(summary.realized_pnl, dec!(200));
}

#[tokio::test]
async fn test_partial_fills_accumulate_idempotently() {
    let broker = paper_broker(dec!(1000000));
    let facade = TradingFacade::new(broker.clone(), ExecutionConfig::default());

    let order_id = facade
        .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Limit)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    let order = facade.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Submitted);
    let broker_order_id = order.broker_order_id.unwrap();

    // 부분 체결 40주 주입 후 같은 상태를 여러 틱에 걸쳐 재폴링
    broker.fill(&broker_order_id, 40, dec!(2490)).await.unwrap();
    facade.engine().run_once().await.unwrap();
    facade.engine().run_once().await.unwrap();
    facade.engine().run_once().await.unwrap();

    let order = facade.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(order.filled_quantity, 40);
    assert_eq!(facade.get_position("7203").await.unwrap().quantity, 40);
    assert_eq!(facade.get_trades().await.len(), 1);

    // 잔량 체결
    broker.fill(&broker_order_id, 60, dec!(2500)).await.unwrap();
    facade.engine().run_once().await.unwrap();

    let order = facade.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled_quantity, 100);

    let position = facade.get_position("7203").await.unwrap();
    assert_eq!(position.quantity, 100);
    // (40*2490 + 60*2500) / 100 = 2496
    assert_eq!(position.average_price, dec!(2496));
    assert_eq!(facade.get_trades().await.len(), 2);
}

#[tokio::test]
async fn test_margin_rejection_leaves_no_position() {
    // 증거금 1000으로 10 x 1000 x 1.1 = 11000 필요 주문을 거부
    let facade = TradingFacade::new(paper_broker(dec!(1000)), ExecutionConfig::default());

    let order_id = facade
        .place_buy_order("7203", 1000, Some(dec!(10)), OrderType::Market)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    let order = facade.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.notes.contains("Insufficient margin"));
    assert!(facade.get_positions().await.is_empty());
    assert!(facade.get_trades().await.is_empty());
}

#[tokio::test]
async fn test_cancel_before_submission_via_facade() {
    let facade = TradingFacade::new(paper_broker(dec!(1000000)), ExecutionConfig::default());

    // 먼저 다른 주문이 큐 앞을 차지하게 한다
    facade
        .place_buy_order("9984", 10, Some(dec!(8000)), OrderType::Market)
        .await
        .unwrap();
    let target = facade
        .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Limit)
        .await
        .unwrap();

    facade.cancel_order(target).await.unwrap();
    facade.engine().run_once().await.unwrap();
    facade.engine().run_once().await.unwrap();

    let order = facade.get_order(target).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.broker_order_id.is_none());

    let events = facade.get_order_events(target).await;
    assert!(events
        .iter()
        .all(|e| !matches!(e, autotrade_execution::OrderEvent::Submitted { .. })));
}

#[tokio::test]
async fn test_worker_loop_and_graceful_shutdown() {
    let facade = TradingFacade::new(paper_broker(dec!(1000000)), fast_config());
    facade.start().await;

    let order_id = facade
        .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Market)
        .await
        .unwrap();

    // 워커가 주문을 처리할 때까지 대기
    let mut filled = false;
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if let Some(order) = facade.get_order(order_id).await {
            if order.status == OrderStatus::Filled {
                filled = true;
                break;
            }
        }
    }
    assert!(filled, "worker did not fill the order in time");

    facade.stop().await;
    assert!(facade
        .place_buy_order("7203", 1, Some(dec!(1)), OrderType::Market)
        .await
        .is_err());
}

#[tokio::test]
async fn test_account_info_reflects_fills() {
    let broker = paper_broker(dec!(1000000));
    let facade = TradingFacade::new(broker.clone(), ExecutionConfig::default());

    facade
        .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Market)
        .await
        .unwrap();
    facade.engine().run_once().await.unwrap();

    let account = facade.get_account_info().await.unwrap();
    assert_eq!(account.balance, dec!(750000));

    let broker_positions = broker.get_positions().await.unwrap();
    assert_eq!(broker_positions.len(), 1);
    assert_eq!(broker_positions[0].quantity, 100);
}
