//! 실행 엔진.
//!
//! 제공 기능:
//! - 제출 큐 관리 (틱당 최대 1건 제출)
//! - 증거금 검사 및 주문 거부
//! - 활성 주문 폴링과 체결 증분의 포지션 반영
//! - 제출 전/후 취소 처리
//! - 워커 루프와 정상 종료
//!
//! 틱 한 번(`run_once`)은 제출 -> 폴링 순서로 진행되므로 제출 즉시
//! 체결되는 시장가 주문은 같은 틱 안에서 체결 완료까지 관측됩니다.

use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use autotrade_broker::{AccountInfo, BrokerConnector};
use autotrade_core::config::ExecutionConfig;
use autotrade_core::{Order, Price, TradingError, TradingResult};

use crate::order_store::OrderStore;
use crate::position_book::PositionBook;

/// 주문 제출과 폴링을 수행하는 실행 엔진.
pub struct ExecutionEngine {
    connector: Arc<dyn BrokerConnector>,
    config: ExecutionConfig,
    pub(crate) store: Arc<RwLock<OrderStore>>,
    pub(crate) book: Arc<RwLock<PositionBook>>,
    queue: Arc<RwLock<VecDeque<Order>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ExecutionEngine {
    /// 새 실행 엔진을 생성한다.
    pub fn new(connector: Arc<dyn BrokerConnector>, config: ExecutionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let max_history = config.max_history_size;

        Self {
            connector,
            config,
            store: Arc::new(RwLock::new(OrderStore::with_history_size(max_history))),
            book: Arc::new(RwLock::new(PositionBook::with_history_size(max_history))),
            queue: Arc::new(RwLock::new(VecDeque::new())),
            shutdown_tx,
        }
    }

    /// 브로커 커넥터 참조.
    pub fn connector(&self) -> &Arc<dyn BrokerConnector> {
        &self.connector
    }

    // ==================== 주문 접수 ====================

    /// 주문을 제출 큐에 넣는다.
    ///
    /// 종료가 시작된 뒤에는 새 주문을 받지 않는다.
    pub async fn enqueue(&self, order: Order) -> TradingResult<()> {
        if *self.shutdown_tx.borrow() {
            return Err(TradingError::QueueClosed);
        }

        debug!(order_id = %order.id, symbol = %order.symbol, "Order enqueued");

        self.store
            .write()
            .await
            .add_order(order.clone())
            .map_err(|e| TradingError::Internal(e.to_string()))?;
        self.queue.write().await.push_back(order);
        Ok(())
    }

    /// 주문을 취소한다.
    ///
    /// 아직 큐에 있으면 제출 전에 제거되어 즉시 취소 상태가 된다.
    /// 이미 브로커에 제출된 주문은 취소 요청만 보내고, 실제 취소 확정은
    /// 이후 틱의 폴링에서 관측된다.
    pub async fn cancel_order(&self, order_id: Uuid) -> TradingResult<()> {
        // 제출 전 취소: 큐에서 제거
        {
            let mut queue = self.queue.write().await;
            if let Some(index) = queue.iter().position(|o| o.id == order_id) {
                queue.remove(index);
                drop(queue);

                self.store
                    .write()
                    .await
                    .cancel_order(order_id, Some("cancelled before submission".to_string()))
                    .map_err(|e| TradingError::Cancellation(e.to_string()))?;

                info!(order_id = %order_id, "Order cancelled before submission");
                return Ok(());
            }
        }

        let broker_order_id = {
            let store = self.store.read().await;
            let order = store
                .get_order(order_id)
                .ok_or_else(|| TradingError::NotFound(format!("order {}", order_id)))?;

            if order.status.is_terminal() {
                return Err(TradingError::Cancellation(format!(
                    "order {} is already {}",
                    order_id, order.status
                )));
            }
            order.broker_order_id.clone().ok_or_else(|| {
                TradingError::Cancellation(format!("order {} has no broker order id", order_id))
            })?
        };

        self.connector
            .cancel_order(&broker_order_id)
            .await
            .map_err(|e| TradingError::Cancellation(e.to_string()))?;

        info!(order_id = %order_id, broker_order_id = %broker_order_id, "Cancel requested");
        Ok(())
    }

    // ==================== 틱 처리 ====================

    /// 틱 한 번을 수행한다: 제출 -> 폴링.
    ///
    /// 워커 루프가 주기적으로 호출하며, 테스트에서는 직접 호출해
    /// 결정적으로 엔진을 진행시킬 수 있다.
    pub async fn run_once(&self) -> TradingResult<()> {
        // 계좌 스냅샷은 틱당 1회만 조회한다.
        let account = match self.connector.get_account_info().await {
            Ok(account) => Some(account),
            Err(e) => {
                warn!(error = %e, "Account inquiry failed, skipping submission this tick");
                None
            }
        };

        if let Some(account) = &account {
            self.submit_next(account).await;
        }
        self.poll_active_orders().await;

        Ok(())
    }

    /// 큐 맨 앞의 주문 하나를 제출한다.
    async fn submit_next(&self, account: &AccountInfo) {
        let order = {
            let mut queue = self.queue.write().await;
            match queue.pop_front() {
                Some(order) => order,
                None => return,
            }
        };

        // 증거금 검사
        let reference_price = match self.reference_price(&order).await {
            Some(price) => price,
            None => {
                warn!(order_id = %order.id, symbol = %order.symbol, "No reference price for margin check");
                self.reject(order.id, "no reference price available").await;
                return;
            }
        };

        let required =
            reference_price * Decimal::from(order.quantity) * self.config.margin_multiplier;
        if required > account.margin_available {
            let err = TradingError::InsufficientMargin {
                required,
                available: account.margin_available,
            };
            info!(
                order_id = %order.id,
                %required,
                available = %account.margin_available,
                "Order rejected: insufficient margin"
            );
            self.reject(order.id, err.to_string()).await;
            return;
        }

        match self.connector.place_order(&order).await {
            Ok(broker_order_id) => {
                info!(order_id = %order.id, broker_order_id = %broker_order_id, "Order submitted");
                if let Err(e) = self
                    .store
                    .write()
                    .await
                    .mark_submitted(order.id, &broker_order_id)
                {
                    // 제출 직전에 취소된 경우. 브로커 측 주문을 정리한다.
                    warn!(order_id = %order.id, error = %e, "Submission raced with cancellation");
                    if let Err(e) = self.connector.cancel_order(&broker_order_id).await {
                        warn!(broker_order_id = %broker_order_id, error = %e, "Orphan cancel failed");
                    }
                }
            }
            Err(e) => {
                // 제출 중 커넥터 실패는 재시도하지 않고 주문을 거부한다.
                // 폴링 실패만 다음 틱에 재시도된다.
                warn!(order_id = %order.id, error = %e, "Submission failed, rejecting order");
                self.reject(order.id, format!("submission failed: {}", e))
                    .await;
            }
        }
    }

    /// 증거금 검사의 기준 가격: 주문 가격, 없으면 포지션의 마크 가격.
    async fn reference_price(&self, order: &Order) -> Option<Price> {
        if let Some(price) = order.price {
            return Some(price);
        }
        self.book
            .read()
            .await
            .get_position(&order.symbol)
            .filter(|p| p.current_price > Decimal::ZERO)
            .map(|p| p.current_price)
    }

    async fn reject(&self, order_id: Uuid, reason: impl Into<String>) {
        if let Err(e) = self.store.write().await.reject_order(order_id, reason) {
            warn!(order_id = %order_id, error = %e, "Failed to record rejection");
        }
    }

    /// 활성 주문의 브로커 상태를 폴링하고 체결 증분을 포지션에 반영한다.
    async fn poll_active_orders(&self) {
        let targets = self.store.read().await.polling_targets();

        for (order_id, broker_order_id) in targets {
            let status = match self.connector.get_order_status(&broker_order_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Status poll failed, will retry next tick");
                    continue;
                }
            };

            let fill = match self.store.write().await.apply_broker_status(order_id, &status) {
                Ok(fill) => fill,
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Failed to apply broker status");
                    continue;
                }
            };

            if let Some(fill) = fill {
                let trade = self.book.write().await.apply_fill(&fill);
                debug!(
                    order_id = %order_id,
                    quantity = fill.quantity,
                    price = %fill.price,
                    pnl = %trade.pnl,
                    "Fill recorded"
                );
            }
        }
    }

    // ==================== 워커 루프 ====================

    /// 워커 루프를 백그라운드 태스크로 시작한다.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await })
    }

    /// 종료 신호를 받을 때까지 틱을 반복한다.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));

        info!(interval_ms = self.config.poll_interval_ms, "Execution engine started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "Tick failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        // 마지막 틱으로 미반영 체결을 수습한 뒤 종료한다.
        if let Err(e) = self.run_once().await {
            warn!(error = %e, "Final tick failed");
        }
        info!("Execution engine stopped");
    }

    /// 정상 종료를 시작한다. 이후의 `enqueue`는 거부된다.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// 종료가 시작되었는지 여부.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// 큐에서 대기 중인 주문 수.
    pub async fn queued_count(&self) -> usize {
        self.queue.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrade_broker::PaperBroker;
    use autotrade_core::config::PaperBrokerConfig;
    use autotrade_core::{OrderRequest, OrderStatus};
    use rust_decimal_macros::dec;

    fn engine_with_cash(cash: Decimal) -> ExecutionEngine {
        let broker = PaperBroker::new(PaperBrokerConfig {
            starting_cash: cash,
            ..Default::default()
        });
        ExecutionEngine::new(Arc::new(broker), ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_market_order_fills_within_one_tick() {
        let engine = engine_with_cash(dec!(1000000));
        let order =
            Order::from_request(OrderRequest::market_buy("7203", 100).with_price(dec!(2500)));
        let order_id = order.id;

        engine.enqueue(order).await.unwrap();
        engine.run_once().await.unwrap();

        let store = engine.store.read().await;
        assert_eq!(store.get_order(order_id).unwrap().status, OrderStatus::Filled);

        let book = engine.book.read().await;
        let position = book.get_position("7203").unwrap();
        assert_eq!(position.quantity, 100);
        assert_eq!(position.average_price, dec!(2500));
        assert_eq!(position.unrealized_pnl, Decimal::ZERO);
        assert_eq!(book.get_trades().len(), 1);
        assert_eq!(book.get_trades()[0].pnl, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_one_submission_per_tick() {
        let engine = engine_with_cash(dec!(10000000));
        for _ in 0..3 {
            let order =
                Order::from_request(OrderRequest::market_buy("7203", 10).with_price(dec!(100)));
            engine.enqueue(order).await.unwrap();
        }

        engine.run_once().await.unwrap();
        assert_eq!(engine.queued_count().await, 2);

        engine.run_once().await.unwrap();
        engine.run_once().await.unwrap();
        assert_eq!(engine.queued_count().await, 0);
        assert_eq!(engine.book.read().await.get_position("7203").unwrap().quantity, 30);
    }

    #[tokio::test]
    async fn test_margin_rejection() {
        // 증거금 1000, 필요 증거금 1000 * 10 * 1.1 = 11000
        let engine = engine_with_cash(dec!(1000));
        let order =
            Order::from_request(OrderRequest::market_buy("7203", 1000).with_price(dec!(10)));
        let order_id = order.id;

        engine.enqueue(order).await.unwrap();
        engine.run_once().await.unwrap();

        let store = engine.store.read().await;
        let order = store.get_order(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(order.notes.contains("Insufficient margin"));

        // 포지션도 거래 기록도 생기지 않는다
        let book = engine.book.read().await;
        assert!(book.get_position("7203").is_none());
        assert!(book.get_trades().is_empty());
    }

    #[tokio::test]
    async fn test_connector_failure_on_submission_rejects() {
        let broker = Arc::new(PaperBroker::with_defaults());
        broker.fail_next(1).await;
        let engine = ExecutionEngine::new(broker.clone(), ExecutionConfig::default());

        let order =
            Order::from_request(OrderRequest::market_buy("7203", 10).with_price(dec!(100)));
        let order_id = order.id;
        engine.enqueue(order).await.unwrap();

        engine.run_once().await.unwrap();

        let store = engine.store.read().await;
        let order = store.get_order(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(order.notes.contains("submission failed"));
        assert_eq!(engine.queued_count().await, 0);
    }

    #[tokio::test]
    async fn test_poll_failure_retries_next_tick() {
        let broker = Arc::new(PaperBroker::with_defaults());
        let engine = ExecutionEngine::new(broker.clone(), ExecutionConfig::default());

        let order = Order::from_request(OrderRequest::limit_buy("7203", 100, dec!(2500)));
        let order_id = order.id;
        engine.enqueue(order).await.unwrap();
        engine.run_once().await.unwrap();

        let broker_order_id = engine
            .store
            .read()
            .await
            .get_order(order_id)
            .unwrap()
            .broker_order_id
            .clone()
            .unwrap();
        broker.fill(&broker_order_id, 100, dec!(2500)).await.unwrap();

        // 폴링이 실패한 틱에서는 주문이 활성 상태로 남는다
        broker.fail_status_next(1).await;
        engine.run_once().await.unwrap();
        {
            let store = engine.store.read().await;
            assert_eq!(store.get_order(order_id).unwrap().status, OrderStatus::Submitted);
            assert_eq!(store.active_order_count(), 1);
        }
        assert!(engine.book.read().await.get_position("7203").is_none());

        // 다음 틱에서 체결이 정상 반영된다
        engine.run_once().await.unwrap();
        assert_eq!(
            engine.store.read().await.get_order(order_id).unwrap().status,
            OrderStatus::Filled
        );
        assert_eq!(
            engine.book.read().await.get_position("7203").unwrap().quantity,
            100
        );
    }

    #[tokio::test]
    async fn test_cancel_from_queue_never_submitted() {
        let engine = engine_with_cash(dec!(1000000));
        let order = Order::from_request(OrderRequest::limit_buy("7203", 100, dec!(2500)));
        let order_id = order.id;

        engine.enqueue(order).await.unwrap();
        engine.cancel_order(order_id).await.unwrap();
        engine.run_once().await.unwrap();

        let store = engine.store.read().await;
        assert_eq!(
            store.get_order(order_id).unwrap().status,
            OrderStatus::Cancelled
        );
        assert!(store
            .get_order_events(order_id)
            .iter()
            .all(|e| !matches!(e, crate::order_store::OrderEvent::Submitted { .. })));
    }

    #[tokio::test]
    async fn test_cancel_submitted_order_confirmed_by_polling() {
        let engine = engine_with_cash(dec!(1000000));
        let order = Order::from_request(OrderRequest::limit_buy("7203", 100, dec!(2500)));
        let order_id = order.id;

        engine.enqueue(order).await.unwrap();
        engine.run_once().await.unwrap();
        assert_eq!(
            engine.store.read().await.get_order(order_id).unwrap().status,
            OrderStatus::Submitted
        );

        engine.cancel_order(order_id).await.unwrap();
        engine.run_once().await.unwrap();
        assert_eq!(
            engine.store.read().await.get_order(order_id).unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_rejected() {
        let engine = engine_with_cash(dec!(1000000));
        engine.shutdown();

        let order = Order::from_request(OrderRequest::market_buy("7203", 10));
        assert!(matches!(
            engine.enqueue(order).await,
            Err(TradingError::QueueClosed)
        ));
    }
}
