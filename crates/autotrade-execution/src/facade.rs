//! 거래 퍼사드.
//!
//! 매수/매도 의사를 받아 검증하고 실행 엔진에 전달하는 단일 진입점입니다.
//! 호출자는 브로커나 큐의 존재를 알 필요 없이 이 API만 사용합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use autotrade_broker::{AccountInfo, BrokerConnector};
use autotrade_core::config::ExecutionConfig;
use autotrade_core::{
    Order, OrderRequest, OrderType, Position, PositionSummary, Price, Quantity, Side, Trade,
    TradingError, TradingResult,
};

use crate::engine::ExecutionEngine;
use crate::order_store::{OrderEvent, OrderStats};

/// 손익과 주문 활동의 전체 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSummary {
    /// 실현 손익 합계
    pub realized_pnl: Decimal,
    /// 미실현 손익 합계
    pub unrealized_pnl: Decimal,
    /// 수수료 합계
    pub total_commission: Decimal,
    /// 수수료 차감 후 순손익
    pub net_pnl: Decimal,
    /// 총 거래 수
    pub trade_count: usize,
    /// 포지션 요약
    pub positions: PositionSummary,
    /// 주문 통계
    pub orders: OrderStats,
}

/// 거래 실행 퍼사드.
pub struct TradingFacade {
    engine: Arc<ExecutionEngine>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TradingFacade {
    /// 새 퍼사드를 생성한다.
    pub fn new(connector: Arc<dyn BrokerConnector>, config: ExecutionConfig) -> Self {
        Self {
            engine: Arc::new(ExecutionEngine::new(connector, config)),
            worker: Mutex::new(None),
        }
    }

    /// 내부 엔진 참조. 테스트에서 틱을 직접 진행할 때 사용한다.
    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// 워커 루프를 시작한다.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            *worker = Some(self.engine.spawn());
            info!("Trading facade started");
        }
    }

    /// 정상 종료한다. 워커가 마지막 틱을 마칠 때까지 기다린다.
    pub async fn stop(&self) {
        self.engine.shutdown();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
        info!("Trading facade stopped");
    }

    // ==================== 주문 ====================

    /// 매수 주문을 접수한다.
    pub async fn place_buy_order(
        &self,
        symbol: &str,
        quantity: Quantity,
        price: Option<Price>,
        order_type: OrderType,
    ) -> TradingResult<Uuid> {
        self.place_order(symbol, Side::Buy, quantity, price, order_type)
            .await
    }

    /// 매도 주문을 접수한다.
    pub async fn place_sell_order(
        &self,
        symbol: &str,
        quantity: Quantity,
        price: Option<Price>,
        order_type: OrderType,
    ) -> TradingResult<Uuid> {
        self.place_order(symbol, Side::Sell, quantity, price, order_type)
            .await
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        price: Option<Price>,
        order_type: OrderType,
    ) -> TradingResult<Uuid> {
        let mut request = OrderRequest {
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            stop_price: None,
        };
        // 역지정가 단독 주문은 주어진 가격을 트리거로 해석한다.
        if order_type == OrderType::Stop {
            request.stop_price = request.price.take();
        }

        validate_request(&request)?;

        let order = Order::from_request(request);
        let order_id = order.id;

        info!(
            order_id = %order_id,
            symbol = %symbol,
            %side,
            quantity,
            ?order_type,
            "Order intent accepted"
        );

        self.engine.enqueue(order).await?;
        Ok(order_id)
    }

    /// 주문을 취소한다.
    pub async fn cancel_order(&self, order_id: Uuid) -> TradingResult<()> {
        self.engine.cancel_order(order_id).await
    }

    // ==================== 조회 ====================

    /// ID로 주문을 조회한다.
    pub async fn get_order(&self, order_id: Uuid) -> Option<Order> {
        self.engine.store.read().await.get_order(order_id).cloned()
    }

    /// 활성 주문 목록.
    pub async fn get_active_orders(&self) -> Vec<Order> {
        self.engine
            .store
            .read()
            .await
            .get_active_orders()
            .into_iter()
            .cloned()
            .collect()
    }

    /// 생성 시각 내림차순의 주문 이력. 심볼이 주어지면 해당 심볼만 반환한다.
    pub async fn get_order_history(&self, symbol: Option<&str>, limit: Option<usize>) -> Vec<Order> {
        self.engine
            .store
            .read()
            .await
            .get_order_history(symbol, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 특정 주문의 이벤트 이력.
    pub async fn get_order_events(&self, order_id: Uuid) -> Vec<OrderEvent> {
        self.engine
            .store
            .read()
            .await
            .get_order_events(order_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 열린 포지션 목록.
    pub async fn get_positions(&self) -> Vec<Position> {
        self.engine
            .book
            .read()
            .await
            .get_open_positions()
            .into_iter()
            .cloned()
            .collect()
    }

    /// 심볼의 포지션.
    pub async fn get_position(&self, symbol: &str) -> Option<Position> {
        self.engine.book.read().await.get_position(symbol).cloned()
    }

    /// 거래 이력.
    pub async fn get_trades(&self) -> Vec<Trade> {
        self.engine.book.read().await.get_trades().to_vec()
    }

    /// 브로커 계좌 정보.
    pub async fn get_account_info(&self) -> TradingResult<AccountInfo> {
        self.engine
            .connector()
            .get_account_info()
            .await
            .map_err(|e| TradingError::Connector(e.to_string()))
    }

    /// 손익과 주문 활동 요약.
    pub async fn get_trading_summary(&self) -> TradingSummary {
        let book = self.engine.book.read().await;
        let store = self.engine.store.read().await;

        let realized_pnl = book.total_realized_pnl();
        let unrealized_pnl = book.total_unrealized_pnl();
        let total_commission = book.total_commission();

        TradingSummary {
            realized_pnl,
            unrealized_pnl,
            total_commission,
            net_pnl: realized_pnl + unrealized_pnl - total_commission,
            trade_count: book.get_trades().len(),
            positions: book.summary(),
            orders: store.get_stats(),
        }
    }
}

/// 주문 요청을 검증한다.
fn validate_request(request: &OrderRequest) -> TradingResult<()> {
    if request.symbol.trim().is_empty() {
        return Err(TradingError::Validation("symbol must not be empty".to_string()));
    }
    if request.quantity <= 0 {
        return Err(TradingError::Validation(format!(
            "quantity must be positive, got {}",
            request.quantity
        )));
    }
    if let Some(price) = request.price {
        if price <= Decimal::ZERO {
            return Err(TradingError::Validation(format!(
                "price must be positive, got {}",
                price
            )));
        }
    }
    if let Some(stop_price) = request.stop_price {
        if stop_price <= Decimal::ZERO {
            return Err(TradingError::Validation(format!(
                "stop price must be positive, got {}",
                stop_price
            )));
        }
    }
    if request.order_type.requires_price() && request.price.is_none() {
        return Err(TradingError::Validation(format!(
            "{:?} order requires a price",
            request.order_type
        )));
    }
    if request.order_type.requires_stop_price() && request.stop_price.is_none() {
        return Err(TradingError::Validation(format!(
            "{:?} order requires a stop price",
            request.order_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrade_broker::PaperBroker;
    use autotrade_core::config::PaperBrokerConfig;
    use autotrade_core::OrderStatus;
    use rust_decimal_macros::dec;

    fn facade() -> TradingFacade {
        let broker = PaperBroker::new(PaperBrokerConfig {
            starting_cash: dec!(10000000),
            ..Default::default()
        });
        TradingFacade::new(Arc::new(broker), ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let facade = facade();

        assert!(matches!(
            facade.place_buy_order("", 10, None, OrderType::Market).await,
            Err(TradingError::Validation(_))
        ));
        assert!(matches!(
            facade.place_buy_order("7203", 0, None, OrderType::Market).await,
            Err(TradingError::Validation(_))
        ));
        assert!(matches!(
            facade.place_buy_order("7203", 10, None, OrderType::Limit).await,
            Err(TradingError::Validation(_))
        ));
        assert!(matches!(
            facade
                .place_sell_order("7203", 10, Some(dec!(-5)), OrderType::Limit)
                .await,
            Err(TradingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_buy_then_query() {
        let facade = facade();
        let order_id = facade
            .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Market)
            .await
            .unwrap();

        facade.engine().run_once().await.unwrap();

        let order = facade.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let positions = facade.get_positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, 100);

        let summary = facade.get_trading_summary().await;
        assert_eq!(summary.trade_count, 1);
        assert_eq!(summary.realized_pnl, Decimal::ZERO);
        assert_eq!(summary.orders.filled_orders, 1);
    }

    #[tokio::test]
    async fn test_round_trip_pnl_in_summary() {
        let facade = facade();

        facade
            .place_buy_order("7203", 100, Some(dec!(2500)), OrderType::Market)
            .await
            .unwrap();
        facade.engine().run_once().await.unwrap();

        facade
            .place_sell_order("7203", 100, Some(dec!(2600)), OrderType::Market)
            .await
            .unwrap();
        facade.engine().run_once().await.unwrap();

        let summary = facade.get_trading_summary().await;
        assert_eq!(summary.realized_pnl, dec!(10000));
        assert_eq!(summary.unrealized_pnl, Decimal::ZERO);
        assert!(facade.get_positions().await.is_empty());
    }

    #[tokio::test]
    async fn test_order_history_by_symbol() {
        let facade = facade();

        for _ in 0..2 {
            facade
                .place_buy_order("7203", 10, Some(dec!(2500)), OrderType::Market)
                .await
                .unwrap();
            facade.engine().run_once().await.unwrap();
        }
        facade
            .place_buy_order("9984", 10, Some(dec!(8000)), OrderType::Market)
            .await
            .unwrap();
        facade.engine().run_once().await.unwrap();

        assert_eq!(facade.get_order_history(None, None).await.len(), 3);

        let history = facade.get_order_history(Some("7203"), None).await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|o| o.symbol == "7203"));

        assert_eq!(facade.get_order_history(Some("7203"), Some(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let facade = facade();
        facade.start().await;
        facade.stop().await;

        // 종료 후 새 주문은 거부된다
        assert!(matches!(
            facade
                .place_buy_order("7203", 10, Some(dec!(100)), OrderType::Market)
                .await,
            Err(TradingError::QueueClosed)
        ));
    }
}
