//! 모의 브로커 구현.
//!
//! 실제 브로커 API 없이 실행 엔진을 구동하기 위한 메모리 내 브로커입니다.
//! 시장가 주문은 제출 즉시 참조 가격으로 체결되고, 지정가/역지정가 주문은
//! `fill`로 체결을 주입할 때까지 제출 상태로 남습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use autotrade_core::config::PaperBrokerConfig;
use autotrade_core::domain::ledger::apply_fill;
use autotrade_core::{
    BrokerOrderStatus, Fill, Order, OrderStatus, OrderType, Position, Price, Quantity, Side,
};

use crate::traits::{AccountInfo, BrokerConnector, BrokerResult};
use crate::BrokerError;

/// 브로커 측 주문 추적 상태.
#[derive(Debug, Clone)]
struct PaperOrderState {
    symbol: String,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    status: OrderStatus,
    filled_quantity: Quantity,
    average_price: Option<Price>,
    last_fill_price: Option<Price>,
    commission: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaperOrderState {
    fn to_broker_status(&self, broker_order_id: &str) -> BrokerOrderStatus {
        BrokerOrderStatus {
            broker_order_id: broker_order_id.to_string(),
            status: self.status,
            filled_quantity: self.filled_quantity,
            average_price: self.average_price,
            last_fill_price: self.last_fill_price,
            commission: self.commission,
            updated_at: self.updated_at,
        }
    }
}

/// 내부 계정 상태.
#[derive(Debug)]
struct PaperState {
    cash: Decimal,
    orders: HashMap<String, PaperOrderState>,
    positions: HashMap<String, Position>,
    marks: HashMap<String, Price>,
    next_order_seq: u64,
    fail_remaining: u32,
    fail_status_remaining: u32,
}

/// 테스트 및 모의투자용 브로커.
pub struct PaperBroker {
    config: PaperBrokerConfig,
    state: Arc<RwLock<PaperState>>,
}

impl PaperBroker {
    /// 새 모의 브로커를 생성합니다.
    pub fn new(config: PaperBrokerConfig) -> Self {
        let state = PaperState {
            cash: config.starting_cash,
            orders: HashMap::new(),
            positions: HashMap::new(),
            marks: HashMap::new(),
            next_order_seq: 1,
            fail_remaining: 0,
            fail_status_remaining: 0,
        };

        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// 기본 설정으로 생성합니다.
    pub fn with_defaults() -> Self {
        Self::new(PaperBrokerConfig::default())
    }

    /// 심볼의 마크 가격을 설정합니다.
    ///
    /// 가격이 없는 시장가 주문의 체결 가격으로 사용됩니다.
    pub async fn set_price(&self, symbol: &str, price: Price) {
        let mut state = self.state.write().await;
        state.marks.insert(symbol.to_string(), price);
    }

    /// 다음 `count`건의 `place_order` 호출을 네트워크 오류로 실패시킵니다.
    pub async fn fail_next(&self, count: u32) {
        let mut state = self.state.write().await;
        state.fail_remaining = count;
    }

    /// 다음 `count`건의 `get_order_status` 호출을 네트워크 오류로 실패시킵니다.
    pub async fn fail_status_next(&self, count: u32) {
        let mut state = self.state.write().await;
        state.fail_status_remaining = count;
    }

    /// 제출된 주문에 체결을 주입합니다.
    ///
    /// 지정가/역지정가 주문의 부분 체결 시나리오를 구성할 때 사용합니다.
    /// 누적 체결 수량이 주문 수량에 도달하면 주문은 체결 완료 상태가 됩니다.
    pub async fn fill(
        &self,
        broker_order_id: &str,
        quantity: Quantity,
        price: Price,
    ) -> BrokerResult<()> {
        if quantity <= 0 {
            return Err(BrokerError::InvalidOrder(
                "fill quantity must be positive".to_string(),
            ));
        }

        let commission = self.config.commission;
        let mut state = self.state.write().await;

        let order = state
            .orders
            .get(broker_order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(broker_order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(BrokerError::InvalidOrder(format!(
                "order {} is already {}",
                broker_order_id, order.status
            )));
        }
        if order.filled_quantity + quantity > order.quantity {
            return Err(BrokerError::InvalidOrder(format!(
                "fill exceeds order quantity: {} + {} > {}",
                order.filled_quantity, quantity, order.quantity
            )));
        }

        Self::settle_fill(&mut state, broker_order_id, quantity, price, commission);
        Ok(())
    }

    /// 체결을 계정에 반영합니다. 호출자가 수량 한도를 검증해야 합니다.
    fn settle_fill(
        state: &mut PaperState,
        broker_order_id: &str,
        quantity: Quantity,
        price: Price,
        commission: Decimal,
    ) {
        let now = Utc::now();
        let order = state
            .orders
            .get_mut(broker_order_id)
            .expect("order must exist before settle");

        let prev_filled = order.filled_quantity;
        order.filled_quantity += quantity;
        order.last_fill_price = Some(price);
        order.average_price = Some(match order.average_price {
            Some(avg) => {
                (avg * Decimal::from(prev_filled) + price * Decimal::from(quantity))
                    / Decimal::from(order.filled_quantity)
            }
            None => price,
        });
        order.commission += commission;
        order.status = if order.filled_quantity >= order.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        order.updated_at = now;

        let side = order.side;
        let symbol = order.symbol.clone();

        // 현금 정산: 매수는 차감, 매도는 가산. 수수료는 항상 차감.
        let notional = price * Decimal::from(quantity);
        match side {
            Side::Buy => state.cash -= notional,
            Side::Sell => state.cash += notional,
        }
        state.cash -= commission;

        let position = state
            .positions
            .entry(symbol.clone())
            .or_insert_with(|| Position::flat(&symbol));
        let fill = Fill {
            order_id: Uuid::nil(),
            broker_order_id: Some(broker_order_id.to_string()),
            symbol,
            side,
            quantity,
            price,
            commission,
            timestamp: now,
        };
        *position = apply_fill(position, &fill).position;
    }

    /// 시장가 주문의 체결 가격을 결정합니다.
    fn resolve_market_price(
        &self,
        state: &PaperState,
        symbol: &str,
        order_price: Option<Price>,
    ) -> BrokerResult<Price> {
        order_price
            .or_else(|| state.marks.get(symbol).copied())
            .or(self.config.default_fill_price)
            .ok_or_else(|| {
                BrokerError::InvalidOrder(format!("no reference price for symbol {}", symbol))
            })
    }
}

#[async_trait]
impl BrokerConnector for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_account_info(&self) -> BrokerResult<AccountInfo> {
        let state = self.state.read().await;

        let mut margin_used = Decimal::ZERO;
        let mut unrealized = Decimal::ZERO;
        for position in state.positions.values() {
            margin_used += position.average_price * Decimal::from(position.quantity.abs());
            unrealized += position.unrealized_pnl;
        }

        let available = state.cash - margin_used;
        Ok(AccountInfo {
            balance: state.cash,
            equity: state.cash + unrealized,
            margin_used,
            margin_available: available.max(Decimal::ZERO),
        })
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        let state = self.state.read().await;
        Ok(state
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .cloned()
            .collect())
    }

    async fn place_order(&self, order: &Order) -> BrokerResult<String> {
        let mut state = self.state.write().await;

        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(BrokerError::NetworkError(
                "injected connection failure".to_string(),
            ));
        }

        if order.quantity <= 0 {
            return Err(BrokerError::InvalidOrder(
                "quantity must be positive".to_string(),
            ));
        }
        if order.order_type.requires_price() && order.price.is_none() {
            return Err(BrokerError::InvalidOrder(format!(
                "{:?} order requires a price",
                order.order_type
            )));
        }

        // 체결 가격은 주문을 등록하기 전에 확정한다.
        let market_price = if order.order_type == OrderType::Market {
            Some(self.resolve_market_price(&state, &order.symbol, order.price)?)
        } else {
            None
        };

        let broker_order_id = format!("SIM-{:06}", state.next_order_seq);
        state.next_order_seq += 1;

        let now = Utc::now();
        state.orders.insert(
            broker_order_id.clone(),
            PaperOrderState {
                symbol: order.symbol.clone(),
                side: order.side,
                order_type: order.order_type,
                quantity: order.quantity,
                status: OrderStatus::Submitted,
                filled_quantity: 0,
                average_price: None,
                last_fill_price: None,
                commission: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            },
        );

        // 시장가는 즉시 전량 체결. 지정가/역지정가는 주입을 기다린다.
        if let Some(price) = market_price {
            Self::settle_fill(
                &mut state,
                &broker_order_id,
                order.quantity,
                price,
                self.config.commission,
            );
        }

        Ok(broker_order_id)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> BrokerResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(broker_order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(broker_order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(BrokerError::CancelFailed(format!(
                "order {} is already {}",
                broker_order_id, order.status
            )));
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn get_order_status(&self, broker_order_id: &str) -> BrokerResult<BrokerOrderStatus> {
        let mut state = self.state.write().await;

        if state.fail_status_remaining > 0 {
            state.fail_status_remaining -= 1;
            return Err(BrokerError::NetworkError(
                "injected connection failure".to_string(),
            ));
        }

        state
            .orders
            .get(broker_order_id)
            .map(|o| o.to_broker_status(broker_order_id))
            .ok_or_else(|| BrokerError::OrderNotFound(broker_order_id.to_string()))
    }

    async fn get_order_history(
        &self,
        symbol: Option<&str>,
        limit: Option<u32>,
    ) -> BrokerResult<Vec<BrokerOrderStatus>> {
        let state = self.state.read().await;

        let mut entries: Vec<_> = state
            .orders
            .iter()
            .filter(|(_, o)| symbol.map_or(true, |s| o.symbol == s))
            .collect();
        entries.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));

        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(id, o)| o.to_broker_status(id))
            .collect())
    }
}
