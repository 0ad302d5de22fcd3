//! 주문 상태 관리.
//!
//! 제공 기능:
//! - 주문 생명주기 추적
//! - 브로커 주문 ID 매핑
//! - 브로커 상태 스냅샷의 멱등 반영 (체결 증분 계산)
//! - 주문 이벤트 이력 및 조회

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use autotrade_core::{BrokerOrderStatus, Fill, Order, OrderStatus, Price, Quantity, Side};

/// 주문 저장소 에러 타입.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order already exists: {0}")]
    OrderAlreadyExists(Uuid),

    #[error("Order is in terminal state: {0}")]
    OrderFinalized(Uuid),
}

/// 변경 사항 추적을 위한 주문 이벤트 타입.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
    /// 주문 생성됨 (큐 대기)
    Created {
        order_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    /// 브로커에 주문 제출됨
    Submitted {
        order_id: Uuid,
        broker_order_id: String,
        timestamp: DateTime<Utc>,
    },
    /// 주문 부분 체결됨
    PartialFill {
        order_id: Uuid,
        filled_quantity: Quantity,
        fill_price: Price,
        timestamp: DateTime<Utc>,
    },
    /// 주문 완전 체결됨
    Filled {
        order_id: Uuid,
        average_price: Price,
        timestamp: DateTime<Utc>,
    },
    /// 주문 취소됨
    Cancelled {
        order_id: Uuid,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// 주문 거부됨
    Rejected {
        order_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// 주문 만료됨
    Expired {
        order_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl OrderEvent {
    /// 이벤트의 주문 ID를 가져온다.
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created { order_id, .. } => *order_id,
            OrderEvent::Submitted { order_id, .. } => *order_id,
            OrderEvent::PartialFill { order_id, .. } => *order_id,
            OrderEvent::Filled { order_id, .. } => *order_id,
            OrderEvent::Cancelled { order_id, .. } => *order_id,
            OrderEvent::Rejected { order_id, .. } => *order_id,
            OrderEvent::Expired { order_id, .. } => *order_id,
        }
    }

    /// 이벤트의 타임스탬프를 가져온다.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created { timestamp, .. } => *timestamp,
            OrderEvent::Submitted { timestamp, .. } => *timestamp,
            OrderEvent::PartialFill { timestamp, .. } => *timestamp,
            OrderEvent::Filled { timestamp, .. } => *timestamp,
            OrderEvent::Cancelled { timestamp, .. } => *timestamp,
            OrderEvent::Rejected { timestamp, .. } => *timestamp,
            OrderEvent::Expired { timestamp, .. } => *timestamp,
        }
    }
}

/// 모든 주문을 추적하는 저장소.
#[derive(Debug)]
pub struct OrderStore {
    /// ID별 모든 주문
    orders: HashMap<Uuid, Order>,
    /// 활성 주문 ID (최종 상태가 아닌 주문)
    active_orders: HashSet<Uuid>,
    /// 심볼별 주문
    orders_by_symbol: HashMap<String, Vec<Uuid>>,
    /// 브로커 주문 ID에서 내부 ID로의 매핑
    broker_id_map: HashMap<String, Uuid>,
    /// 주문 이벤트 이력
    events: Vec<OrderEvent>,
    /// 최대 이력 크기
    max_history_size: usize,
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderStore {
    /// 새로운 주문 저장소를 생성한다.
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            active_orders: HashSet::new(),
            orders_by_symbol: HashMap::new(),
            broker_id_map: HashMap::new(),
            events: Vec::new(),
            max_history_size: 10000,
        }
    }

    /// 사용자 정의 이력 크기로 생성한다.
    pub fn with_history_size(max_history_size: usize) -> Self {
        Self {
            max_history_size,
            ..Self::new()
        }
    }

    // ==================== 주문 등록 ====================

    /// 주문을 추적에 추가한다.
    pub fn add_order(&mut self, order: Order) -> Result<(), OrderStoreError> {
        if self.orders.contains_key(&order.id) {
            return Err(OrderStoreError::OrderAlreadyExists(order.id));
        }

        let order_id = order.id;
        let symbol = order.symbol.clone();

        if order.status.is_active() {
            self.active_orders.insert(order_id);
        }
        self.orders.insert(order_id, order);
        self.orders_by_symbol
            .entry(symbol)
            .or_default()
            .push(order_id);

        self.record_event(OrderEvent::Created {
            order_id,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    // ==================== 상태 전이 ====================

    /// 브로커 제출 성공을 기록한다.
    pub fn mark_submitted(
        &mut self,
        order_id: Uuid,
        broker_order_id: &str,
    ) -> Result<(), OrderStoreError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Err(OrderStoreError::OrderFinalized(order_id));
        }

        let now = Utc::now();
        order.status = OrderStatus::Submitted;
        order.broker_order_id = Some(broker_order_id.to_string());
        order.updated_at = now;

        self.broker_id_map
            .insert(broker_order_id.to_string(), order_id);
        self.record_event(OrderEvent::Submitted {
            order_id,
            broker_order_id: broker_order_id.to_string(),
            timestamp: now,
        });

        Ok(())
    }

    /// 브로커 상태 스냅샷을 멱등하게 반영한다.
    ///
    /// 이전에 반영된 체결 수량과의 차이만 증분 체결로 변환하므로 동일한
    /// 스냅샷을 여러 번 반영해도 중복 체결이 생기지 않는다. 새 증분이
    /// 있으면 포지션 원장에 넘길 `Fill` 하나를 반환한다.
    pub fn apply_broker_status(
        &mut self,
        order_id: Uuid,
        status: &BrokerOrderStatus,
    ) -> Result<Option<Fill>, OrderStoreError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Err(OrderStoreError::OrderFinalized(order_id));
        }

        let now = Utc::now();
        let delta = status.filled_quantity - order.filled_quantity;

        let fill = if delta > 0 {
            // 가격 없는 체결 증분은 원가를 오염시키므로 반영을 미루고
            // 다음 폴링에서 다시 시도한다.
            let Some(fill_price) = status.last_fill_price.or(status.average_price) else {
                warn!(%order_id, delta, "Fill delta without price in broker snapshot, deferring");
                return Ok(None);
            };

            Some(Fill {
                order_id,
                broker_order_id: order.broker_order_id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: delta,
                price: fill_price,
                commission: status.commission - order.commission,
                timestamp: status.updated_at,
            })
        } else {
            None
        };

        order.status = status.status;
        order.filled_quantity = status.filled_quantity;
        order.filled_price = status.average_price;
        order.commission = status.commission;
        order.updated_at = now;
        if status.status == OrderStatus::Filled && order.filled_at.is_none() {
            order.filled_at = Some(status.updated_at);
        }

        let symbol_avg = status.average_price.unwrap_or(Decimal::ZERO);
        let filled_quantity = status.filled_quantity;
        let fill_price = fill.as_ref().map(|f| f.price).unwrap_or(symbol_avg);

        match status.status {
            OrderStatus::PartiallyFilled => {
                if fill.is_some() {
                    self.record_event(OrderEvent::PartialFill {
                        order_id,
                        filled_quantity,
                        fill_price,
                        timestamp: now,
                    });
                }
            }
            OrderStatus::Filled => {
                self.record_event(OrderEvent::Filled {
                    order_id,
                    average_price: symbol_avg,
                    timestamp: now,
                });
            }
            OrderStatus::Cancelled => {
                self.record_event(OrderEvent::Cancelled {
                    order_id,
                    reason: None,
                    timestamp: now,
                });
            }
            OrderStatus::Rejected => {
                self.record_event(OrderEvent::Rejected {
                    order_id,
                    reason: "Rejected by broker".to_string(),
                    timestamp: now,
                });
            }
            OrderStatus::Expired => {
                self.record_event(OrderEvent::Expired {
                    order_id,
                    timestamp: now,
                });
            }
            OrderStatus::Pending | OrderStatus::Submitted => {}
        }

        if status.status.is_terminal() {
            self.active_orders.remove(&order_id);
        }

        self.trim_history();
        Ok(fill)
    }

    /// 주문을 취소 상태로 전이한다.
    pub fn cancel_order(
        &mut self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), OrderStoreError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Err(OrderStoreError::OrderFinalized(order_id));
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        if let Some(reason) = &reason {
            order.notes = reason.clone();
        }

        self.active_orders.remove(&order_id);
        self.record_event(OrderEvent::Cancelled {
            order_id,
            reason,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// 주문을 거부 상태로 전이한다.
    pub fn reject_order(
        &mut self,
        order_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<(), OrderStoreError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Err(OrderStoreError::OrderFinalized(order_id));
        }

        let reason = reason.into();
        order.status = OrderStatus::Rejected;
        order.notes = reason.clone();
        order.updated_at = Utc::now();

        self.active_orders.remove(&order_id);
        self.record_event(OrderEvent::Rejected {
            order_id,
            reason,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    // ==================== 조회 ====================

    /// ID로 주문을 가져온다.
    pub fn get_order(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// 브로커 주문 ID로 주문을 가져온다.
    pub fn get_order_by_broker_id(&self, broker_order_id: &str) -> Option<&Order> {
        self.broker_id_map
            .get(broker_order_id)
            .and_then(|id| self.orders.get(id))
    }

    /// 모든 활성 주문을 가져온다.
    pub fn get_active_orders(&self) -> Vec<&Order> {
        self.active_orders
            .iter()
            .filter_map(|id| self.orders.get(id))
            .collect()
    }

    /// 브로커에 제출되어 상태 폴링 대상인 주문 ID 목록.
    pub fn polling_targets(&self) -> Vec<(Uuid, String)> {
        self.active_orders
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter_map(|o| o.broker_order_id.clone().map(|bid| (o.id, bid)))
            .collect()
    }

    /// 심볼에 대한 주문을 가져온다 (모든 상태).
    pub fn get_orders_for_symbol(&self, symbol: &str) -> Vec<&Order> {
        self.orders_by_symbol
            .get(symbol)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// 상태별로 주문을 가져온다.
    pub fn get_orders_by_status(&self, status: OrderStatus) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| o.status == status)
            .collect()
    }

    /// 생성 시각 내림차순의 주문 이력. 심볼이 주어지면 해당 심볼만 반환한다.
    pub fn get_order_history(&self, symbol: Option<&str>, limit: Option<usize>) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| symbol.map_or(true, |s| o.symbol == s))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            orders.truncate(limit);
        }
        orders
    }

    /// 총 주문 수를 가져온다.
    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }

    /// 활성 주문 수를 가져온다.
    pub fn active_order_count(&self) -> usize {
        self.active_orders.len()
    }

    /// 주문 이벤트 이력을 가져온다.
    pub fn get_events(&self) -> &[OrderEvent] {
        &self.events
    }

    /// 특정 주문의 이벤트를 가져온다.
    pub fn get_order_events(&self, order_id: Uuid) -> Vec<&OrderEvent> {
        self.events
            .iter()
            .filter(|e| e.order_id() == order_id)
            .collect()
    }

    // ==================== 통계 ====================

    /// 전체 통계를 가져온다.
    pub fn get_stats(&self) -> OrderStats {
        let orders: Vec<&Order> = self.orders.values().collect();

        let total = orders.len();
        let filled = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
            .count();
        let cancelled = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Cancelled)
            .count();
        let rejected = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Rejected)
            .count();
        let active = orders.iter().filter(|o| o.status.is_active()).count();

        let buy_orders = orders.iter().filter(|o| o.side == Side::Buy).count();
        let sell_orders = orders.iter().filter(|o| o.side == Side::Sell).count();

        let total_volume: Quantity = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
            .map(|o| o.filled_quantity)
            .sum();

        let total_notional: Decimal = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
            .filter_map(|o| o.filled_price.map(|p| p * Decimal::from(o.filled_quantity)))
            .sum();

        OrderStats {
            total_orders: total,
            filled_orders: filled,
            cancelled_orders: cancelled,
            rejected_orders: rejected,
            active_orders: active,
            buy_orders,
            sell_orders,
            total_volume,
            total_notional,
            fill_rate: if total > 0 {
                filled as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    // ==================== 내부 ====================

    fn record_event(&mut self, event: OrderEvent) {
        self.events.push(event);
    }

    fn trim_history(&mut self) {
        if self.events.len() > self.max_history_size {
            let excess = self.events.len() - self.max_history_size;
            self.events.drain(0..excess);
        }
    }
}

/// 주문 통계.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: usize,
    pub filled_orders: usize,
    pub cancelled_orders: usize,
    pub rejected_orders: usize,
    pub active_orders: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub total_volume: Quantity,
    pub total_notional: Decimal,
    pub fill_rate: f64,
}
