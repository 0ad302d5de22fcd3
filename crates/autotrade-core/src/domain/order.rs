//! 주문 타입 및 상태 정의.
//!
//! 이 모듈은 실행 서브시스템의 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가, 지정가 등)
//! - `OrderStatus` - 주문 상태 머신의 상태
//! - `OrderRequest` - 파사드 입력용 주문 요청
//! - `Order` - 주문 엔티티
//! - `BrokerOrderStatus` - 브로커가 반환하는 상태 보고

use crate::types::{DecimalExt, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 부호 있는 수량 부호를 반환합니다 (매수 = +1, 매도 = -1).
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문 - 현재 시장 가격으로 즉시 체결
    Market,
    /// 지정가 주문 - 지정 가격 이상/이하에서 체결
    Limit,
    /// 스톱 주문 - 스톱 가격 도달 시 시장가로 전환
    Stop,
    /// 스톱 지정가 주문
    StopLimit,
}

impl OrderType {
    /// 지정가가 필수인 주문 유형인지 확인합니다.
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    /// 스톱 가격이 필수인 주문 유형인지 확인합니다.
    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// 주문 상태.
///
/// `Pending`이 유일한 초기 상태이며, `Filled`/`Cancelled`/`Rejected`/`Expired`는
/// 최종 상태입니다. 최종 상태에서 벗어나는 전이는 허용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 주문 생성됨 (아직 브로커에 제출되지 않음)
    Pending,
    /// 브로커에 제출됨 (체결 대기 중)
    Submitted,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 사용자 또는 시스템에 의해 취소됨
    Cancelled,
    /// 브로커 또는 사전 검증에서 거부됨
    Rejected,
    /// 유효 기간 만료
    Expired,
}

impl OrderStatus {
    /// 최종 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// 여전히 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// 브로커가 반환하는 주문 상태 보고.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrderStatus {
    /// 브로커 주문 ID
    pub broker_order_id: String,
    /// 현재 상태
    pub status: OrderStatus,
    /// 누적 체결 수량
    pub filled_quantity: Quantity,
    /// 평균 체결 가격 (체결이 있는 경우)
    pub average_price: Option<Price>,
    /// 마지막 체결 가격 (있는 경우)
    pub last_fill_price: Option<Price>,
    /// 누적 수수료
    pub commission: Decimal,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
}

/// 새 주문 생성을 위한 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 종목 코드
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (양수)
    pub quantity: Quantity,
    /// 지정가 또는 시장가 주문의 참조 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 스톱 가격 (스톱 주문용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Price>,
}

impl OrderRequest {
    /// 시장가 매수 주문 요청을 생성합니다.
    pub fn market_buy(symbol: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
        }
    }

    /// 시장가 매도 주문 요청을 생성합니다.
    pub fn market_sell(symbol: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            side: Side::Sell,
            ..Self::market_buy(symbol, quantity)
        }
    }

    /// 지정가 매수 주문 요청을 생성합니다.
    pub fn limit_buy(symbol: impl Into<String>, quantity: Quantity, price: Price) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market_buy(symbol, quantity)
        }
    }

    /// 지정가 매도 주문 요청을 생성합니다.
    pub fn limit_sell(symbol: impl Into<String>, quantity: Quantity, price: Price) -> Self {
        Self {
            side: Side::Sell,
            ..Self::limit_buy(symbol, quantity, price)
        }
    }

    /// 참조 가격을 설정합니다 (시장가 주문의 체결 힌트).
    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    /// 스톱 가격을 설정합니다.
    pub fn with_stop_price(mut self, stop_price: Price) -> Self {
        self.stop_price = Some(stop_price);
        self
    }
}

/// 주문 엔티티.
///
/// `id`는 생성 시점에 부여되는 내부 ID이며, `broker_order_id`는
/// 브로커 제출 성공 시 채워집니다 (제출 전에는 `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// 내부 주문 ID
    pub id: Uuid,
    /// 브로커가 할당한 주문 ID (제출 전에는 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<String>,
    /// 종목 코드
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 원래 수량
    pub quantity: Quantity,
    /// 지정가 또는 참조 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 스톱 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Price>,
    /// 현재 상태
    pub status: OrderStatus,
    /// 누적 체결 수량
    pub filled_quantity: Quantity,
    /// 평균 체결 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_price: Option<Price>,
    /// 전량 체결 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<DateTime<Utc>>,
    /// 누적 수수료
    pub commission: Decimal,
    /// 진단용 노트 (거부 사유 등)
    pub notes: String,
    /// 생성 타임스탬프
    pub created_at: DateTime<Utc>,
    /// 마지막 업데이트 타임스탬프
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 요청으로부터 새 주문을 생성합니다 (`Pending` 상태).
    pub fn from_request(request: OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            broker_order_id: None,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            stop_price: request.stop_price,
            status: OrderStatus::Pending,
            filled_quantity: 0,
            filled_price: None,
            filled_at: None,
            commission: Decimal::ZERO,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 남은 체결 수량을 반환합니다.
    ///
    /// 모든 변경 이후 `filled_quantity + remaining_quantity() == quantity`가
    /// 유지됩니다.
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// 주문이 전량 체결되었는지 확인합니다.
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// 주문이 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 주문의 명목 가치를 계산합니다 (가격이 있는 경우).
    pub fn notional_value(&self) -> Option<Decimal> {
        self.price.map(|p| p.mul_qty(self.quantity))
    }
}
