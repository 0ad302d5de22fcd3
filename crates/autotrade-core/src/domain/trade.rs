//! 체결 기록.
//!
//! `Trade`는 체결 이벤트당 정확히 한 번 생성되는 불변 기록입니다.
//! 생성 이후 변경되지 않습니다.

use crate::domain::Side;
use crate::types::{DecimalExt, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 단일 체결을 나타내는 거래 기록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// 내부 거래 ID
    pub id: Uuid,
    /// 소유 주문의 내부 ID
    pub order_id: Uuid,
    /// 브로커 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<String>,
    /// 종목 코드
    pub symbol: String,
    /// 거래 방향
    pub side: Side,
    /// 체결 수량
    pub quantity: Quantity,
    /// 체결 가격
    pub price: Price,
    /// 수수료
    pub commission: Decimal,
    /// 이 체결에 귀속되는 실현 손익 (신규 진입 체결은 0)
    pub pnl: Decimal,
    /// 체결 타임스탬프
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// 거래의 명목 가치를 반환합니다.
    pub fn notional_value(&self) -> Decimal {
        self.price.mul_qty(self.quantity)
    }

    /// 수수료 차감 후 순 손익을 반환합니다.
    pub fn net_pnl(&self) -> Decimal {
        self.pnl - self.commission
    }
}

/// 주문 체결 이벤트 (원장 입력).
///
/// 브로커 폴링에서 관찰된 체결 증분 하나를 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// 소유 주문의 내부 ID
    pub order_id: Uuid,
    /// 브로커 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<String>,
    /// 종목 코드
    pub symbol: String,
    /// 체결 방향
    pub side: Side,
    /// 체결 수량 (양수)
    pub quantity: Quantity,
    /// 체결 가격
    pub price: Price,
    /// 이 체결분의 수수료
    pub commission: Decimal,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_values() {
        let trade = Trade {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            broker_order_id: Some("B-1".to_string()),
            symbol: "7203".to_string(),
            side: Side::Sell,
            quantity: 100,
            price: dec!(12),
            commission: dec!(5),
            pnl: dec!(200),
            executed_at: Utc::now(),
        };

        assert_eq!(trade.notional_value(), dec!(1200));
        assert_eq!(trade.net_pnl(), dec!(195));
    }
}
