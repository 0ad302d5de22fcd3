//! 포지션 타입.
//!
//! 이 모듈은 종목별 포지션 타입을 정의합니다:
//! - `Position` - 부호 있는 수량 기반 포지션 (양수 = 롱, 음수 = 숏)
//! - `PositionSummary` - 포트폴리오 요약

use crate::domain::Side;
use crate::types::{DecimalExt, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 종목의 보유량을 나타내는 포지션.
///
/// 수량의 부호가 방향을 나타냅니다. `average_price`는 현재 열려 있는
/// 수량의 단위당 원가이며, 플랫일 때는 0으로 리셋됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// 종목 코드
    pub symbol: String,
    /// 부호 있는 보유 수량 (양수 = 롱, 음수 = 숏, 0 = 플랫)
    pub quantity: Quantity,
    /// 평균 진입 가격 (플랫이면 0)
    pub average_price: Price,
    /// 마지막으로 관찰된 체결/시장 가격
    pub current_price: Price,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 누적 실현 손익 (청산 체결로만 조정됨)
    pub realized_pnl: Decimal,
    /// 포지션 최초 오픈 시각
    pub opened_at: DateTime<Utc>,
    /// 마지막 업데이트 시각
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// 플랫 포지션을 생성합니다.
    pub fn flat(symbol: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            symbol: symbol.into(),
            quantity: 0,
            average_price: Decimal::ZERO,
            current_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at: now,
            last_updated: now,
        }
    }

    /// 포지션 방향을 반환합니다 (플랫이면 None).
    pub fn side(&self) -> Option<Side> {
        match self.quantity {
            q if q > 0 => Some(Side::Buy),
            q if q < 0 => Some(Side::Sell),
            _ => None,
        }
    }

    /// 플랫 여부를 확인합니다.
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// 보유 수량의 절대값을 반환합니다.
    pub fn abs_quantity(&self) -> Quantity {
        self.quantity.abs()
    }

    /// 포지션의 명목 가치를 반환합니다 (절대값).
    pub fn notional_value(&self) -> Decimal {
        self.current_price.mul_qty(self.quantity.abs())
    }

    /// 시장 가격을 반영하고 미실현 손익을 재계산합니다.
    pub fn mark(&mut self, price: Price) {
        self.current_price = price;
        self.recalculate_unrealized();
        self.last_updated = Utc::now();
    }

    /// 현재 가격 기준으로 미실현 손익을 재계산합니다.
    ///
    /// 부호 있는 수량이 숏 방향 부호를 자연스럽게 처리합니다:
    /// 숏(qty < 0)에서 가격 하락 시 (current - avg)가 음수이므로 곱이 양수가 됩니다.
    pub fn recalculate_unrealized(&mut self) {
        if self.quantity == 0 {
            self.unrealized_pnl = Decimal::ZERO;
        } else {
            self.unrealized_pnl =
                (self.current_price - self.average_price) * Decimal::from(self.quantity);
        }
    }
}

/// 포트폴리오 개요를 위한 포지션 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    /// 오픈 포지션 총 개수
    pub total_positions: usize,
    /// 총 미실현 손익
    pub total_unrealized_pnl: Decimal,
    /// 총 실현 손익
    pub total_realized_pnl: Decimal,
    /// 총 명목 가치
    pub total_notional_value: Decimal,
    /// 롱 포지션 개수
    pub long_count: usize,
    /// 숏 포지션 개수
    pub short_count: usize,
}

impl PositionSummary {
    /// 포지션 목록으로부터 요약을 생성합니다.
    pub fn from_positions(positions: &[Position]) -> Self {
        let open: Vec<_> = positions.iter().filter(|p| !p.is_flat()).collect();

        Self {
            total_positions: open.len(),
            total_unrealized_pnl: open.iter().map(|p| p.unrealized_pnl).sum(),
            total_realized_pnl: positions.iter().map(|p| p.realized_pnl).sum(),
            total_notional_value: open.iter().map(|p| p.notional_value()).sum(),
            long_count: open.iter().filter(|p| p.quantity > 0).count(),
            short_count: open.iter().filter(|p| p.quantity < 0).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_position() {
        let position = Position::flat("7203");
        assert!(position.is_flat());
        assert_eq!(position.side(), None);
        assert_eq!(position.unrealized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_mark_long() {
        let mut position = Position::flat("7203");
        position.quantity = 100;
        position.average_price = dec!(2500);

        position.mark(dec!(2550));
        assert_eq!(position.unrealized_pnl, dec!(5000));

        position.mark(dec!(2480));
        assert_eq!(position.unrealized_pnl, dec!(-2000));
    }

    #[test]
    fn test_mark_short() {
        let mut position = Position::flat("9984");
        position.quantity = -50;
        position.average_price = dec!(100);

        // 가격 하락 - 숏 포지션 수익
        position.mark(dec!(90));
        assert_eq!(position.unrealized_pnl, dec!(500));
        assert_eq!(position.side(), Some(Side::Sell));
    }

    #[test]
    fn test_summary() {
        let mut long = Position::flat("7203");
        long.quantity = 100;
        long.average_price = dec!(2500);
        long.mark(dec!(2550));

        let mut short = Position::flat("9984");
        short.quantity = -50;
        short.average_price = dec!(100);
        short.mark(dec!(90));

        let flat = Position::flat("6758");

        let summary = PositionSummary::from_positions(&[long, short, flat]);
        assert_eq!(summary.total_positions, 2);
        assert_eq!(summary.long_count, 1);
        assert_eq!(summary.short_count, 1);
        assert_eq!(summary.total_unrealized_pnl, dec!(5500));
    }
}
