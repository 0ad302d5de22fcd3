//! 심볼별 포지션 장부.
//!
//! 체결 산술은 `autotrade_core::domain::ledger`의 순수 함수에 위임하고,
//! 이 모듈은 심볼별 포지션 저장과 거래 이력 보관만 담당합니다.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use autotrade_core::domain::ledger::apply_fill;
use autotrade_core::{Fill, Position, PositionSummary, Price, Trade};

/// 심볼별 포지션과 거래 이력을 보관하는 장부.
#[derive(Debug, Default)]
pub struct PositionBook {
    /// 심볼별 포지션 (플랫 포지션도 실현 손익 추적을 위해 유지)
    positions: HashMap<String, Position>,
    /// 거래 이력 (체결당 1건)
    trades: Vec<Trade>,
    /// 거래 이력 최대 보관 건수
    max_history_size: usize,
}

impl PositionBook {
    /// 새 포지션 장부를 생성한다.
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            trades: Vec::new(),
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

    /// 체결을 포지션에 반영하고 생성된 거래 기록을 반환한다.
    pub fn apply_fill(&mut self, fill: &Fill) -> Trade {
        let current = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(&fill.symbol));

        let outcome = apply_fill(current, fill);
        *current = outcome.position;

        debug!(
            symbol = %fill.symbol,
            quantity = current.quantity,
            average_price = %current.average_price,
            realized_pnl = %outcome.trade.pnl,
            "Fill applied to position"
        );

        self.trades.push(outcome.trade.clone());
        self.trim_history();
        outcome.trade
    }

    /// 심볼의 마크 가격을 갱신하고 미실현 손익을 재계산한다.
    pub fn mark_price(&mut self, symbol: &str, price: Price) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.mark(price);
        }
    }

    /// 여러 심볼의 마크 가격을 일괄 갱신한다.
    pub fn mark_prices(&mut self, prices: &HashMap<String, Price>) {
        for (symbol, price) in prices {
            self.mark_price(symbol, *price);
        }
    }

    // ==================== 조회 ====================

    /// 심볼의 포지션을 가져온다.
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// 열린 포지션 목록 (플랫 제외).
    pub fn get_open_positions(&self) -> Vec<&Position> {
        self.positions.values().filter(|p| !p.is_flat()).collect()
    }

    /// 모든 포지션 (플랫 포함).
    pub fn get_all_positions(&self) -> Vec<&Position> {
        self.positions.values().collect()
    }

    /// 포지션 요약.
    pub fn summary(&self) -> PositionSummary {
        let positions: Vec<Position> = self.positions.values().cloned().collect();
        PositionSummary::from_positions(&positions)
    }

    /// 전체 실현 손익 (플랫 포지션 포함).
    pub fn total_realized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    /// 전체 미실현 손익.
    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// 전체 수수료 합계.
    pub fn total_commission(&self) -> Decimal {
        self.trades.iter().map(|t| t.commission).sum()
    }

    /// 거래 이력.
    pub fn get_trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 심볼의 거래 이력.
    pub fn get_trades_for_symbol(&self, symbol: &str) -> Vec<&Trade> {
        self.trades.iter().filter(|t| t.symbol == symbol).collect()
    }

    fn trim_history(&mut self) {
        if self.trades.len() > self.max_history_size {
            let excess = self.trades.len() - self.max_history_size;
            self.trades.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrade_core::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(symbol: &str, side: Side, quantity: i64, price: Decimal) -> Fill {
        Fill {
            order_id: Uuid::new_v4(),
            broker_order_id: None,
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            commission: dec!(5),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_open_and_close_cycle() {
        let mut book = PositionBook::new();

        book.apply_fill(&fill("7203", Side::Buy, 100, dec!(2500)));
        assert_eq!(book.get_open_positions().len(), 1);

        let trade = book.apply_fill(&fill("7203", Side::Sell, 100, dec!(2600)));
        assert_eq!(trade.pnl, dec!(10000));
        assert!(book.get_open_positions().is_empty());

        // 플랫이어도 실현 손익은 남는다
        assert_eq!(book.total_realized_pnl(), dec!(10000));
        assert_eq!(book.get_position("7203").unwrap().realized_pnl, dec!(10000));
    }

    #[test]
    fn test_multi_symbol_isolation() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("7203", Side::Buy, 100, dec!(2500)));
        book.apply_fill(&fill("9984", Side::Sell, 50, dec!(8000)));

        assert_eq!(book.get_position("7203").unwrap().quantity, 100);
        assert_eq!(book.get_position("9984").unwrap().quantity, -50);
        assert_eq!(book.get_trades_for_symbol("7203").len(), 1);
    }

    #[test]
    fn test_mark_prices_updates_unrealized() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("7203", Side::Buy, 100, dec!(2500)));

        book.mark_price("7203", dec!(2550));
        assert_eq!(book.total_unrealized_pnl(), dec!(5000));

        // 모르는 심볼은 무시
        book.mark_price("0000", dec!(1));
        assert_eq!(book.get_all_positions().len(), 1);
    }

    #[test]
    fn test_commission_accumulates() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("7203", Side::Buy, 10, dec!(100)));
        book.apply_fill(&fill("7203", Side::Buy, 10, dec!(110)));
        assert_eq!(book.total_commission(), dec!(10));
    }
}
