//! 포지션 원장: 체결을 포지션에 반영하는 순수 회계 함수.
//!
//! `apply_fill`은 결정적이고 부수 효과가 없는 함수입니다. 입력 포지션을
//! 변경하지 않고 새 포지션과 거래 기록을 반환하므로 엔진 루프와 독립적으로
//! 속성 기반 테스트가 가능합니다.
//!
//! 회계 규칙:
//! - 플랫이거나 같은 방향 체결: 평균 가격은 수량 가중 평균으로 갱신되고
//!   실현 손익은 발생하지 않는다.
//! - 반대 방향 체결: `min(체결수량, |보유수량|)`만큼 청산되어 실현 손익이
//!   발생하며, 남은 같은 방향 수량의 평균 가격은 변하지 않는다.
//! - 체결 수량이 보유 수량을 초과하면 초과분이 체결 가격을 평균 가격으로
//!   하는 반대 방향 신규 포지션을 연다.
//!
//! 청산분은 항상 체결 반영 *이전의* 절대 보유 수량 기준으로 계산한다.
//! 수량을 먼저 갱신하면 역전 케이스의 산술이 어긋난다.

use crate::domain::{Fill, Position, Trade};
use rust_decimal::Decimal;
use uuid::Uuid;

/// `apply_fill`의 결과.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    /// 체결 반영 후의 포지션
    pub position: Position,
    /// 이 체결에 대해 정확히 한 번 생성되는 거래 기록
    pub trade: Trade,
}

/// 체결 하나를 포지션에 반영합니다.
///
/// 반환되는 `Trade.pnl`은 이 체결로 실현된 손익입니다
/// (신규 진입/추가 체결은 0).
pub fn apply_fill(position: &Position, fill: &Fill) -> FillOutcome {
    debug_assert!(fill.quantity > 0, "fill quantity must be positive");

    let mut next = position.clone();
    let signed_fill = fill.side.sign() * fill.quantity;
    let open_abs = next.quantity.abs();

    let same_direction = next.quantity == 0 || next.quantity.signum() == signed_fill.signum();

    let realized = if same_direction {
        // 신규 진입 또는 같은 방향 추가: 수량 가중 평균으로 원가 갱신.
        let total = open_abs + fill.quantity;
        next.average_price = (next.average_price * Decimal::from(open_abs)
            + fill.price * Decimal::from(fill.quantity))
            / Decimal::from(total);
        if next.quantity == 0 {
            next.opened_at = fill.timestamp;
        }
        next.quantity += signed_fill;
        Decimal::ZERO
    } else {
        // 반대 방향: 체결 이전 보유 수량까지가 청산분.
        let closed = fill.quantity.min(open_abs);
        let pnl = if next.quantity > 0 {
            (fill.price - next.average_price) * Decimal::from(closed)
        } else {
            (next.average_price - fill.price) * Decimal::from(closed)
        };
        next.realized_pnl += pnl;

        let old_sign = next.quantity.signum();
        next.quantity += signed_fill;

        if next.quantity == 0 {
            // 정확히 청산: 원가는 무의미해지므로 리셋.
            next.average_price = Decimal::ZERO;
        } else if next.quantity.signum() != old_sign {
            // 방향 역전: 초과분이 체결 가격으로 새 포지션을 연다.
            next.average_price = fill.price;
            next.opened_at = fill.timestamp;
        }
        // 같은 방향 잔량이 남으면 평균 가격은 그대로 유지.
        pnl
    };

    next.current_price = fill.price;
    next.recalculate_unrealized();
    next.last_updated = fill.timestamp;

    let trade = Trade {
        id: Uuid::new_v4(),
        order_id: fill.order_id,
        broker_order_id: fill.broker_order_id.clone(),
        symbol: fill.symbol.clone(),
        side: fill.side,
        quantity: fill.quantity,
        price: fill.price,
        commission: fill.commission,
        pnl: realized,
        executed_at: fill.timestamp,
    };

    FillOutcome {
        position: next,
        trade,
    }
}
