//! 시스템 전반에서 사용되는 공통 수치 타입.
//!
//! 가격과 손익은 금융 정밀도를 위해 `Decimal`을 사용하고,
//! 수량은 정수 주식 단위이므로 부호 있는 정수를 사용합니다.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문/포지션 수량 타입 (주식 단위).
///
/// 주문 수량은 항상 양수이며, 포지션 수량은 부호로 방향을 나타냅니다
/// (양수 = 롱, 음수 = 숏, 0 = 플랫).
pub type Quantity = i64;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 수량을 Decimal로 변환하여 곱합니다.
    fn mul_qty(&self, qty: Quantity) -> Decimal;
}

impl DecimalExt for Decimal {
    fn mul_qty(&self, qty: Quantity) -> Decimal {
        *self * Decimal::from(qty)
    }
}
