//! 브로커 trait 정의.

use async_trait::async_trait;
use autotrade_core::{BrokerOrderStatus, Order, Position};
use rust_decimal::Decimal;

use crate::BrokerError;

/// 브로커 작업을 위한 Result 타입.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// 브로커 계좌 정보.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// 현금 잔고
    pub balance: Decimal,
    /// 총 평가 자산 (현금 + 포지션 평가액)
    pub equity: Decimal,
    /// 사용 중 증거금
    pub margin_used: Decimal,
    /// 신규 주문에 사용 가능한 증거금
    pub margin_available: Decimal,
}

/// 통합 브로커 인터페이스.
///
/// 실행 엔진은 이 trait만 알고 동작하므로 모의 브로커와 실제 브로커를
/// 동일한 경로로 테스트할 수 있습니다.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// 브로커 이름 반환.
    fn name(&self) -> &str;

    // === 계좌 작업 ===

    /// 계좌 정보 조회.
    async fn get_account_info(&self) -> BrokerResult<AccountInfo>;

    /// 브로커가 보고하는 현재 포지션 조회.
    async fn get_positions(&self) -> BrokerResult<Vec<Position>>;

    // === 주문 작업 ===

    /// 새 주문 제출. 브로커가 부여한 주문 ID를 반환합니다.
    async fn place_order(&self, order: &Order) -> BrokerResult<String>;

    /// 주문 취소.
    async fn cancel_order(&self, broker_order_id: &str) -> BrokerResult<()>;

    /// 주문 상태 조회.
    async fn get_order_status(&self, broker_order_id: &str) -> BrokerResult<BrokerOrderStatus>;

    /// 주문 이력 조회. `symbol`이 None이면 전체 심볼을 대상으로 합니다.
    async fn get_order_history(
        &self,
        symbol: Option<&str>,
        limit: Option<u32>,
    ) -> BrokerResult<Vec<BrokerOrderStatus>>;
}
