//! 거래 시스템 공통 에러 타입

use thiserror::Error;

/// 거래 실행 계층 전반에서 사용하는 에러 타입입니다.
#[derive(Error, Debug)]
pub enum TradingError {
    /// 주문 요청 검증 실패 (수량, 가격, 심볼 등)
    #[error("Validation error: {0}")]
    Validation(String),

    /// 증거금 부족으로 주문 거부
    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// 브로커 커넥터 통신 실패
    #[error("Broker connector error: {0}")]
    Connector(String),

    /// 취소 불가 상태의 주문에 대한 취소 시도
    #[error("Cancellation error: {0}")]
    Cancellation(String),

    /// 주문 또는 포지션 조회 실패
    #[error("Not found: {0}")]
    NotFound(String),

    /// 엔진이 이미 종료되어 새 주문을 받을 수 없음
    #[error("Execution engine is not accepting orders")]
    QueueClosed,

    /// 설정 로드/해석 실패
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// 기타 내부 오류
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TradingError {
    /// 재시도 가능한 일시적 오류인지 여부
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradingError::Connector(_))
    }

    /// 복구 불가능한 치명적 오류인지 여부
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TradingError::Config(_) | TradingError::QueueClosed
        )
    }
}

/// 거래 시스템 공통 Result 타입
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = TradingError::InsufficientMargin {
            required: dec!(11000),
            available: dec!(1000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient margin: required 11000, available 1000"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TradingError::Connector("timeout".to_string()).is_retryable());
        assert!(!TradingError::Validation("bad qty".to_string()).is_retryable());
        assert!(TradingError::QueueClosed.is_fatal());
    }
}
