//! 브로커 에러 타입.

use thiserror::Error;

/// 브로커 커넥터 관련 에러.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 브로커 API 에러 응답
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 유효하지 않은 주문 (수량, 가격 등)
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// 잔고 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 취소 불가 상태
    #[error("Cannot cancel order: {0}")]
    CancelFailed(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl BrokerError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::NetworkError(_) | BrokerError::RateLimited | BrokerError::Timeout(_)
        )
    }

    /// 재시도하면 안 되는 치명적 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::Unauthorized(_)
                | BrokerError::InsufficientBalance(_)
                | BrokerError::InvalidOrder(_)
                | BrokerError::OrderRejected(_)
        )
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout(err.to_string())
        } else if err.is_connect() {
            BrokerError::NetworkError(err.to_string())
        } else {
            BrokerError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::ParseError(err.to_string())
    }
}
