//! 브로커 커넥터 크레이트.
//!
//! 실행 엔진이 사용하는 `BrokerConnector` trait와 두 가지 구현을 제공합니다:
//!
//! - [`PaperBroker`]: 테스트/모의투자용 메모리 내 브로커
//! - [`RestBroker`]: REST API 브로커 클라이언트

pub mod error;
pub mod paper;
pub mod rest;
pub mod traits;

pub use error::BrokerError;
pub use paper::PaperBroker;
pub use rest::RestBroker;
pub use traits::{AccountInfo, BrokerConnector, BrokerResult};
