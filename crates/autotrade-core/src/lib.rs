//! # Autotrade Core
//!
//! 자동매매 실행 서브시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 실행 엔진 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문 및 주문 상태 타입
//! - 체결 기록 (Trade)
//! - 부호 있는 수량 기반 포지션
//! - 순수 함수 포지션 원장 (실현/미실현 손익 계산)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
