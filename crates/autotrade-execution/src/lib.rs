//! 주문 실행 크레이트.
//!
//! 매수/매도 의사의 접수부터 브로커 제출, 상태 폴링, 포지션 반영까지의
//! 실행 파이프라인을 제공합니다.
//!
//! - [`TradingFacade`]: 주문 접수와 조회의 단일 진입점
//! - [`ExecutionEngine`]: 제출 큐와 폴링 루프
//! - [`OrderStore`]: 주문 생명주기 추적
//! - [`PositionBook`]: 심볼별 포지션과 거래 이력

pub mod engine;
pub mod facade;
pub mod order_store;
pub mod position_book;

pub use engine::ExecutionEngine;
pub use facade::{TradingFacade, TradingSummary};
pub use order_store::{OrderEvent, OrderStats, OrderStore, OrderStoreError};
pub use position_book::PositionBook;
