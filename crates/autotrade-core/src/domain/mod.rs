//! 핵심 도메인 모델.

pub mod ledger;
pub mod order;
pub mod position;
pub mod trade;

pub use ledger::*;
pub use order::*;
pub use position::*;
pub use trade::*;
