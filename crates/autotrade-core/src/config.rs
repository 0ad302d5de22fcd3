//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 실행 엔진 설정
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// 사용할 브로커 종류
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 브로커 선택 및 커넥터별 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// 사용할 브로커 커넥터
    #[serde(default)]
    pub kind: BrokerKind,
    /// 모의 브로커 설정
    #[serde(default)]
    pub paper: PaperBrokerConfig,
    /// REST 브로커 설정
    #[serde(default)]
    pub rest: RestBrokerConfig,
}

/// 브로커 커넥터 종류.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// 메모리 내 모의 브로커
    #[default]
    Paper,
    /// REST API 브로커
    Rest,
}

/// 실행 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// 워커 틱 간격 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 증거금 검사용 버퍼 배수
    #[serde(default = "default_margin_multiplier")]
    pub margin_multiplier: Decimal,
    /// 주문 이벤트 히스토리 최대 보관 건수
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            margin_multiplier: default_margin_multiplier(),
            max_history_size: default_max_history_size(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_margin_multiplier() -> Decimal {
    Decimal::new(11, 1)
}
fn default_max_history_size() -> usize {
    1000
}

/// 모의 브로커 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperBrokerConfig {
    /// 시작 현금
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    /// 체결당 고정 수수료
    #[serde(default)]
    pub commission: Decimal,
    /// 마크 가격이 없을 때 사용할 기본 체결 가격
    #[serde(default)]
    pub default_fill_price: Option<Decimal>,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            commission: Decimal::ZERO,
            default_fill_price: None,
        }
    }
}

fn default_starting_cash() -> Decimal {
    Decimal::new(10_000_000, 0)
}

/// REST 브로커 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestBrokerConfig {
    /// API 기본 URL
    #[serde(default)]
    pub base_url: String,
    /// API 키
    #[serde(default)]
    pub api_key: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RestBrokerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// `.env` 파일이 있으면 먼저 환경 변수로 읽어들입니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("AUTOTRADE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.execution.poll_interval_ms, 1000);
        assert_eq!(config.execution.margin_multiplier, dec!(1.1));
        assert_eq!(config.broker.kind, BrokerKind::Paper);
        assert_eq!(config.broker.paper.starting_cash, dec!(10000000));
    }

    #[test]
    fn test_broker_kind_deserialization() {
        let kind: BrokerKind = serde_json::from_str("\"rest\"").unwrap();
        assert_eq!(kind, BrokerKind::Rest);
    }
}
