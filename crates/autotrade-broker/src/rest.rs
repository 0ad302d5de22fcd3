//! REST API 브로커 클라이언트.
//!
//! 주문 제출/취소/조회와 계좌 조회를 제공하는 브로커 REST API 커넥터입니다.
//!
//! # 엔드포인트
//!
//! - `POST /orders` 주문 제출
//! - `DELETE /orders/{id}` 주문 취소
//! - `GET /orders/{id}` 주문 상태 조회
//! - `GET /orders?symbol=&limit=` 주문 이력 조회
//! - `GET /account` 계좌 조회
//! - `GET /positions` 포지션 조회

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use autotrade_core::config::RestBrokerConfig;
use autotrade_core::{BrokerOrderStatus, Order, OrderStatus, Position, Price, Quantity};

use crate::traits::{AccountInfo, BrokerConnector, BrokerResult};
use crate::BrokerError;

/// 브로커 REST API 클라이언트.
pub struct RestBroker {
    config: RestBrokerConfig,
    client: Client,
}

impl RestBroker {
    /// 새 REST 브로커 클라이언트를 생성합니다.
    pub fn new(config: RestBrokerConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::Unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 응답 본문을 읽고 HTTP 에러를 브로커 에러로 변환합니다.
    async fn read_body(&self, response: reqwest::Response) -> BrokerResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BrokerError::Unauthorized(body));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BrokerError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BrokerError::OrderNotFound(body));
        }
        if !status.is_success() {
            error!("Broker API request failed: {} - {}", status, body);
            return Err(BrokerError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        Ok(body)
    }
}

/// 주문 제출 요청 본문.
#[derive(Debug, Serialize)]
struct PlaceOrderRequest<'a> {
    symbol: &'a str,
    side: String,
    order_type: String,
    quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

/// 브로커가 반환하는 주문 상태 페이로드.
#[derive(Debug, Deserialize)]
struct OrderPayload {
    order_id: String,
    status: String,
    filled_quantity: Quantity,
    #[serde(default)]
    average_price: Option<Price>,
    #[serde(default)]
    last_fill_price: Option<Price>,
    #[serde(default)]
    commission: Decimal,
    updated_at: DateTime<Utc>,
}

impl OrderPayload {
    fn into_broker_status(self) -> BrokerResult<BrokerOrderStatus> {
        Ok(BrokerOrderStatus {
            broker_order_id: self.order_id,
            status: parse_status(&self.status)?,
            filled_quantity: self.filled_quantity,
            average_price: self.average_price,
            last_fill_price: self.last_fill_price,
            commission: self.commission,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    balance: Decimal,
    equity: Decimal,
    margin_used: Decimal,
    margin_available: Decimal,
}

#[derive(Debug, Deserialize)]
struct PositionPayload {
    symbol: String,
    quantity: Quantity,
    average_price: Price,
    #[serde(default)]
    current_price: Price,
    #[serde(default)]
    realized_pnl: Decimal,
}

/// 브로커 상태 문자열을 내부 상태로 변환합니다.
fn parse_status(s: &str) -> BrokerResult<OrderStatus> {
    match s {
        "PENDING" => Ok(OrderStatus::Pending),
        "SUBMITTED" | "NEW" | "OPEN" => Ok(OrderStatus::Submitted),
        "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELLED" | "CANCELED" => Ok(OrderStatus::Cancelled),
        "REJECTED" => Ok(OrderStatus::Rejected),
        "EXPIRED" => Ok(OrderStatus::Expired),
        other => Err(BrokerError::ParseError(format!(
            "Unknown order status: {}",
            other
        ))),
    }
}

#[async_trait]
impl BrokerConnector for RestBroker {
    fn name(&self) -> &str {
        "rest"
    }

    async fn get_account_info(&self) -> BrokerResult<AccountInfo> {
        let response = self
            .client
            .get(self.url("/account"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(BrokerError::from)?;

        let body = self.read_body(response).await?;
        let payload: AccountPayload = serde_json::from_str(&body)?;

        Ok(AccountInfo {
            balance: payload.balance,
            equity: payload.equity,
            margin_used: payload.margin_used,
            margin_available: payload.margin_available,
        })
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        let response = self
            .client
            .get(self.url("/positions"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(BrokerError::from)?;

        let body = self.read_body(response).await?;
        let payloads: Vec<PositionPayload> = serde_json::from_str(&body)?;

        let now = Utc::now();
        Ok(payloads
            .into_iter()
            .map(|p| {
                let mut position = Position::flat(&p.symbol);
                position.quantity = p.quantity;
                position.average_price = p.average_price;
                position.realized_pnl = p.realized_pnl;
                position.mark(p.current_price);
                position.last_updated = now;
                position
            })
            .collect())
    }

    async fn place_order(&self, order: &Order) -> BrokerResult<String> {
        let request = PlaceOrderRequest {
            symbol: &order.symbol,
            side: order.side.to_string(),
            order_type: format!("{:?}", order.order_type).to_uppercase(),
            quantity: order.quantity,
            price: order.price,
            stop_price: order.stop_price,
        };

        debug!(symbol = %order.symbol, side = %order.side, quantity = order.quantity, "Placing order");

        let response = self
            .client
            .post(self.url("/orders"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(BrokerError::from)?;

        let body = self.read_body(response).await?;
        let payload: PlaceOrderResponse = serde_json::from_str(&body)?;
        Ok(payload.order_id)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> BrokerResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/orders/{}", broker_order_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(BrokerError::from)?;

        self.read_body(response).await?;
        Ok(())
    }

    async fn get_order_status(&self, broker_order_id: &str) -> BrokerResult<BrokerOrderStatus> {
        let response = self
            .client
            .get(self.url(&format!("/orders/{}", broker_order_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(BrokerError::from)?;

        let body = self.read_body(response).await?;
        let payload: OrderPayload = serde_json::from_str(&body)?;
        payload.into_broker_status()
    }

    async fn get_order_history(
        &self,
        symbol: Option<&str>,
        limit: Option<u32>,
    ) -> BrokerResult<Vec<BrokerOrderStatus>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(symbol) = symbol {
            query.push(("symbol", symbol.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .client
            .get(self.url("/orders"))
            .bearer_auth(&self.config.api_key)
            .query(&query)
            .send()
            .await
            .map_err(BrokerError::from)?;

        let body = self.read_body(response).await?;
        let payloads: Vec<OrderPayload> = serde_json::from_str(&body)?;
        payloads
            .into_iter()
            .map(OrderPayload::into_broker_status)
            .collect()
    }
}
