//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`products`] - 商品目录 (公开)
//! - [`orders`] - 下单与订单查询
//! - [`workshops`] - 工作坊、场次与预约
//! - [`gift_cards`] - 礼品卡
//! - [`webhooks`] - Stripe / Square 支付回调
//! - [`admin`] - 后台管理 (JWT)

pub mod admin;
pub mod gift_cards;
pub mod health;
pub mod orders;
pub mod products;
pub mod webhooks;
pub mod workshops;

use axum::Router;
use http::HeaderValue;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{ApiResponse, AppResult};

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).unwrap()))
    }
}

/// Build a router with all routes registered (no middleware)
pub fn build_router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(products::router())
        .merge(orders::router())
        .merge(workshops::router())
        .merge(gift_cards::router())
        .merge(webhooks::router())
        .merge(admin::router(state))
}

/// Build a fully configured application with all middleware and state
pub fn build_app(state: &ServerState) -> Router {
    let request_id_header = http::HeaderName::from_static("x-request-id");

    build_router(state)
        // ========== Tower HTTP Middleware ==========
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Compression - Gzip compress responses
        .layer(CompressionLayer::new())
        // Request logging
        .layer(TraceLayer::new_for_http())
        // Request ID - generate and propagate
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, XRequestId))
        .with_state(state.clone())
}
