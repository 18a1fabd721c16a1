//! Shared server state
//!
//! One `ServerState` is built at startup and cloned into every handler
//! (all members are cheap shared handles). Repositories receive the pool,
//! payment calls go through the gateway registry, emails through the
//! mailer — no global singletons.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::db::models::Provider;
use crate::payments::{Gateways, PaymentGateway};
use crate::services::EmailService;

#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 连接池
    pub db: SqlitePool,
    /// 支付网关 (Stripe / Square)
    pub gateways: Gateways,
    /// 邮件服务 (SendGrid)
    pub mailer: Arc<EmailService>,
    /// JWT 验证服务
    pub jwt_service: Arc<JwtService>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：工作目录 → 数据库 → 网关/邮件/JWT
    ///
    /// # Panics
    ///
    /// 数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        let db_path = config.database_dir().join("atelier.db");
        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        let gateways = Gateways::from_config(config);
        let mailer = Arc::new(EmailService::new(
            config.sendgrid_api_key.clone(),
            config.sendgrid_from_email.clone(),
        ));
        let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));

        Self {
            config: config.clone(),
            db: db_service.pool,
            gateways,
            mailer,
            jwt_service,
        }
    }

    /// Resolve the gateway for an aggregate's stored provider
    pub fn gateway_for(&self, provider: Option<Provider>) -> Option<Arc<dyn PaymentGateway>> {
        provider.and_then(|p| self.gateways.get(p))
    }
}
