//! Server configuration
//!
//! # 环境变量
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | WORK_DIR | /var/lib/atelier | 工作目录 (数据库, 日志) |
//! | HTTP_PORT | 3000 | HTTP 服务端口 |
//! | ENVIRONMENT | development | 运行环境 |
//! | FRONTEND_URL | (dev fallback) | 前端地址, 生产环境必填 |
//! | STRIPE_SECRET_KEY / STRIPE_WEBHOOK_SECRET | - | Stripe 凭证 |
//! | SQUARE_ACCESS_TOKEN / SQUARE_LOCATION_ID | - | Square 凭证 |
//! | SQUARE_WEBHOOK_SIGNATURE_KEY / SQUARE_WEBHOOK_URL | - | Square webhook 验签 |
//! | SENDGRID_API_KEY / SENDGRID_FROM_EMAIL | - | 邮件服务 |
//! | JWT_SECRET | (dev secret) | 管理端令牌密钥 |

use std::path::PathBuf;

use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 前端地址 (支付成功/取消跳转)
    pub frontend_url: Option<String>,

    // === Payment providers ===
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub square_access_token: Option<String>,
    pub square_location_id: Option<String>,
    pub square_webhook_signature_key: Option<String>,
    /// Exact public URL of the Square webhook endpoint (part of the
    /// signature input)
    pub square_webhook_url: Option<String>,

    // === Email ===
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,

    // === Auth ===
    pub jwt_secret: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/atelier".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            frontend_url: std::env::var("FRONTEND_URL").ok(),

            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            square_access_token: std::env::var("SQUARE_ACCESS_TOKEN").ok(),
            square_location_id: std::env::var("SQUARE_LOCATION_ID").ok(),
            square_webhook_signature_key: std::env::var("SQUARE_WEBHOOK_SIGNATURE_KEY").ok(),
            square_webhook_url: std::env::var("SQUARE_WEBHOOK_URL").ok(),

            sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok(),
            sendgrid_from_email: std::env::var("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|_| "bonjour@atelier-terre-et-feu.fr".into()),

            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-only-insecure-secret".into()),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Frontend base URL for checkout redirects. Required in production;
    /// falls back to the local dev server otherwise.
    pub fn frontend_url(&self) -> AppResult<String> {
        match &self.frontend_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None if self.is_production() => Err(AppError::internal(
                "FRONTEND_URL must be configured in production",
            )),
            None => Ok("http://localhost:5173".to_string()),
        }
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// Ensure the work_dir layout exists (database/, logs/)
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            work_dir: "/tmp/atelier-test".into(),
            http_port: 3000,
            environment: "development".into(),
            frontend_url: None,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            square_access_token: None,
            square_location_id: None,
            square_webhook_signature_key: None,
            square_webhook_url: None,
            sendgrid_api_key: None,
            sendgrid_from_email: "test@example.fr".into(),
            jwt_secret: "secret".into(),
        }
    }

    #[test]
    fn test_frontend_url_dev_fallback() {
        let config = base_config();
        assert_eq!(config.frontend_url().unwrap(), "http://localhost:5173");
    }

    #[test]
    fn test_frontend_url_required_in_production() {
        let mut config = base_config();
        config.environment = "production".into();
        assert!(config.frontend_url().is_err());

        config.frontend_url = Some("https://atelier.example/".into());
        // Trailing slash trimmed
        assert_eq!(config.frontend_url().unwrap(), "https://atelier.example");
    }
}
