//! Atelier Server - 陶艺工作室电商与预约后端
//!
//! # 模块结构
//!
//! ```text
//! src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # 管理端 JWT 验证
//! ├── db/            # SQLite 连接池、模型、仓储
//! ├── commerce/      # 下单、预约、礼品卡、对账、退款编排
//! ├── payments/      # Stripe / Square 网关与 webhook 验签
//! ├── services/      # 邮件 (SendGrid)
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、响应封装、日志、时间
//! ```

pub mod api;
pub mod auth;
pub mod commerce;
pub mod core;
pub mod db;
pub mod payments;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use utils::{ApiResponse, AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;
    init_logger_with_file(None, config.log_dir().to_str());

    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ___   __       ___
   /   | / /____  / (_)__  _____
  / /| |/ __/ _ \/ / / _ \/ ___/
 / ___ / /_/  __/ / /  __/ /
/_/  |_\__/\___/_/_/\___/_/
    "#
    );
}
