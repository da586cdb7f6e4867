pub mod app;
pub mod auth;
pub mod cli;
pub mod constants;
pub mod gateway;
pub mod services;
pub mod storage;
pub mod utils;

pub use app::{load_config, Config};
pub use auth::{Role, RouteGuard, SessionManager, SessionState};
pub use gateway::{ApiError, ApiGateway, RequestConfig};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use utils::{ClinicError, Result};
