//! Portico core: session lifecycle, inactivity timeout, route guarding and
//! role-based dashboard dispatch shared by the Portico applications

pub mod apps;
pub mod backend;
pub mod config;
pub mod error;
pub mod identity;
pub mod monitor;
pub mod routing;
pub mod session;
pub mod storage;

pub use apps::{AppKind, DashboardView, Rendered, RoleDispatcher, RoleSet};
pub use backend::{AuthBackend, AuthGrant, BackendError};
pub use config::PorticoConfig;
pub use error::{CoreError, CoreResult, ErrorContext, SessionError, SessionResult};
pub use identity::{AccountStatus, Credentials, Identity, TokenClaims, get_profile};
pub use monitor::{InactivityMonitor, MonitorConfig, MonitorListener, SignOutOnExpire, Subscription};
pub use routing::{GuardDecision, Navigation, Navigator, RouteGuard};
pub use session::{Session, SessionState, SessionStore};
pub use storage::{AUTH_TOKEN_KEY, FileTokenStorage, MemoryTokenStorage, TokenStorage};
