pub mod config;
pub mod dispatch;
pub mod health;
pub mod protocol;
pub mod rpc;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use dispatch::{DispatchError, Dispatcher};
pub use server::{build_router, start, AppState, ServerHandle};
pub use session::{SessionError, SessionRegistry};
