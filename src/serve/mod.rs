//! Development serving of the built static output.

pub mod addr;
pub mod listing;
pub mod matcher;
pub mod router;
pub mod server;

pub use addr::{parse_addrport, BindAddr};
pub use matcher::StaticMatcher;
pub use router::{build_router, ServeState};
pub use server::{ctrl_c, serve, serve_listener, spawn_watch_build};
