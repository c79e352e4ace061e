pub mod classify;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod paths;
pub mod platform;
pub mod profile;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod tunnel;
pub mod wireguard;
