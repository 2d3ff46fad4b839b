//! Domain services behind the route layer.
//!
//! ARCHITECTURE
//! ============
//! Route handlers translate the wire protocol and publish broadcasts; the
//! modules here own the domain rules and the SQLite queries behind them.

pub mod board;
pub mod chat;
pub mod identity;
