//! Library side of the notedex binary: wire types, the search server, the
//! recall client, and the subcommand implementations.

pub mod api;
pub mod commands;
pub mod recall;
pub mod server;
