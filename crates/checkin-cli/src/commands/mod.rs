pub mod add;
pub mod auth_cmd;
pub mod check_in;
pub mod common;
pub mod completions;
pub mod config;
pub mod list;
pub mod remove;
pub mod show;
pub mod sync;
pub mod watch;
