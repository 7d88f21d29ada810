//! CLI subcommands. Each submodule owns one subcommand's `run` entry point;
//! all of them operate on the same path/outbox/graph/backend-adapter
//! modules as the main loop, never duplicating that logic.

pub mod clean;
pub mod config;
pub mod doctor;
pub mod list;
pub mod loop_cmd;
pub mod pull;
pub mod push;
pub mod run;
pub mod set_id;
pub mod setup;
pub mod shortcuts;
pub mod submit;
pub mod tree;
