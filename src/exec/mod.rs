// src/exec/mod.rs

//! Shell-command task functions.
//!
//! The CLI turns every `[task.<id>]` section into a [`Task`](crate::task::Task)
//! whose function runs `cmd` through the platform shell. Data node paths are
//! passed to the process through environment variables; see [`command`].

pub mod command;

pub use command::{CommandSpec, command_task, env_var_name};
