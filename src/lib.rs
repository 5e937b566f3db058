//! cinechat: a streaming movie assistant that lets the model call movie
//! functions through `<function_call>` directives embedded in its replies.

pub mod agent;
pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod core;
pub mod directive;
pub mod display;
pub mod input;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod tools;
