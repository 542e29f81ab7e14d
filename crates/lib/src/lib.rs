//! playbot core library: Slack adapter, request pipeline, Go Playground client
//! and reply cache, used by the `playbot` CLI.

pub mod cache;
pub mod channels;
pub mod config;
pub mod context;
pub mod extract;
pub mod init;
pub mod pipeline;
pub mod playground;
pub mod relay;
