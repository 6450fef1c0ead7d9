#![forbid(unsafe_code)]

pub mod api;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod html;
pub mod logging;
pub mod markers;
pub mod navigation;
pub mod navigator;
pub mod page;
pub mod server;
pub mod transition;
