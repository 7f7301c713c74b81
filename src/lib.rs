#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod dynamic;
pub mod error;
pub mod extract;
pub mod filter;
pub mod formats;
pub mod generic;
pub mod http;
pub mod logging;
pub mod normalize;
