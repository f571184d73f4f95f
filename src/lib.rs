#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod message;
pub mod observability;
pub mod recipients;
pub mod store;
pub(crate) mod util;
