#![forbid(unsafe_code)]

pub mod chrome;
pub mod cli;
pub mod driver;
pub mod error;
pub mod export;
pub mod fetch;
pub mod formats;
pub mod layout;
pub mod listing;
pub mod logging;
pub mod login;
pub mod resume_store;
pub mod retry;
pub mod session;
