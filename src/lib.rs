//! scanguard
//!
//! QR attendance token codec and sliding-window rate limiter, served to a
//! local web application over a Unix socket.
//!
//! The library core is [`token`] and [`ratelimit`]; the remaining modules
//! make up the daemon around them.

pub mod audit;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod ratelimit;
pub mod socket;
pub mod token;
pub mod validation;
