//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod addresses;
pub mod auth;
pub mod health;
