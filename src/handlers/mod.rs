//! HTTP handlers

pub mod meta;
pub mod health;
pub mod features;
pub mod predict;
pub mod history;
