// src/lib.rs

//! Config Collector Library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod transport;
pub mod utils;
