//! Shared primitives: configuration, errors, hashing and the metadata catalog.

pub mod broker;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod hasher;
pub mod scalar;
pub mod schemas;
pub mod tabular;
pub mod time;
