//! News Widget - A cached multi-source news aggregator
//!
//! This crate fetches the latest items from several feed sources through a
//! feed-to-JSON conversion service, merges them newest first, keeps the top
//! results in a time-bounded cache and renders them as a news widget.

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod news;
pub mod presenter;
pub mod routes;
