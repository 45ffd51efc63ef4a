pub mod checkpoint;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod osf;
pub mod output;
pub mod ratelimit;
pub mod record;
pub mod resolver;
pub mod seeds;
pub mod walker;
