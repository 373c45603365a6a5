pub mod bouncer;
pub mod cache;
pub mod cache_key;
pub mod metrics;
