//! Integration tests driving the circulation service over the in-memory store

mod common;
mod concurrency;
mod sweep;
mod transit;
