//! Integration tests for the live movie collection (gateway + subscriptions).

mod gateway;
mod stream;
