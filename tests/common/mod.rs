//! Common test utilities and fixtures

#![allow(dead_code)]

pub mod hanna_mock;
pub mod test_fixtures;
