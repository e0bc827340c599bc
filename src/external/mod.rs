//! Provides abstractions over the APIs of various system components

pub mod dependency_provider;
pub mod display;
