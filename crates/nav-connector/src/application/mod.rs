//! # Application Module
//!
//! The connector facade over signer, codec, transport and poller.

pub mod service;

pub use service::Connector;
