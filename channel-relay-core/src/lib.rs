#![doc = "channel-relay-core: pipeline logic for relaying a source channel to a destination page."]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate holds the data model, the collaborator traits and the relay pipeline.
//! It performs no network I/O itself: the source feed, the text transformer and the
//! publisher are injected as trait objects (see [`contract`]).
//!
//! # Usage
//! Build a [`config::RelayConfig`], provide implementations of the [`contract`] traits
//! and call [`relay::Relay::run`] once per invocation.

pub mod audit;
pub mod config;
pub mod contract;
pub mod error;
pub mod media;
pub mod pacing;
pub mod preprocess;
pub mod relay;
