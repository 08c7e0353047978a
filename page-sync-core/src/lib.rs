#![doc = "page-sync-core: core logic library for page-sync."]

//! This crate reconciles a local tree of markdown documents with a Confluence
//! page hierarchy across repeated runs and rewrites relative links between
//! documents into absolute page URLs.
//!
//! # Usage
//! Build a [`config::SyncConfig`], pick a [`contract::DocumentStore`]
//! (usually [`confluence::ConfluenceClient`]) and a [`contract::FileSystem`],
//! then call [`synchronise::synchronise`]. Rendering and publishing page
//! bodies is left to the caller.

pub mod config;
pub mod confluence;
pub mod contract;
pub mod error;
pub mod links;
pub mod matcher;
pub mod materialize;
pub mod meta;
pub mod node;
pub mod prune;
pub mod synchronise;
pub mod tree;

pub use error::SyncError;
