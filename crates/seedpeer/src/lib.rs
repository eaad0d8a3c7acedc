//! Seed-peer client for the urchin control plane.
//!
//! Seed peers are object-storage-equipped nodes of the P2P fleet reachable
//! over HTTP. This crate provides:
//! - The folder cache/check/destroy client (`SeedPeerClient`, reqwest-backed)
//! - The cache-completion polling loop
//! - The peer directory and replicable-source selection

pub mod client;
pub mod directory;
pub mod error;
pub mod poll;

pub use client::{FolderStatus, HttpSeedPeerClient, SeedPeerClient};
pub use directory::{
    replicable_seed_peers, Scheduler, SeedPeer, SeedPeerDirectory, StaticDirectory,
};
pub use error::{SeedPeerError, SeedPeerResult};
pub use poll::{cache_and_poll, PollTimings};
