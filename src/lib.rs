//! Bridges Minecraft: Bedrock Edition clients to Minecraft: Java Edition
//! servers.
//!
//! Each accepted Bedrock connection gets a session which opens its own
//! connection to the Java server and translates in both directions:
//! Bedrock client => this bridge => Java server.
//!
//! # Session lifecycle
//! A client first negotiates compression, then logs in with a signed
//! identity chain. Once the chain is verified the bridge enables encryption,
//! offers its resource packs and connects to the Java server as that player.
//! Java login and configuration run entirely inside the bridge; when the
//! server starts the play phase the client is sent its world, and it
//! spawns once the server places the player for the first time.
//!
//! # Mirrors
//! The bridge keeps a mirror of everything the client needs but the Java
//! protocol expresses differently: entity ids, chunk columns, open windows
//! and the player's own position. Translators in [`translate`] read and
//! update the mirrors and queue packets for either side.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod entity_id;
pub mod error;
pub mod inventory;
pub mod listener;
pub mod persistence;
pub mod position;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod translate;
pub mod world;
