//! Data models for tracked game entities.
//!
//! - `Tag`: normalized, validated entity key
//! - `ScopeId`, `MemberId`: chat server and member identifiers
//! - `PlayerProfile`: Clash Royale player profile schema
//! - `BandProfile`: Brawl Stars band schema

pub mod band;
pub mod player;
pub mod scope;
pub mod tag;

pub use band::{BandMember, BandProfile};
pub use player::PlayerProfile;
pub use scope::{MemberId, ScopeId};
pub use tag::{Tag, TagError, TAG_CHARACTERS};
