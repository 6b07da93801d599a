//! Entity records carried in gateway payloads and held in the client cache
//!
//! Records reference each other by snowflake id only; the cache joins them
//! at read time so every view of a user observes the latest record.

mod channel;
mod guild;
mod member;
mod presence;
mod role;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelType};
pub use guild::GuildData;
pub use member::{Member, MemberData};
pub use presence::{PartialUser, Presence, PresenceStatus, PresenceUpdate};
pub use role::Role;
pub use user::User;
pub use voice_state::VoiceState;
