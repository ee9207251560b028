//! Wire-level types shared by every parley crate: addresses, resource demands, session
//! descriptions, ICE candidates and the signaling [`Message`](message::Message) envelope.

pub mod prelude {
    pub use crate::demand::*;
    pub use crate::media::*;
    pub use crate::message::*;
    pub use crate::user::*;
}

pub mod demand;
pub mod errors;
pub mod media;
pub mod message;
pub mod user;
