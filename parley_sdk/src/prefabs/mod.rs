/// Forwards everything the executor produces over a channel
pub mod channel;
/// Does nothing with events
pub mod empty;
