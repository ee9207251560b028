/// Collects the configuration and collaborators of a session
pub mod session_builder;
