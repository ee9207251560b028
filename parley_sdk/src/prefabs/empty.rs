//! A kernel that performs no additional processing on session events. Useful when the
//! application drives the [`Session`] entirely from outside the kernel, for example when it
//! only places outgoing calls or relies on `auto_accept`.

use crate::prelude::*;

/// Ignores everything the executor hands to it
#[derive(Default, Debug, Copy, Clone)]
pub struct EmptyKernel;

#[async_trait]
impl SessionKernel for EmptyKernel {
    fn load_session(&mut self, _session: Session) -> Result<(), SessionError> {
        Ok(())
    }

    async fn on_start(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn on_message(&self, _message: Message) -> Result<(), SessionError> {
        Ok(())
    }

    async fn on_stop(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
