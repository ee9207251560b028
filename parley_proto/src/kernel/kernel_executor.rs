use crate::error::SessionError;
use crate::kernel::kernel_trait::SessionKernel;
use crate::kernel::SessionExecutorArguments;
use crate::proto::codec_broker::CodecCache;
use crate::proto::directory::IdentityDirectory;
use crate::proto::event_processor::process_inbound;
use crate::proto::events::{inbox, InboundEvent, SessionNotification};
use crate::proto::session::{Session, SessionParts};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Drives a [`Session`] and delivers what it produces to a [`SessionKernel`]
pub struct SessionExecutor<K: SessionKernel> {
    session: Session,
    inbound_rx: Option<UnboundedReceiver<InboundEvent>>,
    kernel_rx: Option<UnboundedReceiver<SessionNotification>>,
    kernel: K,
}

impl<K: SessionKernel> SessionExecutor<K> {
    pub fn new(args: SessionExecutorArguments<K>) -> Result<Self, SessionError> {
        let SessionExecutorArguments::<K> {
            config,
            resolver,
            transport,
            media,
            stubs,
            codecs,
            kernel,
        } = args;

        if config.ice_servers.is_empty() {
            return Err(SessionError::InvalidArgument("no ICE servers configured"));
        }

        let (inbound_tx, inbound_rx) = inbox();
        let (kernel_tx, kernel_rx) = unbounded_channel();
        let directory = IdentityDirectory::new(
            config.directory.clone(),
            resolver,
            Arc::new(stubs),
            config.request_timeout,
        );

        let session = Session::new(SessionParts {
            config,
            directory,
            codecs: Arc::new(CodecCache::new(codecs)),
            transport,
            media,
            inbound_tx,
            kernel_tx,
        });

        Ok(Self {
            session,
            inbound_rx: Some(inbound_rx),
            kernel_rx: Some(kernel_rx),
            kernel,
        })
    }

    /// A handle to the session this executor drives
    pub fn session(&self) -> Session {
        self.session.clone()
    }

    /// Runs until [`Session::shutdown`] is called or the kernel returns an error. Returns the
    /// kernel afterwards
    pub async fn execute(mut self) -> Result<K, SessionError> {
        let mut kernel = self.kernel;
        let inbound_rx = self
            .inbound_rx
            .take()
            .ok_or_else(|| SessionError::msg("executor already ran"))?;
        let kernel_rx = self
            .kernel_rx
            .take()
            .ok_or_else(|| SessionError::msg("executor already ran"))?;

        log::trace!(target: "parley", "SessionExecutor::execute is now executing ...");
        let ret = Self::kernel_inner_loop(&mut kernel, self.session, inbound_rx, kernel_rx).await;
        log::trace!(target: "parley", "SessionExecutor::execute has finished execution");
        ret.map(|_| kernel)
    }

    async fn kernel_inner_loop(
        kernel: &mut K,
        session: Session,
        mut inbound_rx: UnboundedReceiver<InboundEvent>,
        mut kernel_rx: UnboundedReceiver<SessionNotification>,
    ) -> Result<(), SessionError> {
        kernel.load_session(session.clone())?;
        let kernel_ref = &*kernel;
        let session = &session;

        let init = async move { kernel_ref.on_start().await };

        let event_loop = async move {
            loop {
                tokio::select! {
                    biased;

                    Some(notification) = kernel_rx.recv() => {
                        deliver(kernel_ref, notification).await?;
                    }

                    event = inbound_rx.recv() => match event {
                        None | Some(InboundEvent::Shutdown) => {
                            log::trace!(target: "parley", "Session executor received shutdown signal");
                            break;
                        }

                        Some(event) => process_inbound(session, event).await,
                    }
                }
            }

            while let Ok(notification) = kernel_rx.try_recv() {
                deliver(kernel_ref, notification).await?;
            }

            Ok::<_, SessionError>(())
        };

        let exec_res = futures::future::try_join(init, event_loop)
            .await
            .map(|_| ());

        log::trace!(target: "parley", "Calling kernel on_stop");
        let stop_res = kernel.on_stop().await;
        // give precedence to the execution res
        exec_res.and(stop_res)
    }
}

async fn deliver<K: SessionKernel>(
    kernel: &K,
    notification: SessionNotification,
) -> Result<(), SessionError> {
    let res = match notification {
        SessionNotification::Message(message) => kernel.on_message(message).await,
        SessionNotification::Transport(conversation_id, event) => {
            kernel.on_transport_event(conversation_id, event).await
        }
        SessionNotification::DataChannel(conversation_id, event) => {
            kernel.on_data_channel_event(conversation_id, event).await
        }
        SessionNotification::Error(conversation_id, error) => {
            kernel.on_error(conversation_id, error).await
        }
    };

    if let Err(err) = &res {
        log::error!(target: "parley", "Kernel threw an error: {err:?}. Will end");
    }

    res
}
