use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Storage(#[from] gsb_infra_storage::StorageError),
    #[error(transparent)]
    Client(#[from] gsb_protocol_client::ClientError),
    #[error("sleep cancelled by user request")]
    Cancelled,
}

impl FacadeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FacadeError::Cancelled) || matches!(self, FacadeError::Client(gsb_protocol_client::ClientError::Cancelled))
    }

    /// True for a transport/HTTP failure — the CLI maps this to a
    /// log-warn plus bounded retry (spec §7), everything else terminates.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FacadeError::Client(gsb_protocol_client::ClientError::Transport(_))
        )
    }
}
