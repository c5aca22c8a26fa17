use {
    anyhow::{Result, bail},
    clap::Subcommand,
};

use {
    homegate_common::StreamState,
    homegate_config::HomegateConfig,
    homegate_npm::{ApplyOutcome, NpmClient, StreamControl},
};

#[derive(Subcommand)]
pub enum StreamAction {
    /// Enable the stream once. No auto-revert is scheduled.
    Enable,
    /// Disable the stream once.
    Disable,
}

impl StreamAction {
    fn desired(&self) -> StreamState {
        match self {
            Self::Enable => StreamState::Enabled,
            Self::Disable => StreamState::Disabled,
        }
    }
}

/// Apply one state change straight through the proxy manager, bypassing the
/// gateway. A running gateway does not learn about it.
pub async fn handle_stream(action: StreamAction, config: &HomegateConfig) -> Result<()> {
    let desired = action.desired();
    let client = NpmClient::new(&config.proxy)?;
    match client.apply_status(desired).await {
        ApplyOutcome::Applied => println!("Stream {desired}."),
        ApplyOutcome::AlreadyEnabled | ApplyOutcome::AlreadyDisabled => {
            println!("Stream was already {desired}.");
        },
        ApplyOutcome::Failed(e) => bail!("could not set stream {desired}: {e}"),
    }
    Ok(())
}
