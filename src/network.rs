//! Field network configuration seam.
//!
//! Loading a match re-keys the field access point and switch for the six
//! incoming teams. The hardware conversation is vendor-specific, so the arena
//! talks to it through a trait; match flow is never gated on the outcome.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use crate::models::Team;

/// Connect budget for a device conversation.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Execution budget for a device conversation once connected.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

/// Pushes per-team credentials to the field network hardware.
pub trait NetworkConfigurator: Send + Sync {
    /// Reconfigure the field network for the given station assignments.
    ///
    /// Implementations must bound their device conversations by
    /// [`CONNECT_TIMEOUT`] and [`COMMAND_TIMEOUT`] and return an error on
    /// expiry; the arena logs failures and carries on.
    fn configure_team_wifi(
        &self,
        teams: [Option<Team>; 6],
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Configurator for fields with no managed network hardware.
#[derive(Debug, Default, Clone)]
pub struct NoopNetworkConfigurator;

impl NetworkConfigurator for NoopNetworkConfigurator {
    fn configure_team_wifi(
        &self,
        teams: [Option<Team>; 6],
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            let team_ids: Vec<u32> = teams.iter().flatten().map(|team| team.id).collect();
            debug!(?team_ids, "no network hardware configured; skipping wifi setup");
            Ok(())
        })
    }
}
