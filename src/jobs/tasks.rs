/// Background task implementations
use crate::{
    context::AppContext,
    did::{DidStatus, RegistryStats},
    error::RegistryResult,
    metrics,
};

/// Refresh the per-status gauge from storage
pub async fn refresh_status_counts(ctx: &AppContext) -> RegistryResult<RegistryStats> {
    let stats = ctx.registry.stats().await?;

    for status in DidStatus::ALL {
        let count = stats.breakdown.get(&status).copied().unwrap_or(0);
        metrics::set_dids_by_status(status.as_str(), count);
    }

    Ok(stats)
}

/// Health check - verify storage is reachable
pub async fn health_check(ctx: &AppContext) -> RegistryResult<()> {
    // Check database connectivity
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    // All checks passed
    Ok(())
}
