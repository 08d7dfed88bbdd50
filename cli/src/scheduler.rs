//! Recurring distribution and quota checks for `kudosd serve`

use kudos_ledger::Ledger;
use tokio::time::{interval, MissedTickBehavior};

/// Run until ctrl-c. Distribution is idempotent per cycle, so a tick that
/// lands in an already-granted cycle only skips.
pub async fn run(ledger: Ledger) -> anyhow::Result<()> {
    let config = ledger.config().clone();
    let mut distribution = interval(config.distribution_interval());
    let mut quota_check = interval(config.quota_check_interval());
    distribution.set_missed_tick_behavior(MissedTickBehavior::Delay);
    quota_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        distribution_secs = config.distribution_interval_secs,
        quota_check_secs = config.quota_check_interval_secs,
        "scheduler started"
    );

    loop {
        tokio::select! {
            _ = distribution.tick() => {
                let distributor = ledger.distributor();
                // Batches commit on the blocking pool, so ctrl-c is still seen
                // mid-run. Committed batches keep their markers.
                let outcome = tokio::select! {
                    outcome = distributor.distribute() => outcome,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::warn!("stopping during distribution; the next run resumes the cycle");
                        break;
                    }
                };
                match outcome {
                    Ok(report) if report.is_complete() => {}
                    Ok(report) => tracing::error!(
                        cycle = %report.cycle,
                        failed = report.failed_batches.len(),
                        "distribution finished with failed batches; next tick retries them"
                    ),
                    Err(e) => tracing::error!(error = %e, "distribution run failed"),
                }
            }
            _ = quota_check.tick() => {
                let quotas = ledger.quotas();
                match tokio::task::spawn_blocking(move || quotas.reset_all_quotas()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "quota reset failed"),
                    Err(e) => tracing::error!(error = %e, "quota reset task panicked"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "ctrl-c handler failed; stopping");
                }
                break;
            }
        }
    }

    ledger.db().flush()?;
    tracing::info!("scheduler stopped");
    Ok(())
}
