use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn, info_span, Instrument};
use crate::domain::models::closeout::CloseTrigger;
use crate::state::AppState;

pub async fn start_expiry_sweeper(state: Arc<AppState>) {
    info!("Starting expiry sweeper (every {}s)...", state.config.sweep_interval_secs);

    loop {
        sweep_expired_sessions(&state).await;
        sleep(Duration::from_secs(state.config.sweep_interval_secs)).await;
    }
}

/// One sweep tick. Returns how many sessions this tick moved to EXPIRED.
pub async fn sweep_expired_sessions(state: &AppState) -> usize {
    let due = match state.session_repo.find_due_for_expiry(Utc::now(), state.config.sweep_batch_size).await {
        Ok(due) => due,
        Err(e) => {
            error!("Failed to fetch sessions due for expiry: {:?}", e);
            return 0;
        }
    };

    let mut expired = 0;
    for session in due {
        let span = info_span!(
            "expiry_sweep",
            session_code = %session.session_code,
            tenant_id = %session.tenant_id
        );

        async {
            match state.closeout.close(&session, CloseTrigger::ExpirySweep).await {
                Ok(outcome) => match outcome.report {
                    Some(report) => {
                        expired += 1;
                        if report.is_clean() {
                            info!(orders = report.order_count, tickets = report.tickets_emitted, "Session expired and closed out");
                        } else {
                            warn!(failures = ?report.failures, "Session expired, closeout needs follow-up");
                        }
                    }
                    None => info!("Session already closed by another actor"),
                },
                Err(e) => error!("Expiry closeout failed: {:?}", e),
            }
        }
            .instrument(span)
            .await;
    }

    expired
}
