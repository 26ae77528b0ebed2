use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::domain::models::{
    closeout::{AggregateChargeRequest, CloseTrigger, CloseoutFailure, CloseoutReport, FulfillmentTicket, SponsorCharge},
    group_session::{GroupOrderSession, SessionStatus, SettlementStatus},
    participant_order::{ParticipantOrder, PaymentStatus},
};
use crate::domain::ports::{FulfillmentService, GroupSessionRepository, ParticipantOrderRepository, PaymentCoordinator};
use crate::domain::services::payment_mode::{resolve_payment_mode, PaymentMode};
use crate::error::AppError;

/// Result of a close attempt. `report` is only present for the caller that
/// actually performed the terminal transition.
#[derive(Debug)]
pub struct CloseOutcome {
    pub session: GroupOrderSession,
    pub report: Option<CloseoutReport>,
}

pub struct CloseoutAggregator {
    sessions: Arc<dyn GroupSessionRepository>,
    orders: Arc<dyn ParticipantOrderRepository>,
    payments: Arc<dyn PaymentCoordinator>,
    fulfillment: Arc<dyn FulfillmentService>,
}

impl CloseoutAggregator {
    pub fn new(
        sessions: Arc<dyn GroupSessionRepository>,
        orders: Arc<dyn ParticipantOrderRepository>,
        payments: Arc<dyn PaymentCoordinator>,
        fulfillment: Arc<dyn FulfillmentService>,
    ) -> Self {
        Self { sessions, orders, payments, fulfillment }
    }

    /// Ends the ordering window and, if this call won the transition, settles and
    /// dispatches every participant order. Losing the race is not an error.
    pub async fn close(&self, session: &GroupOrderSession, trigger: CloseTrigger) -> Result<CloseOutcome, AppError> {
        let now = Utc::now();
        let transitioned = match trigger {
            CloseTrigger::Organizer => self.sessions.close_if_open(&session.id, now).await?,
            CloseTrigger::ExpirySweep => self.sessions.expire_if_due(&session.id, now).await?,
        };

        if let Some(closed) = transitioned {
            info!(
                session_code = %closed.session_code,
                status = %closed.status,
                trigger = ?trigger,
                "Session window closed"
            );
            let report = self.aggregate(&closed, trigger, now).await?;
            let closed = match self.sessions.find_by_id(&closed.id).await {
                Ok(Some(reloaded)) => reloaded,
                Ok(None) => closed,
                Err(e) => {
                    warn!(session_code = %closed.session_code, "Could not reload session after closeout: {:?}", e);
                    closed
                }
            };
            return Ok(CloseOutcome { session: closed, report: Some(report) });
        }

        let current = self.sessions.find_by_id(&session.id).await?
            .ok_or(AppError::NotFound("Group order not found".into()))?;

        match (trigger, current.status) {
            (CloseTrigger::Organizer, SessionStatus::Cancelled) => Err(AppError::AlreadyTerminal(SessionStatus::Cancelled)),
            (CloseTrigger::Organizer, SessionStatus::Open) => {
                error!("close_if_open reported no transition for an OPEN session {}", current.session_code);
                Err(AppError::Internal)
            }
            _ => {
                info!(session_code = %current.session_code, status = %current.status, "Close skipped, session already terminal");
                Ok(CloseOutcome { session: current.observed_at(now), report: None })
            }
        }
    }

    async fn aggregate(&self, session: &GroupOrderSession, trigger: CloseTrigger, now: DateTime<Utc>) -> Result<CloseoutReport, AppError> {
        // No submission can land after the transition, so this read is final.
        let mut orders = self.orders.list_by_session(&session.id).await?;
        let mut failures = Vec::new();

        let sponsor_charge = match resolve_payment_mode(session) {
            PaymentMode::SponsorPaysAtClose { sponsor_name } => {
                self.settle_sponsor(session, &sponsor_name, &mut orders, &mut failures, now).await
            }
            PaymentMode::PayIndividually => None,
        };

        let mut tickets_emitted = 0;
        for order in &orders {
            let ticket = build_ticket(session, order);
            match self.fulfillment.submit_ticket(&ticket).await {
                Ok(receipt) => {
                    tickets_emitted += 1;
                    if let Err(e) = self.orders.record_ticket(&order.id, &receipt.ticket_id, now).await {
                        error!("Ticket {} emitted but not recorded for order {}: {:?}", receipt.ticket_id, order.id, e);
                    }
                }
                Err(e) => {
                    warn!(order_id = %order.id, "Fulfillment ticket failed: {}", e);
                    failures.push(CloseoutFailure::FulfillmentEmissionFailed {
                        participant_order_id: order.id.clone(),
                        participant_name: order.participant_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.sessions.mark_closeout_completed(&session.id, Utc::now()).await {
            error!(session_code = %session.session_code, "Closeout ran but completion not recorded: {:?}", e);
        }

        let report = CloseoutReport {
            session_code: session.session_code.clone(),
            status: session.status,
            trigger,
            order_count: orders.len(),
            sponsor_charge,
            tickets_emitted,
            failures,
        };

        if report.is_clean() {
            info!(session_code = %report.session_code, orders = report.order_count, "Closeout completed");
        } else {
            warn!(session_code = %report.session_code, failures = report.failures.len(), "Closeout completed with failures");
        }

        Ok(report)
    }

    async fn settle_sponsor(
        &self,
        session: &GroupOrderSession,
        sponsor_name: &str,
        orders: &mut [ParticipantOrder],
        failures: &mut Vec<CloseoutFailure>,
        now: DateTime<Utc>,
    ) -> Option<SponsorCharge> {
        let pending: Vec<&ParticipantOrder> = orders.iter()
            .filter(|o| o.payment_status == PaymentStatus::SponsoredPending)
            .collect();

        if pending.is_empty() {
            if let Err(e) = self.sessions.record_settlement(&session.id, SettlementStatus::NotRequired, None, None, None).await {
                error!(session_code = %session.session_code, "Failed to record NOT_REQUIRED settlement: {:?}", e);
            }
            return None;
        }

        let total_cents: i64 = pending.iter().map(|o| o.subtotal_cents).sum();
        let order_ids: Vec<String> = pending.iter().map(|o| o.id.clone()).collect();

        let request = AggregateChargeRequest {
            tenant_id: session.tenant_id.clone(),
            session_code: session.session_code.clone(),
            sponsor_name: sponsor_name.to_string(),
            total_cents,
            reference_order_ids: order_ids.clone(),
        };

        let receipt = match self.payments.charge_aggregate(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(session_code = %session.session_code, total_cents, "Sponsor charge failed: {}", e);
                let reason = e.to_string();
                if let Err(e) = self.sessions
                    .record_settlement(&session.id, SettlementStatus::Failed, None, Some(reason.clone()), None)
                    .await
                {
                    error!(session_code = %session.session_code, "Failed to record FAILED settlement: {:?}", e);
                }
                failures.push(CloseoutFailure::PaymentAggregationFailed { total_cents, reason });
                return None;
            }
        };

        // The sponsor has been charged from here on. Bookkeeping errors are reported, never raised,
        // so the tickets below still go out.
        match self.orders.mark_sponsored_settled(&session.id, &order_ids, &receipt.reference, now).await {
            Ok(settled) if settled != order_ids.len() as u64 => {
                warn!("Sponsor charge {} covered {} orders but settled {}", receipt.reference, order_ids.len(), settled);
            }
            Ok(_) => {}
            Err(e) => {
                error!(reference = %receipt.reference, "Sponsor charged but orders not marked settled: {:?}", e);
                failures.push(CloseoutFailure::SettlementRecordFailed {
                    reference: receipt.reference.clone(),
                    reason: e.to_string(),
                });
            }
        }
        if let Err(e) = self.sessions
            .record_settlement(&session.id, SettlementStatus::Settled, Some(receipt.reference.clone()), None, Some(now))
            .await
        {
            error!(reference = %receipt.reference, "Sponsor charged but session settlement not recorded: {:?}", e);
            failures.push(CloseoutFailure::SettlementRecordFailed {
                reference: receipt.reference.clone(),
                reason: e.to_string(),
            });
        }

        for order in orders.iter_mut().filter(|o| order_ids.contains(&o.id)) {
            order.payment_status = PaymentStatus::SponsoredSettled;
            order.payment_reference = Some(receipt.reference.clone());
            order.settled_at = Some(now);
        }

        info!(session_code = %session.session_code, total_cents, reference = %receipt.reference, "Sponsor charged");

        Some(SponsorCharge {
            sponsor_name: sponsor_name.to_string(),
            total_cents,
            order_ids,
            reference: receipt.reference,
        })
    }
}

fn build_ticket(session: &GroupOrderSession, order: &ParticipantOrder) -> FulfillmentTicket {
    FulfillmentTicket {
        tenant_id: session.tenant_id.clone(),
        session_code: session.session_code.clone(),
        participant_order_id: order.id.clone(),
        participant_name: order.participant_name.clone(),
        fulfillment_method: session.fulfillment_method,
        delivery_address: session.delivery_address.clone(),
        scheduled_pickup_time: order.scheduled_pickup_time.or(session.scheduled_pickup_time),
        items: order.items.0.clone(),
        subtotal_cents: order.subtotal_cents,
        prepaid: matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::SponsoredSettled),
    }
}
