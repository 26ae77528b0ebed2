use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn, Instrument};

use crate::domain::models::{
    closeout::IndividualChargeRequest,
    group_session::{generate_access_token, hash_token, GroupOrderSession},
    participant_order::{derive_idempotency_key, subtotal_cents, NewParticipantOrder, OrderItem, ParticipantOrder, PaymentStatus},
};
use crate::domain::ports::{ParticipantOrderRepository, PaymentCoordinator};
use crate::domain::services::invitation_service::InvitationTracker;
use crate::domain::services::payment_mode::{resolve_payment_mode, PaymentMode};
use crate::error::AppError;

pub struct SubmitOrderInput {
    pub idempotency_key: Option<String>,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub contact_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub order: ParticipantOrder,
    /// True when the idempotency key matched an order that already existed.
    pub duplicate: bool,
    /// Secret for amending this order. Only the hash is kept, so it is handed out once,
    /// on the call that created the order.
    pub edit_token: Option<String>,
}

/// Credentials presented when amending an order: the participant's own edit token
/// or the session's organizer token.
pub struct AmendCredentials<'a> {
    pub edit_token: Option<&'a str>,
    pub organizer_token: Option<&'a str>,
}

pub struct ParticipantOrderCollector {
    orders: Arc<dyn ParticipantOrderRepository>,
    invitations: Arc<InvitationTracker>,
    payments: Arc<dyn PaymentCoordinator>,
}

impl ParticipantOrderCollector {
    pub fn new(
        orders: Arc<dyn ParticipantOrderRepository>,
        invitations: Arc<InvitationTracker>,
        payments: Arc<dyn PaymentCoordinator>,
    ) -> Self {
        Self { orders, invitations, payments }
    }

    pub async fn submit(&self, session: &GroupOrderSession, input: SubmitOrderInput) -> Result<SubmissionOutcome, AppError> {
        let now = Utc::now();
        if !session.is_open_at(now) {
            return Err(AppError::WindowClosed);
        }

        let participant_name = input.participant_name.trim().to_string();
        let contact_email = input.contact_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        let idempotency_key = input.idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| derive_idempotency_key(&session.id, &participant_name, contact_email.as_deref()));

        if let Some(existing) = self.orders.find_by_idempotency_key(&session.id, &idempotency_key).await? {
            info!(order_id = %existing.id, "Duplicate submission, returning existing order");
            return Ok(SubmissionOutcome { order: existing, duplicate: true, edit_token: None });
        }

        if participant_name.is_empty() {
            return Err(AppError::Validation("Participant name is required".into()));
        }
        validate_items(&input.items)?;

        let mode = resolve_payment_mode(session);
        let edit_token = generate_access_token();
        let order = ParticipantOrder::new(NewParticipantOrder {
            session_id: session.id.clone(),
            tenant_id: session.tenant_id.clone(),
            idempotency_key: idempotency_key.clone(),
            edit_token_hash: hash_token(&edit_token),
            participant_name,
            contact_email,
            contact_id: input.contact_id.filter(|c| !c.trim().is_empty()),
            items: input.items,
            scheduled_pickup_time: input.scheduled_pickup_time,
            payment_status: mode.initial_payment_status(),
        })?;

        let inserted = match self.orders.insert_if_open(&order, Utc::now()).await? {
            Some(inserted) => inserted,
            None => {
                // Either a concurrent retry won the key or the window shut between the check and the write.
                return match self.orders.find_by_idempotency_key(&session.id, &idempotency_key).await? {
                    Some(existing) => Ok(SubmissionOutcome { order: existing, duplicate: true, edit_token: None }),
                    None => Err(AppError::WindowClosed),
                };
            }
        };

        info!(
            session_code = %session.session_code,
            order_id = %inserted.id,
            subtotal_cents = inserted.subtotal_cents,
            payment_status = inserted.payment_status.as_str(),
            "Participant order recorded"
        );

        if let Err(e) = self.invitations
            .mark_ordered_for(&session.id, inserted.contact_id.as_deref(), inserted.contact_email.as_deref())
            .await
        {
            error!("Failed to advance invitation for order {}: {:?}", inserted.id, e);
        }

        if mode == PaymentMode::PayIndividually {
            self.dispatch_individual_charge(session, &inserted);
        }

        Ok(SubmissionOutcome { order: inserted, duplicate: false, edit_token: Some(edit_token) })
    }

    /// The charge runs detached; the submission never waits on the payment gateway.
    fn dispatch_individual_charge(&self, session: &GroupOrderSession, order: &ParticipantOrder) {
        let payments = self.payments.clone();
        let orders = self.orders.clone();
        let request = IndividualChargeRequest {
            tenant_id: session.tenant_id.clone(),
            session_code: session.session_code.clone(),
            participant_order_id: order.id.clone(),
            participant_name: order.participant_name.clone(),
            contact_email: order.contact_email.clone(),
            amount_cents: order.subtotal_cents,
        };
        let span = tracing::info_span!("individual_charge", order_id = %order.id, session_code = %session.session_code);

        tokio::spawn(
            async move {
                match payments.charge_individual(&request).await {
                    Ok(receipt) => match orders.mark_paid(&request.participant_order_id, &receipt.reference, Utc::now()).await {
                        Ok(_) => info!(reference = %receipt.reference, "Individual charge settled"),
                        Err(e) => error!("Charge {} succeeded but order not marked paid: {:?}", receipt.reference, e),
                    },
                    Err(e) => warn!("Individual charge failed, order stays UNPAID: {}", e),
                }
            }
            .instrument(span),
        );
    }

    pub async fn amend(
        &self,
        session: &GroupOrderSession,
        order_id: &str,
        items: Vec<OrderItem>,
        credentials: AmendCredentials<'_>,
    ) -> Result<ParticipantOrder, AppError> {
        let order = self.orders.find_by_id(&session.id, order_id).await?
            .ok_or(AppError::NotFound("Participant order not found".into()))?;

        let owner = credentials.edit_token.is_some_and(|t| order.edit_token_matches(t));
        let organizer = credentials.organizer_token.is_some_and(|t| session.organizer_token_matches(t));
        if !owner && !organizer {
            return Err(AppError::Unauthorized);
        }

        if !session.is_open_at(Utc::now()) {
            return Err(AppError::WindowClosed);
        }
        if !order.payment_status.is_mutable() {
            return Err(AppError::OrderLocked);
        }
        validate_items(&items)?;

        let subtotal = subtotal_cents(&items)?;
        match self.orders.amend_items_if_mutable(order_id, &items, subtotal, Utc::now()).await? {
            Some(amended) => {
                info!(order_id, subtotal_cents = amended.subtotal_cents, "Participant order amended");
                Ok(amended)
            }
            None => {
                let current = self.orders.find_by_id(&session.id, order_id).await?
                    .ok_or(AppError::NotFound("Participant order not found".into()))?;
                if current.payment_status.is_mutable() {
                    Err(AppError::WindowClosed)
                } else {
                    Err(AppError::OrderLocked)
                }
            }
        }
    }

    /// Payment gateway callback for pay-individually orders.
    pub async fn record_payment(&self, session: &GroupOrderSession, order_id: &str, reference: &str) -> Result<ParticipantOrder, AppError> {
        if reference.trim().is_empty() {
            return Err(AppError::Validation("Payment reference is required".into()));
        }

        let order = self.orders.find_by_id(&session.id, order_id).await?
            .ok_or(AppError::NotFound("Participant order not found".into()))?;

        match order.payment_status {
            PaymentStatus::SponsoredPending | PaymentStatus::SponsoredSettled => Err(AppError::OrderLocked),
            PaymentStatus::Paid => paid_or_conflict(order, reference),
            PaymentStatus::Unpaid => match self.orders.mark_paid(order_id, reference, Utc::now()).await? {
                Some(paid) => {
                    info!(order_id, reference, "Individual payment recorded");
                    Ok(paid)
                }
                None => {
                    let current = self.orders.find_by_id(&session.id, order_id).await?
                        .ok_or(AppError::NotFound("Participant order not found".into()))?;
                    paid_or_conflict(current, reference)
                }
            },
        }
    }
}

fn paid_or_conflict(order: ParticipantOrder, reference: &str) -> Result<ParticipantOrder, AppError> {
    if order.payment_reference.as_deref() == Some(reference) {
        Ok(order)
    } else {
        Err(AppError::Conflict("Order already paid under a different reference".into()))
    }
}

pub fn validate_items(items: &[OrderItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".into()));
    }
    for item in items {
        if item.menu_item_id.trim().is_empty() {
            return Err(AppError::Validation("Every item needs a menuItemId".into()));
        }
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!("Quantity for {} must be positive", item.name)));
        }
        if item.unit_price_cents < 0 {
            return Err(AppError::Validation(format!("Price for {} cannot be negative", item.name)));
        }
    }
    Ok(())
}
