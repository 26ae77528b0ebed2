use crate::domain::models::group_session::GroupOrderSession;
use crate::domain::models::participant_order::PaymentStatus;

/// How the money for a session's orders is collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMode {
    /// Each participant order is charged on its own when submitted.
    PayIndividually,
    /// Nothing is charged on submission; one aggregate charge hits the sponsor at closeout.
    SponsorPaysAtClose { sponsor_name: String },
}

pub fn resolve_payment_mode(session: &GroupOrderSession) -> PaymentMode {
    if session.is_sponsored_order {
        PaymentMode::SponsorPaysAtClose {
            sponsor_name: session.sponsor_name
                .clone()
                .unwrap_or_else(|| session.organizer_name.clone()),
        }
    } else {
        PaymentMode::PayIndividually
    }
}

impl PaymentMode {
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentMode::PayIndividually => PaymentStatus::Unpaid,
            PaymentMode::SponsorPaysAtClose { .. } => PaymentStatus::SponsoredPending,
        }
    }
}
