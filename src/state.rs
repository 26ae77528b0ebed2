use std::sync::Arc;
use crate::domain::ports::{
    FulfillmentService, GroupSessionRepository, InvitationRepository, ParticipantOrderRepository,
    PaymentCoordinator, TenantRepository,
};
use crate::domain::services::{
    closeout::CloseoutAggregator,
    invitation_service::InvitationTracker,
    order_collector::ParticipantOrderCollector,
    session_service::{GroupSessionService, WindowBounds},
};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tenant_repo: Arc<dyn TenantRepository>,
    pub session_repo: Arc<dyn GroupSessionRepository>,
    pub invitation_repo: Arc<dyn InvitationRepository>,
    pub order_repo: Arc<dyn ParticipantOrderRepository>,
    pub payment_coordinator: Arc<dyn PaymentCoordinator>,
    pub fulfillment_service: Arc<dyn FulfillmentService>,
    pub session_service: Arc<GroupSessionService>,
    pub invitation_tracker: Arc<InvitationTracker>,
    pub order_collector: Arc<ParticipantOrderCollector>,
    pub closeout: Arc<CloseoutAggregator>,
}

impl AppState {
    /// Wires the domain services on top of the given adapters.
    pub fn new(
        config: Config,
        tenant_repo: Arc<dyn TenantRepository>,
        session_repo: Arc<dyn GroupSessionRepository>,
        invitation_repo: Arc<dyn InvitationRepository>,
        order_repo: Arc<dyn ParticipantOrderRepository>,
        payment_coordinator: Arc<dyn PaymentCoordinator>,
        fulfillment_service: Arc<dyn FulfillmentService>,
    ) -> Self {
        let invitation_tracker = Arc::new(InvitationTracker::new(invitation_repo.clone()));
        let closeout = Arc::new(CloseoutAggregator::new(
            session_repo.clone(),
            order_repo.clone(),
            payment_coordinator.clone(),
            fulfillment_service.clone(),
        ));
        let order_collector = Arc::new(ParticipantOrderCollector::new(
            order_repo.clone(),
            invitation_tracker.clone(),
            payment_coordinator.clone(),
        ));
        let session_service = Arc::new(GroupSessionService::new(
            session_repo.clone(),
            order_repo.clone(),
            invitation_tracker.clone(),
            closeout.clone(),
            WindowBounds { min_hours: config.min_window_hours, max_hours: config.max_window_hours },
            config.session_code_attempts,
        ));

        Self {
            config,
            tenant_repo,
            session_repo,
            invitation_repo,
            order_repo,
            payment_coordinator,
            fulfillment_service,
            session_service,
            invitation_tracker,
            order_collector,
            closeout,
        }
    }

    /// Replaces the session service, keeping every other collaborator.
    pub fn with_session_service(mut self, session_service: GroupSessionService) -> Self {
        self.session_service = Arc::new(session_service);
        self
    }
}
