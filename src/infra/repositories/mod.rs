pub mod sqlite_tenant_repo;
pub mod sqlite_group_session_repo;
pub mod sqlite_invitation_repo;
pub mod sqlite_participant_order_repo;

pub mod postgres_tenant_repo;
pub mod postgres_group_session_repo;
pub mod postgres_invitation_repo;
pub mod postgres_participant_order_repo;
