pub mod closeout;
pub mod group_session;
pub mod invitation;
pub mod participant_order;
pub mod tenant;
