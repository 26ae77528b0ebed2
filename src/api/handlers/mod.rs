pub mod group_order;
pub mod health;
pub mod invitation;
pub mod participant_order;
pub mod tenant;
