pub mod agent;
pub mod customer;
pub mod escalation_event;
pub mod notification_channel;
pub mod notification_log;
pub mod notification_recipient;
pub mod sla_tracking;
pub mod ticket;
pub mod ticket_message;
