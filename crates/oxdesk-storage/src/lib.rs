//! Persistence layer for tickets, SLA tracking, and notification
//! configuration.
//!
//! [`store::TicketStore`] is the single repository over the management
//! database (SeaORM, SQLite or PostgreSQL via the connection URL). Every
//! mutation publishes a [`events::ChangeEvent`] on the store's broadcast
//! bus so caches and schedulers can invalidate instead of polling.

pub mod entities;
pub mod events;
pub mod store;


pub use events::{ChangeBus, ChangeEvent, ChangeOp, ChangeTable};
pub use store::TicketStore;
pub use store::{
    AgentRow, ChannelFilter, ChannelRow, ChannelUpdate, CustomerRow, EscalationEventRow,
    MessageRow, NotificationLogFilter, NotificationLogRow, RecipientRow, SlaFilter, SlaRow,
    TicketFilter, TicketRow, TicketStats, TicketUpdate,
};
