use tokio::sync::broadcast;

/// Tables whose mutations are announced on the change bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTable {
    Tickets,
    TicketMessages,
    SlaTracking,
    Agents,
    Customers,
    NotificationChannels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A row-level change announcement. Replaces the hosted change-feed
/// subscription the original client relied on: consumers subscribe and
/// refetch rather than patching local state from the event payload.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub row_id: String,
}

/// Broadcast fan-out for [`ChangeEvent`]s. Slow subscribers may observe
/// `Lagged` and should treat it as "something changed" and refetch.
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change. A send error only means nobody is listening.
    pub fn publish(&self, table: ChangeTable, op: ChangeOp, row_id: &str) {
        let _ = self.sender.send(ChangeEvent {
            table,
            op,
            row_id: row_id.to_string(),
        });
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(256)
    }
}
