use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::ticket_message::{self, Column, Entity};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// A message on a ticket thread. `internal` messages are agent notes
/// not shown to the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub ticket_id: String,
    pub author_type: String,
    pub author_id: Option<String>,
    pub body: String,
    pub internal: bool,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: ticket_message::Model) -> MessageRow {
    MessageRow {
        id: m.id,
        ticket_id: m.ticket_id,
        author_type: m.author_type,
        author_id: m.author_id,
        body: m.body,
        internal: m.internal,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl TicketStore {
    pub async fn insert_message(&self, row: &MessageRow) -> Result<MessageRow> {
        let am = ticket_message::ActiveModel {
            id: Set(row.id.clone()),
            ticket_id: Set(row.ticket_id.clone()),
            author_type: Set(row.author_type.clone()),
            author_id: Set(row.author_id.clone()),
            body: Set(row.body.clone()),
            internal: Set(row.internal),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::TicketMessages, ChangeOp::Insert, &model.id);
        Ok(to_row(model))
    }

    /// Messages on a ticket, oldest first. `include_internal` gates
    /// agent-only notes.
    pub async fn list_messages(
        &self,
        ticket_id: &str,
        include_internal: bool,
    ) -> Result<Vec<MessageRow>> {
        let mut q = Entity::find().filter(Column::TicketId.eq(ticket_id));
        if !include_internal {
            q = q.filter(Column::Internal.eq(false));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_messages(&self, ticket_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::TicketId.eq(ticket_id))
            .count(self.db())
            .await?)
    }
}
