use anyhow::Result;
use chrono::{DateTime, Utc};
use oxdesk_common::types::{Priority, TicketSnapshot, TicketStatus};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::ticket::{self, Column, Entity};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// Ticket data row (from the `tickets` table). Priority and status stay
/// stringly typed at the storage boundary, like every other row type here;
/// callers parse them into domain enums at the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRow {
    pub id: String,
    pub ticket_number: String,
    pub subject: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: String,
    pub status: String,
    pub customer_id: Option<String>,
    pub agent_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TicketRow {
    /// Reduce to the view the queue estimator consumes. Unparseable
    /// priority/status fall back to medium/open rather than failing.
    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            id: self.id.clone(),
            priority: self.priority.parse().unwrap_or(Priority::Medium),
            status: self.status.parse().unwrap_or(TicketStatus::Open),
            created_at: self.created_at,
        }
    }
}

/// Partial update for a ticket; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub agent_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Ticket list filter.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status_eq: Option<String>,
    pub priority_eq: Option<String>,
    pub category_eq: Option<String>,
    pub agent_id_eq: Option<String>,
    pub customer_id_eq: Option<String>,
    /// Matches subject, description, or ticket number.
    pub search: Option<String>,
}

/// Dashboard counters over the tickets table.
#[derive(Debug, Clone, Serialize)]
pub struct TicketStats {
    pub total: u64,
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub closed: u64,
    pub by_priority: Vec<(String, u64)>,
}

fn to_row(m: ticket::Model) -> TicketRow {
    TicketRow {
        id: m.id,
        ticket_number: m.ticket_number,
        subject: m.subject,
        description: m.description,
        category: m.category,
        priority: m.priority,
        status: m.status,
        customer_id: m.customer_id,
        agent_id: m.agent_id,
        tags: serde_json::from_str(&m.tags_json).unwrap_or_default(),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        closed_at: m.closed_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &TicketFilter,
) -> sea_orm::Select<Entity> {
    if let Some(status) = &filter.status_eq {
        q = q.filter(Column::Status.eq(status.as_str()));
    }
    if let Some(priority) = &filter.priority_eq {
        q = q.filter(Column::Priority.eq(priority.as_str()));
    }
    if let Some(category) = &filter.category_eq {
        q = q.filter(Column::Category.eq(category.as_str()));
    }
    if let Some(agent_id) = &filter.agent_id_eq {
        q = q.filter(Column::AgentId.eq(agent_id.as_str()));
    }
    if let Some(customer_id) = &filter.customer_id_eq {
        q = q.filter(Column::CustomerId.eq(customer_id.as_str()));
    }
    if let Some(search) = &filter.search {
        q = q.filter(
            Condition::any()
                .add(Column::Subject.contains(search.as_str()))
                .add(Column::Description.contains(search.as_str()))
                .add(Column::TicketNumber.contains(search.as_str())),
        );
    }
    q
}

impl TicketStore {
    pub async fn insert_ticket(&self, row: &TicketRow) -> Result<TicketRow> {
        let now = Utc::now().fixed_offset();
        let am = ticket::ActiveModel {
            id: Set(row.id.clone()),
            ticket_number: Set(row.ticket_number.clone()),
            subject: Set(row.subject.clone()),
            description: Set(row.description.clone()),
            category: Set(row.category.clone()),
            priority: Set(row.priority.clone()),
            status: Set(row.status.clone()),
            customer_id: Set(row.customer_id.clone()),
            agent_id: Set(row.agent_id.clone()),
            tags_json: Set(serde_json::to_string(&row.tags)?),
            created_at: Set(now),
            updated_at: Set(now),
            resolved_at: Set(None),
            closed_at: Set(None),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::Tickets, ChangeOp::Insert, &model.id);
        Ok(to_row(model))
    }

    pub async fn get_ticket(&self, id: &str) -> Result<Option<TicketRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn get_ticket_by_number(&self, number: &str) -> Result<Option<TicketRow>> {
        let model = Entity::find()
            .filter(Column::TicketNumber.eq(number))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_tickets(
        &self,
        filter: &TicketFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TicketRow>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_tickets(&self, filter: &TicketFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    pub async fn update_ticket(
        &self,
        id: &str,
        update: &TicketUpdate,
    ) -> Result<Option<TicketRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let now = Utc::now().fixed_offset();
        let mut am: ticket::ActiveModel = m.into();
        if let Some(subject) = &update.subject {
            am.subject = Set(subject.clone());
        }
        if let Some(description) = &update.description {
            am.description = Set(Some(description.clone()));
        }
        if let Some(category) = &update.category {
            am.category = Set(Some(category.clone()));
        }
        if let Some(priority) = &update.priority {
            am.priority = Set(priority.clone());
        }
        if let Some(agent_id) = &update.agent_id {
            am.agent_id = Set(Some(agent_id.clone()));
        }
        if let Some(tags) = &update.tags {
            am.tags_json = Set(serde_json::to_string(tags)?);
        }
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::Tickets, ChangeOp::Update, id);
        Ok(Some(to_row(updated)))
    }

    /// Set a ticket's status, maintaining `resolved_at`/`closed_at`.
    /// Reopening clears both timestamps.
    pub async fn set_ticket_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<Option<TicketRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let now = Utc::now().fixed_offset();
        let mut am: ticket::ActiveModel = m.into();
        am.status = Set(status.to_string());
        match status {
            TicketStatus::Resolved => {
                am.resolved_at = Set(Some(now));
            }
            TicketStatus::Closed => {
                am.closed_at = Set(Some(now));
            }
            TicketStatus::Open => {
                am.resolved_at = Set(None);
                am.closed_at = Set(None);
            }
            TicketStatus::InProgress => {}
        }
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::Tickets, ChangeOp::Update, id);
        Ok(Some(to_row(updated)))
    }

    pub async fn assign_ticket(&self, id: &str, agent_id: &str) -> Result<Option<TicketRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let now = Utc::now().fixed_offset();
        let mut am: ticket::ActiveModel = m.into();
        am.agent_id = Set(Some(agent_id.to_string()));
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::Tickets, ChangeOp::Update, id);
        Ok(Some(to_row(updated)))
    }

    pub async fn delete_ticket(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        let deleted = res.rows_affected > 0;
        if deleted {
            self.events
                .publish(ChangeTable::Tickets, ChangeOp::Delete, id);
        }
        Ok(deleted)
    }

    /// Next sequential ticket number, e.g. `TKT-000042`.
    ///
    /// Allocates past the highest number ever issued, so deleting a ticket
    /// never frees its number for reuse. Zero padding keeps the lexical
    /// order of `ticket_number` aligned with the numeric order.
    pub async fn next_ticket_number(&self) -> Result<String> {
        let latest = Entity::find()
            .order_by(Column::TicketNumber, Order::Desc)
            .one(self.db())
            .await?;
        let next = latest
            .and_then(|m| {
                m.ticket_number
                    .rsplit('-')
                    .next()
                    .and_then(|n| n.parse::<u64>().ok())
            })
            .map_or(1, |n| n + 1);
        Ok(format!("TKT-{:06}", next))
    }

    /// Snapshot of every open/in-progress ticket, for the queue estimator.
    pub async fn list_unresolved_snapshots(&self) -> Result<Vec<TicketSnapshot>> {
        let rows = Entity::find()
            .filter(
                Condition::any()
                    .add(Column::Status.eq("open"))
                    .add(Column::Status.eq("in_progress")),
            )
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| to_row(m).snapshot()).collect())
    }

    /// Resolution durations in hours for the most recently resolved
    /// tickets, newest first.
    pub async fn recent_resolution_hours(&self, limit: usize) -> Result<Vec<f64>> {
        let rows = Entity::find()
            .filter(Column::ResolvedAt.is_not_null())
            .order_by(Column::ResolvedAt, Order::Desc)
            .limit(limit as u64)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|m| {
                let resolved = m.resolved_at?;
                let secs = (resolved.with_timezone(&Utc) - m.created_at.with_timezone(&Utc))
                    .num_seconds();
                Some(secs as f64 / 3600.0)
            })
            .collect())
    }

    pub async fn ticket_stats(&self) -> Result<TicketStats> {
        let total = Entity::find().count(self.db()).await?;
        let mut by_status = [0u64; 4];
        for (i, status) in ["open", "in_progress", "resolved", "closed"]
            .iter()
            .enumerate()
        {
            by_status[i] = Entity::find()
                .filter(Column::Status.eq(*status))
                .count(self.db())
                .await?;
        }
        let mut by_priority = Vec::new();
        for priority in ["urgent", "high", "medium", "low"] {
            let count = Entity::find()
                .filter(Column::Priority.eq(priority))
                .count(self.db())
                .await?;
            by_priority.push((priority.to_string(), count));
        }
        Ok(TicketStats {
            total,
            open: by_status[0],
            in_progress: by_status[1],
            resolved: by_status[2],
            closed: by_status[3],
            by_priority,
        })
    }
}
