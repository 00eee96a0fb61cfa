use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::agent::{self, Column, Entity};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// Support agent record. `role` is `agent` or `manager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: agent::Model) -> AgentRow {
    AgentRow {
        id: m.id,
        name: m.name,
        email: m.email,
        role: m.role,
        online: m.online,
        last_seen: m.last_seen.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl TicketStore {
    pub async fn insert_agent(&self, row: &AgentRow) -> Result<AgentRow> {
        let now = Utc::now().fixed_offset();
        let am = agent::ActiveModel {
            id: Set(row.id.clone()),
            name: Set(row.name.clone()),
            email: Set(row.email.clone()),
            role: Set(row.role.clone()),
            online: Set(row.online),
            last_seen: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::Agents, ChangeOp::Insert, &model.id);
        Ok(to_row(model))
    }

    pub async fn get_agent(&self, id: &str) -> Result<Option<AgentRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_agents(&self, limit: usize, offset: usize) -> Result<Vec<AgentRow>> {
        let rows = Entity::find()
            .order_by(Column::Name, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_agents(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }

    /// Flip an agent's presence flag. Going online stamps `last_seen`.
    pub async fn set_agent_presence(&self, id: &str, online: bool) -> Result<Option<AgentRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let now = Utc::now().fixed_offset();
        let mut am: agent::ActiveModel = m.into();
        am.online = Set(online);
        if online {
            am.last_seen = Set(Some(now));
        }
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::Agents, ChangeOp::Update, id);
        Ok(Some(to_row(updated)))
    }

    /// Online agent count, the queue estimator's staffing input.
    pub async fn count_online_agents(&self) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::Online.eq(true))
            .count(self.db())
            .await?)
    }

    /// Email addresses of every manager, for level >= 3 escalations.
    pub async fn list_manager_emails(&self) -> Result<Vec<String>> {
        let rows = Entity::find()
            .filter(Column::Role.eq("manager"))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| m.email).collect())
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        let deleted = res.rows_affected > 0;
        if deleted {
            self.events
                .publish(ChangeTable::Agents, ChangeOp::Delete, id);
        }
        Ok(deleted)
    }
}
