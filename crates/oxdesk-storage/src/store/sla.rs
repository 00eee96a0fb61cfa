use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::escalation_event::{self, Column as EventColumn, Entity as EventEntity};
use crate::entities::sla_tracking::{self, Column, Entity};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// One SLA deadline being tracked for a ticket. A ticket normally carries
/// two rows, one per SLA type (response and resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRow {
    pub id: String,
    pub ticket_id: String,
    pub sla_type: String,
    pub priority_level: String,
    pub deadline: DateTime<Utc>,
    pub escalation_level: u8,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit record of a single escalation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEventRow {
    pub id: String,
    pub sla_id: String,
    pub level: u8,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

/// SLA record list filter.
#[derive(Debug, Clone, Default)]
pub struct SlaFilter {
    pub ticket_id_eq: Option<String>,
    pub sla_type_eq: Option<String>,
    pub active_eq: Option<bool>,
}

fn to_row(m: sla_tracking::Model) -> SlaRow {
    SlaRow {
        id: m.id,
        ticket_id: m.ticket_id,
        sla_type: m.sla_type,
        priority_level: m.priority_level,
        deadline: m.deadline.with_timezone(&Utc),
        escalation_level: m.escalation_level.clamp(0, 4) as u8,
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_event_row(m: escalation_event::Model) -> EscalationEventRow {
    EscalationEventRow {
        id: m.id,
        sla_id: m.sla_id,
        level: m.level.clamp(0, 4) as u8,
        action: m.action,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn apply_filter(mut q: sea_orm::Select<Entity>, filter: &SlaFilter) -> sea_orm::Select<Entity> {
    if let Some(ticket_id) = &filter.ticket_id_eq {
        q = q.filter(Column::TicketId.eq(ticket_id.as_str()));
    }
    if let Some(sla_type) = &filter.sla_type_eq {
        q = q.filter(Column::SlaType.eq(sla_type.as_str()));
    }
    if let Some(active) = filter.active_eq {
        q = q.filter(Column::IsActive.eq(active));
    }
    q
}

impl TicketStore {
    pub async fn insert_sla(&self, row: &SlaRow) -> Result<SlaRow> {
        let now = Utc::now().fixed_offset();
        let am = sla_tracking::ActiveModel {
            id: Set(row.id.clone()),
            ticket_id: Set(row.ticket_id.clone()),
            sla_type: Set(row.sla_type.clone()),
            priority_level: Set(row.priority_level.clone()),
            deadline: Set(row.deadline.fixed_offset()),
            escalation_level: Set(row.escalation_level as i32),
            is_active: Set(row.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::SlaTracking, ChangeOp::Insert, &model.id);
        Ok(to_row(model))
    }

    pub async fn get_sla(&self, id: &str) -> Result<Option<SlaRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    /// Every active SLA row, soonest deadline first. This is what the
    /// escalation scheduler walks on each tick.
    pub async fn list_active_slas(&self) -> Result<Vec<SlaRow>> {
        let rows = Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by(Column::Deadline, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_slas(
        &self,
        filter: &SlaFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SlaRow>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::Deadline, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_slas(&self, filter: &SlaFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    /// Persist a new escalation level. Levels only move up; a stored level
    /// at or above `level` is left alone and reported as no change.
    pub async fn update_sla_level(&self, id: &str, level: u8) -> Result<bool> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(false);
        };
        if m.escalation_level >= level as i32 {
            return Ok(false);
        }

        let mut am: sla_tracking::ActiveModel = m.into();
        am.escalation_level = Set(level as i32);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::SlaTracking, ChangeOp::Update, id);
        Ok(true)
    }

    pub async fn deactivate_sla(&self, id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(false);
        };
        if !m.is_active {
            return Ok(false);
        }

        let mut am: sla_tracking::ActiveModel = m.into();
        am.is_active = Set(false);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::SlaTracking, ChangeOp::Update, id);
        Ok(true)
    }

    /// Deactivate all active SLA rows of a ticket, e.g. once it is
    /// resolved or closed. Returns how many rows were flipped.
    pub async fn deactivate_slas_for_ticket(&self, ticket_id: &str) -> Result<u64> {
        let rows = Entity::find()
            .filter(Column::TicketId.eq(ticket_id))
            .filter(Column::IsActive.eq(true))
            .all(self.db())
            .await?;
        let mut flipped = 0;
        for m in rows {
            let id = m.id.clone();
            let mut am: sla_tracking::ActiveModel = m.into();
            am.is_active = Set(false);
            am.updated_at = Set(Utc::now().fixed_offset());
            am.update(self.db()).await?;
            self.events
                .publish(ChangeTable::SlaTracking, ChangeOp::Update, &id);
            flipped += 1;
        }
        Ok(flipped)
    }

    pub async fn insert_escalation_event(&self, row: &EscalationEventRow) -> Result<()> {
        let am = escalation_event::ActiveModel {
            id: Set(row.id.clone()),
            sla_id: Set(row.sla_id.clone()),
            level: Set(row.level as i32),
            action: Set(row.action.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    /// Escalation history for one SLA row, oldest first.
    pub async fn list_escalation_events(&self, sla_id: &str) -> Result<Vec<EscalationEventRow>> {
        let rows = EventEntity::find()
            .filter(EventColumn::SlaId.eq(sla_id))
            .order_by(EventColumn::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_event_row).collect())
    }
}
