use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::notification_channel::{self, Column, Entity};
use crate::entities::notification_log::{self, Column as LogColumn, Entity as LogEntity};
use crate::entities::notification_recipient::{
    self, Column as RecipientColumn, Entity as RecipientEntity,
};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// Configured notification channel. `config` is the channel-specific
/// settings blob (SMTP credentials, webhook URL, and so on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub channel_type: String,
    pub description: Option<String>,
    /// Minimum escalation level (0-4) this channel fires at.
    pub min_level: u8,
    pub enabled: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a channel; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUpdate {
    pub description: Option<String>,
    pub min_level: Option<u8>,
    pub enabled: Option<bool>,
    pub config: Option<Value>,
}

/// Channel list filter.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub channel_type_eq: Option<String>,
    pub enabled_eq: Option<bool>,
}

/// Recipient attached to a channel. `manager_only` addresses are only
/// included for level >= 3 notices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientRow {
    pub id: String,
    pub channel_id: String,
    pub value: String,
    pub manager_only: bool,
    pub created_at: DateTime<Utc>,
}

/// Delivery audit record, one per channel per escalation notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationLogRow {
    pub id: String,
    pub notice_id: String,
    pub sla_id: String,
    pub ticket_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_type: String,
    pub level: u8,
    pub status: String,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub recipient_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Notification log list filter.
#[derive(Debug, Clone, Default)]
pub struct NotificationLogFilter {
    pub ticket_id_eq: Option<String>,
    pub channel_id_eq: Option<String>,
    pub status_eq: Option<String>,
}

fn to_channel_row(m: notification_channel::Model) -> ChannelRow {
    ChannelRow {
        id: m.id,
        name: m.name,
        channel_type: m.channel_type,
        description: m.description,
        min_level: m.min_level.clamp(0, 4) as u8,
        enabled: m.enabled,
        config: serde_json::from_str(&m.config_json).unwrap_or(Value::Null),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_recipient_row(m: notification_recipient::Model) -> RecipientRow {
    RecipientRow {
        id: m.id,
        channel_id: m.channel_id,
        value: m.value,
        manager_only: m.manager_only,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn to_log_row(m: notification_log::Model) -> NotificationLogRow {
    NotificationLogRow {
        id: m.id,
        notice_id: m.notice_id,
        sla_id: m.sla_id,
        ticket_id: m.ticket_id,
        channel_id: m.channel_id,
        channel_name: m.channel_name,
        channel_type: m.channel_type,
        level: m.level.clamp(0, 4) as u8,
        status: m.status,
        error_message: m.error_message,
        duration_ms: m.duration_ms.max(0) as u64,
        recipient_count: m.recipient_count.max(0) as u32,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn apply_channel_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &ChannelFilter,
) -> sea_orm::Select<Entity> {
    if let Some(channel_type) = &filter.channel_type_eq {
        q = q.filter(Column::ChannelType.eq(channel_type.as_str()));
    }
    if let Some(enabled) = filter.enabled_eq {
        q = q.filter(Column::Enabled.eq(enabled));
    }
    q
}

fn apply_log_filter(
    mut q: sea_orm::Select<LogEntity>,
    filter: &NotificationLogFilter,
) -> sea_orm::Select<LogEntity> {
    if let Some(ticket_id) = &filter.ticket_id_eq {
        q = q.filter(LogColumn::TicketId.eq(ticket_id.as_str()));
    }
    if let Some(channel_id) = &filter.channel_id_eq {
        q = q.filter(LogColumn::ChannelId.eq(channel_id.as_str()));
    }
    if let Some(status) = &filter.status_eq {
        q = q.filter(LogColumn::Status.eq(status.as_str()));
    }
    q
}

impl TicketStore {
    pub async fn insert_channel(&self, row: &ChannelRow) -> Result<ChannelRow> {
        let now = Utc::now().fixed_offset();
        let am = notification_channel::ActiveModel {
            id: Set(row.id.clone()),
            name: Set(row.name.clone()),
            channel_type: Set(row.channel_type.clone()),
            description: Set(row.description.clone()),
            min_level: Set(row.min_level as i32),
            enabled: Set(row.enabled),
            config_json: Set(serde_json::to_string(&row.config)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::NotificationChannels, ChangeOp::Insert, &model.id);
        Ok(to_channel_row(model))
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_channel_row))
    }

    pub async fn get_channel_by_name(&self, name: &str) -> Result<Option<ChannelRow>> {
        let model = Entity::find()
            .filter(Column::Name.eq(name))
            .one(self.db())
            .await?;
        Ok(model.map(to_channel_row))
    }

    pub async fn list_channels(
        &self,
        filter: &ChannelFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChannelRow>> {
        let rows = apply_channel_filter(Entity::find(), filter)
            .order_by(Column::Name, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_channel_row).collect())
    }

    pub async fn count_channels(&self, filter: &ChannelFilter) -> Result<u64> {
        Ok(apply_channel_filter(Entity::find(), filter)
            .count(self.db())
            .await?)
    }

    /// Enabled channels only, what the notification manager routes over.
    pub async fn list_enabled_channels(&self) -> Result<Vec<ChannelRow>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_channel_row).collect())
    }

    pub async fn update_channel(
        &self,
        id: &str,
        update: &ChannelUpdate,
    ) -> Result<Option<ChannelRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let mut am: notification_channel::ActiveModel = m.into();
        if let Some(description) = &update.description {
            am.description = Set(Some(description.clone()));
        }
        if let Some(min_level) = update.min_level {
            am.min_level = Set(min_level as i32);
        }
        if let Some(enabled) = update.enabled {
            am.enabled = Set(enabled);
        }
        if let Some(config) = &update.config {
            am.config_json = Set(serde_json::to_string(config)?);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::NotificationChannels, ChangeOp::Update, id);
        Ok(Some(to_channel_row(updated)))
    }

    pub async fn delete_channel(&self, id: &str) -> Result<bool> {
        RecipientEntity::delete_many()
            .filter(RecipientColumn::ChannelId.eq(id))
            .exec(self.db())
            .await?;
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        let deleted = res.rows_affected > 0;
        if deleted {
            self.events
                .publish(ChangeTable::NotificationChannels, ChangeOp::Delete, id);
        }
        Ok(deleted)
    }

    pub async fn insert_recipient(&self, row: &RecipientRow) -> Result<RecipientRow> {
        let am = notification_recipient::ActiveModel {
            id: Set(row.id.clone()),
            channel_id: Set(row.channel_id.clone()),
            value: Set(row.value.clone()),
            manager_only: Set(row.manager_only),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_recipient_row(model))
    }

    pub async fn list_recipients(&self, channel_id: &str) -> Result<Vec<RecipientRow>> {
        let rows = RecipientEntity::find()
            .filter(RecipientColumn::ChannelId.eq(channel_id))
            .order_by(RecipientColumn::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_recipient_row).collect())
    }

    pub async fn delete_recipient(&self, id: &str) -> Result<bool> {
        let res = RecipientEntity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn insert_notification_log(&self, row: &NotificationLogRow) -> Result<()> {
        let am = notification_log::ActiveModel {
            id: Set(row.id.clone()),
            notice_id: Set(row.notice_id.clone()),
            sla_id: Set(row.sla_id.clone()),
            ticket_id: Set(row.ticket_id.clone()),
            channel_id: Set(row.channel_id.clone()),
            channel_name: Set(row.channel_name.clone()),
            channel_type: Set(row.channel_type.clone()),
            level: Set(row.level as i32),
            status: Set(row.status.clone()),
            error_message: Set(row.error_message.clone()),
            duration_ms: Set(row.duration_ms as i64),
            recipient_count: Set(row.recipient_count as i32),
            created_at: Set(Utc::now().fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    pub async fn list_notification_logs(
        &self,
        filter: &NotificationLogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NotificationLogRow>> {
        let rows = apply_log_filter(LogEntity::find(), filter)
            .order_by(LogColumn::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_log_row).collect())
    }

    pub async fn count_notification_logs(&self, filter: &NotificationLogFilter) -> Result<u64> {
        Ok(apply_log_filter(LogEntity::find(), filter)
            .count(self.db())
            .await?)
    }
}
