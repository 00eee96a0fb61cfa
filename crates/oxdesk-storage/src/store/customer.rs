use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::customer::{self, Column, Entity};
use crate::events::{ChangeOp, ChangeTable};
use crate::store::TicketStore;

/// Customer record. `tier` feeds the customer-value priority factor
/// and is one of `free`, `standard`, `premium`, `enterprise`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: customer::Model) -> CustomerRow {
    CustomerRow {
        id: m.id,
        name: m.name,
        email: m.email,
        tier: m.tier,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl TicketStore {
    pub async fn insert_customer(&self, row: &CustomerRow) -> Result<CustomerRow> {
        let now = Utc::now().fixed_offset();
        let am = customer::ActiveModel {
            id: Set(row.id.clone()),
            name: Set(row.name.clone()),
            email: Set(row.email.clone()),
            tier: Set(row.tier.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        self.events
            .publish(ChangeTable::Customers, ChangeOp::Insert, &model.id);
        Ok(to_row(model))
    }

    pub async fn get_customer(&self, id: &str) -> Result<Option<CustomerRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn get_customer_by_email(&self, email: &str) -> Result<Option<CustomerRow>> {
        let model = Entity::find()
            .filter(Column::Email.eq(email))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_customers(&self, limit: usize, offset: usize) -> Result<Vec<CustomerRow>> {
        let rows = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_customers(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }

    pub async fn update_customer_tier(&self, id: &str, tier: &str) -> Result<Option<CustomerRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let mut am: customer::ActiveModel = m.into();
        am.tier = Set(tier.to_string());
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        self.events
            .publish(ChangeTable::Customers, ChangeOp::Update, id);
        Ok(Some(to_row(updated)))
    }

    pub async fn delete_customer(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        let deleted = res.rows_affected > 0;
        if deleted {
            self.events
                .publish(ChangeTable::Customers, ChangeOp::Delete, id);
        }
        Ok(deleted)
    }
}
