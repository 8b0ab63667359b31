use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, SqlErr};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::customer;
use crate::errors::ServiceError;

/// Normalizes a phone number to digits with an optional leading `+`.
/// Separators are dropped; anything else rejects the number.
pub fn normalize_phone(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());

    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '+' if i == 0 => normalized.push('+'),
            '0'..='9' => normalized.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => {
                return Err(ServiceError::ValidationError(format!(
                    "Phone number contains invalid character '{}'",
                    c
                )))
            }
        }
    }

    let digits = normalized.strip_prefix('+').unwrap_or(&normalized);
    if digits.len() < 8 || digits.len() > 15 {
        return Err(ServiceError::ValidationError(
            "Phone number must have 8 to 15 digits".to_string(),
        ));
    }

    Ok(normalized)
}

/// Looks up a customer by normalized phone, creating the row on first
/// contact. Safe under concurrent checkouts for the same new phone: the
/// loser of the unique-index race re-reads the winner's row.
#[instrument(skip(conn))]
pub async fn find_or_create_by_phone<C: ConnectionTrait>(
    conn: &C,
    phone: &str,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<customer::Model, ServiceError> {
    let normalized = normalize_phone(phone)?;

    if let Some(existing) = find_by_phone(conn, &normalized).await? {
        return enrich_existing(conn, existing, name, email).await;
    }

    let new_customer = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        phone: Set(normalized.clone()),
        name: Set(name.unwrap_or_default().to_string()),
        email: Set(email.map(str::to_string)),
        ..Default::default()
    };

    match new_customer.insert(conn).await {
        Ok(model) => {
            info!(customer_id = %model.id, "Created customer");
            Ok(model)
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // Lost the race; the row exists now.
            find_by_phone(conn, &normalized)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e))
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_by_phone<C: ConnectionTrait>(
    conn: &C,
    normalized: &str,
) -> Result<Option<customer::Model>, ServiceError> {
    customer::Entity::find()
        .filter(customer::Column::Phone.eq(normalized))
        .one(conn)
        .await
        .map_err(ServiceError::from)
}

/// Fills in name/email the first time the customer provides them.
/// Existing values are never overwritten.
async fn enrich_existing<C: ConnectionTrait>(
    conn: &C,
    existing: customer::Model,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<customer::Model, ServiceError> {
    let wants_name = existing.name.is_empty() && name.is_some_and(|n| !n.is_empty());
    let wants_email = existing.email.is_none() && email.is_some();

    if !wants_name && !wants_email {
        return Ok(existing);
    }

    let mut active: customer::ActiveModel = existing.into();
    if wants_name {
        if let Some(n) = name {
            active.name = Set(n.to_string());
        }
    }
    if wants_email {
        active.email = Set(email.map(str::to_string));
    }

    Ok(active.update(conn).await?)
}
