use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::product;
use crate::errors::ServiceError;

/// Loads the referenced products in one query, keyed by id. Callers
/// decide what a missing key means; inactive products are returned so
/// the caller can report them distinctly from unknown ids.
pub async fn load_products<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids.iter().copied()))
        .all(conn)
        .await?;

    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}
