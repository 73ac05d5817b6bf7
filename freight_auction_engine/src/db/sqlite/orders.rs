use chrono::{DateTime, Utc};
use fae_common::{Volume, Weight};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::{
        sqlite::SqliteDatabaseError,
        traits::{FreightOrderUpdate, LotUpdate, MasterOrderUpdate, NewLotRecord},
    },
    db_types::{
        FreightOrder,
        FreightOrderId,
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        NewFreightOrder,
        NewMasterOrder,
        PartialOrder,
        PartialOrderId,
    },
};

const MASTER_COLUMNS: &str = "id, shipper_id, total_weight, total_volume, remaining_weight, remaining_volume, \
                              required_delivery_date, max_bid_amount, cargo_category, ltl_enabled, min_load_fraction, \
                              pickup_latitude, pickup_longitude, extension_count, status, created_at, updated_at";

const LOT_COLUMNS: &str = "id, master_order_id, weight, volume, percentage, assigned_carrier_id, assigned_bid_id, \
                           status, created_at, updated_at";

const FREIGHT_COLUMNS: &str = "id, shipper_id, weight, volume, required_delivery_date, max_bid_amount, \
                               cargo_category, pickup_latitude, pickup_longitude, extension_count, awarded_bid_id, \
                               status, created_at, updated_at";

/// Inserts a new master order using the given connection. This is not atomic. Embed the call in a transaction if you
/// are also inserting its lots, and pass `&mut *tx` as the connection argument.
pub async fn insert_master_order(
    order: &NewMasterOrder,
    remaining_weight: Weight,
    remaining_volume: Volume,
    conn: &mut SqliteConnection,
) -> Result<MasterOrder, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO master_orders (
            shipper_id, total_weight, total_volume, remaining_weight, remaining_volume, required_delivery_date,
            max_bid_amount, cargo_category, ltl_enabled, min_load_fraction, pickup_latitude, pickup_longitude,
            extension_count, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, $13, $14, $15)
        RETURNING {MASTER_COLUMNS};
        "#
    );
    let order = sqlx::query_as::<_, MasterOrder>(&sql)
        .bind(&order.shipper_id)
        .bind(order.total_weight)
        .bind(order.total_volume)
        .bind(remaining_weight)
        .bind(remaining_volume)
        .bind(order.required_delivery_date)
        .bind(order.max_bid_amount)
        .bind(order.cargo_category)
        .bind(order.ltl_enabled)
        .bind(order.min_load_fraction)
        .bind(order.pickup.map(|p| p.latitude))
        .bind(order.pickup.map(|p| p.longitude))
        .bind(MasterOrderStatus::Open)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Master order {} has been saved in the DB", order.id);
    Ok(order)
}

pub async fn fetch_master_order(
    id: MasterOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<MasterOrder>, SqliteDatabaseError> {
    let sql = format!("SELECT {MASTER_COLUMNS} FROM master_orders WHERE id = $1");
    let order = sqlx::query_as::<_, MasterOrder>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches master orders in any of the given statuses, ordered by `created_at`. An empty status list matches all
/// orders.
pub async fn fetch_master_orders(
    statuses: &[MasterOrderStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<MasterOrder>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {MASTER_COLUMNS} FROM master_orders"));
    if !statuses.is_empty() {
        builder.push(" WHERE status IN (");
        let mut list = builder.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
        list.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<MasterOrder>().fetch_all(conn).await?;
    Ok(orders)
}

pub(crate) async fn update_master_order(
    update: &MasterOrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let current = fetch_master_order(update.id, &mut *conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::NotFound(update.id.to_string()))?;
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE master_orders SET ");
    let mut set_clause = builder.separated(", ");
    if let Some(weight) = update.remaining_weight {
        set_clause.push("remaining_weight = ");
        set_clause.push_bind_unseparated(weight);
    }
    if let Some(volume) = update.remaining_volume {
        set_clause.push("remaining_volume = ");
        set_clause.push_bind_unseparated(volume);
    }
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status);
    }
    if let Some(close) = update.close_time {
        set_clause.push("required_delivery_date = ");
        set_clause.push_bind_unseparated(current.required_delivery_date.max(close));
    }
    if let Some(count) = update.extension_count {
        set_clause.push("extension_count = ");
        set_clause.push_bind_unseparated(count);
    }
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    builder.push(" WHERE id = ");
    builder.push_bind(update.id);
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn insert_lot(record: &NewLotRecord, conn: &mut SqliteConnection) -> Result<PartialOrder, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO partial_orders (
            master_order_id, weight, volume, percentage, assigned_carrier_id, assigned_bid_id, status, created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {LOT_COLUMNS};
        "#
    );
    let lot = sqlx::query_as::<_, PartialOrder>(&sql)
        .bind(record.master_order_id)
        .bind(record.weight)
        .bind(record.volume)
        .bind(record.percentage)
        .bind(&record.assigned_carrier_id)
        .bind(record.assigned_bid_id)
        .bind(record.status)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;
    trace!("🗃️ Lot {} of {} saved with status {}", lot.id, lot.master_order_id, lot.status);
    Ok(lot)
}

pub async fn fetch_lot(
    id: PartialOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PartialOrder>, SqliteDatabaseError> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM partial_orders WHERE id = $1");
    let lot = sqlx::query_as::<_, PartialOrder>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(lot)
}

pub async fn fetch_lots_for_master(
    master_id: MasterOrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PartialOrder>, SqliteDatabaseError> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM partial_orders WHERE master_order_id = $1 ORDER BY id ASC");
    let lots = sqlx::query_as::<_, PartialOrder>(&sql).bind(master_id).fetch_all(conn).await?;
    Ok(lots)
}

pub(crate) async fn update_lot(update: &LotUpdate, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE partial_orders SET
            status = $1,
            assigned_carrier_id = COALESCE($2, assigned_carrier_id),
            assigned_bid_id = COALESCE($3, assigned_bid_id),
            updated_at = $4
        WHERE id = $5
        "#,
    )
    .bind(update.status)
    .bind(&update.assigned_carrier_id)
    .bind(update.assigned_bid_id)
    .bind(Utc::now())
    .bind(update.id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::NotFound(update.id.to_string()));
    }
    Ok(())
}

pub async fn insert_freight_order(
    order: &NewFreightOrder,
    conn: &mut SqliteConnection,
) -> Result<FreightOrder, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO freight_orders (
            shipper_id, weight, volume, required_delivery_date, max_bid_amount, cargo_category, pickup_latitude,
            pickup_longitude, extension_count, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 'OPEN', $9, $10)
        RETURNING {FREIGHT_COLUMNS};
        "#
    );
    let order = sqlx::query_as::<_, FreightOrder>(&sql)
        .bind(&order.shipper_id)
        .bind(order.weight)
        .bind(order.volume)
        .bind(order.required_delivery_date)
        .bind(order.max_bid_amount)
        .bind(order.cargo_category)
        .bind(order.pickup.map(|p| p.latitude))
        .bind(order.pickup.map(|p| p.longitude))
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Freight order {} has been saved in the DB", order.id);
    Ok(order)
}

pub async fn fetch_freight_order(
    id: FreightOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<FreightOrder>, SqliteDatabaseError> {
    let sql = format!("SELECT {FREIGHT_COLUMNS} FROM freight_orders WHERE id = $1");
    let order = sqlx::query_as::<_, FreightOrder>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub(crate) async fn update_freight_order(
    update: &FreightOrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let current = fetch_freight_order(update.id, &mut *conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::NotFound(update.id.to_string()))?;
    let close_time: Option<DateTime<Utc>> = update.close_time.map(|c| current.required_delivery_date.max(c));
    sqlx::query(
        r#"
        UPDATE freight_orders SET
            status = COALESCE($1, status),
            required_delivery_date = COALESCE($2, required_delivery_date),
            extension_count = COALESCE($3, extension_count),
            awarded_bid_id = COALESCE($4, awarded_bid_id),
            updated_at = $5
        WHERE id = $6
        "#,
    )
    .bind(update.status)
    .bind(close_time)
    .bind(update.extension_count)
    .bind(update.awarded_bid_id)
    .bind(Utc::now())
    .bind(update.id)
    .execute(conn)
    .await?;
    Ok(())
}
