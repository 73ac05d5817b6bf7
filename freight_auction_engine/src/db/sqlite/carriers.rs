use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::CarrierStatsDelta},
    db_types::{CarrierId, CarrierProfile},
};

pub async fn fetch_carrier_profile(
    carrier_id: &CarrierId,
    conn: &mut SqliteConnection,
) -> Result<Option<CarrierProfile>, SqliteDatabaseError> {
    let profile = sqlx::query_as::<_, CarrierProfile>(
        r#"
        SELECT carrier_id, total_orders, completed_orders, last_latitude, last_longitude, updated_at
        FROM carrier_profiles WHERE carrier_id = $1
        "#,
    )
    .bind(carrier_id)
    .fetch_optional(conn)
    .await?;
    Ok(profile)
}

pub async fn upsert_carrier_profile(
    profile: &CarrierProfile,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO carrier_profiles (carrier_id, total_orders, completed_orders, last_latitude, last_longitude, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (carrier_id) DO UPDATE SET
            total_orders = excluded.total_orders,
            completed_orders = excluded.completed_orders,
            last_latitude = excluded.last_latitude,
            last_longitude = excluded.last_longitude,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&profile.carrier_id)
    .bind(profile.total_orders)
    .bind(profile.completed_orders)
    .bind(profile.last_latitude)
    .bind(profile.last_longitude)
    .bind(profile.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Adds the delta to the carrier's history, creating the profile if this is the carrier's first record.
pub(crate) async fn apply_stats_delta(
    delta: &CarrierStatsDelta,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO carrier_profiles (carrier_id, total_orders, completed_orders, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (carrier_id) DO UPDATE SET
            total_orders = total_orders + excluded.total_orders,
            completed_orders = completed_orders + excluded.completed_orders,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&delta.carrier_id)
    .bind(delta.total_orders)
    .bind(delta.completed_orders)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
