use chrono::{DateTime, Utc};
use fae_common::{Money, Weight};
use log::trace;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::{
        sqlite::SqliteDatabaseError,
        traits::{NewBidRecord, NewComplianceRecord},
    },
    db_types::{
        Bid,
        BidId,
        BidStatus,
        CargoCategory,
        CarrierId,
        ComplianceSnapshot,
        ComplianceStatus,
        FreightOrderId,
        MasterOrderId,
        OrderKind,
        OrderRef,
        PartialOrderId,
        ScoreBreakdown,
        SecurityLevel,
    },
};

const BID_COLUMNS: &str = "id, carrier_id, freight_order_id, master_order_id, partial_order_id, amount, weight, \
                           proposed_delivery_date, notes, status, match_score, score_breakdown, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
struct BidRow {
    id: BidId,
    carrier_id: CarrierId,
    freight_order_id: Option<FreightOrderId>,
    master_order_id: Option<MasterOrderId>,
    partial_order_id: Option<PartialOrderId>,
    amount: Money,
    weight: Weight,
    proposed_delivery_date: DateTime<Utc>,
    notes: Option<String>,
    status: BidStatus,
    match_score: Option<f64>,
    score_breakdown: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BidRow> for Bid {
    type Error = SqliteDatabaseError;

    fn try_from(row: BidRow) -> Result<Self, Self::Error> {
        let order_ref = OrderRef::from_columns(row.freight_order_id, row.master_order_id, row.partial_order_id)
            .ok_or_else(|| SqliteDatabaseError::InvalidRecord(format!("{} does not reference exactly one order", row.id)))?;
        let score_breakdown = row
            .score_breakdown
            .map(|json| serde_json::from_str::<ScoreBreakdown>(&json))
            .transpose()
            .map_err(|e| SqliteDatabaseError::InvalidRecord(format!("score breakdown of {}: {e}", row.id)))?;
        Ok(Bid {
            id: row.id,
            carrier_id: row.carrier_id,
            order_ref,
            amount: row.amount,
            weight: row.weight,
            proposed_delivery_date: row.proposed_delivery_date,
            notes: row.notes,
            status: row.status,
            match_score: row.match_score,
            score_breakdown,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bids(rows: Vec<BidRow>) -> Result<Vec<Bid>, SqliteDatabaseError> {
    rows.into_iter().map(Bid::try_from).collect()
}

pub async fn insert_bid(record: &NewBidRecord, conn: &mut SqliteConnection) -> Result<Bid, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO bids (
            carrier_id, freight_order_id, master_order_id, partial_order_id, amount, weight, proposed_delivery_date,
            notes, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'PENDING', $9, $10)
        RETURNING {BID_COLUMNS};
        "#
    );
    let row = sqlx::query_as::<_, BidRow>(&sql)
        .bind(&record.carrier_id)
        .bind(record.order_ref.freight_order_id())
        .bind(record.order_ref.master_order_id())
        .bind(record.order_ref.partial_order_id())
        .bind(record.amount)
        .bind(record.weight)
        .bind(record.proposed_delivery_date)
        .bind(&record.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    let bid = Bid::try_from(row)?;
    if let Some(compliance) = &record.compliance {
        insert_compliance_snapshot(bid.id, &bid.carrier_id, compliance, &mut *conn).await?;
    }
    trace!("🗃️ {} from {} on {} saved", bid.id, bid.carrier_id, bid.order_ref);
    Ok(bid)
}

async fn insert_compliance_snapshot(
    bid_id: BidId,
    carrier_id: &CarrierId,
    record: &NewComplianceRecord,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let violations = serde_json::to_string(&record.violations)
        .map_err(|e| SqliteDatabaseError::InvalidRecord(format!("violations of {bid_id}: {e}")))?;
    sqlx::query(
        r#"
        INSERT INTO compliance_snapshots (
            bid_id, carrier_id, compliance_status, security_level, trust_score, violations, checked_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(bid_id)
    .bind(carrier_id)
    .bind(record.compliance_status)
    .bind(record.security_level)
    .bind(record.trust_score)
    .bind(violations)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_bid(id: BidId, conn: &mut SqliteConnection) -> Result<Option<Bid>, SqliteDatabaseError> {
    let sql = format!("SELECT {BID_COLUMNS} FROM bids WHERE id = $1");
    let row = sqlx::query_as::<_, BidRow>(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Bid::try_from).transpose()
}

pub async fn fetch_bids_for_order(order: OrderRef, conn: &mut SqliteConnection) -> Result<Vec<Bid>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {BID_COLUMNS} FROM bids WHERE "));
    match order {
        OrderRef::FreightOrder(id) => builder.push("freight_order_id = ").push_bind(id),
        OrderRef::MasterOrder(id) => builder.push("master_order_id = ").push_bind(id),
        OrderRef::PartialOrder(id) => builder.push("partial_order_id = ").push_bind(id),
    };
    builder.push(" ORDER BY id ASC");
    let rows = builder.build_query_as::<BidRow>().fetch_all(conn).await?;
    into_bids(rows)
}

/// The carrier's bids in any of the given statuses, in placement order. An empty status list matches every bid.
pub async fn fetch_bids_for_carrier(
    carrier_id: &CarrierId,
    statuses: &[BidStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<Bid>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {BID_COLUMNS} FROM bids WHERE carrier_id = "));
    builder.push_bind(carrier_id.clone());
    if !statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut list = builder.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
        list.push_unseparated(")");
    }
    builder.push(" ORDER BY id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<BidRow>().fetch_all(conn).await?;
    into_bids(rows)
}

pub async fn fetch_comparable_bid_amounts(
    kind: OrderKind,
    category: CargoCategory,
    exclude: BidId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Money>, SqliteDatabaseError> {
    let join = match kind {
        OrderKind::Freight => "JOIN freight_orders o ON b.freight_order_id = o.id",
        OrderKind::Master => "JOIN master_orders o ON b.master_order_id = o.id",
        OrderKind::Partial => {
            "JOIN partial_orders p ON b.partial_order_id = p.id JOIN master_orders o ON p.master_order_id = o.id"
        },
    };
    let sql = format!(
        "SELECT b.amount FROM bids b {join} WHERE o.cargo_category = $1 AND b.id != $2 AND b.status != 'REJECTED'"
    );
    let amounts = sqlx::query_scalar::<_, Money>(&sql).bind(category).bind(exclude).fetch_all(conn).await?;
    Ok(amounts)
}

pub(crate) async fn update_bid_status(
    id: BidId,
    status: BidStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE bids SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::NotFound(id.to_string()));
    }
    Ok(())
}

pub async fn save_score(
    id: BidId,
    breakdown: &ScoreBreakdown,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let json = serde_json::to_string(breakdown)
        .map_err(|e| SqliteDatabaseError::InvalidRecord(format!("score breakdown of {id}: {e}")))?;
    let result = sqlx::query("UPDATE bids SET match_score = $1, score_breakdown = $2 WHERE id = $3")
        .bind(breakdown.total_score)
        .bind(json)
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::NotFound(id.to_string()));
    }
    Ok(())
}

#[derive(Debug, FromRow)]
struct ComplianceRow {
    bid_id: BidId,
    carrier_id: CarrierId,
    compliance_status: ComplianceStatus,
    security_level: SecurityLevel,
    trust_score: f64,
    violations: String,
    checked_at: DateTime<Utc>,
}

pub async fn fetch_compliance_snapshot(
    bid_id: BidId,
    conn: &mut SqliteConnection,
) -> Result<Option<ComplianceSnapshot>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, ComplianceRow>(
        r#"
        SELECT bid_id, carrier_id, compliance_status, security_level, trust_score, violations, checked_at
        FROM compliance_snapshots WHERE bid_id = $1
        "#,
    )
    .bind(bid_id)
    .fetch_optional(conn)
    .await?;
    row.map(|row| {
        let violations = serde_json::from_str::<Vec<String>>(&row.violations)
            .map_err(|e| SqliteDatabaseError::InvalidRecord(format!("violations of {}: {e}", row.bid_id)))?;
        Ok(ComplianceSnapshot {
            bid_id: row.bid_id,
            carrier_id: row.carrier_id,
            compliance_status: row.compliance_status,
            security_level: row.security_level,
            trust_score: row.trust_score,
            violations,
            checked_at: row.checked_at,
        })
    })
    .transpose()
}
