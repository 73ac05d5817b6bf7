use crate::{
    db::traits::DatabaseBackend,
    db_types::{CarrierId, CarrierProfile},
};

/// Carrier history and last-known position, as fed by external tracking systems.
#[allow(async_fn_in_trait)]
pub trait CarrierManagement: DatabaseBackend {
    async fn fetch_carrier_profile(&self, carrier_id: &CarrierId) -> Result<Option<CarrierProfile>, Self::Error>;

    async fn upsert_carrier_profile(&self, profile: CarrierProfile) -> Result<(), Self::Error>;
}
