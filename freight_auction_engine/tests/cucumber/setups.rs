use cucumber::given;

use crate::cucumber::{auction_world::AuctionSystem, AuctionWorld};

#[given("a fresh engine")]
async fn fresh_engine(world: &mut AuctionWorld) {
    let _ = env_logger::try_init();
    world.system = Some(AuctionSystem::new());
}
