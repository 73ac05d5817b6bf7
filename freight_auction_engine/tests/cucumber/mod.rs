mod auction_world;
mod setups;
mod steps;

pub use auction_world::AuctionWorld;
