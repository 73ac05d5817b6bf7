pub mod helpers;
pub mod op;
mod quantity;
mod secret;

pub use quantity::{Fraction, Money, Percentage, Volume, Weight};
pub use rust_decimal::Decimal;
pub use secret::Secret;
