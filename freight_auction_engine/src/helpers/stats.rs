use fae_common::{Decimal, Money};

/// The median of a set of amounts. An even count yields the mean of the two central values.
pub fn median(values: &[Money]) -> Option<Money> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let sum = sorted[mid - 1] + sorted[mid];
        Some(Money::new(sum.value() / Decimal::TWO))
    }
}
