//! Identifier minting

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::MarketError;

pub const SALE_PREFIX: &str = "sale_";
pub const EXCHANGE_PREFIX: &str = "exch_";
pub const NOTIFICATION_PREFIX: &str = "note_";

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, MarketError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| MarketError::Id(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| MarketError::Id(e.to_string()))?;
    Ok(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        let id = new_uuid_to_bech32(SALE_PREFIX).unwrap();
        assert!(id.starts_with("sale_1"));
    }

    #[test]
    fn ids_are_unique() {
        let a = new_uuid_to_bech32(NOTIFICATION_PREFIX).unwrap();
        let b = new_uuid_to_bech32(NOTIFICATION_PREFIX).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(matches!(new_uuid_to_bech32(""), Err(MarketError::Id(_))));
    }
}
