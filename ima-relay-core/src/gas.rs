//! Gas Policy (`spec.md` §4.3): gas price clamping and gas limit flooring
//! for a pending call.

/// Tuning knobs, one set per chain role (mainnet vs. S-chain carry different
/// defaults per `spec.md` §4.3).
#[derive(Clone, Copy, Debug)]
pub struct GasPolicy {
    pub price_multiplier: f64,
    pub max_gas_price: u128,
    pub min_gas_price: u128,
    pub limit_multiplier: f64,
    pub recommended_floor: u64,
}

impl GasPolicy {
    /// `priceMultiplier` defaults to 1.25 on mainnet.
    pub fn mainnet() -> Self {
        Self {
            price_multiplier: 1.25,
            ..Self::base()
        }
    }

    /// `priceMultiplier` defaults to 1.0 on S-chains.
    pub fn s_chain() -> Self {
        Self {
            price_multiplier: 1.0,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            price_multiplier: 1.0,
            max_gas_price: 200_000_000_000, // 2e11
            min_gas_price: 1_000_000_000,   // 1e9
            limit_multiplier: 1.0,
            recommended_floor: 200_000,
        }
    }

    /// `gasPrice = clamp(rawGasPrice * priceMultiplier, 1e9, maxGasPrice)`.
    /// A node-reported price of 0 is treated as the 1 gwei floor before
    /// multiplication, per `spec.md` §4.3.
    pub fn gas_price(&self, raw_gas_price: u128) -> u128 {
        let raw = if raw_gas_price == 0 { self.min_gas_price } else { raw_gas_price };
        let scaled = ((raw as f64) * self.price_multiplier) as u128;
        scaled.clamp(self.min_gas_price, self.max_gas_price)
    }

    /// `gasLimit = max(estimate * limitMultiplier, recommendedFloor)`.
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let scaled = ((estimate as f64) * self.limit_multiplier) as u64;
        scaled.max(self.recommended_floor)
    }
}

/// Extra floor enforced for S->M `postIncomingMessages`:
/// `perMessageGas * N + overhead` (defaults 1,000,000 and 200,000).
#[derive(Clone, Copy, Debug)]
pub struct PostIncomingMessagesFloor {
    pub per_message_gas: u64,
    pub overhead: u64,
}

impl Default for PostIncomingMessagesFloor {
    fn default() -> Self {
        Self {
            per_message_gas: 1_000_000,
            overhead: 200_000,
        }
    }
}

impl PostIncomingMessagesFloor {
    pub fn floor(&self, message_count: usize) -> u64 {
        self.per_message_gas * message_count as u64 + self.overhead
    }

    /// Applies this floor on top of the generic `GasPolicy::gas_limit`
    /// result for a `postIncomingMessages` call specifically.
    pub fn apply(&self, policy: &GasPolicy, estimate: u64, message_count: usize) -> u64 {
        policy.gas_limit(estimate).max(self.floor(message_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero_reported_uses_floor(0, 1_000_000_000)]
    #[case::below_floor_clamped_up(1, 1_000_000_000)]
    #[case::within_range_scaled(10_000_000_000, 12_500_000_000)]
    #[case::above_ceiling_clamped_down(1_000_000_000_000, 200_000_000_000)]
    fn mainnet_gas_price_clamps(#[case] raw: u128, #[case] expected: u128) {
        let policy = GasPolicy::mainnet();
        assert_eq!(policy.gas_price(raw), expected);
    }

    #[test]
    fn gas_limit_floors_on_zero_estimate() {
        let policy = GasPolicy::s_chain();
        assert_eq!(policy.gas_limit(0), policy.recommended_floor);
    }

    #[test]
    fn post_incoming_messages_floor_scales_with_message_count() {
        let floor = PostIncomingMessagesFloor::default();
        assert_eq!(floor.floor(5), 1_000_000 * 5 + 200_000);
    }
}
