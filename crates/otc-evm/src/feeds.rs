use otc_protocol::oracle::convert_feed_price;
use otc_protocol::{DeskResult, PriceOracle, PriceQuote};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub answer: i64,
    pub updated_at: i64,
}

/// Chainlink-style `AggregatorV3Interface` read surface.
pub trait Aggregator {
    fn decimals(&self) -> u8;
    fn latest_round_data(&self) -> RoundData;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockAggregator {
    decimals: u8,
    round: RoundData,
}

impl MockAggregator {
    pub fn new(decimals: u8, answer: i64, now: i64) -> Self {
        Self { decimals, round: RoundData { answer, updated_at: now } }
    }

    pub fn set_answer(&mut self, answer: i64, now: i64) {
        self.round = RoundData { answer, updated_at: now };
    }
}

impl Aggregator for MockAggregator {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn latest_round_data(&self) -> RoundData {
        self.round
    }
}

/// Token/USD and ETH/USD aggregators read as one quote. The quote is as old as
/// its older feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorOracle<A = MockAggregator> {
    pub token_usd: A,
    pub native_usd: A,
}

impl<A: Aggregator> AggregatorOracle<A> {
    pub fn new(token_usd: A, native_usd: A) -> Self {
        Self { token_usd, native_usd }
    }
}

fn read_8d<A: Aggregator>(feed: &A) -> DeskResult<(u64, i64)> {
    let round = feed.latest_round_data();
    let price = convert_feed_price(round.answer, -(feed.decimals() as i32))?;
    Ok((price, round.updated_at))
}

impl<A: Aggregator> PriceOracle for AggregatorOracle<A> {
    fn current_quote(&self) -> DeskResult<PriceQuote> {
        let (token_usd_8d, token_at) = read_8d(&self.token_usd)?;
        let (native_usd_8d, native_at) = read_8d(&self.native_usd)?;
        Ok(PriceQuote { token_usd_8d, native_usd_8d, updated_at: token_at.min(native_at) })
    }
}

#[cfg(test)]
mod tests {
    use otc_protocol::DeskError;

    use super::*;

    #[test]
    fn rescales_feed_decimals() {
        let oracle = AggregatorOracle::new(MockAggregator::new(18, 100_000_000_000_000_000, 10), MockAggregator::new(8, 3000_00000000, 20));
        let quote = oracle.current_quote().unwrap();
        assert_eq!(quote.token_usd_8d, 10_000_000);
        assert_eq!(quote.native_usd_8d, 3000_00000000);
        assert_eq!(quote.updated_at, 10);
    }

    #[test]
    fn negative_answer_is_rejected() {
        let oracle = AggregatorOracle::new(MockAggregator::new(8, -1, 0), MockAggregator::new(8, 1, 0));
        assert_eq!(oracle.current_quote(), Err(DeskError::BadPrice));
    }
}
