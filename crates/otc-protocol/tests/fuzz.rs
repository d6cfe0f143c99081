//! Seeded simulations over the desk: random operation streams must never
//! break reservation accounting, and the approval drift threshold must match
//! exact cross-multiplication.

use otc_protocol::oracle::within_deviation;
use otc_protocol::*;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

type Id = [u8; 20];

const OWNER: Id = [1; 20];
const AGENT: Id = [2; 20];
const BUYER: Id = [3; 20];
const TOKEN: u128 = 1_000_000_000_000_000_000;

fn desk_at(token_price: u64) -> Desk<Id> {
    let mut desk = Desk::new(OWNER, AGENT, &DeskConfig::default(), StoredPrices::default()).unwrap();
    desk.set_prices(OWNER, token_price, 3000_00000000, 3600, 0).unwrap();
    desk.deposit_tokens(OWNER, 100_000 * TOKEN).unwrap();
    desk
}

/// Sum of token amounts the desk still owes: offers neither claimed nor cancelled.
fn outstanding(desk: &Desk<Id>) -> u128 {
    (1..desk.state().next_offer_id)
        .filter_map(|id| desk.offer(id))
        .filter(|o| !o.is_terminal())
        .map(|o| o.token_amount)
        .sum()
}

#[test]
fn drift_threshold_is_exactly_twenty_percent() {
    let mut rng = XorShiftRng::from_seed([0x5au8; 16]);
    for _ in 0..10_000 {
        let snapshot: u64 = rng.gen_range(1_000..1_000_000_000_000);
        let bump_bps: u64 = rng.gen_range(0..4_000);
        let moved_up = snapshot + snapshot * bump_bps / 10_000;
        let moved_down = snapshot - snapshot * bump_bps / 10_000;
        let exact_up = (moved_up - snapshot) as u128 * 10_000 <= snapshot as u128 * 2_000;
        let exact_down = (snapshot - moved_down) as u128 * 10_000 <= snapshot as u128 * 2_000;
        assert_eq!(within_deviation(snapshot, moved_up, 2_000), exact_up);
        assert_eq!(within_deviation(snapshot, moved_down, 2_000), exact_down);
        if bump_bps <= 2_000 {
            assert!(exact_up && exact_down, "snapshot {snapshot} bump {bump_bps}");
        }
    }
}

#[test]
fn approval_at_exact_boundary() {
    let mut rng = XorShiftRng::from_seed([0x17u8; 16]);
    for _ in 0..200 {
        let price: u64 = rng.gen_range(1_000_000..100_000_000);
        let mut desk = desk_at(price * 5);
        let terms = OfferTerms {
            token_amount: 1_000 * TOKEN,
            discount_bps: 0,
            currency: PaymentCurrency::Stable,
            lockup_secs: 0,
        };
        let id = desk.create_offer(BUYER, terms, 0).unwrap();
        // price * 5 moved to price * 6 is exactly +20%
        desk.set_prices(OWNER, price * 6, 3000_00000000, 3600, 1).unwrap();
        assert_eq!(desk.approve_offer(AGENT, id, 1), Ok(true));
    }
}

#[test]
fn deterministic_fuzz_reservations_track_open_offers() {
    let mut rng = XorShiftRng::from_seed([0xabu8; 16]);
    let mut desk = desk_at(10_000_000);
    let mut now = 0i64;

    for _ in 0..2_000 {
        now += 60;
        let count = desk.state().next_offer_id.saturating_sub(1).max(1);
        let pick = rng.gen_range(1..=count);
        let before = desk.state().clone();

        let op: u8 = rng.gen_range(0..6);
        let result = match op {
            0 => {
                let terms = OfferTerms {
                    token_amount: rng.gen_range(1..=10_000u128) * TOKEN,
                    discount_bps: 500,
                    currency: PaymentCurrency::Stable,
                    lockup_secs: rng.gen_range(0..3i64) * 60,
                };
                desk.create_offer(BUYER, terms, now).map(|_| ())
            }
            1 => desk.approve_offer(AGENT, pick, now).map(|_| ()),
            2 => desk
                .fulfill_offer(BUYER, pick, PaymentCurrency::Stable, u64::MAX as u128, now)
                .map(|_| ()),
            3 => desk.claim(BUYER, pick, now).map(|_| ()),
            4 => desk.cancel_offer(AGENT, pick, now).map(|_| ()),
            _ => {
                let amount = rng.gen_range(0..50_000u128) * TOKEN;
                desk.withdraw_tokens(OWNER, OWNER, amount).map(|_| ())
            }
        };
        if result.is_err() {
            assert_eq!(desk.state(), &before, "failed op {op} mutated the desk");
        }
        // keep prices fresh
        desk.set_prices(OWNER, 10_000_000, 3000_00000000, 3600, now).unwrap();

        let inventory = desk.state().inventory;
        assert!(inventory.reserved() <= inventory.total());
        assert_eq!(inventory.reserved(), outstanding(&desk));
    }
}
