//! End-to-end desk scenarios run through the `Desk` arena.

use otc_protocol::*;

type Id = [u8; 20];

const OWNER: Id = [1; 20];
const AGENT: Id = [2; 20];
const APPROVER: Id = [3; 20];
const BUYER: Id = [4; 20];
const STRANGER: Id = [5; 20];
const SELLER: Id = [6; 20];
const ZERO: Id = [0; 20];

const TOKEN: u128 = 1_000_000_000_000_000_000;
const DAY: i64 = 86_400;
const T0: i64 = 1_700_000_000;
// $0.10 token, $3000 ETH
const TOKEN_PRICE: u64 = 10_000_000;
const ETH_PRICE: u64 = 3000_00000000;

fn desk() -> Desk<Id> {
    let mut desk = Desk::new(OWNER, AGENT, &DeskConfig::default(), StoredPrices::default()).unwrap();
    desk.set_prices(OWNER, TOKEN_PRICE, ETH_PRICE, 3600, T0).unwrap();
    desk.deposit_tokens(OWNER, 1_000_000 * TOKEN).unwrap();
    desk.set_approver(OWNER, APPROVER, true).unwrap();
    desk
}

fn terms(amount_tokens: u128, currency: PaymentCurrency, lockup_secs: i64) -> OfferTerms {
    OfferTerms { token_amount: amount_tokens * TOKEN, discount_bps: 0, currency, lockup_secs }
}

fn paid_offer(desk: &mut Desk<Id>, lockup_secs: i64) -> u64 {
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, lockup_secs), T0).unwrap();
    desk.approve_offer(AGENT, id, T0).unwrap();
    desk.fulfill_offer(BUYER, id, PaymentCurrency::Stable, 100_000_000, T0).unwrap();
    id
}

#[test]
fn lockups_beyond_two_years_always_fail() {
    let mut desk = desk();
    let mut limits = desk.state().limits;
    limits.max_lockup_secs = 2 * 365 * DAY;
    desk.set_limits(OWNER, limits).unwrap();
    for lockup in [2 * 365 * DAY + 1, 3 * 365 * DAY, i64::MAX / 2] {
        assert_eq!(
            desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, lockup), T0),
            Err(DeskError::LockupTooLong)
        );
    }
    assert!(desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 2 * 365 * DAY), T0).is_ok());
}

#[test]
fn zero_identities_are_rejected() {
    let mut desk = desk();
    assert_eq!(desk.set_agent(OWNER, ZERO), Err(DeskError::InvalidAddress));
    assert_eq!(desk.withdraw_tokens(OWNER, ZERO, TOKEN), Err(DeskError::InvalidAddress));
    assert_eq!(
        desk.withdraw_treasury(OWNER, PaymentCurrency::Stable, ZERO, 0),
        Err(DeskError::InvalidAddress)
    );
    assert_eq!(
        desk.withdraw_treasury(OWNER, PaymentCurrency::Native, ZERO, 0),
        Err(DeskError::InvalidAddress)
    );
    assert_eq!(desk.transfer_ownership(OWNER, ZERO), Err(DeskError::InvalidAddress));
    assert_eq!(desk.agent(), AGENT);
}

#[test]
fn excess_native_payment_is_refunded() {
    let mut desk = desk();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Native, 0), T0).unwrap();
    desk.approve_offer(AGENT, id, T0).unwrap();
    let required = desk.required_native_amount(id).unwrap();
    assert_eq!(required, 33_333_333_333_333_334);

    let sent = required * 2;
    let payment = desk.fulfill_offer(BUYER, id, PaymentCurrency::Native, sent, T0).unwrap();
    assert_eq!(payment.required, required);
    assert_eq!(sent - payment.refund, required);
    assert_eq!(desk.treasury().native, required);
    assert_eq!(desk.offer(id).unwrap().amount_paid, required);
}

#[test]
fn auto_claim_mixed_ids() {
    let mut desk = desk();
    let id = paid_offer(&mut desk, 0);
    let report = desk.auto_claim(AGENT, &[0, 999_999, id], T0).unwrap();
    assert_eq!(report.claimed_ids(), vec![id]);
    assert_eq!(report.skipped.len(), 2);
    assert!(desk.offer(id).unwrap().fulfilled);

    let too_many: Vec<u64> = (0..51).collect();
    assert_eq!(desk.auto_claim(AGENT, &too_many, T0), Err(DeskError::BatchTooLarge));
}

#[test]
fn second_approval_conflicts() {
    let mut desk = desk();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    assert_eq!(desk.approve_offer(AGENT, id, T0), Ok(true));
    assert_eq!(desk.approve_offer(AGENT, id, T0), Err(DeskError::ApprovalConflict));
    assert_eq!(desk.approve_offer(APPROVER, id, T0), Err(DeskError::ApprovalConflict));
    assert_eq!(desk.approve_offer(STRANGER, id, T0), Err(DeskError::Unauthorized));
}

#[test]
fn price_drift_between_quote_and_approval() {
    let mut desk = desk();
    let a = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    let b = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();

    desk.set_prices(OWNER, 12_500_000, ETH_PRICE, 3600, T0 + 60).unwrap();
    assert_eq!(desk.approve_offer(AGENT, a, T0 + 60), Err(DeskError::PriceDeviationExceeded));

    desk.set_prices(OWNER, 11_500_000, ETH_PRICE, 3600, T0 + 120).unwrap();
    assert_eq!(desk.approve_offer(AGENT, b, T0 + 120), Ok(true));
    // payment still uses the creation snapshot
    assert_eq!(desk.required_stable_amount(b), Ok(100_000_000));
}

#[test]
fn stale_price_blocks_approval() {
    let mut desk = desk();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    assert_eq!(desk.approve_offer(AGENT, id, T0 + 3601), Err(DeskError::StalePrice));
}

#[test]
fn open_offer_listing_is_bounded() {
    let mut desk = desk();
    desk.set_max_open_offers_to_return(OWNER, 5).unwrap();
    for _ in 0..10 {
        desk.create_offer(BUYER, terms(100, PaymentCurrency::Stable, 0), T0).unwrap();
    }
    assert_eq!(desk.open_offer_ids(100), vec![1, 2, 3, 4, 5]);
    assert_eq!(desk.open_offer_ids(3).len(), 3);
    assert_eq!(desk.max_open_offers_to_return(), 5);

    desk.cancel_offer(AGENT, 1, T0).unwrap();
    assert_eq!(desk.open_offer_ids(100), vec![2, 3, 4, 5, 6]);
    assert_eq!(desk.offers_for_beneficiary(&BUYER).len(), 10);
    assert!(desk.offers_for_beneficiary(&STRANGER).is_empty());
}

#[test]
fn withdraw_tokens_respects_reservations() {
    let mut desk = desk();
    desk.create_offer(BUYER, terms(10_000, PaymentCurrency::Stable, 0), T0).unwrap();
    assert_eq!(desk.available_token_inventory(), 990_000 * TOKEN);
    assert_eq!(
        desk.withdraw_tokens(OWNER, OWNER, 990_000 * TOKEN + 1),
        Err(DeskError::ReservedBalanceViolation)
    );
    desk.withdraw_tokens(OWNER, OWNER, 990_000 * TOKEN).unwrap();
    assert_eq!(desk.available_token_inventory(), 0);
    assert_eq!(desk.withdraw_tokens(OWNER, OWNER, 1), Err(DeskError::ReservedBalanceViolation));
}

#[test]
fn claim_rules() {
    let mut desk = desk();
    let id = paid_offer(&mut desk, 7 * DAY);
    assert_eq!(desk.claim(BUYER, id, T0 + DAY), Err(DeskError::LockupNotElapsed));
    assert_eq!(desk.claim(STRANGER, id, T0 + 7 * DAY), Err(DeskError::UnauthorizedClaimant));
    let delivery = desk.claim(BUYER, id, T0 + 7 * DAY).unwrap();
    assert_eq!(delivery.amount, 1_000 * TOKEN);
    assert_eq!(desk.claim(BUYER, id, T0 + 8 * DAY), Err(DeskError::BadState));
    assert_eq!(desk.state().inventory.total(), 999_000 * TOKEN);
    assert_eq!(desk.state().inventory.reserved(), 0);
}

#[test]
fn repeated_settlement_converges_to_one_payment() {
    let mut desk = desk();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    let approvals: Vec<_> = [AGENT, AGENT, APPROVER].iter().map(|who| desk.approve_offer(*who, id, T0)).collect();
    assert_eq!(approvals.iter().filter(|r| r.is_ok()).count(), 1);

    let payments: Vec<_> = (0..3)
        .map(|_| desk.fulfill_offer(BUYER, id, PaymentCurrency::Stable, 100_000_000, T0))
        .collect();
    assert_eq!(payments.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(payments[1], Err(DeskError::BadState));
    assert_eq!(desk.treasury().stable, 100_000_000);
}

#[test]
fn cancel_releases_reservation() {
    let mut desk = desk();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    assert_eq!(desk.cancel_offer(BUYER, id, T0 + 10), Err(DeskError::QuoteNotExpired));
    desk.cancel_offer(BUYER, id, T0 + 1800).unwrap();
    assert_eq!(desk.available_token_inventory(), 1_000_000 * TOKEN);
    assert_eq!(desk.offer(id).unwrap().status(), OfferStatus::Cancelled);
    assert_eq!(desk.approve_offer(AGENT, id, T0 + 1800), Err(DeskError::BadState));
}

#[test]
fn emergency_refund_of_paid_offer() {
    let mut desk = desk();
    let id = paid_offer(&mut desk, 30 * DAY);
    desk.set_emergency_refund(OWNER, true, 90 * DAY).unwrap();
    assert!(desk.emergency_refunds_enabled());
    // unlock + 30 days comes before the 90 day deadline
    assert_eq!(desk.emergency_refund(BUYER, id, T0 + 59 * DAY), Err(DeskError::TooEarlyForRefund));
    let refund = desk.emergency_refund(BUYER, id, T0 + 60 * DAY).unwrap();
    assert_eq!((refund.to, refund.amount), (BUYER, 100_000_000));
    assert_eq!(desk.treasury().stable, 0);
    assert_eq!(desk.available_token_inventory(), 1_000_000 * TOKEN);
    assert_eq!(desk.claim(BUYER, id, T0 + 60 * DAY), Err(DeskError::BadState));
}

#[test]
fn pause_blocks_flow_but_not_admin() {
    let mut desk = desk();
    desk.pause(AGENT).unwrap_err();
    desk.pause(OWNER).unwrap();
    assert_eq!(
        desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0),
        Err(DeskError::Paused)
    );
    assert_eq!(desk.auto_claim(AGENT, &[1], T0), Err(DeskError::Paused));
    desk.set_agent(OWNER, STRANGER).unwrap();
    desk.unpause(OWNER).unwrap();
    assert!(desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).is_ok());
}

#[test]
fn consignment_lifecycle() {
    let mut desk = desk();
    desk.set_required_gas_deposit(OWNER, 1_000_000).unwrap();
    let params = ConsignmentParams {
        token_id: [0; 32],
        amount: 20_000 * TOKEN,
        terms: ConsignmentTerms::Fixed { discount_bps: 1_000, lockup_days: 30 },
        min_deal_amount: 1_000 * TOKEN,
        max_deal_amount: 10_000 * TOKEN,
        is_fractionalized: true,
        is_private: false,
        allow_list: Vec::new(),
        max_price_volatility_bps: 500,
        max_time_to_execute_secs: 600,
    };
    let cid = desk.create_consignment(SELLER, params, 1_000_000, T0).unwrap();
    assert_eq!(desk.available_token_inventory(), 1_000_000 * TOKEN);

    let offer_terms = OfferTerms {
        token_amount: 5_000 * TOKEN,
        discount_bps: 1_000,
        currency: PaymentCurrency::Stable,
        lockup_secs: 30 * DAY,
    };
    let a = desk.create_offer_from_consignment(BUYER, cid, offer_terms, T0).unwrap();
    let b = desk.create_offer_from_consignment(BUYER, cid, offer_terms, T0).unwrap();
    assert_eq!(desk.consignment(cid).unwrap().remaining_amount, 10_000 * TOKEN);

    // consignment's own volatility bound: 6% drift is too much at 5%
    desk.set_prices(OWNER, 10_600_000, ETH_PRICE, 3600, T0 + 10).unwrap();
    assert_eq!(desk.approve_offer(AGENT, a, T0 + 10), Err(DeskError::PriceDeviationExceeded));
    desk.set_prices(OWNER, 10_400_000, ETH_PRICE, 3600, T0 + 20).unwrap();
    desk.approve_offer(AGENT, a, T0 + 20).unwrap();
    desk.approve_offer(AGENT, b, T0 + 20).unwrap();

    // execution window is shorter than the quote window
    assert_eq!(
        desk.fulfill_offer(BUYER, b, PaymentCurrency::Stable, 450_000_000, T0 + 601),
        Err(DeskError::OfferExpired)
    );
    desk.fulfill_offer(BUYER, a, PaymentCurrency::Stable, 450_000_000, T0 + 600).unwrap();
    assert_eq!(desk.withdraw_consignment(SELLER, cid), Err(DeskError::ConsignmentHasPendingOffers));

    desk.cancel_offer(AGENT, b, T0 + 700).unwrap();
    assert_eq!(desk.consignment(cid).unwrap().remaining_amount, 15_000 * TOKEN);

    let out = desk.withdraw_consignment(SELLER, cid).unwrap();
    assert_eq!((out.tokens, out.deposit), (15_000 * TOKEN, 1_000_000));
    assert_eq!(desk.treasury().deposits, 0);
    assert_eq!(
        desk.create_offer_from_consignment(BUYER, cid, offer_terms, T0 + 800),
        Err(DeskError::ConsignmentInactive)
    );

    desk.claim(BUYER, a, T0 + 30 * DAY).unwrap();
    assert_eq!(desk.state().inventory.total(), 1_000_000 * TOKEN);
    assert_eq!(desk.state().inventory.reserved(), 0);
}

#[test]
fn events_record_successful_writes_only() {
    let mut desk = desk();
    desk.take_events();
    let id = desk.create_offer(BUYER, terms(1_000, PaymentCurrency::Stable, 0), T0).unwrap();
    let _ = desk.approve_offer(STRANGER, id, T0);
    desk.approve_offer(AGENT, id, T0).unwrap();

    let events = desk.take_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], DeskEvent::OfferCreated { offer_id: 1, .. }));
    assert_eq!(events[1], DeskEvent::OfferApproved { offer_id: 1, approver: AGENT, fully_approved: true });

    let json = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(json["event"], "OfferApproved");
    assert_eq!(json["offer_id"], 1);
    assert!(desk.take_events().is_empty());
}

#[test]
fn every_owner_setter_is_logged() {
    let mut desk = desk();
    desk.take_events();
    assert_eq!(desk.set_max_open_offers_to_return(STRANGER, 10), Err(DeskError::Unauthorized));
    assert_eq!(desk.set_required_gas_deposit(STRANGER, 1), Err(DeskError::Unauthorized));
    assert!(desk.take_events().is_empty());

    desk.set_max_open_offers_to_return(OWNER, 10).unwrap();
    desk.set_required_gas_deposit(OWNER, TOKEN / 100).unwrap();
    assert_eq!(
        desk.take_events(),
        vec![
            DeskEvent::MaxOpenOffersUpdated { max: 10 },
            DeskEvent::RequiredGasDepositUpdated { amount: TOKEN / 100 },
        ]
    );
}

#[test]
fn unknown_ids() {
    let mut desk = desk();
    assert_eq!(desk.approve_offer(AGENT, 42, T0), Err(DeskError::UnknownOffer));
    assert_eq!(desk.required_stable_amount(42), Err(DeskError::UnknownOffer));
    assert_eq!(desk.withdraw_consignment(SELLER, 1), Err(DeskError::UnknownConsignment));
}
