//! Contract-level security checks: revert strings, refunds, batch limits and
//! price drift, driven the way a wallet would call the desk.

use otc_evm::*;
use otc_protocol::{DeskError, DeskEvent};

const E18: u128 = 1_000_000_000_000_000_000;
const USDC: u128 = 1_000_000;
const T0: i64 = 1_700_000_000;
const DAY: i64 = 86_400;

struct Fixture {
    owner: Address,
    agent: Address,
    user: Address,
    approver: Address,
    attacker: Address,
    desk: OtcContract,
}

fn at(who: Address) -> Msg {
    Msg::new(who, T0)
}

fn deploy() -> Fixture {
    let [owner, agent, user, approver, attacker] = [1, 2, 3, 4, 5].map(Address::from_low_u64);
    let desk_addr = Address::from_low_u64(100);

    let mut token = Erc20::new("ElizaOS", 18);
    token.mint(owner, 1_000_000 * E18).unwrap();
    token.approve(owner, desk_addr, 1_000_000 * E18);
    let mut usdc = Erc20::new("USDC", 6);
    usdc.mint(user, 1_000_000 * USDC).unwrap();

    let token_usd = MockAggregator::new(8, 10_000_000, T0); // $0.1
    let eth_usd = MockAggregator::new(8, 3000_00000000, T0); // $3000

    let mut desk = OtcContract::deploy(desk_addr, owner, token, usdc, token_usd, eth_usd, agent, [0; 32]).unwrap();
    desk.eth.mint(user, 10 * E18).unwrap();
    desk.eth.mint(attacker, 10 * E18).unwrap();

    let as_owner = Msg::new(owner, T0);
    desk.deposit_tokens(&as_owner, 1_000_000 * E18).unwrap();
    desk.set_approver(&as_owner, approver, true).unwrap();
    desk.set_limits(&as_owner, 5_00000000, 10_000 * E18, 30 * 60, 0).unwrap();

    Fixture { owner, agent, user, approver, attacker, desk }
}

#[test]
fn prevents_zero_agent() {
    let mut f = deploy();
    let err = f.desk.set_agent(&at(f.owner), Address::ZERO).unwrap_err();
    assert_eq!(err.reason(), "zero agent");
    assert_eq!(f.desk.agent(), f.agent);
}

#[test]
fn prevents_withdrawal_to_zero_address() {
    let mut f = deploy();
    let err = f.desk.withdraw_stable(&at(f.owner), Address::ZERO, 0, 100).unwrap_err();
    assert_eq!(err.reason(), "zero addr");
}

#[test]
fn enforces_maximum_lockup() {
    let mut f = deploy();
    let two_years = 2 * 365 * DAY;
    let err = f.desk.create_offer(&at(f.user), 1_000 * E18, 0, 1, two_years).unwrap_err();
    assert_eq!(err.reason(), "lockup too long");
}

#[test]
fn refunds_excess_eth() {
    let mut f = deploy();
    f.desk.create_offer(&at(f.user), 1_000 * E18, 0, 0, 0).unwrap();
    let offer_id = f.desk.get_open_offer_ids(usize::MAX)[0];
    f.desk.approve_offer(&at(f.approver), offer_id).unwrap();

    let required = f.desk.required_eth_wei(offer_id).unwrap();
    let total_sent = required + E18 / 10;
    let before = f.desk.eth.balance_of(&f.user);
    let paid = f.desk.fulfill_offer(&at(f.user).with_value(total_sent), offer_id).unwrap();
    let spent = before - f.desk.eth.balance_of(&f.user);

    assert_eq!(paid, required);
    assert_eq!(spent, required);
    assert_eq!(f.desk.eth.balance_of(&f.desk.address), required);
}

#[test]
fn limits_auto_claim_batch_size() {
    let mut f = deploy();
    let ids: Vec<u64> = (1..=51).collect();
    let err = f.desk.auto_claim(&at(f.approver), &ids).unwrap_err();
    assert_eq!(err.reason(), "batch too large");
}

#[test]
fn auto_claim_skips_invalid_ids() {
    let mut f = deploy();
    let report = f.desk.auto_claim(&at(f.approver), &[0, 999_999, 1]).unwrap();
    assert!(report.claimed.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert!(report.skipped.iter().all(|(_, e)| *e == DeskError::UnknownOffer));
}

#[test]
fn prevents_double_approval() {
    let mut f = deploy();
    f.desk.create_offer(&at(f.user), 1_000 * E18, 0, 1, 0).unwrap();
    let offer_id = f.desk.get_open_offer_ids(usize::MAX)[0];
    f.desk.approve_offer(&at(f.approver), offer_id).unwrap();
    let err = f.desk.approve_offer(&at(f.approver), offer_id).unwrap_err();
    assert_eq!(err.reason(), "already approved");
}

#[test]
fn rejects_approval_if_price_moved_too_much() {
    let mut f = deploy();
    f.desk.create_offer(&at(f.user), 1_000 * E18, 0, 1, 0).unwrap();
    let offer_id = f.desk.get_open_offer_ids(usize::MAX)[0];

    f.desk.token_usd_feed().set_answer(12_500_000, T0); // +25%
    let err = f.desk.approve_offer(&at(f.approver), offer_id).unwrap_err();
    assert_eq!(err.reason(), "price moved too much");

    f.desk.token_usd_feed().set_answer(11_500_000, T0); // +15%
    f.desk.approve_offer(&at(f.approver), offer_id).unwrap();
}

#[test]
fn open_offer_ids_are_bounded() {
    let mut f = deploy();
    f.desk.set_max_open_offers_to_return(&at(f.owner), 4).unwrap();
    for _ in 0..10 {
        f.desk.create_offer(&at(f.user), 100 * E18, 0, 1, 0).unwrap();
    }
    let open = f.desk.get_open_offer_ids(usize::MAX);
    assert!(open.len() <= f.desk.max_open_offers_to_return());
    assert_eq!(open, vec![1, 2, 3, 4]);
    assert_eq!(f.desk.get_open_offer_ids(2), vec![1, 2]);
    assert!(f.desk.get_open_offer_ids(0).is_empty());
    assert_eq!(f.desk.get_offers_for_beneficiary(&f.user).len(), 10);
}

#[test]
fn usdc_purchase_and_claim_after_lockup() {
    let mut f = deploy();
    f.desk.create_offer(&at(f.user), 1_000 * E18, 1_000, 1, 7 * DAY).unwrap();
    f.desk.approve_offer(&at(f.agent), 1).unwrap();
    assert_eq!(f.desk.required_usdc_amount(1), Ok(90 * USDC));

    let desk_addr = f.desk.address;
    f.desk.usdc.approve(f.user, desk_addr, 90 * USDC);
    f.desk.fulfill_offer(&at(f.user), 1).unwrap();
    assert_eq!(f.desk.usdc.balance_of(&desk_addr), 90 * USDC);

    let err = f.desk.claim(&at(f.user), 1).unwrap_err();
    assert_eq!(err.reason(), "locked");
    let later = Msg::new(f.user, T0 + 7 * DAY);
    assert_eq!(f.desk.claim(&Msg::new(f.attacker, T0 + 7 * DAY), 1), Err(Revert::Desk(DeskError::UnauthorizedClaimant)));
    f.desk.claim(&later, 1).unwrap();
    assert_eq!(f.desk.token.balance_of(&f.user), 1_000 * E18);

    f.desk.withdraw_stable(&at(f.owner), f.owner, 90 * USDC, 0).unwrap();
    assert_eq!(f.desk.usdc.balance_of(&f.owner), 90 * USDC);
}

#[test]
fn failed_call_rolls_back_everything() {
    let mut f = deploy();
    f.desk.create_offer(&at(f.user), 1_000 * E18, 0, 1, 0).unwrap();
    f.desk.approve_offer(&at(f.agent), 1).unwrap();
    f.desk.take_logs();

    // no USDC allowance, and the ether sent along must come back too
    let before = f.desk.eth.balance_of(&f.user);
    let err = f.desk.fulfill_offer(&at(f.user).with_value(E18), 1).unwrap_err();
    assert_eq!(err, Revert::InsufficientAllowance);
    assert!(!f.desk.offers(1).unwrap().paid);
    assert_eq!(f.desk.eth.balance_of(&f.user), before);
    assert!(f.desk.take_logs().is_empty());
}

#[test]
fn deploy_rejects_oversized_token_decimals() {
    let [owner, agent] = [1, 2].map(Address::from_low_u64);
    let feed = || MockAggregator::new(8, 10_000_000, T0);
    for decimals in [31, 36, 40] {
        let result = OtcContract::deploy(
            Address::from_low_u64(100),
            owner,
            Erc20::new("WIDE", decimals),
            Erc20::new("USDC", 6),
            feed(),
            feed(),
            agent,
            [0; 32],
        );
        assert_eq!(result.err(), Some(Revert::Desk(DeskError::AmountRange)));
    }
}

#[test]
fn consignment_deposit_round_trip() {
    let mut f = deploy();
    let seller = Address::from_low_u64(6);
    let desk_addr = f.desk.address;
    f.desk.token.mint(seller, 50_000 * E18).unwrap();
    f.desk.token.approve(seller, desk_addr, 50_000 * E18);
    f.desk.eth.mint(seller, E18).unwrap();
    f.desk.set_required_gas_deposit(&at(f.owner), E18 / 100).unwrap();

    let args = ConsignmentArgs {
        token_id: [0; 32],
        amount: 50_000 * E18,
        is_negotiable: true,
        fixed_discount_bps: 0,
        fixed_lockup_days: 0,
        min_discount_bps: 0,
        max_discount_bps: 2_500,
        min_lockup_days: 0,
        max_lockup_days: 180,
        min_deal_amount: 100 * E18,
        max_deal_amount: 10_000 * E18,
        is_fractionalized: true,
        is_private: false,
        max_price_volatility_bps: 1_000,
        max_time_to_execute_secs: 0,
    };
    let low = f.desk.create_consignment(&Msg::new(seller, T0).with_value(E18 / 200), args.clone(), Vec::new());
    assert_eq!(low, Err(Revert::Desk(DeskError::InsufficientDeposit)));
    assert_eq!(f.desk.eth.balance_of(&seller), E18);

    let cid = f.desk.create_consignment(&Msg::new(seller, T0).with_value(E18 / 100), args, Vec::new()).unwrap();
    assert_eq!(f.desk.token.balance_of(&seller), 0);

    let offer_id = f.desk.create_offer_from_consignment(&at(f.user), cid, 2_000 * E18, 2_000, 1, 30 * DAY).unwrap();
    let err = f.desk.withdraw_consignment(&Msg::new(seller, T0), cid).unwrap_err();
    assert_eq!(err.reason(), "consignment has pending offers");

    f.desk.cancel_offer(&at(f.agent), offer_id).unwrap();
    f.desk.withdraw_consignment(&Msg::new(seller, T0), cid).unwrap();
    assert_eq!(f.desk.token.balance_of(&seller), 50_000 * E18);
    assert_eq!(f.desk.eth.balance_of(&seller), E18);

    let logs = f.desk.take_logs();
    assert!(logs.iter().any(|e| matches!(e, DeskEvent::ConsignmentWithdrawn { deposit, .. } if *deposit == E18 / 100)));
}
