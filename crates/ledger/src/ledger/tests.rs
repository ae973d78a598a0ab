// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Tests module for `Ledger`.

use std::{cell::RefCell, rc::Rc};

use alloy_primitives::{Address, B256, Bytes, U160, U256};
use flashpool_common::testing::init_logger_for_testing;
use flashpool_math::{FeesPerLiquidity, tick_math::get_sqrt_ratio_at_tick};
use log::LevelFilter;
use proptest::prelude::*;
use rstest::{fixture, rstest};

use crate::{
    config::LedgerConfig,
    error::LedgerError,
    extension::{CallPoints, Hook},
    ledger::Ledger,
    pool::{BalanceUpdate, SwapParams},
    session::{Session, SessionId},
    slots::{PoolKey, PositionKey},
    stubs::*,
    token::{TokenBehavior, encode_uint},
};

const RESERVE: u128 = 1_000_000_000;
const E18: i128 = 1_000_000_000_000_000_000;

fn sqrt_at(tick: i32) -> U160 {
    get_sqrt_ratio_at_tick(tick).unwrap()
}

/// Pays or withdraws whatever the session still owes or is owed in either token.
fn settle(ledger: &mut Ledger, caller: Address, session: Session) -> Result<(), LedgerError> {
    for token in [TOKEN0, TOKEN1] {
        let debt = ledger.debt(session.id, token);
        if debt > 0 {
            ledger.pay(caller, token, debt.unsigned_abs())?;
        } else if debt < 0 {
            ledger.withdraw(caller, token, caller, debt.unsigned_abs())?;
        }
    }
    Ok(())
}

fn update_settled(
    ledger: &mut Ledger,
    caller: Address,
    key: &PoolKey,
    position: &PositionKey,
    liquidity_delta: i128,
) -> BalanceUpdate {
    ledger
        .lock(caller, |ledger, session| {
            let update = ledger.update_position(caller, key, position, liquidity_delta)?;
            settle(ledger, caller, session)?;
            Ok(update)
        })
        .unwrap()
}

fn swap_settled(
    ledger: &mut Ledger,
    caller: Address,
    key: &PoolKey,
    params: SwapParams,
) -> BalanceUpdate {
    ledger
        .lock(caller, |ledger, session| {
            let update = ledger.swap(caller, key, params)?;
            settle(ledger, caller, session)?;
            Ok(update)
        })
        .unwrap()
}

fn collect_settled(
    ledger: &mut Ledger,
    caller: Address,
    key: &PoolKey,
    position: &PositionKey,
) -> (u128, u128) {
    ledger
        .lock(caller, |ledger, session| {
            let fees = ledger.collect_fees(caller, key, position)?;
            settle(ledger, caller, session)?;
            Ok(fees)
        })
        .unwrap()
}

#[fixture]
fn market(mut ledger: Ledger) -> Ledger {
    ledger.initialize_pool(ALICE, &pool_key(), 0).unwrap();
    ledger
}

#[fixture]
fn reserved(mut ledger: Ledger) -> Ledger {
    let this = ledger.address();
    ledger.mint_tokens(TOKEN0, this, RESERVE).unwrap();
    ledger.mint_tokens(TOKEN1, this, RESERVE).unwrap();
    ledger
}

fn with_extension(config: LedgerConfig, extension: &TestExtension) -> Ledger {
    let mut ledger = ledger(config);
    ledger
        .register_extension(EXTENSION, Rc::new(extension.clone()))
        .unwrap();
    ledger
}

// -- CONSTRUCTION ----------------------------------------------------------------------------

#[rstest]
fn test_new_rejects_invalid_config() {
    let config = LedgerConfig {
        withdrawal_fee_pips: 1_000_000,
        ..LedgerConfig::default()
    };
    assert!(Ledger::new(config).is_err());
}

// -- SESSIONS --------------------------------------------------------------------------------

#[rstest]
fn test_lock_opens_and_closes_session(mut ledger: Ledger) {
    assert_eq!(ledger.current_session(), None);

    let session = ledger
        .lock(ALICE, |ledger, session| {
            assert_eq!(ledger.current_session(), Some(session));
            assert!(ledger.in_transaction());
            Ok(session)
        })
        .unwrap();

    assert_eq!(session, Session::new(SessionId::new(1), ALICE));
    assert_eq!(ledger.current_session(), None);
    assert!(!ledger.in_transaction());
}

#[rstest]
fn test_nested_lock_opens_new_session(mut ledger: Ledger) {
    let (outer, inner) = ledger
        .lock(ALICE, |ledger, outer| {
            let inner = ledger.lock(BOB, |ledger, inner| {
                assert_eq!(ledger.current_session(), Some(inner));
                Ok(inner)
            })?;
            assert_eq!(ledger.current_session(), Some(outer));
            Ok((outer, inner))
        })
        .unwrap();

    assert_eq!(outer.id, SessionId::new(1));
    assert_eq!(inner, Session::new(SessionId::new(2), BOB));
}

#[rstest]
fn test_session_ids_restart_with_each_transaction(mut ledger: Ledger) {
    let first = ledger.lock(ALICE, |_, session| Ok(session.id)).unwrap();
    let second = ledger.lock(BOB, |_, session| Ok(session.id)).unwrap();
    assert_eq!(first, SessionId::new(1));
    assert_eq!(second, SessionId::new(1));
}

#[rstest]
fn test_unsettled_session_fails_and_rolls_back(mut reserved: Ledger) {
    // Another test may have installed the logger already
    let _guard = init_logger_for_testing(Some(LevelFilter::Debug)).ok();

    let result = reserved.lock(ALICE, |ledger, _| ledger.withdraw(ALICE, TOKEN0, BOB, 100));

    assert_eq!(
        result,
        Err(LedgerError::DebtsNotSettled {
            session: SessionId::new(1),
            nonzero: 1
        })
    );
    assert_eq!(reserved.token_balance(TOKEN0, BOB), FUNDING);
    assert_eq!(reserved.token_balance(TOKEN0, reserved.address()), RESERVE);
    assert!(!reserved.in_transaction());
}

#[rstest]
fn test_operations_outside_session_fail(mut market: Ledger) {
    let key = pool_key();
    assert_eq!(
        market.withdraw(ALICE, TOKEN0, ALICE, 1),
        Err(LedgerError::NotLocked)
    );
    assert_eq!(
        market.swap(ALICE, &key, SwapParams::new(1, false, sqrt_at(-10), 0)),
        Err(LedgerError::NotLocked)
    );
    assert_eq!(
        market.forward(ALICE, EXTENSION, &[]),
        Err(LedgerError::NotLocked)
    );
}

#[rstest]
fn test_swallowed_error_poisons_transaction(mut reserved: Ledger) {
    let result = reserved.lock(ALICE, |ledger, _| {
        let inner = ledger.withdraw(BOB, TOKEN0, BOB, 1);
        assert!(inner.is_err());
        Ok(())
    });

    assert_eq!(
        result,
        Err(LedgerError::SessionNotHeld {
            caller: BOB,
            session: Session::new(SessionId::new(1), ALICE),
        })
    );
    assert_eq!(reserved.token_balance(TOKEN0, BOB), FUNDING);
}

#[rstest]
fn test_failed_swap_leaves_pool_unchanged(mut market: Ledger) {
    let key = pool_key();
    update_settled(&mut market, ALICE, &key, &position_key(-100, 100), 1_000_000);
    let before = market.pool_state(&key);

    let result = market.lock(ALICE, |ledger, _| {
        ledger
            .swap(ALICE, &key, SwapParams::new(1_000, false, sqrt_at(-50), 0))
            .map(|_| ())
    });

    assert!(matches!(result, Err(LedgerError::DebtsNotSettled { .. })));
    assert_eq!(market.pool_state(&key), before);
}

// -- PAYMENTS --------------------------------------------------------------------------------

#[rstest]
fn test_withdraw_then_pay_settles(mut reserved: Ledger) {
    reserved
        .lock(ALICE, |ledger, session| {
            ledger.withdraw(ALICE, TOKEN0, BOB, 100)?;
            assert_eq!(ledger.debt(session.id, TOKEN0), 100);

            let paid = ledger.pay(ALICE, TOKEN0, 100)?;
            assert_eq!(paid, 100);
            assert_eq!(ledger.nonzero_debt_count(session.id), 0);
            Ok(())
        })
        .unwrap();

    assert_eq!(reserved.token_balance(TOKEN0, ALICE), FUNDING - 100);
    assert_eq!(reserved.token_balance(TOKEN0, BOB), FUNDING + 100);
    assert_eq!(reserved.token_balance(TOKEN0, reserved.address()), RESERVE);
}

#[rstest]
fn test_withdraw_many_charges_debts_together(mut reserved: Ledger) {
    reserved
        .lock(ALICE, |ledger, session| {
            ledger.withdraw_many(
                ALICE,
                &[(TOKEN0, BOB, 10), (TOKEN1, BOB, 20), (TOKEN0, BOB, 5)],
            )?;
            assert_eq!(ledger.debt(session.id, TOKEN0), 15);
            assert_eq!(ledger.debt(session.id, TOKEN1), 20);
            assert_eq!(ledger.nonzero_debt_count(session.id), 2);
            settle(ledger, ALICE, session)
        })
        .unwrap();

    assert_eq!(reserved.token_balance(TOKEN0, BOB), FUNDING + 15);
    assert_eq!(reserved.token_balance(TOKEN1, BOB), FUNDING + 20);
}

#[rstest]
fn test_withdraw_beyond_debt_bound_fails(mut reserved: Ledger) {
    let result = reserved.lock(ALICE, |ledger, _| {
        ledger.withdraw(ALICE, TOKEN0, BOB, u128::MAX)
    });
    assert_eq!(result, Err(LedgerError::Overflow("withdrawal")));
}

#[rstest]
fn test_payment_credits_balance_increase(mut reserved: Ledger) {
    let this = reserved.address();
    reserved
        .lock(ALICE, |ledger, session| {
            ledger.start_payment(ALICE, TOKEN0)?;
            ledger.transfer_token(TOKEN0, BOB, this, 250)?;
            let paid = ledger.complete_payment(ALICE, TOKEN0)?;
            assert_eq!(paid, 250);
            assert_eq!(ledger.debt(session.id, TOKEN0), -250);

            ledger.withdraw(ALICE, TOKEN0, ALICE, 250)
        })
        .unwrap();

    assert_eq!(reserved.token_balance(TOKEN0, ALICE), FUNDING + 250);
    assert_eq!(reserved.token_balance(TOKEN0, BOB), FUNDING - 250);
}

#[rstest]
fn test_balance_decrease_credits_nothing(mut reserved: Ledger) {
    reserved
        .lock(ALICE, |ledger, session| {
            ledger.start_payment(ALICE, TOKEN0)?;
            ledger.withdraw(ALICE, TOKEN0, BOB, 100)?;
            assert_eq!(ledger.complete_payment(ALICE, TOKEN0)?, 0);
            assert_eq!(ledger.debt(session.id, TOKEN0), 100);
            settle(ledger, ALICE, session)
        })
        .unwrap();
}

#[rstest]
fn test_complete_payment_requires_start(mut ledger: Ledger) {
    let result = ledger.lock(ALICE, |ledger, _| ledger.complete_payment(ALICE, TOKEN0));
    assert_eq!(result, Err(LedgerError::PaymentNotStarted(TOKEN0)));
}

#[rstest]
fn test_broken_balance_query_fails_payment(mut ledger: Ledger) {
    ledger.set_token_behavior(TOKEN0, Rc::new(BrokenBalanceToken));
    let result = ledger.lock(ALICE, |ledger, _| ledger.start_payment(ALICE, TOKEN0));
    assert_eq!(
        result,
        Err(LedgerError::BalanceQueryFailed {
            token: TOKEN0,
            reason: "expected 32 bytes of return data, received 31".to_string(),
        })
    );
}

#[rstest]
#[case::no_return_data(Rc::new(NoReturnToken), None)]
#[case::short_return_data(Rc::new(ShortReturnToken), Some("invalid return data"))]
#[case::returns_false(Rc::new(FalseReturnToken), Some("invalid return data"))]
#[case::reverting(Rc::new(RevertingToken), Some("reverted: paused"))]
fn test_pay_classifies_transfer_outcome(
    mut ledger: Ledger,
    #[case] behavior: Rc<dyn TokenBehavior>,
    #[case] failure: Option<&str>,
) {
    ledger.set_token_behavior(TOKEN0, behavior);

    let result = ledger.lock(ALICE, |ledger, session| {
        let paid = ledger.pay(ALICE, TOKEN0, 100)?;
        assert_eq!(ledger.debt(session.id, TOKEN0), -100);
        ledger.withdraw(ALICE, TOKEN0, ALICE, paid)
    });

    match failure {
        None => assert_eq!(result, Ok(())),
        Some(reason) => assert_eq!(
            result,
            Err(LedgerError::TransferFailed {
                token: TOKEN0,
                reason: reason.to_string(),
            })
        ),
    }
    assert_eq!(ledger.token_balance(TOKEN0, ALICE), FUNDING);
    assert_eq!(ledger.token_balance(TOKEN0, ledger.address()), 0);
}

#[rstest]
fn test_reentrant_token_cannot_act_on_foreign_session(mut reserved: Ledger) {
    let token = ReentrantToken::new(Rc::new(|ledger: &mut Ledger| {
        ledger.withdraw(TOKEN1, TOKEN1, TOKEN1, 1)
    }));
    reserved.set_token_behavior(TOKEN1, Rc::new(token.clone()));

    let result = reserved.lock(ALICE, |ledger, _| ledger.pay(ALICE, TOKEN1, 100).map(|_| ()));

    match result {
        Err(LedgerError::TransferFailed { token, reason }) => {
            assert_eq!(token, TOKEN1);
            assert!(reason.contains("does not hold session"), "{reason}");
        }
        other => panic!("Expected a failed transfer, was {other:?}"),
    }
    assert_eq!(*token.calls.borrow(), 1);
    assert_eq!(reserved.token_balance(TOKEN1, ALICE), FUNDING);
    assert_eq!(reserved.token_balance(TOKEN1, TOKEN1), 0);
}

#[rstest]
fn test_reentrant_token_opens_its_own_session(mut ledger: Ledger) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_by_token = Rc::clone(&seen);
    let token = ReentrantToken::new(Rc::new(move |ledger: &mut Ledger| {
        ledger.lock(TOKEN1, |_, session| {
            seen_by_token.borrow_mut().push(session);
            Ok(())
        })
    }));
    ledger.set_token_behavior(TOKEN1, Rc::new(token));

    ledger
        .lock(ALICE, |ledger, session| {
            let paid = ledger.pay(ALICE, TOKEN1, 100)?;
            assert_eq!(ledger.current_session(), Some(session));
            ledger.withdraw(ALICE, TOKEN1, ALICE, paid)
        })
        .unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            Session::new(SessionId::new(2), TOKEN1),
            Session::new(SessionId::new(3), TOKEN1),
        ]
    );
}

#[rstest]
fn test_nested_payment_is_credited_once(mut market: Ledger) {
    let key = pool_key();
    let position = position_key(100, 200);
    let this = market.address();

    let deposited = market
        .lock(BOB, |ledger, _| {
            ledger.start_payment(BOB, TOKEN0)?;

            let deposited = ledger.lock(BOB, |ledger, session| {
                let update = ledger.update_position(BOB, &key, &position, 1_000_000_000)?;
                assert_eq!(update.delta1, 0);
                let owed = update.delta0.unsigned_abs();

                ledger.start_payment(BOB, TOKEN0)?;
                ledger.transfer_token(TOKEN0, BOB, this, owed)?;
                assert_eq!(ledger.complete_payment(BOB, TOKEN0)?, owed);
                assert_eq!(ledger.nonzero_debt_count(session.id), 0);
                Ok(owed)
            })?;

            // Only what arrived after the nested payment counts
            ledger.transfer_token(TOKEN0, BOB, this, 50)?;
            assert_eq!(ledger.complete_payment(BOB, TOKEN0)?, 50);
            ledger.withdraw(BOB, TOKEN0, BOB, 50)?;
            Ok(deposited)
        })
        .unwrap();

    assert!(deposited > 0);
    assert_eq!(market.token_balance(TOKEN0, this), deposited);
    assert_eq!(market.token_balance(TOKEN0, BOB), FUNDING - deposited);
    assert_eq!(
        market
            .position(&key, BOB, &position)
            .map(|position| position.liquidity),
        Some(1_000_000_000)
    );
}

proptest! {
    #[test]
    fn prop_settled_sessions_conserve_tokens(
        ops in prop::collection::vec((any::<bool>(), any::<bool>(), 1u64..1_000_000), 1..20)
    ) {
        let mut ledger = reserved(ledger(ledger_config()));
        let this = ledger.address();

        let result = ledger.lock(ALICE, |ledger, session| {
            for &(is_token1, is_withdrawal, amount) in &ops {
                let token = if is_token1 { TOKEN1 } else { TOKEN0 };
                if is_withdrawal {
                    ledger.withdraw(ALICE, token, BOB, u128::from(amount))?;
                } else {
                    ledger.pay(ALICE, token, u128::from(amount))?;
                }
            }
            settle(ledger, ALICE, session)
        });

        prop_assert_eq!(result, Ok(()));
        for token in [TOKEN0, TOKEN1] {
            let total = ledger.token_balance(token, ALICE)
                + ledger.token_balance(token, BOB)
                + ledger.token_balance(token, this);
            prop_assert_eq!(total, 2 * FUNDING + RESERVE);
            prop_assert_eq!(ledger.token_balance(token, this), RESERVE);
        }
    }
}

// -- POOLS -----------------------------------------------------------------------------------

#[rstest]
fn test_initialize_pool(mut ledger: Ledger) {
    let key = pool_key();
    let sqrt_ratio = ledger.initialize_pool(ALICE, &key, 0).unwrap();

    assert_eq!(sqrt_ratio, U160::from(1u128 << 96));
    let state = ledger.pool_state(&key).unwrap();
    assert_eq!(state.tick, 0);
    assert_eq!(state.liquidity, 0);
    assert_eq!(
        ledger.initialize_pool(BOB, &key, 10),
        Err(LedgerError::PoolAlreadyInitialized(key.pool_id()))
    );
}

#[rstest]
fn test_initialize_pool_validates(mut ledger: Ledger) {
    let bad_fee = PoolKey {
        fee: 1_000_000,
        ..pool_key()
    };
    assert!(matches!(
        ledger.initialize_pool(ALICE, &bad_fee, 0),
        Err(LedgerError::InvalidPoolKey(_))
    ));
    assert_eq!(
        ledger.initialize_pool(ALICE, &extension_pool_key(), 0),
        Err(LedgerError::ExtensionNotRegistered(EXTENSION))
    );
    assert!(ledger.initialize_pool(ALICE, &pool_key(), 900_000).is_err());
    assert_eq!(ledger.pool_state(&pool_key()), None);
}

#[rstest]
fn test_swap_requires_initialized_pool(mut ledger: Ledger) {
    let key = pool_key();
    let result = ledger.lock(ALICE, |ledger, _| {
        ledger.swap(ALICE, &key, SwapParams::new(1_000, false, sqrt_at(-10), 0))
    });
    assert_eq!(result, Err(LedgerError::PoolNotInitialized(key.pool_id())));
}

#[rstest]
fn test_swap_rejects_price_limit_on_wrong_side(mut market: Ledger) {
    let key = pool_key();
    let result = market.lock(ALICE, |ledger, _| {
        ledger.swap(ALICE, &key, SwapParams::new(1_000, false, sqrt_at(10), 0))
    });
    assert_eq!(
        result,
        Err(LedgerError::InvalidPriceLimit {
            limit: sqrt_at(10),
            current: sqrt_at(0),
        })
    );
}

#[rstest]
#[case(-100, 100)]
#[case(100, 200)]
#[case(-300, -200)]
#[case(-887_270, 887_270)]
fn test_deposit_then_withdraw_never_returns_more(
    mut market: Ledger,
    #[case] lower: i32,
    #[case] upper: i32,
) {
    let key = pool_key();
    let position = position_key(lower, upper);

    let deposited = update_settled(&mut market, ALICE, &key, &position, 1_000_000);
    let withdrawn = update_settled(&mut market, ALICE, &key, &position, -1_000_000);

    for (paid, received) in [
        (deposited.delta0, withdrawn.delta0),
        (deposited.delta1, withdrawn.delta1),
    ] {
        assert!(paid >= 0 && received <= 0);
        assert!(-received <= paid);
        assert!(paid + received <= 1);
    }
    assert_eq!(market.position(&key, ALICE, &position), None);
    assert_eq!(market.pool_state(&key).unwrap().liquidity, 0);
}

#[rstest]
fn test_deposit_then_withdraw_amounts(mut market: Ledger) {
    let key = pool_key();
    let position = position_key(-100, 100);

    let deposited = update_settled(&mut market, ALICE, &key, &position, 1_000_000);
    let withdrawn = update_settled(&mut market, ALICE, &key, &position, -1_000_000);

    assert_eq!(deposited, BalanceUpdate::new(4_988, 4_988));
    assert_eq!(withdrawn, BalanceUpdate::new(-4_987, -4_987));
    assert_eq!(market.token_balance(TOKEN0, market.address()), 1);
}

#[rstest]
fn test_round_trip_swap_keeps_position(mut market: Ledger) {
    let key = pool_key();
    let position = position_key(-100, 100);
    update_settled(&mut market, ALICE, &key, &position, 1_000);

    let up = SwapParams::new(E18, true, sqrt_at(50), 0);
    let up = swap_settled(&mut market, BOB, &key, up);
    assert_eq!(up, BalanceUpdate::new(-2, 4));
    assert_eq!(market.pool_state(&key).unwrap().tick, 50);

    let down = SwapParams::new(E18, false, sqrt_at(0), 0);
    let down = swap_settled(&mut market, BOB, &key, down);
    assert_eq!(down, BalanceUpdate::new(4, -2));

    let state = market.pool_state(&key).unwrap();
    assert_eq!(state.sqrt_ratio, sqrt_at(0));
    assert_eq!(state.liquidity, 1_000);

    let stored = market.position(&key, ALICE, &position).unwrap();
    assert_eq!(stored.liquidity, 1_000);
    assert_eq!(stored.fees_per_liquidity_inside_last, FeesPerLiquidity::ZERO);

    // One unit of fees per swap, spread over 1000 liquidity
    let growth = U256::from(340_282_366_920_938_463_463_374_607_431_768_211_u128);
    assert_eq!(
        market.fees_per_liquidity_inside(&key, -100, 100),
        Some(FeesPerLiquidity::new(growth, growth))
    );
    assert_eq!(market.fees_per_liquidity(&key), Some(FeesPerLiquidity::new(growth, growth)));
}

#[rstest]
fn test_collect_after_round_trip_is_idempotent(mut market: Ledger) {
    let key = pool_key();
    let position = position_key(-100, 100);
    update_settled(&mut market, ALICE, &key, &position, E18);
    swap_settled(&mut market, BOB, &key, SwapParams::new(E18, true, sqrt_at(50), 0));
    swap_settled(&mut market, BOB, &key, SwapParams::new(E18, false, sqrt_at(0), 0));

    let fees = collect_settled(&mut market, ALICE, &key, &position);
    assert_eq!(fees, (7_512_797_160_342, 7_531_601_708_923));
    assert_eq!(market.token_balance(TOKEN0, ALICE), FUNDING - 4_987_272_070_749_097 + fees.0);

    assert_eq!(collect_settled(&mut market, ALICE, &key, &position), (0, 0));
}

#[rstest]
fn test_reducing_position_to_dust_keeps_snapshot_valid(mut market: Ledger) {
    let key = pool_key();
    let position = position_key(-100, 100);
    update_settled(&mut market, ALICE, &key, &position, 1_000_000);
    swap_settled(&mut market, BOB, &key, SwapParams::new(1_000, false, sqrt_at(-50), 0));
    swap_settled(&mut market, BOB, &key, SwapParams::new(1_000, true, sqrt_at(50), 0));

    let reduced = update_settled(&mut market, ALICE, &key, &position, -999_999);
    assert_eq!(reduced, BalanceUpdate::new(-4_990, -4_989));

    let inside = FeesPerLiquidity::new(
        U256::from(1_020_847_100_762_815_390_390_123_822_295_304_u128),
        U256::from(1_361_129_467_683_753_853_853_498_429_727_072_u128),
    );
    let stored = market.position(&key, ALICE, &position).unwrap();
    assert_eq!(stored.liquidity, 1);
    assert_eq!(stored.fees_per_liquidity_inside_last, inside);
    assert_eq!(market.fees_per_liquidity_inside(&key, -100, 100), Some(inside));

    assert_eq!(collect_settled(&mut market, ALICE, &key, &position), (0, 0));
    let closed = update_settled(&mut market, ALICE, &key, &position, -1);
    assert_eq!(closed, BalanceUpdate::ZERO);
    assert_eq!(market.position(&key, ALICE, &position), None);
}

#[rstest]
#[case(-100)]
#[case(-250)]
#[case(-300)]
fn test_fees_independent_of_later_crossings(mut market: Ledger, #[case] limit: i32) {
    let key = pool_key();
    let spanning = position_key(-100, 100);
    for (lower, upper) in [(-100, 100), (-50, 50), (-300, -200)] {
        update_settled(&mut market, ALICE, &key, &position_key(lower, upper), E18);
    }

    swap_settled(
        &mut market,
        BOB,
        &key,
        SwapParams::new(100 * E18, false, sqrt_at(limit), 0),
    );

    assert_eq!(
        collect_settled(&mut market, ALICE, &key, &spanning),
        (15_082_055_034_257, 0)
    );
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
#[case(100)]
fn test_skip_ahead_agrees_up_to_rounding(mut market: Ledger, #[case] skip_ahead: u32) {
    let key = pool_key();
    update_settled(&mut market, ALICE, &key, &position_key(-50_000, 50_000), E18);

    let update = swap_settled(
        &mut market,
        BOB,
        &key,
        SwapParams::new(100 * E18, false, sqrt_at(-30_000), skip_ahead),
    );

    assert_eq!(market.pool_state(&key).unwrap().tick, -30_000);
    assert!(update.delta0.abs_diff(3_491_828_464_059_487_807) <= 16, "{update:?}");
    assert!(update.delta1.abs_diff(-776_853_105_577_640_570) <= 16, "{update:?}");
}

#[rstest]
fn test_next_initialized_tick_skips_empty_words(mut market: Ledger) {
    let key = pool_key();
    update_settled(&mut market, ALICE, &key, &position_key(-100, 100), 1_000_000);

    assert_eq!(market.next_initialized_tick(&key, 0, true, 0), Some((0, false)));
    assert_eq!(market.next_initialized_tick(&key, 0, true, 1), Some((-100, true)));
    assert_eq!(market.next_initialized_tick(&key, 0, false, 0), Some((100, true)));
    assert!(market.tick(&key, -100).unwrap().is_initialized());
}

#[rstest]
fn test_withdrawal_fee_accrues_to_protocol() {
    let mut ledger = ledger(LedgerConfig {
        withdrawal_fee_pips: 1_000,
        ..LedgerConfig::default()
    });
    let key = pool_key();
    let position = position_key(-100, 100);
    ledger.initialize_pool(ALICE, &key, 0).unwrap();

    update_settled(&mut ledger, ALICE, &key, &position, 1_000_000);
    let withdrawn = update_settled(&mut ledger, ALICE, &key, &position, -1_000_000);
    assert_eq!(withdrawn, BalanceUpdate::new(-4_982, -4_982));
    assert_eq!(ledger.protocol_fees(TOKEN0), 5);
    assert_eq!(ledger.protocol_fees(TOKEN1), 5);

    let owner = ledger.config().owner;
    assert_eq!(
        ledger.withdraw_protocol_fees(ALICE, ALICE, TOKEN0, 5),
        Err(LedgerError::Unauthorized {
            caller: ALICE,
            action: "withdraw protocol fees",
        })
    );
    assert_eq!(
        ledger.withdraw_protocol_fees(owner, BOB, TOKEN0, 6),
        Err(LedgerError::Underflow("protocol fees"))
    );

    ledger.withdraw_protocol_fees(owner, BOB, TOKEN0, 5).unwrap();
    assert_eq!(ledger.token_balance(TOKEN0, BOB), FUNDING + 5);
    assert_eq!(ledger.protocol_fees(TOKEN0), 0);
}

#[derive(Clone, Debug)]
enum PoolOp {
    Deposit {
        by_bob: bool,
        lower: i32,
        width: i32,
        liquidity: u128,
    },
    Swap {
        amount: i128,
        is_token1: bool,
        skip_ahead: u32,
    },
}

fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        (any::<bool>(), -50i32..50, 1i32..50, 1_000u128..1_000_000_000_000).prop_map(
            |(by_bob, lower, width, liquidity)| PoolOp::Deposit {
                by_bob,
                lower: lower * 20,
                width: width * 20,
                liquidity,
            }
        ),
        (-1_000_000_000i128..1_000_000_000, any::<bool>(), 0u32..4).prop_map(
            |(amount, is_token1, skip_ahead)| PoolOp::Swap {
                amount,
                is_token1,
                skip_ahead,
            }
        ),
    ]
}

proptest! {
    #[test]
    fn prop_pool_stays_solvent(ops in prop::collection::vec(pool_op_strategy(), 1..12)) {
        let mut ledger = market(ledger(ledger_config()));
        let key = pool_key();
        let this = ledger.address();
        let mut positions: Vec<(Address, PositionKey)> = Vec::new();

        for op in &ops {
            match *op {
                PoolOp::Deposit { by_bob, lower, width, liquidity } => {
                    let owner = if by_bob { BOB } else { ALICE };
                    let position = position_key(lower, lower + width);
                    let delta = i128::try_from(liquidity).unwrap();
                    let result = ledger.lock(owner, |ledger, session| {
                        ledger.update_position(owner, &key, &position, delta)?;
                        settle(ledger, owner, session)
                    });
                    prop_assert_eq!(result, Ok(()));
                    if !positions.contains(&(owner, position)) {
                        positions.push((owner, position));
                    }
                }
                PoolOp::Swap { amount, is_token1, skip_ahead } => {
                    let current = ledger.pool_state(&key).unwrap().sqrt_ratio;
                    let params = SwapParams::new(amount, is_token1, U160::ZERO, skip_ahead);
                    let (limit, movable) = if params.zero_for_one() {
                        (sqrt_at(-3_000), sqrt_at(-3_000) < current)
                    } else {
                        (sqrt_at(3_000), sqrt_at(3_000) > current)
                    };
                    if !movable {
                        continue;
                    }
                    let params = SwapParams::new(amount, is_token1, limit, skip_ahead);
                    let result = ledger.lock(ALICE, |ledger, session| {
                        ledger.swap(ALICE, &key, params)?;
                        settle(ledger, ALICE, session)
                    });
                    prop_assert_eq!(result, Ok(()));
                }
            }
        }

        for &(owner, position) in &positions {
            let result = ledger.lock(owner, |ledger, session| {
                ledger.collect_fees(owner, &key, &position)?;
                let liquidity = ledger
                    .position(&key, owner, &position)
                    .map_or(0, |position| position.liquidity);
                let delta = i128::try_from(liquidity).unwrap();
                ledger.update_position(owner, &key, &position, -delta)?;
                settle(ledger, owner, session)
            });
            prop_assert_eq!(result, Ok(()));
            prop_assert_eq!(ledger.position(&key, owner, &position), None);
        }

        prop_assert_eq!(ledger.pool_state(&key).unwrap().liquidity, 0);
        for token in [TOKEN0, TOKEN1] {
            let total = ledger.token_balance(token, ALICE)
                + ledger.token_balance(token, BOB)
                + ledger.token_balance(token, this);
            prop_assert_eq!(total, 2 * FUNDING);
        }
    }
}

// -- EXTENSIONS ------------------------------------------------------------------------------

#[rstest]
fn test_register_extension_twice_fails(ledger_config: LedgerConfig) {
    let extension = TestExtension::new(CallPoints::ALL);
    let mut ledger = with_extension(ledger_config, &extension);

    assert_eq!(ledger.call_points(EXTENSION), Some(CallPoints::ALL));
    assert_eq!(
        ledger.register_extension(EXTENSION, Rc::new(extension)),
        Err(LedgerError::ExtensionAlreadyRegistered(EXTENSION))
    );
}

#[rstest]
fn test_registration_rolls_back_with_transaction(mut reserved: Ledger) {
    let extension = TestExtension::new(CallPoints::ALL);

    let result = reserved.lock(ALICE, |ledger, _| {
        ledger.register_extension(EXTENSION, Rc::new(extension.clone()))?;
        ledger.withdraw(ALICE, TOKEN0, ALICE, 1)
    });

    assert!(
        matches!(result, Err(LedgerError::DebtsNotSettled { .. })),
        "{result:?}"
    );
    assert_eq!(reserved.call_points(EXTENSION), None);
    assert_eq!(Rc::strong_count(&extension.calls), 1);

    reserved
        .register_extension(EXTENSION, Rc::new(extension.clone()))
        .unwrap();
    assert_eq!(Rc::strong_count(&extension.calls), 2);
}

#[rstest]
fn test_hooks_run_around_operations(ledger_config: LedgerConfig) {
    let extension = TestExtension::new(CallPoints::ALL);
    let mut ledger = with_extension(ledger_config, &extension);
    let key = extension_pool_key();
    let position = position_key(-100, 100);

    ledger.initialize_pool(ALICE, &key, 0).unwrap();
    update_settled(&mut ledger, ALICE, &key, &position, 1_000_000);
    swap_settled(&mut ledger, ALICE, &key, SwapParams::new(1_000, false, sqrt_at(-50), 0));
    collect_settled(&mut ledger, ALICE, &key, &position);

    assert_eq!(
        extension.calls(),
        vec![
            Hook::BeforeInitializePool,
            Hook::AfterInitializePool,
            Hook::BeforeUpdatePosition,
            Hook::AfterUpdatePosition,
            Hook::BeforeSwap,
            Hook::AfterSwap,
            Hook::BeforeCollectFees,
            Hook::AfterCollectFees,
        ]
    );
    assert!(extension.sessions.borrow().iter().all(|s| s.holder == ALICE));
}

#[rstest]
fn test_call_points_gate_hooks(ledger_config: LedgerConfig) {
    let extension = TestExtension::new(CallPoints {
        after_swap: true,
        ..CallPoints::NONE
    });
    let mut ledger = with_extension(ledger_config, &extension);
    let key = extension_pool_key();

    ledger.initialize_pool(ALICE, &key, 0).unwrap();
    update_settled(&mut ledger, ALICE, &key, &position_key(-100, 100), 1_000_000);
    swap_settled(&mut ledger, ALICE, &key, SwapParams::new(1_000, false, sqrt_at(-50), 0));

    assert_eq!(extension.calls(), vec![Hook::AfterSwap]);
}

#[rstest]
fn test_extension_acting_on_own_pool_skips_hooks(ledger_config: LedgerConfig) {
    let handler: ForwardHandler = Rc::new(
        |ledger: &mut Ledger, session: Session, _: &[u8]| -> Result<Bytes, LedgerError> {
            ledger.update_position(
                session.holder,
                &extension_pool_key(),
                &position_key(-100, 100),
                1_000_000,
            )?;
            Ok(Bytes::new())
        },
    );
    let extension = TestExtension::new(CallPoints::ALL).forwarding(handler);
    let mut ledger = with_extension(ledger_config, &extension);
    let key = extension_pool_key();

    ledger.initialize_pool(EXTENSION, &key, 0).unwrap();
    ledger
        .lock(ALICE, |ledger, session| {
            ledger.forward(ALICE, EXTENSION, &[])?;
            settle(ledger, ALICE, session)
        })
        .unwrap();

    assert_eq!(extension.calls(), vec![Hook::Forwarded]);
    let stored = ledger.position(&key, EXTENSION, &position_key(-100, 100)).unwrap();
    assert_eq!(stored.liquidity, 1_000_000);
    assert_eq!(ledger.token_balance(TOKEN0, ALICE), FUNDING - 4_988);
}

#[rstest]
fn test_hook_failure_aborts_operation(ledger_config: LedgerConfig) {
    let extension = TestExtension::new(CallPoints::ALL).failing_on(Hook::AfterInitializePool);
    let mut ledger = with_extension(ledger_config, &extension);
    let key = extension_pool_key();

    assert_eq!(
        ledger.initialize_pool(ALICE, &key, 0),
        Err(LedgerError::ExtensionCallFailed {
            extension: EXTENSION,
            hook: Hook::AfterInitializePool,
            reason: "after_initialize_pool rejected".to_string(),
        })
    );
    assert_eq!(ledger.pool_state(&key), None);
    assert_eq!(ledger.token_balance(TOKEN0, EXTENSION), 0);
}

#[rstest]
#[case(false)]
#[case(true)]
fn test_collect_fee_hook_failure(#[case] isolate: bool) {
    let extension = TestExtension::new(CallPoints::ALL).failing_on(Hook::BeforeCollectFees);
    let config = LedgerConfig {
        isolate_fee_collection_hooks: isolate,
        ..LedgerConfig::default()
    };
    let mut ledger = with_extension(config, &extension);
    let key = extension_pool_key();
    let position = position_key(-100, 100);

    ledger.initialize_pool(ALICE, &key, 0).unwrap();
    update_settled(&mut ledger, ALICE, &key, &position, E18);
    swap_settled(
        &mut ledger,
        BOB,
        &key,
        SwapParams::new(1_000_000_000_000_000, false, sqrt_at(-100), 0),
    );

    let result = ledger.lock(ALICE, |ledger, session| {
        let fees = ledger.collect_fees(ALICE, &key, &position)?;
        settle(ledger, ALICE, session)?;
        Ok(fees)
    });

    if isolate {
        let (fees0, fees1) = result.unwrap();
        assert!(fees0 > 0);
        assert_eq!(fees1, 0);
        assert_eq!(extension.calls().last(), Some(&Hook::AfterCollectFees));
    } else {
        assert_eq!(
            result,
            Err(LedgerError::ExtensionCallFailed {
                extension: EXTENSION,
                hook: Hook::BeforeCollectFees,
                reason: "before_collect_fees rejected".to_string(),
            })
        );
    }
    assert_eq!(ledger.token_balance(TOKEN0, EXTENSION), 0);
}

#[rstest]
fn test_forward_shares_session_id(mut reserved: Ledger) {
    let handler: ForwardHandler = Rc::new(
        |ledger: &mut Ledger, session: Session, data: &[u8]| -> Result<Bytes, LedgerError> {
            ledger.withdraw(session.holder, TOKEN0, session.holder, u128::from(data[0]))?;
            Ok(encode_uint(u128::from(session.id.value())))
        },
    );
    let extension = TestExtension::new(CallPoints::NONE).forwarding(handler);
    reserved
        .register_extension(EXTENSION, Rc::new(extension.clone()))
        .unwrap();

    reserved
        .lock(ALICE, |ledger, session| {
            let returned = ledger.forward(ALICE, EXTENSION, &[100])?;
            assert_eq!(returned, encode_uint(1));
            assert_eq!(ledger.current_session(), Some(session));
            assert_eq!(ledger.debt(session.id, TOKEN0), 100);
            ledger.pay(ALICE, TOKEN0, 100)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        *extension.sessions.borrow(),
        vec![Session::new(SessionId::new(1), EXTENSION)]
    );
    assert_eq!(reserved.token_balance(TOKEN0, EXTENSION), 100);
}

#[rstest]
fn test_forward_requires_holder_and_extension(mut ledger: Ledger) {
    let result = ledger.lock(ALICE, |ledger, _| ledger.forward(ALICE, EXTENSION, &[]));
    assert_eq!(result, Err(LedgerError::ExtensionNotRegistered(EXTENSION)));

    ledger
        .register_extension(EXTENSION, Rc::new(TestExtension::new(CallPoints::NONE)))
        .unwrap();
    let result = ledger.lock(ALICE, |ledger, _| ledger.forward(BOB, EXTENSION, &[]));
    assert!(matches!(result, Err(LedgerError::SessionNotHeld { caller: BOB, .. })));
}

#[rstest]
fn test_failed_forward_restores_holder(mut ledger: Ledger) {
    let handler: ForwardHandler = Rc::new(
        |_: &mut Ledger, _: Session, _: &[u8]| -> Result<Bytes, LedgerError> {
            Err(LedgerError::Underflow("forwarded work"))
        },
    );
    let extension = TestExtension::new(CallPoints::NONE).forwarding(handler);
    ledger
        .register_extension(EXTENSION, Rc::new(extension))
        .unwrap();

    let expected = LedgerError::ExtensionCallFailed {
        extension: EXTENSION,
        hook: Hook::Forwarded,
        reason: "Underflow in forwarded work".to_string(),
    };
    let result = ledger.lock(ALICE, |ledger, session| {
        assert_eq!(ledger.forward(ALICE, EXTENSION, &[]), Err(expected.clone()));
        assert_eq!(ledger.current_session(), Some(session));
        Ok(())
    });
    assert_eq!(result, Err(expected));
}

#[rstest]
fn test_accumulate_as_fees_through_forward(ledger_config: LedgerConfig) {
    let handler: ForwardHandler = Rc::new(
        |ledger: &mut Ledger, session: Session, _: &[u8]| -> Result<Bytes, LedgerError> {
            ledger.accumulate_as_fees(session.holder, &extension_pool_key(), 1_000, 0)?;
            ledger.pay(session.holder, TOKEN0, 1_000)?;
            Ok(Bytes::new())
        },
    );
    let extension = TestExtension::new(CallPoints::NONE).forwarding(handler);
    let mut ledger = with_extension(ledger_config, &extension);
    ledger.mint_tokens(TOKEN0, EXTENSION, 1_000).unwrap();
    let key = extension_pool_key();
    let position = position_key(-100, 100);

    ledger.initialize_pool(ALICE, &key, 0).unwrap();
    update_settled(&mut ledger, ALICE, &key, &position, 1_000_000);

    let result = ledger.lock(ALICE, |ledger, _| ledger.accumulate_as_fees(ALICE, &key, 1, 0));
    assert_eq!(
        result,
        Err(LedgerError::Unauthorized {
            caller: ALICE,
            action: "accumulate fees",
        })
    );

    ledger
        .lock(ALICE, |ledger, _| ledger.forward(ALICE, EXTENSION, &[]).map(|_| ()))
        .unwrap();
    assert_eq!(ledger.token_balance(TOKEN0, EXTENSION), 0);
    assert_eq!(collect_settled(&mut ledger, ALICE, &key, &position), (999, 0));
}

#[rstest]
fn test_saved_balances_through_forward(ledger_config: LedgerConfig) {
    // data[0]: 1 saves, 0 loads, 2 uses an unsorted pair
    let handler: ForwardHandler = Rc::new(
        |ledger: &mut Ledger, session: Session, data: &[u8]| -> Result<Bytes, LedgerError> {
            let (token0, token1, delta0, delta1) = match data[0] {
                1 => (TOKEN0, TOKEN1, 100, 50),
                0 => (TOKEN0, TOKEN1, -100, -50),
                _ => (TOKEN1, TOKEN0, 1, 1),
            };
            let saved = ledger.update_saved_balances(
                session.holder,
                token0,
                token1,
                B256::ZERO,
                delta0,
                delta1,
            )?;
            Ok(encode_uint(saved.amount0))
        },
    );
    let extension = TestExtension::new(CallPoints::NONE).forwarding(handler);
    let mut ledger = with_extension(ledger_config, &extension);

    let forward = |ledger: &mut Ledger, action: u8| {
        ledger.lock(ALICE, |ledger, session| {
            let returned = ledger.forward(ALICE, EXTENSION, &[action])?;
            settle(ledger, ALICE, session)?;
            Ok(returned)
        })
    };

    assert_eq!(forward(&mut ledger, 1), Ok(encode_uint(100)));
    let saved = ledger.saved_balance(EXTENSION, TOKEN0, TOKEN1, B256::ZERO);
    assert_eq!((saved.amount0, saved.amount1), (100, 50));
    assert_eq!(ledger.token_balance(TOKEN0, ALICE), FUNDING - 100);

    assert_eq!(forward(&mut ledger, 0), Ok(encode_uint(0)));
    assert!(ledger.saved_balance(EXTENSION, TOKEN0, TOKEN1, B256::ZERO).is_empty());
    assert_eq!(ledger.token_balance(TOKEN0, ALICE), FUNDING);

    assert!(matches!(
        forward(&mut ledger, 0),
        Err(LedgerError::ExtensionCallFailed { reason, .. })
            if reason == "Underflow in saved balance"
    ));
    assert!(matches!(
        forward(&mut ledger, 2),
        Err(LedgerError::ExtensionCallFailed { reason, .. })
            if reason.starts_with("Invalid pool key")
    ));

    let result = ledger.lock(ALICE, |ledger, _| {
        ledger.update_saved_balances(ALICE, TOKEN0, TOKEN1, B256::ZERO, 1, 1)
    });
    assert_eq!(
        result,
        Err(LedgerError::Unauthorized {
            caller: ALICE,
            action: "update saved balances",
        })
    );
}
