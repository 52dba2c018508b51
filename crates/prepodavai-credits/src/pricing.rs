// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure balance arithmetic for charges and refunds.
//!
//! A charge draws from `extra_credits` first, then `credits_balance`. With
//! overage enabled the main balance may go negative; the part below zero is
//! counted as overage. A refund returns every credit to the pool it came from.

use prepodavai_core::{PrepodavaiError, Subscription, SubscriptionStatus, TransactionType};
use prepodavai_storage::queries::subscriptions::Balances;

/// How a charge is split across pools, and the balances after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitPlan {
    pub amount: i64,
    pub extra_part: i64,
    pub overage_part: i64,
    pub transaction_type: TransactionType,
    pub before: Balances,
    pub after: Balances,
}

impl DebitPlan {
    pub fn spendable_before(&self) -> i64 {
        self.before.credits_balance + self.before.extra_credits
    }

    pub fn spendable_after(&self) -> i64 {
        self.after.credits_balance + self.after.extra_credits
    }
}

/// Plan a charge of `cost` credits against `sub`.
///
/// Fails with `InsufficientCredits` when overage is off and the spendable
/// balance does not cover the cost. Nothing is mutated either way.
pub fn plan_debit(sub: &Subscription, cost: i64) -> Result<DebitPlan, PrepodavaiError> {
    if cost < 0 {
        return Err(PrepodavaiError::Validation(format!(
            "credit cost must be non-negative, got {cost}"
        )));
    }
    if sub.status != SubscriptionStatus::Active {
        return Err(PrepodavaiError::Validation(format!(
            "subscription is {}",
            sub.status
        )));
    }

    let available = sub.spendable();
    if !sub.allow_overage && available < cost {
        return Err(PrepodavaiError::InsufficientCredits {
            required: cost,
            available: available.max(0),
        });
    }

    let before = Balances::from(sub);
    let extra_part = cost.min(sub.extra_credits.max(0));
    let from_main = cost - extra_part;
    let new_balance = sub.credits_balance - from_main;
    // Only the part that newly crosses below zero is overage.
    let overage_part = (-new_balance).max(0) - (-sub.credits_balance).max(0);
    let overage_part = overage_part.max(0);

    let after = Balances {
        credits_balance: new_balance,
        extra_credits: sub.extra_credits - extra_part,
        credits_used: sub.credits_used + cost,
        overage_credits_used: sub.overage_credits_used + overage_part,
    };

    Ok(DebitPlan {
        amount: cost,
        extra_part,
        overage_part,
        transaction_type: if overage_part > 0 {
            TransactionType::Overage
        } else {
            TransactionType::Debit
        },
        before,
        after,
    })
}

/// Balances after reversing a charge of `amount` split as recorded.
pub fn plan_refund(current: Balances, amount: i64, extra_part: i64, overage_part: i64) -> Balances {
    Balances {
        credits_balance: current.credits_balance + (amount - extra_part),
        extra_credits: current.extra_credits + extra_part,
        credits_used: (current.credits_used - amount).max(0),
        overage_credits_used: (current.overage_credits_used - overage_part).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sub(balance: i64, extra: i64, allow_overage: bool) -> Subscription {
        Subscription {
            id: "s1".into(),
            user_id: "u1".into(),
            credits_balance: balance,
            extra_credits: extra,
            credits_used: 0,
            overage_credits_used: 0,
            status: SubscriptionStatus::Active,
            allow_overage,
            overage_cost_per_credit: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn plain_debit() {
        let plan = plan_debit(&sub(10, 0, false), 5).unwrap();
        assert_eq!(plan.transaction_type, TransactionType::Debit);
        assert_eq!(plan.after.credits_balance, 5);
        assert_eq!(plan.spendable_before(), 10);
        assert_eq!(plan.spendable_after(), 5);
    }

    #[test]
    fn insufficient_without_overage() {
        let err = plan_debit(&sub(5, 0, false), 8).unwrap_err();
        assert!(matches!(
            err,
            PrepodavaiError::InsufficientCredits {
                required: 8,
                available: 5
            }
        ));
    }

    #[test]
    fn extra_credits_are_spent_first() {
        let plan = plan_debit(&sub(10, 3, false), 5).unwrap();
        assert_eq!(plan.extra_part, 3);
        assert_eq!(plan.after.extra_credits, 0);
        assert_eq!(plan.after.credits_balance, 8);
    }

    #[test]
    fn extra_credits_cover_shortfall_of_main_balance() {
        let plan = plan_debit(&sub(2, 4, false), 5).unwrap();
        assert_eq!(plan.after.credits_balance, 1);
        assert_eq!(plan.after.extra_credits, 0);
    }

    #[test]
    fn overage_counts_only_the_negative_part() {
        let plan = plan_debit(&sub(3, 0, true), 5).unwrap();
        assert_eq!(plan.transaction_type, TransactionType::Overage);
        assert_eq!(plan.overage_part, 2);
        assert_eq!(plan.after.credits_balance, -2);
        assert_eq!(plan.after.overage_credits_used, 2);

        let already_negative = plan_debit(&sub(-2, 0, true), 4).unwrap();
        assert_eq!(already_negative.overage_part, 4);
    }

    #[test]
    fn inactive_subscription_cannot_be_charged() {
        let mut s = sub(10, 0, false);
        s.status = SubscriptionStatus::Expired;
        assert!(matches!(
            plan_debit(&s, 1),
            Err(PrepodavaiError::Validation(_))
        ));
    }

    proptest! {
        #[test]
        fn refund_restores_pre_charge_balances(
            balance in -50i64..100,
            extra in 0i64..50,
            cost in 0i64..60,
            allow in any::<bool>(),
        ) {
            let s = sub(balance, extra, allow);
            if let Ok(plan) = plan_debit(&s, cost) {
                prop_assert_eq!(plan.spendable_before() - plan.spendable_after(), cost);
                prop_assert!(plan.after.extra_credits >= 0);
                let restored = plan_refund(plan.after, plan.amount, plan.extra_part, plan.overage_part);
                prop_assert_eq!(restored, plan.before);
            } else {
                prop_assert!(!allow && balance + extra < cost);
            }
        }
    }
}
