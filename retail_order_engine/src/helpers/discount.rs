//! The promotion (discount) resolver.
//!
//! [`resolve_discount`] is a pure function over a promotion record: the same inputs always yield the same decision,
//! and nothing is mutated. Usage-counter increments are a separate side effect performed by the checkout flow only
//! after the order has been durably persisted.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{AppliedDiscount, DiscountKind, Money, Promotion, PromotionIdentity};

/// Why a promotion could not be applied to an order.
///
/// These are warnings, not checkout failures: an order with a rejected promotion proceeds at zero discount and the
/// rejection is reported to the caller for display.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DiscountRejection {
    #[error("No promotion matches the code '{0}'")]
    NotFound(String),
    #[error("The promotion is not currently active")]
    Expired,
    #[error("The promotion has reached its usage limit")]
    UsageExceeded,
    #[error("You have already used this coupon the maximum number of times")]
    PerUserUsageExceeded,
    #[error("The order subtotal is below the promotion minimum of {required}")]
    MinimumOrderNotMet { required: Money },
    #[error("Promotions of kind {0} cannot be applied automatically")]
    UnsupportedKind(DiscountKind),
}

/// Decides whether `promotion` applies to an order of `subtotal`, and computes the discount amount if it does.
///
/// `user_redemptions` is the number of times this buyer has already redeemed the promotion; it only constrains
/// coupons with a per-user limit. The returned amount is always within `0 ..= subtotal`, and within the promotion's
/// cap when one is set.
pub fn resolve_discount(
    promotion: &Promotion,
    subtotal: Money,
    user_redemptions: i64,
    now: DateTime<Utc>,
) -> Result<AppliedDiscount, DiscountRejection> {
    if !promotion.is_active || now < promotion.valid_from || now > promotion.valid_until {
        return Err(DiscountRejection::Expired);
    }
    if let PromotionIdentity::Coupon { usage_limit, usage_count, per_user_limit, .. } = &promotion.identity {
        if usage_limit.is_some_and(|limit| *usage_count >= limit) {
            return Err(DiscountRejection::UsageExceeded);
        }
        if per_user_limit.is_some_and(|limit| user_redemptions >= limit) {
            return Err(DiscountRejection::PerUserUsageExceeded);
        }
    }
    if subtotal < promotion.min_order_amount {
        return Err(DiscountRejection::MinimumOrderNotMet { required: promotion.min_order_amount });
    }
    let raw = match promotion.kind {
        DiscountKind::Percentage => {
            let amount = subtotal.percent_of(promotion.value);
            match promotion.max_discount {
                Some(cap) => amount.min(cap),
                None => amount,
            }
        },
        DiscountKind::Fixed => Money::from(promotion.value),
        // The buy-one-get-one computation is not specified (which lines qualify, how "free" maps onto an amount), so
        // bogo promotions are rejected outright instead of silently granting nothing.
        DiscountKind::Bogo => return Err(DiscountRejection::UnsupportedKind(DiscountKind::Bogo)),
    };
    let amount = raw.min(subtotal).max(Money::from(0));
    Ok(AppliedDiscount { promotion_id: promotion.id, kind: promotion.kind, amount })
}
