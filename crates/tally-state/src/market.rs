//! Token issuance against the published reference price.
//!
//! Flat price-times-quantity pricing: `Buy` mints at `current_price` and
//! `Sell` redeems at it, both charging `trade_fee_bps`. The reserve holds the
//! net payments; fees are tallied in `fees_collected`.

use tally_core::constants::BPS_DENOMINATOR;
use tally_core::error::TallyError;
use tally_core::types::{AccountId, Balance};
use tracing::debug;

use crate::staged::Staged;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub tokens: Balance,
    /// Payment received (buy) or paid out (sell), net of fee.
    pub net: Balance,
    pub fee: Balance,
}

pub fn fee_for(gross: Balance, fee_bps: u128) -> Balance {
    gross.saturating_mul(fee_bps) / BPS_DENOMINATOR
}

/// Mint tokens for `payment` to `buyer`.
pub fn buy(staged: &mut Staged<'_>, buyer: &AccountId, payment: Balance) -> Result<Fill, TallyError> {
    let price = staged.epoch.current_price;
    if payment == 0 || price == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    let min = staged.params.min_purchase;
    if payment < min {
        return Err(TallyError::PaymentTooSmall { min });
    }
    let fee = fee_for(payment, staged.params.trade_fee_bps);
    let net = payment.checked_sub(fee).ok_or(TallyError::Overflow)?;
    let tokens = net / price;
    if tokens == 0 {
        return Err(TallyError::PaymentTooSmall { min: payment.saturating_add(price) });
    }

    staged.ledger.mint(buyer, tokens)?;
    let market = staged.ledger.market_mut();
    market.reserve = market.reserve.checked_add(net).ok_or(TallyError::Overflow)?;
    market.fees_collected = market.fees_collected.saturating_add(fee);

    debug!(%buyer, payment, tokens, fee, price, "tokens bought");
    Ok(Fill { tokens, net, fee })
}

/// Burn `amount` of `seller`'s tokens and pay out of the reserve.
/// Lock checks are the caller's; this only moves the gross balance.
pub fn sell(staged: &mut Staged<'_>, seller: &AccountId, amount: Balance) -> Result<Fill, TallyError> {
    let price = staged.epoch.current_price;
    if amount == 0 || price == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    let gross = amount.checked_mul(price).ok_or(TallyError::Overflow)?;
    let fee = fee_for(gross, staged.params.trade_fee_bps);
    let payout = gross.checked_sub(fee).ok_or(TallyError::Overflow)?;
    let reserve = staged.ledger.market().reserve;
    if payout > reserve {
        return Err(TallyError::InsufficientReserve { need: payout, have: reserve });
    }

    staged.ledger.burn(seller, amount)?;
    let market = staged.ledger.market_mut();
    market.reserve -= payout;
    market.fees_collected = market.fees_collected.saturating_add(fee);

    debug!(%seller, amount, payout, fee, price, "tokens sold");
    Ok(Fill { tokens: amount, net: payout, fee })
}
