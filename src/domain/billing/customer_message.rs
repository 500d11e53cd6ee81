//! Customer-facing payment failure messages.
//!
//! Raw gateway errors never reach the customer. A failure is translated by,
//! in order:
//!
//! 1. the gateway decline/error code, looked up in [`CODE_MESSAGES`];
//! 2. the first entry of [`KEYWORD_MESSAGES`] whose keyword appears in the
//!    lower-cased technical error text;
//! 3. [`GENERIC_MESSAGE`].
//!
//! Both tables are ordered and the first match wins.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::charge::{NO_PAYMENT_METHOD, NO_PAYMENT_METHOD_MESSAGE};

/// Known gateway codes and their customer messages.
pub const CODE_MESSAGES: &[(&str, &str)] = &[
    ("card_declined", "Your card was declined. Please contact your bank or try a different payment method."),
    ("insufficient_funds", "Your card has insufficient funds. Please use a different card or add funds to your account."),
    ("expired_card", "Your card has expired. Please update your payment method with a valid card."),
    ("incorrect_cvc", "The security code (CVC) is incorrect. Please check your card details."),
    ("processing_error", "There was an error processing your payment. Please try again or contact support."),
    ("incorrect_number", "The card number is invalid. Please check your card details."),
    ("invalid_expiry_month", "The card expiry month is invalid. Please check your card details."),
    ("invalid_expiry_year", "The card expiry year is invalid. Please check your card details."),
    ("authentication_required", "Your bank requires additional authentication. Please complete the verification or use a different card."),
    ("card_not_supported", "This card type is not supported. Please use a different card."),
    ("currency_not_supported", "This card does not support GBP. Please use a different card."),
    ("do_not_honor", "Your card was declined. Please contact your bank for more information."),
    ("do_not_try_again", "Your card was declined. Please use a different payment method."),
    ("fraudulent", "This payment was flagged as potentially fraudulent. Please contact support."),
    ("generic_decline", "Your card was declined. Please contact your bank or try a different card."),
    ("invalid_account", "The card account is invalid. Please use a different card."),
    ("lost_card", "This card has been reported lost. Please use a different payment method."),
    ("new_account_information_available", "Please update your card information and try again."),
    ("no_action_taken", "Your bank did not process the payment. Please contact your bank."),
    ("not_permitted", "This transaction is not permitted. Please contact your bank."),
    ("pickup_card", "Your card cannot be used. Please contact your bank."),
    ("restricted_card", "This card has restrictions. Please use a different card."),
    ("security_violation", "This payment was declined due to security reasons. Please contact your bank."),
    ("service_not_allowed", "This service is not available for your card. Please use a different card."),
    ("stolen_card", "This card has been reported stolen. Please use a different payment method."),
    ("try_again_later", "We couldn't process your payment right now. Please try again in a few minutes."),
    ("withdrawal_count_limit_exceeded", "Your card has reached its limit. Please try again tomorrow or use a different card."),
    (NO_PAYMENT_METHOD, NO_PAYMENT_METHOD_MESSAGE),
];

/// Keyword fallbacks, scanned in order against the lower-cased error text.
pub const KEYWORD_MESSAGES: &[(&[&str], &str)] = &[
    (&["card was declined"], "Your card was declined. Please contact your bank or try a different payment method."),
    (&["insufficient"], "Your card has insufficient funds. Please use a different card."),
    (&["expired"], "Your card has expired. Please update your payment method."),
    (&["no payment method"], NO_PAYMENT_METHOD_MESSAGE),
    (&["authentication", "3d secure"], "Your bank requires additional verification. Please complete the authentication or use a different card."),
];

/// Shown when neither the code nor the error text is recognised.
pub const GENERIC_MESSAGE: &str =
    "We couldn't process your payment. Please check your payment method or contact support for assistance.";

static CODE_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| CODE_MESSAGES.iter().copied().collect());

/// Translates a failed charge into the message shown to the customer.
pub fn customer_message(code: Option<&str>, technical_error: &str) -> &'static str {
    if let Some(message) = code.and_then(|c| CODE_INDEX.get(c).copied()) {
        return message;
    }

    let lowered = technical_error.to_lowercase();
    KEYWORD_MESSAGES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(*k)))
        .map(|(_, message)| *message)
        .unwrap_or(GENERIC_MESSAGE)
}
