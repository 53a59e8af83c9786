//! Message formatter
//!
//! Wraps extracted payment fields into the final `payment_request`
//! envelope. No model call and no validation: absent fields stay null.

use crate::models::{Currency, PaymentDraft, PaymentMessage, PaymentRequest, PaymentStatus};
use chrono::{DateTime, Utc};

/// Format with the current wall-clock time
pub fn format_payment_message(draft: impl Into<PaymentDraft>) -> PaymentMessage {
    format_payment_message_at(draft, Utc::now())
}

/// Format with a pinned creation time
pub fn format_payment_message_at(
    draft: impl Into<PaymentDraft>,
    created_at: DateTime<Utc>,
) -> PaymentMessage {
    let draft = draft.into();

    PaymentMessage {
        payment_request: PaymentRequest {
            receiver: draft.receiver,
            address: draft.address,
            title: draft.title,
            amount: draft.amount,
            currency: Currency::Pln,
            bank_account: draft.bank_account,
            schedule: draft.schedule,
            status: PaymentStatus::Pending,
            created_at,
        },
    }
}
