//! Core data models for the payment agent

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

//
// ================= Schedule =================
//

const IMMEDIATE: &str = "immediate";

/// When a payment should be sent. Advisory only, nothing is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Immediate,
    Date(NaiveDate),
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Immediate => write!(f, "{}", IMMEDIATE),
            Schedule::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(IMMEDIATE) {
            return Ok(Schedule::Immediate);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Schedule::Date)
            .map_err(|_| format!("schedule must be YYYY-MM-DD or 'immediate', got '{}'", s))
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

//
// ================= Extraction Records =================
//

/// All text read from an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    pub raw_text: String,
}

/// Payment fields parsed from a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub receiver: String,
    pub address: Option<String>,
    pub title: String,
    pub amount: f64,
    pub bank_account: String,
    pub schedule: Schedule,
}

/// Payment fields parsed from a spoken or typed transfer description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub receiver: String,
    pub address: Option<String>,
    pub title: String,
    pub amount: f64,
    pub bank_account: String,
}

/// Formatter input. Every field may be missing; missing fields become null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub bank_account: Option<String>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

impl From<PaymentRecord> for PaymentDraft {
    fn from(record: PaymentRecord) -> Self {
        Self {
            receiver: Some(record.receiver),
            address: record.address,
            title: Some(record.title),
            amount: Some(record.amount),
            bank_account: Some(record.bank_account),
            schedule: Some(record.schedule),
        }
    }
}

impl From<TransferRecord> for PaymentDraft {
    fn from(record: TransferRecord) -> Self {
        Self {
            receiver: Some(record.receiver),
            address: record.address,
            title: Some(record.title),
            amount: Some(record.amount),
            bank_account: Some(record.bank_account),
            schedule: None,
        }
    }
}

/// Accepts `89.99`, `"89.99"`, `"89,99"` or null
fn lenient_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Option::<Amount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Amount::Number(n)) => Ok(Some(n)),
        Some(Amount::Text(s)) => parse_amount_text(&s).map_err(serde::de::Error::custom),
    }
}

/// A comma counts as the decimal separator only when it is the sole
/// separator and is followed by one or two digits. Grouped forms such as
/// `1,000` or `1 000,50` are rejected rather than guessed at.
fn parse_amount_text(text: &str) -> std::result::Result<Option<f64>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let not_numeric = || format!("amount is not numeric: '{}'", text);

    if trimmed.chars().any(char::is_whitespace) {
        return Err(not_numeric());
    }

    let normalized = match trimmed.split_once(',') {
        None => trimmed.to_string(),
        Some((whole, fraction)) => {
            let decimal_comma = !whole.contains('.')
                && !fraction.contains([',', '.'])
                && (1..=2).contains(&fraction.len())
                && fraction.chars().all(|c| c.is_ascii_digit());
            if !decimal_comma {
                return Err(not_numeric());
            }
            format!("{}.{}", whole, fraction)
        }
    };

    match normalized.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(Some(amount)),
        _ => Err(not_numeric()),
    }
}

//
// ================= Payment Message =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Currency {
    #[serde(rename = "PLN")]
    Pln,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub receiver: Option<String>,
    pub address: Option<String>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub currency: Currency,
    pub bank_account: Option<String>,
    pub schedule: Option<Schedule>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Terminal artifact handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMessage {
    pub payment_request: PaymentRequest,
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

/// One capability invocation inside a single agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub iteration: u32,
    #[serde(rename = "tool")]
    pub tool_name: String,
    #[serde(rename = "args")]
    pub arguments: serde_json::Value,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
}

impl ToolOutput {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

//
// ================= Final Result =================
//

/// Outcome of one agent run, returned as the `result` of the HTTP endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_history: Vec<ExecutionStep>,
    pub iterations: u32,
}
