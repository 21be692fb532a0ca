use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queries against the submitting user.
pub trait UserContext {
    fn is_in_group(&self, group: &str) -> bool;
    fn balance(&self, account: &str) -> Result<Decimal, HostError>;
    fn property(&self, key: &str) -> Option<String>;
}

/// Side effects the print server exposes to the rules.
pub trait HostActions {
    fn set_cost(&mut self, cost: Decimal);
    fn add_comment(&mut self, comment: &str);
    fn cancel_and_log(&mut self, reason: &str);
    fn charge_to_personal_account(&mut self);
    fn charge_to_shared_account(&mut self, account: &str);
    fn change_personal_account_charge_priority(&mut self, accounts: &[String]);

    fn prompt_ok(&mut self, html: &str);
    fn prompt_for_form(&mut self, html: &str, form: &FormSpec) -> PromptOutcome;
    fn send_message(&mut self, text: &str);

    fn set_property_on_completion(&mut self, key: &str, value: &str, persist_if_canceled: bool);

    /// `Ok(None)` when the provider has no record for the user.
    fn external_balance(
        &mut self,
        provider: &str,
        username: &str,
    ) -> Result<Option<Decimal>, HostError>;

    fn log_debug(&mut self, _message: &str) {}
    fn log_error(&mut self, _message: &str) {}
}

/// Failure reported by the host for one lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("unknown account {0}")]
    UnknownAccount(String),
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },
}

/// Form shown to the user through the client dialog channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSpec {
    pub title: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub options: Vec<FormChoice>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormChoice {
    pub value: String,
    pub label: String,
}

/// Values submitted for each form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormResponse(pub BTreeMap<String, String>);

impl FormResponse {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormResponse {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Result of a blocking form prompt. Timeouts and cancellations are answers
/// in their own right, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOutcome {
    Submitted(FormResponse),
    Timeout,
    Cancel,
}
