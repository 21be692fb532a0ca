//! In-memory host used for dry runs and tests.
//!
//! [`RecordingHost`] answers prompts from a script and records every action
//! in call order; [`StaticUser`] answers user queries from fixed data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::host::{FormSpec, HostActions, HostError, PromptOutcome, UserContext};

/// One call made against the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    SetCost { cost: Decimal },
    AddComment { comment: String },
    CancelAndLog { reason: String },
    ChargeToPersonalAccount,
    ChargeToSharedAccount { account: String },
    ChangePersonalAccountChargePriority { accounts: Vec<String> },
    PromptOk { html: String },
    PromptForForm { html: String, form: FormSpec, outcome: PromptOutcome },
    SendMessage { text: String },
    SetPropertyOnCompletion {
        key: String,
        value: String,
        persist_if_canceled: bool,
    },
    ExternalBalance { provider: String, username: String },
    LogDebug { message: String },
    LogError { message: String },
}

/// Scripted answers for the interactive and external parts of the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostScript {
    /// Answer to every form prompt; prompts time out when absent.
    pub form_response: Option<PromptOutcome>,
    pub external_balance: Option<Decimal>,
    /// When set, the external balance lookup fails with this reason.
    pub external_balance_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    script: HostScript,
    actions: Vec<HostAction>,
}

impl RecordingHost {
    pub fn new(script: HostScript) -> Self {
        Self {
            script,
            actions: Vec::new(),
        }
    }

    pub fn actions(&self) -> &[HostAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<HostAction> {
        self.actions
    }

    pub fn cancellations(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, HostAction::CancelAndLog { .. }))
            .count()
    }

    pub fn last_cost(&self) -> Option<Decimal> {
        self.actions.iter().rev().find_map(|action| match action {
            HostAction::SetCost { cost } => Some(*cost),
            _ => None,
        })
    }
}

impl HostActions for RecordingHost {
    fn set_cost(&mut self, cost: Decimal) {
        self.actions.push(HostAction::SetCost { cost });
    }

    fn add_comment(&mut self, comment: &str) {
        self.actions.push(HostAction::AddComment {
            comment: comment.to_string(),
        });
    }

    fn cancel_and_log(&mut self, reason: &str) {
        self.actions.push(HostAction::CancelAndLog {
            reason: reason.to_string(),
        });
    }

    fn charge_to_personal_account(&mut self) {
        self.actions.push(HostAction::ChargeToPersonalAccount);
    }

    fn charge_to_shared_account(&mut self, account: &str) {
        self.actions.push(HostAction::ChargeToSharedAccount {
            account: account.to_string(),
        });
    }

    fn change_personal_account_charge_priority(&mut self, accounts: &[String]) {
        self.actions
            .push(HostAction::ChangePersonalAccountChargePriority {
                accounts: accounts.to_vec(),
            });
    }

    fn prompt_ok(&mut self, html: &str) {
        self.actions.push(HostAction::PromptOk {
            html: html.to_string(),
        });
    }

    fn prompt_for_form(&mut self, html: &str, form: &FormSpec) -> PromptOutcome {
        let outcome = self
            .script
            .form_response
            .clone()
            .unwrap_or(PromptOutcome::Timeout);
        self.actions.push(HostAction::PromptForForm {
            html: html.to_string(),
            form: form.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    fn send_message(&mut self, text: &str) {
        self.actions.push(HostAction::SendMessage {
            text: text.to_string(),
        });
    }

    fn set_property_on_completion(&mut self, key: &str, value: &str, persist_if_canceled: bool) {
        self.actions.push(HostAction::SetPropertyOnCompletion {
            key: key.to_string(),
            value: value.to_string(),
            persist_if_canceled,
        });
    }

    fn external_balance(
        &mut self,
        provider: &str,
        username: &str,
    ) -> Result<Option<Decimal>, HostError> {
        self.actions.push(HostAction::ExternalBalance {
            provider: provider.to_string(),
            username: username.to_string(),
        });
        match &self.script.external_balance_error {
            Some(reason) => Err(HostError::Unavailable {
                service: provider.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(self.script.external_balance),
        }
    }

    fn log_debug(&mut self, message: &str) {
        self.actions.push(HostAction::LogDebug {
            message: message.to_string(),
        });
    }

    fn log_error(&mut self, message: &str) {
        self.actions.push(HostAction::LogError {
            message: message.to_string(),
        });
    }
}

/// User backed by fixed group, balance and property data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticUser {
    pub groups: BTreeSet<String>,
    pub balances: BTreeMap<String, Decimal>,
    /// Accounts whose balance lookup fails.
    pub unavailable_accounts: BTreeSet<String>,
    pub properties: BTreeMap<String, String>,
}

impl StaticUser {
    pub fn in_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, account: &str, balance: Decimal) -> Self {
        self.balances.insert(account.to_string(), balance);
        self
    }

    pub fn with_unavailable_account(mut self, account: &str) -> Self {
        self.unavailable_accounts.insert(account.to_string());
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

impl UserContext for StaticUser {
    fn is_in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    fn balance(&self, account: &str) -> Result<Decimal, HostError> {
        if self.unavailable_accounts.contains(account) {
            return Err(HostError::Unavailable {
                service: "balance".to_string(),
                reason: format!("account {account} did not respond"),
            });
        }
        self.balances
            .get(account)
            .copied()
            .ok_or_else(|| HostError::UnknownAccount(account.to_string()))
    }

    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }
}
