use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::host::UserContext;

pub const EXTERNAL_ACCOUNT: &str = "External";
pub const BANNER_ACCOUNT: &str = "Banner";
pub const DEFAULT_ACCOUNT: &str = "Default";

const DEPARTMENT_PREFIX: &str = "Department:";
const BILLING_PREFIX: &str = "Billing:";

/// Read-only view of a print job as computed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub cost: Decimal,
    #[serde(default)]
    pub total_color_pages: u32,
    #[serde(default)]
    pub total_grayscale_pages: u32,
    #[serde(default)]
    pub is_analysis_complete: bool,
    #[serde(default)]
    pub is_web_print_job: bool,
    #[serde(default, deserialize_with = "non_empty_name")]
    pub selected_shared_account_name: Option<String>,
    pub printer_name: String,
    #[serde(default)]
    pub document_name: String,
    pub username: String,
    #[serde(default)]
    pub client_ip: String,
}

fn non_empty_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.filter(|value| !value.trim().is_empty()))
}

impl JobSnapshot {
    pub fn shared_account(&self) -> Option<&str> {
        self.selected_shared_account_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

/// Standard per-page charges configured on a printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRates {
    pub grayscale: Decimal,
    pub color: Decimal,
}

impl PageRates {
    /// `None` when the charge does not fit in a `Decimal`.
    pub fn cost_for(&self, grayscale_pages: u32, color_pages: u32) -> Option<Decimal> {
        let grayscale = Decimal::from(grayscale_pages).checked_mul(self.grayscale)?;
        let color = Decimal::from(color_pages).checked_mul(self.color)?;
        grayscale.checked_add(color)
    }
}

/// Printer the job was submitted to, with its group tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterContext {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub rates: PageRates,
}

impl PrinterContext {
    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|candidate| candidate == group)
    }

    /// Department names from `Department:` tags, prefix matched case-insensitively.
    pub fn departments(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter_map(|group| strip_prefix_ignore_case(group, DEPARTMENT_PREFIX))
            .filter(|department| !department.is_empty())
    }

    /// Account names from `Billing:` tags.
    pub fn billing_tags(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter_map(|group| strip_prefix_ignore_case(group, BILLING_PREFIX))
            .filter(|account| !account.is_empty())
    }

    pub fn standard_cost(&self, job: &JobSnapshot) -> Option<Decimal> {
        self.rates
            .cost_for(job.total_grayscale_pages, job.total_color_pages)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(value[prefix.len()..].trim())
    } else {
        None
    }
}

/// Client-side dialog channel state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(default)]
    pub running: bool,
}

/// Everything a pipeline reads for one job event.
pub struct JobInputs<'a> {
    pub job: &'a JobSnapshot,
    pub printer: &'a PrinterContext,
    pub client: ClientContext,
    pub user: &'a dyn UserContext,
    pub now: DateTime<Utc>,
}

impl<'a> JobInputs<'a> {
    /// Web print submissions never have a dialog channel, whatever the host reports.
    pub fn is_client_running(&self) -> bool {
        self.client.running && !self.job.is_web_print_job
    }

    pub(crate) fn who(&self) -> String {
        format!(
            "{} {}@{}",
            self.printer.name, self.job.username, self.job.client_ip
        )
    }
}

/// Personal accounts the host should try, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonalAccounts(Vec<String>);

impl PersonalAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the lowest priority; names already present keep their slot.
    pub fn push(&mut self, account: &str) {
        if !self.contains(account) {
            self.0.push(account.to_string());
        }
    }

    pub fn remove(&mut self, account: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|candidate| candidate != account);
        before != self.0.len()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.0.iter().any(|candidate| candidate == account)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for PersonalAccounts {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut accounts = Self::new();
        for account in iter {
            accounts.push(account.as_ref());
        }
        accounts
    }
}
