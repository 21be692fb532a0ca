//! Policy options and the layered resolver.
//!
//! Every recognised option has a built-in default in [`PolicyOptions`]. Callers
//! supply a [`PolicyOptionsPatch`] in which every field is optional; nested
//! records merge field by field while scalars and lists are replaced outright.
//! Fields wrapped in [`Toggle`] also accept `false` to switch a feature off.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SITE_RESTRICT_GROUP: &str = "CITES-PaperCut-SiteUsers";
pub const DEFAULT_SITE_GROUP_TEMPLATE: &str = "CITES-PaperCut-SiteUsers-%site%";
pub const DEFAULT_PRINTER_NAME_PATTERN: &str = "(?i)^([a-z0-9]+)[_-]";
pub const DEFAULT_EXTERNAL_USER_GROUP: &str = "CITES-PaperCut-ExternalAccountUsers";
pub const PERSONAL_ACCOUNT_SENTINEL: &str = "[personal]";
/// Add-credit page of the print server's user web interface.
pub const DEFAULT_TOP_UP_URL: &str = "/user";

/// Types that accept a partial override of themselves.
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: Self::Patch);
}

/// Resolve per-call overrides against a set of defaults.
pub fn resolve(mut defaults: PolicyOptions, overrides: Option<PolicyOptionsPatch>) -> PolicyOptions {
    if let Some(patch) = overrides {
        defaults.merge(patch);
    }
    defaults
}

/// Fully resolved options consumed by the pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOptions {
    pub discount_groups: Option<BTreeMap<String, DiscountRate>>,
    pub free_groups: Option<FreeGroups>,
    pub notify_printed: bool,
    pub no_client_account: Option<NoClientAccount>,
    pub check_account_printer_group: bool,
    pub site_restrict_users: Option<SiteRestrictionOptions>,
    pub external_account: ExternalAccountOptions,
    pub personal_accounts: PersonalAccountOptions,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            discount_groups: None,
            free_groups: Some(FreeGroups::Auto),
            notify_printed: false,
            no_client_account: Some(NoClientAccount::Personal),
            check_account_printer_group: true,
            site_restrict_users: Some(SiteRestrictionOptions::default()),
            external_account: ExternalAccountOptions::default(),
            personal_accounts: PersonalAccountOptions::default(),
        }
    }
}

impl PolicyOptions {
    /// Apply several override layers in order, later layers winning.
    pub fn layered<I>(patches: I) -> Self
    where
        I: IntoIterator<Item = PolicyOptionsPatch>,
    {
        patches
            .into_iter()
            .fold(Self::default(), |options, patch| resolve(options, Some(patch)))
    }
}

impl Merge for PolicyOptions {
    type Patch = PolicyOptionsPatch;

    fn merge(&mut self, patch: PolicyOptionsPatch) {
        if let Some(groups) = patch.discount_groups {
            merge_toggle(&mut self.discount_groups, groups);
        }
        if let Some(free) = patch.free_groups {
            self.free_groups = free.into_option();
        }
        if let Some(notify) = patch.notify_printed {
            self.notify_printed = notify;
        }
        if let Some(account) = patch.no_client_account {
            self.no_client_account = account
                .into_option()
                .map(|name| NoClientAccount::from_name(&name));
        }
        if let Some(check) = patch.check_account_printer_group {
            self.check_account_printer_group = check;
        }
        if let Some(site) = patch.site_restrict_users {
            merge_toggle(&mut self.site_restrict_users, site);
        }
        if let Some(external) = patch.external_account {
            self.external_account.merge(external);
        }
        if let Some(personal) = patch.personal_accounts {
            self.personal_accounts.merge(personal);
        }
    }
}

fn merge_toggle<T>(target: &mut Option<T>, patch: Toggle<T::Patch>)
where
    T: Merge + Default,
{
    match patch {
        Toggle::Disabled => *target = None,
        Toggle::Enabled(patch) => target.get_or_insert_with(T::default).merge(patch),
    }
}

fn replace<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Partial options as supplied by a caller or a site options file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyOptionsPatch {
    pub discount_groups: Option<Toggle<BTreeMap<String, DiscountRatePatch>>>,
    pub free_groups: Option<Toggle<FreeGroups>>,
    pub notify_printed: Option<bool>,
    pub no_client_account: Option<Toggle<String>>,
    pub check_account_printer_group: Option<bool>,
    pub site_restrict_users: Option<Toggle<SiteRestrictionOptionsPatch>>,
    pub external_account: Option<ExternalAccountOptionsPatch>,
    pub personal_accounts: Option<PersonalAccountOptionsPatch>,
}

impl PolicyOptionsPatch {
    pub fn from_json_str(raw: &str) -> Result<Self, OptionsError> {
        serde_json::from_str(raw).map_err(|source| OptionsError::Parse { source })
    }

    pub fn from_path(path: &Path) -> Result<Self, OptionsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

/// Failure to load an options document.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("unable to read policy options from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid policy options document: {source}")]
    Parse { source: serde_json::Error },
}

/// A feature that may be switched off by setting it to `false`.
///
/// `true` enables the feature with its built-in settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggle<T> {
    Disabled,
    Enabled(T),
}

impl<T> Toggle<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Toggle::Disabled => None,
            Toggle::Enabled(value) => Some(value),
        }
    }
}

impl<'de, T> Deserialize<'de> for Toggle<T>
where
    T: Deserialize<'de> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Flag(bool),
            Value(T),
        }

        Ok(match Repr::<T>::deserialize(deserializer)? {
            Repr::Flag(false) => Toggle::Disabled,
            Repr::Flag(true) => Toggle::Enabled(T::default()),
            Repr::Value(value) => Toggle::Enabled(value),
        })
    }
}

/// Per-page rates applied to members of a discount group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscountRate {
    pub bw: RateValue,
    pub color: RateValue,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiscountRatePatch {
    pub bw: Option<RateValue>,
    pub color: Option<RateValue>,
}

impl Merge for DiscountRate {
    type Patch = DiscountRatePatch;

    fn merge(&mut self, patch: DiscountRatePatch) {
        replace(&mut self.bw, patch.bw);
        replace(&mut self.color, patch.color);
    }
}

impl Merge for BTreeMap<String, DiscountRate> {
    type Patch = BTreeMap<String, DiscountRatePatch>;

    fn merge(&mut self, patch: Self::Patch) {
        for (group, rate) in patch {
            self.entry(group).or_default().merge(rate);
        }
    }
}

/// A configured rate. Anything that is not a JSON number is kept verbatim so
/// the discount rule can report it instead of failing the whole document.
#[derive(Debug, Clone, PartialEq)]
pub enum RateValue {
    Number(Decimal),
    Invalid(serde_json::Value),
}

impl RateValue {
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            RateValue::Number(amount) => Some(*amount),
            RateValue::Invalid(_) => None,
        }
    }
}

impl Default for RateValue {
    fn default() -> Self {
        RateValue::Invalid(serde_json::Value::Null)
    }
}

impl From<Decimal> for RateValue {
    fn from(value: Decimal) -> Self {
        RateValue::Number(value)
    }
}

impl<'de> Deserialize<'de> for RateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let parsed = match &raw {
            serde_json::Value::Number(number) => {
                let text = number.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .ok()
            }
            _ => None,
        };

        Ok(match parsed {
            Some(amount) => RateValue::Number(amount),
            None => RateValue::Invalid(raw),
        })
    }
}

/// Which groups print for free.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FreeGroups {
    /// One group per `Department:` tag on the printer.
    #[default]
    Auto,
    Named(Vec<String>),
}

impl<'de> Deserialize<'de> for FreeGroups {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            List(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) if text.trim().eq_ignore_ascii_case("auto") => FreeGroups::Auto,
            Repr::Text(text) => FreeGroups::Named(vec![text]),
            Repr::List(groups) => FreeGroups::Named(groups),
        })
    }
}

/// Account forced onto jobs submitted without an interactive client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoClientAccount {
    Personal,
    Shared(String),
}

impl NoClientAccount {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name == PERSONAL_ACCOUNT_SENTINEL {
            NoClientAccount::Personal
        } else {
            NoClientAccount::Shared(name.to_string())
        }
    }
}

/// Site lock: members of `restrict_group_name` may only print at sites whose
/// derived group they also belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRestrictionOptions {
    pub restrict_group_name: String,
    /// Must capture the site token as its first group.
    pub printer_name_regexp: String,
    /// `%site%` is replaced with the uppercased site token.
    pub group_name_template: String,
}

impl Default for SiteRestrictionOptions {
    fn default() -> Self {
        Self {
            restrict_group_name: DEFAULT_SITE_RESTRICT_GROUP.to_string(),
            printer_name_regexp: DEFAULT_PRINTER_NAME_PATTERN.to_string(),
            group_name_template: DEFAULT_SITE_GROUP_TEMPLATE.to_string(),
        }
    }
}

impl SiteRestrictionOptions {
    pub fn printer_pattern(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.printer_name_regexp)
    }

    pub fn site_group_name(&self, site: &str) -> String {
        self.group_name_template
            .replacen("%site%", &site.to_uppercase(), 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteRestrictionOptionsPatch {
    pub restrict_group_name: Option<String>,
    pub printer_name_regexp: Option<String>,
    pub group_name_template: Option<String>,
}

impl Merge for SiteRestrictionOptions {
    type Patch = SiteRestrictionOptionsPatch;

    fn merge(&mut self, patch: SiteRestrictionOptionsPatch) {
        replace(&mut self.restrict_group_name, patch.restrict_group_name);
        replace(&mut self.printer_name_regexp, patch.printer_name_regexp);
        replace(&mut self.group_name_template, patch.group_name_template);
    }
}

/// Pipeline that owns the external-account gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExternalGateStage {
    PreSelection,
    #[default]
    PostSelection,
}

/// Externally billed personal account settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAccountOptions {
    pub enabled: bool,
    pub stage: ExternalGateStage,
    /// Printer group marking printers that may bill externally.
    pub printer_group: String,
    /// The user must belong to every one of these groups.
    pub enable_user_groups: Vec<String>,
    pub prompt_choice: bool,
    pub always_prompt: bool,
    /// Used when the user has no remembered or fresh answer.
    pub default_enabled: bool,
    pub choice_property: String,
    pub remember_days: Vec<u32>,
    pub check_balance: bool,
    pub balance_provider: String,
    /// Linked from the shortfall prompt.
    pub top_up_url: String,
}

impl Default for ExternalAccountOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stage: ExternalGateStage::PostSelection,
            printer_group: "Account:External".to_string(),
            enable_user_groups: vec![DEFAULT_EXTERNAL_USER_GROUP.to_string()],
            prompt_choice: true,
            always_prompt: false,
            default_enabled: true,
            choice_property: "external-account-choice".to_string(),
            remember_days: vec![0, 1, 7, 30],
            check_balance: true,
            balance_provider: "External".to_string(),
            top_up_url: DEFAULT_TOP_UP_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalAccountOptionsPatch {
    pub enabled: Option<bool>,
    pub stage: Option<ExternalGateStage>,
    pub printer_group: Option<String>,
    pub enable_user_groups: Option<Vec<String>>,
    pub prompt_choice: Option<bool>,
    pub always_prompt: Option<bool>,
    pub default_enabled: Option<bool>,
    pub choice_property: Option<String>,
    pub remember_days: Option<Vec<u32>>,
    pub check_balance: Option<bool>,
    pub balance_provider: Option<String>,
    pub top_up_url: Option<String>,
}

impl Merge for ExternalAccountOptions {
    type Patch = ExternalAccountOptionsPatch;

    fn merge(&mut self, patch: ExternalAccountOptionsPatch) {
        replace(&mut self.enabled, patch.enabled);
        replace(&mut self.stage, patch.stage);
        replace(&mut self.printer_group, patch.printer_group);
        replace(&mut self.enable_user_groups, patch.enable_user_groups);
        replace(&mut self.prompt_choice, patch.prompt_choice);
        replace(&mut self.always_prompt, patch.always_prompt);
        replace(&mut self.default_enabled, patch.default_enabled);
        replace(&mut self.choice_property, patch.choice_property);
        replace(&mut self.remember_days, patch.remember_days);
        replace(&mut self.check_balance, patch.check_balance);
        replace(&mut self.balance_provider, patch.balance_provider);
        replace(&mut self.top_up_url, patch.top_up_url);
    }
}

/// Personal accounts offered to the host, highest priority first.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalAccountOptions {
    pub names: Vec<String>,
    pub add_defaults: bool,
}

impl Default for PersonalAccountOptions {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            add_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalAccountOptionsPatch {
    pub names: Option<Vec<String>>,
    pub add_defaults: Option<bool>,
}

impl Merge for PersonalAccountOptions {
    type Patch = PersonalAccountOptionsPatch;

    fn merge(&mut self, patch: PersonalAccountOptionsPatch) {
        replace(&mut self.names, patch.names);
        replace(&mut self.add_defaults, patch.add_defaults);
    }
}
