//! End-to-end pipeline runs driven through the public engine API.
//!
//! Job events are described as JSON documents the way a host bridge would
//! deliver them, so these scenarios also pin the wire names of every input.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use print_policy::config::{PolicyOptions, PolicyOptionsPatch};
use print_policy::workflows::print_job::{
    evaluate_post_selection, ClientContext, HostAction, HostScript, JobInputs, JobSnapshot,
    PipelineStage, PolicyEngine, PrinterContext, RecordingHost, StaticUser,
};

struct Event {
    job: JobSnapshot,
    printer: PrinterContext,
    user: StaticUser,
    client: ClientContext,
}

impl Event {
    fn from_json(document: Value) -> Self {
        Self {
            job: serde_json::from_value(document["job"].clone()).expect("job snapshot"),
            printer: serde_json::from_value(document["printer"].clone()).expect("printer"),
            user: serde_json::from_value(document["user"].clone()).expect("user"),
            client: ClientContext {
                running: document["clientRunning"].as_bool().unwrap_or(true),
            },
        }
    }

    fn inputs(&self) -> JobInputs<'_> {
        JobInputs {
            job: &self.job,
            printer: &self.printer,
            client: self.client,
            user: &self.user,
            now: evaluated_at(),
        }
    }
}

fn evaluated_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 13, 5, 0)
        .single()
        .expect("valid timestamp")
}

fn patch(document: Value) -> PolicyOptionsPatch {
    serde_json::from_value(document).expect("options patch")
}

fn ics_event(cost: f64, shared_account: Option<&str>, groups: &[&str]) -> Event {
    Event::from_json(json!({
        "job": {
            "cost": cost,
            "totalColorPages": 2,
            "totalGrayscalePages": 10,
            "isAnalysisComplete": true,
            "selectedSharedAccountName": shared_account,
            "printerName": "ics-101-color",
            "documentName": "lab-report.pdf",
            "username": "bkumar",
            "clientIp": "172.16.4.20"
        },
        "printer": {
            "name": "ics-101-color",
            "groups": ["Department:ICS", "Billing:Default"],
            "rates": { "grayscale": 0.15, "color": 0.50 }
        },
        "user": { "groups": groups }
    }))
}

#[test]
fn cheapest_group_rate_wins_without_stacking() {
    let event = ics_event(1.00, None, &["Grad-Students", "Lab-Assistants"]);
    let options = PolicyOptions::layered([patch(json!({
        "freeGroups": false,
        "discountGroups": {
            "Grad-Students": { "bw": 0.05, "color": 0.20 },
            "Lab-Assistants": { "bw": 0.03, "color": 0.25 }
        }
    }))]);
    let mut host = RecordingHost::default();

    let outcome = PolicyEngine::new(options).run_pre_selection(&event.inputs(), &mut host);

    assert_eq!(outcome.cost, dec!(0.80));
    assert_eq!(host.last_cost(), Some(dec!(0.80)));
    assert!(host.actions().contains(&HostAction::AddComment {
        comment: "Discount for Lab-Assistants; original cost $1.00".to_string(),
    }));
}

#[test]
fn free_printing_is_withdrawn_once_a_shared_account_is_chosen() {
    let engine = PolicyEngine::default();
    let free_group = ["CITES-PaperCut-FreePrint-ICS"];

    let submitted = ics_event(2.50, None, &free_group);
    let mut host = RecordingHost::default();
    let outcome = engine.run_pre_selection(&submitted.inputs(), &mut host);
    assert_eq!(outcome.cost, Decimal::ZERO);

    let selected = ics_event(0.0, Some("[Department:ICS] Staff Credit"), &free_group);
    let mut host = RecordingHost::default();
    let outcome = engine.run_post_selection(&selected.inputs(), &mut host);

    assert!(!outcome.stopped);
    assert_eq!(outcome.cost, dec!(2.50));
    assert_eq!(host.last_cost(), Some(dec!(2.50)));
    assert_eq!(host.cancellations(), 0);
}

#[test]
fn restricted_shared_account_on_foreign_printer_prompts_then_cancels() {
    let mut event = ics_event(1.00, Some("[Department:CHEM] Staff Credit"), &[]);
    event.printer.groups = vec!["Department:ICS".to_string()];
    let mut host = RecordingHost::default();

    let stopped = evaluate_post_selection(&event.inputs(), &mut host, None);

    assert!(stopped);
    assert!(matches!(host.actions()[1], HostAction::PromptOk { .. }));
    assert_eq!(
        host.actions()[2],
        HostAction::CancelAndLog {
            reason: "Shared account only for \"Department:CHEM\" printers".to_string(),
        }
    );
    assert_eq!(host.actions().len(), 3);
}

#[test]
fn request_overrides_layer_over_site_options() {
    let event = Event::from_json(json!({
        "job": {
            "cost": 0.40,
            "totalGrayscalePages": 4,
            "isAnalysisComplete": true,
            "printerName": "dcl-lab_bw",
            "username": "mreyes"
        },
        "printer": { "name": "dcl-lab_bw", "groups": ["Billing:Banner"] },
        "user": { "groups": ["Visiting-Scholars", "Visiting-Scholars-LAB"] }
    }));
    let site = patch(json!({
        "siteRestrictUsers": {
            "restrictGroupName": "Visiting-Scholars",
            "printerNameRegexp": "(?i)^[a-z]+-([a-z]+)_",
            "groupNameTemplate": "Visiting-Scholars-%site%"
        }
    }));

    let mut host = RecordingHost::default();
    let outcome = PolicyEngine::new(PolicyOptions::layered([site.clone()]))
        .run_post_selection(&event.inputs(), &mut host);
    assert!(!outcome.stopped);

    let narrowed = patch(json!({ "siteRestrictUsers": { "groupNameTemplate": "Visiting-%site%" } }));
    let mut host = RecordingHost::default();
    let outcome = PolicyEngine::new(PolicyOptions::layered([site.clone(), narrowed]))
        .run_post_selection(&event.inputs(), &mut host);
    assert!(outcome.stopped);
    assert_eq!(
        host.actions().last(),
        Some(&HostAction::SendMessage {
            text: "PRINTING DENIED\n\nYou do not have permission to print on \"dcl-lab_bw\"."
                .to_string(),
        })
    );

    let disabled = patch(json!({ "siteRestrictUsers": false }));
    let mut host = RecordingHost::default();
    let outcome = PolicyEngine::new(PolicyOptions::layered([site, disabled]))
        .run_post_selection(&event.inputs(), &mut host);
    assert!(!outcome.stopped);
}

#[test]
fn web_print_without_account_charges_configured_shared_account() {
    let mut event = ics_event(1.20, None, &[]);
    event.job.is_web_print_job = true;
    let options = PolicyOptions::layered([patch(json!({ "noClientAccount": "Web Print Recovery" }))]);
    let mut host = RecordingHost::new(HostScript::default());

    let outcome = PolicyEngine::new(options).run(PipelineStage::PostSelection, &event.inputs(), &mut host);

    assert!(!outcome.stopped);
    assert_eq!(outcome.shared_account.as_deref(), Some("Web Print Recovery"));
    assert_eq!(
        host.actions()[0],
        HostAction::ChargeToSharedAccount {
            account: "Web Print Recovery".to_string(),
        }
    );
    assert!(!host
        .actions()
        .iter()
        .any(|action| matches!(action, HostAction::SendMessage { .. } | HostAction::PromptOk { .. })));
}

#[test]
fn outcome_and_actions_serialize_for_dry_run_reports() {
    let event = ics_event(3.00, None, &[]);
    let mut host = RecordingHost::default();

    let outcome = PolicyEngine::default().run_post_selection(&event.inputs(), &mut host);
    let report = serde_json::to_value(&outcome).expect("outcome serializes");
    let actions = serde_json::to_value(host.actions()).expect("actions serialize");

    assert_eq!(report["stage"], json!("post_selection"));
    assert_eq!(report["personal_accounts"], json!(["Default"]));
    assert_eq!(actions[0]["action"], json!("change_personal_account_charge_priority"));
    assert_eq!(actions[0]["accounts"], json!(["Default"]));
}
