//! # Submission Queue Processor
//!
//! Drains due `SUNATEnvioQueue` entries through a [`SunatGateway`].
//!
//! ## One Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  due(now, batch) ──► for each entry                                    │
//! │                          │                                              │
//! │                          ▼                                              │
//! │                 gateway.submit(&entry)                                  │
//! │                          │                                              │
//! │     ┌──────────────┬─────┴────────┬───────────────────┐                │
//! │     ▼              ▼              ▼                   ▼                │
//! │  Accepted       Observed       Rejected          Unavailable           │
//! │  mark_sent      mark_sent      mark_sent         mark_failed           │
//! │  ACEPTADO       OBSERVADO      RECHAZADO         (retry or FALLIDO)    │
//! │                                                                         │
//! │  A failure on one entry is logged and the pass moves on.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No gateway in this workspace talks to SUNAT. An embedding binary wires
//! one in through [`crate::serve`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::QueueSettings;
use caja_core::retry::RetryPolicy;
use caja_core::{SubmissionEntry, SunatStatus};
use caja_db::{Database, DbResult, SubmissionFault};

// =============================================================================
// Gateway
// =============================================================================

/// What SUNAT answered (or the CDR said) for an accepted document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub response_code: Option<String>,
    pub description: Option<String>,
}

/// Result of handing one entry to the gateway.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Delivered and accepted.
    Accepted(Receipt),
    /// Delivered and accepted with observations.
    Observed(Receipt),
    /// Delivered and refused. Final: resending the same XML won't help.
    Rejected(SubmissionFault),
    /// Not delivered (transport error, SUNAT down). Retried with backoff.
    Unavailable(SubmissionFault),
}

/// Future returned by [`SunatGateway::submit`].
pub type GatewayFuture<'a> = Pin<Box<dyn Future<Output = SubmissionOutcome> + Send + 'a>>;

/// Sends one queued document to SUNAT.
pub trait SunatGateway: Send + Sync {
    fn submit<'a>(&'a self, entry: &'a SubmissionEntry) -> GatewayFuture<'a>;
}

// =============================================================================
// Processing
// =============================================================================

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub sent: usize,
    pub rejected: usize,
    pub retried: usize,
    pub gave_up: usize,
    pub errors: usize,
}

/// Runs one pass over the entries due now.
pub async fn process_due(
    db: &Database,
    gateway: &dyn SunatGateway,
    policy: &RetryPolicy,
    batch_size: u32,
) -> DbResult<PassReport> {
    let due = db.submissions().due(Utc::now(), batch_size).await?;
    let mut report = PassReport::default();
    if due.is_empty() {
        return Ok(report);
    }
    debug!(count = due.len(), "Processing due submissions");

    for entry in &due {
        let outcome = gateway.submit(entry).await;
        if let Err(e) = record(db, entry, outcome, policy, &mut report).await {
            error!(entry_id = %entry.id, cbc_id = %entry.cbc_id, error = %e, "Failed to record submission outcome");
            report.errors += 1;
        }
    }

    info!(
        sent = report.sent,
        rejected = report.rejected,
        retried = report.retried,
        gave_up = report.gave_up,
        errors = report.errors,
        "Submission pass complete"
    );
    Ok(report)
}

async fn record(
    db: &Database,
    entry: &SubmissionEntry,
    outcome: SubmissionOutcome,
    policy: &RetryPolicy,
    report: &mut PassReport,
) -> DbResult<()> {
    let (status, code, response) = match outcome {
        SubmissionOutcome::Accepted(receipt) => {
            (SunatStatus::Accepted, receipt.response_code, receipt.description)
        }
        SubmissionOutcome::Observed(receipt) => {
            (SunatStatus::Observed, receipt.response_code, receipt.description)
        }
        SubmissionOutcome::Rejected(fault) => {
            report.rejected += 1;
            (SunatStatus::Rejected, fault.fault_code, fault.fault_string)
        }
        SubmissionOutcome::Unavailable(fault) => {
            let updated = db.submissions().mark_failed(&entry.id, &fault, policy, Utc::now()).await?;
            if updated.next_retry_at.is_some() {
                report.retried += 1;
            } else {
                report.gave_up += 1;
            }
            return Ok(());
        }
    };

    db.submissions().mark_sent(&entry.id).await?;
    if status != SunatStatus::Rejected {
        report.sent += 1;
    }

    match &entry.invoice_id {
        Some(invoice_id) => {
            db.invoices()
                .update_sunat_status(invoice_id, status, code.as_deref(), response.as_deref())
                .await?;
        }
        None => warn!(entry_id = %entry.id, cbc_id = %entry.cbc_id, "Submission has no invoice to update"),
    }
    Ok(())
}

/// Polls the queue until `shutdown` flips to `true`.
pub async fn run(
    db: Database,
    gateway: Arc<dyn SunatGateway>,
    settings: QueueSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let policy = RetryPolicy::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(settings.poll_interval_secs));
    info!(
        poll_interval_secs = settings.poll_interval_secs,
        batch_size = settings.batch_size,
        "Submission queue processor started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = process_due(&db, gateway.as_ref(), &policy, settings.batch_size).await {
                    error!(error = %e, "Submission pass failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Submission queue processor stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{emitted_boleta, setup};
    use caja_core::SubmissionStatus;
    use caja_db::SubmissionPayload;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers per cbc_id, recording every call.
    struct ScriptedGateway {
        answers: HashMap<String, SubmissionOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn new(answers: Vec<(&str, SubmissionOutcome)>) -> Self {
            ScriptedGateway {
                answers: answers.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SunatGateway for ScriptedGateway {
        fn submit<'a>(&'a self, entry: &'a SubmissionEntry) -> GatewayFuture<'a> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(entry.cbc_id.clone());
                self.answers
                    .get(&entry.cbc_id)
                    .cloned()
                    .unwrap_or_else(|| SubmissionOutcome::Unavailable(SubmissionFault::default()))
            })
        }
    }

    fn payload(name: &str) -> SubmissionPayload {
        SubmissionPayload {
            zip_name: format!("{name}.zip"),
            zip_base64: "UEsDBBQ=".to_string(),
            xml_sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".to_string(),
        }
    }

    fn fault(code: &str, text: &str) -> SubmissionFault {
        SubmissionFault {
            fault_code: Some(code.to_string()),
            fault_string: Some(text.to_string()),
            response_snippet: None,
        }
    }

    #[tokio::test]
    async fn test_pass_updates_entries_and_invoices() {
        let (state, site) = setup().await;
        let db = &state.db;

        let accepted = emitted_boleta(db, &site.id).await;
        let rejected = emitted_boleta(db, &site.id).await;
        let down = emitted_boleta(db, &site.id).await;
        let e1 = db.submissions().enqueue(&accepted, payload("a")).await.unwrap();
        let e2 = db.submissions().enqueue(&rejected, payload("b")).await.unwrap();
        let e3 = db.submissions().enqueue(&down, payload("c")).await.unwrap();

        let gateway = ScriptedGateway::new(vec![
            (
                "B001-1",
                SubmissionOutcome::Accepted(Receipt {
                    response_code: Some("0".to_string()),
                    description: Some("La Boleta numero B001-1, ha sido aceptada".to_string()),
                }),
            ),
            ("B001-2", SubmissionOutcome::Rejected(fault("2017", "El numero de documento del receptor no es valido"))),
            ("B001-3", SubmissionOutcome::Unavailable(fault("0109", "El sistema no puede responder su solicitud"))),
        ]);

        let report = process_due(db, &gateway, &RetryPolicy::default(), 10).await.unwrap();
        assert_eq!(
            report,
            PassReport { sent: 1, rejected: 1, retried: 1, gave_up: 0, errors: 0 }
        );
        assert_eq!(gateway.calls.lock().unwrap().len(), 3);

        let inv = db.invoices().get_by_id(&accepted.id).await.unwrap().unwrap();
        assert_eq!(inv.sunat_status, SunatStatus::Accepted);
        assert_eq!(inv.sunat_response_code.as_deref(), Some("0"));

        let inv = db.invoices().get_by_id(&rejected.id).await.unwrap().unwrap();
        assert_eq!(inv.sunat_status, SunatStatus::Rejected);
        assert_eq!(inv.sunat_response_code.as_deref(), Some("2017"));

        let inv = db.invoices().get_by_id(&down.id).await.unwrap().unwrap();
        assert_eq!(inv.sunat_status, SunatStatus::Pending);

        assert_eq!(db.submissions().get_by_id(&e1.id).await.unwrap().unwrap().status, SubmissionStatus::Sent);
        assert_eq!(db.submissions().get_by_id(&e2.id).await.unwrap().unwrap().status, SubmissionStatus::Sent);
        let retry = db.submissions().get_by_id(&e3.id).await.unwrap().unwrap();
        assert_eq!(retry.status, SubmissionStatus::Pending);
        assert_eq!(retry.attempts, 1);
        assert_eq!(retry.fault_code.as_deref(), Some("0109"));
        assert!(retry.next_retry_at.is_some());

        // The retried entry is not due again yet, the rest are done.
        let second = process_due(db, &gateway, &RetryPolicy::default(), 10).await.unwrap();
        assert_eq!(second, PassReport::default());
        assert_eq!(gateway.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (state, site) = setup().await;
        let db = &state.db;
        let invoice = emitted_boleta(db, &site.id).await;
        let entry = db.submissions().enqueue(&invoice, payload("x")).await.unwrap();

        // Zero backoff keeps the entry due on every pass.
        let policy = RetryPolicy {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 1.0,
        };
        let gateway = ScriptedGateway::new(vec![]);

        let mut last = PassReport::default();
        for _ in 0..entry.max_attempts {
            last = process_due(db, &gateway, &policy, 10).await.unwrap();
        }
        assert_eq!(last.gave_up, 1);

        let entry = db.submissions().get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(entry.status, SubmissionStatus::Failed);
        assert_eq!(entry.attempts, entry.max_attempts);

        let after = process_due(db, &gateway, &policy, 10).await.unwrap();
        assert_eq!(after, PassReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (state, _site) = setup().await;
        let (tx, rx) = watch::channel(false);
        let gateway: Arc<dyn SunatGateway> = Arc::new(ScriptedGateway::new(vec![]));

        let handle = tokio::spawn(run(state.db.clone(), gateway, QueueSettings::default(), rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
