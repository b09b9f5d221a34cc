use crate::authflow::AuthorizationFlow;
use crate::gateway::{BackendGateway, GatewayError, config};
use crate::models::{BookMetadata, StepIndicator, WorkflowSnapshot};
use crate::notify::Notifier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

/// Unconditional pause before each upload step, to stay under the
/// marketplace write rate limit.
const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

const GENERIC_FAILURE: &str = "Something went wrong";
const REFRESH_FAILURE: &str = "Failed to refresh token";

/// Owns the publish sequence and the token-status control. Holds the
/// panel-observable state; collaborators are injected so tests can run
/// against fakes.
pub struct Orchestrator {
    gateway: Arc<dyn BackendGateway>,
    notifier: Arc<dyn Notifier>,
    auth_flow: Arc<dyn AuthorizationFlow>,
    authorize_url: String,
    throttle: Duration,
    workflow: Mutex<WorkflowState>,
    token: Mutex<TokenState>,
}

#[derive(Debug, Default)]
struct WorkflowState {
    pdf_url: String,
    step: StepIndicator,
    busy: bool,
    book: Option<BookMetadata>,
}

// The token control has its own busy flag, independent of the publish
// run's flag; the two controls may overlap.
#[derive(Debug, Default)]
struct TokenState {
    has_token: bool,
    busy: bool,
}

#[derive(Debug, Error)]
#[error("step `{step}` failed: {message}")]
pub struct PublishError {
    step: &'static str,
    message: String,
}

impl PublishError {
    fn from_gateway(step: &'static str, err: GatewayError) -> Self {
        let message = match err {
            GatewayError::Backend(message) => message,
            other => other.to_string(),
        };
        Self { step, message }
    }

    fn notice(&self) -> String {
        if self.message.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            self.message.clone()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// All eight remote steps completed; state has been reset.
    Completed {
        listing_id: String,
        steps: Vec<StepReport>,
    },
    /// Empty URL or a run already in flight; nothing was attempted.
    Rejected,
    /// A step failed; later steps were skipped and state (other than
    /// the busy flag) was left as-is.
    Failed { step: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
}

impl StepReport {
    fn new(name: &str, elapsed_ms: u128) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TokenActionOutcome {
    Refreshed,
    RefreshFailed,
    AuthorizationOpened,
    /// A refresh was already running.
    Ignored,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        notifier: Arc<dyn Notifier>,
        auth_flow: Arc<dyn AuthorizationFlow>,
    ) -> Self {
        Self::with_throttle(gateway, notifier, auth_flow, DEFAULT_THROTTLE)
    }

    pub fn with_throttle(
        gateway: Arc<dyn BackendGateway>,
        notifier: Arc<dyn Notifier>,
        auth_flow: Arc<dyn AuthorizationFlow>,
        throttle: Duration,
    ) -> Self {
        Self {
            gateway,
            notifier,
            auth_flow,
            authorize_url: config::BACKEND_ROOT.clone(),
            throttle,
            workflow: Mutex::new(WorkflowState::default()),
            token: Mutex::new(TokenState::default()),
        }
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let workflow = self.workflow.lock().await;
        let token = self.token.lock().await;
        WorkflowSnapshot {
            step: workflow.step,
            busy: workflow.busy,
            pdf_url: workflow.pdf_url.clone(),
            book: workflow.book.clone(),
            has_token: token.has_token,
        }
    }

    /// Probes the identity endpoint to decide whether a usable token is
    /// on file. Both failure shapes mean "no token"; neither is
    /// surfaced to the operator.
    pub async fn check_token_status(&self) -> bool {
        let has_token = match self.gateway.get_identity().await {
            Ok(identity) => {
                debug!(
                    target = "bookstall.workflow",
                    shop_id = %identity.shop_id,
                    "token probe succeeded"
                );
                true
            }
            Err(GatewayError::Backend(message)) => {
                debug!(
                    target = "bookstall.workflow",
                    "backend reports no usable token: {message}"
                );
                false
            }
            Err(err) => {
                debug!(target = "bookstall.workflow", "token probe failed: {err}");
                false
            }
        };
        self.token.lock().await.has_token = has_token;
        has_token
    }

    /// Refreshes the token when one is on file, otherwise hands the
    /// backend root to the external authorization flow and returns
    /// immediately. Never mutates `has_token` itself.
    pub async fn handle_token_action(&self) -> TokenActionOutcome {
        let has_token = {
            let mut token = self.token.lock().await;
            if token.busy {
                return TokenActionOutcome::Ignored;
            }
            if token.has_token {
                token.busy = true;
            }
            token.has_token
        };

        if !has_token {
            self.auth_flow.open_external(&self.authorize_url);
            return TokenActionOutcome::AuthorizationOpened;
        }

        let outcome = match self.gateway.refresh_access_token().await {
            Ok(()) => {
                self.notifier.success("Token refreshed successfully!");
                TokenActionOutcome::Refreshed
            }
            Err(err) => {
                self.notifier
                    .failure(&refresh_failure_message(&err));
                TokenActionOutcome::RefreshFailed
            }
        };
        self.token.lock().await.busy = false;
        outcome
    }

    /// The eight-step publish pipeline, short-circuiting on the first
    /// failure. No compensation on partial failure: an already-fetched
    /// PDF and an already-created listing are left on the backend.
    pub async fn run_publish_sequence(&self, pdf_url: &str) -> PublishOutcome {
        let requested = pdf_url.trim().to_string();
        {
            let mut workflow = self.workflow.lock().await;
            if requested.is_empty() {
                debug!(
                    target = "bookstall.workflow",
                    "ignoring publish request with empty url"
                );
                return PublishOutcome::Rejected;
            }
            if workflow.busy {
                debug!(
                    target = "bookstall.workflow",
                    "publish already in flight; ignoring"
                );
                return PublishOutcome::Rejected;
            }
            workflow.busy = true;
            workflow.step = StepIndicator::Two;
            workflow.pdf_url = requested.clone();
        }

        let mut steps = Vec::new();
        let result = self.publish(&requested, &mut steps).await;

        let mut workflow = self.workflow.lock().await;
        match result {
            Ok(listing_id) => {
                self.notifier.success("Listing created successfully!");
                workflow.step = StepIndicator::One;
                workflow.pdf_url.clear();
                workflow.book = None;
                workflow.busy = false;
                PublishOutcome::Completed { listing_id, steps }
            }
            Err(err) => {
                warn!(
                    target = "bookstall.workflow",
                    step = err.step,
                    "publish aborted: {err}"
                );
                self.notifier.failure(&err.notice());
                workflow.busy = false;
                PublishOutcome::Failed {
                    step: err.step.to_string(),
                    message: err.message,
                }
            }
        }
    }

    async fn publish(
        &self,
        pdf_url: &str,
        steps: &mut Vec<StepReport>,
    ) -> Result<String, PublishError> {
        info!(target = "bookstall.workflow", "downloading pdf");
        let fetched = self
            .capture_step("fetch_pdf", steps, self.gateway.fetch_pdf(pdf_url))
            .await?;

        info!(
            target = "bookstall.workflow",
            title = %fetched.title,
            "searching book details"
        );
        let book = self
            .capture_step(
                "search_metadata",
                steps,
                self.gateway.search_metadata(&fetched.title),
            )
            .await?;
        // Displayed even when a later step still fails.
        self.workflow.lock().await.book = Some(book.clone());

        info!(target = "bookstall.workflow", "generating description");
        let description = self
            .capture_step(
                "generate_description",
                steps,
                self.gateway.generate_description(&book),
            )
            .await?;

        info!(target = "bookstall.workflow", "fetching seller identity");
        let identity = self
            .capture_step("get_identity", steps, self.gateway.get_identity())
            .await?;

        info!(
            target = "bookstall.workflow",
            shop_id = %identity.shop_id,
            "creating listing"
        );
        let receipt = self
            .capture_step(
                "create_listing",
                steps,
                self.gateway
                    .create_listing(&identity.shop_id, &fetched.title, &description),
            )
            .await?;

        sleep(self.throttle).await;
        match book.cover_image.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(cover) => {
                info!(target = "bookstall.workflow", "uploading cover image");
                self.capture_step(
                    "upload_image",
                    steps,
                    self.gateway
                        .upload_image(&identity.shop_id, &receipt.listing_id, cover),
                )
                .await?;
            }
            None => {
                debug!(
                    target = "bookstall.workflow",
                    "no cover image; skipping upload"
                );
            }
        }

        sleep(self.throttle).await;
        info!(
            target = "bookstall.workflow",
            file = %fetched.pdf,
            "uploading pdf file"
        );
        self.capture_step(
            "upload_file",
            steps,
            self.gateway
                .upload_file(&identity.shop_id, &receipt.listing_id, &fetched.pdf),
        )
        .await?;

        info!(
            target = "bookstall.workflow",
            file = %fetched.pdf,
            "deleting temporary pdf"
        );
        self.capture_step(
            "delete_temp_file",
            steps,
            self.gateway.delete_temp_file(&fetched.pdf),
        )
        .await?;

        Ok(receipt.listing_id)
    }

    async fn capture_step<T, Fut>(
        &self,
        name: &'static str,
        steps: &mut Vec<StepReport>,
        fut: Fut,
    ) -> Result<T, PublishError>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let started = Instant::now();
        let value = fut
            .await
            .map_err(|err| PublishError::from_gateway(name, err))?;
        let elapsed_ms = started.elapsed().as_millis();
        debug!(
            target = "bookstall.workflow",
            step = name,
            elapsed_ms = elapsed_ms as u64,
            "step completed"
        );
        steps.push(StepReport::new(name, elapsed_ms));
        Ok(value)
    }
}

fn refresh_failure_message(err: &GatewayError) -> String {
    let message = match err {
        GatewayError::Backend(message) => message.trim().to_string(),
        other => other.to_string(),
    };
    if message.is_empty() {
        REFRESH_FAILURE.to_string()
    } else {
        message
    }
}
