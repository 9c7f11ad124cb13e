//! Prompted Generation Calls
//!
//! Every outbound model request goes through `Generator`, which applies
//! capability gating, debits the usage ledger and (for typed calls) runs
//! lenient recovery on the answer.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::credits::{Operation, UsageLedger};
use crate::model::{GenerationRequest, GenerationResponse, ModelClient, ModelError};
use crate::recovery::{recover_json, Recovered};

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Sentinel: a paid capability must be selected before this call.
    #[error("a paid capability must be selected for this operation")]
    CapabilityRequired,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model output could not be used: {0}")]
    Unparseable(String),
}

impl GenerationError {
    pub fn is_capability_required(&self) -> bool {
        matches!(self, GenerationError::CapabilityRequired)
    }
}

/// Whether the host currently has a paid capability selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityContext {
    pub has_capability: bool,
}

impl CapabilityContext {
    pub fn selected() -> Self {
        Self { has_capability: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Bypass the capability predicate. Used for the single retry after the
    /// host's selection flow has resolved.
    pub skip_check: bool,
}

/// Host side of capability gating.
#[async_trait]
pub trait CapabilityHost: Send + Sync {
    async fn has_selected_capability(&self) -> bool;

    /// Run the host's selection flow. Returns once the user has answered.
    async fn select_capability(&self);
}

pub struct Generator<C> {
    client: C,
}

impl<C: ModelClient> Generator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Gate, debit, dispatch.
    pub async fn call(
        &self,
        op: Operation,
        request: &GenerationRequest,
        ledger: &mut UsageLedger,
        ctx: CapabilityContext,
        options: CallOptions,
    ) -> Result<GenerationResponse, GenerationError> {
        if op.requires_capability() && !options.skip_check && !ctx.has_capability {
            warn!(operation = ?op, "capability required");
            return Err(GenerationError::CapabilityRequired);
        }

        self.charge(ledger, op);
        self.dispatch(request).await
    }

    /// Like `call`, but on the capability sentinel runs the host's selection
    /// flow and retries exactly once.
    pub async fn call_with_selection(
        &self,
        op: Operation,
        request: &GenerationRequest,
        ledger: &mut UsageLedger,
        host: &dyn CapabilityHost,
    ) -> Result<GenerationResponse, GenerationError> {
        let ctx = if host.has_selected_capability().await {
            CapabilityContext::selected()
        } else {
            CapabilityContext::default()
        };

        match self.call(op, request, ledger, ctx, CallOptions::default()).await {
            Err(e) if e.is_capability_required() => {
                info!(operation = ?op, "opening capability selection");
                host.select_capability().await;
                self.call(op, request, ledger, ctx, CallOptions { skip_check: true })
                    .await
            }
            other => other,
        }
    }

    /// Typed call: recovery always runs on the answer text.
    pub async fn call_json(
        &self,
        op: Operation,
        request: &GenerationRequest,
        ledger: &mut UsageLedger,
    ) -> Result<Recovered, GenerationError> {
        let response = self
            .call(op, request, ledger, CapabilityContext::default(), CallOptions::default())
            .await?;
        Ok(recover_json(&response.text))
    }

    /// Debit without dispatching. For fan-out callers that charge up front.
    pub fn charge(&self, ledger: &mut UsageLedger, op: Operation) {
        let entry = ledger.debit(op);
        info!(operation = ?op, credits = entry.credits, "debited");
    }

    /// Dispatch without gating or debiting.
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.client.generate(request).await.map_err(|e| {
            warn!(model = %request.model, error = %e, "model call failed");
            GenerationError::from(e)
        })
    }
}
