//! The audit control loop.
//!
//! A run walks an explicit state machine:
//!
//! ```text
//! FetchInitial -> Classify -> FetchReference -> Reason -+-> Summarize
//!                                                ^      +-> Enrich --+
//!                                                |      +-> Abort    |
//!                                                +-------------------+
//! ```
//!
//! `next_step` is the only place transitions are decided. Out of `Reason`
//! the run summarizes when sufficient, enriches while
//! `enrichment_iterations < max`, and aborts otherwise, so a run performs at
//! most `max + 1` reasoning passes.
use crate::classify::{self, AuditGroup, UNKNOWN};
use crate::enrichment::{EnrichmentStep, FieldSourceTable};
use crate::error::AuditError;
use crate::facade::{has_error, reference_rules, DataFacade, DataService, FetchContext};
use crate::oracle::ReasoningOracle;
use crate::prompts::ReasoningContext;
use crate::reasoning::CauseReasoner;
use crate::requirements::RequirementTable;
use crate::state::{AuditRequest, AuditState, Record, StateDelta};
use crate::summary::SummaryGenerator;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FetchInitial,
    Classify,
    FetchReference,
    Reason,
    Enrich,
    Summarize,
    Abort,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchInitial => "fetch_initial",
            Self::Classify => "classify",
            Self::FetchReference => "fetch_reference",
            Self::Reason => "reason",
            Self::Enrich => "enrich",
            Self::Summarize => "summarize",
            Self::Abort => "abort",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Summarize | Self::Abort)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step to run after `current` has been applied to `state`; `None` once a
/// terminal step has run.
pub fn next_step(current: Step, state: &AuditState, max_iterations: u32) -> Option<Step> {
    match current {
        Step::FetchInitial => Some(Step::Classify),
        Step::Classify => Some(Step::FetchReference),
        Step::FetchReference => Some(Step::Reason),
        Step::Reason => Some(route_after_reasoning(state, max_iterations)),
        Step::Enrich => Some(Step::Reason),
        Step::Summarize | Step::Abort => None,
    }
}

fn route_after_reasoning(state: &AuditState, max_iterations: u32) -> Step {
    if state.is_sufficient() {
        Step::Summarize
    } else if state.enrichment_iterations < max_iterations {
        Step::Enrich
    } else {
        Step::Abort
    }
}

/// State delta produced by one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepUpdate {
    pub step: Step,
    pub delta: StateDelta,
}

pub struct AuditPipeline {
    service: Box<dyn DataService>,
    reasoning_oracle: Box<dyn ReasoningOracle>,
    summary_oracle: Box<dyn ReasoningOracle>,
    requirements: RequirementTable,
    field_sources: FieldSourceTable,
    max_iterations: u32,
}

impl AuditPipeline {
    pub fn new(
        service: Box<dyn DataService>,
        reasoning_oracle: Box<dyn ReasoningOracle>,
        summary_oracle: Box<dyn ReasoningOracle>,
    ) -> Self {
        Self {
            service,
            reasoning_oracle,
            summary_oracle,
            requirements: RequirementTable::default(),
            field_sources: FieldSourceTable::default(),
            max_iterations: crate::config::DEFAULT_MAX_ENRICHMENT_ITERATIONS,
        }
    }

    pub fn with_requirements(mut self, requirements: RequirementTable) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_field_sources(mut self, field_sources: FieldSourceTable) -> Self {
        self.field_sources = field_sources;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Begin a run. Iterate the returned run for per-step deltas, or call
    /// `finish` to drive it to completion.
    pub fn start(&self, request: &AuditRequest) -> Result<AuditRun<'_>, AuditError> {
        for (name, value) in [
            ("tracking number", &request.tracking_number),
            ("client id", &request.client_id),
            ("carrier id", &request.carrier_id),
        ] {
            if value.trim().is_empty() {
                return Err(AuditError::InvalidRequest(format!("{name} is empty")));
            }
        }
        Ok(AuditRun {
            pipeline: self,
            state: AuditState::new(request),
            next: Some(Step::FetchInitial),
            reason_passes: 0,
            aborted: false,
            span: tracing::info_span!("audit", tracking_number = %request.tracking_number),
        })
    }

    pub fn run_audit(&self, request: &AuditRequest) -> Result<AuditState, AuditError> {
        self.start(request)?.finish()
    }

    fn execute(&self, step: Step, state: &AuditState) -> StateDelta {
        let facade = DataFacade::new(self.service.as_ref());
        match step {
            Step::FetchInitial => fetch_initial(&facade, state),
            Step::Classify => classify_step(state),
            Step::FetchReference => fetch_reference(&facade, state),
            Step::Reason => self.reason(state),
            Step::Enrich => self.enrich(&facade, state),
            Step::Summarize => SummaryGenerator::new(self.summary_oracle.as_ref())
                .summarize(state)
                .into_delta(),
            Step::Abort => abort(state),
        }
    }

    fn reason(&self, state: &AuditState) -> StateDelta {
        let audit_type = state.audit_type.as_deref().unwrap_or(UNKNOWN);
        let combined = state.combined_data();
        let context = ReasoningContext {
            audit_category: state.audit_category.as_deref().unwrap_or(""),
            audit_group: state.audit_group.as_deref().unwrap_or(""),
            parcel: state.parcel_characteristics.as_ref(),
            agreements: state.agreements.as_ref(),
            reference_data: state.reference_data.as_ref(),
            default_dim_divisors: &state.default_dim_divisors,
            enriched_data: &state.enriched_data,
        };
        CauseReasoner::new(&self.requirements, self.reasoning_oracle.as_ref())
            .reason(audit_type, &combined, &context)
            .into_delta()
    }

    fn enrich(&self, facade: &DataFacade<'_>, state: &AuditState) -> StateDelta {
        let context = fetch_context(state);
        EnrichmentStep::new(facade, &self.field_sources)
            .enrich(
                &state.missing_fields,
                &context,
                &state.enriched_data,
                state.enrichment_iterations,
            )
            .into_delta()
    }
}

/// One in-flight audit. Dropping it between steps abandons the run.
pub struct AuditRun<'a> {
    pipeline: &'a AuditPipeline,
    state: AuditState,
    next: Option<Step>,
    reason_passes: u32,
    aborted: bool,
    span: tracing::Span,
}

impl AuditRun<'_> {
    #[cfg(test)]
    pub fn state(&self) -> &AuditState {
        &self.state
    }

    pub fn reason_passes(&self) -> u32 {
        self.reason_passes
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.next.is_none()
    }

    /// Run remaining steps and return the final state, or the exhaustion
    /// error when the run aborted.
    pub fn finish(mut self) -> Result<AuditState, AuditError> {
        while self.next().is_some() {}
        if self.aborted {
            let missing = self.state.missing_fields.iter().cloned().collect();
            return Err(AuditError::EnrichmentExhausted {
                iterations: self.state.enrichment_iterations,
                missing,
                state: Box::new(self.state),
            });
        }
        Ok(self.state)
    }
}

impl Iterator for AuditRun<'_> {
    type Item = StepUpdate;

    fn next(&mut self) -> Option<StepUpdate> {
        let step = self.next?;
        let _entered = self.span.enter();
        tracing::debug!(step = %step, "step start");

        let delta = self.pipeline.execute(step, &self.state);
        self.state.apply(&delta);
        match step {
            Step::Reason => self.reason_passes += 1,
            Step::Abort => self.aborted = true,
            _ => {}
        }

        let next = next_step(step, &self.state, self.pipeline.max_iterations);
        if step == Step::Reason {
            tracing::info!(
                status = ?self.state.reasoning_status,
                iterations = self.state.enrichment_iterations,
                max_iterations = self.pipeline.max_iterations,
                next = ?next,
                "reasoning routed"
            );
        }
        tracing::debug!(step = %step, "step end");
        if step.is_terminal() {
            tracing::info!(
                outcome = %step,
                iterations = self.state.enrichment_iterations,
                reason_passes = self.reason_passes,
                "audit finished"
            );
        }
        self.next = next;
        Some(StepUpdate { step, delta })
    }
}

fn fetch_initial(facade: &DataFacade<'_>, state: &AuditState) -> StateDelta {
    let tracking = state.tracking_number.as_str();
    let mut rated = facade.get_rated_data(tracking);
    if !has_error(&rated) {
        if let Some(id) = rated.get("id").filter(|id| !id.is_null()).cloned() {
            let services = facade.get_rated_data_additional_services(&id);
            rated.insert("additional_services".to_string(), Value::Array(services));
        }
    }
    let parcel = facade.get_parcel_characteristics(tracking);
    let agreements = facade.get_agreements(&state.client_id, &state.carrier_id);
    let divisors = match ship_date(&parcel, &rated) {
        Some(date) => facade.get_default_dim_divisors(&date),
        None => {
            tracing::warn!("no ship date in parcel or rated data, skipping default DIM divisors");
            Vec::new()
        }
    };
    StateDelta {
        rated_data: Some(rated),
        parcel_characteristics: Some(parcel),
        agreements: Some(agreements),
        default_dim_divisors: Some(divisors),
        enrichment_iterations: Some(0),
        ..StateDelta::default()
    }
}

fn ship_date(parcel: &Record, rated: &Record) -> Option<String> {
    [parcel, rated].into_iter().find_map(|record| {
        record
            .get("shipDate")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|date| !date.is_empty())
            .map(str::to_string)
    })
}

fn classify_step(state: &AuditState) -> StateDelta {
    let rated = state.rated_data.as_ref().filter(|record| {
        let usable = !has_error(record);
        if !usable {
            tracing::warn!("rated data unavailable, classifying as unknown");
        }
        usable
    });
    let result = classify::classify(rated);
    tracing::info!(
        audit_type = %result.audit_type,
        group = %result.audit_group,
        confidence = result.confidence,
        inferred = result.inferred,
        "classified"
    );
    StateDelta {
        audit_type: Some(result.audit_type),
        audit_category: Some(result.audit_category),
        audit_group: Some(result.audit_group.as_str().to_string()),
        classification_confidence: Some(result.confidence),
        ..StateDelta::default()
    }
}

fn fetch_reference(facade: &DataFacade<'_>, state: &AuditState) -> StateDelta {
    let mut reference = facade.get_full_tracking_analysis(&state.tracking_number);
    let audit_type = state.audit_type.as_deref().unwrap_or(UNKNOWN);
    let group = state
        .audit_group
        .as_deref()
        .map(AuditGroup::parse)
        .unwrap_or(AuditGroup::Unknown);
    reference.insert(
        "auditReference".to_string(),
        audit_reference(audit_type, group),
    );
    StateDelta {
        reference_data: Some(reference),
        ..StateDelta::default()
    }
}

/// Type and group, plus the static rules for the audit type.
fn audit_reference(audit_type: &str, group: AuditGroup) -> Value {
    let mut reference = Record::new();
    reference.insert("audit_type".to_string(), json!(audit_type));
    reference.insert("audit_group".to_string(), json!(group.as_str()));
    reference.extend(reference_rules(audit_type));
    Value::Object(reference)
}

fn fetch_context(state: &AuditState) -> FetchContext {
    let combined = state.combined_data();
    let text = |keys: &[&str]| {
        keys.iter().find_map(|key| {
            combined
                .get(*key)
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        })
    };
    FetchContext {
        tracking_number: state.tracking_number.clone(),
        client_id: state.client_id.clone(),
        carrier_id: state.carrier_id.clone(),
        origin_zip: text(&["senderPostal", "originZip"]),
        destination_zip: text(&["receiverPostal", "destinationZip"]),
        rated_data_id: state
            .rated_data
            .as_ref()
            .and_then(|rated| rated.get("id"))
            .filter(|id| !id.is_null())
            .cloned(),
        audit_type: state.audit_type.clone().unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn abort(state: &AuditState) -> StateDelta {
    let missing: Vec<&str> = state.missing_fields.iter().map(String::as_str).collect();
    let message = format!(
        "enrichment exhausted after {} iteration(s); still missing: {}",
        state.enrichment_iterations,
        missing.join(", ")
    );
    tracing::error!(
        iterations = state.enrichment_iterations,
        missing = ?missing,
        "enrichment exhausted"
    );
    StateDelta {
        error: Some(message),
        ..StateDelta::default()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
