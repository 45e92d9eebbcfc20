//! The standardization session: explicit state, explicit transitions.
//!
//! A session walks `AwaitingFile -> AwaitingApproval -> Complete`, with
//! `Failed` reachable from either transition and `start_over()` as the only
//! recovery path. All state lives in the [`Session`] value; nothing is
//! ambient, so transitions unit-test without any I/O.
//!
//! The two long-latency external calls (analysis, transformation) are
//! modeled event-driven: `submit_file()` / `approve()` put the session into
//! a loading state and hand back a generation-stamped [`Ticket`]; the
//! matching `complete_*()` delivers the outcome. A ticket from a session
//! generation that has since been abandoned is ignored, so a late response
//! can never overwrite a newer session's state. While a call is outstanding
//! the triggering transitions are rejected, which is what keeps at most one
//! analysis and one transformation in flight.

use log::debug;

use crate::{
    data::{RawDataset, RawRow, StandardizedDataset},
    engine,
    error::RcmError,
    infer::{self, ANALYSIS_SAMPLE_ROWS, PlanSuggestion},
    plan::TransformationPlan,
    schema::StandardColumn,
    template::Template,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    #[default]
    AwaitingFile,
    AwaitingApproval,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingCall {
    Analysis,
    Transform,
}

/// Claim check for an outstanding external call. Stale tickets (from before
/// a `start_over()`) are ignored on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    call: PendingCall,
}

#[derive(Debug, Default)]
pub struct Session {
    step: Step,
    generation: u64,
    pending: Option<PendingCall>,
    headers: Vec<String>,
    data: RawDataset,
    inferred: Option<PlanSuggestion>,
    working_plan: Option<TransformationPlan>,
    result: Option<StandardizedDataset>,
    failure: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn data(&self) -> &[RawRow] {
        &self.data
    }

    /// The plan as currently edited, once analysis has completed.
    pub fn working_plan(&self) -> Option<&TransformationPlan> {
        self.working_plan.as_ref()
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.inferred.as_ref().map(|s| s.reasoning.as_str())
    }

    pub fn result(&self) -> Option<&StandardizedDataset> {
        self.result.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Accept a parsed file and begin analysis. Rejected while another call
    /// is outstanding or outside `AwaitingFile`.
    pub fn submit_file(
        &mut self,
        data: RawDataset,
        headers: Vec<String>,
    ) -> Result<Ticket, RcmError> {
        self.ensure_idle()?;
        if self.step != Step::AwaitingFile {
            return Err(RcmError::Validation(
                "a file has already been submitted; start over first".to_string(),
            ));
        }
        self.data = data;
        self.headers = headers;
        self.pending = Some(PendingCall::Analysis);
        Ok(Ticket {
            generation: self.generation,
            call: PendingCall::Analysis,
        })
    }

    /// Deliver the analysis outcome. A stale or mismatched ticket is ignored.
    pub fn complete_analysis(
        &mut self,
        ticket: Ticket,
        outcome: Result<PlanSuggestion, RcmError>,
    ) {
        if !self.accept(ticket, PendingCall::Analysis) {
            return;
        }
        match outcome {
            Ok(suggestion) => {
                self.working_plan = Some(suggestion.plan.clone());
                self.inferred = Some(suggestion);
                self.step = Step::AwaitingApproval;
            }
            Err(err) => self.fail(err),
        }
    }

    /// Replace one rule's source columns in the working plan.
    pub fn set_source(
        &mut self,
        target: StandardColumn,
        source: Vec<String>,
    ) -> Result<(), RcmError> {
        let plan = self.editable_plan()?;
        plan.set_source(target, source);
        Ok(())
    }

    /// Reset the working plan to the originally inferred plan (not to an
    /// empty plan).
    pub fn use_suggestion(&mut self) -> Result<(), RcmError> {
        self.ensure_editable()?;
        let inferred = self
            .inferred
            .as_ref()
            .map(|s| s.plan.clone())
            .unwrap_or_default();
        self.working_plan = Some(inferred);
        Ok(())
    }

    /// Wholesale-replace the working plan with a template's plan.
    pub fn apply_template(&mut self, template: &Template) -> Result<(), RcmError> {
        self.ensure_editable()?;
        self.working_plan = Some(template.plan.clone());
        Ok(())
    }

    /// Approve the working plan and begin transformation.
    pub fn approve(&mut self) -> Result<Ticket, RcmError> {
        self.ensure_idle()?;
        if self.step != Step::AwaitingApproval {
            return Err(RcmError::Validation(
                "no plan is awaiting approval".to_string(),
            ));
        }
        self.pending = Some(PendingCall::Transform);
        Ok(Ticket {
            generation: self.generation,
            call: PendingCall::Transform,
        })
    }

    /// Deliver the transformation outcome. A stale or mismatched ticket is
    /// ignored; a row-count mismatch has already been rejected at the
    /// provider boundary.
    pub fn complete_transform(
        &mut self,
        ticket: Ticket,
        outcome: Result<StandardizedDataset, RcmError>,
    ) {
        if !self.accept(ticket, PendingCall::Transform) {
            return;
        }
        match outcome {
            Ok(rows) => {
                self.result = Some(rows);
                self.step = Step::Complete;
            }
            Err(err) => self.fail(err),
        }
    }

    /// Discard everything except the template store (which this session does
    /// not own) and return to `AwaitingFile`. Outstanding calls are
    /// invalidated: their tickets will no longer be accepted.
    pub fn start_over(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.headers.clear();
        self.data.clear();
        self.inferred = None;
        self.working_plan = None;
        self.result = None;
        self.failure = None;
        self.step = Step::AwaitingFile;
    }

    fn accept(&mut self, ticket: Ticket, expected: PendingCall) -> bool {
        if ticket.generation != self.generation {
            debug!("Ignoring completion for abandoned session generation {}", ticket.generation);
            return false;
        }
        if ticket.call != expected || self.pending != Some(expected) {
            debug!("Ignoring completion that does not match the outstanding call");
            return false;
        }
        self.pending = None;
        true
    }

    fn fail(&mut self, err: RcmError) {
        self.failure = Some(err.to_string());
        self.step = Step::Failed;
    }

    fn ensure_idle(&self) -> Result<(), RcmError> {
        if self.pending.is_some() {
            return Err(RcmError::Validation(
                "a call is already in flight for this session".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), RcmError> {
        self.ensure_idle()?;
        if self.step != Step::AwaitingApproval {
            return Err(RcmError::Validation(
                "the plan can only be edited while awaiting approval".to_string(),
            ));
        }
        Ok(())
    }

    fn editable_plan(&mut self) -> Result<&mut TransformationPlan, RcmError> {
        self.ensure_editable()?;
        self.working_plan
            .as_mut()
            .ok_or_else(|| RcmError::Validation("no working plan present".to_string()))
    }
}

/// Drive the analysis call synchronously against the installed analyzer.
pub fn run_analysis(
    session: &mut Session,
    data: RawDataset,
    headers: Vec<String>,
    templates: &[Template],
) -> Result<(), RcmError> {
    let ticket = session.submit_file(data, headers)?;
    let sample_len = session.data().len().min(ANALYSIS_SAMPLE_ROWS);
    let outcome = infer::provider().analyze(
        &session.data()[..sample_len],
        session.headers(),
        templates,
    );
    let failure = outcome.as_ref().err().cloned();
    session.complete_analysis(ticket, outcome);
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Drive the transformation call synchronously against the installed
/// provider.
pub fn run_transform(session: &mut Session) -> Result<(), RcmError> {
    let plan = session
        .working_plan()
        .cloned()
        .ok_or_else(|| RcmError::Validation("no working plan present".to_string()))?;
    let ticket = session.approve()?;
    let outcome = engine::transform(session.data(), &plan);
    let failure = outcome.as_ref().err().cloned();
    session.complete_transform(ticket, outcome);
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
