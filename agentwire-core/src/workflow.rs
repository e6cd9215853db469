//! Multi-step workflow tracking.
//!
//! A workflow is the plan-and-execute state for one user request. Unlike
//! message blocks, workflow text arrives as deltas and is appended.
//!
//! Step status only moves forward: `Pending → InProgress → Completed`.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::event::StreamEvent;

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub step_number: u32,
    pub title: String,
    pub status: StepStatus,
    /// Accumulated reasoning for this step.
    pub thinking: String,
    /// Accumulated output for this step.
    pub response: String,
}

impl WorkflowStep {
    fn new(step_number: u32, title: String) -> Self {
        Self {
            step_number,
            title,
            status: StepStatus::Pending,
            thinking: String::new(),
            response: String::new(),
        }
    }

    /// Move status forward. Returns false if `to` would be a regression.
    fn advance(&mut self, to: StepStatus) -> bool {
        if to < self.status {
            return false;
        }
        self.status = to;
        true
    }
}

/// The planner's output and the confirmation handshake around it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowPlan {
    /// Plan text.
    pub plan: String,
    /// Step titles, in execution order.
    pub steps: Vec<String>,
    pub confirmation_id: Option<String>,
    pub awaiting_confirmation: bool,
    /// Accumulated planner reasoning.
    pub plan_thinking: String,
    pub plan_thinking_is_streaming: bool,
}

/// Overall workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStatus {
    /// Planner is thinking or no plan has arrived yet.
    Planning,
    /// Plan generated, waiting on the user.
    AwaitingConfirmation,
    /// Steps are executing.
    Running,
    /// Backend paused execution.
    Paused,
    /// All steps finished.
    Completed,
    /// The user rejected the plan.
    Rejected,
}

/// Plan and step state for one user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: String,
    pub plan: WorkflowPlan,
    pub steps: BTreeMap<u32, WorkflowStep>,
    pub current_step: Option<u32>,
    pub final_result: Option<String>,
    pub status: WorkflowStatus,
}

impl Workflow {
    /// Create an empty workflow in the planning state.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plan: WorkflowPlan::default(),
            steps: BTreeMap::new(),
            current_step: None,
            final_result: None,
            status: WorkflowStatus::Planning,
        }
    }

    /// The step currently executing.
    pub fn current(&self) -> Option<&WorkflowStep> {
        self.steps.get(&self.current_step?)
    }

    /// Steps in step-number order.
    pub fn ordered_steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.values()
    }

    /// True once every known step has completed.
    pub fn all_steps_completed(&self) -> bool {
        self.steps.values().all(|s| s.status == StepStatus::Completed)
    }

    fn plan_title(&self, step: u32) -> String {
        step.checked_sub(1)
            .and_then(|i| self.plan.steps.get(i as usize))
            .cloned()
            .unwrap_or_default()
    }

    fn step_entry(&mut self, step: u32) -> &mut WorkflowStep {
        let title = self.plan_title(step);
        self.steps
            .entry(step)
            .or_insert_with(|| WorkflowStep::new(step, title))
    }

    fn plan_thinking_chunk(&mut self, content: &str) {
        self.plan.plan_thinking.push_str(content);
        self.plan.plan_thinking_is_streaming = true;
    }

    fn plan_generated(&mut self, plan: &str, steps: &[String], confirmation_id: Option<&str>) {
        self.plan.plan = plan.to_string();
        self.plan.steps = steps.to_vec();
        self.plan.confirmation_id = confirmation_id.map(str::to_string);
        self.plan.awaiting_confirmation = false;
        self.plan.plan_thinking_is_streaming = false;

        for (i, title) in steps.iter().enumerate() {
            let number = i as u32 + 1;
            let step = self
                .steps
                .entry(number)
                .or_insert_with(|| WorkflowStep::new(number, title.clone()));
            if step.status == StepStatus::Pending {
                step.title = title.clone();
            }
        }
    }

    fn awaiting_confirmation(&mut self) {
        self.plan.awaiting_confirmation = true;
        self.plan.plan_thinking_is_streaming = false;
        self.status = WorkflowStatus::AwaitingConfirmation;
    }

    fn step_start(&mut self, step: u32, title: &str) {
        self.plan.awaiting_confirmation = false;
        self.plan.plan_thinking_is_streaming = false;
        self.status = WorkflowStatus::Running;

        let fallback = self.plan_title(step);
        let entry = self
            .steps
            .entry(step)
            .or_insert_with(|| WorkflowStep::new(step, fallback));

        match entry.status {
            StepStatus::Completed => {
                warn!("ignoring step_start for completed step {} in {}", step, self.id);
                return;
            }
            StepStatus::Pending => {
                entry.thinking.clear();
                entry.response.clear();
            }
            // Duplicate start: keep what has accumulated
            StepStatus::InProgress => {}
        }
        if !title.is_empty() {
            entry.title = title.to_string();
        }
        entry.advance(StepStatus::InProgress);
        self.current_step = Some(step);
    }

    fn append_to_current(&mut self, content: &str, response: bool) {
        let Some(current) = self.current_step else {
            debug!("dropping step text with no current step in {}", self.id);
            return;
        };
        let step = self.step_entry(current);
        if response {
            step.response.push_str(content);
        } else {
            step.thinking.push_str(content);
        }
    }

    fn step_complete(&mut self, step: u32) {
        self.step_entry(step).advance(StepStatus::Completed);
        if self.current_step == Some(step) {
            self.current_step = None;
        }
    }

    fn workflow_complete(&mut self, result: Option<&str>) {
        for step in self.steps.values_mut() {
            step.advance(StepStatus::Completed);
        }
        self.current_step = None;
        self.plan.awaiting_confirmation = false;
        self.plan.plan_thinking_is_streaming = false;
        self.final_result = result.map(str::to_string).or_else(|| {
            self.steps
                .values()
                .rev()
                .map(|s| s.response.trim())
                .find(|r| !r.is_empty())
                .map(str::to_string)
        });
        self.status = WorkflowStatus::Completed;
    }
}

/// Registry of workflows with exactly one active at a time.
#[derive(Debug, Clone, Default)]
pub struct WorkflowTracker {
    workflows: Vec<Workflow>,
    active: Option<String>,
}

impl WorkflowTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or re-activate) a workflow and make it the active one.
    pub fn begin(&mut self, id: impl Into<String>) -> &mut Workflow {
        let id = id.into();
        if let Some(previous) = self.active.as_deref() {
            if previous != id {
                debug!("workflow {} superseded by {}", previous, id);
            }
        }
        let pos = match self.workflows.iter().position(|w| w.id == id) {
            Some(pos) => pos,
            None => {
                self.workflows.push(Workflow::new(id.clone()));
                self.workflows.len() - 1
            }
        };
        self.active = Some(id);
        &mut self.workflows[pos]
    }

    /// The workflow currently receiving events. It stays active (and displayed) after completion.
    pub fn active(&self) -> Option<&Workflow> {
        self.get(self.active.as_deref()?)
    }

    /// Id of the active workflow.
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Look up a workflow by id.
    pub fn get(&self, id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == id)
    }

    /// All workflows, oldest first.
    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    /// Remove one workflow. Clears the active reference if it pointed there.
    pub fn clear(&mut self, id: &str) -> bool {
        let before = self.workflows.len();
        self.workflows.retain(|w| w.id != id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        self.workflows.len() != before
    }

    /// Remove every workflow.
    pub fn clear_all(&mut self) {
        self.workflows.clear();
        self.active = None;
    }

    /// Record the user's answer to a plan confirmation.
    ///
    /// Matches by confirmation id, falling back to the active workflow.
    pub fn respond_to_plan(&mut self, confirmation_id: &str, approved: bool) -> bool {
        let pos = self
            .workflows
            .iter()
            .position(|w| w.plan.confirmation_id.as_deref() == Some(confirmation_id))
            .or_else(|| {
                let active = self.active.as_deref()?;
                self.workflows.iter().position(|w| w.id == active)
            });
        let Some(pos) = pos else {
            return false;
        };

        let workflow = &mut self.workflows[pos];
        workflow.plan.awaiting_confirmation = false;
        workflow.status = if approved {
            WorkflowStatus::Running
        } else {
            WorkflowStatus::Rejected
        };
        true
    }

    /// Apply a workflow event to the active workflow.
    ///
    /// Returns false for non-workflow events. A workflow event arriving with
    /// no active workflow starts an implicit one.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        if !event.is_workflow() {
            return false;
        }

        let workflow = match self.active.clone() {
            Some(id) => self.begin(id),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                debug!("starting implicit workflow {}", id);
                self.begin(id)
            }
        };

        match event {
            StreamEvent::PlanThinkingChunk { content } => workflow.plan_thinking_chunk(content),
            StreamEvent::PlanGenerated {
                plan,
                steps,
                confirmation_id,
            } => workflow.plan_generated(plan, steps, confirmation_id.as_deref()),
            StreamEvent::AwaitingConfirmation => workflow.awaiting_confirmation(),
            StreamEvent::StepStart { step, title } => workflow.step_start(*step, title),
            StreamEvent::ThinkingChunk { content } => workflow.append_to_current(content, false),
            StreamEvent::ResponseChunk { content } => workflow.append_to_current(content, true),
            StreamEvent::StepComplete { step } => workflow.step_complete(*step),
            StreamEvent::WorkflowPaused => workflow.status = WorkflowStatus::Paused,
            StreamEvent::WorkflowComplete { result } => {
                workflow.workflow_complete(result.as_deref())
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
