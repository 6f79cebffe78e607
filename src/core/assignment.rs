//! Greedy assignment of queued tasks to sections
//!
//! A pass visits every queued task exactly once in a fixed order (oldest order
//! first, then recipe rank, then task id) and binds it to the first candidate
//! section with a free slot. Tasks that cannot be placed stay queued and are
//! retried by the next pass; that is the normal outcome, not an error.

use crate::core::capacity::CapacityModel;
use crate::core::config::{DependencyMode, KitchenConfig, PinScope};
use crate::core::errors::Result;
use crate::core::model::{BottleneckRecord, QueuedTask};
use crate::core::store::KitchenRepository;
use crate::core::types::{
    DelayCause, OrderId, OrderStatus, QueueTaskId, SectionId, StationId, TaskStatus, Timestamp,
};
use chrono::Duration;
use log::debug;
use serde::Serialize;
use uuid::Uuid;

/// One binding decision made by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub task_id: QueueTaskId,
    pub section_id: SectionId,
    pub started_at: Timestamp,
}

/// Outcome of one assignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Bindings in the order they were made
    pub bound: Vec<Binding>,
    /// Tasks left queued after the pass
    pub still_queued: usize,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.bound.is_empty()
    }
}

/// Scan position of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScanKey {
    admitted_at: Timestamp,
    order_id: OrderId,
    rank: u32,
    task_id: QueueTaskId,
}

/// Assignment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentEngine {
    dependency_mode: DependencyMode,
    pin_scope: PinScope,
    record_bottlenecks: bool,
}

impl Default for AssignmentEngine {
    fn default() -> Self {
        Self::from_config(&KitchenConfig::default())
    }
}

impl AssignmentEngine {
    /// Create a new engine with the given dependency mode
    pub fn new(dependency_mode: DependencyMode) -> Self {
        Self {
            dependency_mode,
            pin_scope: PinScope::default(),
            record_bottlenecks: true,
        }
    }

    pub fn from_config(config: &KitchenConfig) -> Self {
        Self {
            dependency_mode: config.dependency_mode,
            pin_scope: config.pin_scope,
            record_bottlenecks: config.record_bottlenecks,
        }
    }

    pub fn with_pin_scope(mut self, pin_scope: PinScope) -> Self {
        self.pin_scope = pin_scope;
        self
    }

    pub fn with_bottleneck_recording(mut self, enabled: bool) -> Self {
        self.record_bottlenecks = enabled;
        self
    }

    pub fn dependency_mode(&self) -> DependencyMode {
        self.dependency_mode
    }

    /// Run one pass against the repository at the given instant
    pub fn run_pass<R: KitchenRepository + ?Sized>(&self, repo: &mut R, now: Timestamp) -> Result<PassReport> {
        let mut report = PassReport::default();

        for task_id in scan_order(&*repo)? {
            let task = require!(repo.task(task_id), QueuedTask, task_id).clone();
            if task.status() != TaskStatus::Queued {
                continue;
            }

            let (section_id, cause) = self.resolve(&*repo, &task)?;
            match section_id {
                Some(section_id) => {
                    self.bind(repo, &task, section_id, now)?;
                    report.bound.push(Binding {
                        task_id,
                        section_id,
                        started_at: now,
                    });
                }
                None => {
                    if task.delay_cause != cause {
                        repo.set_delay_cause(task_id, cause)?;
                    }
                    report.still_queued += 1;
                }
            }
        }

        debug!(
            "Assignment pass at {}: {} bound, {} still queued",
            now,
            report.bound.len(),
            report.still_queued
        );
        Ok(report)
    }

    /// Pick a section for a queued task, or the reason it has to wait
    fn resolve<R: KitchenRepository + ?Sized>(
        &self,
        repo: &R,
        task: &QueuedTask,
    ) -> Result<(Option<SectionId>, Option<DelayCause>)> {
        if !self.dependencies_met(repo, task)? {
            return Ok((None, Some(DelayCause::DependencyWait)));
        }

        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        );
        let candidates = CapacityModel::new(repo)
            .with_pin_scope(self.pin_scope)
            .candidates(definition)?;
        let free = candidates
            .sections
            .iter()
            .find(|section| repo.in_progress_on(section.id) < section.max_concurrent_tasks as usize)
            .map(|section| section.id);

        let cause = if candidates.pinned {
            DelayCause::PinnedSectionBusy
        } else {
            DelayCause::StationSaturated
        };
        Ok(match free {
            Some(section_id) => (Some(section_id), None),
            None => (None, Some(cause)),
        })
    }

    /// Whether every prerequisite of a task on the same order line is done
    ///
    /// Explicit dependency edges always apply. In rank-ordered mode a step
    /// without explicit edges also waits on every lower-ranked step.
    fn dependencies_met<R: KitchenRepository + ?Sized>(&self, repo: &R, task: &QueuedTask) -> Result<bool> {
        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        );
        let siblings = repo.tasks_of_line(task.order_line_id);
        let prerequisites = repo.prerequisites_of(definition.id);

        if !prerequisites.is_empty() {
            return Ok(prerequisites.iter().all(|prerequisite| {
                siblings
                    .iter()
                    .filter(|t| t.task_definition_id == *prerequisite)
                    .all(|t| t.is_completed())
            }));
        }

        match self.dependency_mode {
            DependencyMode::Unordered => Ok(true),
            DependencyMode::RankOrdered => {
                for sibling in siblings.iter().filter(|t| t.id != task.id) {
                    let sibling_definition = require!(
                        repo.task_definition(sibling.task_definition_id),
                        TaskDefinition,
                        sibling.task_definition_id
                    );
                    if sibling_definition.rank < definition.rank && !sibling.is_completed() {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn bind<R: KitchenRepository + ?Sized>(
        &self,
        repo: &mut R,
        task: &QueuedTask,
        section_id: SectionId,
        now: Timestamp,
    ) -> Result<()> {
        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        )
        .clone();
        let line = *require!(repo.line(task.order_line_id), OrderLine, task.order_line_id);
        let item_name = require!(repo.menu_item(line.menu_item_id), MenuItem, line.menu_item_id)
            .name
            .clone();

        repo.bind_task(task.id, section_id, now)?;
        let in_progress = repo.in_progress_on(section_id) as u32;

        let section = require!(repo.section_mut(section_id), Section, section_id);
        let finish = now + Duration::seconds(definition.base_duration_seconds);
        section.state.current_item = Some(item_name);
        section.state.current_quantity = in_progress;
        section.state.busy_until = Some(section.state.busy_until.map_or(finish, |busy| busy.max(finish)));

        let order = require!(repo.order_mut(line.order_id), Order, line.order_id);
        if order.status == OrderStatus::Confirmed {
            order.status = OrderStatus::Preparing;
        }
        let admitted_at = order.admitted_at;

        if self.record_bottlenecks {
            if let Some(cause) = task.delay_cause {
                record_bottleneck(repo, task.id, cause, definition.station_id, admitted_at, now);
            }
        }

        debug!(
            "Bound task {} ({}) to section {} at {}",
            task.id, definition.task_name, section_id, now
        );
        Ok(())
    }
}

fn record_bottleneck<R: KitchenRepository + ?Sized>(
    repo: &mut R,
    queue_task_id: QueueTaskId,
    cause: DelayCause,
    station_id: StationId,
    admitted_at: Timestamp,
    now: Timestamp,
) {
    repo.append_bottleneck(BottleneckRecord {
        id: Uuid::new_v4(),
        queue_task_id,
        cause,
        wait_seconds: (now - admitted_at).num_seconds().max(0),
        station_id,
        recorded_at: now,
    });
}

/// Queued task ids in scan order
fn scan_order<R: KitchenRepository + ?Sized>(repo: &R) -> Result<Vec<QueueTaskId>> {
    let mut keys = Vec::new();
    for task_id in repo.tasks_with_status(TaskStatus::Queued) {
        let task = require!(repo.task(task_id), QueuedTask, task_id);
        let line = require!(repo.line(task.order_line_id), OrderLine, task.order_line_id);
        let order = require!(repo.order(line.order_id), Order, line.order_id);
        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        );
        keys.push(ScanKey {
            admitted_at: order.admitted_at,
            order_id: order.id,
            rank: definition.rank,
            task_id,
        });
    }
    keys.sort();
    Ok(keys.into_iter().map(|k| k.task_id).collect())
}
