//! Completion sweep and order closure
//!
//! The sweep finishes every in-progress task whose duration has elapsed on the
//! synthetic clock. A task completes at `start + duration`, not at the tick
//! instant that observed it, so coarse ticks do not stretch durations.

use crate::core::errors::{KitchenError, Result};
use crate::core::store::KitchenRepository;
use crate::core::types::{OrderId, OrderStatus, QueueTaskId, SectionId, TaskStatus, Timestamp};
use chrono::Duration;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of a completion sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub completed: Vec<QueueTaskId>,
    pub closed_orders: Vec<OrderId>,
}

/// Complete every in-progress task whose finish threshold is at or before `now`
pub fn sweep<R: KitchenRepository + ?Sized>(repo: &mut R, now: Timestamp) -> Result<SweepReport> {
    let mut due = Vec::new();
    for task_id in repo.tasks_with_status(TaskStatus::InProgress) {
        let task = require!(repo.task(task_id), QueuedTask, task_id);
        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        );
        if let Some(started_at) = task.started_at() {
            let threshold = started_at + Duration::seconds(definition.base_duration_seconds);
            if threshold <= now {
                due.push((task_id, threshold));
            }
        }
    }

    let mut report = SweepReport::default();
    let mut sections = BTreeSet::new();
    let mut orders = BTreeSet::new();
    for (task_id, threshold) in due {
        let (section_id, order_id) = finish(repo, task_id, threshold)?;
        sections.insert(section_id);
        orders.insert(order_id);
        report.completed.push(task_id);
    }

    for section_id in sections {
        refresh_section(repo, section_id)?;
    }
    report.closed_orders = close_orders(repo, orders)?;
    Ok(report)
}

/// Operator-forced completion of one task at `now`
///
/// Completing an already completed task is a no-op that returns `false`.
/// Completing a task that never started is an invariant violation.
pub fn complete_task<R: KitchenRepository + ?Sized>(repo: &mut R, task_id: QueueTaskId, now: Timestamp) -> Result<bool> {
    if require!(repo.task(task_id), QueuedTask, task_id).is_completed() {
        return Ok(false);
    }
    let (section_id, order_id) = finish(repo, task_id, now)?;
    refresh_section(repo, section_id)?;
    close_orders(repo, [order_id])?;
    Ok(true)
}

/// Close every listed order whose tasks are now all completed
///
/// The actual duration is written once and never touched again.
pub fn close_orders<R, I>(repo: &mut R, orders: I) -> Result<Vec<OrderId>>
where
    R: KitchenRepository + ?Sized,
    I: IntoIterator<Item = OrderId>,
{
    let mut closed = Vec::new();
    for order_id in orders {
        let order = require!(repo.order(order_id), Order, order_id);
        if order.is_closed() {
            continue;
        }
        let admitted_at = order.admitted_at;

        let tasks = repo.tasks_of_order(order_id);
        if tasks.is_empty() || !tasks.iter().all(|t| t.is_completed()) {
            continue;
        }
        let latest = tasks.iter().filter_map(|t| t.completed_at()).max().unwrap_or(admitted_at);
        let actual = (latest - admitted_at).num_seconds().max(0);

        let order = require!(repo.order_mut(order_id), Order, order_id);
        order.actual_total_seconds = Some(actual);
        order.status = OrderStatus::Completed;
        info!("Order {} completed in {}s", order.order_number, actual);
        closed.push(order_id);
    }
    Ok(closed)
}

fn finish<R: KitchenRepository + ?Sized>(
    repo: &mut R,
    task_id: QueueTaskId,
    at: Timestamp,
) -> Result<(SectionId, OrderId)> {
    repo.complete_task(task_id, at)?;

    let task = require!(repo.task(task_id), QueuedTask, task_id);
    let section_id = task
        .assigned_section()
        .ok_or_else(|| KitchenError::invariant(format!("completed task {} has no section", task_id)))?;
    let line = require!(repo.line(task.order_line_id), OrderLine, task.order_line_id);
    debug!("Completed task {} on section {} at {}", task_id, section_id, at);
    Ok((section_id, line.order_id))
}

fn refresh_section<R: KitchenRepository + ?Sized>(repo: &mut R, section_id: SectionId) -> Result<()> {
    let in_progress = repo.in_progress_on(section_id) as u32;
    let section = require!(repo.section_mut(section_id), Section, section_id);
    if in_progress == 0 {
        section.state.clear();
    } else {
        section.state.current_quantity = in_progress;
    }
    Ok(())
}
