//! Remaining-time estimates and reporting read models
//!
//! Everything here takes a shared borrow of the tables and the current clock
//! value. Nothing in this module writes to the store.

use crate::core::capacity::CapacityModel;
use crate::core::errors::Result;
use crate::core::model::{CustomerOrder, MenuItem, QueuedTask, TaskDefinition};
use crate::core::store::KitchenRepository;
use crate::core::types::{
    DelayCause, MenuItemId, OrderId, OrderStatus, QueueTaskId, SectionId, StationId, TaskStatus, Timestamp,
};
use chrono::Duration;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Remaining wait of an order
///
/// A closed order reports its actual duration. An open order reports its
/// admission estimate minus the time already elapsed, never below zero.
pub fn remaining_seconds(order: &CustomerOrder, now: Timestamp) -> i64 {
    match order.actual_total_seconds {
        Some(actual) => actual,
        None => {
            let elapsed = (now - order.admitted_at).num_seconds();
            (order.estimated_total_seconds - elapsed).max(0)
        }
    }
}

/// Progress of one order as shown on the pickup board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderProgress {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub admitted_at: Timestamp,
    pub estimate_seconds: i64,
    pub remaining_seconds: i64,
    pub actual_seconds: Option<i64>,
    pub tasks_total: usize,
    pub tasks_in_progress: usize,
    pub tasks_completed: usize,
}

/// Progress of one queued task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    pub task_id: QueueTaskId,
    pub order_id: OrderId,
    pub order_number: String,
    pub menu_item: String,
    pub task_name: String,
    pub station_id: StationId,
    pub status: TaskStatus,
    pub section_id: Option<SectionId>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Full duration while queued, time left while running, 0 once done
    pub remaining_seconds: i64,
    pub delay_cause: Option<DelayCause>,
}

/// Load of one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionLoad {
    pub section_id: SectionId,
    pub description: String,
    pub in_progress: usize,
    pub capacity: u32,
    pub current_item: Option<String>,
    pub busy_until: Option<Timestamp>,
}

/// Load of one station and the work still waiting for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationLoad {
    pub station_id: StationId,
    pub name: String,
    pub sections: Vec<SectionLoad>,
    /// Queued tasks targeting this station
    pub queued: usize,
}

/// Aggregate of bottleneck records sharing one cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BottleneckSummary {
    pub cause: DelayCause,
    pub count: usize,
    pub total_wait_seconds: i64,
}

/// A menu item together with its recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub item: MenuItem,
    pub recipe: Vec<TaskDefinition>,
}

pub fn order_progress<R: KitchenRepository + ?Sized>(repo: &R, order_id: OrderId, now: Timestamp) -> Result<OrderProgress> {
    let order = require!(repo.order(order_id), Order, order_id);
    Ok(progress_of(repo, order, now))
}

pub fn order_by_number<R: KitchenRepository + ?Sized>(
    repo: &R,
    order_number: &str,
    now: Timestamp,
) -> Option<OrderProgress> {
    repo.order_by_number(order_number).map(|order| progress_of(repo, order, now))
}

pub fn latest_order<R: KitchenRepository + ?Sized>(repo: &R, now: Timestamp) -> Option<OrderProgress> {
    repo.orders().last().map(|order| progress_of(repo, order, now))
}

/// Every order in admission order
pub fn order_board<R: KitchenRepository + Sync + ?Sized>(repo: &R, now: Timestamp) -> Vec<OrderProgress> {
    repo.orders()
        .par_iter()
        .map(|order| progress_of(repo, order, now))
        .collect()
}

pub fn task_progress<R: KitchenRepository + ?Sized>(repo: &R, task_id: QueueTaskId, now: Timestamp) -> Result<TaskProgress> {
    let task = require!(repo.task(task_id), QueuedTask, task_id);
    describe_task(repo, task, now)
}

/// Unfinished tasks ordered by order admission, then rank, then id
pub fn queue_snapshot<R: KitchenRepository + Sync + ?Sized>(repo: &R, now: Timestamp) -> Result<Vec<TaskProgress>> {
    let mut ids = repo.tasks_with_status(TaskStatus::Queued);
    ids.extend(repo.tasks_with_status(TaskStatus::InProgress));

    let mut rows = ids
        .par_iter()
        .map(|id| -> Result<_> {
            let task = require!(repo.task(*id), QueuedTask, *id);
            let progress = describe_task(repo, task, now)?;
            let order = require!(repo.order(progress.order_id), Order, progress.order_id);
            let definition = require!(
                repo.task_definition(task.task_definition_id),
                TaskDefinition,
                task.task_definition_id
            );
            Ok(((order.admitted_at, order.id, definition.rank, task.id), progress))
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows.into_iter().map(|(_, progress)| progress).collect())
}

/// In-progress count and capacity of one section
pub fn current_load<R: KitchenRepository + ?Sized>(repo: &R, section_id: SectionId) -> Result<(usize, u32)> {
    CapacityModel::new(repo).load_of(section_id)
}

/// Per-station section loads plus the queued backlog per station
pub fn station_loads<R: KitchenRepository + ?Sized>(repo: &R) -> Result<Vec<StationLoad>> {
    let mut backlog: BTreeMap<StationId, usize> = BTreeMap::new();
    for id in repo.tasks_with_status(TaskStatus::Queued) {
        let task = require!(repo.task(id), QueuedTask, id);
        let definition = require!(
            repo.task_definition(task.task_definition_id),
            TaskDefinition,
            task.task_definition_id
        );
        *backlog.entry(definition.station_id).or_insert(0) += 1;
    }

    let capacity = CapacityModel::new(repo);
    let mut loads = Vec::new();
    for station in repo.stations() {
        let sections = capacity
            .sections_for(station.id)?
            .into_iter()
            .map(|section| SectionLoad {
                section_id: section.id,
                description: section.description.clone(),
                in_progress: repo.in_progress_on(section.id),
                capacity: section.max_concurrent_tasks,
                current_item: section.state.current_item.clone(),
                busy_until: section.state.busy_until,
            })
            .collect();
        loads.push(StationLoad {
            station_id: station.id,
            name: station.name.clone(),
            sections,
            queued: backlog.get(&station.id).copied().unwrap_or(0),
        });
    }
    Ok(loads)
}

/// Count and total wait of bottleneck records per cause
pub fn bottleneck_summary<R: KitchenRepository + ?Sized>(repo: &R) -> Vec<BottleneckSummary> {
    let mut totals: BTreeMap<DelayCause, (usize, i64)> = BTreeMap::new();
    for record in repo.bottlenecks() {
        let entry = totals.entry(record.cause).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += record.wait_seconds;
    }
    totals
        .into_iter()
        .map(|(cause, (count, total_wait_seconds))| BottleneckSummary {
            cause,
            count,
            total_wait_seconds,
        })
        .collect()
}

pub fn menu<R: KitchenRepository + ?Sized>(repo: &R) -> Vec<MenuEntry> {
    repo.menu_items()
        .into_iter()
        .map(|item| MenuEntry {
            item: item.clone(),
            recipe: repo.recipe_of(item.id).into_iter().cloned().collect(),
        })
        .collect()
}

pub fn menu_item_name<R: KitchenRepository + ?Sized>(repo: &R, id: MenuItemId) -> Result<String> {
    Ok(require!(repo.menu_item(id), MenuItem, id).name.clone())
}

fn progress_of<R: KitchenRepository + ?Sized>(repo: &R, order: &CustomerOrder, now: Timestamp) -> OrderProgress {
    let tasks = repo.tasks_of_order(order.id);
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status() == status).count();
    OrderProgress {
        order_id: order.id,
        order_number: order.order_number.clone(),
        status: order.status,
        admitted_at: order.admitted_at,
        estimate_seconds: order.estimated_total_seconds,
        remaining_seconds: remaining_seconds(order, now),
        actual_seconds: order.actual_total_seconds,
        tasks_total: tasks.len(),
        tasks_in_progress: count(TaskStatus::InProgress),
        tasks_completed: count(TaskStatus::Completed),
    }
}

fn describe_task<R: KitchenRepository + ?Sized>(repo: &R, task: &QueuedTask, now: Timestamp) -> Result<TaskProgress> {
    let definition = require!(
        repo.task_definition(task.task_definition_id),
        TaskDefinition,
        task.task_definition_id
    );
    let line = require!(repo.line(task.order_line_id), OrderLine, task.order_line_id);
    let order = require!(repo.order(line.order_id), Order, line.order_id);

    let remaining_seconds = match (task.status(), task.started_at()) {
        (TaskStatus::Queued, _) => definition.base_duration_seconds,
        (TaskStatus::InProgress, Some(started_at)) => {
            let finish = started_at + Duration::seconds(definition.base_duration_seconds);
            (finish - now).num_seconds().max(0)
        }
        _ => 0,
    };

    Ok(TaskProgress {
        task_id: task.id,
        order_id: order.id,
        order_number: order.order_number.clone(),
        menu_item: menu_item_name(repo, line.menu_item_id)?,
        task_name: definition.task_name.clone(),
        station_id: definition.station_id,
        status: task.status(),
        section_id: task.assigned_section(),
        started_at: task.started_at(),
        completed_at: task.completed_at(),
        remaining_seconds,
        delay_cause: task.delay_cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assignment::AssignmentEngine;
    use crate::core::completion::sweep;
    use crate::core::errors::KitchenError;
    use crate::core::intake::{admit, BasketLine};
    use crate::core::layout::KitchenLayout;
    use crate::core::store::KitchenTables;
    use chrono::TimeZone;

    fn t0() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn tables() -> KitchenTables {
        KitchenTables::from_layout(&KitchenLayout::momstouch()).unwrap()
    }

    #[test]
    fn test_remaining_counts_down_and_clips() {
        let mut tables = tables();
        let receipt = admit(&mut tables, &[BasketLine::new(3, 1)], t0()).unwrap();
        assert_eq!(receipt.estimate_seconds, 240);

        let progress = order_progress(&tables, receipt.order_id, t0() + Duration::seconds(100)).unwrap();
        assert_eq!(progress.remaining_seconds, 140);

        let progress = order_progress(&tables, receipt.order_id, t0() + Duration::seconds(900)).unwrap();
        assert_eq!(progress.remaining_seconds, 0);
    }

    #[test]
    fn test_closed_order_reports_actual_duration() {
        let mut tables = tables();
        let engine = AssignmentEngine::default();
        let receipt = admit(&mut tables, &[BasketLine::new(3, 1)], t0()).unwrap();
        engine.run_pass(&mut tables, t0()).unwrap();
        let fried = t0() + Duration::seconds(240);
        sweep(&mut tables, fried).unwrap();
        engine.run_pass(&mut tables, fried).unwrap();
        sweep(&mut tables, fried + Duration::seconds(30)).unwrap();

        let progress = order_progress(&tables, receipt.order_id, t0() + Duration::hours(2)).unwrap();
        assert_eq!(progress.status, OrderStatus::Completed);
        assert_eq!(progress.remaining_seconds, 270);
        assert_eq!(progress.tasks_completed, 2);
    }

    #[test]
    fn test_board_and_lookup_by_number() {
        let mut tables = tables();
        admit(&mut tables, &[BasketLine::new(1, 1)], t0()).unwrap();
        admit(&mut tables, &[BasketLine::new(3, 2)], t0() + Duration::seconds(10)).unwrap();

        let board = order_board(&tables, t0());
        let numbers: Vec<&str> = board.iter().map(|p| p.order_number.as_str()).collect();
        assert_eq!(numbers, vec!["ORD-001", "ORD-002"]);

        let second = order_by_number(&tables, "ORD-002", t0()).unwrap();
        assert_eq!(second.tasks_total, 4);
        assert_eq!(latest_order(&tables, t0()).unwrap().order_id, second.order_id);
        assert!(order_by_number(&tables, "ORD-999", t0()).is_none());
    }

    #[test]
    fn test_queue_snapshot_orders_by_admission_then_rank() {
        let mut tables = tables();
        admit(&mut tables, &[BasketLine::new(1, 1)], t0() + Duration::seconds(5)).unwrap();
        admit(&mut tables, &[BasketLine::new(3, 1)], t0() + Duration::seconds(10)).unwrap();

        let snapshot = queue_snapshot(&tables, t0()).unwrap();
        let names: Vec<&str> = snapshot.iter().map(|t| t.task_name.as_str()).collect();
        assert_eq!(names, vec!["Fry patty", "Assemble", "Fry tenders", "Pack"]);
        assert!(snapshot.iter().all(|t| t.status == TaskStatus::Queued));
    }

    #[test]
    fn test_task_progress_for_running_task() {
        let mut tables = tables();
        let receipt = admit(&mut tables, &[BasketLine::new(3, 1)], t0()).unwrap();
        AssignmentEngine::default().run_pass(&mut tables, t0()).unwrap();

        let fry = task_progress(&tables, receipt.task_ids[0], t0() + Duration::seconds(40)).unwrap();
        assert_eq!(fry.status, TaskStatus::InProgress);
        assert_eq!(fry.remaining_seconds, 200);
        assert_eq!(fry.menu_item, "Chicken Tenders");

        let pack = task_progress(&tables, receipt.task_ids[1], t0()).unwrap();
        assert_eq!(pack.remaining_seconds, 30);
        assert_eq!(pack.delay_cause, Some(DelayCause::DependencyWait));

        assert!(matches!(
            task_progress(&tables, QueueTaskId(999), t0()),
            Err(KitchenError::NotFound { .. })
        ));
    }

    #[test]
    fn test_station_loads_report_backlog() {
        let mut tables = tables();
        admit(&mut tables, &[BasketLine::new(3, 3)], t0()).unwrap();
        AssignmentEngine::default().run_pass(&mut tables, t0()).unwrap();

        let loads = station_loads(&tables).unwrap();
        assert_eq!(loads.len(), 2);
        let fryer = &loads[0];
        assert_eq!(fryer.sections.iter().map(|s| s.in_progress).sum::<usize>(), 2);
        assert_eq!(fryer.queued, 1);
        assert_eq!(loads[1].queued, 3);
        assert_eq!(current_load(&tables, SectionId(1)).unwrap(), (1, 1));
        assert!(current_load(&tables, SectionId(99)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_menu_lists_recipes() {
        let tables = tables();
        let entries = menu(&tables);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].recipe.len(), 4);
    }

    #[test]
    fn test_bottleneck_summary_groups_by_cause() {
        let mut tables = tables();
        let engine = AssignmentEngine::default();
        admit(&mut tables, &[BasketLine::new(3, 3)], t0()).unwrap();
        engine.run_pass(&mut tables, t0()).unwrap();
        let fried = t0() + Duration::seconds(240);
        sweep(&mut tables, fried).unwrap();
        engine.run_pass(&mut tables, fried).unwrap();

        let summary = bottleneck_summary(&tables);
        let saturated = summary.iter().find(|s| s.cause == DelayCause::StationSaturated).unwrap();
        assert_eq!(saturated.count, 1);
        assert_eq!(saturated.total_wait_seconds, 240);
        let waiting = summary.iter().find(|s| s.cause == DelayCause::DependencyWait).unwrap();
        assert_eq!(waiting.count, 2);
        assert_eq!(waiting.total_wait_seconds, 480);
    }
}
