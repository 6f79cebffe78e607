//! In-memory kitchen store
//!
//! Tables live behind one `RwLock`. A transaction mutates the tables in place
//! while journaling the prior version of every row it touches; if the closure
//! fails or panics the journal is replayed backwards, so every admission, pass
//! and tick is all-or-nothing and commit cost follows the rows touched.

use super::{BottleneckRepository, CapacityRepository, MenuRepository, OrderRepository, TaskRepository};
use crate::core::errors::{EntityKind, KitchenError, Result};
use crate::core::layout::KitchenLayout;
use crate::core::model::{
    AssignmentConstraint, BottleneckRecord, CustomerOrder, MenuItem, OrderLine, QueuedTask, Section, Station,
    TaskDefinition,
};
use crate::core::types::{
    DelayCause, MenuItemId, OrderId, OrderLineId, QueueTaskId, SectionId, StationId, TaskDefinitionId, TaskStatus,
    Timestamp,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Prior version of one touched row; `None` means the row did not exist
#[derive(Debug, Clone)]
enum Undo {
    Order(OrderId, Option<CustomerOrder>),
    Line(OrderLineId, Option<OrderLine>),
    Task(QueueTaskId, Option<QueuedTask>),
    Section(SectionId, Section),
}

/// Rollback log of the transaction in flight
#[derive(Debug, Clone, Default)]
struct Journal {
    last_order_id: i64,
    last_line_id: i64,
    last_task_id: i64,
    bottleneck_count: usize,
    undo: Vec<Undo>,
}

/// All kitchen tables plus the secondary indexes kept alongside them
#[derive(Debug, Clone, Default)]
pub struct KitchenTables {
    stations: BTreeMap<StationId, Station>,
    sections: BTreeMap<SectionId, Section>,
    menu_items: BTreeMap<MenuItemId, MenuItem>,
    task_definitions: BTreeMap<TaskDefinitionId, TaskDefinition>,
    prerequisites: HashMap<TaskDefinitionId, Vec<TaskDefinitionId>>,
    constraints: Vec<AssignmentConstraint>,

    orders: BTreeMap<OrderId, CustomerOrder>,
    lines: BTreeMap<OrderLineId, OrderLine>,
    lines_by_order: HashMap<OrderId, Vec<OrderLineId>>,
    tasks: BTreeMap<QueueTaskId, QueuedTask>,
    tasks_by_line: HashMap<OrderLineId, Vec<QueueTaskId>>,
    bottlenecks: Vec<BottleneckRecord>,

    /// Status index: the pass scans `queued`, the sweep scans `in_progress`
    queued: BTreeSet<QueueTaskId>,
    in_progress: BTreeSet<QueueTaskId>,
    completed: BTreeSet<QueueTaskId>,
    section_load: HashMap<SectionId, usize>,

    last_order_id: i64,
    last_line_id: i64,
    last_task_id: i64,

    journal: Option<Journal>,
}

impl KitchenTables {
    /// Build tables from validated reference data
    pub fn from_layout(layout: &KitchenLayout) -> Result<Self> {
        layout.validate()?;

        let mut tables = KitchenTables::default();
        for station in &layout.stations {
            tables.stations.insert(station.id, station.clone());
        }
        for section in &layout.sections {
            tables.sections.insert(section.id, section.clone());
        }
        for item in &layout.menu_items {
            tables.menu_items.insert(item.id, item.clone());
        }
        for task in &layout.task_definitions {
            tables.task_definitions.insert(task.id, task.clone());
        }
        for dep in &layout.dependencies {
            tables
                .prerequisites
                .entry(dep.task_definition_id)
                .or_default()
                .push(dep.prerequisite_id);
        }
        tables.constraints = layout.constraints.clone();

        Ok(tables)
    }

    fn status_set_mut(&mut self, status: TaskStatus) -> &mut BTreeSet<QueueTaskId> {
        match status {
            TaskStatus::Queued => &mut self.queued,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
        }
    }

    fn reindex(&mut self, id: QueueTaskId, from: TaskStatus, to: TaskStatus) {
        if from != to {
            self.status_set_mut(from).remove(&id);
            self.status_set_mut(to).insert(id);
        }
    }

    /// Every queued task in id order
    pub fn tasks(&self) -> impl Iterator<Item = &QueuedTask> {
        self.tasks.values()
    }

    /// Start journaling row changes
    fn begin(&mut self) {
        self.journal = Some(Journal {
            last_order_id: self.last_order_id,
            last_line_id: self.last_line_id,
            last_task_id: self.last_task_id,
            bottleneck_count: self.bottlenecks.len(),
            undo: Vec::new(),
        });
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every journaled change, newest first
    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.undo.into_iter().rev() {
            match undo {
                Undo::Order(id, prev) => self.restore_order(id, prev),
                Undo::Line(id, prev) => self.restore_line(id, prev),
                Undo::Task(id, prev) => self.restore_task(id, prev),
                Undo::Section(id, prev) => {
                    self.sections.insert(id, prev);
                }
            }
        }
        self.last_order_id = journal.last_order_id;
        self.last_line_id = journal.last_line_id;
        self.last_task_id = journal.last_task_id;
        self.bottlenecks.truncate(journal.bottleneck_count);
    }

    /// Number of row versions journaled by the transaction in flight
    pub fn journaled_rows(&self) -> usize {
        self.journal.as_ref().map_or(0, |j| j.undo.len())
    }

    fn journal_order(&mut self, id: OrderId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.undo.push(Undo::Order(id, self.orders.get(&id).cloned()));
        }
    }

    fn journal_line(&mut self, id: OrderLineId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.undo.push(Undo::Line(id, self.lines.get(&id).copied()));
        }
    }

    fn journal_task(&mut self, id: QueueTaskId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.undo.push(Undo::Task(id, self.tasks.get(&id).cloned()));
        }
    }

    fn journal_section(&mut self, id: SectionId) {
        if let (Some(journal), Some(section)) = (self.journal.as_mut(), self.sections.get(&id)) {
            journal.undo.push(Undo::Section(id, section.clone()));
        }
    }

    fn restore_order(&mut self, id: OrderId, prev: Option<CustomerOrder>) {
        match prev {
            Some(order) => {
                self.orders.insert(id, order);
            }
            None => {
                self.orders.remove(&id);
                self.lines_by_order.remove(&id);
            }
        }
    }

    fn restore_line(&mut self, id: OrderLineId, prev: Option<OrderLine>) {
        match prev {
            Some(line) => {
                self.lines.insert(id, line);
            }
            None => {
                if let Some(line) = self.lines.remove(&id) {
                    if let Some(ids) = self.lines_by_order.get_mut(&line.order_id) {
                        ids.retain(|l| *l != id);
                    }
                }
                self.tasks_by_line.remove(&id);
            }
        }
    }

    /// Put a task row back and repair the status and load indexes around it
    fn restore_task(&mut self, id: QueueTaskId, prev: Option<QueuedTask>) {
        if let Some(current) = self.tasks.remove(&id) {
            self.status_set_mut(current.status()).remove(&id);
            if current.status() == TaskStatus::InProgress {
                if let Some(load) = current.assigned_section().and_then(|s| self.section_load.get_mut(&s)) {
                    *load = load.saturating_sub(1);
                }
            }
            if prev.is_none() {
                if let Some(ids) = self.tasks_by_line.get_mut(&current.order_line_id) {
                    ids.retain(|t| *t != id);
                }
            }
        }
        if let Some(task) = prev {
            self.status_set_mut(task.status()).insert(id);
            if task.status() == TaskStatus::InProgress {
                if let Some(section_id) = task.assigned_section() {
                    *self.section_load.entry(section_id).or_insert(0) += 1;
                }
            }
            self.tasks.insert(id, task);
        }
    }
}

impl CapacityRepository for KitchenTables {
    fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    fn stations(&self) -> Vec<&Station> {
        self.stations.values().collect()
    }

    fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.journal_section(id);
        self.sections.get_mut(&id)
    }

    fn sections_of(&self, station_id: StationId) -> Vec<&Section> {
        self.sections.values().filter(|s| s.station_id == station_id).collect()
    }

    fn constraints_for(&self, menu_item_id: MenuItemId) -> Vec<&AssignmentConstraint> {
        self.constraints.iter().filter(|c| c.menu_item_id == menu_item_id).collect()
    }
}

impl MenuRepository for KitchenTables {
    fn menu_item(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.menu_items.get(&id)
    }

    fn menu_items(&self) -> Vec<&MenuItem> {
        self.menu_items.values().collect()
    }

    fn task_definition(&self, id: TaskDefinitionId) -> Option<&TaskDefinition> {
        self.task_definitions.get(&id)
    }

    fn recipe_of(&self, menu_item_id: MenuItemId) -> Vec<&TaskDefinition> {
        let mut recipe: Vec<&TaskDefinition> = self
            .task_definitions
            .values()
            .filter(|t| t.menu_item_id == menu_item_id)
            .collect();
        recipe.sort_by_key(|t| (t.rank, t.id));
        recipe
    }

    fn prerequisites_of(&self, task_definition_id: TaskDefinitionId) -> Vec<TaskDefinitionId> {
        self.prerequisites.get(&task_definition_id).cloned().unwrap_or_default()
    }
}

impl OrderRepository for KitchenTables {
    fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId(self.last_order_id)
    }

    fn insert_order(&mut self, order: CustomerOrder) {
        self.journal_order(order.id);
        self.orders.insert(order.id, order);
    }

    fn order(&self, id: OrderId) -> Option<&CustomerOrder> {
        self.orders.get(&id)
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut CustomerOrder> {
        self.journal_order(id);
        self.orders.get_mut(&id)
    }

    fn orders(&self) -> Vec<&CustomerOrder> {
        self.orders.values().collect()
    }

    fn order_by_number(&self, order_number: &str) -> Option<&CustomerOrder> {
        self.orders.values().rev().find(|o| o.order_number == order_number)
    }

    fn last_sequence_on(&self, day: NaiveDate) -> u32 {
        self.orders
            .values()
            .filter(|o| o.business_day == day)
            .map(|o| o.sequence)
            .max()
            .unwrap_or(0)
    }

    fn next_line_id(&mut self) -> OrderLineId {
        self.last_line_id += 1;
        OrderLineId(self.last_line_id)
    }

    fn insert_line(&mut self, line: OrderLine) {
        self.journal_line(line.id);
        self.lines_by_order.entry(line.order_id).or_default().push(line.id);
        self.lines.insert(line.id, line);
    }

    fn line(&self, id: OrderLineId) -> Option<&OrderLine> {
        self.lines.get(&id)
    }

    fn lines_of(&self, order_id: OrderId) -> Vec<&OrderLine> {
        self.lines_by_order
            .get(&order_id)
            .map(|ids| ids.iter().filter_map(|id| self.lines.get(id)).collect())
            .unwrap_or_default()
    }
}

impl TaskRepository for KitchenTables {
    fn next_task_id(&mut self) -> QueueTaskId {
        self.last_task_id += 1;
        QueueTaskId(self.last_task_id)
    }

    fn insert_task(&mut self, task: QueuedTask) {
        self.journal_task(task.id);
        let status = task.status();
        self.tasks_by_line.entry(task.order_line_id).or_default().push(task.id);
        self.status_set_mut(status).insert(task.id);
        if status == TaskStatus::InProgress {
            if let Some(section_id) = task.assigned_section() {
                *self.section_load.entry(section_id).or_insert(0) += 1;
            }
        }
        self.tasks.insert(task.id, task);
    }

    fn task(&self, id: QueueTaskId) -> Option<&QueuedTask> {
        self.tasks.get(&id)
    }

    fn tasks_with_status(&self, status: TaskStatus) -> Vec<QueueTaskId> {
        match status {
            TaskStatus::Queued => self.queued.iter().copied().collect(),
            TaskStatus::InProgress => self.in_progress.iter().copied().collect(),
            TaskStatus::Completed => self.completed.iter().copied().collect(),
        }
    }

    fn in_progress_on(&self, section_id: SectionId) -> usize {
        self.section_load.get(&section_id).copied().unwrap_or(0)
    }

    fn tasks_of_line(&self, line_id: OrderLineId) -> Vec<&QueuedTask> {
        self.tasks_by_line
            .get(&line_id)
            .map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    fn tasks_of_order(&self, order_id: OrderId) -> Vec<&QueuedTask> {
        self.lines_of(order_id)
            .into_iter()
            .flat_map(|line| self.tasks_of_line(line.id))
            .collect()
    }

    fn bind_task(&mut self, id: QueueTaskId, section_id: SectionId, at: Timestamp) -> Result<()> {
        let capacity = require!(self.sections.get(&section_id), Section, section_id).max_concurrent_tasks as usize;
        let load = self.in_progress_on(section_id);
        if load >= capacity {
            return Err(KitchenError::invariant(format!(
                "section {} already runs {} of {} tasks",
                section_id, load, capacity
            )));
        }

        self.journal_task(id);
        let task = require!(self.tasks.get_mut(&id), QueuedTask, id);
        task.bind(section_id, at)?;
        task.delay_cause = None;

        self.reindex(id, TaskStatus::Queued, TaskStatus::InProgress);
        *self.section_load.entry(section_id).or_insert(0) += 1;
        Ok(())
    }

    fn complete_task(&mut self, id: QueueTaskId, at: Timestamp) -> Result<bool> {
        self.journal_task(id);
        let task = require!(self.tasks.get_mut(&id), QueuedTask, id);
        let section_id = task.assigned_section();
        if !task.complete(at)? {
            return Ok(false);
        }

        self.reindex(id, TaskStatus::InProgress, TaskStatus::Completed);
        if let Some(section_id) = section_id {
            if let Some(load) = self.section_load.get_mut(&section_id) {
                *load = load.saturating_sub(1);
            }
        }
        Ok(true)
    }

    fn set_delay_cause(&mut self, id: QueueTaskId, cause: Option<DelayCause>) -> Result<()> {
        self.journal_task(id);
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| KitchenError::not_found(EntityKind::QueuedTask, id.value()))?;
        task.delay_cause = cause;
        Ok(())
    }
}

impl BottleneckRepository for KitchenTables {
    fn append_bottleneck(&mut self, record: BottleneckRecord) {
        self.bottlenecks.push(record);
    }

    fn bottlenecks(&self) -> &[BottleneckRecord] {
        &self.bottlenecks
    }
}

/// Shared handle to the kitchen tables
///
/// Cloning the store clones the handle, not the data.
#[derive(Debug, Clone)]
pub struct KitchenStore {
    tables: Arc<RwLock<KitchenTables>>,
    offline: Arc<AtomicBool>,
}

impl KitchenStore {
    /// Create a store seeded with the given reference data
    pub fn new(layout: &KitchenLayout) -> Result<Self> {
        Ok(Self {
            tables: Arc::new(RwLock::new(KitchenTables::from_layout(layout)?)),
            offline: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Simulate losing or regaining the connection to the store
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.is_offline() {
            return Err(KitchenError::StoreUnavailable("store is offline".to_string()));
        }
        Ok(())
    }

    /// Run a read-only query against a consistent snapshot
    pub fn read<R>(&self, f: impl FnOnce(&KitchenTables) -> R) -> Result<R> {
        self.check_online()?;
        let guard = self
            .tables
            .read()
            .map_err(|e| KitchenError::StoreUnavailable(e.to_string()))?;
        Ok(f(&guard))
    }

    /// Run a mutating closure atomically
    ///
    /// On `Err` or a panic the journal is replayed and the stored tables end
    /// up exactly as they were before the call.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut KitchenTables) -> Result<R>) -> Result<R> {
        self.check_online()?;
        let mut guard = self
            .tables
            .write()
            .map_err(|e| KitchenError::StoreUnavailable(e.to_string()))?;

        guard.begin();
        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *guard))) {
            Ok(Ok(result)) => {
                guard.commit();
                Ok(result)
            }
            Ok(Err(e)) => {
                guard.rollback();
                Err(e)
            }
            Err(payload) => {
                guard.rollback();
                // release the lock unpoisoned before the panic continues
                drop(guard);
                panic::resume_unwind(payload)
            }
        }
    }
}
