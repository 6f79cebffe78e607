//! Kitchen facade
//!
//! Owns the store, the synthetic clock and the assignment engine. Every
//! mutating call runs as one store transaction, so an admission racing a
//! tick never sees a half-applied state.

use crate::core::assignment::{AssignmentEngine, PassReport};
use crate::core::clock::{Clock, SyntheticClock};
use crate::core::completion;
use crate::core::config::KitchenConfig;
use crate::core::errors::Result;
use crate::core::estimation::{
    self, BottleneckSummary, MenuEntry, OrderProgress, StationLoad, TaskProgress,
};
use crate::core::intake::{self, AdmissionReceipt, BasketLine};
use crate::core::layout::KitchenLayout;
use crate::core::model::BottleneckRecord;
use crate::core::store::{BottleneckRepository, KitchenStore, KitchenTables};
use crate::core::types::{OrderId, QueueTaskId, SectionId, Timestamp};
use chrono::Duration;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// What one clock tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Simulated instant after the tick
    pub now: Timestamp,
    pub completed: Vec<QueueTaskId>,
    pub closed_orders: Vec<OrderId>,
    pub pass: PassReport,
}

/// One simulated kitchen
///
/// Cloning shares the same store and clock.
#[derive(Clone)]
pub struct Kitchen {
    store: KitchenStore,
    clock: Arc<dyn Clock>,
    engine: AssignmentEngine,
    config: KitchenConfig,
}

impl Kitchen {
    /// Create a new kitchen with a synthetic clock at the configured start
    pub fn new(layout: &KitchenLayout, config: KitchenConfig) -> Result<Self> {
        let clock = Arc::new(SyntheticClock::new(config.clock.start));
        Self::with_clock(layout, config, clock)
    }

    /// Create a new kitchen driven by the given clock
    pub fn with_clock(layout: &KitchenLayout, config: KitchenConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: KitchenStore::new(layout)?,
            clock,
            engine: AssignmentEngine::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub fn store(&self) -> &KitchenStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Admit a basket and immediately offer its tasks to idle sections
    pub fn place_order(&self, basket: &[BasketLine]) -> Result<AdmissionReceipt> {
        self.store.transaction(|tables| {
            let now = self.clock.now();
            let receipt = intake::admit(tables, basket, now)?;
            self.engine.run_pass(tables, now)?;
            Ok(receipt)
        })
    }

    /// Run one assignment pass at the current instant
    pub fn run_assignment_pass(&self) -> Result<PassReport> {
        self.store
            .transaction(|tables| self.engine.run_pass(tables, self.clock.now()))
    }

    /// Advance by the configured step, complete due tasks and refill sections
    pub fn tick(&self) -> Result<TickReport> {
        self.tick_by(Duration::seconds(self.config.clock.tick_step_seconds))
    }

    /// Advance by an explicit step
    ///
    /// Sweep and pass run against the new instant inside one transaction; the
    /// clock itself only moves once both have succeeded.
    pub fn tick_by(&self, step: Duration) -> Result<TickReport> {
        let report = self.store.transaction(|tables| {
            let next = self.clock.now() + step.max(Duration::zero());
            let sweep = completion::sweep(tables, next)?;
            let pass = self.engine.run_pass(tables, next)?;
            self.clock.advance(step);
            Ok(TickReport {
                now: next,
                completed: sweep.completed,
                closed_orders: sweep.closed_orders,
                pass,
            })
        })?;

        debug!(
            "Tick to {}: {} completed, {} orders closed, {} bound",
            report.now,
            report.completed.len(),
            report.closed_orders.len(),
            report.pass.bound.len()
        );
        Ok(report)
    }

    /// Operator-forced completion at the current instant
    ///
    /// Returns `false` if the task was already completed. Freed capacity is
    /// offered to queued work in the same transaction.
    pub fn complete_task(&self, task_id: QueueTaskId) -> Result<bool> {
        self.store.transaction(|tables| {
            let now = self.clock.now();
            let completed = completion::complete_task(tables, task_id, now)?;
            if completed {
                self.engine.run_pass(tables, now)?;
            }
            Ok(completed)
        })
    }

    /// In-progress count and capacity of a section
    pub fn current_load(&self, section_id: SectionId) -> Result<(usize, u32)> {
        self.store.read(|tables| estimation::current_load(tables, section_id))?
    }

    pub fn order_progress(&self, order_id: OrderId) -> Result<OrderProgress> {
        let now = self.now();
        self.store.read(|tables| estimation::order_progress(tables, order_id, now))?
    }

    pub fn order_by_number(&self, order_number: &str) -> Result<Option<OrderProgress>> {
        let now = self.now();
        self.store
            .read(|tables| estimation::order_by_number(tables, order_number, now))
    }

    pub fn latest_order(&self) -> Result<Option<OrderProgress>> {
        let now = self.now();
        self.store.read(|tables| estimation::latest_order(tables, now))
    }

    pub fn order_board(&self) -> Result<Vec<OrderProgress>> {
        let now = self.now();
        self.store.read(|tables| estimation::order_board(tables, now))
    }

    pub fn task_progress(&self, task_id: QueueTaskId) -> Result<TaskProgress> {
        let now = self.now();
        self.store.read(|tables| estimation::task_progress(tables, task_id, now))?
    }

    pub fn queue_snapshot(&self) -> Result<Vec<TaskProgress>> {
        let now = self.now();
        self.store.read(|tables| estimation::queue_snapshot(tables, now))?
    }

    pub fn station_loads(&self) -> Result<Vec<StationLoad>> {
        self.store.read(|tables| estimation::station_loads(tables))?
    }

    pub fn bottlenecks(&self) -> Result<Vec<BottleneckRecord>> {
        self.store.read(|tables| tables.bottlenecks().to_vec())
    }

    pub fn bottleneck_summary(&self) -> Result<Vec<BottleneckSummary>> {
        self.store.read(|tables| estimation::bottleneck_summary(tables))
    }

    pub fn menu(&self) -> Result<Vec<MenuEntry>> {
        self.store.read(|tables| estimation::menu(tables))
    }

    /// Run an arbitrary read-only query against the tables
    pub fn inspect<R>(&self, f: impl FnOnce(&KitchenTables) -> R) -> Result<R> {
        self.store.read(f)
    }
}
