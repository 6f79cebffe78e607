//! Order admission
//!
//! Turns a basket into one order, one line per physical unit and one queued
//! task per (unit, recipe step). Admission runs inside a single store
//! transaction, so a failure leaves no rows behind.

use crate::core::capacity::CapacityModel;
use crate::core::errors::{KitchenError, Result};
use crate::core::model::{CustomerOrder, OrderLine, QueuedTask, TaskDefinition};
use crate::core::store::KitchenRepository;
use crate::core::types::{MenuItemId, OrderId, OrderLineId, OrderStatus, QueueTaskId, StationId, TaskStatus, Timestamp};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One basket entry: a menu item and how many units of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
}

impl BasketLine {
    pub fn new(menu_item_id: i64, quantity: i64) -> Self {
        Self {
            menu_item_id: MenuItemId(menu_item_id),
            quantity,
        }
    }
}

/// What the caller gets back from a successful admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReceipt {
    pub order_id: OrderId,
    pub order_number: String,
    pub admitted_at: Timestamp,
    pub estimate_seconds: i64,
    /// Sum of unit prices over every unit ordered
    pub total_price: i64,
    pub lines: Vec<OrderLineId>,
    pub task_ids: Vec<QueueTaskId>,
}

/// Most physical units a single basket may hold
pub const MAX_BASKET_UNITS: i64 = 500;

/// Format an order number from its daily sequence
pub fn order_number(sequence: u32) -> String {
    format!("ORD-{:03}", sequence)
}

/// Admit a basket at the given simulated instant
pub fn admit<R: KitchenRepository + ?Sized>(
    repo: &mut R,
    basket: &[BasketLine],
    now: Timestamp,
) -> Result<AdmissionReceipt> {
    validate_basket(repo, basket)?;

    let estimate_seconds = estimate_admission(repo, basket, now)?;
    let total_price = basket.iter().try_fold(0i64, |acc, line| {
        let item = require!(repo.menu_item(line.menu_item_id), MenuItem, line.menu_item_id);
        item.price
            .checked_mul(line.quantity)
            .and_then(|price| acc.checked_add(price))
            .ok_or_else(|| overflow("total price"))
    })?;

    let business_day = now.date_naive();
    let sequence = repo.last_sequence_on(business_day) + 1;
    let order_id = repo.next_order_id();
    let number = order_number(sequence);
    repo.insert_order(CustomerOrder {
        id: order_id,
        order_number: number.clone(),
        business_day,
        sequence,
        status: OrderStatus::Confirmed,
        admitted_at: now,
        estimated_total_seconds: estimate_seconds,
        actual_total_seconds: None,
    });

    let mut lines = Vec::new();
    let mut task_ids = Vec::new();
    for entry in basket {
        let recipe: Vec<_> = repo.recipe_of(entry.menu_item_id).iter().map(|t| t.id).collect();
        for _ in 0..entry.quantity {
            let line_id = repo.next_line_id();
            repo.insert_line(OrderLine {
                id: line_id,
                order_id,
                menu_item_id: entry.menu_item_id,
            });
            lines.push(line_id);

            for definition_id in &recipe {
                let task_id = repo.next_task_id();
                repo.insert_task(QueuedTask::new(task_id, line_id, *definition_id));
                task_ids.push(task_id);
            }
        }
    }

    info!(
        "Admitted order {} ({} units, {} tasks), estimate {}s",
        number,
        lines.len(),
        task_ids.len(),
        estimate_seconds
    );

    Ok(AdmissionReceipt {
        order_id,
        order_number: number,
        admitted_at: now,
        estimate_seconds,
        total_price,
        lines,
        task_ids,
    })
}

/// Reject malformed baskets before anything is written
pub fn validate_basket<R: KitchenRepository + ?Sized>(repo: &R, basket: &[BasketLine]) -> Result<()> {
    if basket.is_empty() {
        return Err(KitchenError::invalid_basket("basket is empty"));
    }
    let capacity = CapacityModel::new(repo);
    let mut units: i64 = 0;
    for line in basket {
        if line.quantity < 1 {
            return Err(KitchenError::invalid_basket(format!(
                "quantity {} for menu item {} must be at least 1",
                line.quantity, line.menu_item_id
            )));
        }
        units = units.saturating_add(line.quantity);
        if units > MAX_BASKET_UNITS {
            return Err(KitchenError::invalid_basket(format!(
                "basket holds more than {} units",
                MAX_BASKET_UNITS
            )));
        }
        if capacity.recipe(line.menu_item_id)?.is_empty() {
            return Err(KitchenError::invalid_basket(format!(
                "menu item {} has no recipe",
                line.menu_item_id
            )));
        }
    }
    Ok(())
}

/// Admission-time estimate of the total wait, in seconds
///
/// New tasks are grouped by (station, task name). Each group needs
/// `ceil(count / station capacity)` batches of its step duration, on top of
/// whatever the latest-started matching task already in progress still has
/// left. Stations run in parallel, so the slowest group sets the estimate.
pub fn estimate_admission<R: KitchenRepository + ?Sized>(
    repo: &R,
    basket: &[BasketLine],
    now: Timestamp,
) -> Result<i64> {
    let capacity = CapacityModel::new(repo);

    // (station, task name) -> (unit count, step duration)
    let mut groups: BTreeMap<(StationId, String), (i64, i64)> = BTreeMap::new();
    for line in basket {
        for definition in capacity.recipe(line.menu_item_id)? {
            let group = groups
                .entry((definition.station_id, definition.task_name.clone()))
                .or_insert((0, 0));
            group.0 = group.0.checked_add(line.quantity).ok_or_else(|| overflow("unit count"))?;
            group.1 = group.1.max(definition.base_duration_seconds);
        }
    }

    let mut estimate = 0;
    for ((station_id, task_name), (count, duration)) in &groups {
        let total_capacity = i64::from(capacity.total_capacity(*station_id)?.max(1));
        let batches = count / total_capacity + i64::from(count % total_capacity != 0);
        let existing = existing_remaining(repo, *station_id, task_name, now);
        let group_estimate = batches
            .checked_mul(*duration)
            .and_then(|work| work.checked_add(existing))
            .ok_or_else(|| overflow("estimate"))?;
        estimate = estimate.max(group_estimate);
    }
    Ok(estimate)
}

fn overflow(what: &str) -> KitchenError {
    KitchenError::invalid_basket(format!("{} does not fit in 64 bits", what))
}

/// Remaining seconds on the latest-started in-progress task of one group
fn existing_remaining<R: KitchenRepository + ?Sized>(
    repo: &R,
    station_id: StationId,
    task_name: &str,
    now: Timestamp,
) -> i64 {
    let latest: Option<(Timestamp, &TaskDefinition)> = repo
        .tasks_with_status(TaskStatus::InProgress)
        .into_iter()
        .filter_map(|id| repo.task(id))
        .filter_map(|task| {
            let definition = repo.task_definition(task.task_definition_id)?;
            let started_at = task.started_at()?;
            (definition.station_id == station_id && definition.task_name == task_name)
                .then_some((started_at, definition))
        })
        .max_by_key(|(started_at, _)| *started_at);

    match latest {
        Some((started_at, definition)) => {
            let elapsed = (now - started_at).num_seconds();
            definition.base_duration_seconds.saturating_sub(elapsed).max(0)
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::KitchenLayout;
    use crate::core::model::{MenuItem, Section, Station};
    use crate::core::store::{KitchenTables, OrderRepository, TaskRepository};
    use crate::core::types::SectionId;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn tables() -> KitchenTables {
        KitchenTables::from_layout(&KitchenLayout::momstouch()).unwrap()
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(order_number(1), "ORD-001");
        assert_eq!(order_number(42), "ORD-042");
        assert_eq!(order_number(1234), "ORD-1234");
    }

    #[test]
    fn test_admission_expands_units_and_recipes() {
        let mut tables = tables();
        let receipt = admit(&mut tables, &[BasketLine::new(2, 2), BasketLine::new(3, 1)], t0()).unwrap();

        assert_eq!(receipt.order_number, "ORD-001");
        assert_eq!(receipt.lines.len(), 3);
        assert_eq!(receipt.task_ids.len(), 2 * 4 + 2);
        assert_eq!(receipt.total_price, 2 * 8500 + 4500);

        for id in &receipt.task_ids {
            let task = tables.task(*id).unwrap();
            assert_eq!(task.status(), TaskStatus::Queued);
            assert!(task.assigned_section().is_none());
        }
        let order = tables.order(receipt.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.actual_total_seconds.is_none());
    }

    #[test]
    fn test_malformed_basket_is_rejected() {
        let mut tables = tables();
        for basket in [vec![], vec![BasketLine::new(1, 0)], vec![BasketLine::new(1, 1), BasketLine::new(3, -2)]] {
            let err = admit(&mut tables, &basket, t0()).unwrap_err();
            assert!(matches!(err, KitchenError::InvalidBasket(_)));
        }
        assert!(tables.orders().is_empty());
    }

    #[test]
    fn test_oversized_basket_is_rejected_without_writes() {
        let mut tables = tables();
        for basket in [
            vec![BasketLine::new(3, i64::MAX / 1000)],
            vec![BasketLine::new(3, i64::MAX), BasketLine::new(1, i64::MAX)],
            vec![BasketLine::new(3, MAX_BASKET_UNITS), BasketLine::new(1, 1)],
        ] {
            let err = admit(&mut tables, &basket, t0()).unwrap_err();
            assert!(matches!(err, KitchenError::InvalidBasket(_)));
        }
        assert!(tables.orders().is_empty());

        let receipt = admit(&mut tables, &[BasketLine::new(3, MAX_BASKET_UNITS)], t0()).unwrap();
        assert_eq!(receipt.total_price, 4500 * MAX_BASKET_UNITS);
    }

    #[test]
    fn test_overflowing_price_is_rejected() {
        let layout = KitchenLayout::new()
            .with_station(Station::new(1, "Fryer"))
            .with_section(Section::new(1, 1, 1, 1, "Fryer #1"))
            .with_menu_item(MenuItem::new(1, "Gold Burger", i64::MAX / 2))
            .with_task(crate::core::model::TaskDefinition::new(1, 1, "Fry", 1, 60, 1));
        let mut tables = KitchenTables::from_layout(&layout).unwrap();
        let err = admit(&mut tables, &[BasketLine::new(1, 3)], t0()).unwrap_err();
        assert!(err.to_string().contains("total price"));
        assert!(tables.orders().is_empty());
    }

    #[test]
    fn test_unknown_menu_item_is_not_found() {
        let mut tables = tables();
        let err = admit(&mut tables, &[BasketLine::new(77, 1)], t0()).unwrap_err();
        assert!(err.is_not_found());
        assert!(tables.orders().is_empty());
    }

    #[test]
    fn test_menu_item_without_recipe_is_rejected() {
        let layout = KitchenLayout::new()
            .with_station(Station::new(1, "Fryer"))
            .with_section(Section::new(1, 1, 1, 1, "Fryer #1"))
            .with_menu_item(MenuItem::new(1, "Napkin", 0));
        let mut tables = KitchenTables::from_layout(&layout).unwrap();
        let err = admit(&mut tables, &[BasketLine::new(1, 1)], t0()).unwrap_err();
        assert!(matches!(err, KitchenError::InvalidBasket(_)));
    }

    #[test]
    fn test_sequence_resets_on_new_day() {
        let mut tables = tables();
        let first = admit(&mut tables, &[BasketLine::new(3, 1)], t0()).unwrap();
        let second = admit(&mut tables, &[BasketLine::new(3, 1)], t0() + Duration::minutes(5)).unwrap();
        let next_day = admit(&mut tables, &[BasketLine::new(3, 1)], t0() + Duration::days(1)).unwrap();

        assert_eq!(first.order_number, "ORD-001");
        assert_eq!(second.order_number, "ORD-002");
        assert_eq!(next_day.order_number, "ORD-001");
    }

    #[test]
    fn test_estimate_batches_by_station_capacity() {
        let tables = tables();
        // 3 tender units on a 2-slot fryer: 2 batches of 240s
        let estimate = estimate_admission(&tables, &[BasketLine::new(3, 3)], t0()).unwrap();
        assert_eq!(estimate, 480);
    }

    #[test]
    fn test_estimate_takes_slowest_group() {
        let tables = tables();
        // patty 300s outweighs potatoes 180s and assembly 90s
        let estimate = estimate_admission(&tables, &[BasketLine::new(2, 1)], t0()).unwrap();
        assert_eq!(estimate, 300);
    }

    #[test]
    fn test_estimate_adds_remaining_in_progress_work() {
        let mut tables = tables();
        let receipt = admit(&mut tables, &[BasketLine::new(3, 1)], t0()).unwrap();
        let fry = receipt.task_ids[0];
        tables.bind_task(fry, SectionId(2), t0()).unwrap();

        let later = t0() + Duration::seconds(100);
        let estimate = estimate_admission(&tables, &[BasketLine::new(3, 1)], later).unwrap();
        assert_eq!(estimate, 140 + 240);

        let much_later = t0() + Duration::seconds(1_000);
        let estimate = estimate_admission(&tables, &[BasketLine::new(3, 1)], much_later).unwrap();
        assert_eq!(estimate, 240);
    }
}
