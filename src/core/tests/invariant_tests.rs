// Tests for capacity, binding and closure invariants under a busy workload
#[cfg(test)]
mod tests {
    use crate::core::{
        assignment::AssignmentEngine,
        config::KitchenConfig,
        errors::KitchenError,
        intake::BasketLine,
        kitchen::Kitchen,
        layout::KitchenLayout,
        store::{CapacityRepository, KitchenTables, OrderRepository, TaskRepository},
        types::TaskStatus,
    };
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::thread;

    fn random_basket(rng: &mut StdRng) -> Vec<BasketLine> {
        let lines = rng.gen_range(1..=3);
        (0..lines)
            .map(|_| BasketLine::new(rng.gen_range(1..=3), rng.gen_range(1..=3)))
            .collect()
    }

    fn check_invariants(tables: &KitchenTables) {
        for station in tables.stations() {
            for section in tables.sections_of(station.id) {
                let running = tables
                    .tasks()
                    .filter(|t| t.status() == TaskStatus::InProgress && t.assigned_section() == Some(section.id))
                    .count();
                assert!(
                    running <= section.max_concurrent_tasks as usize,
                    "section {} runs {} tasks",
                    section.id,
                    running
                );
                assert_eq!(running, tables.in_progress_on(section.id));
            }
        }

        for task in tables.tasks() {
            let bound = task.assigned_section().is_some();
            let started = matches!(task.status(), TaskStatus::InProgress | TaskStatus::Completed);
            assert_eq!(bound, started, "task {} breaks the binding rule", task.id);
        }

        for order in tables.orders() {
            let tasks = tables.tasks_of_order(order.id);
            let all_done = tasks.iter().all(|t| t.is_completed());
            assert_eq!(order.is_closed(), all_done, "order {} closure mismatch", order.order_number);
            if let Some(actual) = order.actual_total_seconds {
                let latest = tasks.iter().filter_map(|t| t.completed_at()).max().unwrap();
                assert_eq!(actual, (latest - order.admitted_at).num_seconds());
            }
        }
    }

    fn fingerprint(tables: &KitchenTables) -> String {
        let tasks: Vec<String> = tables.tasks().map(|t| format!("{:?}", t)).collect();
        let orders: Vec<String> = tables.orders().iter().map(|o| format!("{:?}", o)).collect();
        let sections: Vec<String> = tables
            .stations()
            .iter()
            .flat_map(|s| tables.sections_of(s.id))
            .map(|s| format!("{:?}", s))
            .collect();
        format!("{:?}|{:?}|{:?}", tasks, orders, sections)
    }

    #[test]
    fn test_invariants_hold_through_busy_service() {
        let kitchen = Kitchen::new(&KitchenLayout::momstouch(), KitchenConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        kitchen.place_order(&[BasketLine::new(2, 1)]).unwrap();

        for step in 0..120 {
            if step < 40 && rng.gen_bool(0.3) {
                kitchen.place_order(&random_basket(&mut rng)).unwrap();
            }
            kitchen.tick_by(Duration::seconds(30)).unwrap();
            kitchen.inspect(check_invariants).unwrap();
        }

        // everything admitted eventually drains
        for _ in 0..600 {
            kitchen.tick().unwrap();
        }
        kitchen.inspect(check_invariants).unwrap();
        let board = kitchen.order_board().unwrap();
        assert!(!board.is_empty());
        assert!(board.iter().all(|order| order.actual_seconds.is_some()));
    }

    #[test]
    fn test_concurrent_intake_and_ticks_keep_invariants() {
        let kitchen = Kitchen::new(&KitchenLayout::momstouch(), KitchenConfig::default()).unwrap();

        let counters: Vec<_> = (0..4u64)
            .map(|worker| {
                let kitchen = kitchen.clone();
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(100 + worker);
                    for _ in 0..15 {
                        let receipt = kitchen.place_order(&random_basket(&mut rng)).unwrap();
                        // the operator bumps the first step, which may still be queued
                        match kitchen.complete_task(receipt.task_ids[0]) {
                            Ok(_) | Err(KitchenError::InvariantViolation(_)) => {}
                            Err(e) => panic!("unexpected completion error: {}", e),
                        }
                        kitchen.inspect(check_invariants).unwrap();
                    }
                })
            })
            .collect();

        let clock = {
            let kitchen = kitchen.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    kitchen.tick_by(Duration::seconds(30)).unwrap();
                    kitchen.inspect(check_invariants).unwrap();
                }
            })
        };

        for counter in counters {
            counter.join().unwrap();
        }
        clock.join().unwrap();

        let mut drained = 0;
        while kitchen.order_board().unwrap().iter().any(|o| o.actual_seconds.is_none()) {
            kitchen.tick_by(Duration::minutes(10)).unwrap();
            drained += 1;
            assert!(drained < 1_000, "orders never drained");
        }
        kitchen.inspect(check_invariants).unwrap();
        assert_eq!(kitchen.order_board().unwrap().len(), 60);
    }

    #[test]
    fn test_actual_duration_is_set_once() {
        let kitchen = Kitchen::new(&KitchenLayout::momstouch(), KitchenConfig::default()).unwrap();
        let receipt = kitchen.place_order(&[BasketLine::new(1, 1)]).unwrap();
        for _ in 0..10 {
            kitchen.tick().unwrap();
        }
        let first = kitchen.order_progress(receipt.order_id).unwrap().actual_seconds;
        assert!(first.is_some());

        for _ in 0..10 {
            kitchen.tick().unwrap();
        }
        assert_eq!(kitchen.order_progress(receipt.order_id).unwrap().actual_seconds, first);
    }

    #[test]
    fn test_repeated_pass_changes_nothing() {
        let kitchen = Kitchen::new(&KitchenLayout::momstouch(), KitchenConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5 {
            kitchen.place_order(&random_basket(&mut rng)).unwrap();
        }
        kitchen.tick().unwrap();

        let before = kitchen.inspect(fingerprint).unwrap();
        let bottlenecks = kitchen.bottlenecks().unwrap().len();
        let report = kitchen.run_assignment_pass().unwrap();
        assert!(report.is_noop());
        assert_eq!(kitchen.inspect(fingerprint).unwrap(), before);
        assert_eq!(kitchen.bottlenecks().unwrap().len(), bottlenecks);
    }

    #[test]
    fn test_pass_on_empty_kitchen_is_noop() {
        let mut tables = KitchenTables::from_layout(&KitchenLayout::momstouch()).unwrap();
        let now = KitchenConfig::default().clock.start;
        let report = AssignmentEngine::default().run_pass(&mut tables, now).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.still_queued, 0);
    }
}
