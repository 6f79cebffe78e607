use kitchen_sim::core::estimation::OrderProgress;
use kitchen_sim::{BasketLine, ClockLoop, Kitchen, KitchenConfig, KitchenError, KitchenLayout};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

const ORDERS: usize = 12;

fn load_config() -> Result<KitchenConfig, KitchenError> {
    match std::env::args().nth(1) {
        Some(path) => KitchenConfig::from_json_file(path),
        // one simulated minute every 200ms keeps the demo short
        None => Ok(KitchenConfig::new().with_tick(200, 60)),
    }
}

fn random_basket(rng: &mut StdRng, menu_size: i64) -> Vec<BasketLine> {
    let lines = rng.gen_range(1..=2);
    (0..lines)
        .map(|_| BasketLine::new(rng.gen_range(1..=menu_size), rng.gen_range(1..=2)))
        .collect()
}

fn print_board(board: &[OrderProgress]) {
    println!("{:<10} {:<10} {:>10} {:>10} {:>8}", "order", "status", "estimate", "actual", "tasks");
    for order in board {
        let actual = order
            .actual_seconds
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<10} {:>9}s {:>10} {:>4}/{}",
            order.order_number,
            order.status.to_string(),
            order.estimate_seconds,
            actual,
            order.tasks_completed,
            order.tasks_total
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), KitchenError> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = load_config()?;
    let tick_interval = config.clock.tick_interval();
    let kitchen = Kitchen::new(&KitchenLayout::momstouch(), config)?;
    let menu = kitchen.menu()?;
    println!("Menu:");
    for entry in &menu {
        let steps: Vec<&str> = entry.recipe.iter().map(|t| t.task_name.as_str()).collect();
        println!("  {} {} ({}): {}", entry.item.id, entry.item.name, entry.item.price, steps.join(" -> "));
    }

    let handle = ClockLoop::new(kitchen.clone()).spawn();

    // customers arrive on average every three ticks
    let mut rng = StdRng::seed_from_u64(2024);
    let arrivals = Exp::new(1.0 / 3.0).map_err(|e| KitchenError::invalid_basket(e.to_string()))?;
    for _ in 0..ORDERS {
        let wait = arrivals.sample(&mut rng);
        tokio::time::sleep(tick_interval.mul_f64(wait)).await;
        match kitchen.place_order(&random_basket(&mut rng, menu.len() as i64)) {
            Ok(receipt) => info!(
                "Customer got {} (estimate {}s, {} won)",
                receipt.order_number, receipt.estimate_seconds, receipt.total_price
            ),
            Err(e) => warn!("Order rejected: {}", e),
        }
    }

    while kitchen.order_board()?.iter().any(|o| o.actual_seconds.is_none()) {
        tokio::time::sleep(tick_interval).await;
    }
    let ticks = handle.shutdown().await;

    println!("\nAll orders served after {} ticks (simulated time {})", ticks, kitchen.now());
    print_board(&kitchen.order_board()?);

    println!("\nBottlenecks:");
    for summary in kitchen.bottleneck_summary()? {
        println!(
            "  {:<20} {:>3} tasks, {:>6}s total wait",
            summary.cause.to_string(),
            summary.count,
            summary.total_wait_seconds
        );
    }
    Ok(())
}
