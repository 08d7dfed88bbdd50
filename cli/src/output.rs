//! Terminal rendering for command results

use kudos_core::{Balance, Order, OrderStatus, Product, Transaction};
use kudos_ledger::{DistributionReport, Receipt};
use kudos_storage::LeaderboardEntry;
use owo_colors::OwoColorize;

const RULE: &str = "═══════════════════════════════════";

pub fn ok(message: impl AsRef<str>) {
    println!("{} {}", "✓".green(), message.as_ref());
}

pub fn balance(balance: &Balance) {
    println!("\n{} {}", "Balance".yellow().bold(), balance.account_id);
    println!("{}", RULE.bright_black());
    println!("Available:       {}", balance.available_points.to_string().green());
    println!("Total earned:    {}", balance.total_earned);
    println!("Total spent:     {}", balance.total_spent);
    println!(
        "Given this month: {}/{}",
        balance.monthly_given_used, balance.monthly_given_limit
    );
    println!("Quota reset:     {}", balance.last_monthly_reset.format("%Y-%m-%d %H:%M UTC"));
    println!();
}

pub fn product(product: &Product) {
    let state = if product.active {
        "active".green().to_string()
    } else {
        "inactive".red().to_string()
    };
    println!(
        "{} {} ({}) cost {} stock {} [{}]",
        "•".cyan(),
        product.id.bold(),
        product.name,
        product.unit_cost,
        product.inventory,
        state
    );
}

pub fn order(order: &Order) {
    let status = match order.status {
        OrderStatus::Pending => "pending".yellow().to_string(),
        OrderStatus::Completed => "completed".green().to_string(),
        OrderStatus::Cancelled => "cancelled".red().to_string(),
        OrderStatus::Refunded => "refunded".magenta().to_string(),
    };
    println!("\n{} {} [{}]", "Order".yellow().bold(), order.id, status);
    println!("{}", RULE.bright_black());
    println!("Buyer:   {}", order.buyer);
    for line in &order.line_items {
        println!(
            "  {} x{} @ {} = {}",
            line.product_name, line.quantity, line.unit_cost, line.line_total
        );
    }
    println!("Total:   {}", order.total_cost.to_string().green());
    if let Some(request) = &order.cancellation_request {
        println!(
            "Cancellation: {:?} ({}: {})",
            request.admin_response, request.requested_by, request.reason
        );
    }
    println!();
}

pub fn receipt(receipt: &Receipt) {
    println!("\n{} {}", "Receipt".yellow().bold(), receipt.order_id);
    println!("{}", RULE.bright_black());
    println!("Purchased: {}", receipt.purchased_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for item in &receipt.items {
        println!("  {} x{} = {}", item.product_name, item.quantity, item.line_total);
    }
    println!("Total:     {} ({:?})", receipt.total_cost, receipt.status);
    println!();
}

pub fn history(entries: &[Transaction]) {
    if entries.is_empty() {
        println!("{}", "No transactions".bright_black());
        return;
    }
    for tx in entries {
        println!(
            "{}  {:<12} {:>6}  {}",
            tx.created_at.format("%Y-%m-%d %H:%M"),
            tx.kind.to_string().cyan(),
            tx.amount,
            tx.description
        );
        if let Some(message) = &tx.message {
            println!("{:>20} \"{}\"", "", message.bright_white());
        }
    }
}

pub fn leaderboard(entries: &[LeaderboardEntry]) {
    println!("\n{}", "Leaderboard".yellow().bold());
    println!("{}", RULE.bright_black());
    for entry in entries {
        println!(
            "{:>3}. {:<24} {:>6} pts ({} cheers)",
            entry.rank,
            entry.account_id,
            entry.points_received.to_string().green(),
            entry.cheers_received
        );
    }
    println!();
}

pub fn distribution(report: &DistributionReport) {
    println!(
        "{} cycle {}: {} granted, {} skipped",
        "Distribution".yellow().bold(),
        report.cycle,
        report.granted.to_string().green(),
        report.skipped
    );
    for failure in &report.failed_batches {
        println!(
            "  {} batch {} ({} accounts): {}",
            "✗".red(),
            failure.batch,
            failure.accounts.len(),
            failure.error
        );
    }
}
