//! Order history commands.
//!
//! # Usage
//!
//! ```bash
//! bookshop orders list --status shipped --page 0 --size 10
//! bookshop orders list --from 2024-01-01 --min-amount 20
//! bookshop orders confirm 7
//! ```

use bookshop_core::{OrderId, OrderStatus};
use bookshop_storefront::api::{OrderFilter, OrderResponse, Pagination};
use bookshop_storefront::{ApiClient, OrderHistory};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use super::{CommandError, Context, money};

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List orders, newest first
    List(ListArgs),
    /// Confirm a shipped order has arrived
    Confirm { id: i64 },
}

#[derive(Args)]
pub struct ListArgs {
    /// Only orders in this status
    #[arg(long)]
    status: Option<OrderStatus>,

    /// Placed on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Placed on or before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    min_amount: Option<Decimal>,

    #[arg(long)]
    max_amount: Option<Decimal>,

    /// Zero-based page
    #[arg(long, default_value_t = 0)]
    page: u32,

    #[arg(long, default_value_t = 10)]
    size: u32,
}

impl ListArgs {
    pub const fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size.max(1)
    }

    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            start_date: self.from,
            end_date: self.to,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
        }
    }
}

pub async fn run(ctx: &Context, action: OrdersAction) -> Result<(), CommandError> {
    ctx.sign_in().await?;
    let mut history = OrderHistory::new(ctx.client.clone(), ctx.session().clone());

    match action {
        OrdersAction::List(args) => {
            let mut history = history.with_filter(args.filter()).with_pagination(Pagination {
                page: args.page(),
                size: args.size(),
            });
            history.load().await?;
            print_history(&history);
        }
        OrdersAction::Confirm { id } => {
            history.confirm_received(OrderId::new(id)).await?;
            if let Some(message) = history.last_error() {
                tracing::warn!(%message, "Order list could not be refreshed");
            }
            print_confirmed(id);
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_confirmed(id: i64) {
    println!("Order #{id} confirmed as received. Thank you!");
}

#[allow(clippy::print_stdout)]
fn print_history(history: &OrderHistory<ApiClient>) {
    if history.orders().is_empty() {
        println!("No orders found.");
        return;
    }
    for order in history.orders() {
        print_order(order);
    }
    let pagination = history.pagination();
    println!();
    println!(
        "Page {} of {} ({} orders)",
        pagination.page + 1,
        history.total_pages().max(1),
        history.total_elements()
    );
}

#[allow(clippy::print_stdout)]
pub fn print_order(order: &OrderResponse) {
    let date = order.order_date.as_deref().unwrap_or("-");
    let hint = if OrderHistory::<ApiClient>::can_confirm(order) {
        "  (confirm with `bookshop orders confirm`)"
    } else {
        ""
    };
    println!(
        "#{:<6} {:<20} {:<10} {}{hint}",
        order.id,
        date,
        order.status,
        money(order.total_amount)
    );
    for item in &order.items {
        println!(
            "         {:>3} x {:<40} {}",
            item.quantity,
            item.book.title,
            money(item.price)
        );
    }
}
