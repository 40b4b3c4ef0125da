//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! bookshop cart show
//! bookshop cart add 42 -q 2
//! bookshop cart set 42 5
//! bookshop cart remove 42
//! bookshop cart clear
//! ```

use bookshop_core::BookId;
use bookshop_storefront::checkout::PricingPolicy;
use bookshop_storefront::{ApiClient, CartManager, CartState, validation};
use clap::Subcommand;

use super::{CommandError, Context, money};

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart with totals
    Show,
    /// Add a book
    Add {
        book_id: i64,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set the quantity of a line (0 removes it)
    Set { book_id: i64, quantity: i64 },
    /// Remove a line
    Remove { book_id: i64 },
    /// Empty the cart
    Clear,
}

pub async fn run(ctx: &Context, action: CartAction) -> Result<(), CommandError> {
    ctx.sign_in().await?;
    let cart = manager(ctx);

    let result = match action {
        CartAction::Show => cart.fetch().await,
        CartAction::Add { book_id, quantity } => {
            let book_id = BookId::new(book_id);
            let book = ctx.client.get_book(book_id).await?;
            let quantity = validation::quantity(quantity, Some(book.stock()))
                .map_err(CommandError::InvalidInput)?;
            cart.add_line(book_id, quantity).await
        }
        CartAction::Set { book_id, quantity } => {
            let book_id = BookId::new(book_id);
            if quantity > 0 {
                let book = ctx.client.get_book(book_id).await?;
                validation::quantity(quantity, Some(book.stock()))
                    .map_err(CommandError::InvalidInput)?;
            }
            cart.update_quantity(book_id, quantity).await
        }
        CartAction::Remove { book_id } => cart.remove_line(BookId::new(book_id)).await,
        CartAction::Clear => cart.clear().await,
    };
    cart.shutdown();
    result?;

    print_cart(&cart.snapshot(), &ctx.config.pricing);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn print_cart(state: &CartState, pricing: &PricingPolicy) {
    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in &state.lines {
        println!(
            "{:>5}  {:<40} {:>3} x {} {}",
            line.product_id,
            line.title,
            line.quantity,
            money(line.unit_price),
            money(line.line_total())
        );
    }
    let totals = pricing.totals(state.subtotal(), true);
    println!();
    println!("Items:    {:>10}", state.total_items());
    println!("Subtotal: {}", money(totals.subtotal));
    println!("Shipping: {}", money(totals.shipping));
    println!("Tax:      {}", money(totals.tax));
    println!("Total:    {}", money(totals.total));
}

fn manager(ctx: &Context) -> CartManager<ApiClient> {
    CartManager::new(ctx.client.clone(), ctx.session().clone(), ctx.config.sync_policy)
}

/// Build a cart manager for `ctx` and load it.
pub async fn load(ctx: &Context) -> Result<CartManager<ApiClient>, CommandError> {
    let cart = manager(ctx);
    cart.fetch().await?;
    Ok(cart)
}
