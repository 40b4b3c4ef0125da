//! Admin dashboard commands. Require an account with the admin role.
//!
//! # Usage
//!
//! ```bash
//! bookshop admin analytics
//! bookshop admin orders --status pending --user 12
//! bookshop admin status 7 shipped
//! bookshop admin books add --title Emma --author "Jane Austen" --price 8.00 \
//!     --stock 40 --category Classics --description "Handsome, clever, and rich."
//! bookshop admin books update 3 --price 7.50
//! bookshop admin books delete 3
//! ```

use bookshop_core::{BookId, OrderId, OrderStatus, Price, UserId};
use bookshop_storefront::Session;
use bookshop_storefront::api::{BookRequest, Pagination, SalesAnalytics};
use chrono::Local;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use super::orders::{ListArgs, print_order};
use super::{CommandError, Context, money};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Sales figures
    Analytics,
    /// All customers' orders
    Orders {
        #[command(flatten)]
        list: ListArgs,

        /// Only orders of this user
        #[arg(long)]
        user: Option<i64>,
    },
    /// Move an order to a new status
    Status { id: i64, status: OrderStatus },
    /// Edit the catalog
    Books {
        #[command(subcommand)]
        action: BookAction,
    },
}

#[derive(Subcommand)]
pub enum BookAction {
    /// Add a book to the catalog
    Add(BookFields),
    /// Change the given fields of a book
    Update {
        id: i64,

        #[command(flatten)]
        fields: BookFields,
    },
    /// Remove a book from the catalog
    Delete { id: i64 },
}

/// Catalog fields; unset flags keep the current value.
#[derive(Args)]
pub struct BookFields {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Price in dollars, e.g. 12.99
    #[arg(long)]
    price: Option<Decimal>,

    #[arg(long)]
    stock: Option<i64>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    isbn: Option<String>,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    image_url: Option<String>,
}

impl BookFields {
    fn apply(self, mut book: BookRequest) -> BookRequest {
        let trimmed = |s: String| s.trim().to_string();
        if let Some(title) = self.title {
            book.title = trimmed(title);
        }
        if let Some(author) = self.author {
            book.author = trimmed(author);
        }
        if let Some(description) = self.description {
            book.description = trimmed(description);
        }
        if let Some(price) = self.price {
            book.price = Price::new(price);
        }
        if let Some(stock) = self.stock {
            book.stock_quantity = stock;
        }
        book.category = self.category.map(trimmed).or(book.category);
        book.isbn = self.isbn.map(trimmed).or(book.isbn);
        book.publish_year = self.year.or(book.publish_year);
        book.image_url = self.image_url.map(trimmed).or(book.image_url);
        book
    }
}

#[allow(clippy::print_stdout)]
pub async fn run(ctx: &Context, action: AdminAction) -> Result<(), CommandError> {
    let session = ctx.sign_in().await?;
    if !session.identity().is_admin() {
        return Err(CommandError::InvalidInput(
            "Admin access required".to_string(),
        ));
    }

    match action {
        AdminAction::Analytics => print_analytics(&ctx.client.sales_analytics(&session).await?),
        AdminAction::Orders { list, user } => {
            let pagination = Pagination {
                page: list.page(),
                size: list.size(),
            };
            let page = ctx
                .client
                .admin_orders(&session, &list.filter(), user.map(UserId::new), pagination)
                .await?;
            for order in &page.content {
                print_order(order);
            }
            println!();
            println!(
                "Page {} of {} ({} orders)",
                page.number + 1,
                page.total_pages.max(1),
                page.total_elements
            );
        }
        AdminAction::Status { id, status } => {
            let order = ctx
                .client
                .update_order_status(&session, OrderId::new(id), status)
                .await?;
            print_order(&order);
        }
        AdminAction::Books { action } => manage_books(ctx, &session, action).await?,
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn manage_books(
    ctx: &Context,
    session: &Session,
    action: BookAction,
) -> Result<(), CommandError> {
    let today = Local::now().date_naive();
    match action {
        BookAction::Add(fields) => {
            let request = fields.apply(BookRequest::default());
            request.validate(today)?;
            let book = ctx.client.create_book(session, &request).await?;
            println!("Added book {}: {}", book.id, book.title);
        }
        BookAction::Update { id, fields } => {
            let id = BookId::new(id);
            let current = ctx.client.get_book(id).await?;
            let request = fields.apply(BookRequest::from(current));
            request.validate(today)?;
            let book = ctx.client.update_book(session, id, &request).await?;
            println!("Updated book {}: {} {}", book.id, book.title, book.price.display());
        }
        BookAction::Delete { id } => {
            let id = BookId::new(id);
            ctx.client.delete_book(session, id).await?;
            println!("Deleted book {id}");
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_analytics(analytics: &SalesAnalytics) {
    println!("Revenue:        {}", money(analytics.total_revenue));
    println!("Orders:         {:>10}", analytics.total_orders);
    println!("Books sold:     {:>10}", analytics.total_books_sold);
    println!("Average order:  {}", money(analytics.average_order_value));

    if !analytics.monthly_sales.is_empty() {
        println!();
        println!("Monthly sales");
        for month in &analytics.monthly_sales {
            println!(
                "  {:<10} {} {:>6} orders {:>6} books",
                month.month,
                money(month.revenue),
                month.order_count,
                month.books_sold
            );
        }
    }
    if !analytics.top_selling_books.is_empty() {
        println!();
        println!("Top sellers");
        for book in &analytics.top_selling_books {
            println!(
                "  {:<40} {:>6} sold {}",
                book.title,
                book.quantity_sold,
                money(book.revenue)
            );
        }
    }
    if !analytics.category_sales.is_empty() {
        println!();
        println!("By category");
        for category in &analytics.category_sales {
            println!(
                "  {:<24} {:>6} books {}",
                category.category,
                category.books_sold,
                money(category.revenue)
            );
        }
    }
    if !analytics.order_status_distribution.is_empty() {
        println!();
        println!("Order status");
        for (status, count) in &analytics.order_status_distribution {
            println!("  {status:<12} {count:>6}");
        }
    }
}
