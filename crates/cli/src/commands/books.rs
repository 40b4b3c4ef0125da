//! Catalog commands.
//!
//! # Usage
//!
//! ```bash
//! bookshop books list
//! bookshop books show 42
//! bookshop books search --title dune --category "Science Fiction"
//! ```

use bookshop_core::BookId;
use bookshop_storefront::api::{Book, BookSearch};
use clap::Subcommand;

use super::{CommandError, Context, money};

#[derive(Subcommand)]
pub enum BooksAction {
    /// List every book
    List,
    /// Show one book
    Show { id: i64 },
    /// Search by title, author or category
    Search {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },
}

pub async fn run(ctx: &Context, action: BooksAction) -> Result<(), CommandError> {
    match action {
        BooksAction::List => print_list(&ctx.client.get_all_books().await?),
        BooksAction::Show { id } => print_book(&ctx.client.get_book(BookId::new(id)).await?),
        BooksAction::Search {
            title,
            author,
            category,
        } => {
            let search = BookSearch {
                title,
                author,
                category,
            };
            print_list(&ctx.client.search_books(&search).await?);
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_list(books: &[Book]) {
    if books.is_empty() {
        println!("No books found.");
        return;
    }
    for book in books {
        println!(
            "{:>5}  {} {:<40} {}",
            book.id,
            money(book.price),
            book.title,
            book.author
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_book(book: &Book) {
    println!("{} by {}", book.title, book.author);
    println!("Price:    {}", book.price.display());
    match book.stock() {
        0 => println!("Stock:    out of stock"),
        n => println!("Stock:    {n}"),
    }
    if let Some(category) = &book.category {
        println!("Category: {category}");
    }
    if let Some(isbn) = &book.isbn {
        println!("ISBN:     {isbn}");
    }
    if let Some(year) = book.publish_year {
        println!("Year:     {year}");
    }
    if !book.description.is_empty() {
        println!();
        println!("{}", book.description);
    }
}
