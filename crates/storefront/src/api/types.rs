//! Wire types for the bookshop REST backend.
//!
//! These mirror the backend's JSON contracts (camelCase field names). Numeric
//! amounts arrive as JSON numbers and are decoded into exact decimals.

use std::collections::BTreeMap;

use bookshop_core::{
    BookId, CartId, CartItemId, OrderId, OrderItemId, OrderStatus, PaymentMethod, Price, Role,
    UserId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationErrors;
use crate::validation;

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Catalog
// =============================================================================

/// A book in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_quantity: i64,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub publish_year: Option<i32>,
}

impl Book {
    /// Stock as an unsigned bound for quantity validation.
    #[must_use]
    pub fn stock(&self) -> u32 {
        u32::try_from(self.stock_quantity.max(0)).unwrap_or(u32::MAX)
    }
}

/// Body of admin create-book and update-book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub stock_quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
}

impl BookRequest {
    /// Check every field the admin form checks. An empty ISBN is allowed.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check("title", validation::book_title(&self.title));
        errors.check("author", validation::name(&self.author, "Author"));
        errors.check(
            "description",
            validation::required(&self.description, "Description"),
        );
        errors.check("price", validation::price(self.price.amount()));
        errors.check("stockQuantity", validation::stock(self.stock_quantity));
        errors.check(
            "category",
            validation::required(self.category.as_deref().unwrap_or_default(), "Category"),
        );
        if let Some(isbn) = self.isbn.as_deref().filter(|i| !i.trim().is_empty()) {
            errors.check("isbn", validation::isbn(isbn));
        }
        if let Some(year) = self.publish_year {
            errors.check("publishYear", validation::publish_year(year, today));
        }
        errors.into_result()
    }
}

impl From<Book> for BookRequest {
    fn from(book: Book) -> Self {
        Self {
            title: book.title,
            author: book.author,
            description: book.description,
            price: book.price,
            image_url: book.image_url,
            stock_quantity: book.stock_quantity,
            isbn: book.isbn,
            category: book.category,
            publish_year: book.publish_year,
        }
    }
}

/// Catalog search criteria. Empty criteria are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BookSearch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
}

impl BookSearch {
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("category", &self.category),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line in the server-held cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    #[serde(default)]
    pub id: Option<CartItemId>,
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub subtotal: Option<Price>,
}

/// The authoritative cart returned by every cart operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<CartItemResponse>,
    #[serde(default)]
    pub total_price: Option<Price>,
}

/// Body of add-item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub book_id: BookId,
    pub quantity: u32,
}

/// Body of set-item-quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// Shipping details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub email: String,
    pub phone: String,
}

impl ShippingInfo {
    /// `(wire field name, value)` pairs in form order.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
            ("email", &self.email),
            ("phone", &self.phone),
        ]
    }
}

/// Body of create-order. Items and pricing are derived server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
}

/// Book summary embedded in an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: Price,
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    #[serde(default)]
    pub id: Option<OrderItemId>,
    pub book: OrderedBook,
    pub quantity: u32,
    pub price: Price,
}

/// An order as reported by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub order_date: Option<String>,
    pub total_amount: Price,
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<OrderItemResponse>,
    #[serde(default)]
    pub shipping_info: Option<ShippingInfo>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Spring-style page envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
    #[serde(default)]
    pub empty: bool,
}

/// get-orders answers with either a page envelope or a bare list.
///
/// Variants are tried in order, so any object carrying `content` is a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderListing {
    Paged(Page<OrderResponse>),
    List(Vec<OrderResponse>),
}

impl OrderListing {
    /// Normalise to a page; a bare list becomes a single page holding everything.
    #[must_use]
    pub fn into_page(self) -> Page<OrderResponse> {
        match self {
            Self::Paged(page) => page,
            Self::List(content) => {
                let len = content.len();
                Page {
                    total_elements: len as u64,
                    total_pages: u32::from(len > 0),
                    size: u32::try_from(len).unwrap_or(u32::MAX),
                    number: 0,
                    first: true,
                    last: true,
                    empty: len == 0,
                    content,
                }
            }
        }
    }
}

/// Order-history filter. Unset (and zero-amount) criteria are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl OrderFilter {
    /// Whether no criteria are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_query().is_empty()
    }

    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(date) = self.start_date {
            query.push(("startDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.end_date {
            query.push(("endDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(amount) = self.min_amount.filter(|a| !a.is_zero()) {
            query.push(("minAmount", amount.normalize().to_string()));
        }
        if let Some(amount) = self.max_amount.filter(|a| !a.is_zero()) {
            query.push(("maxAmount", amount.normalize().to_string()));
        }
        query
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, size: 10 }
    }
}

impl Pagination {
    pub(crate) fn to_query(self) -> [(&'static str, String); 2] {
        [("page", self.page.to_string()), ("size", self.size.to_string())]
    }
}

// =============================================================================
// Auth & profile
// =============================================================================

/// Body of login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A role as the backend reports it: a bare name or `{ "name": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleEntry {
    Name(String),
    Object { name: String },
}

impl RoleEntry {
    /// The recognised role, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Name(name) | Self::Object { name } => name.parse().ok(),
        }
    }
}

/// Response of login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<RoleEntry>,
}

/// Body of sign-up.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// The signed-in user's stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<RoleEntry>,
}

/// Partial profile update; unset fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

// =============================================================================
// Admin analytics
// =============================================================================

/// Revenue and volume for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    pub month: String,
    pub revenue: Price,
    pub order_count: u64,
    pub books_sold: u64,
}

/// A best-selling title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSellingBook {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub quantity_sold: u64,
    pub revenue: Price,
}

/// Sales for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    pub category: String,
    pub books_sold: u64,
    pub revenue: Price,
    pub order_count: u64,
}

/// Dashboard analytics computed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalytics {
    pub total_revenue: Price,
    pub total_orders: u64,
    pub total_books_sold: u64,
    pub average_order_value: Price,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_sales: Vec<MonthlySales>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_selling_books: Vec<TopSellingBook>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_sales: Vec<CategorySales>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_status_distribution: BTreeMap<String, u64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dune_request() -> BookRequest {
        BookRequest {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: "Desert planet".to_string(),
            price: Price::from_cents(1099),
            stock_quantity: 5,
            category: Some("Science Fiction".to_string()),
            ..BookRequest::default()
        }
    }

    #[test]
    fn test_book_request_wire_shape_omits_unset_fields() {
        let json = serde_json::to_value(dune_request()).unwrap();
        assert_eq!(json["stockQuantity"], 5);
        assert_eq!(json["category"], "Science Fiction");
        assert!(json.get("isbn").is_none());
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_book_request_validation() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert!(dune_request().validate(today).is_ok());

        let request = BookRequest {
            title: " ".to_string(),
            stock_quantity: -1,
            isbn: Some("123".to_string()),
            publish_year: Some(2100),
            category: None,
            ..dune_request()
        };
        let errors = request.validate(today).unwrap_err();
        assert_eq!(errors.get("title"), Some("Book title is required"));
        assert_eq!(errors.get("category"), Some("Category is required"));
        assert!(errors.get("stockQuantity").is_some());
        assert!(errors.get("isbn").is_some());
        assert!(errors.get("publishYear").is_some());
        assert_eq!(errors.get("author"), None);
    }

    #[test]
    fn test_cart_response_tolerates_null_items() {
        let cart: CartResponse =
            serde_json::from_str(r#"{"id": 1, "items": null, "totalPrice": 0}"#).unwrap();
        assert!(cart.items.is_empty());

        let cart: CartResponse = serde_json::from_str("{}").unwrap();
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_cart_item_accepts_numeric_prices() {
        let item: CartItemResponse = serde_json::from_str(
            r#"{"id": 3, "bookId": 9, "title": "Dune", "author": "Frank Herbert",
                "price": 12.99, "quantity": 2, "subtotal": 25.98}"#,
        )
        .unwrap();
        assert_eq!(item.book_id, BookId::new(9));
        assert_eq!(item.price, Price::from_cents(1299));
        assert_eq!(item.image_url, None);
    }

    #[test]
    fn test_order_listing_branches_on_content() {
        let order = r#"{"id": 1, "totalAmount": 10.5, "status": "SHIPPED"}"#;

        let paged: OrderListing = serde_json::from_str(&format!(
            r#"{{"content": [{order}], "totalElements": 11, "totalPages": 2,
                "size": 10, "number": 1, "first": false, "last": true, "empty": false}}"#
        ))
        .unwrap();
        let page = paged.into_page();
        assert_eq!(page.total_elements, 11);
        assert_eq!(page.number, 1);
        assert_eq!(page.content.len(), 1);

        let bare: OrderListing = serde_json::from_str(&format!("[{order}, {order}]")).unwrap();
        let page = bare.into_page();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.total_pages, 1);
        assert!(page.first && page.last);
    }

    #[test]
    fn test_order_filter_query_omits_unset_values() {
        assert!(OrderFilter::default().is_empty());

        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            end_date: None,
            min_amount: Some(Decimal::ZERO),
            max_amount: Some(Decimal::new(5000, 2)),
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("status", "SHIPPED".to_string()),
                ("startDate", "2024-01-05".to_string()),
                ("maxAmount", "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_book_search_query_skips_blank_terms() {
        let search = BookSearch {
            title: Some("  dune ".to_string()),
            author: Some(String::new()),
            category: None,
        };
        assert_eq!(search.to_query(), vec![("title", "dune".to_string())]);
    }

    #[test]
    fn test_role_entries_in_both_shapes() {
        let jwt: JwtResponse = serde_json::from_str(
            r#"{"token": "t", "type": "Bearer", "id": 4, "username": "ana",
                "roles": ["ROLE_USER", {"name": "ROLE_ADMIN"}, "ROLE_AUDITOR"]}"#,
        )
        .unwrap();
        let roles: Vec<Role> = jwt.roles.iter().filter_map(RoleEntry::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Admin]);
    }

    #[test]
    fn test_order_request_wire_shape() {
        let request = OrderRequest {
            shipping_info: ShippingInfo {
                zip_code: "12345".to_string(),
                ..ShippingInfo::default()
            },
            payment_method: PaymentMethod::Paypal,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["paymentMethod"], "paypal");
        assert_eq!(json["shippingInfo"]["zipCode"], "12345");
        assert!(json.get("items").is_none());
    }
}
