//! Integration test support for the Bookshop storefront client.
//!
//! [`MockBackend`] is an in-process stand-in for the Bookshop REST backend,
//! served by axum on `127.0.0.1:0`. It keeps carts and orders in memory,
//! records every request it sees, and can be told to fail the next request
//! so tests exercise the client's real HTTP path.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bookshop-integration-tests
//! ```
//!
//! # Seed data
//!
//! - `alice` (user, token [`ALICE_TOKEN`]) and `admin` (admin, token [`ADMIN_TOKEN`])
//! - Books 1 (Dune, 5 in stock), 2 (Neuromancer, out of stock), 3 (Emma, 100 in stock)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bookshop_core::{BookId, CartId, CartItemId, OrderId, OrderItemId, OrderStatus, Price, UserId};
use bookshop_storefront::api::{
    Book, BookRequest, CartItemRequest, CartItemResponse, CartResponse, CategorySales,
    OrderItemResponse, OrderRequest, OrderResponse, OrderedBook, Page, QuantityRequest, RoleEntry,
    SalesAnalytics, TopSellingBook, UserProfile,
};
use bookshop_storefront::{ApiClient, SessionHandle, StorefrontConfig};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

pub const ALICE_ID: UserId = UserId::new(1);
pub const ALICE_USERNAME: &str = "alice";
pub const ALICE_PASSWORD: &str = "Wonderland1!";
pub const ALICE_TOKEN: &str = "alice-token";

pub const ADMIN_ID: UserId = UserId::new(2);
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "Sup3rSecret!";
pub const ADMIN_TOKEN: &str = "admin-token";

pub const DUNE: BookId = BookId::new(1);
pub const NEUROMANCER: BookId = BookId::new(2);
pub const EMMA: BookId = BookId::new(3);

/// A request as the mock backend received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

// =============================================================================
// State
// =============================================================================

struct Account {
    profile: UserProfile,
    password: String,
    token: String,
}

struct Data {
    accounts: Vec<Account>,
    books: Vec<Book>,
    carts: HashMap<UserId, Vec<CartItemResponse>>,
    orders: Vec<OrderResponse>,
    next_order_id: i64,
    requests: Vec<RecordedRequest>,
    failures: VecDeque<(StatusCode, String)>,
    bare_order_list: bool,
    profile_updates: Vec<Value>,
}

impl Data {
    fn seeded() -> Self {
        let account = |id: UserId, username: &str, password: &str, token: &str, role: &str| {
            Account {
                profile: UserProfile {
                    id,
                    username: username.to_string(),
                    email: Some(format!("{username}@example.com")),
                    first_name: Some(capitalize(username)),
                    last_name: Some("Liddell".to_string()),
                    address: Some("12 Rabbit Hole Lane".to_string()),
                    phone_number: Some("5551234567".to_string()),
                    roles: vec![RoleEntry::Name(role.to_string())],
                },
                password: password.to_string(),
                token: token.to_string(),
            }
        };

        Self {
            accounts: vec![
                account(ALICE_ID, ALICE_USERNAME, ALICE_PASSWORD, ALICE_TOKEN, "ROLE_USER"),
                account(ADMIN_ID, ADMIN_USERNAME, ADMIN_PASSWORD, ADMIN_TOKEN, "ROLE_ADMIN"),
            ],
            books: vec![
                seed_book(DUNE, "Dune", "Frank Herbert", 1099, 5, "Science Fiction"),
                seed_book(NEUROMANCER, "Neuromancer", "William Gibson", 1250, 0, "Science Fiction"),
                seed_book(EMMA, "Emma", "Jane Austen", 800, 100, "Classics"),
            ],
            carts: HashMap::new(),
            orders: Vec::new(),
            next_order_id: 1,
            requests: Vec::new(),
            failures: VecDeque::new(),
            bare_order_list: false,
            profile_updates: Vec::new(),
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<&Account, Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        token
            .and_then(|token| self.accounts.iter().find(|a| a.token == token))
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Full authentication is required"))
    }

    fn book(&self, id: BookId) -> Result<&Book, Response> {
        self.books
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| reject(StatusCode::NOT_FOUND, &format!("Book not found with id: {id}")))
    }

    fn cart(&self, user: UserId) -> CartResponse {
        let items = self.carts.get(&user).cloned().unwrap_or_default();
        let total: Price = items.iter().map(|i| i.price * i.quantity).sum();
        CartResponse {
            id: Some(CartId::new(user.as_i64())),
            items,
            total_price: Some(total),
        }
    }
}

fn seed_book(
    id: BookId,
    title: &str,
    author: &str,
    cents: i64,
    stock: i64,
    category: &str,
) -> Book {
    Book {
        id,
        title: title.to_string(),
        author: author.to_string(),
        description: String::new(),
        price: Price::from_cents(cents),
        image_url: None,
        stock_quantity: stock,
        isbn: None,
        category: Some(category.to_string()),
        publish_year: None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn cart_item(book: &Book, quantity: u32) -> CartItemResponse {
    CartItemResponse {
        id: Some(CartItemId::new(book.id.as_i64())),
        book_id: book.id,
        title: book.title.clone(),
        author: book.author.clone(),
        price: book.price,
        image_url: book.image_url.clone(),
        quantity,
        subtotal: Some(book.price * quantity),
    }
}

fn paginate(orders: Vec<OrderResponse>, query: &HashMap<String, String>) -> Page<OrderResponse> {
    let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let size: u32 = query
        .get("size")
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(10);
    let total = orders.len() as u64;
    let total_pages = u32::try_from(total.div_ceil(u64::from(size))).unwrap_or(u32::MAX);
    let content: Vec<_> = orders
        .into_iter()
        .skip((page * size) as usize)
        .take(size as usize)
        .collect();
    Page {
        empty: content.is_empty(),
        content,
        total_elements: total,
        total_pages,
        size,
        number: page,
        first: page == 0,
        last: page + 1 >= total_pages,
    }
}

fn matches_filter(order: &OrderResponse, query: &HashMap<String, String>) -> bool {
    let status_ok = query
        .get("status")
        .and_then(|s| s.parse::<OrderStatus>().ok())
        .is_none_or(|status| order.status == status);
    let min_ok = query
        .get("minAmount")
        .and_then(|a| a.parse::<Decimal>().ok())
        .is_none_or(|min| order.total_amount.amount() >= min);
    let max_ok = query
        .get("maxAmount")
        .and_then(|a| a.parse::<Decimal>().ok())
        .is_none_or(|max| order.total_amount.amount() <= max);
    status_ok && min_ok && max_ok
}

#[derive(Clone)]
struct Mock(Arc<Mutex<Data>>);

impl Mock {
    fn data(&self) -> MutexGuard<'_, Data> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// MockBackend
// =============================================================================

/// A running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    mock: Mock,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    /// Bind to an ephemeral port and start serving the seed data.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");
        let mock = Mock(Arc::new(Mutex::new(Data::seeded())));
        let app = router(mock.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, mock, server }
    }

    /// Base URL of the backend.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Invalid mock backend URL")
    }

    /// Client configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig {
            api_url: self.url(),
            ..StorefrontConfig::default()
        }
    }

    /// A client with its own, signed-out session.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config(), SessionHandle::new())
    }

    /// Answer the next request with `status` and a raw `body`.
    pub fn fail_next(&self, status: u16, body: impl Into<String>) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.mock.data().failures.push_back((status, body.into()));
    }

    /// Answer get-orders with a bare list instead of a page envelope.
    pub fn set_bare_order_list(&self, bare: bool) {
        self.mock.data().bare_order_list = bare;
    }

    /// Move an order to `SHIPPED`, as the warehouse would.
    pub fn ship_order(&self, id: OrderId) {
        if let Some(order) = self.mock.data().orders.iter_mut().find(|o| o.id == id) {
            order.status = OrderStatus::Shipped;
        }
    }

    /// Revoke a token, as if it had expired.
    pub fn revoke_token(&self, token: &str) {
        for account in &mut self.mock.data().accounts {
            if account.token == token {
                account.token = format!("revoked-{token}");
            }
        }
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.mock.data().requests.clone()
    }

    /// Number of requests whose path starts with `prefix`.
    #[must_use]
    pub fn request_count(&self, prefix: &str) -> usize {
        self.mock
            .data()
            .requests
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }

    /// Bodies of every profile update, as sent.
    #[must_use]
    pub fn profile_updates(&self) -> Vec<Value> {
        self.mock.data().profile_updates.clone()
    }

    /// The server-side cart of `user`.
    #[must_use]
    pub fn cart_items(&self, user: UserId) -> Vec<CartItemResponse> {
        self.mock.data().carts.get(&user).cloned().unwrap_or_default()
    }

    /// Every order placed so far.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderResponse> {
        self.mock.data().orders.clone()
    }

    /// The stored catalog entry of a book, if it exists.
    #[must_use]
    pub fn book(&self, id: BookId) -> Option<Book> {
        self.mock.data().books.iter().find(|b| b.id == id).cloned()
    }

    /// Remaining stock of a book.
    #[must_use]
    pub fn stock(&self, id: BookId) -> i64 {
        self.mock
            .data()
            .books
            .iter()
            .find(|b| b.id == id)
            .map_or(0, |b| b.stock_quantity)
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(mock: Mock) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/user/info", get(user_info))
        .route("/user/update", put(update_user))
        .route("/books/all", get(all_books))
        .route("/books/search", get(search_books))
        .route("/books", post(create_book))
        .route("/books/{id}", get(book).put(update_book).delete(delete_book))
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/item", post(add_item))
        .route("/cart/item/{book_id}", put(set_item).delete(remove_item))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/confirm-received", post(confirm_received))
        .route("/admin/orders", get(admin_orders))
        .route("/admin/orders/{id}/status", put(admin_update_status))
        .route("/admin/analytics/sales", get(admin_analytics))
        .layer(middleware::from_fn_with_state(mock.clone(), record))
        .with_state(mock)
}

/// Log the request, then either inject a queued failure or pass it on.
async fn record(State(mock): State<Mock>, request: Request, next: Next) -> Response {
    let recorded = {
        let header_value = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            authorization: header_value(header::AUTHORIZATION.as_str()),
            request_id: header_value("x-request-id"),
        }
    };
    let failure = {
        let mut data = mock.data();
        data.requests.push(recorded);
        data.failures.pop_front()
    };
    match failure {
        Some((status, body)) => (status, body).into_response(),
        None => next.run(request).await,
    }
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn login(State(mock): State<Mock>, Json(credentials): Json<Credentials>) -> Response {
    let data = mock.data();
    let Some(account) = data
        .accounts
        .iter()
        .find(|a| a.profile.username == credentials.username && a.password == credentials.password)
    else {
        return reject(StatusCode::UNAUTHORIZED, "Invalid username or password");
    };
    Json(json!({
        "token": account.token,
        "type": "Bearer",
        "id": account.profile.id,
        "username": account.profile.username,
        "email": account.profile.email,
        "roles": account.profile.roles,
    }))
    .into_response()
}

async fn signup(State(mock): State<Mock>, Json(body): Json<Value>) -> Response {
    let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
    let (Some(username), Some(password)) = (field("username"), field("password")) else {
        return reject(StatusCode::BAD_REQUEST, "Username and password are required");
    };
    let mut data = mock.data();
    if data.accounts.iter().any(|a| a.profile.username == username) {
        return reject(StatusCode::BAD_REQUEST, "Error: Username is already taken!");
    }
    let id = UserId::new(i64::try_from(data.accounts.len()).unwrap_or(i64::MAX) + 1);
    data.accounts.push(Account {
        profile: UserProfile {
            id,
            username: username.clone(),
            email: field("email"),
            first_name: field("firstName"),
            last_name: field("lastName"),
            address: field("address"),
            phone_number: field("phoneNumber"),
            roles: vec![RoleEntry::Name("ROLE_USER".to_string())],
        },
        password,
        token: format!("{username}-token"),
    });
    Json(json!({ "message": "User registered successfully!" })).into_response()
}

async fn user_info(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let data = mock.data();
    match data.authenticate(&headers) {
        Ok(account) => Json(account.profile.clone()).into_response(),
        Err(response) => response,
    }
}

async fn update_user(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut data = mock.data();
    let id = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    data.profile_updates.push(body.clone());
    let Some(account) = data.accounts.iter_mut().find(|a| a.profile.id == id) else {
        return reject(StatusCode::NOT_FOUND, "User not found");
    };
    let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
    let profile = &mut account.profile;
    for (slot, name) in [
        (&mut profile.email, "email"),
        (&mut profile.first_name, "firstName"),
        (&mut profile.last_name, "lastName"),
        (&mut profile.address, "address"),
        (&mut profile.phone_number, "phoneNumber"),
    ] {
        if let Some(value) = field(name) {
            *slot = Some(value);
        }
    }
    Json(json!({ "message": "User updated successfully" })).into_response()
}

async fn all_books(State(mock): State<Mock>) -> Response {
    Json(mock.data().books.clone()).into_response()
}

async fn book(State(mock): State<Mock>, Path(id): Path<i64>) -> Response {
    let data = mock.data();
    match data.book(BookId::new(id)) {
        Ok(book) => Json(book.clone()).into_response(),
        Err(response) => response,
    }
}

fn book_from_request(id: BookId, request: BookRequest) -> Book {
    Book {
        id,
        title: request.title,
        author: request.author,
        description: request.description,
        price: request.price,
        image_url: request.image_url,
        stock_quantity: request.stock_quantity,
        isbn: request.isbn,
        category: request.category,
        publish_year: request.publish_year,
    }
}

async fn create_book(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(request): Json<BookRequest>,
) -> Response {
    let mut data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }
    let next = data.books.iter().map(|b| b.id.as_i64()).max().unwrap_or(0) + 1;
    let book = book_from_request(BookId::new(next), request);
    data.books.push(book.clone());
    (StatusCode::CREATED, Json(book)).into_response()
}

async fn update_book(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<BookRequest>,
) -> Response {
    let mut data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }
    let id = BookId::new(id);
    let Some(slot) = data.books.iter_mut().find(|b| b.id == id) else {
        return reject(StatusCode::NOT_FOUND, &format!("Book not found with id: {id}"));
    };
    *slot = book_from_request(id, request);
    Json(slot.clone()).into_response()
}

async fn delete_book(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }
    let id = BookId::new(id);
    let before = data.books.len();
    data.books.retain(|b| b.id != id);
    if data.books.len() == before {
        return reject(StatusCode::NOT_FOUND, &format!("Book not found with id: {id}"));
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn search_books(
    State(mock): State<Mock>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let contains = |haystack: &str, key: &str| {
        query
            .get(key)
            .is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
    };
    let books: Vec<Book> = mock
        .data()
        .books
        .iter()
        .filter(|b| {
            contains(&b.title, "title")
                && contains(&b.author, "author")
                && contains(b.category.as_deref().unwrap_or_default(), "category")
        })
        .cloned()
        .collect();
    Json(books).into_response()
}

async fn get_cart(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let data = mock.data();
    match data.authenticate(&headers) {
        Ok(account) => Json(data.cart(account.profile.id)).into_response(),
        Err(response) => response,
    }
}

async fn add_item(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(request): Json<CartItemRequest>,
) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let book = match data.book(request.book_id) {
        Ok(book) => book.clone(),
        Err(response) => return response,
    };
    let items = data.carts.entry(user).or_default();
    let current = items
        .iter()
        .find(|i| i.book_id == book.id)
        .map_or(0, |i| i.quantity);
    let wanted = current + request.quantity;
    if i64::from(wanted) > book.stock_quantity {
        return reject(StatusCode::BAD_REQUEST, "Not enough stock available");
    }
    match items.iter_mut().find(|i| i.book_id == book.id) {
        Some(item) => *item = cart_item(&book, wanted),
        None => items.push(cart_item(&book, wanted)),
    }
    Json(data.cart(user)).into_response()
}

async fn set_item(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
    Json(request): Json<QuantityRequest>,
) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let book = match data.book(BookId::new(book_id)) {
        Ok(book) => book.clone(),
        Err(response) => return response,
    };
    if i64::from(request.quantity) > book.stock_quantity {
        return reject(StatusCode::BAD_REQUEST, "Not enough stock available");
    }
    let items = data.carts.entry(user).or_default();
    let Some(item) = items.iter_mut().find(|i| i.book_id == book.id) else {
        return reject(StatusCode::NOT_FOUND, "Item not found in cart");
    };
    *item = cart_item(&book, request.quantity);
    Json(data.cart(user)).into_response()
}

async fn remove_item(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let book_id = BookId::new(book_id);
    data.carts.entry(user).or_default().retain(|i| i.book_id != book_id);
    Json(data.cart(user)).into_response()
}

async fn clear_cart(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    data.carts.remove(&user);
    StatusCode::OK.into_response()
}

async fn create_order(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(request): Json<OrderRequest>,
) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let items = data.carts.get(&user).cloned().unwrap_or_default();
    if items.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Cart is empty");
    }
    for item in &items {
        let in_stock = data.book(item.book_id).map_or(0, |b| b.stock_quantity);
        if i64::from(item.quantity) > in_stock {
            return reject(
                StatusCode::BAD_REQUEST,
                &format!("Insufficient stock for book: {}", item.title),
            );
        }
    }
    for item in &items {
        if let Some(book) = data.books.iter_mut().find(|b| b.id == item.book_id) {
            book.stock_quantity -= i64::from(item.quantity);
        }
    }

    let id = OrderId::new(data.next_order_id);
    data.next_order_id += 1;
    let order = OrderResponse {
        id,
        user_id: Some(user),
        order_date: Some("2024-05-01T10:00:00".to_string()),
        total_amount: items.iter().map(|i| i.price * i.quantity).sum(),
        status: OrderStatus::Pending,
        items: items
            .iter()
            .map(|i| OrderItemResponse {
                id: Some(OrderItemId::new(i.book_id.as_i64())),
                book: OrderedBook {
                    id: i.book_id,
                    title: i.title.clone(),
                    author: i.author.clone(),
                    price: i.price,
                },
                quantity: i.quantity,
                price: i.price,
            })
            .collect(),
        shipping_info: Some(request.shipping_info),
        payment_method: Some(request.payment_method.to_string()),
    };
    data.orders.push(order.clone());
    data.carts.remove(&user);
    Json(order).into_response()
}

async fn list_orders(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let orders: Vec<OrderResponse> = data
        .orders
        .iter()
        .rev()
        .filter(|o| o.user_id == Some(user) && matches_filter(o, &query))
        .cloned()
        .collect();
    if data.bare_order_list {
        return Json(orders).into_response();
    }
    Json(paginate(orders, &query)).into_response()
}

async fn get_order(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    data.orders
        .iter()
        .find(|o| o.id == OrderId::new(id) && o.user_id == Some(user))
        .map_or_else(
            || reject(StatusCode::NOT_FOUND, "Order not found"),
            |o| Json(o.clone()).into_response(),
        )
}

async fn confirm_received(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut data = mock.data();
    let user = match data.authenticate(&headers) {
        Ok(account) => account.profile.id,
        Err(response) => return response,
    };
    let Some(order) = data
        .orders
        .iter_mut()
        .find(|o| o.id == OrderId::new(id) && o.user_id == Some(user))
    else {
        return reject(StatusCode::NOT_FOUND, "Order not found");
    };
    if order.status != OrderStatus::Shipped {
        return reject(
            StatusCode::BAD_REQUEST,
            "Order must be in SHIPPED status to confirm receipt",
        );
    }
    order.status = OrderStatus::Delivered;
    Json(order.clone()).into_response()
}

fn require_admin(data: &Data, headers: &HeaderMap) -> Result<(), Response> {
    let account = data.authenticate(headers)?;
    if account
        .profile
        .roles
        .iter()
        .any(|r| r.role() == Some(bookshop_core::Role::Admin))
    {
        Ok(())
    } else {
        Err(reject(StatusCode::FORBIDDEN, "Access denied"))
    }
}

async fn admin_orders(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }
    let user = query.get("userId").and_then(|u| u.parse().ok()).map(UserId::new);
    let orders: Vec<OrderResponse> = data
        .orders
        .iter()
        .rev()
        .filter(|o| user.is_none_or(|u| o.user_id == Some(u)) && matches_filter(o, &query))
        .cloned()
        .collect();
    Json(paginate(orders, &query)).into_response()
}

async fn admin_update_status(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }
    let Some(status) = query.get("status").and_then(|s| s.parse::<OrderStatus>().ok()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid status");
    };
    let Some(order) = data.orders.iter_mut().find(|o| o.id == OrderId::new(id)) else {
        return reject(StatusCode::NOT_FOUND, "Order not found");
    };
    order.status = status;
    Json(order.clone()).into_response()
}

async fn admin_analytics(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let data = mock.data();
    if let Err(response) = require_admin(&data, &headers) {
        return response;
    }

    let total_revenue: Price = data.orders.iter().map(|o| o.total_amount).sum();
    let total_orders = data.orders.len() as u64;
    let lines = || data.orders.iter().flat_map(|o| o.items.iter());
    let total_books_sold: u64 = lines().map(|i| u64::from(i.quantity)).sum();

    let mut top: BTreeMap<BookId, TopSellingBook> = BTreeMap::new();
    let mut categories: BTreeMap<String, CategorySales> = BTreeMap::new();
    for item in lines() {
        let entry = top.entry(item.book.id).or_insert_with(|| TopSellingBook {
            book_id: item.book.id,
            title: item.book.title.clone(),
            author: item.book.author.clone(),
            quantity_sold: 0,
            revenue: Price::ZERO,
        });
        entry.quantity_sold += u64::from(item.quantity);
        entry.revenue = entry.revenue + item.price * item.quantity;

        let category = data
            .book(item.book.id)
            .ok()
            .and_then(|b| b.category.clone())
            .unwrap_or_else(|| "Uncategorized".to_string());
        let entry = categories
            .entry(category.clone())
            .or_insert_with(|| CategorySales {
                category,
                books_sold: 0,
                revenue: Price::ZERO,
                order_count: 0,
            });
        entry.books_sold += u64::from(item.quantity);
        entry.revenue = entry.revenue + item.price * item.quantity;
        entry.order_count += 1;
    }
    let mut top_selling_books: Vec<_> = top.into_values().collect();
    top_selling_books.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));

    let mut order_status_distribution = BTreeMap::new();
    for order in &data.orders {
        *order_status_distribution
            .entry(order.status.as_str().to_string())
            .or_insert(0) += 1;
    }

    let average_order_value = if total_orders == 0 {
        Price::ZERO
    } else {
        Price::new(total_revenue.amount() / Decimal::from(total_orders))
    };

    Json(SalesAnalytics {
        total_revenue,
        total_orders,
        total_books_sold,
        average_order_value,
        monthly_sales: Vec::new(),
        top_selling_books,
        category_sales: categories.into_values().collect(),
        order_status_distribution,
    })
    .into_response()
}
