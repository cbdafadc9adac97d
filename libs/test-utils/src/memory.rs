use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use customer_errors::CustomerError;
use customer_models::{CreateCustomerCommand, Customer, UpdateCustomerCommand};
use database_traits::dao::{Change, FindByDao, GenericDao};
use order_errors::OrderError;
use order_models::{ByCustomer, CreateOrderCommand, Order, UpdateOrderCommand};
use product_errors::ProductError;
use product_models::{CreateProductCommand, Product, UpdateProductCommand};

/// A row type [`MemoryDao`] knows how to create and patch.
pub trait MemoryRecord: Clone + Send + Sync + 'static {
    type Create: Send + Sync + 'static;
    type Update: Send + Sync + 'static;
    type Error: Send + 'static;

    fn id(&self) -> i64;
    fn create(id: i64, req: Self::Create, now: DateTime<Utc>) -> Self;
    fn apply(&mut self, req: Self::Update, now: DateTime<Utc>);
    /// Error returned while the store is switched to failing.
    fn unavailable() -> Self::Error;
}

/// In-memory store with read counting, optional latency and failure
/// injection. Ids are assigned from 1 like a serial column.
pub struct MemoryDao<R> {
    rows: Mutex<BTreeMap<i64, R>>,
    next_id: AtomicI64,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing: AtomicBool,
    latency: Duration,
}

impl<R: MemoryRecord> Default for MemoryDao<R> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            latency: Duration::ZERO,
        }
    }
}

impl<R: MemoryRecord> MemoryDao<R> {
    pub fn new() -> Self { Self::default() }

    /// Every read and write sleeps for `latency` first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Inserts rows without touching the counters.
    pub fn seed(&self, reqs: impl IntoIterator<Item = R::Create>) -> Vec<R> {
        let now = Utc::now();
        let mut rows = self.rows();
        reqs.into_iter()
            .map(|req| {
                let record =
                    R::create(self.next_id.fetch_add(1, Ordering::SeqCst), req, now);
                rows.insert(record.id(), record.clone());
                record
            })
            .collect()
    }

    pub fn reads(&self) -> usize { self.reads.load(Ordering::SeqCst) }

    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize { self.rows().len() }

    pub fn is_empty(&self) -> bool { self.rows().is_empty() }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<i64, R>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn touch(&self, counter: &AtomicUsize) -> Result<(), R::Error> {
        counter.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(R::unavailable());
        }
        Ok(())
    }

    fn matching(&self, keep: impl Fn(&R) -> bool) -> Vec<R> {
        self.rows().values().filter(|r| keep(r)).cloned().collect()
    }
}

#[async_trait]
impl<R: MemoryRecord> GenericDao for MemoryDao<R> {
    type CreateRequest = R::Create;
    type Error = R::Error;
    type ID = i64;
    type Model = R;
    type UpdateRequest = R::Update;

    async fn find_by_id(&self, id: i64) -> Result<Option<R>, R::Error> {
        self.touch(&self.reads).await?;
        Ok(self.rows().get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<R>, R::Error> {
        self.touch(&self.reads).await?;
        Ok(self.matching(|_| true))
    }

    async fn page(&self, page: u32, size: u32) -> Result<Vec<R>, R::Error> {
        self.touch(&self.reads).await?;
        let skip = database_traits::page_offset(page, size) as usize;
        Ok(self
            .rows()
            .values()
            .skip(skip)
            .take(size as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, req: R::Create) -> Result<R, R::Error> {
        self.touch(&self.writes).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = R::create(id, req, Utc::now());
        self.rows().insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self, id: i64, req: R::Update,
    ) -> Result<Option<Change<R>>, R::Error> {
        self.touch(&self.writes).await?;
        let mut rows = self.rows();
        Ok(rows.get_mut(&id).map(|record| {
            let before = record.clone();
            record.apply(req, Utc::now());
            Change {
                before,
                after: record.clone(),
            }
        }))
    }

    async fn delete(&self, id: i64) -> Result<Option<R>, R::Error> {
        self.touch(&self.writes).await?;
        Ok(self.rows().remove(&id))
    }
}

#[async_trait]
impl FindByDao<ByCustomer> for MemoryDao<Order> {
    async fn find_by(&self, filter: ByCustomer) -> Result<Vec<Order>, OrderError> {
        self.touch(&self.reads).await?;
        let ByCustomer(customer_id) = filter;
        Ok(self.matching(|order| order.customer_id == customer_id))
    }
}

impl MemoryRecord for Product {
    type Create = CreateProductCommand;
    type Error = ProductError;
    type Update = UpdateProductCommand;

    fn id(&self) -> i64 { self.id }

    fn create(id: i64, req: CreateProductCommand, now: DateTime<Utc>) -> Self {
        Product {
            id,
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            stock: req.stock,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, req: UpdateProductCommand, now: DateTime<Utc>) {
        if let Some(name) = req.name {
            self.name = name;
        }
        if let Some(description) = req.description {
            self.description = description;
        }
        if let Some(price_cents) = req.price_cents {
            self.price_cents = price_cents;
        }
        if let Some(stock) = req.stock {
            self.stock = stock;
        }
        self.updated_at = now;
    }

    fn unavailable() -> ProductError {
        ProductError::InternalError("product store unavailable".into())
    }
}

impl MemoryRecord for Customer {
    type Create = CreateCustomerCommand;
    type Error = CustomerError;
    type Update = UpdateCustomerCommand;

    fn id(&self) -> i64 { self.id }

    fn create(id: i64, req: CreateCustomerCommand, now: DateTime<Utc>) -> Self {
        Customer {
            id,
            name: req.name,
            email: req.email,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, req: UpdateCustomerCommand, now: DateTime<Utc>) {
        if let Some(name) = req.name {
            self.name = name;
        }
        if let Some(email) = req.email {
            self.email = email;
        }
        self.updated_at = now;
    }

    fn unavailable() -> CustomerError {
        CustomerError::InternalError("customer store unavailable".into())
    }
}

impl MemoryRecord for Order {
    type Create = CreateOrderCommand;
    type Error = OrderError;
    type Update = UpdateOrderCommand;

    fn id(&self) -> i64 { self.id }

    fn create(id: i64, req: CreateOrderCommand, now: DateTime<Utc>) -> Self {
        Order {
            id,
            customer_id: req.customer_id,
            status: req.status,
            total_cents: req.total_cents,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, req: UpdateOrderCommand, now: DateTime<Utc>) {
        if let Some(customer_id) = req.customer_id {
            self.customer_id = customer_id;
        }
        if let Some(status) = req.status {
            self.status = status;
        }
        if let Some(total_cents) = req.total_cents {
            self.total_cents = total_cents;
        }
        self.updated_at = now;
    }

    fn unavailable() -> OrderError {
        OrderError::InternalError("order store unavailable".into())
    }
}
