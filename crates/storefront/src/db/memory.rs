//! In-memory implementation of the storage traits.
//!
//! All state sits behind one mutex, so each method is trivially atomic.
//! [`MemoryStore::place_order`](OrderStore::place_order) works on a staged copy
//! and swaps it in only at the end, which gives the same all-or-nothing
//! behaviour as a database transaction. Faults can be injected at each stage
//! of that commit to prove it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use shopline_core::cart::{Cart, CartLine, CartSnapshot, PricedCartLine};
use shopline_core::catalog::{Category, NewCategory, NewProduct, Product};
use shopline_core::checkout::{OrderDraft, StockShortage};
use shopline_core::order::{Order, OrderLine};
use shopline_core::{
    CartId, CartLineId, CategoryId, OrderId, OrderLineId, OrderStatus, ProductId, Quantity,
    UserId,
};

use super::store::{
    CartStore, CatalogStore, LedgerError, OrderStore, PlaceOrderError, StockLedger, Store,
};
use super::RepositoryError;

/// A point inside [`OrderStore::place_order`] where a fault can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    /// Before the order row is written.
    CreateOrder,
    /// After the order lines are written.
    CreateLines,
    /// After the first line's stock has been decremented.
    DecrementStock,
    /// After the cart has been cleared, just before commit.
    ClearCart,
}

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i32,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_lines: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, Order>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn cart_for(&self, user_id: UserId) -> Option<&Cart> {
        self.carts.values().find(|cart| cart.user_id == user_id)
    }

    fn get_or_create_cart(&mut self, user_id: UserId) -> Cart {
        if let Some(cart) = self.cart_for(user_id) {
            return cart.clone();
        }
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(self.next_id()),
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.carts.insert(cart.id, cart.clone());
        cart
    }

    /// Ownership check shared by line mutations.
    fn owned_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let Some(line) = self.cart_lines.get(&line_id) else {
            return Ok(None);
        };
        let owner = self.carts.get(&line.cart_id).map(|cart| cart.user_id);
        if owner == Some(user_id) {
            Ok(Some(*line))
        } else {
            Err(RepositoryError::Forbidden)
        }
    }
}

/// In-memory storage handle.
///
/// Cheap to clone; every clone shares the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fault: Arc<Mutex<Option<CommitStage>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `place_order` fail at `stage`.
    pub fn fail_next_commit_at(&self, stage: CommitStage) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(stage);
    }

    /// Number of committed orders across all users.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_fault(&self) -> Option<CommitStage> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn check_fault(fault: Option<CommitStage>, stage: CommitStage) -> Result<(), RepositoryError> {
    if fault == Some(stage) {
        return Err(RepositoryError::Database(sqlx::Error::Protocol(format!(
            "injected failure at {stage:?}"
        ))));
    }
    Ok(())
}

impl CartStore for MemoryStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        Ok(self.lock().get_or_create_cart(user_id))
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        let state = self.lock();
        let Some(cart) = state.cart_for(user_id).cloned() else {
            return Ok(None);
        };

        let lines = state
            .cart_lines
            .values()
            .filter(|line| line.cart_id == cart.id)
            .filter_map(|line| {
                let product = state.products.get(&line.product_id)?;
                Some(PricedCartLine {
                    line_id: line.id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: line.quantity,
                    unit_price: product.price,
                    stock: product.stock,
                })
            })
            .collect();

        Ok(Some(CartSnapshot { cart, lines }))
    }

    async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }
        let cart = state.get_or_create_cart(user_id);

        if let Some(line) = state
            .cart_lines
            .values_mut()
            .find(|line| line.cart_id == cart.id && line.product_id == product_id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
            return Ok(*line);
        }

        let line = CartLine {
            id: CartLineId::new(state.next_id()),
            cart_id: cart.id,
            product_id,
            quantity,
        };
        state.cart_lines.insert(line.id, line);
        Ok(line)
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        let mut line = state
            .owned_line(user_id, line_id)?
            .ok_or(RepositoryError::NotFound)?;
        line.quantity = quantity;
        state.cart_lines.insert(line.id, line);
        Ok(line)
    }

    async fn remove_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        if state.owned_line(user_id, line_id)?.is_none() {
            return Ok(false);
        }
        Ok(state.cart_lines.remove(&line_id).is_some())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let Some(cart_id) = state.cart_for(user_id).map(|cart| cart.id) else {
            return Ok(0);
        };
        let before = state.cart_lines.len();
        state.cart_lines.retain(|_, line| line.cart_id != cart_id);
        let removed = before - state.cart_lines.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

impl StockLedger for MemoryStore {
    async fn decrement(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        let mut state = self.lock();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        if product.stock < amount.get() {
            return Err(LedgerError::InsufficientStock {
                product_id,
                requested: amount.get(),
                available: product.stock,
            });
        }
        product.stock -= amount.get();
        Ok(product.stock)
    }

    async fn restock(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        let mut state = self.lock();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        product.stock = product
            .stock
            .checked_add(amount.get())
            .ok_or_else(|| RepositoryError::Conflict("stock overflow".to_owned()))?;
        Ok(product.stock)
    }

    async fn stock_level(&self, product_id: ProductId) -> Result<i32, LedgerError> {
        self.lock()
            .products
            .get(&product_id)
            .map(|product| product.stock)
            .ok_or(LedgerError::ProductNotFound(product_id))
    }
}

impl OrderStore for MemoryStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<OrderId, PlaceOrderError> {
        let fault = self.take_fault();
        let mut state = self.lock();
        let current_lines = state
            .cart_lines
            .values()
            .filter(|line| line.cart_id == draft.cart_id)
            .count();
        let unchanged = current_lines == draft.lines.len()
            && draft.lines.iter().all(|line| {
                state.cart_lines.get(&line.cart_line_id).is_some_and(|current| {
                    current.cart_id == draft.cart_id && current.quantity == line.quantity
                })
            });
        if !unchanged {
            return Err(PlaceOrderError::CartChanged);
        }
        let mut staged = state.clone();

        check_fault(fault, CommitStage::CreateOrder)?;
        let order_id = OrderId::new(staged.next_id());
        let lines = draft
            .lines
            .iter()
            .map(|line| OrderLine {
                id: OrderLineId::new(staged.next_id()),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        staged.orders.insert(
            order_id,
            Order {
                id: order_id,
                user_id: draft.user_id,
                status: draft.status,
                total: draft.total,
                shipping_address: draft.shipping_address.as_str().to_owned(),
                created_at: Utc::now(),
                lines,
            },
        );
        check_fault(fault, CommitStage::CreateLines)?;

        let mut shortages = Vec::new();
        for (index, line) in draft.lines.iter().enumerate() {
            let requested = line.quantity.get();
            match staged.products.get_mut(&line.product_id) {
                Some(product) if product.stock >= requested => product.stock -= requested,
                product => shortages.push(StockShortage {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    requested,
                    available: product.map_or(0, |p| p.stock),
                }),
            }
            if index == 0 {
                check_fault(fault, CommitStage::DecrementStock)?;
            }
        }
        if !shortages.is_empty() {
            return Err(PlaceOrderError::OutOfStock(shortages));
        }

        for line in &draft.lines {
            staged.cart_lines.remove(&line.cart_line_id);
        }
        check_fault(fault, CommitStage::ClearCart)?;

        *state = staged;
        Ok(order_id)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock().orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn advance_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.lock();
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::NotFound)?;
        if !order.status.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "order cannot move from {} to {next}",
                order.status
            )));
        }
        order.status = next;
        Ok(order.clone())
    }
}

impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> = self.lock().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, RepositoryError> {
        let mut state = self.lock();
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(RepositoryError::Conflict(
                "category name already exists".to_owned(),
            ));
        }
        let now = Utc::now();
        let created = Category {
            id: CategoryId::new(state.next_id()),
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<Category, RepositoryError> {
        let mut state = self.lock();
        if state
            .categories
            .values()
            .any(|c| c.id != id && c.name == category.name)
        {
            return Err(RepositoryError::Conflict(
                "category name already exists".to_owned(),
            ));
        }
        let existing = state
            .categories
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        existing.name.clone_from(&category.name);
        existing.description.clone_from(&category.description);
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.lock().products.values().cloned().collect())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.lock();
        if let Some(category_id) = product.category_id
            && !state.categories.contains_key(&category_id)
        {
            return Err(RepositoryError::NotFound);
        }
        if product.stock < 0 {
            return Err(RepositoryError::Conflict(
                "stock cannot be negative".to_owned(),
            ));
        }
        let created = Product {
            id: ProductId::new(state.next_id()),
            category_id: product.category_id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
