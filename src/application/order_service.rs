use crate::domain::errors::DomainError;
use crate::domain::order::{ListResult, OrderId, OrderStatus, OrderView};
use crate::domain::ports::OrderRepository;

pub struct OrderService<R> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_order(&self, id: OrderId) -> Result<Option<OrderView>, DomainError> {
        self.repo.find_by_id(id)
    }

    pub fn list_orders(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        self.repo.list(page.max(1), limit.max(1))
    }

    /// Moves an order to `next`. Completed and cancelled orders are final.
    /// The write only applies if nobody changed the status since it was read.
    pub fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<OrderView, DomainError> {
        let order = self.repo.find_by_id(id)?.ok_or(DomainError::NotFound)?;
        let current = order.status;

        if current == next {
            return Ok(order);
        }
        if !current.can_transition_to(next) {
            return Err(DomainError::InvalidInput(format!(
                "order {} is {} and can no longer change status",
                id,
                current.display_name()
            )));
        }

        if self.repo.update_status(id, current, next)? == 0 {
            return Err(DomainError::Conflict(format!(
                "order {} changed status concurrently",
                id
            )));
        }
        log::info!("Order {} moved from {} to {}", id, current, next);

        self.repo.find_by_id(id)?.ok_or(DomainError::NotFound)
    }
}
