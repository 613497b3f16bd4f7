//! Order status transition table.

use common::{OrderId, OrderStatus};

use crate::error::{OrderError, Result};

/// Statuses an order may move into `target` from.
///
/// ```text
/// completed ◄── pending
/// delivered ◄── pending, completed
/// cancelled ◄── pending, completed
/// pending   ◄── (none)
/// ```
pub fn allowed_from(target: OrderStatus) -> &'static [OrderStatus] {
    match target {
        OrderStatus::Pending => &[],
        OrderStatus::Completed => &[OrderStatus::Pending],
        OrderStatus::Delivered => &[OrderStatus::Pending, OrderStatus::Completed],
        OrderStatus::Cancelled => &[OrderStatus::Pending, OrderStatus::Completed],
    }
}

/// Returns true if `from → to` is listed in the transition table.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_from(to).contains(&from)
}

/// Checks a transition for the given order.
///
/// Cancelling a cancelled order is reported separately from other refused
/// transitions.
pub fn check_transition(order_id: OrderId, from: OrderStatus, to: OrderStatus) -> Result<()> {
    if from == OrderStatus::Cancelled && to == OrderStatus::Cancelled {
        return Err(OrderError::AlreadyCancelled(order_id));
    }
    if !can_transition(from, to) {
        return Err(OrderError::InvalidTransition { from, to });
    }
    Ok(())
}
