use common::VariantId;

use crate::model::MovementType;

/// Page size used when a query does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Builder for filtering the inventory ledger.
///
/// Results are always returned newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementQuery {
    /// Filter by variant.
    pub variant_id: Option<VariantId>,

    /// Filter by movement type.
    pub movement_type: Option<MovementType>,

    /// Filter by reference (order id).
    pub reference_id: Option<String>,

    /// Maximum number of rows to return.
    pub limit: Option<usize>,

    /// Number of rows to skip.
    pub offset: Option<usize>,
}

impl MovementQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for all movements referencing an order.
    pub fn for_reference(reference_id: impl ToString) -> Self {
        Self {
            reference_id: Some(reference_id.to_string()),
            ..Default::default()
        }
    }

    /// Filters by variant.
    pub fn variant_id(mut self, id: VariantId) -> Self {
        self.variant_id = Some(id);
        self
    }

    /// Filters by movement type.
    pub fn movement_type(mut self, movement_type: MovementType) -> Self {
        self.movement_type = Some(movement_type);
        self
    }

    /// Sets the maximum number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets limit and offset from a 1-based page number.
    ///
    /// Page numbers below 1 are treated as 1 and a zero page size falls back
    /// to [`DEFAULT_PAGE_SIZE`]. Returns `None` when the resulting offset does
    /// not fit in an `i64`.
    pub fn page(self, page: usize, per_page: usize) -> Option<Self> {
        let per_page = if per_page == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            per_page
        };
        let offset = (page.max(1) - 1).checked_mul(per_page)?;
        i64::try_from(offset).ok()?;
        Some(self.limit(per_page).offset(offset))
    }
}
