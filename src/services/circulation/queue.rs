//! Per-item request queue

use crate::{
    error::{CirculationError, CirculationResult},
    models::{enums::LoanState, loan::Loan},
};

/// Pending requests of one item, oldest first.
///
/// Ordered by (request creation date, loan id). Loan ids are time-ordered,
/// which keeps requests created in the same instant in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    item_id: i32,
    loans: Vec<Loan>,
}

impl RequestQueue {
    /// Build the queue from any loans of the item; non-pending loans are ignored
    pub fn from_loans(item_id: i32, loans: Vec<Loan>) -> Self {
        let mut loans: Vec<Loan> = loans
            .into_iter()
            .filter(|l| l.item_id == item_id && l.state == LoanState::Pending)
            .collect();
        loans.sort_by_key(Loan::queue_key);
        Self { item_id, loans }
    }

    /// Insert a pending loan at its place, returning its 1-based position
    pub fn enqueue(&mut self, loan: Loan) -> CirculationResult<usize> {
        if self.find_by_patron(loan.patron_id).is_some() {
            return Err(CirculationError::DuplicateRequest {
                item_id: self.item_id,
                patron_id: loan.patron_id,
            });
        }
        let key = loan.queue_key();
        let index = self.loans.partition_point(|l| l.queue_key() <= key);
        self.loans.insert(index, loan);
        Ok(index + 1)
    }

    pub fn peek_head(&self) -> Option<&Loan> {
        self.loans.first()
    }

    pub fn remove(&mut self, loan_id: i64) -> Option<Loan> {
        let index = self.loans.iter().position(|l| l.id == loan_id)?;
        Some(self.loans.remove(index))
    }

    pub fn count(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// 1-based rank of a loan in the queue
    pub fn position(&self, loan_id: i64) -> Option<usize> {
        self.loans.iter().position(|l| l.id == loan_id).map(|i| i + 1)
    }

    pub fn find_by_patron(&self, patron_id: i32) -> Option<&Loan> {
        self.loans.iter().find(|l| l.patron_id == patron_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter()
    }
}
