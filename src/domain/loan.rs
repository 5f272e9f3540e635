use super::book::Isbn;
use super::fine::{Fine, FineRule, days_late};
use super::partner::PartnerId;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub i64);

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A book borrowed by a partner.
///
/// Open (`is_returned == false`) until processed once by a return, after which
/// `return_date` and `fine` are set and the loan no longer changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_isbn: Isbn,
    pub partner_id: PartnerId,
    pub loan_date: NaiveDateTime,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub fine: Option<Fine>,
    pub is_returned: bool,
}

impl Loan {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_returned && self.due_date < today
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_returned {
            return 0;
        }
        days_late(self.due_date, today)
    }

    /// The fine already charged, or for an open loan the fine it would
    /// accrue if returned `today`.
    pub fn accrued_fine(&self, rule: &FineRule, today: NaiveDate) -> Fine {
        match self.fine {
            Some(fine) => fine,
            None if self.is_returned => Fine::ZERO,
            None => rule.calculate(self.due_date, today),
        }
    }
}

/// Data the caller supplies to open a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub book_isbn: Isbn,
    pub partner_id: PartnerId,
    pub due_date: NaiveDate,
}

/// Outcome of a processed return.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnReceipt {
    pub loan_id: LoanId,
    pub book_isbn: Isbn,
    pub return_date: NaiveDate,
    pub days_late: i64,
    pub fine: Fine,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_loan(due: NaiveDate) -> Loan {
        Loan {
            id: LoanId(1),
            book_isbn: Isbn::new("X").unwrap(),
            partner_id: PartnerId(1),
            loan_date: date(2024, 1, 1).and_hms_opt(10, 0, 0).unwrap(),
            due_date: due,
            return_date: None,
            fine: None,
            is_returned: false,
        }
    }

    #[test]
    fn test_open_loan_overdue_after_due_date() {
        let loan = open_loan(date(2024, 2, 1));
        assert!(!loan.is_overdue(date(2024, 2, 1)));
        assert!(loan.is_overdue(date(2024, 2, 2)));
        assert_eq!(loan.days_overdue(date(2024, 2, 4)), 3);
    }

    #[test]
    fn test_returned_loan_is_never_overdue() {
        let mut loan = open_loan(date(2024, 2, 1));
        loan.is_returned = true;
        loan.return_date = Some(date(2024, 2, 10));
        loan.fine = Some(Fine::new(dec!(4.50)).unwrap());

        assert!(!loan.is_overdue(date(2024, 3, 1)));
        assert_eq!(loan.days_overdue(date(2024, 3, 1)), 0);
        assert_eq!(
            loan.accrued_fine(&FineRule::default(), date(2024, 3, 1)).value(),
            dec!(4.50)
        );
    }

    #[test]
    fn test_accrued_fine_for_open_loan() {
        let loan = open_loan(date(2024, 2, 1));
        let fine = loan.accrued_fine(&FineRule::default(), date(2024, 2, 5));
        assert_eq!(fine.value(), dec!(2.00));
    }
}
