use crate::domain::book::{Book, Isbn};
use crate::domain::fine::{Fine, FineRule};
use crate::domain::loan::{Loan, LoanId};
use crate::domain::partner::PartnerId;
use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::io::Write;

const BOOK_HEADER: [&str; 8] = [
    "ISBN",
    "Title",
    "Author",
    "Category",
    "Total Copies",
    "Available Copies",
    "Reference Price",
    "Active",
];

const LOAN_HEADER: [&str; 7] = [
    "Loan ID",
    "Book ISBN",
    "Partner ID",
    "Loan Date",
    "Due Date",
    "Days Overdue",
    "Fine",
];

/// A loan as it appears in a report, with the lateness evaluated for `today`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanReportRow {
    pub loan_id: LoanId,
    pub book_isbn: Isbn,
    pub partner_id: PartnerId,
    pub loan_date: NaiveDateTime,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
    pub fine: Fine,
}

impl LoanReportRow {
    pub fn from_loan(loan: &Loan, rule: &FineRule, today: NaiveDate) -> Self {
        Self {
            loan_id: loan.id,
            book_isbn: loan.book_isbn.clone(),
            partner_id: loan.partner_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            days_overdue: loan.days_overdue(today),
            fine: loan.accrued_fine(rule, today),
        }
    }
}

/// Writes catalog and loan reports as CSV, or loan reports as JSON.
pub struct ReportWriter<W: Write> {
    sink: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_books(self, books: &[Book]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(self.sink);
        writer.write_record(BOOK_HEADER)?;
        for book in books {
            writer.write_record([
                book.isbn.to_string(),
                book.title.clone(),
                book.author.clone(),
                book.category.clone(),
                book.total_copies.to_string(),
                book.available_copies.to_string(),
                format!("{:.2}", book.reference_price),
                book.is_active.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_loans(self, rows: &[LoanReportRow]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(self.sink);
        writer.write_record(LOAN_HEADER)?;
        for row in rows {
            writer.write_record([
                row.loan_id.to_string(),
                row.book_isbn.to_string(),
                row.partner_id.to_string(),
                row.loan_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                row.due_date.to_string(),
                row.days_overdue.to_string(),
                row.fine.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_loans_json(mut self, rows: &[LoanReportRow]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.sink, rows)?;
        writeln!(self.sink)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_loan() -> Loan {
        Loan {
            id: LoanId(7),
            book_isbn: Isbn::new("978-0").unwrap(),
            partner_id: PartnerId(1),
            loan_date: date(2024, 1, 3).and_hms_opt(9, 30, 0).unwrap(),
            due_date: date(2024, 1, 10),
            return_date: None,
            fine: None,
            is_returned: false,
        }
    }

    #[test]
    fn test_write_books() {
        let book = Book::new(Isbn::new("978-0").unwrap(), "Dune", "Herbert", "Sci-Fi", dec!(19.9), 3);
        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_books(&[book]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "ISBN,Title,Author,Category,Total Copies,Available Copies,Reference Price,Active\n\
             978-0,Dune,Herbert,Sci-Fi,3,3,19.90,true\n"
        );
    }

    #[test]
    fn test_overdue_row_uses_accrued_fine() {
        let row = LoanReportRow::from_loan(&open_loan(), &FineRule::default(), date(2024, 1, 15));
        assert_eq!(row.days_overdue, 5);
        assert_eq!(row.fine.value(), dec!(2.50));

        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_loans(&[row]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Loan ID,Book ISBN,Partner ID,Loan Date,Due Date,Days Overdue,Fine\n"));
        assert!(text.contains("7,978-0,1,2024-01-03 09:30:00,2024-01-10,5,2.50"));
    }

    #[test]
    fn test_returned_loan_keeps_charged_fine() {
        let mut loan = open_loan();
        loan.is_returned = true;
        loan.return_date = Some(date(2024, 1, 12));
        loan.fine = Some(Fine::new(dec!(1.00)).unwrap());

        let row = LoanReportRow::from_loan(&loan, &FineRule::default(), date(2024, 3, 1));
        assert_eq!(row.days_overdue, 0);
        assert_eq!(row.fine.value(), dec!(1.00));
    }

    #[test]
    fn test_write_loans_json() {
        let row = LoanReportRow::from_loan(&open_loan(), &FineRule::default(), date(2024, 1, 10));
        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_loans_json(&[row]).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["loan_id"], 7);
        assert_eq!(value[0]["book_isbn"], "978-0");
        assert_eq!(value[0]["days_overdue"], 0);
        assert_eq!(value[0]["due_date"], "2024-01-10");
    }
}
