//! Custom Test Assertions
//!
//! Assertion helpers for billing types that give more meaningful failure
//! messages than a bare `assert_eq!` on a whole invoice.

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values have the same currency and amount
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Amount mismatch: actual={}, expected={}",
        actual.amount(),
        expected.amount()
    );
}

/// Asserts the invoice total is the sum of its line totals and every line
/// total is quantity times unit price at two decimals
pub fn assert_invoice_consistent(invoice: &Invoice) {
    let sum: Decimal = invoice.line_items.iter().map(|l| l.line_total.amount()).sum();
    assert_eq!(
        invoice.total.amount(),
        sum,
        "Invoice {} total {} does not match line sum {}",
        invoice.invoice_number,
        invoice.total.amount(),
        sum
    );
    assert_eq!(invoice.subtotal.amount(), invoice.total.amount());

    for (index, line) in invoice.line_items.iter().enumerate() {
        assert_eq!(line.position as usize, index, "Line positions must follow line order");
        let product = (line.quantity * line.unit_price.amount()).round_dp(2);
        assert_eq!(
            product,
            line.line_total.amount(),
            "Line '{}': {} x {} != {}",
            line.description,
            line.quantity,
            line.unit_price.amount(),
            line.line_total.amount()
        );
    }
}

/// Asserts that an invoice has the given status
pub fn assert_status(invoice: &Invoice, expected: InvoiceStatus) {
    assert_eq!(
        invoice.status, expected,
        "Invoice {} is {:?}, expected {:?}",
        invoice.invoice_number, invoice.status, expected
    );
}

/// Asserts that no two live invoices of the same owner share a day
pub fn assert_no_overlapping_invoices(invoices: &[Invoice]) {
    let live: Vec<&Invoice> = invoices
        .iter()
        .filter(|i| i.status != InvoiceStatus::Cancelled)
        .collect();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            if a.owner_id == b.owner_id {
                assert!(
                    !a.period().overlaps(&b.period()),
                    "Invoices {} and {} overlap",
                    a.invoice_number,
                    b.invoice_number
                );
            }
        }
    }
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
