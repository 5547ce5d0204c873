use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use crates::domain::{
    entities::payments::PaymentEntity,
    value_objects::invoices::{InvoiceData, InvoiceDocument, InvoiceItem, InvoicePaymentDetail},
};
use rand::Rng;

const INDONESIAN_MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// `INV/{date}/ORD/{6 random digits}`.
pub fn generate_invoice_number(date: NaiveDate) -> String {
    let suffix = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("INV/{}/ORD/{}", date.format("%Y-%m-%d"), suffix)
}

/// Storage-safe object key for an invoice number.
pub fn invoice_storage_key(invoice_number: &str) -> String {
    format!("{}.pdf", invoice_number.replace('/', "-").to_lowercase())
}

pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// `05 Januari 2026`, in the given local offset.
pub fn format_invoice_date(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    let month = INDONESIAN_MONTHS[local.month0() as usize];
    format!("{:02} {} {}", local.day(), month, local.year())
}

pub struct InvoiceInput<'a> {
    pub invoice_number: String,
    pub payment: &'a PaymentEntity,
    pub payment_type: &'a str,
    pub paid_at: DateTime<Utc>,
    pub offset: FixedOffset,
}

pub fn build_invoice_document(input: InvoiceInput<'_>) -> InvoiceDocument {
    let InvoiceInput {
        invoice_number,
        payment,
        payment_type,
        paid_at,
        offset,
    } = input;

    let total = format_rupiah(payment.amount);
    let description = payment
        .description
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| payment.order_id.clone());

    InvoiceDocument {
        invoice_number,
        data: InvoiceData {
            payment_detail: InvoicePaymentDetail {
                bank_name: payment
                    .bank
                    .as_deref()
                    .map(str::to_uppercase)
                    .unwrap_or_else(|| "-".to_string()),
                payment_method: payment_type.to_string(),
                va_number: payment.va_number.clone().unwrap_or_else(|| "-".to_string()),
                date: format_invoice_date(paid_at, offset),
                is_paid: true,
            },
            items: vec![InvoiceItem {
                description,
                price: total.clone(),
            }],
            total,
        },
    }
}
