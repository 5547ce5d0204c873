use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub data: InvoiceData,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvoiceData {
    pub payment_detail: InvoicePaymentDetail,
    pub items: Vec<InvoiceItem>,
    pub total: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvoicePaymentDetail {
    pub bank_name: String,
    pub payment_method: String,
    pub va_number: String,
    pub date: String,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvoiceItem {
    pub description: String,
    pub price: String,
}
