//! Shared pieces of the document state machines

use thiserror::Error;

/// An action that is not allowed from the document's current status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {action} {document} in status {from}")]
pub struct TransitionError {
    pub document: &'static str,
    pub action: &'static str,
    pub from: &'static str,
}

impl TransitionError {
    pub fn new(document: &'static str, action: &'static str, from: &'static str) -> Self {
        Self {
            document,
            action,
            from,
        }
    }
}

/// Kinds of numbered warehouse documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Delivery,
    Order,
    Stocktaking,
    Sale,
    Usage,
}

impl DocumentKind {
    pub fn prefix(&self) -> char {
        match self {
            DocumentKind::Delivery => 'D',
            DocumentKind::Order => 'Z',
            DocumentKind::Stocktaking => 'I',
            DocumentKind::Sale => 'S',
            DocumentKind::Usage => 'U',
        }
    }

    /// Postgres sequence that feeds the running number
    pub fn sequence_name(&self) -> &'static str {
        match self {
            DocumentKind::Delivery => "delivery_number_seq",
            DocumentKind::Order => "order_number_seq",
            DocumentKind::Stocktaking => "stocktaking_number_seq",
            DocumentKind::Sale => "sale_number_seq",
            DocumentKind::Usage => "usage_number_seq",
        }
    }
}

/// Generate a document number such as `D20261000042`
pub fn generate_document_number(kind: DocumentKind, year: i32, month: u32, sequence: i64) -> String {
    format!("{}{}{:02}{:05}", kind.prefix(), year, month, sequence)
}
