//! # Domain Invariants
//!
//! Rules checked locally before anything is sent, and the alignment rule
//! applied to processing results coming back.

use super::entities::{InvoiceOperationBatch, ProcessingResult};
use super::errors::{ConnectorError, ValidationError};
use super::value_objects::OperationKind;

/// Maximum operations per batch accepted by the service.
pub const MAX_BATCH_SIZE: usize = 100;

/// Maximum length of request and transaction identifiers.
pub const PROTOCOL_IDENTIFIER_MAX_LEN: usize = 30;

/// Length of a software id.
pub const SOFTWARE_ID_LEN: usize = 18;

/// `^[+a-zA-Z0-9_]{1,30}$`
pub fn is_protocol_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= PROTOCOL_IDENTIFIER_MAX_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '_')
}

/// `^[0-9]{8}$`
pub fn is_tax_number(value: &str) -> bool {
    value.len() == 8 && value.chars().all(|c| c.is_ascii_digit())
}

/// `^[0-9A-Z\-]{18}$`
pub fn is_software_id(value: &str) -> bool {
    value.len() == SOFTWARE_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase() || c == '-')
}

/// Invariant: a batch is non-empty, within the size limit, and its kinds
/// match the annulment mode.
pub fn invariant_batch(
    batch: &InvoiceOperationBatch,
    max_batch_size: usize,
) -> Result<(), ValidationError> {
    if batch.operations.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    if batch.operations.len() > max_batch_size {
        return Err(ValidationError::BatchTooLarge {
            size: batch.operations.len(),
            max: max_batch_size,
        });
    }

    for (i, operation) in batch.operations.iter().enumerate() {
        let is_annul = operation.kind == OperationKind::Annul;
        if is_annul != batch.technical_annulment {
            return Err(ValidationError::OperationKindMismatch {
                index: i + 1,
                kind: operation.kind,
                technical_annulment: batch.technical_annulment,
            });
        }
        if operation.payload.is_empty() {
            return Err(ValidationError::EmptyPayload { index: i + 1 });
        }
    }

    Ok(())
}

/// Invariant: results are ordered by index and cover exactly `1..=N`.
///
/// Sorts in place, then checks for gaps and duplicates.
pub fn invariant_results_aligned(
    results: &mut [ProcessingResult],
) -> Result<(), ConnectorError> {
    results.sort_by_key(|r| r.index);
    for (position, result) in results.iter().enumerate() {
        let expected = position as u32 + 1;
        if result.index != expected {
            return Err(ConnectorError::malformed(format!(
                "processing result index {} where {} was expected",
                result.index, expected
            )));
        }
    }
    Ok(())
}
