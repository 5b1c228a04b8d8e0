use super::BulkDocument;
use crate::store::BulkResponse;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to serialize document {position} ({document_id}): {source}")]
pub struct SerializeError {
    pub position: usize,
    pub document_id: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Serialize)]
struct Action<'a> {
    index: ActionTarget<'a>,
}

#[derive(Serialize)]
struct ActionTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

/// Encode documents in the bulk wire format.
///
/// Every document becomes an action line naming `index` followed by the
/// document itself, each newline terminated, so the body ends with `\n`.
pub fn serialize_batch<D: BulkDocument>(index: &str, documents: &[D]) -> Result<String, SerializeError> {
    let action = serde_json::to_string(&Action {
        index: ActionTarget { index },
    })
    .map_err(|source| SerializeError {
        position: 0,
        document_id: documents
            .first()
            .map(|d| d.document_id().to_string())
            .unwrap_or_default(),
        source,
    })?;

    let mut body = String::with_capacity(documents.len() * (action.len() + 256));
    for (position, document) in documents.iter().enumerate() {
        let source_line = serde_json::to_string(document).map_err(|source| SerializeError {
            position,
            document_id: document.document_id().to_string(),
            source,
        })?;
        body.push_str(&action);
        body.push('\n');
        body.push_str(&source_line);
        body.push('\n');
    }

    Ok(body)
}

/// A rejected bulk item, attributed to its document when possible.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// Position in the batch, when the response lines up with the request.
    pub position: Option<usize>,
    pub document_id: Option<String>,
    pub error_type: String,
    pub reason: String,
}

/// Per-batch accounting derived from a bulk response.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub failed: u64,
    pub failures: Vec<ItemFailure>,
    /// False when the response item count did not match the batch size.
    pub positional: bool,
}

/// Map a bulk response back onto the submitted documents.
///
/// Responses list items in submission order, so item `i` belongs to
/// document `i`. If the counts disagree the failures are still counted but
/// left unattributed. `inserted + failed` always equals the batch size.
pub fn correlate<D: BulkDocument>(documents: &[D], response: &BulkResponse) -> BatchOutcome {
    let positional = response.items.len() == documents.len();

    let failures: Vec<ItemFailure> = response
        .items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let error = item.error.as_ref()?;
            let (position, document_id) = if positional {
                (
                    Some(position),
                    Some(documents[position].document_id().to_string()),
                )
            } else {
                (None, None)
            };
            Some(ItemFailure {
                position,
                document_id,
                error_type: error.error_type.clone(),
                reason: error.reason.clone(),
            })
        })
        .collect();

    let size = documents.len() as u64;
    let failed = (failures.len() as u64).min(size);

    BatchOutcome {
        inserted: size - failed,
        failed,
        failures,
        positional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BulkItem;
    use serde::Serializer;

    #[derive(Serialize)]
    struct Doc {
        id: String,
        value: u32,
    }

    impl BulkDocument for Doc {
        fn document_id(&self) -> &str {
            &self.id
        }
    }

    fn docs(n: usize) -> Vec<Doc> {
        (0..n)
            .map(|i| Doc {
                id: format!("doc-{}", i),
                value: i as u32,
            })
            .collect()
    }

    struct Unencodable {
        id: String,
    }

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to encode"))
        }
    }

    impl BulkDocument for Unencodable {
        fn document_id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_serialize_two_documents_gives_four_lines() {
        let body = serialize_batch("events-2026", &docs(2)).unwrap();
        assert!(body.ends_with('\n'));

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        for action in [lines[0], lines[2]] {
            let value: serde_json::Value = serde_json::from_str(action).unwrap();
            assert_eq!(value["index"]["_index"], "events-2026");
        }
        let source: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(source["id"], "doc-1");
    }

    #[test]
    fn test_serialize_failure_names_document() {
        let documents = vec![
            Unencodable { id: "a".to_string() },
            Unencodable { id: "b".to_string() },
        ];
        let err = serialize_batch("events", &documents).unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.document_id, "a");
    }

    #[test]
    fn test_correlate_attributes_by_position() {
        let documents = docs(3);
        let response = BulkResponse {
            errors: true,
            items: vec![
                BulkItem::default(),
                BulkItem::failed("version_conflict_engine_exception", "conflict"),
                BulkItem::failed("version_conflict_engine_exception", "conflict"),
            ],
        };

        let outcome = correlate(&documents, &response);
        assert!(outcome.positional);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.failed, 2);
        // Same error type twice still maps to the right documents.
        assert_eq!(outcome.failures[0].document_id.as_deref(), Some("doc-1"));
        assert_eq!(outcome.failures[1].document_id.as_deref(), Some("doc-2"));
    }

    #[test]
    fn test_correlate_mismatched_response_is_unattributed() {
        let documents = docs(3);
        let response = BulkResponse {
            errors: true,
            items: vec![BulkItem::failed("es_rejected_execution_exception", "queue full")],
        };

        let outcome = correlate(&documents, &response);
        assert!(!outcome.positional);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.failures[0].position, None);
        assert_eq!(outcome.failures[0].document_id, None);
    }

    #[test]
    fn test_correlate_clean_response() {
        let documents = docs(4);
        let outcome = correlate(&documents, &BulkResponse::acknowledged(4));
        assert_eq!(outcome.inserted, 4);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.failures.is_empty());
    }
}
