/// An ordered group of documents cut from the uploader's buffer.
///
/// Full batches hold exactly `batch_size` documents; only the final batch of
/// a stream may be shorter.
#[derive(Debug, Clone)]
pub struct Batch<D> {
    /// Dispatch order, starting at 0.
    pub sequence: u64,
    pub documents: Vec<D>,
}

impl<D> Batch<D> {
    pub fn new(sequence: u64, documents: Vec<D>) -> Self {
        Self {
            sequence,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
