use crate::bundle::BundleDocument;
use crate::cache::BlobStore;
use crate::error::Result;
use sha2::{Digest, Sha256};

pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Digest and size of a stored bundle blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub digest: String,
    pub size: usize,
}

/// `sha256:<hex>` of `data`
pub fn compute_digest(data: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(data))
}

/// Storage key namespacing a digest by project
pub fn blob_key(project: &str, digest: &str) -> String {
    format!("{}_{}", project, digest)
}

/// Block-style YAML documents joined with `---` separators
pub fn serialize_documents(documents: &[BundleDocument]) -> Result<String> {
    let rendered = documents
        .iter()
        .map(serde_yaml::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rendered.join(DOCUMENT_SEPARATOR))
}

/// Serialize, digest and store the documents of one request.
///
/// Identical documents always produce the same key, so re-storing simply
/// overwrites the blob with the same bytes.
pub async fn assemble(
    store: &dyn BlobStore,
    project: &str,
    documents: &[BundleDocument],
) -> Result<StoredBlob> {
    let body = serialize_documents(documents)?;
    let bytes = body.as_bytes();
    let digest = compute_digest(bytes);

    store.put(&blob_key(project, &digest), bytes).await?;

    tracing::info!(
        project = %project,
        digest = %digest,
        size = bytes.len(),
        documents = documents.len(),
        "Stored bundle blob"
    );

    Ok(StoredBlob {
        digest,
        size: bytes.len(),
    })
}
