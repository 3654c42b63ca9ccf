use std::collections::BTreeSet;

use mime::Mime;

use super::domain::{Attachment, DocumentKind, FormSnapshot};

/// Upload limit advertised on the document stage (5 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

const ALWAYS_REQUIRED: [DocumentKind; 3] = [
    DocumentKind::StudentCard,
    DocumentKind::StudentId,
    DocumentKind::RegistrationProof,
];

/// Reasons an upload is refused before it reaches a document slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejected {
    #[error("attachment for {kind:?} is missing a file name")]
    MissingFileName { kind: DocumentKind },
    #[error("attachment '{file_name}' is empty")]
    Empty { file_name: String },
    #[error("attachment '{file_name}' is {size_bytes} bytes (limit {max_bytes})")]
    TooLarge {
        file_name: String,
        size_bytes: u64,
        max_bytes: u64,
    },
    #[error("attachment '{file_name}' has unsupported type {content_type} (PDF, JPG or PNG only)")]
    UnsupportedType {
        file_name: String,
        content_type: String,
    },
}

/// Policy dial for document requirements and upload acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPolicy {
    require_guardian_id: bool,
    max_attachment_bytes: u64,
}

/// Student card, student ID and proof of registration, plus the NSFAS letter
/// for NSFAS applicants. A parent/guardian ID is accepted but not demanded;
/// opt in through [`DocumentPolicy::strict`] or `INTAKE_REQUIRE_GUARDIAN_ID`.
impl Default for DocumentPolicy {
    fn default() -> Self {
        Self {
            require_guardian_id: false,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl DocumentPolicy {
    pub fn new(require_guardian_id: bool, max_attachment_bytes: u64) -> Self {
        let max_attachment_bytes = if max_attachment_bytes == 0 {
            DEFAULT_MAX_ATTACHMENT_BYTES
        } else {
            max_attachment_bytes
        };

        Self {
            require_guardian_id,
            max_attachment_bytes,
        }
    }

    /// Policy that also demands a parent/guardian ID from every applicant.
    pub fn strict() -> Self {
        Self::new(true, DEFAULT_MAX_ATTACHMENT_BYTES)
    }

    pub fn requires_guardian_id(&self) -> bool {
        self.require_guardian_id
    }

    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_bytes
    }

    /// Documents the applicant must upload given the answers captured so far.
    ///
    /// Recomputed on every call; flipping the NSFAS flag changes the result
    /// immediately.
    pub fn required_kinds(&self, snapshot: &FormSnapshot) -> BTreeSet<DocumentKind> {
        let mut required: BTreeSet<DocumentKind> = ALWAYS_REQUIRED.into_iter().collect();

        if self.require_guardian_id {
            required.insert(DocumentKind::GuardianId);
        }

        if snapshot.financial.nsfas_applicant {
            required.insert(DocumentKind::NsfasLetter);
        }

        required
    }

    /// Required kinds that have no attachment yet, in slot order.
    pub fn outstanding_kinds(&self, snapshot: &FormSnapshot) -> Vec<DocumentKind> {
        self.required_kinds(snapshot)
            .into_iter()
            .filter(|kind| !snapshot.documents.is_attached(*kind))
            .collect()
    }

    /// Check an upload against the type and size rules, filling in the
    /// content type when the caller did not declare one.
    pub fn accept(
        &self,
        kind: DocumentKind,
        attachment: Attachment,
    ) -> Result<Attachment, AttachmentRejected> {
        let file_name = attachment.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(AttachmentRejected::MissingFileName { kind });
        }

        if attachment.size_bytes == 0 {
            return Err(AttachmentRejected::Empty { file_name });
        }

        if attachment.size_bytes > self.max_attachment_bytes {
            return Err(AttachmentRejected::TooLarge {
                file_name,
                size_bytes: attachment.size_bytes,
                max_bytes: self.max_attachment_bytes,
            });
        }

        let mime = resolve_content_type(&file_name, attachment.content_type.as_deref());
        match mime {
            Some(mime) if is_accepted(&mime) => Ok(Attachment {
                file_name,
                size_bytes: attachment.size_bytes,
                content_type: Some(mime.essence_str().to_string()),
                storage_key: attachment.storage_key,
            }),
            other => Err(AttachmentRejected::UnsupportedType {
                content_type: other
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                file_name,
            }),
        }
    }
}

fn resolve_content_type(file_name: &str, declared: Option<&str>) -> Option<Mime> {
    match declared.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => raw.parse::<Mime>().ok(),
        None => mime_guess::from_path(file_name).first(),
    }
}

fn is_accepted(mime: &Mime) -> bool {
    let essence = mime.essence_str();
    essence == mime::APPLICATION_PDF.essence_str()
        || essence == mime::IMAGE_JPEG.essence_str()
        || essence == mime::IMAGE_PNG.essence_str()
}
