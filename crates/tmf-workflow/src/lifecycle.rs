//! Lifecycle Manager
//!
//! Tail-of-life and cross-version rules that fall outside the single-
//! document state machine: amendment creation and its uniqueness guard,
//! deletion guards, and the supersession mutation applied to a predecessor
//! when its amendment is approved.

use chrono::{DateTime, Utc};

use tmf_types::{
    AuditAction, Document, DocumentId, Principal, PrincipalId, Status, Version, WorkflowError,
};

use crate::state_machine::NewRevision;

/// Find an in-progress amendment among a predecessor's descendants (§4.6)
pub fn amendment_in_progress(descendants: &[Document]) -> Option<&Document> {
    descendants.iter().find(|d| d.status.is_in_progress())
}

/// Guard for amendment creation: the predecessor must be Approved and the
/// actor must be its author or an Admin.
pub fn ensure_can_amend(predecessor: &Document, actor: &Principal) -> Result<(), WorkflowError> {
    if predecessor.status != Status::Approved {
        return Err(WorkflowError::InvalidState {
            status: predecessor.status,
            event: "amend",
        });
    }
    if predecessor.author != actor.id && !actor.is_admin() {
        return Err(WorkflowError::Unauthorized(format!(
            "{} is not the document author",
            actor.username
        )));
    }
    Ok(())
}

/// First free minor version for a new amendment. Normally
/// (major, minor + 1) of the predecessor; an abandoned earlier amendment
/// already holds that slot, so the walk covers the whole lineage to keep
/// (lineage, major, minor) unique.
pub fn next_amendment_version(predecessor: &Document, lineage: &[Document]) -> Version {
    let max_minor = lineage
        .iter()
        .filter(|d| d.version.major == predecessor.version.major)
        .map(|d| d.version.minor)
        .max()
        .unwrap_or(predecessor.version.minor);
    Version {
        major: predecessor.version.major,
        minor: max_minor + 1,
    }
}

/// Build the amendment document: a fresh Draft sharing the predecessor's
/// number, lineage, and metadata, starting at the lineage's next free
/// minor. The predecessor itself stays Approved and untouched until the
/// amendment is approved.
pub fn build_amendment(
    predecessor: &Document,
    lineage: &[Document],
    revision: NewRevision,
    actor: &Principal,
    reason: &str,
    now: DateTime<Utc>,
) -> Document {
    let mut doc = Document::create(
        DocumentId::generate(),
        predecessor.doc_number.clone(),
        predecessor.lineage_id,
        actor.id,
        predecessor.tmf_metadata.clone(),
        tmf_types::Revision {
            blob_id: revision.blob_id,
            filename: revision.filename,
            content_type: revision.content_type,
            author_comment: revision.comment,
            uploaded_at: now,
            uploader: actor.id,
        },
        now,
    );
    doc.version = next_amendment_version(predecessor, lineage);
    doc.amended_from = Some(predecessor.doc_id);
    doc.record(
        AuditAction::AmendmentCreated,
        actor.id,
        &actor.username,
        format!("amendment of {}: {}", predecessor.doc_number, reason),
        now,
    );
    doc
}

/// Guard for hard deletion: only the author or an Admin, and only while the
/// document is Draft or Withdrawn.
pub fn ensure_deletable(doc: &Document, actor: &Principal) -> Result<(), WorkflowError> {
    if doc.author != actor.id && !actor.is_admin() {
        return Err(WorkflowError::Unauthorized(format!(
            "{} may not delete this document",
            actor.username
        )));
    }
    if !matches!(doc.status, Status::Draft | Status::Withdrawn) {
        return Err(WorkflowError::InvalidState {
            status: doc.status,
            event: "delete",
        });
    }
    Ok(())
}

/// Flip an Approved predecessor to Superseded, pointing it at the approved
/// successor and clearing the two-phase marker.
pub fn supersede(
    predecessor: &mut Document,
    successor: DocumentId,
    actor_id: PrincipalId,
    actor_name: &str,
    now: DateTime<Utc>,
) {
    predecessor.status = Status::Superseded;
    predecessor.superseded_by = Some(successor);
    predecessor.pending_supersession = None;
    predecessor.record(
        AuditAction::Superseded,
        actor_id,
        actor_name,
        format!("superseded by {}", successor),
        now,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmf_types::{BlobId, KeyHandle, LineageId, Revision, Role, TmfMetadata, Version};

    fn principal(name: &str, role: Role) -> Principal {
        Principal {
            id: PrincipalId::generate(),
            username: name.to_string(),
            role,
            public_key_pem: String::new(),
            private_key_handle: KeyHandle::generate(),
        }
    }

    fn approved_doc(author: &Principal) -> Document {
        let mut doc = Document::create(
            DocumentId::generate(),
            "REG-TMF-00007".to_string(),
            LineageId::generate(),
            author.id,
            TmfMetadata {
                study_id: "STUDY-12".to_string(),
                ..Default::default()
            },
            Revision {
                blob_id: BlobId::new("blob-1"),
                filename: "proto.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                author_comment: None,
                uploaded_at: Utc::now(),
                uploader: author.id,
            },
            Utc::now(),
        );
        doc.status = Status::Approved;
        doc.version = Version { major: 1, minor: 0 };
        doc
    }

    fn new_revision() -> NewRevision {
        NewRevision {
            blob_id: BlobId::new("blob-2"),
            filename: "fix_v2.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            comment: None,
        }
    }

    #[test]
    fn test_amendment_copies_lineage_identity() {
        let author = principal("u1", Role::Contributor);
        let pred = approved_doc(&author);

        let lineage = vec![pred.clone()];
        let amendment = build_amendment(&pred, &lineage, new_revision(), &author, "typo", Utc::now());

        assert_eq!(amendment.doc_number, pred.doc_number);
        assert_eq!(amendment.lineage_id, pred.lineage_id);
        assert_eq!(amendment.tmf_metadata, pred.tmf_metadata);
        assert_eq!(amendment.version, Version { major: 1, minor: 1 });
        assert_eq!(amendment.status, Status::Draft);
        assert_eq!(amendment.amended_from, Some(pred.doc_id));
        assert_ne!(amendment.doc_id, pred.doc_id);
        assert!(amendment.signature.is_none());
    }

    #[test]
    fn test_amend_requires_approved_predecessor() {
        let author = principal("u1", Role::Contributor);
        let mut pred = approved_doc(&author);
        pred.status = Status::Draft;

        assert!(matches!(
            ensure_can_amend(&pred, &author),
            Err(WorkflowError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_amend_requires_author_or_admin() {
        let author = principal("u1", Role::Contributor);
        let stranger = principal("ux", Role::Contributor);
        let admin = principal("a1", Role::Admin);
        let pred = approved_doc(&author);

        assert!(matches!(
            ensure_can_amend(&pred, &stranger),
            Err(WorkflowError::Unauthorized(_))
        ));
        assert!(ensure_can_amend(&pred, &author).is_ok());
        assert!(ensure_can_amend(&pred, &admin).is_ok());
    }

    #[test]
    fn test_in_progress_detection() {
        let author = principal("u1", Role::Contributor);
        let mut a = approved_doc(&author);
        a.status = Status::Superseded;
        let mut b = approved_doc(&author);
        b.status = Status::InReview;

        let docs = vec![a, b.clone()];
        let found = amendment_in_progress(&docs).unwrap();
        assert_eq!(found.doc_id, b.doc_id);

        let mut c = approved_doc(&author);
        c.status = Status::QcRejected;
        assert!(amendment_in_progress(&[c]).is_none());
    }

    #[test]
    fn test_abandoned_amendment_does_not_reuse_its_version() {
        let author = principal("u1", Role::Contributor);
        let pred = approved_doc(&author);

        // An earlier amendment was withdrawn after two uploads
        let mut abandoned = approved_doc(&author);
        abandoned.lineage_id = pred.lineage_id;
        abandoned.status = Status::Withdrawn;
        abandoned.version = Version { major: 1, minor: 2 };

        let lineage = vec![pred.clone(), abandoned];
        let amendment =
            build_amendment(&pred, &lineage, new_revision(), &author, "retry", Utc::now());
        assert_eq!(amendment.version, Version { major: 1, minor: 3 });
    }

    #[test]
    fn test_delete_guards() {
        let author = principal("u1", Role::Contributor);
        let stranger = principal("ux", Role::Contributor);
        let mut doc = approved_doc(&author);

        // Approved documents can never be hard-deleted
        assert!(matches!(
            ensure_deletable(&doc, &author),
            Err(WorkflowError::InvalidState { .. })
        ));

        doc.status = Status::Withdrawn;
        assert!(ensure_deletable(&doc, &author).is_ok());
        assert!(matches!(
            ensure_deletable(&doc, &stranger),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_supersede_sets_pointers_and_history() {
        let author = principal("u1", Role::Contributor);
        let mut pred = approved_doc(&author);
        pred.pending_supersession = Some(DocumentId::generate());
        let successor = DocumentId::generate();

        supersede(&mut pred, successor, author.id, &author.username, Utc::now());

        assert_eq!(pred.status, Status::Superseded);
        assert_eq!(pred.superseded_by, Some(successor));
        assert!(pred.pending_supersession.is_none());
        assert_eq!(pred.history.last().unwrap().action, AuditAction::Superseded);
    }
}
