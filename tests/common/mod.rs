//! Shared test environment: in-memory collaborators, a populated identity
//! directory, and bearer tokens for each role.

#![allow(dead_code)]

use std::sync::Arc;

use tmf_types::{DocumentId, KeyHandle, Principal, PrincipalId, Role, TmfMetadata};
use tmf_vault::{DocumentService, LogNotifier};
use tmf_workflow::{
    ApprovalDecision, DocumentEngine, InMemoryBlobStore, InMemoryDirectory,
    InMemoryDocumentStore, InMemorySequenceAllocator, RsaKeyVault,
};

pub struct User {
    pub principal: Principal,
    pub token: String,
}

impl User {
    pub fn id(&self) -> PrincipalId {
        self.principal.id
    }
}

pub struct TestEnv {
    pub service: DocumentService,
    pub store: Arc<InMemoryDocumentStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub vault: Arc<RsaKeyVault>,
    pub author: User,
    pub qc: User,
    pub reviewer: User,
    pub reviewer2: User,
    pub approver: User,
    pub admin: User,
    pub quality_manager: User,
    pub archivist: User,
}

async fn register(
    directory: &InMemoryDirectory,
    username: &str,
    role: Role,
    key: Option<(KeyHandle, String)>,
) -> User {
    let (handle, pem) = key.unwrap_or_else(|| (KeyHandle::generate(), "unused".to_string()));
    let principal = directory.register(username, role, pem, handle).await;
    let token = directory.issue_token(principal.id).await.unwrap();
    User { principal, token }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh environment with one user per role. Only the approver gets a real
/// signing key; nobody else signs in these scenarios.
pub async fn env() -> TestEnv {
    init_tracing();
    let store = Arc::new(InMemoryDocumentStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let vault = Arc::new(RsaKeyVault::new());
    let sequences = Arc::new(InMemorySequenceAllocator::new());

    let signer_key = vault.generate_keypair().unwrap();

    let author = register(&directory, "u1", Role::Contributor, None).await;
    let qc = register(&directory, "u2", Role::Qc, None).await;
    let reviewer = register(&directory, "u3", Role::Reviewer, None).await;
    let reviewer2 = register(&directory, "u5", Role::Reviewer, None).await;
    let approver = register(&directory, "u4", Role::Approver, Some(signer_key)).await;
    let admin = register(&directory, "a1", Role::Admin, None).await;
    let quality_manager = register(&directory, "qm1", Role::QualityManager, None).await;
    let archivist = register(&directory, "ar1", Role::Archivist, None).await;

    let engine = DocumentEngine::new(
        store.clone(),
        blobs,
        directory.clone(),
        vault.clone(),
        sequences,
    );
    let service = DocumentService::new(engine, directory.clone(), Arc::new(LogNotifier));

    TestEnv {
        service,
        store,
        directory,
        vault,
        author,
        qc,
        reviewer,
        reviewer2,
        approver,
        admin,
        quality_manager,
        archivist,
    }
}

pub fn metadata() -> TmfMetadata {
    TmfMetadata {
        study_id: "STUDY-001".to_string(),
        country: "DE".to_string(),
        site_id: "SITE-7".to_string(),
        tmf_zone: "zone-2".to_string(),
        tmf_section: "2.1".to_string(),
        tmf_artifact: "protocol".to_string(),
    }
}

/// Create a document and drive it through QC, review, and approval
pub async fn run_to_approved(env: &TestEnv, content: &[u8], filename: &str) -> DocumentId {
    let created = env
        .service
        .create_document(
            &env.author.token,
            content,
            filename,
            "application/pdf",
            metadata(),
            None,
        )
        .await
        .unwrap();
    let doc_id = created.doc_id;

    env.service
        .submit_qc(&env.author.token, doc_id, vec![env.qc.id()], None)
        .await
        .unwrap();
    env.service
        .qc_ballot(
            &env.qc.token,
            doc_id,
            tmf_types::BallotDecision::Pass,
            None,
        )
        .await
        .unwrap();
    env.service
        .submit_review(&env.author.token, doc_id, vec![env.reviewer.id()], None)
        .await
        .unwrap();
    env.service
        .review_ballot(
            &env.reviewer.token,
            doc_id,
            tmf_types::BallotDecision::Approved,
            None,
        )
        .await
        .unwrap();
    env.service
        .submit_approval(&env.author.token, doc_id, env.approver.id(), None)
        .await
        .unwrap();
    env.service
        .final_approval(
            &env.approver.token,
            doc_id,
            ApprovalDecision::Approved,
            Some("ok".to_string()),
        )
        .await
        .unwrap();

    doc_id
}
