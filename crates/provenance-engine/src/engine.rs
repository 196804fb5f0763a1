//! `ProvenanceEngine`, the single entry point callers hold.
//!
//! The engine owns one key manager, one hash-chain log, one batch verifier
//! and, once configured, one timestamp client. Every operation delegates to
//! the component that owns the state; the engine itself only resolves
//! defaults from `EngineConfig`.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use provenance_contracts::{
    chain::ChainVerificationResult,
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
    key::{CryptoKey, KeyPurpose, KeyType, Signature},
    manifest::{DatasetManifest, ValidationResult},
    merkle::ProofStep,
    record::Record,
    timestamp::TimestampToken,
};
use provenance_core::traits::{HardwareSigner, KeyRepository, LogStore, TimestampAuthority};
use provenance_chain::{HashChainLog, InMemoryLogStore};
use provenance_keys::{InMemoryKeyRepository, KeyManager, SignatureService};
use provenance_merkle::{BatchScheduler, BatchVerifier, MerkleBatch, RecordProof};
use provenance_timestamp::{LocalTimestampAuthority, TimestampClient, TrustRoot};

use crate::config::EngineConfig;

/// Facade over the integrity and provenance components.
///
/// ```rust,ignore
/// let engine = ProvenanceEngine::new(EngineConfig::default())?.with_local_timestamping()?;
/// engine.generate_key(KeyType::Ed25519, 256, KeyPurpose::Signing)?;
///
/// let mut record = engine.append_entry("audit_log", &json!({ "event": "login" }))?;
/// engine.seal_record(&mut record)?;
/// let token = engine.timestamp(record.entry_hash()).await?;
/// ```
pub struct ProvenanceEngine {
    config: EngineConfig,
    keys: Arc<KeyManager>,
    signer: SignatureService,
    log: Arc<HashChainLog>,
    batches: Arc<BatchVerifier>,
    timestamps: Option<TimestampClient>,
}

impl ProvenanceEngine {
    /// An engine backed by in-memory key and log stores.
    pub fn new(config: EngineConfig) -> ProvenanceResult<Self> {
        Self::with_stores(
            config,
            Arc::new(InMemoryKeyRepository::new()),
            Arc::new(InMemoryLogStore::new()),
        )
    }

    /// An engine over caller-supplied stores.
    pub fn with_stores(
        config: EngineConfig,
        key_repo: Arc<dyn KeyRepository>,
        log_store: Arc<dyn LogStore>,
    ) -> ProvenanceResult<Self> {
        let keys = Arc::new(KeyManager::new(key_repo, config.sealer()?, config.key_policy()));
        let signer = SignatureService::new(Arc::clone(&keys));
        let log = Arc::new(HashChainLog::new(log_store));
        let batches = Arc::new(BatchVerifier::new(Arc::clone(&log)));
        info!(
            sign_timeout_ms = config.sign_timeout_ms,
            batch_threshold = config.batching.count_threshold,
            "provenance engine ready"
        );
        Ok(Self {
            config,
            keys,
            signer,
            log,
            batches,
            timestamps: None,
        })
    }

    /// Route signing with hardware-backed keys through `driver`.
    pub fn with_hardware(mut self, driver: Arc<dyn HardwareSigner>) -> Self {
        self.signer = self.signer.with_hardware(driver);
        self
    }

    /// Timestamp through an external authority verified against `trust_root`.
    pub fn with_timestamp_authority(mut self, authority: Arc<dyn TimestampAuthority>, trust_root: TrustRoot) -> Self {
        self.timestamps = Some(TimestampClient::new(authority, trust_root, self.config.retry_policy()));
        self
    }

    /// Timestamp through a built-in authority that signs with this engine's
    /// current timestamping key, generating one from the default key spec
    /// if there is none.
    pub fn with_local_timestamping(self) -> ProvenanceResult<Self> {
        let key = match self.keys.current_key(KeyPurpose::Timestamping) {
            Ok(key) => key,
            Err(ProvenanceError::NoActiveKey { .. }) => {
                let spec = self.keys.policy().default_spec;
                self.keys.generate_key(spec.key_type, spec.key_size, KeyPurpose::Timestamping)?
            }
            Err(e) => return Err(e),
        };
        let authority = LocalTimestampAuthority::new(
            self.config.timestamp.tsa_identifier.clone(),
            self.signer.clone(),
            key.key_id,
        );
        let trust_root = authority.trust_root()?;
        Ok(self.with_timestamp_authority(Arc::new(authority), trust_root))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn signer(&self) -> &SignatureService {
        &self.signer
    }

    pub fn log(&self) -> &Arc<HashChainLog> {
        &self.log
    }

    pub fn batches(&self) -> &Arc<BatchVerifier> {
        &self.batches
    }

    // ── Hash-chain log ────────────────────────────────────────────────────────

    /// Append `content` to `log_id`, linked to the previous entry.
    pub fn append_entry<T: Serialize + ?Sized>(&self, log_id: &str, content: &T) -> ProvenanceResult<Record> {
        self.log.append(log_id, content)
    }

    /// Check entries `start..=end` of `log_id`.
    pub fn verify_chain(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<ChainVerificationResult> {
        self.log.verify_chain(log_id, start, end)
    }

    // ── Signatures ────────────────────────────────────────────────────────────

    pub fn sign(&self, data: &[u8], key_id: &str) -> ProvenanceResult<Signature> {
        self.signer.sign(data, key_id)
    }

    /// `sign` abandoned after the configured `sign_timeout_ms`.
    pub async fn sign_with_timeout(&self, data: Vec<u8>, key_id: &str) -> ProvenanceResult<Signature> {
        self.signer
            .sign_with_timeout(data, key_id, self.config.sign_timeout())
            .await
    }

    pub fn verify(&self, data: &[u8], signature: &Signature, key_id: &str) -> ProvenanceResult<bool> {
        self.signer.verify(data, signature, key_id)
    }

    /// Sign `record` with the current signing key.
    pub fn seal_record(&self, record: &mut Record) -> ProvenanceResult<()> {
        let key = self.keys.current_key(KeyPurpose::Signing)?;
        self.signer.seal_record(record, &key.key_id)
    }

    pub fn verify_record(&self, record: &mut Record) -> ProvenanceResult<bool> {
        self.signer.verify_record(record)
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    pub fn generate_key(&self, key_type: KeyType, key_size: u32, purpose: KeyPurpose) -> ProvenanceResult<CryptoKey> {
        self.keys.generate_key(key_type, key_size, purpose)
    }

    pub fn rotate_key(&self, purpose: KeyPurpose, reason: &str) -> ProvenanceResult<CryptoKey> {
        self.keys.rotate_key(purpose, reason)
    }

    pub fn revoke_key(&self, key_id: &str, reason: &str) -> ProvenanceResult<CryptoKey> {
        self.keys.revoke_key(key_id, reason)
    }

    pub fn get_key(&self, key_id: &str) -> ProvenanceResult<CryptoKey> {
        self.keys.get_key(key_id)
    }

    pub fn current_key(&self, purpose: KeyPurpose) -> ProvenanceResult<CryptoKey> {
        self.keys.current_key(purpose)
    }

    // ── Merkle batches ────────────────────────────────────────────────────────

    pub fn build_batch(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<Arc<MerkleBatch>> {
        self.batches.build_batch(log_id, start, end)
    }

    /// Batch everything in `log_id` not yet covered by a batch.
    pub fn batch_pending(&self, log_id: &str) -> ProvenanceResult<Option<Arc<MerkleBatch>>> {
        self.batches.batch_pending(log_id)
    }

    pub fn prove(&self, leaf: &Hash256, batch_id: &str) -> ProvenanceResult<Vec<ProofStep>> {
        self.batches.prove(leaf, batch_id)
    }

    pub fn prove_record(&self, log_id: &str, index: u64) -> ProvenanceResult<RecordProof> {
        self.batches.prove_record(log_id, index)
    }

    pub fn verify_proof(&self, leaf: &Hash256, proof: &[ProofStep], root_hash: &str) -> bool {
        provenance_merkle::verify_proof(leaf, proof, root_hash)
    }

    /// Start background batching of `log_ids` with the configured thresholds.
    /// Must be called from within a tokio runtime.
    pub fn spawn_batcher(&self, log_ids: Vec<String>) -> BatchScheduler {
        BatchScheduler::spawn(Arc::clone(&self.batches), log_ids, self.config.batch_config())
    }

    // ── Timestamps ────────────────────────────────────────────────────────────

    fn timestamp_client(&self) -> ProvenanceResult<&TimestampClient> {
        self.timestamps.as_ref().ok_or_else(|| ProvenanceError::Config {
            reason: "no timestamp authority configured".to_string(),
        })
    }

    pub async fn timestamp(&self, data_hash: Hash256) -> ProvenanceResult<TimestampToken> {
        self.timestamp_client()?.timestamp(data_hash).await
    }

    pub fn verify_timestamp(&self, data_hash: &Hash256, token: &TimestampToken) -> ProvenanceResult<bool> {
        self.timestamp_client()?.verify_timestamp(data_hash, token)
    }

    /// Timestamp `record` and link its envelope to the token.
    pub async fn stamp_record(&self, record: &mut Record) -> ProvenanceResult<TimestampToken> {
        self.timestamp_client()?.stamp_record(record).await
    }

    // ── Manifests ─────────────────────────────────────────────────────────────

    pub fn generate_manifest(&self, dataset_path: &Path, name: &str, version: &str) -> ProvenanceResult<DatasetManifest> {
        provenance_manifest::generate(dataset_path, name, version)
    }

    pub fn validate_manifest(&self, manifest: &DatasetManifest, dataset_path: &Path) -> ProvenanceResult<ValidationResult> {
        provenance_manifest::validate(manifest, dataset_path)
    }
}

impl std::fmt::Debug for ProvenanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceEngine")
            .field("config", &self.config)
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}
