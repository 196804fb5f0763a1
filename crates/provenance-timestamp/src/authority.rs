//! An in-process time-stamping authority.
//!
//! `LocalTimestampAuthority` signs TST info with a key held by the engine's
//! own key manager. It serves tests and demos, and air-gapped deployments
//! that accept the host clock as their time source.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use provenance_contracts::{
    error::ProvenanceResult,
    hash::Hash256,
    key::KeyType,
    timestamp::HashAlgorithm,
};
use provenance_core::traits::TimestampAuthority;
use provenance_keys::SignatureService;

use crate::token::{SignedTstInfo, TstInfo, TST_VERSION};

/// Default policy identifier written into issued tokens.
pub const LOCAL_POLICY: &str = "provenance.local.v1";

/// The public key a client checks token signatures against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRoot {
    pub key_type: KeyType,
    pub public_key_pem: String,
}

/// Issues tokens signed by one key of the local key manager.
#[derive(Debug, Clone)]
pub struct LocalTimestampAuthority {
    identifier: String,
    policy: String,
    signer: SignatureService,
    key_id: String,
}

impl LocalTimestampAuthority {
    pub fn new(identifier: impl Into<String>, signer: SignatureService, key_id: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            policy: LOCAL_POLICY.to_string(),
            signer,
            key_id: key_id.into(),
        }
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    /// The trust root clients need to verify this authority's tokens.
    pub fn trust_root(&self) -> ProvenanceResult<TrustRoot> {
        let key = self.signer.keys().get_key(&self.key_id)?;
        Ok(TrustRoot {
            key_type: key.key_type,
            public_key_pem: key.public_key,
        })
    }
}

#[async_trait]
impl TimestampAuthority for LocalTimestampAuthority {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    async fn issue(&self, imprint: Hash256, algorithm: HashAlgorithm) -> ProvenanceResult<Vec<u8>> {
        let tst_info = TstInfo {
            version: TST_VERSION,
            policy: self.policy.clone(),
            message_imprint: imprint,
            hash_algorithm: algorithm,
            serial_number: Uuid::new_v4().to_string(),
            gen_time: Utc::now(),
            tsa: self.identifier.clone(),
        };
        let signature = self.signer.sign_blocking(tst_info.signed_bytes()?, &self.key_id).await?;
        debug!(serial = %tst_info.serial_number, imprint = %imprint, "issued timestamp token");
        SignedTstInfo { tst_info, signature }.encode()
    }
}
