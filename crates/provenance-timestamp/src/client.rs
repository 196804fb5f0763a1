//! Requesting and checking trusted timestamps.

use std::sync::Arc;

use tracing::{debug, info, warn};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
    record::Record,
    timestamp::{HashAlgorithm, TimestampToken},
};
use provenance_core::{canonical, traits::TimestampAuthority};
use provenance_keys::verify_with_public_key;

use crate::authority::TrustRoot;
use crate::retry::RetryPolicy;
use crate::token::{token_from_bytes, SignedTstInfo};

/// Talks to one authority and verifies its tokens against one trust root.
pub struct TimestampClient {
    authority: Arc<dyn TimestampAuthority>,
    trust_root: TrustRoot,
    policy: RetryPolicy,
}

impl TimestampClient {
    pub fn new(authority: Arc<dyn TimestampAuthority>, trust_root: TrustRoot, policy: RetryPolicy) -> Self {
        Self {
            authority,
            trust_root,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Obtain a token over `data_hash`.
    ///
    /// Only the hash is sent. Attempts that time out or fail with a
    /// transient error are retried with exponential backoff; when every
    /// attempt has failed the result is `TimestampUnavailable`. Any other
    /// error ends the call at once.
    pub async fn timestamp(&self, data_hash: Hash256) -> ProvenanceResult<TimestampToken> {
        let attempts = self.policy.attempts();
        let timeout_ms = self.policy.request_timeout.as_millis() as u64;
        let mut last_failure = String::new();

        for attempt in 0..attempts {
            let request = self.authority.issue(data_hash, HashAlgorithm::Sha3_256);
            match tokio::time::timeout(self.policy.request_timeout, request).await {
                Ok(Ok(bytes)) => {
                    let token = token_from_bytes(bytes)?;
                    if token.message_imprint != data_hash {
                        return Err(ProvenanceError::MalformedInput {
                            reason: format!(
                                "authority stamped {} instead of {data_hash}",
                                token.message_imprint
                            ),
                        });
                    }
                    info!(
                        imprint = %data_hash,
                        serial = %token.serial_number,
                        attempt = attempt + 1,
                        "timestamp issued"
                    );
                    return Ok(token);
                }
                Ok(Err(e)) if e.is_transient() => last_failure = e.to_string(),
                Ok(Err(e)) => return Err(e),
                Err(_) => last_failure = format!("request timed out after {timeout_ms} ms"),
            }

            if attempt + 1 < attempts {
                let delay = self.policy.backoff(attempt);
                warn!(
                    tsa = %self.authority.identifier(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    reason = %last_failure,
                    "timestamp attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(ProvenanceError::TimestampUnavailable {
            reason: last_failure,
            attempts,
        })
    }

    /// Check that `token` is a valid timestamp of `data_hash`.
    ///
    /// A token for a different hash is `false` without decoding anything.
    /// A token whose bytes do not decode is `MalformedInput`. Otherwise the
    /// token's fields must agree with the signed TST info it carries, and
    /// the signature must verify against the trust root.
    pub fn verify_timestamp(&self, data_hash: &Hash256, token: &TimestampToken) -> ProvenanceResult<bool> {
        if token.message_imprint != *data_hash {
            debug!(imprint = %token.message_imprint, expected = %data_hash, "timestamp covers a different hash");
            return Ok(false);
        }

        let signed = SignedTstInfo::decode(&token.timestamp_token)?;
        let info = &signed.tst_info;

        let consistent = canonical::hash_bytes(&token.timestamp_token) == token.token_hash
            && info.message_imprint == *data_hash
            && info.gen_time == token.timestamp_value
            && info.serial_number == token.serial_number
            && info.tsa == token.tsa_identifier
            && info.hash_algorithm == token.hash_algorithm;
        if !consistent {
            warn!(serial = %token.serial_number, "timestamp token fields disagree with its signed content");
            return Ok(false);
        }

        if signed.algorithm() != self.trust_root.key_type.signature_algorithm() {
            warn!(algorithm = %signed.algorithm(), "timestamp signed with an algorithm the trust root cannot produce");
            return Ok(false);
        }
        verify_with_public_key(
            self.trust_root.key_type,
            &self.trust_root.public_key_pem,
            &info.signed_bytes()?,
            &signed.signature.bytes,
        )
    }

    /// Timestamp `record.entry_hash` and point the record's envelope at the
    /// token.
    pub async fn stamp_record(&self, record: &mut Record) -> ProvenanceResult<TimestampToken> {
        let token = self.timestamp(record.entry_hash()).await?;
        record.envelope.timestamp_token_ref = Some(token.token_hash);
        Ok(token)
    }
}

impl std::fmt::Debug for TimestampClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampClient")
            .field("tsa", &self.authority.identifier())
            .field("policy", &self.policy)
            .finish()
    }
}
