//! Interface to the on-chain credential registry

use async_trait::async_trait;

use crate::error::AuthError;
use crate::hasher::CredentialFingerprint;
use crate::types::AccountIdentity;

/// Capability set of the credential registry
///
/// Every call may suspend on the network or on wallet confirmation. The
/// registry holds at most one fingerprint per account and rejects a second
/// registration with [`AuthError::DuplicateRegistration`].
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// Whether `account` has a registered fingerprint
    async fn is_registered(&self, account: &AccountIdentity) -> Result<bool, AuthError>;

    /// Store `fingerprint` for `account`; a user-authorized, state-mutating call
    async fn register(
        &self,
        account: &AccountIdentity,
        fingerprint: &CredentialFingerprint,
    ) -> Result<(), AuthError>;

    /// Read back the fingerprint stored for `account`
    async fn get_stored_fingerprint(
        &self,
        account: &AccountIdentity,
    ) -> Result<CredentialFingerprint, AuthError>;
}
