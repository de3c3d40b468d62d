//! One-time resealing of legacy plaintext secrets

use crate::error::SecretError;
use crate::models::Endpoint;
use crate::tracing::span_names;

use super::CredentialVault;

/// A secret that could not be resealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    /// Position of the endpoint in the migrated list
    pub index: usize,
    /// Endpoint label at the time of migration
    pub label: String,
    /// Persisted name of the secret field
    pub field: &'static str,
    /// Why sealing failed
    pub error: SecretError,
}

/// Outcome of a migration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Endpoints examined
    pub examined: usize,
    /// Endpoints with at least one resealed secret
    pub modified: usize,
    /// Secrets resealed in total
    pub resealed: usize,
    /// Secrets left as plaintext
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    /// Returns true if anything changed and the list should be persisted
    #[must_use]
    pub const fn needs_persist(&self) -> bool {
        self.modified > 0
    }
}

/// Reseals every non-empty secret that is not already sealed.
///
/// Failures are recorded per secret and never stop the pass. Running the
/// migration on its own output modifies nothing.
pub fn migrate_endpoints(vault: &CredentialVault, endpoints: &mut [Endpoint]) -> MigrationReport {
    let span = tracing::info_span!(span_names::VAULT_MIGRATE, item_count = endpoints.len());
    let _enter = span.enter();

    let mut report = MigrationReport {
        examined: endpoints.len(),
        ..MigrationReport::default()
    };

    for (index, endpoint) in endpoints.iter_mut().enumerate() {
        let label = endpoint.label.clone();
        let mut modified = false;

        for (field, slot) in endpoint.secret_slots_mut() {
            if slot.is_empty() || vault.is_sealed(slot.as_stored()) {
                continue;
            }
            match vault.seal(slot.as_stored()) {
                Ok(sealed) => {
                    *slot = crate::models::StoredSecret::from_stored(sealed);
                    report.resealed += 1;
                    modified = true;
                }
                Err(error) => {
                    tracing::warn!(endpoint = %label, field, error = %error, "Failed to reseal legacy secret");
                    report.failures.push(MigrationFailure {
                        index,
                        label: label.clone(),
                        field,
                        error,
                    });
                }
            }
        }

        if modified {
            report.modified += 1;
        }
    }

    if report.resealed > 0 {
        tracing::info!(
            modified = report.modified,
            resealed = report.resealed,
            "Migrated legacy plaintext secrets"
        );
    }

    report
}
