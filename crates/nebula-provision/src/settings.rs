//! Network-wide settings.

use nebula_core::{NetworkSettings, ProvisionError, Result, SettingsUpdate};
use std::sync::Arc;
use tracing::debug;

use crate::issuer;
use crate::store::Store;
use crate::subnet;

/// Reads and updates the singleton [`NetworkSettings`] row.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn Store>,
}

impl SettingsService {
    /// Create a service over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current settings, created with defaults on first access.
    pub async fn get(&self) -> Result<NetworkSettings> {
        if let Some(settings) = self.store.get_settings().await? {
            return Ok(settings);
        }
        debug!("creating default network settings");
        self.store.save_settings(NetworkSettings::default()).await
    }

    /// Apply the non-empty, non-zero fields of `update`.
    pub async fn update(&self, update: SettingsUpdate) -> Result<NetworkSettings> {
        let mut settings = self.get().await?;

        if let Some(subnet) = non_empty(update.default_subnet) {
            if subnet::parse_cidr(&subnet).is_none() {
                return Err(ProvisionError::Validation(format!(
                    "invalid default subnet: {subnet}"
                )));
            }
            settings.default_subnet = subnet;
        }
        if let Some(port) = update.handshake_port.filter(|p| *p != 0) {
            settings.handshake_port = port;
        }
        if let Some(days) = update.certificate_validity_days.filter(|d| *d != 0) {
            if days < 0 {
                return Err(ProvisionError::Validation(
                    "certificate validity must be greater than 0".into(),
                ));
            }
            issuer::check_validity_days(days)?;
            settings.certificate_validity_days = days;
        }
        if let Some(hosts) = non_empty(update.lighthouse_hosts) {
            settings.lighthouse_hosts = hosts;
        }
        if let Some(description) = non_empty(update.description) {
            settings.description = description;
        }

        self.store.save_settings(settings).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_defaults_created_once() {
        let store = Arc::new(MemoryStore::new());
        let service = SettingsService::new(store.clone());

        assert!(store.get_settings().await.unwrap().is_none());
        let settings = service.get().await.unwrap();
        assert_eq!(settings.default_subnet, "10.10.0.0/24");
        assert!(store.get_settings().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_partial_update() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));

        let updated = service
            .update(SettingsUpdate {
                handshake_port: Some(4343),
                description: Some("  ".into()),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.handshake_port, 4343);
        assert_eq!(updated.default_subnet, "10.10.0.0/24");
        assert_eq!(updated.certificate_validity_days, 365);
        assert!(updated.description.is_empty());
    }

    #[tokio::test]
    async fn test_zero_fields_are_skipped() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));

        let updated = service
            .update(SettingsUpdate {
                handshake_port: Some(0),
                certificate_validity_days: Some(0),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.handshake_port, 4242);
        assert_eq!(updated.certificate_validity_days, 365);
    }

    #[tokio::test]
    async fn test_rejects_bad_values() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));

        let bad_subnet = SettingsUpdate {
            default_subnet: Some("10.0.0.0".into()),
            ..SettingsUpdate::default()
        };
        assert!(service.update(bad_subnet).await.unwrap_err().is_validation());

        for days in [-1, 36_501, i64::MAX] {
            let bad_days = SettingsUpdate {
                certificate_validity_days: Some(days),
                ..SettingsUpdate::default()
            };
            assert!(service.update(bad_days).await.unwrap_err().is_validation(), "{days}");
        }

        assert_eq!(service.get().await.unwrap().certificate_validity_days, 365);
    }
}
