//! Persistance de l'enregistrement de credentials de l'hôte
//!
//! Il n'existe qu'un seul enregistrement (clé [`HOST_ID`]). Chaque écriture
//! remplace l'enregistrement précédent ; seul le refresh token est hérité
//! lorsque l'appelant n'en fournit pas de nouveau.

use anyhow::Result;
use async_trait::async_trait;
use jbxconfig::Config;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::sync::{Arc, Mutex};

/// Identifiant fixe de l'unique enregistrement
pub const HOST_ID: &str = "host";

/// Marge avant expiration en dessous de laquelle on rafraîchit (5 minutes)
pub const REFRESH_MARGIN_MS: i64 = 300_000;

/// Credentials OAuth du compte hôte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiration absolue, en millisecondes depuis l'epoch
    pub expires_at: i64,
}

impl CredentialRecord {
    /// Vrai si le token expire dans moins de [`REFRESH_MARGIN_MS`]
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at - REFRESH_MARGIN_MS
    }

    /// Construit le nouvel enregistrement en héritant du refresh token précédent
    pub fn superseding(
        previous: Option<&CredentialRecord>,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Self {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        Self {
            access_token: access_token.to_string(),
            refresh_token,
            expires_at,
        }
    }
}

/// Stockage durable de l'enregistrement de l'hôte
///
/// `save` lit l'enregistrement existant, y reporte l'ancien refresh token si
/// `refresh_token` est `None`, puis remplace l'enregistrement. Le dernier
/// écrivain gagne.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<CredentialRecord>>;

    async fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<()>;
}

/// Stockage en mémoire, perdu au redémarrage
///
/// ```
/// use jbxspotify::{CredentialStore, MemoryCredentialStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryCredentialStore::new();
/// store.save("A1", Some("R1"), 1_000).await.unwrap();
/// store.save("A2", None, 2_000).await.unwrap();
///
/// let record = store.load().await.unwrap().unwrap();
/// assert_eq!(record.access_token, "A2");
/// assert_eq!(record.refresh_token.as_deref(), Some("R1"));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée un stockage déjà peuplé
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CredentialRecord>> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>> {
        Ok(self.lock().clone())
    }

    async fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<()> {
        let mut record = self.lock();
        let next =
            CredentialRecord::superseding(record.as_ref(), access_token, refresh_token, expires_at);
        *record = Some(next);
        Ok(())
    }
}

const ACCESS_TOKEN_PATH: &[&str] = &["accounts", "spotify", "access_token"];
const REFRESH_TOKEN_PATH: &[&str] = &["accounts", "spotify", "refresh_token"];
const EXPIRES_AT_PATH: &[&str] = &["accounts", "spotify", "token_expires_at"];

/// Stockage dans le fichier de configuration YAML
///
/// ```yaml
/// accounts:
///   spotify:
///     access_token: "BQD..."
///     refresh_token: "AQB..."
///     token_expires_at: 1735000000000
/// ```
pub struct ConfigCredentialStore {
    config: Arc<Config>,
}

impl ConfigCredentialStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialStore for ConfigCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>> {
        let Some(access_token) = self.config.get_string(ACCESS_TOKEN_PATH) else {
            return Ok(None);
        };

        // Un enregistrement sans date d'expiration est considéré expiré
        let expires_at = match self.config.get_value(EXPIRES_AT_PATH) {
            Ok(Value::Null) | Err(_) => 0,
            Ok(_) => self.config.get_typed::<i64>(EXPIRES_AT_PATH)?,
        };

        Ok(Some(CredentialRecord {
            access_token,
            refresh_token: self.config.get_string(REFRESH_TOKEN_PATH),
            expires_at,
        }))
    }

    async fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<()> {
        let previous = self.load().await?;
        let next =
            CredentialRecord::superseding(previous.as_ref(), access_token, refresh_token, expires_at);

        let refresh_value = match next.refresh_token {
            Some(token) => Value::String(token),
            None => Value::Null,
        };

        self.config.set_values(&[
            (ACCESS_TOKEN_PATH, Value::String(next.access_token)),
            (REFRESH_TOKEN_PATH, refresh_value),
            (EXPIRES_AT_PATH, Value::Number(next.expires_at.into())),
        ])
    }
}
