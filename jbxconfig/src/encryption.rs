//! Chiffrement des secrets de configuration
//!
//! Un secret (le client secret Spotify) peut être écrit dans `config.yaml`
//! en clair ou sous la forme `encrypted:BASE64`. La clé AES-256-GCM est le
//! SHA-256 de l'identifiant de la machine : une valeur chiffrée ne se
//! déchiffre que sur la machine qui l'a produite.
//!
//! Format : `nonce (12 octets) || chiffré+tag`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

const ENCRYPTED_PREFIX: &str = "encrypted:";
const NONCE_LEN: usize = 12;
const KEY_CONTEXT: &[u8] = b"jukebox-config-encryption-v1";
const NONCE_CONTEXT: &[u8] = b"jukebox-nonce-v1";

#[cfg(target_os = "linux")]
fn machine_id() -> Result<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("No machine-id found"))
}

#[cfg(target_os = "macos")]
fn machine_id() -> Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-d2", "-c", "IOPlatformExpertDevice"])
        .output()
        .context("ioreg unavailable")?;

    // "IOPlatformUUID" = "XXXXXXXX-XXXX-..."
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('"').nth(3))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("IOPlatformUUID not found"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn machine_id() -> Result<String> {
    Err(anyhow!("Secret encryption is not supported on this platform"))
}

/// Chiffreur lié à la machine courante
struct MachineCipher {
    cipher: Aes256Gcm,
}

impl MachineCipher {
    fn new() -> Result<Self> {
        let key = Sha256::new()
            .chain_update(machine_id()?.as_bytes())
            .chain_update(KEY_CONTEXT)
            .finalize();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Nonce dérivé du secret : chiffrer deux fois la même valeur donne la
    /// même chaîne, et le fichier n'est pas réécrit pour rien.
    fn nonce_for(secret: &str) -> [u8; NONCE_LEN] {
        let digest = Sha256::new()
            .chain_update(secret.as_bytes())
            .chain_update(NONCE_CONTEXT)
            .finalize();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }

    fn seal(&self, secret: &str) -> Result<Vec<u8>> {
        let nonce = Self::nonce_for(secret);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), secret.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;
        Ok([nonce.as_slice(), sealed.as_slice()].concat())
    }

    fn open(&self, payload: &[u8]) -> Result<String> {
        if payload.len() < NONCE_LEN {
            return Err(anyhow!("Invalid ciphertext (too short)"));
        }
        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|e| anyhow!("Decryption failed (wrong machine or corrupted data): {}", e))?;
        String::from_utf8(plain).context("Decrypted secret is not UTF-8")
    }
}

/// Chiffre un secret, renvoie `encrypted:BASE64`
pub fn encrypt_secret(secret: &str) -> Result<String> {
    let payload = MachineCipher::new()?.seal(secret)?;
    Ok(format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(payload)))
}

/// Déchiffre une valeur `encrypted:BASE64`
///
/// # Errors
///
/// Échoue si le préfixe manque, si le base64 est invalide, ou si la valeur
/// a été chiffrée sur une autre machine.
pub fn decrypt_secret(encrypted: &str) -> Result<String> {
    let encoded = encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted secret format (missing prefix)"))?;
    let payload = STANDARD
        .decode(encoded)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;
    MachineCipher::new()?.open(&payload)
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Valeur en clair, qu'elle soit stockée chiffrée ou non
pub fn get_secret(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_secret(value)
    } else {
        Ok(value.to_string())
    }
}
