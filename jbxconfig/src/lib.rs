//! # jbxconfig - Configuration de la jukebox
//!
//! La configuration est un document YAML unique :
//!
//! 1. les valeurs par défaut embarquées (`jukebox.yaml`) ;
//! 2. fusionnées avec `<répertoire>/config.yaml` s'il existe ;
//! 3. surchargées par les variables `JUKEBOX_CONFIG__A__B=valeur` (clé `a.b`).
//!
//! Les clés sont insensibles à la casse. Le document fusionné est réécrit à
//! chaque chargement et à chaque modification, si bien que `config.yaml`
//! sert aussi de stockage durable pour un petit état d'exécution (les tokens
//! de l'hôte par exemple).
//!
//! ```no_run
//! use jbxconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! config.set_http_port(port + 1)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Les crates qui ont leur propre section (le compte Spotify) ajoutent leurs
//! accesseurs via un trait d'extension sur [`Config`].

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

pub mod encryption;

const DEFAULT_CONFIG: &str = include_str!("jukebox.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load Jukebox configuration"));
}

const ENV_CONFIG_DIR: &str = "JUKEBOX_CONFIG";
const ENV_PREFIX: &str = "JUKEBOX_CONFIG__";
const CONFIG_DIR_NAME: &str = ".jukebox";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_BASE_URL: &str = "localhost";
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

const HTTP_PORT_PATH: &[&str] = &["host", "http_port"];

/// Configuration chargée, partagée derrière un `Arc`
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    file: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Choisit le répertoire de configuration
    ///
    /// Ordre : `directory` s'il est non vide, `$JUKEBOX_CONFIG`, `./.jukebox`
    /// s'il existe, `~/.jukebox` s'il existe, sinon `./.jukebox`.
    fn locate(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }
        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from environment");
            return PathBuf::from(from_env);
        }

        let local = PathBuf::from(CONFIG_DIR_NAME);
        let home = dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME));
        [Some(local.clone()), home]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
            .unwrap_or(local)
    }

    /// Crée le répertoire si besoin et vérifie qu'il est lisible et inscriptible
    fn prepare(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create config directory {}", dir.display()))?;
        if !dir.is_dir() {
            return Err(anyhow!("{} is not a directory", dir.display()));
        }

        let probe = dir.join(".write_test");
        fs::write(&probe, b"ok")
            .with_context(|| format!("Config directory {} is not writable", dir.display()))?;
        fs::remove_file(&probe)?;
        fs::read_dir(dir)?;
        Ok(())
    }

    /// Résout et valide le répertoire de configuration
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::locate(directory);
        Self::prepare(&dir)?;
        Ok(dir.to_string_lossy().into_owned())
    }

    /// Charge la configuration
    ///
    /// `directory` vide : résolution automatique (voir [`Config::config_dir`]).
    /// Le document fusionné est écrit dans `config.yaml` avant de rendre la main.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let file = Path::new(&config_dir).join(CONFIG_FILE_NAME);
        info!(config_dir = %config_dir, "Using config directory");

        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read_to_string(&file) {
            Ok(text) => {
                let external: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("Invalid YAML in {}", file.display()))?;
                merge_yaml(&mut merged, &external);
                info!(config_file = %file.display(), "Loaded config file");
            }
            Err(_) => info!(config_file = %file.display(), "No config file, using defaults"),
        }

        let mut data = lowercase_keys(merged);
        for (name, raw) in env::vars() {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                let path: Vec<&str> = key.split("__").collect();
                let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
                if let Err(e) = assign(&mut data, &path, value) {
                    warn!("Ignoring {}: {}", name, e);
                }
            }
        }

        let config = Config {
            config_dir,
            file,
            data: Mutex::new(data),
        };
        config.save()?;
        Ok(config)
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        // Un panic pendant une écriture laisse une valeur YAML cohérente
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Répertoire contenant `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Écrit le document courant dans `config.yaml`
    pub fn save(&self) -> Result<()> {
        self.persist(&self.data())
    }

    /// Remplace `config.yaml` par `data` via un fichier temporaire renommé
    ///
    /// L'appelant détient le verrou : les écritures arrivent sur le disque
    /// dans l'ordre des modifications, et un arrêt brutal laisse l'ancien
    /// fichier intact.
    fn persist(&self, data: &Value) -> Result<()> {
        let yaml = serde_yaml::to_string(data)?;
        let staging = self.file.with_extension("yaml.tmp");
        fs::write(&staging, yaml)
            .with_context(|| format!("Cannot write {}", staging.display()))?;
        fs::rename(&staging, &self.file)
            .with_context(|| format!("Cannot replace {}", self.file.display()))
    }

    /// Modifie une valeur puis sauvegarde
    ///
    /// Les sections intermédiaires manquantes sont créées.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data();
        assign(&mut data, path, value)?;
        self.persist(&data)
    }

    /// Modifie plusieurs valeurs puis sauvegarde une fois, le tout sous un
    /// seul verrou
    ///
    /// Aucun lecteur ne voit un groupe de valeurs à moitié écrit.
    pub fn set_values(&self, entries: &[(&[&str], Value)]) -> Result<()> {
        let mut data = self.data();
        for (path, value) in entries {
            assign(&mut data, path, value.clone())?;
        }
        self.persist(&data)
    }

    /// Valeur brute, erreur si le chemin n'existe pas
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        lookup(&self.data(), path).cloned()
    }

    /// Valeur désérialisée en `T`
    pub fn get_typed<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        serde_yaml::from_value(self.get_value(path)?)
            .map_err(|e| anyhow!("Invalid value at {}: {}", path.join("."), e))
    }

    /// Chaîne non vide, `None` si absente, vide ou d'un autre type
    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    fn get_or<T: DeserializeOwned>(&self, path: &[&str], default: T) -> T {
        match self.get_value(path) {
            Ok(Value::Null) | Err(_) => default,
            Ok(_) => self.get_typed(path).unwrap_or_else(|e| {
                warn!("{}, using default", e);
                default
            }),
        }
    }

    /// Nom d'hôte utilisé dans les logs
    pub fn get_base_url(&self) -> String {
        self.get_string(&["host", "base_url"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Port HTTP, 8080 par défaut ou si la valeur est invalide
    ///
    /// Accepts a number or a numeric string (environment overrides).
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(HTTP_PORT_PATH) {
            Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                warn!("Invalid HTTP port '{}', using default {}", s, DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }),
            _ => self.get_or(HTTP_PORT_PATH, DEFAULT_HTTP_PORT),
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(HTTP_PORT_PATH, Value::Number(port.into()))
    }

    /// Taille du buffer de logs exposé par `/log-dump`
    pub fn get_log_cache_size(&self) -> Result<usize> {
        Ok(self.get_or(
            &["host", "logger", "buffer_capacity"],
            DEFAULT_LOG_BUFFER_CAPACITY,
        ))
    }

    pub fn get_log_enable_console(&self) -> Result<bool> {
        Ok(self.get_or(
            &["host", "logger", "enable_console"],
            DEFAULT_LOG_ENABLE_CONSOLE,
        ))
    }

    /// Niveau de log minimum (`TRACE` .. `ERROR`)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_string(&["host", "logger", "min_level"])
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }
}

/// Instance globale, chargée au premier accès
///
/// # Panics
///
/// Au premier accès, si le répertoire ne peut pas être créé ou si le YAML
/// est invalide.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn lookup<'a>(data: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().enumerate().try_fold(data, |node, (i, key)| match node {
        Value::Mapping(map) => map
            .get(&Value::String(key.to_lowercase()))
            .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join("."))),
        _ => Err(anyhow!("Path {} is not a section", path[..i].join("."))),
    })
}

fn assign(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };
    if data.is_null() {
        *data = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = data else {
        return Err(anyhow!("Cannot set {}: parent is not a section", path.join(".")));
    };

    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let child = map
            .entry(key)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        assign(child, rest, value)
    }
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Fusionne `external` dans `default`
///
/// Les sections sont fusionnées clé par clé ; scalaires et séquences sont
/// remplacés.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (k, v) in overlay {
                match base.get_mut(k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        base.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (slot, v) => *slot = v.clone(),
    }
}
