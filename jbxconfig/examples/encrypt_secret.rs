//! Chiffre le client secret Spotify pour cette machine
//!
//! ```text
//! cargo run -p jbxconfig --example encrypt_secret -- <secret>          # affiche la valeur
//! cargo run -p jbxconfig --example encrypt_secret -- <secret> --store  # l'écrit dans config.yaml
//! cargo run -p jbxconfig --example encrypt_secret -- --check           # relit la valeur stockée
//! ```

use anyhow::{bail, Result};
use jbxconfig::encryption::{encrypt_secret, get_secret, is_encrypted};
use jbxconfig::get_config;
use serde_yaml::Value;

const SECRET_PATH: &[&str] = &["accounts", "spotify", "client_secret"];

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let flags: Vec<&str> = args.iter().map(String::as_str).collect();

    match flags.as_slice() {
        ["--check"] => check(),
        [secret] => {
            println!("{}", encrypt_secret(secret)?);
            Ok(())
        }
        [secret, "--store"] => store(secret),
        _ => bail!("usage: encrypt_secret <secret> [--store] | encrypt_secret --check"),
    }
}

fn store(secret: &str) -> Result<()> {
    let config = get_config();
    config.set_value(SECRET_PATH, Value::String(encrypt_secret(secret)?))?;
    println!("Encrypted secret written to {}/config.yaml", config.directory());
    Ok(())
}

fn check() -> Result<()> {
    let Some(stored) = get_config().get_string(SECRET_PATH) else {
        bail!("accounts.spotify.client_secret is not set");
    };

    let clear = get_secret(&stored)?;
    let state = if is_encrypted(&stored) { "encrypted" } else { "plain text" };
    println!("client_secret is stored in {} ({} characters)", state, clear.len());
    Ok(())
}
