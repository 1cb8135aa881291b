//! Source login password: env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::path::Path;

use crate::utils::config::PackagePaths;

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().env_login_pass();
    let from_env = || {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    if let Some(s) = from_env() {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return from_env();
    }
    None
}

/// Read the password for `login`: env (BIOTRAWL_LOGIN_PASS) → .env in `dir` → secure prompt.
pub fn get_login_password(dir: &Path, login: &str) -> Result<String> {
    if let Some(s) = try_env_then_dotenv(dir) {
        info!("Login password found in environment");
        return Ok(s);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let pass = rpassword::prompt_password(format!("{} Password for {}: ", label, login))
        .context("read login password")?;
    Ok(pass.trim().to_string())
}
