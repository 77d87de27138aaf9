use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use certgen::params::{DEFAULT_RSA_BITS, parse_duration, parse_start_date};
use certgen::{CertParams, KeyAlgorithm};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::cli::CertArgs;

pub const DEFAULT_CERT_FILE: &str = "cert.pem";
pub const DEFAULT_KEY_FILE: &str = "key.pem";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8443";

/// On‑disk TOML defaults. Every key is optional; CLI flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CertgenConfig {
    /// Comma-separated hosts, same syntax as `--host`
    pub hosts: Option<String>,
    pub start_date: Option<String>,
    /// Go-style duration, e.g. "8760h"
    pub duration: Option<String>,
    pub ca: Option<bool>,
    pub rsa_bits: Option<usize>,
    pub ecdsa_curve: Option<String>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub addr: Option<SocketAddr>,
}

/// `<config dir>/certgen/certgen.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("certgen").join("certgen.toml"))
}

/// Load the config file. An explicit path must exist; the default one is optional.
pub fn load(explicit: Option<&Path>) -> Result<CertgenConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(CertgenConfig::default()),
        },
    };

    let cfg_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let cfg: CertgenConfig = toml::from_str(&cfg_str)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;

    info!("Using config from: {}", path.display());
    Ok(cfg)
}

/// Effective settings after merging CLI flags, the config file and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub params: CertParams,
    /// False when neither `--host` nor `hosts` supplied a non-empty value.
    pub hosts_given: bool,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub addr: SocketAddr,
}

impl Settings {
    pub fn resolve(cli: &CertArgs, addr: Option<SocketAddr>, file: CertgenConfig) -> Result<Self> {
        let hosts = cli.host.clone().or(file.hosts).unwrap_or_default();
        let hosts_given = !hosts.is_empty();

        let valid_from = match cli.start_date.as_deref().or(file.start_date.as_deref()) {
            Some(s) if !s.is_empty() => parse_start_date(s)?,
            _ => Utc::now(),
        };

        let valid_for = match cli.duration {
            Some(duration) => duration,
            None => match file.duration.as_deref() {
                Some(s) => parse_duration(s).context("Invalid duration in config file")?,
                None => parse_duration("8760h")?,
            },
        };

        let rsa_bits = cli.rsa_bits.or(file.rsa_bits).unwrap_or(DEFAULT_RSA_BITS);
        let curve = cli
            .ecdsa_curve
            .clone()
            .or(file.ecdsa_curve)
            .unwrap_or_default();
        let key_algorithm = KeyAlgorithm::from_curve_name(&curve, rsa_bits);

        let mut params = CertParams::with_defaults()
            .valid_from(valid_from)
            .valid_for(valid_for)
            .ca(cli.ca.or(file.ca).unwrap_or(false))
            .key_algorithm(key_algorithm);
        if hosts_given {
            params = params.hosts(&hosts);
        }

        let addr = match addr.or(file.addr) {
            Some(addr) => addr,
            None => DEFAULT_ADDR.parse().context("Invalid default address")?,
        };

        Ok(Self {
            params,
            hosts_given,
            cert_file: cli
                .certfile
                .clone()
                .or(file.cert_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_FILE)),
            key_file: cli
                .pemfile
                .clone()
                .or(file.key_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_FILE)),
            addr,
        })
    }
}
