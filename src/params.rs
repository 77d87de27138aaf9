//! Certificate generation parameters

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CertgenError, Result};

/// RSA modulus size used when nothing else is requested.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Validity period of [`CertParams::with_defaults`], in days.
pub const DEFAULT_VALID_FOR_DAYS: i64 = 365;

/// Subject organization written into every generated certificate.
pub const DEFAULT_ORGANIZATION: &str = "Acme Co";

/// Layout of textual start dates, e.g. `Jan 2 15:04:05 2006` (always UTC).
pub const START_DATE_FORMAT: &str = "%b %d %H:%M:%S %Y";

/// Named curves supported for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcdsaCurve {
    /// NIST P-224 (FIPS 186-3, section D.2.2)
    P224,
    /// NIST P-256 (FIPS 186-3, section D.2.3)
    P256,
    /// NIST P-384 (FIPS 186-3, section D.2.4)
    P384,
    /// NIST P-521 (FIPS 186-3, section D.2.5)
    P521,
}

impl EcdsaCurve {
    pub const ALL: [EcdsaCurve; 4] = [Self::P224, Self::P256, Self::P384, Self::P521];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P224 => "P224",
            Self::P256 => "P256",
            Self::P384 => "P384",
            Self::P521 => "P521",
        }
    }
}

impl fmt::Display for EcdsaCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcdsaCurve {
    type Err = CertgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "P224" => Ok(Self::P224),
            "P256" => Ok(Self::P256),
            "P384" => Ok(Self::P384),
            "P521" => Ok(Self::P521),
            other => Err(CertgenError::Configuration(format!(
                "Invalid or unsupported ECDSA curve '{other}' (expected P224, P256, P384 or P521)"
            ))),
        }
    }
}

/// Key algorithm of the generated pair. Exactly one is active per certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    Ecdsa(EcdsaCurve),
}

impl KeyAlgorithm {
    /// Select ECDSA when `curve` names a supported curve, RSA with `rsa_bits` otherwise.
    ///
    /// An empty or unknown curve name is not an error: it falls back to RSA.
    pub fn from_curve_name(curve: &str, rsa_bits: usize) -> Self {
        match curve.parse::<EcdsaCurve>() {
            Ok(curve) => Self::Ecdsa(curve),
            Err(e) => {
                if curve.is_empty() {
                    log::debug!("No ECDSA curve requested, using RSA-{rsa_bits}");
                } else {
                    log::warn!("{e}; falling back to RSA-{rsa_bits}");
                }
                Self::Rsa { bits: rsa_bits }
            }
        }
    }
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        Self::Rsa {
            bits: DEFAULT_RSA_BITS,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa { bits } => write!(f, "RSA-{bits}"),
            Self::Ecdsa(curve) => write!(f, "ECDSA-{curve}"),
        }
    }
}

/// Everything needed to generate one self-signed certificate.
#[derive(Debug, Clone)]
pub struct CertParams {
    /// Hostnames and IP literals, in the order they should appear as SANs.
    pub hosts: Vec<String>,
    pub valid_from: DateTime<Utc>,
    /// May be zero or negative, which yields a certificate that is never valid.
    pub valid_for: Duration,
    pub is_ca: bool,
    pub key_algorithm: KeyAlgorithm,
}

impl CertParams {
    /// RSA-2048 certificate for `localhost`, valid from now for one year.
    pub fn with_defaults() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            valid_from: Utc::now(),
            valid_for: Duration::days(DEFAULT_VALID_FOR_DAYS),
            is_ca: false,
            key_algorithm: KeyAlgorithm::default(),
        }
    }

    /// Replace the host list with the comma-separated entries of `hosts`.
    pub fn hosts(mut self, hosts: &str) -> Self {
        self.hosts = split_hosts(hosts);
        self
    }

    pub fn valid_from(mut self, valid_from: DateTime<Utc>) -> Self {
        self.valid_from = valid_from;
        self
    }

    pub fn valid_for(mut self, valid_for: Duration) -> Self {
        self.valid_for = valid_for;
        self
    }

    pub fn ca(mut self, is_ca: bool) -> Self {
        self.is_ca = is_ca;
        self
    }

    pub fn key_algorithm(mut self, key_algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = key_algorithm;
        self
    }

    /// End of the validity window. No clamping: a negative `valid_for` lands before `valid_from`.
    pub fn not_after(&self) -> Result<DateTime<Utc>> {
        self.valid_from
            .checked_add_signed(self.valid_for)
            .ok_or_else(|| {
                CertgenError::Configuration(format!(
                    "validity of {} from {} is out of range",
                    self.valid_for, self.valid_from
                ))
            })
    }
}

impl Default for CertParams {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Split a comma-joined host list. Entries are kept verbatim, empty ones included.
pub fn split_hosts(hosts: &str) -> Vec<String> {
    hosts.split(',').map(str::to_string).collect()
}

/// Parse a start date such as `Jan 2 15:04:05 2006` as UTC.
pub fn parse_start_date(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), START_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| CertgenError::Configuration(format!("Failed to parse creation date '{s}': {e}")))
}

/// One `<number><unit>` term of a duration such as `1h30m` or `1.5h`.
static DURATION_TERM: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(ns|us|µs|ms|s|m|h)"));

/// Parse a duration written as a sequence of `<number><unit>` terms
/// (`8760h`, `1h30m`, `1.5h`, `90s`, `-1h`), with units ns, us, ms, s, m and h.
/// A bare `0` is accepted; a leading `-` makes the duration negative.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let invalid = || CertgenError::Configuration(format!("invalid duration '{s}'"));
    let term_pattern = DURATION_TERM
        .as_ref()
        .map_err(|e| CertgenError::Configuration(format!("duration pattern: {e}")))?;

    let input = s.trim();
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    if body == "0" {
        return Ok(Duration::zero());
    }

    let mut nanos: i128 = 0;
    let mut end = 0;
    for term in term_pattern.captures_iter(body) {
        let whole = term.get(0).ok_or_else(invalid)?;
        if whole.start() != end {
            return Err(invalid());
        }
        end = whole.end();

        let unit: i128 = match &term[3] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            _ => 3_600 * 1_000_000_000,
        };
        let integer: i128 = term[1].parse().map_err(|_| invalid())?;
        nanos = integer
            .checked_mul(unit)
            .and_then(|n| nanos.checked_add(n))
            .ok_or_else(invalid)?;

        if let Some(fraction) = term.get(2) {
            let digits = fraction.as_str();
            let scale = 10i128.checked_pow(digits.len() as u32).ok_or_else(invalid)?;
            let numerator: i128 = digits.parse().map_err(|_| invalid())?;
            nanos = numerator
                .checked_mul(unit)
                .and_then(|n| nanos.checked_add(n / scale))
                .ok_or_else(invalid)?;
        }
    }
    if end == 0 || end != body.len() {
        return Err(invalid());
    }

    let nanos = i64::try_from(if negative { -nanos } else { nanos }).map_err(|_| invalid())?;
    Ok(Duration::nanoseconds(nanos))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn curve_names_round_trip() {
        for curve in EcdsaCurve::ALL {
            assert_eq!(curve.to_string().parse::<EcdsaCurve>().unwrap(), curve);
        }
        assert!("p256".parse::<EcdsaCurve>().is_err());
        assert!("".parse::<EcdsaCurve>().is_err());
    }

    #[test]
    fn unknown_curve_falls_back_to_rsa() {
        assert_eq!(
            KeyAlgorithm::from_curve_name("P384", 4096),
            KeyAlgorithm::Ecdsa(EcdsaCurve::P384)
        );
        assert_eq!(
            KeyAlgorithm::from_curve_name("", 3072),
            KeyAlgorithm::Rsa { bits: 3072 }
        );
        assert_eq!(
            KeyAlgorithm::from_curve_name("secp256k1", 2048),
            KeyAlgorithm::Rsa { bits: 2048 }
        );
    }

    #[test]
    fn defaults_are_rsa_2048_localhost_one_year() {
        let params = CertParams::with_defaults();
        assert_eq!(params.hosts, vec!["localhost"]);
        assert_eq!(params.key_algorithm, KeyAlgorithm::Rsa { bits: 2048 });
        assert_eq!(params.valid_for, Duration::days(365));
        assert!(!params.is_ca);
    }

    #[test]
    fn hosts_are_split_verbatim() {
        assert_eq!(
            split_hosts("example.com,10.0.0.1,::1"),
            vec!["example.com", "10.0.0.1", "::1"]
        );
        assert_eq!(split_hosts("a,,b "), vec!["a", "", "b "]);
        assert_eq!(split_hosts(""), vec![""]);
    }

    #[test]
    fn not_after_is_unclamped() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let params = CertParams::with_defaults()
            .valid_from(start)
            .valid_for(Duration::hours(-1));
        assert_eq!(
            params.not_after().unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("8760h").unwrap(), Duration::days(365));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("8760h0m0s").unwrap(), Duration::days(365));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::milliseconds(250));
        assert_eq!(parse_duration("-1h").unwrap(), Duration::hours(-1));
        assert_eq!(parse_duration("0").unwrap(), Duration::zero());

        for bad in [
            "",
            "h",
            "10",
            "1d",
            "1h 30m",
            "--1h",
            "1h30",
            "47261439850130342147690917.9999h",
            "99999999999999999999999999999999999999999h",
        ] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn start_date_layout() {
        assert_eq!(
            parse_start_date("Jan 2 15:04:05 2006").unwrap(),
            Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
        );
        assert_eq!(
            parse_start_date("Nov 21 08:00:00 2031").unwrap(),
            Utc.with_ymd_and_hms(2031, 11, 21, 8, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_start_date("2006-01-02"),
            Err(CertgenError::Configuration(_))
        ));
    }
}
