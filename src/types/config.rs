use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::{Plmn, ServingNetworkName};

/// How the anonymity key is produced. Resolved once per deployment; every
/// role of a deployment must agree on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnonymityMode {
    #[default]
    Derived,
    Zero,
}

impl FromStr for AnonymityMode {
    type Err = AkaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "derived" => Ok(AnonymityMode::Derived),
            "zero" => Ok(AnonymityMode::Zero),
            other => Err(AkaError::Config(format!(
                "AKA_ANONYMITY_KEY must be 'derived' or 'zero', got '{}'",
                other
            ))),
        }
    }
}

/// Whether the subscriber checks the physical-binding tag itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhysicalBindingPolicy {
    /// The tag is relayed but never compared by the subscriber.
    #[default]
    Implicit,
    /// The subscriber recomputes the tag from its own channel observation
    /// and aborts on mismatch.
    Enforce,
}

impl FromStr for PhysicalBindingPolicy {
    type Err = AkaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" => Ok(PhysicalBindingPolicy::Implicit),
            "enforce" => Ok(PhysicalBindingPolicy::Enforce),
            other => Err(AkaError::Config(format!(
                "AKA_PHYSICAL_BINDING must be 'implicit' or 'enforce', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AkaConfig {
    pub home_plmn: Plmn,
    pub serving_network_name: ServingNetworkName,
    pub allowed_plmns: Option<Vec<Plmn>>,
    pub anonymity_mode: AnonymityMode,
    pub binding_policy: PhysicalBindingPolicy,
    pub receive_timeout: Duration,
    pub session_ttl: Duration,
}

const DEFAULT_PLMN: &str = "00101";
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SESSION_TTL_SECS: u64 = 60;

impl Default for AkaConfig {
    fn default() -> Self {
        let plmn = Plmn {
            mcc: "001".to_string(),
            mnc: "01".to_string(),
        };
        let serving_network_name = ServingNetworkName::for_plmn(&plmn)
            .unwrap_or_else(|_| unreachable!("default PLMN is well formed"));

        Self {
            home_plmn: plmn,
            serving_network_name,
            allowed_plmns: None,
            anonymity_mode: AnonymityMode::default(),
            binding_policy: PhysicalBindingPolicy::default(),
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl AkaConfig {
    pub fn from_env() -> AkaResult<Self> {
        let home_plmn = Plmn::parse(&var_or("HOME_PLMN", DEFAULT_PLMN))
            .map_err(|e| AkaError::Config(format!("HOME_PLMN: {}", e)))?;

        let serving_plmn = Plmn::parse(&var_or("SERVING_PLMN", DEFAULT_PLMN))
            .map_err(|e| AkaError::Config(format!("SERVING_PLMN: {}", e)))?;
        let serving_network_name = ServingNetworkName::for_plmn(&serving_plmn)
            .map_err(|e| AkaError::Config(format!("SERVING_PLMN: {}", e)))?;

        let allowed_plmns = parse_allowed_plmns(env::var("ALLOWED_PLMNS").ok().as_deref())?;

        let anonymity_mode = var_or("AKA_ANONYMITY_KEY", "derived").parse()?;
        let binding_policy = var_or("AKA_PHYSICAL_BINDING", "implicit").parse()?;

        let receive_timeout = Duration::from_millis(parse_positive(
            "AKA_RECEIVE_TIMEOUT_MS",
            DEFAULT_RECEIVE_TIMEOUT_MS,
        )?);
        let session_ttl =
            Duration::from_secs(parse_positive("AKA_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?);

        Ok(Self {
            home_plmn,
            serving_network_name,
            allowed_plmns,
            anonymity_mode,
            binding_policy,
            receive_timeout,
            session_ttl,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_positive(name: &str, default: u64) -> AkaResult<u64> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(AkaError::Config(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
        Ok(value) => Ok(value),
    }
}

/// Parses `ALLOWED_PLMNS`: comma separated `MCCMNC` or `MCC-MNC` entries.
/// A blank list means no restriction; any entry that is not a PLMN fails.
pub(crate) fn parse_allowed_plmns(raw: Option<&str>) -> AkaResult<Option<Vec<Plmn>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let list = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            Plmn::parse(&entry.replace('-', ""))
                .map_err(|e| AkaError::Config(format!("ALLOWED_PLMNS entry '{}': {}", entry, e)))
        })
        .collect::<AkaResult<Vec<_>>>()?;
    Ok((!list.is_empty()).then_some(list))
}
