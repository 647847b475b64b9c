use regex::Regex;
use std::sync::OnceLock;

use crate::crypto::home_network::same_network;
use crate::types::identity::{Plmn, ServingNetworkName};

static SNN_REGEX: OnceLock<Regex> = OnceLock::new();

/// Checks the serving network name shape and returns its `(mcc, mnc)`.
pub fn validate_snn(snn: &str) -> Result<(String, String), String> {
    let regex = SNN_REGEX.get_or_init(|| {
        Regex::new(r"^5G:mnc(\d{3})\.mcc(\d{3})\.3gppnetwork\.org$")
            .unwrap_or_else(|_| unreachable!("SNN pattern is a valid regex"))
    });

    let captures = regex
        .captures(snn)
        .ok_or_else(|| format!("Invalid Serving Network Name format: {}", snn))?;

    let mnc = captures
        .get(1)
        .ok_or_else(|| "Missing MNC in SNN".to_string())?
        .as_str()
        .to_string();

    let mcc = captures
        .get(2)
        .ok_or_else(|| "Missing MCC in SNN".to_string())?
        .as_str()
        .to_string();

    Ok((mcc, mnc))
}

/// Checks the serving network against the home network's allow-list. MNC
/// zero padding is ignored and an absent or empty list admits every network.
pub fn verify_snn_authorization(
    snn: &ServingNetworkName,
    allowed_plmns: Option<&[Plmn]>,
) -> Result<(), String> {
    let Some(allowed) = allowed_plmns.filter(|list| !list.is_empty()) else {
        return Ok(());
    };

    let serving = snn.plmn();
    let authorized = allowed.iter().any(|plmn| same_network(plmn, serving));

    if authorized {
        Ok(())
    } else {
        Err(format!("Serving network {} (PLMN {}) is not authorized", snn, serving))
    }
}
