use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::snn::validate_snn;
use crate::types::error::{AkaError, AkaResult};

// Countries allocating three-digit MNCs; everywhere else the MNC has two digits.
const THREE_DIGIT_MNC_MCCS: &[&str] = &[
    "302", "310", "311", "312", "313", "316", "334", "338", "342", "344", "346", "348",
    "354", "356", "358", "360", "365", "376", "405", "708", "722", "732",
];

/// Longest NAI accepted (RFC 7542).
const MAX_NAI_LENGTH: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Supi {
    Imsi { mcc: String, mnc: String, msin: String },
    Nai { username: String, realm: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    pub mcc: String,
    pub mnc: String,
}

impl Supi {
    pub fn parse(input: &str) -> AkaResult<Self> {
        if let Some(digits) = input.strip_prefix("imsi-") {
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(AkaError::InvalidIdentity(format!("IMSI must be numeric: {}", input)));
            }
            if digits.len() < 6 || digits.len() > 15 {
                return Err(AkaError::InvalidIdentity(format!(
                    "IMSI must have 6 to 15 digits, got {}",
                    digits.len()
                )));
            }

            let mcc = &digits[0..3];
            let mnc_len = if THREE_DIGIT_MNC_MCCS.contains(&mcc) { 3 } else { 2 };
            if digits.len() <= 3 + mnc_len {
                return Err(AkaError::InvalidIdentity("IMSI too short for MSIN".to_string()));
            }

            Ok(Supi::Imsi {
                mcc: mcc.to_string(),
                mnc: digits[3..3 + mnc_len].to_string(),
                msin: digits[3 + mnc_len..].to_string(),
            })
        } else if let Some(nai_part) = input.strip_prefix("nai-") {
            if nai_part.len() > MAX_NAI_LENGTH {
                return Err(AkaError::InvalidIdentity(format!(
                    "NAI longer than {} octets",
                    MAX_NAI_LENGTH
                )));
            }
            let parts: Vec<&str> = nai_part.split('@').collect();
            if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
                return Err(AkaError::InvalidIdentity(format!("Invalid NAI format: {}", input)));
            }
            Ok(Supi::Nai {
                username: parts[0].to_string(),
                realm: parts[1].to_string(),
            })
        } else {
            Err(AkaError::InvalidIdentity(format!("Invalid SUPI prefix: {}", input)))
        }
    }

    pub fn extract_plmn(&self) -> Option<Plmn> {
        match self {
            Supi::Imsi { mcc, mnc, .. } => Some(Plmn {
                mcc: mcc.clone(),
                mnc: mnc.clone(),
            }),
            Supi::Nai { .. } => None,
        }
    }
}

impl fmt::Display for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Supi::Imsi { mcc, mnc, msin } => write!(f, "imsi-{}{}{}", mcc, mnc, msin),
            Supi::Nai { username, realm } => write!(f, "nai-{}@{}", username, realm),
        }
    }
}

impl TryFrom<String> for Supi {
    type Error = AkaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Supi::parse(&value)
    }
}

impl From<Supi> for String {
    fn from(supi: Supi) -> Self {
        supi.to_string()
    }
}

impl Plmn {
    pub fn new(mcc: &str, mnc: &str) -> AkaResult<Self> {
        let plmn = Plmn {
            mcc: mcc.to_string(),
            mnc: mnc.to_string(),
        };
        plmn.validate()?;
        Ok(plmn)
    }

    /// Parses the compact `MCCMNC` form, e.g. `00101` or `310260`.
    pub fn parse(plmn_str: &str) -> AkaResult<Self> {
        if plmn_str.len() < 5 || plmn_str.len() > 6 {
            return Err(AkaError::InvalidIdentity(format!(
                "Invalid PLMN length: {}",
                plmn_str.len()
            )));
        }
        if !plmn_str.is_char_boundary(3) {
            return Err(AkaError::InvalidIdentity(format!("Invalid PLMN: {}", plmn_str)));
        }
        Plmn::new(&plmn_str[0..3], &plmn_str[3..])
    }

    pub fn validate(&self) -> AkaResult<()> {
        if self.mcc.len() != 3 || !self.mcc.chars().all(|c| c.is_ascii_digit()) {
            return Err(AkaError::InvalidIdentity(format!("Invalid MCC: {}", self.mcc)));
        }
        if (self.mnc.len() != 2 && self.mnc.len() != 3)
            || !self.mnc.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AkaError::InvalidIdentity(format!("Invalid MNC: {}", self.mnc)));
        }
        Ok(())
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mcc, self.mnc)
    }
}

/// Name of the visited network, bound into every key derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServingNetworkName {
    name: String,
    plmn: Plmn,
}

impl ServingNetworkName {
    pub fn parse(name: &str) -> AkaResult<Self> {
        let (mcc, mnc) = validate_snn(name).map_err(AkaError::InvalidIdentity)?;
        Ok(Self {
            name: name.to_string(),
            plmn: Plmn { mcc, mnc },
        })
    }

    pub fn for_plmn(plmn: &Plmn) -> AkaResult<Self> {
        plmn.validate()?;
        Self::parse(&format!("5G:mnc{:0>3}.mcc{}.3gppnetwork.org", plmn.mnc, plmn.mcc))
    }

    pub fn plmn(&self) -> &Plmn {
        &self.plmn
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.name.as_bytes()
    }
}

impl fmt::Display for ServingNetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<String> for ServingNetworkName {
    type Error = AkaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ServingNetworkName::parse(&value)
    }
}

impl From<ServingNetworkName> for String {
    fn from(snn: ServingNetworkName) -> Self {
        snn.name
    }
}
