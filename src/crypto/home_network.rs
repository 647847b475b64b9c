use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::Plmn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLocation {
    Home,
    Visited,
}

/// Compares two PLMNs, ignoring MNC zero padding (`01` and `001` are the
/// same network).
pub fn same_network(a: &Plmn, b: &Plmn) -> bool {
    if a.mcc != b.mcc {
        return false;
    }
    match (a.mnc.parse::<u32>(), b.mnc.parse::<u32>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.mnc == b.mnc,
    }
}

pub fn check_home_network(serving: &Plmn, home: &Plmn) -> NetworkLocation {
    if same_network(serving, home) {
        NetworkLocation::Home
    } else {
        NetworkLocation::Visited
    }
}

/// Refuses a concealed identity addressed to another home network.
pub fn ensure_addressed_to(claimed: &Plmn, own: &Plmn) -> AkaResult<()> {
    if same_network(claimed, own) {
        Ok(())
    } else {
        Err(AkaError::UnknownHomeNetwork(claimed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plmn(mcc: &str, mnc: &str) -> Plmn {
        Plmn::new(mcc, mnc).unwrap()
    }

    #[test]
    fn test_check_home_network() {
        assert_eq!(
            check_home_network(&plmn("001", "01"), &plmn("001", "001")),
            NetworkLocation::Home
        );
        assert_eq!(
            check_home_network(&plmn("001", "02"), &plmn("001", "01")),
            NetworkLocation::Visited
        );
        assert_eq!(
            check_home_network(&plmn("002", "01"), &plmn("001", "01")),
            NetworkLocation::Visited
        );
    }

    #[test]
    fn test_ensure_addressed_to() {
        assert!(ensure_addressed_to(&plmn("310", "410"), &plmn("310", "410")).is_ok());
        assert!(matches!(
            ensure_addressed_to(&plmn("310", "410"), &plmn("310", "260")),
            Err(AkaError::UnknownHomeNetwork(_))
        ));
    }
}
