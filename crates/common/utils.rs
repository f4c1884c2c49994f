use crate::errors::ChainIdError;

/// Parses a host chain-id string of the form `<name>_<number>-<epoch>` (for example
/// `hostevm_11820-1`) into its numeric EVM chain id.
pub fn parse_chain_id(chain_id: &str) -> Result<u64, ChainIdError> {
    let chain_id = chain_id.trim();
    if chain_id.is_empty() {
        return Err(ChainIdError::Empty(chain_id.to_string()));
    }
    if chain_id.len() > 48 {
        return Err(ChainIdError::InvalidFormat(chain_id.to_string()));
    }

    let (name, rest) = chain_id
        .rsplit_once('_')
        .ok_or_else(|| ChainIdError::InvalidFormat(chain_id.to_string()))?;
    let (number, epoch) = rest
        .split_once('-')
        .ok_or_else(|| ChainIdError::InvalidFormat(chain_id.to_string()))?;

    let valid_name = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_name {
        return Err(ChainIdError::InvalidFormat(chain_id.to_string()));
    }

    if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
        return Err(ChainIdError::InvalidEpoch(chain_id.to_string()));
    }

    // leading zeroes are rejected so that a chain id has a single textual form
    if number.is_empty() || number.starts_with('0') || !number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ChainIdError::InvalidNumber(chain_id.to_string()));
    }
    number
        .parse::<u64>()
        .map_err(|_| ChainIdError::InvalidNumber(chain_id.to_string()))
}
