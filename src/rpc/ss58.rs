//! SS58 address codec
//!
//! Addresses are chain-agnostic encodings of a 32-byte public key; the
//! prefix only selects the network the string is "formatted" for.

use blake2::{Blake2b512, Digest};

use crate::error::AddressError;

pub type AccountId = [u8; 32];

const CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

/// Decode an SS58 string (any prefix) or a `0x` hex public key
pub fn decode(address: &str) -> Result<(AccountId, u16), AddressError> {
    if let Some(hex_key) = address.strip_prefix("0x") {
        let bytes = hex::decode(hex_key).map_err(|e| AddressError::Base58(e.to_string()))?;
        let account: AccountId = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        return Ok((account, 42));
    }

    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;

    let (prefix_len, prefix) = match data.first() {
        Some(&b) if b < 64 => (1, b as u16),
        Some(&b) if b < 128 => {
            let second = *data.get(1).ok_or(AddressError::Length(data.len()))?;
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (2, (lower as u16) | ((upper as u16) << 8))
        }
        Some(&b) => return Err(AddressError::Prefix(b as u16)),
        None => return Err(AddressError::Length(0)),
    };

    if data.len() != prefix_len + 32 + CHECKSUM_LEN {
        return Err(AddressError::Length(data.len()));
    }

    let body_len = prefix_len + 32;
    let hash = checksum(&data[..body_len]);
    if data[body_len..] != hash[..CHECKSUM_LEN] {
        return Err(AddressError::Checksum);
    }

    let mut account = [0u8; 32];
    account.copy_from_slice(&data[prefix_len..body_len]);
    Ok((account, prefix))
}

/// Decode and keep only the public key
pub fn account_id(address: &str) -> Result<AccountId, AddressError> {
    decode(address).map(|(account, _)| account)
}

/// Encode a public key for the network with the given prefix
pub fn encode(account: &AccountId, prefix: u16) -> Result<String, AddressError> {
    let mut data = match prefix {
        0..=63 => vec![prefix as u8],
        64..=16_383 => {
            let first = ((prefix & 0b0000_0000_1111_1100) as u8) >> 2;
            let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
            vec![first | 0b0100_0000, second]
        }
        _ => return Err(AddressError::Prefix(prefix)),
    };
    data.extend_from_slice(account);
    let hash = checksum(&data);
    data.extend_from_slice(&hash[..CHECKSUM_LEN]);
    Ok(bs58::encode(data).into_string())
}

/// Re-encode any address for another network
pub fn format_for(address: &str, prefix: u16) -> Result<String, AddressError> {
    encode(&account_id(address)?, prefix)
}

fn checksum(data: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(CHECKSUM_PREFIX);
    hasher.update(data);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_HEX: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";
    const ALICE_GENERIC: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_POLKADOT: &str = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";

    fn alice() -> AccountId {
        let mut account = [0u8; 32];
        account.copy_from_slice(&hex::decode(ALICE_HEX).unwrap());
        account
    }

    #[test]
    fn test_decode_known_addresses() {
        assert_eq!(decode(ALICE_GENERIC).unwrap(), (alice(), 42));
        assert_eq!(decode(ALICE_POLKADOT).unwrap(), (alice(), 0));
    }

    #[test]
    fn test_encode_known_addresses() {
        assert_eq!(encode(&alice(), 42).unwrap(), ALICE_GENERIC);
        assert_eq!(format_for(ALICE_GENERIC, 0).unwrap(), ALICE_POLKADOT);
    }

    #[test]
    fn test_two_byte_prefix_round_trip() {
        let encoded = encode(&alice(), 1284).unwrap();
        assert_eq!(decode(&encoded).unwrap(), (alice(), 1284));
    }

    #[test]
    fn test_hex_public_key() {
        assert_eq!(account_id(&format!("0x{}", ALICE_HEX)).unwrap(), alice());
    }

    #[test]
    fn test_bad_checksum() {
        let mut tampered = ALICE_GENERIC.to_string();
        tampered.pop();
        tampered.push('Z');
        assert!(decode(&tampered).is_err());
    }
}
