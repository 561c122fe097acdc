use thiserror::Error;

/// spec §6: "KV-store limits are exposed as constants".
pub const MAX_KEY_BYTES: usize = 10_000;
pub const MAX_VALUE_BYTES: usize = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KvLimitError {
    #[error("key is {actual} bytes, exceeding the {MAX_KEY_BYTES}-byte limit")]
    KeyTooLarge { actual: usize },
    #[error("value is {actual} bytes, exceeding the {MAX_VALUE_BYTES}-byte limit")]
    ValueTooLarge { actual: usize },
}

pub fn validate_key(key: &[u8]) -> Result<(), KvLimitError> {
    if key.len() > MAX_KEY_BYTES {
        return Err(KvLimitError::KeyTooLarge { actual: key.len() });
    }
    Ok(())
}

pub fn validate_value(value: &[u8]) -> Result<(), KvLimitError> {
    if value.len() > MAX_VALUE_BYTES {
        return Err(KvLimitError::ValueTooLarge { actual: value.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_keys_at_the_limit() {
        assert!(validate_key(&vec![0u8; MAX_KEY_BYTES]).is_ok());
    }

    #[test]
    fn rejects_keys_over_the_limit() {
        assert_eq!(validate_key(&vec![0u8; MAX_KEY_BYTES + 1]), Err(KvLimitError::KeyTooLarge { actual: MAX_KEY_BYTES + 1 }));
    }

    #[test]
    fn rejects_values_over_the_limit() {
        assert_eq!(validate_value(&vec![0u8; MAX_VALUE_BYTES + 1]), Err(KvLimitError::ValueTooLarge { actual: MAX_VALUE_BYTES + 1 }));
    }
}
