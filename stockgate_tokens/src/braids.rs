use aliri_braid::braid;
use std::fmt;

/// Implements redacting `Debug` and `Display` for a borrowed secret type
///
/// `{:?}` and `{}` print only a placeholder. `{:#?}` prints a quoted prefix of
/// at most `$prefix` characters (or the formatter width), and `{:#}` prints
/// the whole secret.
macro_rules! redacted {
    ($ty:ty: $label:literal, $prefix:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    let limit = f.width().unwrap_or($prefix);
                    f.write_str("\"")?;
                    write_prefix(self.as_str(), limit, f)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $label, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str(self.as_str())
                } else {
                    f.write_str(concat!("***", $label, "***"))
                }
            }
        }
    };
}

fn write_prefix(secret: &str, limit: usize, f: &mut fmt::Formatter) -> fmt::Result {
    if limit <= 1 {
        return f.write_str("…");
    }

    // keep `limit - 1` characters and spend the last one on the ellipsis
    let mut boundaries = secret.char_indices().map(|(idx, _)| idx);
    match (boundaries.nth(limit - 1), boundaries.next()) {
        (Some(cut), Some(_)) => {
            f.write_str(&secret[..cut])?;
            f.write_str("…")
        }
        _ => f.write_str(secret),
    }
}

/// The OAuth client identifier
#[braid(serde)]
pub struct ClientId;

/// The OAuth client secret
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

redacted!(ClientSecretRef: "CLIENT SECRET", 5);

/// A short-lived bearer credential accepted by the inventory API
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

redacted!(AccessTokenRef: "ACCESS TOKEN", 12);

/// A long-lived credential used to mint new access tokens
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

redacted!(RefreshTokenRef: "REFRESH TOKEN", 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_formatting_hides_the_secret() {
        let token = AccessToken::from_static("1000.abcdef0123456789");
        assert_eq!(format!("{:?}", token), "***ACCESS TOKEN***");
        assert_eq!(format!("{}", token), "***ACCESS TOKEN***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let secret = ClientSecret::from_static("abcdefghij");
        assert_eq!(format!("{:#?}", secret), "\"abcd…\"");
        assert_eq!(format!("{:#3?}", secret), "\"ab…\"");
    }

    #[test]
    fn alternate_debug_prints_short_secrets_whole() {
        let secret = RefreshToken::from_static("abc");
        assert_eq!(format!("{:#?}", secret), "\"abc\"");
    }

    #[test]
    fn alternate_display_reveals_everything() {
        let token = AccessToken::from_static("1000.abcdef0123456789");
        assert_eq!(format!("{:#}", token), "1000.abcdef0123456789");
    }

    #[test]
    fn client_id_is_not_redacted() {
        let id = ClientId::from_static("1000.CLIENT");
        assert_eq!(id.to_string(), "1000.CLIENT");
    }
}
