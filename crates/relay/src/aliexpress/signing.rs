//! Request signing for the affiliate API gateway.
//!
//! Every call to the `/sync` gateway carries a set of system parameters
//! (`app_key`, `method`, `timestamp`, `sign_method`, ...) next to the business
//! parameters, plus a `sign` computed over all of them:
//!
//! 1. drop `sign` itself and every parameter with an empty value
//! 2. sort the rest by key, byte-wise ascending
//! 3. concatenate as `key1value1key2value2...`
//! 4. HMAC-SHA256 with the app secret, upper-case hex
//!
//! Signing is deterministic: the timestamp is an input, not read from the
//! clock here, so the same parameters always produce the same URL.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::AffiliateError;

type HmacSha256 = Hmac<Sha256>;

/// Value of the `sign_method` system parameter.
pub const SIGN_METHOD: &str = "sha256";

/// Name of the signature parameter.
pub const SIGN_PARAM: &str = "sign";

/// API protocol version sent with each request.
const API_VERSION: &str = "2.0";

/// App credentials used to sign requests.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub app_key: &'a str,
    pub app_secret: &'a SecretString,
}

/// A fully signed parameter set, ready to be sent as a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    params: BTreeMap<String, String>,
}

impl SignedRequest {
    /// Build and sign a request for `method`.
    ///
    /// Business parameters with the same name as a system parameter are
    /// overridden by the system value.
    ///
    /// # Errors
    ///
    /// Returns `AffiliateError::Signing` if the MAC cannot be initialised.
    pub fn new<I, K, V>(
        method: &str,
        business_params: I,
        credentials: Credentials<'_>,
        timestamp_millis: i64,
    ) -> Result<Self, AffiliateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: BTreeMap<String, String> = business_params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        params.insert("app_key".to_string(), credentials.app_key.to_string());
        params.insert("method".to_string(), method.to_string());
        params.insert("sign_method".to_string(), SIGN_METHOD.to_string());
        params.insert("timestamp".to_string(), timestamp_millis.to_string());
        params.insert("format".to_string(), "json".to_string());
        params.insert("v".to_string(), API_VERSION.to_string());
        params.remove(SIGN_PARAM);

        let signature = sign(&params, credentials.app_secret)?;
        params.insert(SIGN_PARAM.to_string(), signature);

        Ok(Self { params })
    }

    /// All parameters including `sign`, sorted by key.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// The computed signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        self.params.get(SIGN_PARAM).map_or("", String::as_str)
    }

    /// URL-encoded query string (`a=1&b=2...`).
    #[must_use]
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }
}

/// Build the string the signature is computed over.
fn signing_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| key.as_str() != SIGN_PARAM && !value.is_empty())
        .fold(String::new(), |mut acc, (key, value)| {
            acc.push_str(key);
            acc.push_str(value);
            acc
        })
}

/// Compute the upper-case hex HMAC-SHA256 signature for a parameter set.
///
/// # Errors
///
/// Returns `AffiliateError::Signing` if the MAC cannot be initialised.
pub fn sign(
    params: &BTreeMap<String, String>,
    secret: &SecretString,
) -> Result<String, AffiliateError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| AffiliateError::Signing(e.to_string()))?;
    mac.update(signing_string(params).as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TIMESTAMP: i64 = 1_700_000_000_000;

    fn secret() -> SecretString {
        SecretString::from("k3yS3cr3tF0rT3st1ng")
    }

    fn credentials(secret: &SecretString) -> Credentials<'_> {
        Credentials {
            app_key: "503921",
            app_secret: secret,
        }
    }

    fn expected_signature(message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(b"k3yS3cr3tF0rT3st1ng").expect("valid key length");
        mac.update(message.as_bytes());
        hex::encode_upper(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signing_string_sorted_concatenation() {
        let params: BTreeMap<String, String> = [("b", "2"), ("a", "1"), ("C", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        // Byte-wise ordering puts upper-case keys first
        assert_eq!(signing_string(&params), "C3a1b2");
    }

    #[test]
    fn test_signing_string_skips_sign_and_empty_values() {
        let params: BTreeMap<String, String> = [("a", "1"), ("sign", "ABC"), ("empty", "")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert_eq!(signing_string(&params), "a1");
    }

    #[test]
    fn test_signed_request_matches_independent_hmac() {
        let secret = secret();
        let request = SignedRequest::new(
            "aliexpress.affiliate.product.query",
            [("keywords", "phone case")],
            credentials(&secret),
            TIMESTAMP,
        )
        .unwrap();

        let message = "app_key503921formatjsonkeywordsphone case\
                       methodaliexpress.affiliate.product.query\
                       sign_methodsha256timestamp1700000000000v2.0";
        assert_eq!(request.signature(), expected_signature(message));
        assert_eq!(request.signature().len(), 64);
        assert!(
            request
                .signature()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_signature_is_deterministic_and_order_independent() {
        let secret = secret();
        let first = SignedRequest::new(
            "aliexpress.affiliate.product.shipping.get",
            [("product_id", "1005001"), ("sku_id", "12000"), ("ship_to_country", "US")],
            credentials(&secret),
            TIMESTAMP,
        )
        .unwrap();
        let second = SignedRequest::new(
            "aliexpress.affiliate.product.shipping.get",
            [("ship_to_country", "US"), ("sku_id", "12000"), ("product_id", "1005001")],
            credentials(&secret),
            TIMESTAMP,
        )
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.query_string(), second.query_string());
    }

    #[test]
    fn test_signature_changes_with_timestamp() {
        let secret = secret();
        let first =
            SignedRequest::new("m", [("a", "1")], credentials(&secret), TIMESTAMP).unwrap();
        let second =
            SignedRequest::new("m", [("a", "1")], credentials(&secret), TIMESTAMP + 1).unwrap();

        assert_ne!(first.signature(), second.signature());
    }

    #[test]
    fn test_client_supplied_sign_is_replaced() {
        let secret = secret();
        let request = SignedRequest::new(
            "m",
            [("a", "1"), ("sign", "FORGED")],
            credentials(&secret),
            TIMESTAMP,
        )
        .unwrap();

        assert_ne!(request.signature(), "FORGED");
        let without: BTreeMap<String, String> = request
            .params()
            .iter()
            .filter(|(k, _)| k.as_str() != SIGN_PARAM)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(request.signature(), sign(&without, &secret).unwrap());
    }

    #[test]
    fn test_query_string_is_url_encoded() {
        let secret = secret();
        let request =
            SignedRequest::new("m", [("keywords", "usb c&cable")], credentials(&secret), TIMESTAMP)
                .unwrap();

        let query = request.query_string();
        assert!(query.contains("keywords=usb+c%26cable"));
        assert!(query.contains("sign_method=sha256"));
        assert!(query.contains(&format!("sign={}", request.signature())));
    }
}
