use crate::application_port::*;
use crate::domain_model::UserId;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, KeyInit, Mac};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_signing_key: Vec<u8>,
    pub refresh_signing_key: Vec<u8>,
    /// Grace period applied to `exp`, in seconds.
    pub leeway_secs: i64,
}

impl JwtConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_signing_key.is_empty() {
            return Err(AuthError::ConfigurationFault(
                "access token signing key is not set".to_string(),
            ));
        }
        if self.refresh_signing_key.is_empty() {
            return Err(AuthError::ConfigurationFault(
                "refresh token signing key is not set".to_string(),
            ));
        }
        if self.access_signing_key == self.refresh_signing_key {
            return Err(AuthError::ConfigurationFault(
                "access and refresh tokens must use different signing keys".to_string(),
            ));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(AuthError::ConfigurationFault(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.leeway_secs < 0 {
            return Err(AuthError::ConfigurationFault(
                "leeway must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    typ: TokenKind,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        KeyPair {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256 codec with one secret per token class.
pub struct JwtHs256Codec {
    cfg: JwtConfig,
    clock: Arc<dyn Clock>,
    access_keys: KeyPair,
    refresh_keys: KeyPair,
    validation: Validation,
}

impl JwtHs256Codec {
    pub fn try_new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        cfg.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against `clock`, after the signature
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);

        Ok(JwtHs256Codec {
            access_keys: KeyPair::from_secret(&cfg.access_signing_key),
            refresh_keys: KeyPair::from_secret(&cfg.refresh_signing_key),
            cfg,
            clock,
            validation,
        })
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access_keys,
            TokenKind::Refresh => &self.refresh_keys,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    fn encode_token(
        &self,
        user: UserId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let iat = now.timestamp();
        let exp = iat + self.ttl(kind).num_seconds();
        let exp_dt = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user.to_string(),
            typ: kind,
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn decode_with(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenRejection> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_token_pair(&self, user: UserId) -> Result<AuthTokens, AuthError> {
        let now = self.clock.now();
        let (access_token, access_exp) = self.encode_token(user, TokenKind::Access, now)?;
        let (refresh_token, refresh_exp) = self.encode_token(user, TokenKind::Refresh, now)?;
        Ok(AuthTokens {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            issued_at: now,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn verify_token(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<VerifiedToken, TokenRejection> {
        // A genuine token of the other class must get as far as the type check.
        let (claims, signed_as) = match self.decode_with(token, expected) {
            Ok(claims) => (claims, expected),
            Err(TokenRejection::BadSignature) => {
                let other = expected.other();
                (self.decode_with(token, other)?, other)
            }
            Err(rejection) => return Err(rejection),
        };

        if claims.exp + self.cfg.leeway_secs <= self.clock.now().timestamp() {
            return Err(TokenRejection::Expired);
        }

        if signed_as != expected || claims.typ != expected {
            return Err(TokenRejection::WrongType);
        }

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenRejection::Malformed)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(TokenRejection::Malformed)?;

        Ok(VerifiedToken {
            user_id,
            jti: claims.jti,
            expires_at,
        })
    }

    fn fingerprint(&self, token: &RefreshToken) -> Result<String, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.cfg.refresh_signing_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(token.0.as_bytes());
        let out = mac.finalize().into_bytes();
        Ok(hex::encode(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::ManualClock;

    fn config() -> JwtConfig {
        JwtConfig {
            issuer: "tokenkeeper.test".to_string(),
            audience: "test-client".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            access_signing_key: b"access-secret".to_vec(),
            refresh_signing_key: b"refresh-secret".to_vec(),
            leeway_secs: 0,
        }
    }

    fn codec_at(clock: Arc<ManualClock>) -> JwtHs256Codec {
        JwtHs256Codec::try_new(config(), clock).unwrap()
    }

    fn fresh_codec() -> (JwtHs256Codec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (codec_at(clock.clone()), clock)
    }

    #[tokio::test]
    async fn access_token_verifies_as_access() {
        let (codec, _) = fresh_codec();
        let user = UserId::new_v4();
        let tokens = codec.issue_token_pair(user).await.unwrap();

        let verified = codec
            .verify_token(&tokens.access_token.0, TokenKind::Access)
            .await
            .unwrap();
        assert_eq!(verified.user_id, user);
        assert_eq!(verified.expires_at, tokens.access_token_expires_at);
    }

    #[tokio::test]
    async fn refresh_token_presented_as_access_is_wrong_type() {
        let (codec, _) = fresh_codec();
        let tokens = codec.issue_token_pair(UserId::new_v4()).await.unwrap();

        let access_as_refresh = codec
            .verify_token(&tokens.access_token.0, TokenKind::Refresh)
            .await;
        let refresh_as_access = codec
            .verify_token(&tokens.refresh_token.0, TokenKind::Access)
            .await;
        assert_eq!(access_as_refresh.unwrap_err(), TokenRejection::WrongType);
        assert_eq!(refresh_as_access.unwrap_err(), TokenRejection::WrongType);
    }

    #[tokio::test]
    async fn backdated_token_is_expired() {
        let clock = Arc::new(ManualClock::new(Utc::now() - Duration::hours(1)));
        let minting = codec_at(clock);
        let tokens = minting.issue_token_pair(UserId::new_v4()).await.unwrap();

        let (codec, _) = fresh_codec();
        let result = codec
            .verify_token(&tokens.access_token.0, TokenKind::Access)
            .await;
        assert_eq!(result.unwrap_err(), TokenRejection::Expired);

        // the refresh token minted at the same time is still good
        assert!(
            codec
                .verify_token(&tokens.refresh_token.0, TokenKind::Refresh)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn token_expires_exactly_at_exp() {
        let (codec, clock) = fresh_codec();
        let tokens = codec.issue_token_pair(UserId::new_v4()).await.unwrap();

        clock.set(tokens.access_token_expires_at - Duration::seconds(1));
        assert!(
            codec
                .verify_token(&tokens.access_token.0, TokenKind::Access)
                .await
                .is_ok()
        );

        clock.set(tokens.access_token_expires_at);
        let result = codec
            .verify_token(&tokens.access_token.0, TokenKind::Access)
            .await;
        assert_eq!(result.unwrap_err(), TokenRejection::Expired);
    }

    #[tokio::test]
    async fn foreign_secret_is_bad_signature() {
        let (codec, clock) = fresh_codec();
        let mut other = config();
        other.access_signing_key = b"someone-else".to_vec();
        other.refresh_signing_key = b"someone-else-too".to_vec();
        let forger = JwtHs256Codec::try_new(other, clock).unwrap();
        let tokens = forger.issue_token_pair(UserId::new_v4()).await.unwrap();

        let result = codec
            .verify_token(&tokens.access_token.0, TokenKind::Access)
            .await;
        assert_eq!(result.unwrap_err(), TokenRejection::BadSignature);
    }

    #[tokio::test]
    async fn tampered_and_garbage_tokens_are_rejected() {
        let (codec, _) = fresh_codec();
        let tokens = codec.issue_token_pair(UserId::new_v4()).await.unwrap();

        // flip the first signature character, which always changes the decoded bytes
        let token = &tokens.access_token.0;
        let sig_start = token.rfind('.').unwrap() + 1;
        let first = &token[sig_start..sig_start + 1];
        let tampered = format!(
            "{}{}{}",
            &token[..sig_start],
            if first == "A" { "B" } else { "A" },
            &token[sig_start + 1..]
        );
        let result = codec.verify_token(&tampered, TokenKind::Access).await;
        assert_eq!(result.unwrap_err(), TokenRejection::BadSignature);

        for garbage in ["", "abc", "a.b.c", "not a jwt at all"] {
            let result = codec.verify_token(garbage, TokenKind::Access).await;
            assert_eq!(result.unwrap_err(), TokenRejection::Malformed, "{garbage:?}");
        }
    }

    #[tokio::test]
    async fn wrong_audience_is_malformed() {
        let (codec, clock) = fresh_codec();
        let mut other = config();
        other.audience = "another-client".to_string();
        let elsewhere = JwtHs256Codec::try_new(other, clock).unwrap();
        let tokens = elsewhere.issue_token_pair(UserId::new_v4()).await.unwrap();

        let result = codec
            .verify_token(&tokens.access_token.0, TokenKind::Access)
            .await;
        assert_eq!(result.unwrap_err(), TokenRejection::Malformed);
    }

    #[tokio::test]
    async fn pairs_minted_in_the_same_second_differ() {
        let (codec, _) = fresh_codec();
        let user = UserId::new_v4();
        let a = codec.issue_token_pair(user).await.unwrap();
        let b = codec.issue_token_pair(user).await.unwrap();

        assert_ne!(a.refresh_token, b.refresh_token);
        assert_ne!(
            codec.fingerprint(&a.refresh_token).unwrap(),
            codec.fingerprint(&b.refresh_token).unwrap()
        );
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let (codec, _) = fresh_codec();
        let token = RefreshToken("some.refresh.token".to_string());
        let a = codec.fingerprint(&token).unwrap();
        let b = codec.fingerprint(&token).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn missing_or_shared_secrets_are_configuration_faults() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

        let mut missing = config();
        missing.refresh_signing_key.clear();
        assert!(matches!(
            JwtHs256Codec::try_new(missing, clock.clone()),
            Err(AuthError::ConfigurationFault(_))
        ));

        let mut shared = config();
        shared.refresh_signing_key = shared.access_signing_key.clone();
        assert!(matches!(
            JwtHs256Codec::try_new(shared, clock),
            Err(AuthError::ConfigurationFault(_))
        ));
    }
}
