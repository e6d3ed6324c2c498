use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub reset_code_ttl_minutes: i64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gradtrack".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "gradtrack-users".into()),
            // 30 days
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 30),
        };
        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            reset_code_ttl_minutes: env_or("RESET_CODE_TTL_MINUTES", 15),
        })
    }

    /// Configuration used by tests and local demos: in-memory store, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 30,
            },
            reset_code_ttl_minutes: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("GRADTRACK_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("GRADTRACK_TEST_NUMBER", 7_i64), 7);
        std::env::set_var("GRADTRACK_TEST_NUMBER", "42");
        assert_eq!(env_or("GRADTRACK_TEST_NUMBER", 7_i64), 42);
        std::env::remove_var("GRADTRACK_TEST_NUMBER");
    }
}
