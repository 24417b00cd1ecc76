use anyhow::{Context, Result};
use platform_authn::{CredentialGate, DEFAULT_PASSWORD, DEFAULT_USERNAME, SessionConfig};
use products_payroll::{DEFAULT_TAX_RATE, TaxPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub tax: TaxPolicy,
    /// `None` when `PAYROLL_LOGIN_REQUIRED` switches the login gate off.
    pub gate: Option<CredentialGate>,
    pub session: SessionConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let tax_rate = match lookup("PAYROLL_TAX_RATE") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("invalid PAYROLL_TAX_RATE {raw:?}"))?,
            None => DEFAULT_TAX_RATE,
        };
        let tax = TaxPolicy::flat(tax_rate).context("invalid PAYROLL_TAX_RATE")?;

        let gate = if env_bool(&lookup, "PAYROLL_LOGIN_REQUIRED", true) {
            let username =
                lookup("PAYROLL_ADMIN_USER").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
            let password =
                lookup("PAYROLL_ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
            Some(CredentialGate::new(username, &password).context("failed to set up login")?)
        } else {
            None
        };

        let session_ttl_minutes = lookup("SESSION_TTL_MINUTES")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60);
        let session = SessionConfig {
            jwt_secret: lookup("AUTH_SECRET").unwrap_or_else(|| "dev-secret".into()),
            session_ttl_minutes,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            tax,
            gate,
            session,
            cors_allowed_origins,
        })
    }
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: bool) -> bool {
    lookup(var)
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
