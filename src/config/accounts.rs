use std::env;

/// Sign-up policy.
#[derive(Debug, Clone, Default)]
pub struct AccountsConfig {
    /// When set, only `<local>@<domain>` addresses may register.
    pub allowed_email_domain: Option<String>,
}

impl AccountsConfig {
    pub fn from_env() -> Self {
        let allowed_email_domain = env::var("ALLOWED_EMAIL_DOMAIN")
            .ok()
            .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        Self {
            allowed_email_domain,
        }
    }

    pub fn email_allowed(&self, email: &str) -> bool {
        match &self.allowed_email_domain {
            None => true,
            Some(domain) => email
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain)),
        }
    }
}
