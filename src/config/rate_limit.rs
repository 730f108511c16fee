use super::parse_bool_env;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    pub const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }

    /// Parses `per_second:burst`.
    fn parse(raw: &str) -> Result<Self, String> {
        let (per, burst) = raw
            .split_once(':')
            .ok_or_else(|| format!("invalid rule '{raw}', expected per:burst"))?;

        let per_second: u64 = per
            .trim()
            .parse()
            .map_err(|_| format!("invalid per_second '{}'", per.trim()))?;
        let burst_size: u32 = burst
            .trim()
            .parse()
            .map_err(|_| format!("invalid burst_size '{}'", burst.trim()))?;

        if per_second == 0 || burst_size == 0 {
            return Err("per_second and burst_size must be > 0".to_string());
        }

        Ok(Self::new(per_second, burst_size))
    }
}

/// Route groups that get their own limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    Auth,
    PublicRead,
    Protected,
}

impl RouteGroup {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auth" => Some(Self::Auth),
            "public" | "public_read" | "public-read" => Some(Self::PublicRead),
            "protected" => Some(Self::Protected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub public_read: RateLimitRule,
    pub protected: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(5, 10),
            public_read: RateLimitRule::new(30, 60),
            protected: RateLimitRule::new(10, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            if let Err(err) = cfg.apply(&raw) {
                tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err);
            }
        }

        cfg
    }

    pub fn rule(&self, group: RouteGroup) -> RateLimitRule {
        match group {
            RouteGroup::Auth => self.auth,
            RouteGroup::PublicRead => self.public_read,
            RouteGroup::Protected => self.protected,
        }
    }

    fn set(&mut self, group: RouteGroup, rule: RateLimitRule) {
        match group {
            RouteGroup::Auth => self.auth = rule,
            RouteGroup::PublicRead => self.public_read = rule,
            RouteGroup::Protected => self.protected = rule,
        }
    }

    /// Accepts either a global rule (`10:20`) or a grouped list
    /// (`auth=5:10,public=30:60,protected=10:20`). Nothing is applied on error.
    fn apply(&mut self, raw: &str) -> Result<(), String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty value".to_string());
        }

        if !trimmed.contains('=') {
            let rule = RateLimitRule::parse(trimmed)?;
            for group in [RouteGroup::Auth, RouteGroup::PublicRead, RouteGroup::Protected] {
                self.set(group, rule);
            }
            return Ok(());
        }

        let mut updates = Vec::new();
        for item in trimmed.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (name, rule) = item
                .split_once('=')
                .ok_or_else(|| format!("invalid item '{item}', expected name=per:burst"))?;
            let group = RouteGroup::from_name(name).ok_or_else(|| {
                format!("unknown group '{}', expected auth/public/protected", name.trim())
            })?;
            updates.push((group, RateLimitRule::parse(rule.trim())?));
        }

        for (group, rule) in updates {
            self.set(group, rule);
        }
        Ok(())
    }
}
