//! Process configuration read from the environment, mirroring `mk-server`'s
//! single `PORT` env read but extended to the Redis connection this
//! process also needs (spec.md §6, SPEC_FULL.md §A).

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub lease_ttl_ms: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(3030);
        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let lease_ttl_ms = std::env::var("DEADLINE_LEASE_TTL_MS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(12_000);
        Self { port, redis_url, lease_ttl_ms }
    }
}
