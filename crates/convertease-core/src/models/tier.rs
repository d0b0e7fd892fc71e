use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;
const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Subscription level of a client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Standard,
    Pro,
    Scale,
}

impl Tier {
    /// All tiers, highest priority first.
    pub const BY_PRIORITY: [Tier; 5] = [Tier::Scale, Tier::Pro, Tier::Standard, Tier::Basic, Tier::Free];

    /// Scheduling priority; larger runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Basic => 1,
            Tier::Standard => 2,
            Tier::Pro => 3,
            Tier::Scale => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Pro => "pro",
            Tier::Scale => "scale",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "standard" => Ok(Tier::Standard),
            "pro" => Ok(Tier::Pro),
            "scale" => Ok(Tier::Scale),
            _ => Err(anyhow::anyhow!("Invalid tier: {}", s)),
        }
    }
}

/// Per-tier limits. Running and active limits apply per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_upload_bytes: u64,
    /// Jobs of one client allowed in `Running` at once
    pub max_running_jobs: usize,
    /// Queued + running ceiling for one client; submissions beyond it are rejected
    pub max_active_jobs: usize,
    pub retention_secs: u64,
}

impl TierLimits {
    /// Defaults follow the published plans: 1 GiB free, up to 20 GiB on Scale.
    pub fn defaults_for(tier: Tier) -> Self {
        let (max_upload_bytes, max_running_jobs, max_active_jobs) = match tier {
            Tier::Free => (GIB, 1, 5),
            Tier::Basic => (GIB + GIB / 2, 2, 10),
            Tier::Standard => (2 * GIB, 3, 20),
            Tier::Pro => (5 * GIB, 4, 50),
            Tier::Scale => (20 * GIB, 8, 200),
        };
        Self {
            max_upload_bytes,
            max_running_jobs,
            max_active_jobs,
            retention_secs: DEFAULT_RETENTION_HOURS * 3600,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs.min(i64::MAX as u64) as i64)
    }
}

/// Limits for every tier, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct TierTable {
    limits: HashMap<Tier, TierLimits>,
}

impl TierTable {
    pub fn new(limits: HashMap<Tier, TierLimits>) -> Self {
        Self { limits }
    }

    pub fn get(&self, tier: Tier) -> TierLimits {
        self.limits
            .get(&tier)
            .copied()
            .unwrap_or_else(|| TierLimits::defaults_for(tier))
    }

    pub fn set(&mut self, tier: Tier, limits: TierLimits) {
        self.limits.insert(tier, limits);
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(
            Tier::BY_PRIORITY
                .iter()
                .map(|t| (*t, TierLimits::defaults_for(*t)))
                .collect(),
        )
    }
}
