//! Source registry
//!
//! Static per-domain tags used by the bias compass, perspective labeling,
//! and the geographic axes of scoring. Read-only at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse region of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Western,
    Eastern,
    GlobalSouth,
}

/// Political lean as a distribution summing to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoliticalBias {
    pub left: f64,
    pub center: f64,
    pub right: f64,
}

impl PoliticalBias {
    /// Dominant axis label for perspective output.
    pub fn leaning(&self) -> &'static str {
        if self.left > self.center && self.left > self.right {
            "left"
        } else if self.right > self.center && self.right > self.left {
            "right"
        } else {
            "center"
        }
    }
}

/// Tone lean as a distribution summing to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToneBias {
    pub sensational: f64,
    pub factual: f64,
}

/// Reporting-depth lean as a distribution summing to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetailBias {
    pub surface: f64,
    pub deep: f64,
}

/// Static profile of one source domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProfile {
    pub domain: String,
    pub region: Region,
    pub country: String,
    pub political: PoliticalBias,
    pub tone: ToneBias,
    pub detail: DetailBias,
}

/// Official feeds counted as primary evidence.
pub const OFFICIAL_DOMAINS: &[&str] = &[
    "usgs.gov",
    "who.int",
    "nasa.gov",
    "unocha.org",
    "reliefweb.int",
];

/// Major wire services; absence beyond 48 h marks an event underreported.
pub const MAJOR_WIRE_DOMAINS: &[&str] = &["ap.org", "apnews.com", "reuters.com", "afp.com"];

/// Whether a domain (or a parent domain of it) is an official feed.
pub fn is_official_domain(domain: &str) -> bool {
    OFFICIAL_DOMAINS
        .iter()
        .any(|official| domain == *official || domain.ends_with(&format!(".{official}")))
}

/// Whether a domain is a major wire service.
pub fn is_major_wire(domain: &str) -> bool {
    MAJOR_WIRE_DOMAINS
        .iter()
        .any(|wire| domain == *wire || domain.ends_with(&format!(".{wire}")))
}

/// Read-only registry of source profiles with a TLD-based fallback for
/// domains outside the table.
pub struct SourceRegistry {
    profiles: HashMap<String, SourceProfile>,
}

impl SourceRegistry {
    /// Build the built-in registry.
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in builtin_profiles() {
            profiles.insert(profile.domain.clone(), profile);
        }
        Self { profiles }
    }

    /// Look up a domain, falling back to a TLD-derived default profile.
    pub fn profile(&self, domain: &str) -> SourceProfile {
        if let Some(profile) = self.profiles.get(domain) {
            return profile.clone();
        }
        // Try the registrable parent (news.bbc.co.uk -> bbc.co.uk).
        if let Some(idx) = domain.find('.') {
            if let Some(profile) = self.profiles.get(&domain[idx + 1..]) {
                return profile.clone();
            }
        }
        default_profile(domain)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn region_for_tld(domain: &str) -> Region {
    let tld = domain.rsplit('.').next().unwrap_or("");
    match tld {
        "ru" | "cn" | "ir" | "kz" | "by" => Region::Eastern,
        "in" | "ng" | "ke" | "za" | "br" | "mx" | "id" | "pk" | "bd" | "eg" => {
            Region::GlobalSouth
        }
        _ => Region::Western,
    }
}

fn default_profile(domain: &str) -> SourceProfile {
    SourceProfile {
        domain: domain.to_string(),
        region: region_for_tld(domain),
        country: String::new(),
        political: PoliticalBias {
            left: 0.2,
            center: 0.6,
            right: 0.2,
        },
        tone: ToneBias {
            sensational: 0.3,
            factual: 0.7,
        },
        detail: DetailBias {
            surface: 0.5,
            deep: 0.5,
        },
    }
}

fn profile(
    domain: &str,
    region: Region,
    country: &str,
    (left, center, right): (f64, f64, f64),
    (sensational, factual): (f64, f64),
    (surface, deep): (f64, f64),
) -> SourceProfile {
    SourceProfile {
        domain: domain.to_string(),
        region,
        country: country.to_string(),
        political: PoliticalBias { left, center, right },
        tone: ToneBias { sensational, factual },
        detail: DetailBias { surface, deep },
    }
}

fn builtin_profiles() -> Vec<SourceProfile> {
    use Region::{Eastern, GlobalSouth, Western};
    vec![
        // Wires
        profile("reuters.com", Western, "GB", (0.2, 0.7, 0.1), (0.1, 0.9), (0.3, 0.7)),
        profile("apnews.com", Western, "US", (0.2, 0.7, 0.1), (0.1, 0.9), (0.3, 0.7)),
        profile("ap.org", Western, "US", (0.2, 0.7, 0.1), (0.1, 0.9), (0.3, 0.7)),
        profile("afp.com", Western, "FR", (0.2, 0.7, 0.1), (0.1, 0.9), (0.3, 0.7)),
        // Anglophone dailies and broadcasters
        profile("bbc.co.uk", Western, "GB", (0.3, 0.6, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("bbc.com", Western, "GB", (0.3, 0.6, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("theguardian.com", Western, "GB", (0.6, 0.3, 0.1), (0.2, 0.8), (0.2, 0.8)),
        profile("nytimes.com", Western, "US", (0.5, 0.4, 0.1), (0.2, 0.8), (0.2, 0.8)),
        profile("washingtonpost.com", Western, "US", (0.5, 0.4, 0.1), (0.2, 0.8), (0.2, 0.8)),
        profile("wsj.com", Western, "US", (0.1, 0.5, 0.4), (0.1, 0.9), (0.2, 0.8)),
        profile("cnn.com", Western, "US", (0.5, 0.4, 0.1), (0.5, 0.5), (0.5, 0.5)),
        profile("foxnews.com", Western, "US", (0.05, 0.25, 0.7), (0.6, 0.4), (0.6, 0.4)),
        profile("dailymail.co.uk", Western, "GB", (0.1, 0.3, 0.6), (0.8, 0.2), (0.8, 0.2)),
        profile("nypost.com", Western, "US", (0.1, 0.3, 0.6), (0.7, 0.3), (0.7, 0.3)),
        profile("lemonde.fr", Western, "FR", (0.5, 0.4, 0.1), (0.2, 0.8), (0.2, 0.8)),
        profile("spiegel.de", Western, "DE", (0.5, 0.4, 0.1), (0.3, 0.7), (0.3, 0.7)),
        profile("asahi.com", Western, "JP", (0.4, 0.5, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("japantimes.co.jp", Western, "JP", (0.3, 0.6, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("abc.net.au", Western, "AU", (0.4, 0.5, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("smh.com.au", Western, "AU", (0.4, 0.5, 0.1), (0.3, 0.7), (0.4, 0.6)),
        // Eastern outlets
        profile("rt.com", Eastern, "RU", (0.2, 0.3, 0.5), (0.7, 0.3), (0.6, 0.4)),
        profile("tass.com", Eastern, "RU", (0.1, 0.6, 0.3), (0.3, 0.7), (0.5, 0.5)),
        profile("xinhuanet.com", Eastern, "CN", (0.3, 0.6, 0.1), (0.3, 0.7), (0.5, 0.5)),
        profile("globaltimes.cn", Eastern, "CN", (0.3, 0.4, 0.3), (0.7, 0.3), (0.6, 0.4)),
        profile("scmp.com", Eastern, "HK", (0.3, 0.6, 0.1), (0.3, 0.7), (0.3, 0.7)),
        // Global-south outlets
        profile("aljazeera.com", GlobalSouth, "QA", (0.5, 0.4, 0.1), (0.3, 0.7), (0.3, 0.7)),
        profile("thehindu.com", GlobalSouth, "IN", (0.4, 0.5, 0.1), (0.2, 0.8), (0.3, 0.7)),
        profile("timesofindia.indiatimes.com", GlobalSouth, "IN", (0.3, 0.5, 0.2), (0.6, 0.4), (0.6, 0.4)),
        profile("nation.africa", GlobalSouth, "KE", (0.3, 0.6, 0.1), (0.3, 0.7), (0.4, 0.6)),
        profile("folha.uol.com.br", GlobalSouth, "BR", (0.4, 0.5, 0.1), (0.3, 0.7), (0.3, 0.7)),
        // Official / NGO feeds
        profile("usgs.gov", Western, "US", (0.0, 1.0, 0.0), (0.0, 1.0), (0.1, 0.9)),
        profile("who.int", Western, "CH", (0.0, 1.0, 0.0), (0.0, 1.0), (0.1, 0.9)),
        profile("nasa.gov", Western, "US", (0.0, 1.0, 0.0), (0.0, 1.0), (0.1, 0.9)),
        profile("unocha.org", GlobalSouth, "US", (0.0, 1.0, 0.0), (0.0, 1.0), (0.1, 0.9)),
        profile("reliefweb.int", GlobalSouth, "US", (0.0, 1.0, 0.0), (0.0, 1.0), (0.1, 0.9)),
    ]
}
