use labyrace_engine::hash_seed;
use std::collections::HashSet;

/// A seed to sweep plus the text it came from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub label: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, label: None }
    }

    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            seed: hash_seed(text),
            label: Some(text.to_string()),
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} ({})", self.seed),
            None => self.seed.to_string(),
        }
    }
}

/// Resolve CLI seed tokens into seeds.
///
/// Integers are taken as-is (negative ones by magnitude); any other text is
/// hashed the same way the engine hashes text seeds. Duplicates keep their
/// first occurrence.
#[must_use]
pub fn resolve_seed_inputs(tokens: &[String]) -> Vec<SeedInfo> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let info = if let Ok(value) = token.parse::<u64>() {
            SeedInfo::from_numeric(value)
        } else if let Ok(value) = token.parse::<i64>() {
            SeedInfo::from_numeric(value.unsigned_abs())
        } else {
            SeedInfo::from_text(token)
        };
        if seen.insert(info.seed) {
            resolved.push(info);
        }
    }

    if resolved.is_empty() {
        resolved.push(SeedInfo::from_numeric(1337));
    }
    resolved
}
