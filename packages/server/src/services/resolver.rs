use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::providers::ProviderError;

static PLAYER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bplayer\s*#?\s*(\d+)").unwrap_or_else(|e| panic!("bad pattern: {}", e))
});

/// First `Player <n>` / `player #<n>` reference in `text`.
pub fn find_player_reference(text: &str) -> Option<u32> {
    PLAYER_REFERENCE
        .captures_iter(text)
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoReference,
    IllegalTarget(u32),
    Provider(String),
}

/// Outcome of turning a free-text decision into a target.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Parsed(u32),
    Fallback { target: u32, reason: FallbackReason },
    NoLegalTarget { reason: FallbackReason },
}

impl Resolution {
    pub fn target(&self) -> Option<u32> {
        match self {
            Resolution::Parsed(target) | Resolution::Fallback { target, .. } => Some(*target),
            Resolution::NoLegalTarget { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Resolution::Parsed(_))
    }
}

/// Validates the first reference in `response` against `legal`, otherwise
/// picks uniformly among `legal`.
pub fn resolve_target<R: Rng + ?Sized>(
    response: Result<String, ProviderError>,
    legal: &[u32],
    rng: &mut R,
) -> Resolution {
    let reason = match response {
        Ok(text) => match find_player_reference(&text) {
            Some(id) if legal.contains(&id) => return Resolution::Parsed(id),
            Some(id) => FallbackReason::IllegalTarget(id),
            None => FallbackReason::NoReference,
        },
        Err(error) => FallbackReason::Provider(error.to_string()),
    };
    match legal.choose(rng) {
        Some(target) => Resolution::Fallback {
            target: *target,
            reason,
        },
        None => Resolution::NoLegalTarget { reason },
    }
}
