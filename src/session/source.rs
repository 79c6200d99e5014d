//! Ordered session id negotiation.

use super::SessionId;
use crate::Result;

/// Where a session id can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Passed to `start` by the caller.
    Explicit,
    /// Already bound to the coordinator by an earlier call.
    Bound,
    /// Reported by the host engine.
    Engine,
    /// Read from the session cookie.
    Cookie,
    /// Freshly minted.
    Generated,
}

/// Candidate values gathered before resolution.
///
/// Raw strings are kept as-is and validated during resolution. An empty
/// value always falls through; a malformed cookie falls through too, but a
/// malformed explicit id is an error.
#[derive(Debug, Clone, Default)]
pub struct IdCandidates<'a> {
    pub explicit: Option<&'a str>,
    pub bound: Option<&'a SessionId>,
    pub engine: Option<&'a SessionId>,
    pub cookie: Option<&'a str>,
}

/// Evaluates id sources in priority order; the first usable one wins.
#[derive(Debug, Clone)]
pub struct IdResolver {
    order: Vec<IdSource>,
}

impl Default for IdResolver {
    fn default() -> Self {
        Self {
            order: vec![
                IdSource::Explicit,
                IdSource::Bound,
                IdSource::Engine,
                IdSource::Cookie,
                IdSource::Generated,
            ],
        }
    }
}

impl IdResolver {
    /// Use a custom precedence. `Generated` is appended when missing so
    /// resolution always produces an id.
    pub fn with_order(mut order: Vec<IdSource>) -> Self {
        if !order.contains(&IdSource::Generated) {
            order.push(IdSource::Generated);
        }
        Self { order }
    }

    pub fn order(&self) -> &[IdSource] {
        &self.order
    }

    /// Pick the first usable candidate, calling `generate` only when every
    /// earlier source came up empty.
    pub fn resolve(
        &self,
        candidates: &IdCandidates<'_>,
        generate: impl FnOnce() -> Result<SessionId>,
    ) -> Result<(SessionId, IdSource)> {
        for source in &self.order {
            let found = match source {
                IdSource::Explicit => match candidates.explicit {
                    Some(raw) if !raw.is_empty() => Some(raw.parse()?),
                    _ => None,
                },
                IdSource::Bound => candidates.bound.cloned(),
                IdSource::Engine => candidates.engine.cloned(),
                IdSource::Cookie => candidates.cookie.and_then(|s| s.parse().ok()),
                IdSource::Generated => break,
            };
            if let Some(id) = found {
                return Ok((id, *source));
            }
        }

        generate().map(|id| (id, IdSource::Generated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionError;

    fn id(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    fn fresh() -> Result<SessionId> {
        Ok(id("generated"))
    }

    #[test]
    fn test_explicit_wins() {
        let bound = id("bound");
        let candidates = IdCandidates {
            explicit: Some("explicit"),
            bound: Some(&bound),
            engine: None,
            cookie: Some("cookie"),
        };
        let (resolved, source) = IdResolver::default().resolve(&candidates, fresh).unwrap();
        assert_eq!(resolved, id("explicit"));
        assert_eq!(source, IdSource::Explicit);
    }

    #[test]
    fn test_precedence_chain() {
        let bound = id("bound");
        let engine = id("engine");
        let resolver = IdResolver::default();

        let mut candidates = IdCandidates {
            explicit: None,
            bound: Some(&bound),
            engine: Some(&engine),
            cookie: Some("cookie"),
        };
        assert_eq!(resolver.resolve(&candidates, fresh).unwrap().1, IdSource::Bound);

        candidates.bound = None;
        assert_eq!(resolver.resolve(&candidates, fresh).unwrap().1, IdSource::Engine);

        candidates.engine = None;
        assert_eq!(resolver.resolve(&candidates, fresh).unwrap().1, IdSource::Cookie);

        candidates.cookie = None;
        let (resolved, source) = resolver.resolve(&candidates, fresh).unwrap();
        assert_eq!(source, IdSource::Generated);
        assert_eq!(resolved, id("generated"));
    }

    #[test]
    fn test_empty_and_invalid_values_fall_through() {
        let candidates = IdCandidates {
            explicit: Some(""),
            cookie: Some("../../etc/passwd"),
            ..Default::default()
        };
        let (_, source) = IdResolver::default().resolve(&candidates, fresh).unwrap();
        assert_eq!(source, IdSource::Generated);
    }

    #[test]
    fn test_generator_not_called_when_not_needed() {
        let candidates = IdCandidates {
            cookie: Some("fromcookie"),
            ..Default::default()
        };
        let result = IdResolver::default().resolve(&candidates, || Err(SessionError::NotActive));
        assert_eq!(result.unwrap().1, IdSource::Cookie);
    }

    #[test]
    fn test_malformed_explicit_id_is_rejected() {
        let candidates = IdCandidates {
            explicit: Some("user@1"),
            cookie: Some("fromcookie"),
            ..Default::default()
        };
        let err = IdResolver::default().resolve(&candidates, fresh).unwrap_err();
        assert!(matches!(err, SessionError::InvalidSessionId(raw) if raw == "user@1"));
    }

    #[test]
    fn test_custom_order_appends_generated() {
        let resolver = IdResolver::with_order(vec![IdSource::Cookie, IdSource::Explicit]);
        assert_eq!(resolver.order().last(), Some(&IdSource::Generated));

        let candidates = IdCandidates {
            explicit: Some("explicit"),
            cookie: Some("cookie"),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&candidates, fresh).unwrap().1, IdSource::Cookie);
    }
}
