use thiserror::Error;

/// Failures raised while collecting seller listings.
///
/// The markup scanners never produce these: malformed HTML only ever yields
/// fewer items. Everything that talks to the network, reads hidden fields or
/// decodes a load-more envelope fails fast with one of these kinds.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("missing required hidden inputs: {}", .0.join(", "))]
    MissingRequiredField(Vec<String>),

    #[error("missing tags: {}", .0.join(", "))]
    MissingEnvelopeField(Vec<&'static str>),

    #[error("no common seller profiles found across provided URLs")]
    NoCommonItems,

    #[error("pagination stopped after {limit} pages without the end marker (last cursor {cursor:?})")]
    PageLimitExceeded { limit: usize, cursor: String },
}

impl CollectError {
    pub fn transport(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_are_listed() {
        let err = CollectError::MissingRequiredField(vec!["__cmtkn".into(), "idProduct".into()]);
        assert_eq!(err.to_string(), "missing required hidden inputs: __cmtkn, idProduct");

        let err = CollectError::MissingEnvelopeField(vec!["newPage"]);
        assert_eq!(err.to_string(), "missing tags: newPage");
    }

    #[test]
    fn test_transport_keeps_source() {
        let err = CollectError::transport("https://example.test/p", "connection reset");
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
