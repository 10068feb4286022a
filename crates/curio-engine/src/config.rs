//! Engine tuning limits.

use serde::Deserialize;

/// Server-side limits bounding worst-case work per request.
///
/// Deserializable so the outer application can load overrides from its
/// configuration file; the defaults are compiled in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Hard cap applied to every caller-supplied page size.
    pub max_page_size: usize,

    /// Post-filter batches fetch `page_size * ratio_batch_factor` rows
    /// per round...
    pub ratio_batch_factor: usize,

    /// ...capped at this many rows per batch.
    pub ratio_batch_cap: usize,

    /// Maximum number of post-filter fetch rounds per request. The cap is
    /// the load-shedding mechanism: a sparse match simply yields a short
    /// page plus a cursor to keep paging.
    pub ratio_max_rounds: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            ratio_batch_factor: 4,
            ratio_batch_cap: 400,
            ratio_max_rounds: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let limits: EngineLimits = serde_json::from_str(r#"{"max_page_size": 10}"#).unwrap();
        assert_eq!(limits.max_page_size, 10);
        assert_eq!(limits.ratio_max_rounds, EngineLimits::default().ratio_max_rounds);
    }
}
