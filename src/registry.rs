//! Source-to-parser mapping
//!
//! Built once at startup and only read afterwards. Sources without a
//! registered parser, `unknown` included, resolve to the fallback parser.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::parser::{FallbackParser, LeadParser, PortalParser};
use crate::types::LeadSource;

#[derive(Debug, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<LeadSource, Arc<dyn LeadParser>>,
    fallback: Arc<dyn LeadParser>,
}

impl ParserRegistry {
    /// Registry with no portal parsers, only the given fallback
    #[must_use]
    pub fn with_fallback(fallback: Arc<dyn LeadParser>) -> Self {
        Self {
            parsers: HashMap::new(),
            fallback,
        }
    }

    /// Parsers for every catalogued source plus the generic fallback
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::with_fallback(Arc::new(FallbackParser::new()?));
        for parser in PortalParser::catalogue()? {
            registry.register(Arc::new(parser));
        }
        Ok(registry)
    }

    /// Register a parser under the source it declares, replacing any
    /// previous one for that source.
    pub fn register(&mut self, parser: Arc<dyn LeadParser>) {
        let source = parser.source();
        let name = parser.name();
        if let Some(previous) = self.parsers.insert(source, parser) {
            warn!(
                source = %source,
                previous = previous.name(),
                replacement = name,
                "Replaced registered parser"
            );
        } else {
            debug!(source = %source, parser = name, "Registered parser");
        }
    }

    /// Parser registered for exactly this source
    #[must_use]
    pub fn get(&self, source: LeadSource) -> Option<&Arc<dyn LeadParser>> {
        self.parsers.get(&source)
    }

    /// Parser to use for `source`, falling back to the generic parser
    #[must_use]
    pub fn resolve(&self, source: LeadSource) -> &Arc<dyn LeadParser> {
        self.parsers.get(&source).unwrap_or(&self.fallback)
    }

    #[must_use]
    pub const fn fallback(&self) -> &Arc<dyn LeadParser> {
        &self.fallback
    }

    /// Sources with a dedicated parser, sorted
    #[must_use]
    pub fn sources(&self) -> Vec<LeadSource> {
        let mut sources: Vec<_> = self.parsers.keys().copied().collect();
        sources.sort();
        sources
    }
}
