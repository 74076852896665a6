//! Language parser selection.
//!
//! A root module picks its parser once the tool version is known, then wires the
//! module's [`SchemaStorage`](crate::schema::SchemaStorage) into it as a read-only
//! [`SchemaReader`]. Parsing configuration itself happens elsewhere; the parsers here
//! only answer schema-backed questions about top-level blocks.

use crate::constants::MIN_SUPPORTED_VERSION;
use crate::core::TfError;
use crate::logging::Logger;
use crate::schema::SchemaReader;
use crate::version::parse_version;
use std::sync::Arc;

/// A version-specific configuration language parser.
pub trait Parser: Send + Sync {
    /// Logger receiving parser events.
    fn set_logger(&mut self, logger: Logger);

    /// Schema source used to describe blocks.
    fn set_schema_reader(&mut self, reader: Arc<dyn SchemaReader>);

    /// Description of a top-level `provider`, `resource` or `data` block.
    fn describe_block(&self, block_type: &str, label: &str) -> Result<String, TfError>;
}

/// Selects a parser for a version string.
pub type ParserFinder = Arc<dyn Fn(&str) -> Result<Box<dyn Parser>, TfError> + Send + Sync>;

/// Return the parser compatible with `version`.
///
/// Every version from 0.12.0 on uses the HCL2 parser; older versions have none.
pub fn find_compatible_parser(version: &str) -> Result<Box<dyn Parser>, TfError> {
    let parsed = parse_version(version)?;
    if parsed >= MIN_SUPPORTED_VERSION {
        return Ok(Box::new(Hcl2Parser::default()));
    }
    Err(TfError::NoCompatibleParser {
        version: version.to_string(),
    })
}

/// The default [`ParserFinder`], backed by [`find_compatible_parser`].
pub fn default_parser_finder() -> ParserFinder {
    Arc::new(find_compatible_parser)
}

/// Parser for HCL2-era (0.12+) configuration.
#[derive(Default)]
pub struct Hcl2Parser {
    logger: Logger,
    schema_reader: Option<Arc<dyn SchemaReader>>,
}

impl Parser for Hcl2Parser {
    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    fn set_schema_reader(&mut self, reader: Arc<dyn SchemaReader>) {
        self.schema_reader = Some(reader);
    }

    fn describe_block(&self, block_type: &str, label: &str) -> Result<String, TfError> {
        let reader = self.schema_reader.as_ref().ok_or_else(|| TfError::not_available("schema reader"))?;
        self.logger.scope(|| {
            tracing::debug!(target: "lang", "Describing {} block {:?}", block_type, label);
        });

        let schema = match block_type {
            "provider" => reader.provider_config_schema(label)?,
            "resource" => reader.resource_schema(label)?,
            "data" => reader.data_source_schema(label)?,
            other => {
                return Err(TfError::Other {
                    message: format!("unknown block type {other:?}"),
                });
            }
        };
        Ok(schema.block.description)
    }
}
