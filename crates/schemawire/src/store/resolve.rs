//! Two-phase resolution of named-type references
//!
//! A definition is parsed against the names known so far. When the parser
//! reports a reference it cannot satisfy, the missing type is loaded from the
//! [`DefinitionSource`] as a top-level schema of its own and the original
//! definition is parsed again. While the referenced type loads, the original
//! definition stays declared in [`Names`] so a reference back to it (a cycle)
//! can be inlined.

use crate::avro::{AvroSchema, Names, ParseError};
use crate::error::{Error, Result};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Where definitions of top-level schemas come from
pub(crate) trait DefinitionSource {
    /// Raw definition for `fullname` and a description of where it was found
    fn definition(&self, fullname: &str) -> Result<(String, JsonValue)>;
}

/// One resolution: its scratch names and every top-level schema it parsed
pub(crate) struct Resolver<'a, S: ?Sized> {
    source: &'a S,
    names: Names,
    loaded: Vec<(String, AvroSchema)>,
}

impl<'a, S: DefinitionSource + ?Sized> Resolver<'a, S> {
    pub(crate) fn new(source: &'a S) -> Self {
        Self::with_names(source, Names::new())
    }

    /// Start from already known definitions
    pub(crate) fn with_names(source: &'a S, names: Names) -> Self {
        Self {
            source,
            names,
            loaded: Vec::new(),
        }
    }

    /// Top-level schemas parsed so far, requested one last
    pub(crate) fn into_loaded(self) -> Vec<(String, AvroSchema)> {
        self.loaded
    }

    /// Load `fullname` from the source
    pub(crate) fn resolve(&mut self, fullname: &str) -> Result<AvroSchema> {
        if let Some((_, schema)) = self.loaded.iter().find(|(name, _)| name == fullname) {
            return Ok(schema.clone());
        }
        let (origin, definition) = self.source.definition(fullname)?;
        self.resolve_definition(fullname, &origin, &definition)
    }

    /// Parse `definition`, which must define `fullname`
    pub(crate) fn resolve_definition(
        &mut self,
        fullname: &str,
        origin: &str,
        definition: &JsonValue,
    ) -> Result<AvroSchema> {
        let mut previous_missing: Option<String> = None;

        loop {
            self.names.declare(fullname, definition.clone());
            let attempt = AvroSchema::parse_with_names(definition, &self.names);

            match attempt {
                Ok(schema) => {
                    self.names.remove(fullname);
                    return self.accept(fullname, origin, schema);
                }
                Err(ParseError::UnresolvedReference(missing)) => {
                    if missing == fullname || previous_missing.as_deref() == Some(missing.as_str()) {
                        self.names.remove(fullname);
                        return Err(ParseError::UnresolvedReference(missing).into());
                    }
                    debug!(schema = %fullname, missing = %missing, "loading referenced schema");

                    let loaded = self.resolve(&missing);
                    // Only completed loads stay in the scratch names.
                    self.names.remove(fullname);
                    loaded?;
                    previous_missing = Some(missing);
                }
                Err(e) => {
                    self.names.remove(fullname);
                    return Err(e.into());
                }
            }
        }
    }

    fn accept(&mut self, fullname: &str, origin: &str, schema: AvroSchema) -> Result<AvroSchema> {
        if let Some(declared) = schema.fullname() {
            if declared != fullname {
                return Err(Error::Schema(format!(
                    "expected schema `{origin}' to define type `{fullname}'"
                )));
            }
        }
        self.names.absorb(schema.definition());
        self.loaded.push((fullname.to_string(), schema.clone()));
        Ok(schema)
    }
}
