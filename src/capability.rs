//! Capability descriptor advertised to clients that send `describe`.

use tracing::warn;

use crate::protocol::messages::{Attribution, HandleModel, HandleProgram, Info, Message};
use crate::protocol::Event;
use crate::Result;

/// Description advertised for the handling program.
pub const PROGRAM_DESCRIPTION: &str = "Handle intents with an external program";

/// Description advertised for the program's single model.
pub const MODEL_DESCRIPTION: &str = "External program to handle intents";

/// Immutable description of this adapter's identity and languages.
///
/// Built once at startup and shared read-only by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    program_name: String,
    description: String,
    languages: Vec<String>,
    installed: bool,
}

impl CapabilityDescriptor {
    /// Build a descriptor with the default program description.
    ///
    /// An empty `languages` list is accepted and advertises no language.
    #[must_use]
    pub fn new(program_name: impl Into<String>, languages: &[String]) -> Self {
        Self::with_description(program_name, PROGRAM_DESCRIPTION, languages)
    }

    /// Build a descriptor with an explicit program description.
    #[must_use]
    pub fn with_description(
        program_name: impl Into<String>,
        description: impl Into<String>,
        languages: &[String],
    ) -> Self {
        let program_name = program_name.into();
        if languages.is_empty() {
            warn!(%program_name, "capability descriptor advertises no languages");
        }

        Self {
            program_name,
            description: description.into(),
            languages: languages.to_vec(),
            installed: true,
        }
    }

    /// Advertised program name.
    #[must_use]
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Advertised program description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Advertised languages, in configuration order.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Whether the program is reported as installed. Always `true`.
    #[must_use]
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Render the descriptor as the `info` message schema.
    #[must_use]
    pub fn info(&self) -> Info {
        Info {
            handle: vec![HandleProgram {
                name: self.program_name.clone(),
                description: Some(self.description.clone()),
                attribution: Attribution::default(),
                installed: self.installed,
                version: None,
                models: vec![HandleModel {
                    name: self.program_name.clone(),
                    description: Some(MODEL_DESCRIPTION.to_owned()),
                    attribution: Attribution::default(),
                    installed: self.installed,
                    version: None,
                    languages: self.languages.clone(),
                }],
            }],
            ..Info::default()
        }
    }

    /// Encode the descriptor as an `info` event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) if the
    /// message cannot be serialised.
    pub fn to_event(&self) -> Result<Event> {
        self.info().to_event()
    }
}
