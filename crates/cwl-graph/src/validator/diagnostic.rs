//! Validation diagnostics

use crate::requirement::RequirementKind;
use crate::types::TypeDescriptor;
use serde::Serialize;
use thiserror::Error;

/// One problem found by the [`GraphValidator`](super::GraphValidator)
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Two siblings share an identifier
    #[error("duplicate identifier '{id}' in {scope}")]
    DuplicateIdentifier {
        /// Enclosing scope
        scope: String,
        /// Repeated identifier
        id: String,
    },

    /// Steps depend on each other in a loop
    #[error("dependency cycle in {workflow}: {}", .steps.join(" -> "))]
    CyclicDependency {
        /// Workflow key
        workflow: String,
        /// Steps in data-flow order
        steps: Vec<String>,
    },

    /// Required input with nothing feeding it
    #[error("input '{input}' of step '{step}' in {workflow} has no source")]
    UnsatisfiedInput {
        /// Workflow key
        workflow: String,
        /// Step id
        step: String,
        /// Target input id
        input: String,
    },

    /// Several sources with no way to combine them
    #[error(
        "input '{input}' of step '{step}' in {workflow} has sources {} but no linkMerge",
        .sources.join(", ")
    )]
    AmbiguousSource {
        /// Workflow key
        workflow: String,
        /// Step id
        step: String,
        /// Step input id
        input: String,
        /// Competing sources
        sources: Vec<String>,
    },

    /// Producer type not accepted by the consumer
    #[error("{producer} ({producer_type}) cannot feed {consumer} ({consumer_type}) in {workflow}")]
    TypeMismatch {
        /// Workflow key
        workflow: String,
        /// Producing port(s)
        producer: String,
        /// Consuming port (`step/input` or workflow output id)
        consumer: String,
        /// Effective producer type
        producer_type: TypeDescriptor,
        /// Effective consumer type
        consumer_type: TypeDescriptor,
    },

    /// Step uses a feature its workflow did not enable
    #[error("step '{step}' in {workflow} needs {requirement}")]
    MissingRequirement {
        /// Workflow key
        workflow: String,
        /// Step id
        step: String,
        /// Missing feature requirement
        requirement: RequirementKind,
    },

    /// Workflow output with no `outputSource`
    #[error("output '{output}' of {workflow} has no outputSource")]
    UnsatisfiedOutput {
        /// Workflow key
        workflow: String,
        /// Output id
        output: String,
    },
}

impl Diagnostic {
    /// Error taxonomy name
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentifier { .. } => "DuplicateIdentifierError",
            Self::CyclicDependency { .. } => "CyclicDependencyError",
            Self::UnsatisfiedInput { .. } => "UnsatisfiedInputError",
            Self::AmbiguousSource { .. } => "AmbiguousSourceError",
            Self::TypeMismatch { .. } => "TypeMismatchError",
            Self::MissingRequirement { .. } => "MissingRequirementError",
            Self::UnsatisfiedOutput { .. } => "UnsatisfiedOutputError",
        }
    }
}
