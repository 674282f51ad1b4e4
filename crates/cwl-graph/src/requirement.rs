//! Requirements and hints

use cwl_document::idmap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Requirement class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequirementKind {
    /// `InlineJavascriptRequirement`
    InlineJavascript,
    /// `SchemaDefRequirement`
    SchemaDef,
    /// `DockerRequirement`
    Docker,
    /// `SoftwareRequirement`
    Software,
    /// `InitialWorkDirRequirement`
    InitialWorkDir,
    /// `EnvVarRequirement`
    EnvVar,
    /// `ShellCommandRequirement`
    ShellCommand,
    /// `ResourceRequirement`
    Resource,
    /// `SubworkflowFeatureRequirement`
    SubworkflowFeature,
    /// `ScatterFeatureRequirement`
    ScatterFeature,
    /// `MultipleInputFeatureRequirement`
    MultipleInputFeature,
    /// `StepInputExpressionRequirement`
    StepInputExpression,
    /// `LoadListingRequirement`
    LoadListing,
    /// `NetworkAccess`
    NetworkAccess,
    /// `WorkReuse`
    WorkReuse,
    /// `ToolTimeLimit`
    ToolTimeLimit,
    /// `InplaceUpdateRequirement`
    InplaceUpdate,
    /// Any other class, kept verbatim
    Other(String),
}

const KNOWN: [(&str, RequirementKind); 17] = [
    ("InlineJavascriptRequirement", RequirementKind::InlineJavascript),
    ("SchemaDefRequirement", RequirementKind::SchemaDef),
    ("DockerRequirement", RequirementKind::Docker),
    ("SoftwareRequirement", RequirementKind::Software),
    ("InitialWorkDirRequirement", RequirementKind::InitialWorkDir),
    ("EnvVarRequirement", RequirementKind::EnvVar),
    ("ShellCommandRequirement", RequirementKind::ShellCommand),
    ("ResourceRequirement", RequirementKind::Resource),
    ("SubworkflowFeatureRequirement", RequirementKind::SubworkflowFeature),
    ("ScatterFeatureRequirement", RequirementKind::ScatterFeature),
    ("MultipleInputFeatureRequirement", RequirementKind::MultipleInputFeature),
    ("StepInputExpressionRequirement", RequirementKind::StepInputExpression),
    ("LoadListingRequirement", RequirementKind::LoadListing),
    ("NetworkAccess", RequirementKind::NetworkAccess),
    ("WorkReuse", RequirementKind::WorkReuse),
    ("ToolTimeLimit", RequirementKind::ToolTimeLimit),
    ("InplaceUpdateRequirement", RequirementKind::InplaceUpdate),
];

impl RequirementKind {
    /// Kind of a `class` name
    #[must_use]
    pub fn from_class(class: &str) -> Self {
        KNOWN
            .iter()
            .find(|(name, _)| *name == class)
            .map_or_else(|| Self::Other(class.to_string()), |(_, kind)| kind.clone())
    }

    /// `class` name
    #[must_use]
    pub fn class(&self) -> &str {
        match self {
            Self::Other(class) => class,
            known => KNOWN
                .iter()
                .find(|(_, kind)| kind == known)
                .map_or("", |(name, _)| name),
        }
    }
}

impl Display for RequirementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.class())
    }
}

/// Requirement or hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Class
    pub kind: RequirementKind,
    /// Remaining fields in declaration order
    pub fields: Map<String, Value>,
}

/// Package named by a `SoftwareRequirement`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwarePackage {
    /// Package name
    pub package: String,
    /// Acceptable versions
    pub versions: Vec<String>,
    /// Identifier URIs (e.g. bio.tools, RRID)
    pub specs: Vec<String>,
}

impl Requirement {
    /// Requirement of `kind` without fields
    #[must_use]
    pub fn new(kind: RequirementKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    /// Read a requirement object
    ///
    /// # Errors
    /// Message when the object has no `class`
    pub fn from_tree(tree: &Value) -> Result<Self, String> {
        let object = tree
            .as_object()
            .ok_or_else(|| format!("requirement must be a mapping, got {tree}"))?;
        let class = idmap::class_of(tree).ok_or_else(|| "requirement without class".to_string())?;
        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != "class")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self {
            kind: RequirementKind::from_class(class),
            fields,
        })
    }

    /// Requirement object, `class` first
    #[must_use]
    pub fn to_tree(&self) -> Value {
        let mut tree = Map::new();
        tree.insert("class".to_string(), Value::String(self.kind.class().to_string()));
        tree.extend(self.fields.clone());
        Value::Object(tree)
    }

    /// Packages of a `SoftwareRequirement`; empty for other kinds
    #[must_use]
    pub fn software_packages(&self) -> Vec<SoftwarePackage> {
        if self.kind != RequirementKind::Software {
            return Vec::new();
        }
        let Some(packages) = self.fields.get("packages") else {
            return Vec::new();
        };
        let Ok(entries) = idmap::expand("packages", packages, "package", Some("specs")) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                Some(SoftwarePackage {
                    package: entry.get("package")?.as_str()?.to_string(),
                    versions: strings(entry.get("version")),
                    specs: strings(entry.get("specs")),
                })
            })
            .collect()
    }

    /// `dockerPull` of a `DockerRequirement`
    #[must_use]
    pub fn docker_image(&self) -> Option<&str> {
        if self.kind != RequirementKind::Docker {
            return None;
        }
        self.fields.get("dockerPull").and_then(Value::as_str)
    }
}

/// A string or list of strings
fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
