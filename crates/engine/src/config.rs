use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

use crate::detect::detect;
use crate::error::ConfigError;
use crate::rules::{Rule, RuleDocument};

pub const MAIN_GROUP: &str = "main";
pub const DEFAULT_LOCALITY_FIELD: &str = "LOCALITATE";

// ---------------------------------------------------------------------------
// Catalog document
// ---------------------------------------------------------------------------

/// Top-level catalog document. Each `[[models]]` entry is kept as a raw table
/// so one bad model does not make the whole document unreadable.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    models: Vec<toml::Table>,
}

/// The subset of a model entry needed for routing. Deserialized leniently so a
/// model with a broken field list still claims its files.
#[derive(Debug, Deserialize)]
struct RouteDocument {
    id: String,
    #[serde(default)]
    layer: ModelLayer,
    #[serde(default)]
    group: Option<String>,
    patterns: Vec<PatternDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDocument {
    pub id: String,
    #[serde(default)]
    pub layer: ModelLayer,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<PatternDocument>,
    #[serde(default)]
    pub match_headers: bool,
    pub fields: Vec<FieldDocument>,
    #[serde(default)]
    pub duplicate_keys: Vec<String>,
    #[serde(default)]
    pub key_case: KeyCase,
    #[serde(default)]
    pub locality_field: Option<String>,
    #[serde(default)]
    pub output: OutputMode,
    #[serde(default)]
    pub individual: Option<IndividualDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternDocument {
    pub kind: PatternKind,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub rule: Option<RuleDocument>,
    #[serde(default)]
    pub case: TextCase,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndividualDocument {
    pub directory: String,
    #[serde(default)]
    pub priority: Vec<String>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLayer {
    #[default]
    Main,
    Search,
}

impl fmt::Display for ModelLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Search => write!(f, "search"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCase {
    #[default]
    Keep,
    Upper,
}

/// How duplicate-key values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCase {
    #[default]
    Insensitive,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum OutputMode {
    #[default]
    #[serde(rename = "centralized")]
    CentralizedOnly,
    #[serde(rename = "individual")]
    IndividualPlusCentralized,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CentralizedOnly => write!(f, "centralized"),
            Self::IndividualPlusCentralized => write!(f, "individual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Prefix,
    Contains,
}

// ---------------------------------------------------------------------------
// Compiled model
// ---------------------------------------------------------------------------

/// File-name rule. Matching is case-insensitive; `value` is stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    pub kind: PatternKind,
    pub value: String,
}

impl FilePattern {
    pub fn new(kind: PatternKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_uppercase(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_uppercase();
        match self.kind {
            PatternKind::Prefix => name.starts_with(&self.value),
            PatternKind::Contains => name.contains(&self.value),
        }
    }

    /// Remove the pattern from a file stem, leaving the locality part:
    /// `CASE_BARLAD` -> `BARLAD`. Returns `None` if nothing is left.
    pub fn strip(&self, stem: &str) -> Option<String> {
        let upper = stem.to_uppercase();
        let rest = match self.kind {
            PatternKind::Prefix => upper.strip_prefix(&self.value)?.to_string(),
            PatternKind::Contains => upper.replacen(&self.value, "", 1),
        };
        let rest = rest.trim_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
        (!rest.is_empty()).then(|| rest.to_string())
    }

    /// True if every name this pattern matches is also matched by `other`.
    pub fn is_covered_by(&self, other: &FilePattern) -> bool {
        match (other.kind, self.kind) {
            (PatternKind::Contains, _) => self.value.contains(&other.value),
            (PatternKind::Prefix, PatternKind::Prefix) => self.value.starts_with(&other.value),
            (PatternKind::Prefix, PatternKind::Contains) => false,
        }
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PatternKind::Prefix => write!(f, "{}*", self.value),
            PatternKind::Contains => write!(f, "*{}*", self.value),
        }
    }
}

/// What the detector needs to know about a model.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub group: String,
    pub patterns: Vec<FilePattern>,
}

impl Route {
    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(file_name))
    }

    pub fn matching_pattern(&self, file_name: &str) -> Option<&FilePattern> {
        self.patterns.iter().find(|p| p.matches(file_name))
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Output name, upper-cased.
    pub name: String,
    /// Upper-cased property names to look up, in order.
    pub sources: Vec<String>,
    pub required: bool,
    pub rule: Option<Rule>,
    pub case: TextCase,
}

#[derive(Debug, Clone)]
pub struct IndividualOutput {
    pub directory: String,
    pub priority: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub id: String,
    pub layer: ModelLayer,
    pub description: String,
    pub route: Route,
    pub match_headers: bool,
    pub fields: Vec<FieldSpec>,
    pub duplicate_keys: Vec<String>,
    pub key_case: KeyCase,
    pub locality_field: String,
    pub output: OutputMode,
    pub individual: Option<IndividualOutput>,
}

impl ModelConfig {
    pub fn group(&self) -> &str {
        &self.route.group
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True if `headers` contain a source alias for every required field.
    pub fn headers_match<S: AsRef<str>>(&self, headers: &[S]) -> bool {
        let present: HashSet<String> = headers.iter().map(|h| h.as_ref().to_uppercase()).collect();
        self.fields
            .iter()
            .filter(|f| f.required)
            .all(|f| f.sources.iter().any(|s| present.contains(s)))
    }

    /// Locality of an individual output file, derived from its stem.
    pub fn source_locality(&self, stem: &str) -> String {
        self.route
            .patterns
            .iter()
            .filter(|p| p.matches(stem))
            .find_map(|p| p.strip(stem))
            .unwrap_or_else(|| stem.to_uppercase())
    }

    pub fn compile(doc: ModelDocument) -> Result<Self, ConfigError> {
        let id = doc.id.trim().to_string();
        let route = compile_route(&id, doc.layer, doc.group.as_deref(), &doc.patterns)?;

        if doc.fields.is_empty() {
            return Err(ConfigError::invalid(&id, "at least one field is required"));
        }

        let mut fields = Vec::with_capacity(doc.fields.len());
        let mut seen = HashSet::new();
        for field in doc.fields {
            let name = field.name.trim().to_uppercase();
            if name.is_empty() {
                return Err(ConfigError::invalid(&id, "field with an empty name"));
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::invalid(&id, format!("field '{name}' declared twice")));
            }
            let mut sources: Vec<String> = field
                .sources
                .iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if sources.is_empty() {
                sources.push(name.clone());
            }
            let rule = field
                .rule
                .as_ref()
                .map(Rule::compile)
                .transpose()
                .map_err(|reason| ConfigError::invalid(&id, format!("field '{name}': {reason}")))?;
            fields.push(FieldSpec {
                name,
                sources,
                required: field.required,
                rule,
                case: field.case,
            });
        }

        let mut duplicate_keys = Vec::with_capacity(doc.duplicate_keys.len());
        for key in &doc.duplicate_keys {
            let key = key.trim().to_uppercase();
            if !seen.contains(&key) {
                return Err(ConfigError::invalid(
                    &id,
                    format!("duplicate key '{key}' is not one of the model's fields"),
                ));
            }
            duplicate_keys.push(key);
        }

        let locality_field = doc
            .locality_field
            .as_deref()
            .map(|f| f.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_LOCALITY_FIELD.to_string());

        let individual = match (doc.output, doc.individual) {
            (OutputMode::CentralizedOnly, Some(_)) => {
                return Err(ConfigError::invalid(
                    &id,
                    "[individual] section requires output = \"individual\"",
                ));
            }
            (OutputMode::IndividualPlusCentralized, None) => {
                return Err(ConfigError::invalid(
                    &id,
                    "output = \"individual\" requires an [individual] section",
                ));
            }
            (OutputMode::IndividualPlusCentralized, Some(ind)) => {
                let directory = ind.directory.trim().to_string();
                if directory.is_empty()
                    || directory.contains(['/', '\\'])
                    || directory == "."
                    || directory == ".."
                {
                    return Err(ConfigError::invalid(
                        &id,
                        format!("individual directory '{}' must be a plain name", ind.directory),
                    ));
                }
                Some(IndividualOutput {
                    directory,
                    priority: ind.priority.iter().map(|p| p.trim().to_uppercase()).collect(),
                })
            }
            (OutputMode::CentralizedOnly, None) => None,
        };

        Ok(Self {
            id,
            layer: doc.layer,
            description: doc.description,
            route,
            match_headers: doc.match_headers,
            fields,
            duplicate_keys,
            key_case: doc.key_case,
            locality_field,
            output: doc.output,
            individual,
        })
    }
}

fn compile_route(
    id: &str,
    layer: ModelLayer,
    group: Option<&str>,
    patterns: &[PatternDocument],
) -> Result<Route, ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::invalid("<unnamed>", "model id is empty"));
    }
    if patterns.is_empty() {
        return Err(ConfigError::invalid(id, "at least one file pattern is required"));
    }
    let mut compiled = Vec::with_capacity(patterns.len());
    for p in patterns {
        let value = p.value.trim();
        if value.is_empty() {
            return Err(ConfigError::invalid(id, "file pattern with an empty value"));
        }
        compiled.push(FilePattern::new(p.kind, value));
    }
    let group = match (group.map(str::trim), layer) {
        (Some(g), _) if !g.is_empty() => g.to_string(),
        (_, ModelLayer::Main) => MAIN_GROUP.to_string(),
        (_, ModelLayer::Search) => id.to_string(),
    };
    Ok(Route {
        id: id.to_string(),
        group,
        patterns: compiled,
    })
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    /// Present when the model's routing part is valid, even if the rest is not.
    pub route: Option<Route>,
    pub model: Result<ModelConfig, ConfigError>,
}

/// Routing decision for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub group: String,
    pub model: Option<String>,
}

/// A pattern that can never win because an earlier model in the same group
/// always matches first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedPattern {
    pub model: String,
    pub pattern: FilePattern,
    pub shadowed_by: String,
    pub by_pattern: FilePattern,
}

impl fmt::Display for ShadowedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model '{}' pattern {} is shadowed by model '{}' pattern {}",
            self.model, self.pattern, self.shadowed_by, self.by_pattern
        )
    }
}

/// Ordered set of models. Entry order is detection priority.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse a catalog document. Only a document-level failure is an error;
    /// per-model problems are kept on the entry.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let doc: CatalogDocument =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut entries: Vec<CatalogEntry> = Vec::with_capacity(doc.models.len());
        for (index, table) in doc.models.into_iter().enumerate() {
            entries.push(compile_entry(index, table));
        }

        // Later declarations of an id lose both their route and their model.
        let mut ids = HashSet::new();
        for entry in &mut entries {
            if !ids.insert(entry.id.clone()) {
                entry.route = None;
                entry.model = Err(ConfigError::DuplicateModel(entry.id.clone()));
            }
        }

        let catalog = Self { entries };
        for shadow in catalog.shadowed() {
            log::warn!("{shadow}");
        }
        Ok(catalog)
    }

    pub fn from_models(models: Vec<ModelConfig>) -> Self {
        let entries = models
            .into_iter()
            .map(|m| CatalogEntry {
                id: m.id.clone(),
                route: Some(m.route.clone()),
                model: Ok(m),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// The compiled model, or why it could not be compiled.
    pub fn get(&self, id: &str) -> Result<&ModelConfig, ConfigError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ConfigError::UnknownModel(id.to_string()))?;
        entry.model.as_ref().map_err(Clone::clone)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.entries.iter().filter_map(|e| e.model.as_ref().ok())
    }

    pub fn broken(&self) -> impl Iterator<Item = (&str, &ConfigError)> {
        self.entries
            .iter()
            .filter_map(|e| e.model.as_ref().err().map(|err| (e.id.as_str(), err)))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.iter().filter_map(|e| e.route.as_ref())
    }

    /// Routing groups in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for route in self.routes() {
            if !groups.contains(&route.group.as_str()) {
                groups.push(route.group.as_str());
            }
        }
        groups
    }

    /// Route a file name within every group. First match wins inside a group.
    pub fn route(&self, file_name: &str) -> Vec<RouteDecision> {
        self.groups()
            .into_iter()
            .map(|group| RouteDecision {
                group: group.to_string(),
                model: detect(file_name, self.routes().filter(|r| r.group == group))
                    .map(str::to_string),
            })
            .collect()
    }

    /// Patterns that can never match first within their group.
    pub fn shadowed(&self) -> Vec<ShadowedPattern> {
        let routes: Vec<&Route> = self.routes().collect();
        let mut out = Vec::new();
        for (i, later) in routes.iter().enumerate() {
            for pattern in &later.patterns {
                let earlier = routes[..i]
                    .iter()
                    .filter(|r| r.group == later.group)
                    .find_map(|r| {
                        r.patterns
                            .iter()
                            .find(|p| pattern.is_covered_by(p))
                            .map(|p| (r.id.clone(), p.clone()))
                    });
                if let Some((shadowed_by, by_pattern)) = earlier {
                    out.push(ShadowedPattern {
                        model: later.id.clone(),
                        pattern: pattern.clone(),
                        shadowed_by,
                        by_pattern,
                    });
                }
            }
        }
        out
    }
}

fn compile_entry(index: usize, table: toml::Table) -> CatalogEntry {
    let id = table
        .get("id")
        .and_then(toml::Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("models[{index}]"));

    let value = toml::Value::Table(table);

    let route = value
        .clone()
        .try_into::<RouteDocument>()
        .ok()
        .and_then(|doc| compile_route(&id, doc.layer, doc.group.as_deref(), &doc.patterns).ok());

    let model = value
        .try_into::<ModelDocument>()
        .map_err(|e| ConfigError::Malformed {
            model: id.clone(),
            reason: e.to_string().trim().to_string(),
        })
        .and_then(ModelConfig::compile);

    if let Err(err) = &model {
        log::warn!("{err}");
    }

    CatalogEntry { id, route, model }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
