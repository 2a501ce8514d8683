//! Role Catalog: the fixed set of role categories a job description is scored against.
//!
//! Loaded once at startup (built-in or from a JSON override) and shared read-only
//! behind an `Arc`. Every key is a `RoleKey` variant, so an unknown category in a
//! catalog file fails at load time rather than during a request.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classification::keywords::normalize_text;

// ────────────────────────────────────────────────────────────────────────────
// Role keys
// ────────────────────────────────────────────────────────────────────────────

/// Closed set of role categories known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKey {
    Fullstack,
    Backend,
    Frontend,
    DevopsCloud,
    AiSystems,
    DataEngineering,
    Mobile,
    SoftwareEngineer,
}

impl RoleKey {
    pub const ALL: [RoleKey; 8] = [
        RoleKey::Fullstack,
        RoleKey::Backend,
        RoleKey::Frontend,
        RoleKey::DevopsCloud,
        RoleKey::AiSystems,
        RoleKey::DataEngineering,
        RoleKey::Mobile,
        RoleKey::SoftwareEngineer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKey::Fullstack => "fullstack",
            RoleKey::Backend => "backend",
            RoleKey::Frontend => "frontend",
            RoleKey::DevopsCloud => "devops_cloud",
            RoleKey::AiSystems => "ai_systems",
            RoleKey::DataEngineering => "data_engineering",
            RoleKey::Mobile => "mobile",
            RoleKey::SoftwareEngineer => "software_engineer",
        }
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role key '{0}'")]
pub struct UnknownRoleKey(pub String);

impl FromStr for RoleKey {
    type Err = UnknownRoleKey;

    /// Accepts the canonical key plus the common spellings an LLM tends to return
    /// ("AI-systems", "DevOps cloud", "full stack").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' || c == '/' { '_' } else { c })
            .collect();

        if let Some(key) = RoleKey::ALL.iter().find(|k| k.as_str() == canonical) {
            return Ok(*key);
        }

        match canonical.as_str() {
            "full_stack" => Ok(RoleKey::Fullstack),
            "back_end" => Ok(RoleKey::Backend),
            "front_end" => Ok(RoleKey::Frontend),
            "devops" | "cloud" => Ok(RoleKey::DevopsCloud),
            "ai" | "ai_ml" => Ok(RoleKey::AiSystems),
            "data" => Ok(RoleKey::DataEngineering),
            "general" => Ok(RoleKey::SoftwareEngineer),
            _ => Err(UnknownRoleKey(s.to_string())),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Categories
// ────────────────────────────────────────────────────────────────────────────

fn default_template_suffix() -> String {
    ".tex".to_string()
}

/// Where a role's template lives, relative to the template root unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateRef {
    /// First file (lexical order) in `path` whose name ends with `suffix`.
    Directory {
        path: PathBuf,
        #[serde(default = "default_template_suffix")]
        suffix: String,
    },
    File { path: PathBuf },
}

/// One role category: its keyword evidence, priority weight and template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCategory {
    pub key: RoleKey,
    pub display_name: String,
    /// Phrases matched as whole units. Normalized to lowercase at load.
    pub keywords: Vec<String>,
    /// Lower number = more important. Raw score is divided by this.
    pub priority: u32,
    pub template: TemplateRef,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("role catalog has no categories")]
    Empty,

    #[error("role '{0}' is defined more than once")]
    DuplicateRole(RoleKey),

    #[error("role '{0}' has no keywords")]
    NoKeywords(RoleKey),

    #[error("role '{0}' has a blank keyword phrase")]
    BlankKeyword(RoleKey),

    #[error("role '{role}' has priority {priority}; priority must be at least 1")]
    InvalidPriority { role: RoleKey, priority: u32 },

    #[error("default role '{0}' is not defined in the catalog")]
    MissingDefault(RoleKey),

    #[error("guarded role '{0}' is not defined in the catalog")]
    MissingGuarded(RoleKey),

    #[error("failed to build keyword matcher: {0}")]
    Matcher(String),

    #[error("failed to read role catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse role catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape of a catalog override file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    default_role: RoleKey,
    #[serde(default)]
    guarded_role: Option<RoleKey>,
    categories: Vec<RoleCategory>,
}

/// Validated, immutable set of role categories.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    categories: Vec<RoleCategory>,
    default_role: RoleKey,
    guarded_role: Option<RoleKey>,
}

impl RoleCatalog {
    /// Validates and normalizes the categories.
    ///
    /// `default_role` is returned when every candidate template is unusable.
    /// `guarded_role` may only win with a majority share (see `SelectionPolicy`).
    pub fn new(
        categories: Vec<RoleCategory>,
        default_role: RoleKey,
        guarded_role: Option<RoleKey>,
    ) -> Result<Self, CatalogError> {
        if categories.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(categories.len());

        for mut category in categories {
            if !seen.insert(category.key) {
                return Err(CatalogError::DuplicateRole(category.key));
            }
            if category.priority < 1 {
                return Err(CatalogError::InvalidPriority {
                    role: category.key,
                    priority: category.priority,
                });
            }
            if category.keywords.is_empty() {
                return Err(CatalogError::NoKeywords(category.key));
            }

            let mut phrases: Vec<String> = Vec::with_capacity(category.keywords.len());
            for raw in &category.keywords {
                let phrase = normalize_text(raw);
                if phrase.is_empty() {
                    return Err(CatalogError::BlankKeyword(category.key));
                }
                if !phrases.contains(&phrase) {
                    phrases.push(phrase);
                }
            }
            category.keywords = phrases;
            normalized.push(category);
        }

        if !seen.contains(&default_role) {
            return Err(CatalogError::MissingDefault(default_role));
        }
        if let Some(guarded) = guarded_role {
            if !seen.contains(&guarded) {
                return Err(CatalogError::MissingGuarded(guarded));
            }
        }

        Ok(Self {
            categories: normalized,
            default_role,
            guarded_role,
        })
    }

    /// Parses a catalog override from JSON text.
    pub fn from_json_str(json: &str, source: &Path) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse {
                path: source.to_path_buf(),
                source: e,
            })?;
        Self::new(file.categories, file.default_role, file.guarded_role)
    }

    /// Loads a catalog override from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json, path)
    }

    /// The catalog shipped with the service.
    pub fn builtin() -> Result<Self, CatalogError> {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|(key, display_name, priority, keywords)| RoleCategory {
                key: *key,
                display_name: display_name.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                priority: *priority,
                template: TemplateRef::Directory {
                    path: PathBuf::from(key.as_str()),
                    suffix: default_template_suffix(),
                },
            })
            .collect();

        Self::new(
            categories,
            RoleKey::SoftwareEngineer,
            Some(RoleKey::AiSystems),
        )
    }

    pub fn categories(&self) -> &[RoleCategory] {
        &self.categories
    }

    pub fn get(&self, key: RoleKey) -> Option<&RoleCategory> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn index_of(&self, key: RoleKey) -> Option<usize> {
        self.categories.iter().position(|c| c.key == key)
    }

    pub fn default_role(&self) -> RoleKey {
        self.default_role
    }

    pub fn guarded_role(&self) -> Option<RoleKey> {
        self.guarded_role
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in catalog
// ────────────────────────────────────────────────────────────────────────────

type BuiltinCategory = (RoleKey, &'static str, u32, &'static [&'static str]);

const BUILTIN_CATEGORIES: &[BuiltinCategory] = &[
    (
        RoleKey::Fullstack,
        "Full Stack Engineer",
        2,
        &[
            "full stack",
            "full-stack",
            "fullstack",
            "react",
            "typescript",
            "javascript",
            "node.js",
            "nodejs",
            "flask",
            "django",
            "next.js",
            "rest api",
            "graphql",
            "web application",
            "ai integration",
            "llm integration",
            "openai api",
        ],
    ),
    (
        RoleKey::Backend,
        "Backend Engineer",
        3,
        &[
            "backend",
            "back-end",
            "api design",
            "microservices",
            "python",
            "java",
            "golang",
            "rust",
            "postgresql",
            "sql",
            "redis",
            "kafka",
            "distributed systems",
            "spring boot",
        ],
    ),
    (
        RoleKey::Frontend,
        "Frontend Engineer",
        3,
        &[
            "frontend",
            "front-end",
            "vue",
            "angular",
            "css",
            "html",
            "tailwind",
            "ui components",
            "design system",
            "accessibility",
        ],
    ),
    (
        RoleKey::DevopsCloud,
        "DevOps / Cloud Engineer",
        2,
        &[
            "devops",
            "cloud",
            "aws",
            "azure",
            "gcp",
            "kubernetes",
            "docker",
            "terraform",
            "ci/cd",
            "infrastructure as code",
            "site reliability",
            "sre",
            "cloudformation",
            "ansible",
            "observability",
        ],
    ),
    (
        RoleKey::AiSystems,
        "AI Systems Engineer",
        1,
        &[
            "machine learning",
            "deep learning",
            "llm",
            "large language model",
            "pytorch",
            "tensorflow",
            "model training",
            "fine-tuning",
            "rag",
            "retrieval augmented generation",
            "mlops",
            "nlp",
            "computer vision",
            "ai agents",
        ],
    ),
    (
        RoleKey::DataEngineering,
        "Data Engineer",
        3,
        &[
            "data pipeline",
            "data pipelines",
            "etl",
            "spark",
            "airflow",
            "data warehouse",
            "snowflake",
            "dbt",
            "bigquery",
            "data modeling",
            "big data",
        ],
    ),
    (
        RoleKey::Mobile,
        "Mobile Engineer",
        3,
        &[
            "ios",
            "android",
            "swift",
            "kotlin",
            "react native",
            "flutter",
            "mobile app",
            "mobile application",
        ],
    ),
    (
        RoleKey::SoftwareEngineer,
        "Software Engineer",
        4,
        &[
            "software engineer",
            "software development",
            "object-oriented",
            "data structures",
            "algorithms",
            "unit testing",
            "code review",
            "agile",
        ],
    ),
];

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
