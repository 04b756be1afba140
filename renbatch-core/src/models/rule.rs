use super::{Filename, RenameError};
use crate::sanitize::{MAX_NAME_LEN, sanitize};
use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    PrefixSuffix {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
    Replace {
        find: String,
        #[serde(default)]
        replace: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    RegexReplace { pattern: String, replacement: String },
    Numbering {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default = "default_start")]
        start: u64,
        #[serde(default = "default_digits")]
        digits: usize,
    },
}

fn default_true() -> bool {
    true
}

fn default_start() -> u64 {
    1
}

fn default_digits() -> usize {
    3
}

/// Position of the file inside the batch being transformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub index: usize,
}

impl Rule {
    pub fn compile(&self) -> Result<CompiledRule, RenameError> {
        Ok(match self {
            Rule::PrefixSuffix { prefix, suffix } => CompiledRule::PrefixSuffix {
                prefix: prefix.clone(),
                suffix: suffix.clone(),
            },
            Rule::Replace { find, replace, case_sensitive } => {
                if find.is_empty() {
                    CompiledRule::Identity
                } else if *case_sensitive {
                    CompiledRule::Literal {
                        find: find.clone(),
                        replace: replace.clone(),
                    }
                } else {
                    let re = RegexBuilder::new(&regex::escape(find))
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| RenameError::InvalidPattern {
                            pattern: find.clone(),
                            message: e.to_string(),
                        })?;
                    CompiledRule::CaselessLiteral { re, replace: replace.clone() }
                }
            }
            Rule::RegexReplace { pattern, replacement } => {
                let re = Regex::new(pattern).map_err(|e| RenameError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                CompiledRule::Regex { re, replacement: replacement.clone() }
            }
            Rule::Numbering { prefix, suffix, start, digits } => CompiledRule::Numbering {
                prefix: prefix.clone(),
                suffix: suffix.clone(),
                start: *start,
                digits: (*digits).min(MAX_NAME_LEN),
            },
        })
    }

    /// Compiles and runs the rule on a single name.
    pub fn execute(&self, name: &str, context: &Context) -> Result<String, RenameError> {
        Ok(self.compile()?.execute(name, context))
    }
}

/// A rule with its patterns compiled, ready to run over a whole batch.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Identity,
    PrefixSuffix { prefix: String, suffix: String },
    Literal { find: String, replace: String },
    CaselessLiteral { re: Regex, replace: String },
    Regex { re: Regex, replacement: String },
    Numbering { prefix: String, suffix: String, start: u64, digits: usize },
}

impl CompiledRule {
    /// Transforms a bare file name. The output is always sanitized.
    pub fn execute(&self, name: &str, context: &Context) -> String {
        let raw = match self {
            CompiledRule::Identity => name.to_string(),
            CompiledRule::PrefixSuffix { prefix, suffix } => {
                let filename = Filename::parse(name);
                format!("{}{}{}{}", prefix, filename.base, suffix, filename.dotted_extension())
            }
            CompiledRule::Literal { find, replace } => name.replace(find.as_str(), replace),
            CompiledRule::CaselessLiteral { re, replace } => {
                re.replace_all(name, NoExpand(replace)).into_owned()
            }
            CompiledRule::Regex { re, replacement } => {
                re.replace_all(name, replacement.as_str()).into_owned()
            }
            CompiledRule::Numbering { prefix, suffix, start, digits } => {
                let filename = Filename::parse(name);
                // Saturates at the top of the range; the planner then flags
                // the repeated names as duplicates.
                let value = start.saturating_add(context.index as u64);
                format!(
                    "{}{:0width$}{}{}",
                    prefix,
                    value,
                    suffix,
                    filename.dotted_extension(),
                    width = (*digits).min(MAX_NAME_LEN)
                )
            }
        };
        sanitize(&raw)
    }
}

/// An ordered chain of rules; each rule sees the previous rule's output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub rules: Vec<Rule>,
}

/// Accepts either a single rule object or an array of rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RulesDocument {
    One(Rule),
    Many(Vec<Rule>),
}

impl Pipeline {
    pub fn single(rule: Rule) -> Self {
        Self { rules: vec![rule] }
    }

    pub fn from_json(text: &str) -> Result<Self, RenameError> {
        let doc: RulesDocument = serde_json::from_str(text)
            .map_err(|e| RenameError::Config { message: format!("invalid rules: {}", e) })?;
        Ok(match doc {
            RulesDocument::One(rule) => Self::single(rule),
            RulesDocument::Many(rules) => Self { rules },
        })
    }

    pub fn compile(&self) -> Result<CompiledPipeline, RenameError> {
        let rules = self
            .rules
            .iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledPipeline { rules })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    rules: Vec<CompiledRule>,
}

impl CompiledPipeline {
    pub fn apply(&self, name: &str, context: &Context) -> String {
        let mut current = name.to_string();
        for rule in &self.rules {
            current = rule.execute(&current, context);
        }
        current
    }
}
