/// Feature bundles and the rule table that picks extra bundles per database

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ordered, case-insensitively deduplicated list of bundle names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureBundleSet {
    bundles: Vec<String>,
}

impl FeatureBundleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults first, then the additional bundles not already present
    pub fn union<D, A>(defaults: D, additional: A) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let mut set = Self::new();
        for bundle in defaults {
            set.insert(bundle.as_ref());
        }
        for bundle in additional {
            set.insert(bundle.as_ref());
        }
        set
    }

    /// Returns false when the bundle was already present
    pub fn insert(&mut self, bundle: &str) -> bool {
        let bundle = bundle.trim();
        if bundle.is_empty() || self.contains(bundle) {
            return false;
        }
        self.bundles.push(bundle.to_string());
        true
    }

    pub fn contains(&self, bundle: &str) -> bool {
        self.bundles.iter().any(|b| b.eq_ignore_ascii_case(bundle))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// How a rule recognises the databases it applies to
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Case-insensitive prefix
    Prefix(String),
    Pattern(Regex),
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Prefix(prefix) => name
                .get(..prefix.len())
                .map(|head| head.eq_ignore_ascii_case(prefix))
                .unwrap_or(false),
            NameMatcher::Pattern(re) => re.is_match(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BundleRule {
    pub matcher: NameMatcher,
    /// Added to the bundle list when the database is created
    pub create: Vec<String>,
    /// Activated after import, once indexes have been reset
    pub activate: Vec<String>,
}

/// Rule as written in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleRuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub activate: Vec<String>,
}

impl TryFrom<&BundleRuleConfig> for BundleRule {
    type Error = anyhow::Error;

    fn try_from(config: &BundleRuleConfig) -> Result<Self> {
        let matcher = match (&config.prefix, &config.pattern) {
            (Some(prefix), None) => NameMatcher::Prefix(prefix.clone()),
            (None, Some(pattern)) => NameMatcher::Pattern(
                Regex::new(pattern).with_context(|| format!("Invalid bundle rule pattern: {}", pattern))?,
            ),
            (Some(_), Some(_)) => {
                return Err(anyhow!("Bundle rule must set either prefix or pattern, not both"))
            }
            (None, None) => return Err(anyhow!("Bundle rule must set a prefix or a pattern")),
        };

        Ok(Self {
            matcher,
            create: config.create.clone(),
            activate: config.activate.clone(),
        })
    }
}

/// Explicit mapping from database name to extra bundles.
/// Every matching rule contributes; an empty table adds nothing.
#[derive(Debug, Clone, Default)]
pub struct BundleRules {
    rules: Vec<BundleRule>,
}

impl BundleRules {
    pub fn new(rules: Vec<BundleRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(configs: &[BundleRuleConfig]) -> Result<Self> {
        let rules = configs
            .iter()
            .map(BundleRule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn push(&mut self, rule: BundleRule) {
        self.rules.push(rule);
    }

    /// Extra bundles to create `name` with
    pub fn create_bundles(&self, name: &str) -> Vec<String> {
        self.collect(name, |rule| &rule.create)
    }

    /// Bundles to activate on `name` after import
    pub fn activate_bundles(&self, name: &str) -> Vec<String> {
        self.collect(name, |rule| &rule.activate)
    }

    fn collect<F>(&self, name: &str, pick: F) -> Vec<String>
    where
        F: Fn(&BundleRule) -> &Vec<String>,
    {
        let set = FeatureBundleSet::union(
            Vec::<String>::new(),
            self.rules
                .iter()
                .filter(|rule| rule.matcher.matches(name))
                .flat_map(|rule| pick(rule).iter()),
        );
        set.as_slice().to_vec()
    }
}
