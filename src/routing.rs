//! Request-time rule resolution, as the load balancer performs it.
//!
//! Path patterns use ALB wildcards: `*` matches any run of characters and
//! `?` matches exactly one. Matching is case-sensitive and anchored at
//! both ends.

use regex::Regex;

use crate::error::ConfigurationError;
use crate::models::routing::RoutingRule;

pub const MAX_PATTERN_LEN: usize = 128;

/// A compiled path predicate.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    re: Regex,
}

impl PathPattern {
    pub fn parse(field: &str, raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidPathPattern {
            field: field.to_string(),
            pattern: raw.to_string(),
        };
        if raw.is_empty() || raw.len() > MAX_PATTERN_LEN || raw.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }
        let mut expr = String::with_capacity(raw.len() + 8);
        expr.push('^');
        for c in raw.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        let re = Regex::new(&expr).map_err(|_| invalid())?;
        Ok(Self {
            raw: raw.to_string(),
            re,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        self.re.is_match(path)
    }
}

struct CompiledRule<'a> {
    rule: &'a RoutingRule,
    patterns: Vec<PathPattern>,
}

/// Routing rules with their patterns compiled once, kept in the order the
/// load balancer evaluates them: path rules by ascending priority, then the
/// default rules.
pub struct RouteTable<'a> {
    rules: Vec<CompiledRule<'a>>,
}

impl<'a> RouteTable<'a> {
    pub fn compile(rules: &'a [RoutingRule]) -> Result<Self, ConfigurationError> {
        let mut compiled = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let field = format!("rules[{i}].path_patterns");
                let patterns = rule
                    .path_patterns
                    .iter()
                    .map(|p| PathPattern::parse(&field, p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledRule { rule, patterns })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        compiled.sort_by_key(|c| (c.rule.is_default(), c.rule.priority.unwrap_or(u32::MAX)));
        Ok(Self { rules: compiled })
    }

    /// Pick the rule that handles `path` on `listener`: the lowest-priority
    /// predicate rule that matches, otherwise the listener's default rule.
    pub fn resolve(&self, listener: &str, path: &str) -> Option<&'a RoutingRule> {
        self.rules
            .iter()
            .filter(|c| c.rule.listener == listener)
            .find(|c| c.rule.is_default() || c.patterns.iter().any(|p| p.matches(path)))
            .map(|c| c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
