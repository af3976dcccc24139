//! Rule tables of the metadata extractor.
//!
//! Every heuristic is expressed as an ordered table of (label, pattern[,
//! replacement]) entries and compiled once into a [`RuleSet`] owned by the
//! extractor.

use regex::Regex;

use crate::error::ConfigurationError;

/// Marks a plugin that carries POD documentation worth rendering.
pub const DOCUMENTATION_MARKER: &str = "=head1";

pub const FAMILY_PATTERN: &str = r"^.*#%#\s*family\s*=\s*(.+)$";
pub const CAPABILITIES_PATTERN: &str = r"^.*#%#\s*capabilities\s*=\s*(.+)$";

/// "NAME - SUMMARY": irrelevant tokens ("Munin Plugin to", a trailing dot) are dropped.
pub const SUMMARY_PATTERN: &str =
    r"(?i)^\w+\s+-\s+(Munin )?((Plugin|Script) )?(to )?(?P<summary>.*?)\.?$";

/// Number of documentation lines searched for the summary.
pub const SUMMARY_SEARCH_LINES: usize = 8;

pub const CATEGORY_PATTERN: &str = r"(?m)^(?P<line>.*[^$.]category[^\w\n]+(?P<category>\w+).*)$";

/// Lines matching any of these never contribute a category.
pub const CATEGORY_NOISE_PATTERNS: &[(&str, &str)] = &[
    (
        "documentation or label",
        r"(?:label|documentation|\bthe\b|filterwarnings)",
    ),
    (
        "ambiguous phrase",
        r"(?:env\.category|/category/|category queries|category\.|force_category)",
    ),
    ("sql expression", r"select.*from.*(?:join|where)"),
    ("comment", r"^\s*(?:#|//|/\*)"),
    ("variable reference", r"category.*[&\$]"),
];

/// Interpreter patterns, matched against the first line in this order.
pub const LANGUAGE_PATTERNS: &[(&str, &str)] = &[
    ("bash", r"\Wbash(\W|$)"),
    ("ksh", r"\Wksh(\W|$)"),
    ("perl", r"\Wperl(\W|$)"),
    ("php", r"\Wphp"),
    ("python2", r"\Wpython2?(\W|$)"),
    ("python3", r"\Wpython3"),
    ("ruby", r"\Wruby"),
    ("sh", r"\Wsh(\W|$)"),
    ("zsh", r"\Wzsh(\W|$)"),
];

/// Cleanup of path-derived keywords: (label, pattern, replacement).
pub const KEYWORD_CLEANUP_PATTERNS: &[(&str, &str, &str)] = &[
    // the core repository groups plugins by operating system
    ("operating system prefix", r"^node\.d\.", ""),
    // platform-independent plugin directory of the core repository
    ("grouping directory", r"^node\.d$", ""),
];

/// Heading words always written in capitals.
pub const CAPITALIZATION_UPPER: &[&str] = &["IP", "TCP", "UDP"];
/// Heading words always written in lower case.
pub const CAPITALIZATION_LOWER: &[&str] = &["a", "the", "in", "for", "to", "and"];

/// http://guide.munin-monitoring.org/en/latest/reference/graph-category.html#well-known-categories
pub const WELL_KNOWN_CATEGORIES: &[&str] = &[
    "1sec",
    "antivirus",
    "appserver",
    "auth",
    "backup",
    "chat",
    "cloud",
    "cms",
    "cpu",
    "db",
    "devel",
    "disk",
    "dns",
    "filetransfer",
    "forum",
    "fs",
    "fw",
    "games",
    "htc",
    "loadbalancer",
    "mail",
    "mailinglist",
    "memory",
    "munin",
    "network",
    "other",
    "printing",
    "processes",
    "radio",
    "san",
    "search",
    "security",
    "sensors",
    "spamfilter",
    "streaming",
    "system",
    "time",
    "tv",
    "virtualization",
    "voip",
    "webserver",
    "wiki",
    "wireless",
];

#[derive(Debug, Clone)]
pub struct LabelledPattern {
    pub label: &'static str,
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub label: &'static str,
    pub pattern: Regex,
    pub replacement: &'static str,
}

/// Compiled form of all rule tables.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub family: Regex,
    pub capabilities: Regex,
    pub summary: Regex,
    pub category: Regex,
    pub category_noise: Vec<LabelledPattern>,
    pub languages: Vec<LabelledPattern>,
    pub keyword_cleanup: Vec<Rewrite>,
}

fn compile(label: &str, pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(pattern)
        .map_err(|e| ConfigurationError::Invalid(format!("rule '{label}' does not compile: {e}")))
}

fn compile_labelled(table: &[(&'static str, &str)]) -> Result<Vec<LabelledPattern>, ConfigurationError> {
    table
        .iter()
        .map(|&(label, pattern)| {
            Ok(LabelledPattern {
                label,
                pattern: compile(label, pattern)?,
            })
        })
        .collect()
}

impl RuleSet {
    pub fn new() -> Result<Self, ConfigurationError> {
        let keyword_cleanup = KEYWORD_CLEANUP_PATTERNS
            .iter()
            .map(|&(label, pattern, replacement)| {
                Ok(Rewrite {
                    label,
                    pattern: compile(label, pattern)?,
                    replacement,
                })
            })
            .collect::<Result<_, ConfigurationError>>()?;

        Ok(Self {
            family: compile("family", FAMILY_PATTERN)?,
            capabilities: compile("capabilities", CAPABILITIES_PATTERN)?,
            summary: compile("summary", SUMMARY_PATTERN)?,
            category: compile("category", CATEGORY_PATTERN)?,
            category_noise: compile_labelled(CATEGORY_NOISE_PATTERNS)?,
            languages: compile_labelled(LANGUAGE_PATTERNS)?,
            keyword_cleanup,
        })
    }

    /// Label of the first noise rule matching `line`.
    pub fn category_noise(&self, line: &str) -> Option<&'static str> {
        self.category_noise
            .iter()
            .find(|rule| rule.pattern.is_match(line))
            .map(|rule| rule.label)
    }
}
