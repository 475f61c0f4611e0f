//! Extension to tree-sitter grammar lookup.
//!
//! Every grammar backend sits behind a cargo feature. A build that leaves one
//! out, or a grammar whose ABI the linked tree-sitter rejects, reports
//! `BackendMissing` for that language instead of failing the run.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tree_sitter::{Language, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Rust,
    C,
    Cpp,
    Java,
}

#[derive(Debug, Clone)]
pub struct GrammarSpec {
    pub grammar: Grammar,
    pub extensions: &'static [&'static str],
}

static GRAMMAR_SPECS: &[GrammarSpec] = &[
    GrammarSpec {
        grammar: Grammar::Python,
        extensions: &["py", "pyi"],
    },
    GrammarSpec {
        grammar: Grammar::JavaScript,
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    GrammarSpec {
        grammar: Grammar::TypeScript,
        extensions: &["ts", "mts", "cts"],
    },
    GrammarSpec {
        grammar: Grammar::Tsx,
        extensions: &["tsx"],
    },
    GrammarSpec {
        grammar: Grammar::Go,
        extensions: &["go"],
    },
    GrammarSpec {
        grammar: Grammar::Rust,
        extensions: &["rs"],
    },
    GrammarSpec {
        grammar: Grammar::C,
        extensions: &["c", "h"],
    },
    GrammarSpec {
        grammar: Grammar::Cpp,
        extensions: &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
    },
    GrammarSpec {
        grammar: Grammar::Java,
        extensions: &["java"],
    },
];

pub fn grammar_specs() -> &'static [GrammarSpec] {
    GRAMMAR_SPECS
}

impl Grammar {
    pub fn name(self) -> &'static str {
        match self {
            Grammar::Python => "python",
            Grammar::JavaScript => "javascript",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
            Grammar::Go => "go",
            Grammar::Rust => "rust",
            Grammar::C => "c",
            Grammar::Cpp => "cpp",
            Grammar::Java => "java",
        }
    }

    /// Case-insensitive; `None` for anything outside the known set.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        GRAMMAR_SPECS
            .iter()
            .find(|spec| spec.extensions.iter().any(|candidate| *candidate == ext))
            .map(|spec| spec.grammar)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn feature(self) -> &'static str {
        match self {
            Grammar::Python => "lang-python",
            Grammar::JavaScript => "lang-javascript",
            Grammar::TypeScript | Grammar::Tsx => "lang-typescript",
            Grammar::Go => "lang-go",
            Grammar::Rust => "lang-rust",
            Grammar::C => "lang-c",
            Grammar::Cpp => "lang-cpp",
            Grammar::Java => "lang-java",
        }
    }

    /// The compiled-in grammar, or why there is none.
    pub fn language(self) -> Result<Language, String> {
        match self {
            #[cfg(feature = "lang-python")]
            Grammar::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-javascript")]
            Grammar::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-typescript")]
            Grammar::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-typescript")]
            Grammar::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Grammar::Go => Ok(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Grammar::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Grammar::C => Ok(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "lang-cpp")]
            Grammar::Cpp => Ok(tree_sitter_cpp::LANGUAGE.into()),
            #[cfg(feature = "lang-java")]
            Grammar::Java => Ok(tree_sitter_java::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            other => Err(format!(
                "built without the `{}` feature",
                other.feature()
            )),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of looking up a parser for one file.
pub enum Resolution<'a> {
    Available {
        grammar: Grammar,
        parser: &'a mut Parser,
    },
    Unsupported,
    BackendMissing {
        grammar: Grammar,
        reason: &'a str,
    },
}

enum Slot {
    Ready(Parser),
    Missing(String),
}

/// Per-run parser cache. Each grammar is probed at most once; a failed probe
/// is logged once and remembered.
#[derive(Default)]
pub struct GrammarRegistry {
    slots: HashMap<Grammar, Slot>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, path: &Path) -> Resolution<'_> {
        match Grammar::from_path(path) {
            Some(grammar) => self.resolve_grammar(grammar),
            None => Resolution::Unsupported,
        }
    }

    pub fn resolve_grammar(&mut self, grammar: Grammar) -> Resolution<'_> {
        let slot = self.slots.entry(grammar).or_insert_with(|| probe(grammar));
        match slot {
            Slot::Ready(parser) => Resolution::Available { grammar, parser },
            Slot::Missing(reason) => Resolution::BackendMissing {
                grammar,
                reason: reason.as_str(),
            },
        }
    }

    /// Register a load outcome ahead of the first lookup, as if the
    /// grammar had been probed.
    #[cfg(test)]
    pub(crate) fn preload(&mut self, grammar: Grammar, language: Result<Language, String>) {
        self.slots.insert(grammar, load(grammar, language));
    }

    /// Grammars probed so far whose backend could not be loaded.
    pub fn missing(&self) -> Vec<Grammar> {
        let mut out: Vec<Grammar> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Missing(_)))
            .map(|(grammar, _)| *grammar)
            .collect();
        out.sort_by_key(|grammar| grammar.name());
        out
    }
}

fn probe(grammar: Grammar) -> Slot {
    load(grammar, grammar.language())
}

fn load(grammar: Grammar, language: Result<Language, String>) -> Slot {
    let language = match language {
        Ok(language) => language,
        Err(reason) => {
            tracing::warn!(language = %grammar, %reason, "grammar unavailable, skipping its files");
            return Slot::Missing(reason);
        }
    };
    let mut parser = Parser::new();
    match parser.set_language(&language) {
        Ok(()) => Slot::Ready(parser),
        Err(err) => {
            let reason = err.to_string();
            tracing::warn!(language = %grammar, %reason, "grammar unavailable, skipping its files");
            Slot::Missing(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_grammars() {
        assert_eq!(Grammar::from_extension("py"), Some(Grammar::Python));
        assert_eq!(Grammar::from_extension("PY"), Some(Grammar::Python));
        assert_eq!(Grammar::from_extension("tsx"), Some(Grammar::Tsx));
        assert_eq!(Grammar::from_extension("hpp"), Some(Grammar::Cpp));
        assert_eq!(Grammar::from_extension("md"), None);
        assert_eq!(Grammar::from_path(Path::new("Makefile")), None);
        assert_eq!(
            Grammar::from_path(Path::new("src/Main.java")),
            Some(Grammar::Java)
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let mut registry = GrammarRegistry::new();
        assert!(matches!(
            registry.resolve(Path::new("notes.txt")),
            Resolution::Unsupported
        ));
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn default_features_load_every_grammar() {
        let mut registry = GrammarRegistry::new();
        for spec in grammar_specs() {
            match registry.resolve_grammar(spec.grammar) {
                Resolution::Available { grammar, .. } => assert_eq!(grammar, spec.grammar),
                Resolution::BackendMissing { reason, .. } => {
                    panic!("{} unavailable: {reason}", spec.grammar)
                }
                Resolution::Unsupported => unreachable!(),
            }
        }
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn failed_load_is_remembered_and_reported() {
        let mut registry = GrammarRegistry::new();
        registry.preload(Grammar::Go, Err("built without the `lang-go` feature".into()));
        for path in ["cmd/main.go", "pkg/util.go"] {
            match registry.resolve(Path::new(path)) {
                Resolution::BackendMissing { grammar, reason } => {
                    assert_eq!(grammar, Grammar::Go);
                    assert!(reason.contains("lang-go"));
                }
                _ => panic!("expected {path} to report a missing backend"),
            }
        }
        assert!(matches!(
            registry.resolve(Path::new("app.py")),
            Resolution::Available { .. }
        ));
        assert_eq!(registry.missing(), vec![Grammar::Go]);
    }

    #[test]
    fn parsers_are_cached_per_grammar() {
        let mut registry = GrammarRegistry::new();
        let first = match registry.resolve(Path::new("a.py")) {
            Resolution::Available { parser, .. } => parser as *const Parser,
            _ => panic!("python grammar missing"),
        };
        let second = match registry.resolve(Path::new("pkg/b.pyi")) {
            Resolution::Available { parser, .. } => parser as *const Parser,
            _ => panic!("python grammar missing"),
        };
        assert_eq!(first, second);
    }
}
