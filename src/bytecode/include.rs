use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::lang::program::Program;
use crate::options::CompileOptions;
use std::collections::HashMap;
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub type ParseError = Box<dyn Error + Send + Sync>;

/// Finds the source bytes of an include outside the in-memory library.
pub trait IncludeResolver {
    fn resolve(&self, name: &str) -> Option<Vec<u8>>;

    /// Where `resolve` looked, for the missing-include message.
    fn searched(&self, name: &str) -> Vec<String>;
}

/// Turns include source into top-level items. Supplied by the host, which
/// owns the lexer and parser.
pub trait ScriptParser {
    fn parse(&self, name: &str, source: &[u8]) -> Result<Program, ParseError>;
}

/// Looks for `<folder>/<name>.<extension>` in each lookup folder in turn.
#[derive(Debug, Clone)]
pub struct FsIncludeResolver {
    folders: Vec<PathBuf>,
    extension: String,
}

impl FsIncludeResolver {
    pub fn new(folders: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        FsIncludeResolver {
            folders,
            extension: extension.into(),
        }
    }

    pub fn from_options(options: &CompileOptions) -> Self {
        Self::new(options.library_lookup.clone(), options.include_extension.clone())
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        self.folders
            .iter()
            .map(|folder| {
                let mut path = folder.join(name);
                if Path::new(name).extension().is_none() {
                    path.set_extension(&self.extension);
                }
                path
            })
            .collect()
    }
}

impl IncludeResolver for FsIncludeResolver {
    fn resolve(&self, name: &str) -> Option<Vec<u8>> {
        self.candidates(name).into_iter().find_map(|path| match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::trace!(include = name, path = %path.display(), "include resolved from disk");
                Some(bytes)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(include = name, path = %path.display(), error = %err, "cannot read include candidate");
                None
            }
        })
    }

    fn searched(&self, name: &str) -> Vec<String> {
        self.candidates(name)
            .iter()
            .map(|path| path.display().to_string())
            .collect()
    }
}

/// Turns an include name into parsed items: the in-memory library first,
/// then the resolver.
pub struct IncludeLoader {
    library: HashMap<String, Vec<u8>>,
    resolver: Option<Box<dyn IncludeResolver>>,
    parser: Box<dyn ScriptParser>,
}

impl IncludeLoader {
    pub fn new(parser: impl ScriptParser + 'static) -> Self {
        IncludeLoader {
            library: HashMap::new(),
            resolver: None,
            parser: Box::new(parser),
        }
    }

    pub fn with_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Register in-memory source under `name`, exactly as it will be looked up.
    pub fn with_library(mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        self.library.insert(name.into(), source.into());
        self
    }

    pub fn load(&self, name: &str, options: &CompileOptions) -> CompileResult<Program> {
        let key = options.include_key(name);
        let source = match self.library.get(&key) {
            Some(source) => source.clone(),
            None => self
                .resolver
                .as_ref()
                .and_then(|resolver| resolver.resolve(&key))
                .ok_or_else(|| self.missing(name, &key))?,
        };

        self.parser.parse(name, &source).map_err(|e| {
            CompileError::semantic(format!("cannot parse include '{}': {}", name, e))
        })
    }

    fn missing(&self, name: &str, key: &str) -> CompileError {
        let mut searched = vec![format!("library entry '{}'", key)];
        if let Some(resolver) = &self.resolver {
            searched.extend(resolver.searched(key));
        }
        CompileError::missing_include(name, searched)
    }
}

impl std::fmt::Debug for IncludeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.library.keys().collect();
        names.sort();
        f.debug_struct("IncludeLoader")
            .field("library", &names)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
