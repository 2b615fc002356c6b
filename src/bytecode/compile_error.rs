use crate::lang::data_type::DataType;
use crate::lang::identifier::Identifier;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Number of in-scope names listed when an identifier is not found.
const SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The script is wrong: bad types, unknown names, malformed declarations.
    #[error("compile error: {message}{}", hint_suffix(.hint))]
    Semantic {
        message: String,
        hint: Option<String>,
    },

    /// Neither `main` nor `StartingConditional` is defined. Expected for
    /// include-only files.
    #[error("compile error: no entry point: {message}")]
    EntryPoint { message: String },

    /// An `#include` could not be found anywhere.
    #[error("compile error: cannot find include '{path}'{}", searched_suffix(.searched))]
    MissingInclude { path: String, searched: Vec<String> },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!("\n  hint: {}", h),
        None => String::new(),
    }
}

fn searched_suffix(searched: &[String]) -> String {
    if searched.is_empty() {
        String::new()
    } else {
        format!("\n  searched: {}", searched.join(", "))
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CompileError {
    pub fn semantic(message: impl Into<String>) -> Self {
        CompileError::Semantic {
            message: message.into(),
            hint: None,
        }
    }

    pub fn semantic_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CompileError::Semantic {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an error for a name that resolves nowhere, listing a few
    /// names that are in scope.
    pub fn undefined_identifier(name: &str, in_scope: &[Identifier]) -> Self {
        let message = format!("undefined identifier '{}'", name);
        if in_scope.is_empty() {
            return CompileError::semantic(message);
        }
        let shown = &in_scope[..in_scope.len().min(SUGGESTION_LIMIT)];
        let mut hint = format!("in scope: {}", join(shown));
        if in_scope.len() > shown.len() {
            hint.push_str(&format!(" (and {} more)", in_scope.len() - shown.len()));
        }
        CompileError::semantic_with_hint(message, hint)
    }

    pub fn undefined_function(name: &str) -> Self {
        CompileError::semantic_with_hint(
            format!("undefined function '{}'", name),
            "functions must be declared or defined before they are called",
        )
    }

    pub fn type_mismatch(context: impl std::fmt::Display, expected: &DataType, actual: &DataType) -> Self {
        CompileError::semantic(format!(
            "type mismatch in {}: expected {}, found {}",
            context, expected, actual
        ))
    }

    pub fn argument_mismatch(
        function: &Identifier,
        param: &Identifier,
        expected: &DataType,
        actual: &DataType,
    ) -> Self {
        CompileError::semantic(format!(
            "argument '{}' of '{}' expects {}, found {}",
            param, function, expected, actual
        ))
    }

    pub fn missing_arguments(function: &Identifier, missing: &[Identifier]) -> Self {
        CompileError::semantic(format!(
            "call to '{}' is missing required arguments: {}",
            function,
            join(missing)
        ))
    }

    pub fn too_many_arguments(function: &Identifier, expected: usize, found: usize) -> Self {
        CompileError::semantic(format!(
            "'{}' takes {} arguments but {} were supplied",
            function, expected, found
        ))
    }

    pub fn redefinition(name: &Identifier) -> Self {
        CompileError::semantic(format!("function '{}' is already defined", name))
    }

    pub fn duplicate_prototype(name: &Identifier) -> Self {
        CompileError::semantic_with_hint(
            format!("function '{}' is already declared", name),
            "a function may have at most one prototype, placed before its definition",
        )
    }

    /// A definition that disagrees with its prototype. Every difference is
    /// listed, one per line.
    pub fn prototype_mismatch(name: &Identifier, mismatches: &[String]) -> Self {
        CompileError::semantic(format!(
            "definition of '{}' does not match its prototype:\n  - {}",
            name,
            mismatches.join("\n  - ")
        ))
    }

    pub fn prototype_never_defined(names: &[Identifier]) -> Self {
        CompileError::semantic(format!(
            "functions declared and called but never defined: {}",
            join(names)
        ))
    }

    pub fn default_order(function: &Identifier, param: &Identifier) -> Self {
        CompileError::semantic_with_hint(
            format!(
                "parameter '{}' of '{}' has no default but follows a parameter that does",
                param, function
            ),
            "parameters with default values must come last",
        )
    }

    pub fn non_constant_default(function: &Identifier, param: &Identifier) -> Self {
        CompileError::semantic_with_hint(
            format!(
                "default value of parameter '{}' of '{}' is not a constant",
                param, function
            ),
            "defaults may only use literals and engine constants",
        )
    }

    pub fn empty_struct(name: &Identifier) -> Self {
        CompileError::semantic(format!("struct '{}' has no members", name))
    }

    pub fn duplicate_struct(name: &Identifier) -> Self {
        CompileError::semantic(format!("struct '{}' is already defined", name))
    }

    pub fn unknown_struct(name: &Identifier) -> Self {
        CompileError::semantic(format!("unknown struct '{}'", name))
    }

    pub fn unknown_member(owner: &str, member: &Identifier, available: &[Identifier]) -> Self {
        CompileError::semantic_with_hint(
            format!("'{}' has no member '{}'", owner, member),
            format!("available members: {}", join(available)),
        )
    }

    pub fn not_composite(access: impl std::fmt::Display, ty: &DataType) -> Self {
        CompileError::semantic_with_hint(
            format!("'{}' accesses a member of non-composite type {}", access, ty),
            "only struct and vector values have members",
        )
    }

    pub fn unstorable_variable(name: &Identifier, ty: &DataType) -> Self {
        CompileError::semantic(format!("'{}' cannot have type {}", name, ty))
    }

    pub fn duplicate_global(name: &Identifier) -> Self {
        CompileError::semantic(format!("global '{}' is already declared", name))
    }

    pub fn redeclaration(name: &Identifier) -> Self {
        CompileError::semantic(format!("'{}' is already declared in this block", name))
    }

    pub fn const_assignment(target: impl std::fmt::Display) -> Self {
        CompileError::semantic(format!("cannot assign to const variable '{}'", target))
    }

    pub fn no_operator(
        symbol: &str,
        operands: &[&DataType],
        available: &[String],
    ) -> Self {
        let message = format!("operator '{}' is not defined for {}", symbol, join(operands));
        if available.is_empty() {
            CompileError::semantic(message)
        } else {
            CompileError::semantic_with_hint(message, format!("supported: {}", available.join(", ")))
        }
    }

    pub fn outside_loop(keyword: &str) -> Self {
        CompileError::semantic(format!("'{}' used outside of a loop or switch", keyword))
    }

    pub fn declaration_in_switch_arm(name: &Identifier) -> Self {
        CompileError::semantic_with_hint(
            format!("declaration of '{}' directly inside a switch arm", name),
            "wrap the arm's statements in braces to declare variables",
        )
    }

    pub fn entry_point() -> Self {
        CompileError::EntryPoint {
            message: "no 'main' or 'StartingConditional' function is defined".to_string(),
        }
    }

    pub fn missing_include(path: &str, searched: Vec<String>) -> Self {
        CompileError::MissingInclude {
            path: path.to_string(),
            searched,
        }
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }

    /// True for a file that compiled but has nothing to run.
    pub fn is_entry_point(&self) -> bool {
        matches!(self, CompileError::EntryPoint { .. })
    }

    /// True when the compiler itself is at fault.
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }
}
