//! Source/sink/sanitizer configuration the taint engine is parameterized
//! over. A rule builds one of these to describe its own vulnerability
//! family (SQL injection, command injection, ...); the engine itself knows
//! nothing about any specific sink.

/// Any value whose static type matches `type_name` (e.g. `net/http.Request`)
/// is tainted at every point it's read, independent of how it was built.
#[derive(Debug, Clone)]
pub struct TypeSource {
    pub type_name: String,
}

/// The return value of a qualified function is tainted.
#[derive(Debug, Clone)]
pub struct FunctionSource {
    pub qualified_name: String,
}

/// A qualified `package.method` call whose arguments must not carry taint.
/// `check_args` restricts the check to specific argument positions;
/// `None` means every argument is checked.
#[derive(Debug, Clone)]
pub struct Sink {
    pub qualified_name: String,
    pub check_args: Option<Vec<usize>>,
}

/// A qualified function whose return value is taint-free regardless of
/// its arguments.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    pub qualified_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct TaintConfig {
    pub type_sources: Vec<TypeSource>,
    pub function_sources: Vec<FunctionSource>,
    pub sinks: Vec<Sink>,
    pub sanitizers: Vec<Sanitizer>,
}

impl TaintConfig {
    pub fn is_source_function(&self, qualified_name: &str) -> bool {
        self.function_sources.iter().any(|s| s.qualified_name == qualified_name)
    }

    pub fn is_sanitizer(&self, qualified_name: &str) -> bool {
        self.sanitizers.iter().any(|s| s.qualified_name == qualified_name)
    }

    pub fn matching_sink(&self, qualified_name: &str) -> Option<&Sink> {
        self.sinks.iter().find(|s| s.qualified_name == qualified_name)
    }

    pub fn is_source_type(&self, type_name: &str) -> bool {
        self.type_sources.iter().any(|s| s.type_name == type_name)
    }
}
