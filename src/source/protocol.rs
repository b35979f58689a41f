//! Executable task protocol types
//!
//! Executables communicate via JSON over stdin/stdout. Each must support
//! `--manifest` to declare its commands; the manifest body is a
//! [`TaskFile`](super::TaskFile) in JSON.

use serde::Serialize;

use crate::domain::{BoundArgs, TreePath};

/// Flag asking an executable for its declarations
pub const MANIFEST_FLAG: &str = "--manifest";

/// Flag asking an executable to run one of its commands
pub const INVOKE_FLAG: &str = "--invoke";

/// The message written to an executable's stdin on invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvokeRequest<'a> {
    /// Always `"invoke"`
    pub operation: &'static str,

    /// Dotted path the user dispatched through
    pub command: &'a TreePath,

    pub args: &'a BoundArgs,
}

impl<'a> InvokeRequest<'a> {
    pub fn new(command: &'a TreePath, args: &'a BoundArgs) -> Self {
        Self {
            operation: "invoke",
            command,
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArgValue;

    #[test]
    fn request_serialization() {
        let path = TreePath::parse("deploy.prod").unwrap();
        let mut args = BoundArgs::new();
        args.insert("force", ArgValue::Bool(true));

        let json = serde_json::to_value(InvokeRequest::new(&path, &args)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "operation": "invoke",
                "command": "deploy.prod",
                "args": {"force": true}
            })
        );
    }
}
