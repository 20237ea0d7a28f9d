//! Script language semantics are out of scope; `.nut` files are validated
//! only at the contract boundary this module defines. The actual
//! interpreter is an external collaborator modeled as a trait so the rest
//! of the crate can depend on "a script evaluated successfully and
//! exposed `define`" without embedding a Squirrel VM.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    Ai,
    Condition,
    Transform,
    CustomAction,
}

/// The `{Name, Type, Path, Source}` table a script's `define` function
/// must populate.
#[derive(Debug, Clone)]
pub struct ScriptDefinition {
    pub name: String,
    pub script_type: ScriptType,
    pub path: String,
    pub source: String,
    pub has_prepare: bool,
    pub has_check: bool,
    pub has_transform: bool,
    pub has_run: bool,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script at {0} failed to evaluate")]
    EvaluationFailed(String),
    #[error("script at {0} does not define `define`")]
    MissingDefine(String),
    #[error("AI script at {0} is missing required `prepare`")]
    MissingPrepare(String),
    #[error("condition/branch script at {0} is missing required `check`")]
    MissingCheck(String),
    #[error("transform script at {0} is missing required `transform`")]
    MissingTransform(String),
    #[error("transform script at {0} must not define `prepare`")]
    UnexpectedPrepare(String),
    #[error("custom-action script at {0} is missing required `run`")]
    MissingRun(String),
}

/// External collaborator: a black-box script interpreter loaded from
/// `.nut` files. Production code talks to a Squirrel VM; tests and this
/// crate's default wiring use [`NullScriptHost`].
pub trait ScriptHost: Send + Sync {
    fn evaluate(&self, path: &str) -> Result<ScriptDefinition, ScriptError>;
}

/// A `ScriptHost` that refuses to evaluate anything, standing in where no
/// real interpreter is wired up.
#[derive(Debug, Default)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn evaluate(&self, path: &str) -> Result<ScriptDefinition, ScriptError> {
        Err(ScriptError::EvaluationFailed(path.to_string()))
    }
}

/// Validates a parsed definition against its script type's required
/// callback set, independent of however `evaluate` produced it.
pub fn validate(definition: &ScriptDefinition) -> Result<(), ScriptError> {
    match definition.script_type {
        ScriptType::Ai if !definition.has_prepare => {
            Err(ScriptError::MissingPrepare(definition.path.clone()))
        }
        ScriptType::Condition if !definition.has_check => {
            Err(ScriptError::MissingCheck(definition.path.clone()))
        }
        ScriptType::Transform if !definition.has_transform => {
            Err(ScriptError::MissingTransform(definition.path.clone()))
        }
        ScriptType::Transform if definition.has_prepare => {
            Err(ScriptError::UnexpectedPrepare(definition.path.clone()))
        }
        ScriptType::CustomAction if !definition.has_run => {
            Err(ScriptError::MissingRun(definition.path.clone()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn definition(script_type: ScriptType) -> ScriptDefinition {
        ScriptDefinition {
            name: "test".to_string(),
            script_type,
            path: "scripts/test.nut".to_string(),
            source: String::new(),
            has_prepare: false,
            has_check: false,
            has_transform: false,
            has_run: false,
        }
    }

    #[test]
    fn ai_script_requires_prepare() {
        assert!(validate(&definition(ScriptType::Ai)).is_err());
        let mut def = definition(ScriptType::Ai);
        def.has_prepare = true;
        assert!(validate(&def).is_ok());
    }

    #[test]
    fn transform_script_rejects_prepare() {
        let mut def = definition(ScriptType::Transform);
        def.has_transform = true;
        def.has_prepare = true;
        assert!(matches!(validate(&def), Err(ScriptError::UnexpectedPrepare(_))));
    }
}
