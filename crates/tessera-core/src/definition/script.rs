//! Script process definitions.
//!
//! A script definition is a Rhai program built from nested calls, one per
//! expression, as produced by
//! [`to_script_text`](super::render::to_script_text):
//!
//! ```text
//! define(#{ name: "order" }, [
//!   participant("alice")
//! ])
//! ```
//!
//! Expression names are open-ended, so builder functions are registered on
//! demand: evaluating a call to an unknown function registers a builder for
//! that name and the script is evaluated again. `node(name, attributes,
//! children)` builds a node for names that are not valid identifiers.
//!
//! Scripts run on a raw engine (no standard packages) with loops, function
//! definitions, modules and `eval` disabled, and with a bounded operation
//! count.

use std::collections::HashSet;

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map};
use serde_json::Value;
use tessera_types::tree::Node;

use super::DefinitionError;

const FORMAT: &str = "script";

/// Generic node builder, always available to scripts.
const NODE_FN: &str = "node";

/// Bound on distinct expression names in one script.
const MAX_BUILDERS: usize = 256;

/// Size caps on values a script may build.
const MAX_STRING_SIZE: usize = 1 << 20;
const MAX_ARRAY_SIZE: usize = 10_000;
const MAX_MAP_SIZE: usize = 10_000;

const DISABLED_SYMBOLS: &[&str] = &[
    "eval", "import", "export", "fn", "private", "while", "loop", "for", "do",
];

/// Words that cannot be used as a function name in a script.
const RESERVED_WORDS: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "switch", "do", "while", "until", "loop",
    "for", "in", "continue", "break", "return", "throw", "try", "catch", "import", "export",
    "as", "global", "Fn", "call", "curry", "this", "type_of", "print", "debug", "eval",
    "is_def_var", "is_def_fn", "is_shared", "fn", "private", "var", "static", "is", "goto",
    "exit", "match", "case", "public", "protected", "new", "use", "with", "module", "package",
    "super", "thread", "spawn", "go", "sync", "async", "await", "yield", "default", "void",
    "null", "nil", "shared",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    word == NODE_FN || RESERVED_WORDS.contains(&word)
}

/// Safety gate run before any script definition is evaluated.
pub trait TreeChecker: Send + Sync {
    /// Reject `script` with [`DefinitionError::UnsafeScript`] unless it may
    /// be evaluated.
    fn check(&self, script: &str) -> Result<(), DefinitionError>;
}

/// Default checker: the script must compile on the restricted engine, which
/// rejects loops, function definitions, modules and `eval` at parse time.
#[derive(Debug, Clone)]
pub struct ScriptTreeChecker {
    max_operations: u64,
}

impl ScriptTreeChecker {
    pub fn new(max_operations: u64) -> Self {
        Self { max_operations }
    }
}

impl TreeChecker for ScriptTreeChecker {
    fn check(&self, script: &str) -> Result<(), DefinitionError> {
        restricted_engine(self.max_operations)
            .compile(script)
            .map(|_| ())
            .map_err(|err| DefinitionError::UnsafeScript(err.to_string()))
    }
}

fn restricted_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new_raw();
    for symbol in DISABLED_SYMBOLS {
        engine.disable_symbol(*symbol);
    }
    engine.set_max_operations(max_operations);
    engine.set_max_expr_depths(128, 32);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_ARRAY_SIZE);
    engine.set_max_map_size(MAX_MAP_SIZE);
    engine
}

/// Evaluates a checked script into an expression tree.
#[derive(Debug, Clone)]
pub(crate) struct ScriptEvaluator {
    max_operations: u64,
}

impl ScriptEvaluator {
    pub(crate) fn new(max_operations: u64) -> Self {
        Self { max_operations }
    }

    pub(crate) fn evaluate(&self, script: &str) -> Result<Node, DefinitionError> {
        let mut engine = restricted_engine(self.max_operations);
        register_node_fn(&mut engine);
        let ast = engine
            .compile(script)
            .map_err(|err| DefinitionError::parse(FORMAT, err))?;

        let mut builders: HashSet<String> = HashSet::from([NODE_FN.to_string()]);
        loop {
            let err = match engine.eval_ast::<Dynamic>(&ast) {
                Ok(result) => return Ok(Node::try_from(dynamic_to_json(&result))?),
                Err(err) => err,
            };
            let EvalAltResult::ErrorFunctionNotFound(signature, _) = err.as_ref() else {
                return Err(DefinitionError::parse(FORMAT, err));
            };
            let name = function_name(signature);
            if builders.len() > MAX_BUILDERS || !builders.insert(name.to_string()) {
                return Err(DefinitionError::parse(FORMAT, err));
            }
            tracing::trace!(name, "registering expression builder");
            register_builder(&mut engine, name);
        }
    }
}

fn function_name(signature: &str) -> &str {
    signature
        .split(|c: char| c == ' ' || c == '(')
        .next()
        .unwrap_or(signature)
}

/// Expression name for a builder function: a trailing `_` added to dodge a
/// reserved word is dropped.
fn expression_name(fn_name: &str) -> String {
    match fn_name.strip_suffix('_') {
        Some(stem) if is_reserved(stem) => stem.to_string(),
        _ => fn_name.to_string(),
    }
}

fn triple(name: &str, attributes: Map, children: Array) -> Array {
    vec![
        Dynamic::from(name.to_string()),
        Dynamic::from_map(attributes),
        Dynamic::from_array(children),
    ]
}

fn register_node_fn(engine: &mut Engine) {
    engine
        .register_fn(NODE_FN, |name: ImmutableString| {
            triple(&name, Map::new(), Array::new())
        })
        .register_fn(NODE_FN, |name: ImmutableString, attributes: Map| {
            triple(&name, attributes, Array::new())
        })
        .register_fn(NODE_FN, |name: ImmutableString, children: Array| {
            triple(&name, Map::new(), children)
        })
        .register_fn(
            NODE_FN,
            |name: ImmutableString, attributes: Map, children: Array| {
                triple(&name, attributes, children)
            },
        );
}

fn register_builder(engine: &mut Engine, fn_name: &str) {
    let name = expression_name(fn_name);

    let n = name.clone();
    engine.register_fn(fn_name, move || triple(&n, Map::new(), Array::new()));
    let n = name.clone();
    engine.register_fn(fn_name, move |text: ImmutableString| {
        triple(&n, Map::new(), vec![Dynamic::from(text)])
    });
    let n = name.clone();
    engine.register_fn(fn_name, move |attributes: Map| {
        triple(&n, attributes, Array::new())
    });
    let n = name.clone();
    engine.register_fn(fn_name, move |children: Array| {
        triple(&n, Map::new(), children)
    });
    let n = name.clone();
    engine.register_fn(fn_name, move |attributes: Map, children: Array| {
        triple(&n, attributes, children)
    });
    let n = name;
    engine.register_fn(fn_name, move |text: ImmutableString, attributes: Map| {
        triple(&n, attributes, vec![Dynamic::from(text)])
    });
}

fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if let Ok(s) = value.clone().into_string() {
        Value::String(s)
    } else if value.is_array() {
        let items = value.clone().into_array().unwrap_or_default();
        Value::Array(items.iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_string(), dynamic_to_json(&v)))
                .collect(),
        )
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluate(script: &str) -> Result<Node, DefinitionError> {
        ScriptEvaluator::new(100_000).evaluate(script)
    }

    #[test]
    fn test_evaluate_nested_calls() {
        let tree = evaluate(
            r#"
            define(#{ name: "order" }, [
              sequence([
                participant("alice"),
                participant("bob", #{ timeout: "2d" })
              ])
            ])
            "#,
        )
        .unwrap();
        assert_eq!(
            tree.to_value(),
            json!(["define", {"name": "order"}, [
                ["sequence", {}, [
                    ["participant", {}, ["alice"]],
                    ["participant", {"timeout": "2d"}, ["bob"]]
                ]]
            ]])
        );
    }

    #[test]
    fn test_evaluate_generic_node_and_escaped_names() {
        let tree = evaluate(r#"node("process-definition", [if_(#{ test: true }), cancel_process()])"#)
            .unwrap();
        assert_eq!(
            tree.to_value(),
            json!(["process-definition", {}, [
                ["if", {"test": true}, []],
                ["cancel_process", {}, []]
            ]])
        );
    }

    #[test]
    fn test_evaluate_allows_let_bindings() {
        let tree = evaluate("let who = \"alice\"; define([participant(who)])").unwrap();
        assert_eq!(
            tree.to_value(),
            json!(["define", {}, [["participant", {}, ["alice"]]]])
        );
    }

    #[test]
    fn test_non_tree_result_is_malformed() {
        let err = evaluate("1 + 2").unwrap_err();
        assert!(matches!(err, DefinitionError::MalformedTree(_)));
    }

    #[test]
    fn test_unsupported_call_shape_is_parse_error() {
        let err = evaluate("participant(1, 2, 3, 4)").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { format: "script", .. }));
    }

    #[test]
    fn test_oversized_values_are_parse_errors() {
        let checker = ScriptTreeChecker::new(100_000);

        let strings = format!(
            "let s = \"xxxxxxxx\"; {} participant(s)",
            "s += s; ".repeat(24)
        );
        checker.check(&strings).unwrap();
        let err = evaluate(&strings).unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { format: "script", .. }));

        let arrays = format!("let a = [1, 2]; {} sequence(a)", "a += a; ".repeat(24));
        checker.check(&arrays).unwrap();
        let err = evaluate(&arrays).unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { format: "script", .. }));
    }

    #[test]
    fn test_checker_rejects_disabled_constructs() {
        let checker = ScriptTreeChecker::new(1_000);
        for script in [
            "while true { }",
            "loop { }",
            "for x in [1] { }",
            "fn f() { 1 } f()",
            "eval(\"1\")",
            "import \"x\" as y;",
        ] {
            let err = checker.check(script).unwrap_err();
            assert!(matches!(err, DefinitionError::UnsafeScript(_)), "{script}");
        }
        assert!(checker.check("define([participant(\"alice\")])").is_ok());
    }

    #[test]
    fn test_round_trips_rendered_script() {
        let original = Node::try_from(json!(["define", {"name": "x", "revision": "0"}, [
            ["sequence", {}, [["echo", {}, ["a \"quoted\"\nline"]], ["wait", {"for": 3}, []]]]
        ]]))
        .unwrap();
        let script = super::super::render::to_script_text(&original, 0);
        assert_eq!(evaluate(&script).unwrap(), original);
    }

    #[test]
    fn test_function_name_from_signature() {
        assert_eq!(function_name("participant (string)"), "participant");
        assert_eq!(function_name("noop ()"), "noop");
        assert_eq!(function_name("bare"), "bare");
    }
}
