//! Builtin handlers for plain JSON and GraphSON 3 results.

use graphstep_model::{ElementKind, Identifier, TypeDecl, TypeGraph, TypeKey};
use serde_json::{Map, Value};

use super::{FragmentDeserializer, Outcome, Prior};
use crate::environment::QueryEnvironment;

pub const JSON: &str = "json";
pub const JSON_CONTAINER: &str = "json:container";
pub const JSON_SCALAR: &str = "json:scalar";
pub const JSON_OBJECT: &str = "json:object";
pub const JSON_ARRAY: &str = "json:array";
pub const JSON_STRING: &str = "json:string";
pub const JSON_NUMBER: &str = "json:number";
pub const JSON_BOOL: &str = "json:bool";
pub const JSON_NULL: &str = "json:null";
/// Any `{"@type": ..., "@value": ...}` wrapper.
pub const GRAPHSON_TYPED: &str = "graphson:typed";

const GRAPHSON_TYPES: &[&str] = &[
    "g:Int32",
    "g:Int64",
    "g:Float",
    "g:Double",
    "g:UUID",
    "g:Date",
    "g:Timestamp",
    "g:T",
    "g:List",
    "g:Set",
    "g:Map",
    "g:Vertex",
    "g:Edge",
    "g:VertexProperty",
    "g:Property",
    "g:Traverser",
    "g:Path",
];

fn type_graph() -> TypeGraph {
    let builder = TypeGraph::builder()
        .declare(TypeDecl::interface(JSON_CONTAINER))
        .declare(TypeDecl::interface(JSON_SCALAR))
        .declare(TypeDecl::abstract_class(JSON))
        .declare(TypeDecl::class(JSON_OBJECT).extends(JSON).implements(JSON_CONTAINER))
        .declare(TypeDecl::class(JSON_ARRAY).extends(JSON).implements(JSON_CONTAINER))
        .declare(TypeDecl::class(JSON_STRING).extends(JSON).implements(JSON_SCALAR))
        .declare(TypeDecl::class(JSON_NUMBER).extends(JSON).implements(JSON_SCALAR))
        .declare(TypeDecl::class(JSON_BOOL).extends(JSON).implements(JSON_SCALAR))
        .declare(TypeDecl::class(JSON_NULL).extends(JSON))
        .declare(TypeDecl::class(GRAPHSON_TYPED).extends(JSON_OBJECT));

    let builder = GRAPHSON_TYPES.iter().fold(builder, |builder, ty| {
        builder.declare(TypeDecl::class(*ty).extends(GRAPHSON_TYPED))
    });

    match builder.build() {
        Ok(types) => types,
        Err(error) => {
            tracing::error!(%error, "builtin GraphSON type graph is inconsistent");
            TypeGraph::default()
        }
    }
}

fn classify(types: &TypeGraph, fragment: &Value) -> TypeKey {
    let name = match fragment {
        Value::Null => JSON_NULL,
        Value::Bool(_) => JSON_BOOL,
        Value::Number(_) => JSON_NUMBER,
        Value::String(_) => JSON_STRING,
        Value::Array(_) => JSON_ARRAY,
        Value::Object(fields) => match (fields.get("@type"), fields.get("@value")) {
            (Some(Value::String(ty)), Some(_)) if types.is_assignable(ty, GRAPHSON_TYPED) => {
                return TypeKey::new(ty)
            }
            (Some(Value::String(_)), Some(_)) => GRAPHSON_TYPED,
            _ => JSON_OBJECT,
        },
    };
    TypeKey::new(name)
}

pub(super) fn deserializer() -> FragmentDeserializer {
    let types = type_graph();
    let classifier_types = types.clone();

    FragmentDeserializer::new(types, JSON, move |fragment| classify(&classifier_types, fragment))
        .override_with(JSON_ARRAY, |fragment, requested, env, _, recurse| match fragment {
            Value::Array(items) => Outcome::Value(Value::Array(
                items
                    .iter()
                    .map(|item| recurse.deserialize(item, requested, env))
                    .collect(),
            )),
            _ => Outcome::PassThrough,
        })
        .override_with(JSON_OBJECT, |fragment, requested, env, _, recurse| match fragment {
            Value::Object(fields) => Outcome::Value(Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), recurse.deserialize(value, requested, env)))
                    .collect(),
            )),
            _ => Outcome::PassThrough,
        })
        .override_with(GRAPHSON_TYPED, |fragment, requested, env, _, recurse| {
            match fragment.get("@value") {
                Some(value) => Outcome::Value(recurse.deserialize(value, requested, env)),
                None => Outcome::PassThrough,
            }
        })
        .override_with("g:Map", map)
        .override_with("g:Vertex", |fragment, requested, env, prior, recurse| {
            element(ElementKind::Vertex, fragment, requested, env, prior, recurse)
        })
        .override_with("g:Edge", |fragment, requested, env, prior, recurse| {
            element(ElementKind::Edge, fragment, requested, env, prior, recurse)
        })
        .override_with("g:VertexProperty", |fragment, requested, env, _, recurse| {
            member(fragment, "value", requested, env, recurse)
        })
        .override_with("g:Property", |fragment, requested, env, _, recurse| {
            member(fragment, "value", requested, env, recurse)
        })
        // Bulk is not expanded; a traverser yields its value once.
        .override_with("g:Traverser", |fragment, requested, env, _, recurse| {
            member(fragment, "value", requested, env, recurse)
        })
        .override_with("g:Path", |fragment, requested, env, _, recurse| {
            member(fragment, "objects", requested, env, recurse)
        })
}

/// `@value.<name>`, deserialized.
fn member(
    fragment: &Value,
    name: &str,
    requested: &TypeKey,
    env: &QueryEnvironment,
    recurse: &FragmentDeserializer,
) -> Outcome {
    match fragment.get("@value").and_then(|body| body.get(name)) {
        Some(value) => Outcome::Value(recurse.deserialize(value, requested, env)),
        None => Outcome::PassThrough,
    }
}

/// `g:Map` carries entries as an alternating key/value list.
fn map(
    fragment: &Value,
    requested: &TypeKey,
    env: &QueryEnvironment,
    _prior: &Prior<'_>,
    recurse: &FragmentDeserializer,
) -> Outcome {
    let Some(Value::Array(entries)) = fragment.get("@value") else {
        return Outcome::PassThrough;
    };

    let mut object = Map::with_capacity(entries.len() / 2);
    for pair in entries.chunks(2) {
        let [key, value] = pair else {
            return Outcome::PassThrough;
        };
        let key = match recurse.deserialize(key, requested, env) {
            Value::String(key) => key,
            other => other.to_string(),
        };
        object.insert(key, recurse.deserialize(value, requested, env));
    }
    Outcome::Value(Value::Object(object))
}

/// Flatten a vertex or edge into `{id, label, ...properties}`, naming fields
/// after the model's properties where the wire identifier is mapped.
fn element(
    kind: ElementKind,
    fragment: &Value,
    requested: &TypeKey,
    env: &QueryEnvironment,
    _prior: &Prior<'_>,
    recurse: &FragmentDeserializer,
) -> Outcome {
    let Some(Value::Object(body)) = fragment.get("@value") else {
        return Outcome::PassThrough;
    };

    let elements = env.model().elements(kind);
    let metadata = body
        .get("label")
        .and_then(Value::as_str)
        .and_then(|label| elements.type_for_label(label))
        .and_then(|ty| elements.metadata(ty.as_str()));
    let field = |identifier: Identifier, wire: &str| -> String {
        metadata
            .and_then(|metadata| {
                metadata
                    .properties()
                    .iter()
                    .find(|(_, mapped)| **mapped == identifier)
                    .map(|(name, _)| name.clone())
            })
            .unwrap_or_else(|| wire.to_string())
    };

    let mut object = Map::new();
    if let Some(id) = body.get("id") {
        object.insert(field(Identifier::Id, "id"), recurse.deserialize(id, requested, env));
    }
    if let Some(label) = body.get("label") {
        object.insert(field(Identifier::Label, "label"), label.clone());
    }
    if let Some(Value::Object(properties)) = body.get("properties") {
        for (key, value) in properties {
            let value = match (kind, value) {
                (ElementKind::Vertex, Value::Array(values)) => {
                    let mut values: Vec<Value> = values
                        .iter()
                        .map(|value| recurse.deserialize(value, requested, env))
                        .collect();
                    if values.len() == 1 {
                        values.remove(0)
                    } else {
                        Value::Array(values)
                    }
                }
                _ => recurse.deserialize(value, requested, env),
            };
            object.insert(field(Identifier::key(key.as_str()), key), value);
        }
    }
    Outcome::Value(Value::Object(object))
}
