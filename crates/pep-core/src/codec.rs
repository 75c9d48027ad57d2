//! Domain mapping — XACML model ⇄ typed Hessian maps.
//!
//! The wire contract is the class-name strings, the lowerCamelCase field
//! keys, and the field emission order below. Changing any of them breaks
//! interoperability with every deployed daemon. Decode is order-independent
//! and skips unknown keys (logged at warn) so newer daemons keep working.

use crate::hessian::{self, DecodeError, EncodeError, List, Map, Value};
use crate::model::{
    Action, Attribute, AttributeAssignment, Decision, Environment, FulfillOn, Obligation, Request,
    Resource, Response, ResponseResult, Status, StatusCode, Subject,
};

// ── Wire identifiers ──────────────────────────────────────────────────────────

pub const CLASS_REQUEST: &str = "org.glite.authz.pep.model.Request";
pub const CLASS_SUBJECT: &str = "org.glite.authz.pep.model.Subject";
pub const CLASS_RESOURCE: &str = "org.glite.authz.pep.model.Resource";
pub const CLASS_ACTION: &str = "org.glite.authz.pep.model.Action";
pub const CLASS_ENVIRONMENT: &str = "org.glite.authz.pep.model.Environment";
pub const CLASS_ATTRIBUTE: &str = "org.glite.authz.pep.model.Attribute";
pub const CLASS_RESPONSE: &str = "org.glite.authz.pep.model.Response";
pub const CLASS_RESULT: &str = "org.glite.authz.pep.model.Result";
pub const CLASS_STATUS: &str = "org.glite.authz.pep.model.Status";
pub const CLASS_STATUS_CODE: &str = "org.glite.authz.pep.model.StatusCode";
pub const CLASS_OBLIGATION: &str = "org.glite.authz.pep.model.Obligation";
pub const CLASS_ATTRIBUTE_ASSIGNMENT: &str = "org.glite.authz.pep.model.AttributeAssignment";

const KEY_SUBJECTS: &str = "subjects";
const KEY_RESOURCES: &str = "resources";
const KEY_ACTION: &str = "action";
const KEY_ENVIRONMENT: &str = "environment";
const KEY_CATEGORY: &str = "category";
const KEY_ATTRIBUTES: &str = "attributes";
const KEY_CONTENT: &str = "content";
const KEY_ID: &str = "id";
const KEY_DATA_TYPE: &str = "dataType";
const KEY_ISSUER: &str = "issuer";
const KEY_VALUES: &str = "values";
const KEY_REQUEST: &str = "request";
const KEY_RESULTS: &str = "results";
const KEY_DECISION: &str = "decision";
const KEY_RESOURCE_ID: &str = "resourceId";
const KEY_STATUS: &str = "status";
const KEY_OBLIGATIONS: &str = "obligations";
const KEY_MESSAGE: &str = "message";
const KEY_CODE: &str = "code";
const KEY_SUBCODE: &str = "subcode";
const KEY_FULFILL_ON: &str = "fulfillOn";
const KEY_ASSIGNMENTS: &str = "assignments";

/// Longest accepted StatusCode subcode chain.
pub const MAX_STATUS_DEPTH: usize = 32;

// ── Façade ────────────────────────────────────────────────────────────────────

/// Marshal an authorization query into the daemon's wire bytes.
pub fn marshal_request(request: &Request) -> Result<Vec<u8>, EncodeError> {
    hessian::serialize(&request_value(request))
}

/// Unmarshal the daemon's answer. Fails without returning a partial graph.
pub fn unmarshal_response(bytes: &[u8]) -> Result<Response, DecodeError> {
    let root = hessian::deserialize(bytes)?;
    response_from(&root, "Response")
}

/// Reverse direction of [`marshal_request`]; a Response may echo the
/// Request, and a test daemon needs to read queries.
pub fn unmarshal_request(bytes: &[u8]) -> Result<Request, DecodeError> {
    let root = hessian::deserialize(bytes)?;
    request_from(&root, "Request")
}

/// Reverse direction of [`unmarshal_response`].
pub fn marshal_response(response: &Response) -> Result<Vec<u8>, EncodeError> {
    hessian::serialize(&response_value(response))
}

// ── Encode ────────────────────────────────────────────────────────────────────
//
// Field order is fixed per type. Optional fields are emitted as Null,
// list fields as untyped, unsized lists even when empty.

fn opt_string(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn string_list(values: &[String]) -> Value {
    Value::List(List::from(
        values.iter().map(|v| Value::String(v.clone())).collect::<Vec<_>>(),
    ))
}

fn value_list(values: Vec<Value>) -> Value {
    Value::List(List::from(values))
}

fn request_value(request: &Request) -> Value {
    let mut map = Map::typed(CLASS_REQUEST);
    map.insert(KEY_SUBJECTS, value_list(request.subjects.iter().map(subject_value).collect()));
    map.insert(KEY_RESOURCES, value_list(request.resources.iter().map(resource_value).collect()));
    map.insert(KEY_ACTION, request.action.as_ref().map_or(Value::Null, action_value));
    map.insert(
        KEY_ENVIRONMENT,
        request.environment.as_ref().map_or(Value::Null, environment_value),
    );
    Value::Map(map)
}

fn subject_value(subject: &Subject) -> Value {
    let mut map = Map::typed(CLASS_SUBJECT);
    map.insert(KEY_CATEGORY, opt_string(&subject.category));
    map.insert(KEY_ATTRIBUTES, value_list(subject.attributes.iter().map(attribute_value).collect()));
    Value::Map(map)
}

fn resource_value(resource: &Resource) -> Value {
    let mut map = Map::typed(CLASS_RESOURCE);
    map.insert(KEY_CONTENT, opt_string(&resource.content));
    map.insert(KEY_ATTRIBUTES, value_list(resource.attributes.iter().map(attribute_value).collect()));
    Value::Map(map)
}

fn action_value(action: &Action) -> Value {
    let mut map = Map::typed(CLASS_ACTION);
    map.insert(KEY_ATTRIBUTES, value_list(action.attributes.iter().map(attribute_value).collect()));
    Value::Map(map)
}

fn environment_value(environment: &Environment) -> Value {
    let mut map = Map::typed(CLASS_ENVIRONMENT);
    map.insert(
        KEY_ATTRIBUTES,
        value_list(environment.attributes.iter().map(attribute_value).collect()),
    );
    Value::Map(map)
}

fn attribute_value(attribute: &Attribute) -> Value {
    let mut map = Map::typed(CLASS_ATTRIBUTE);
    map.insert(KEY_ID, Value::String(attribute.id.clone()));
    map.insert(KEY_DATA_TYPE, opt_string(&attribute.data_type));
    map.insert(KEY_ISSUER, opt_string(&attribute.issuer));
    map.insert(KEY_VALUES, string_list(&attribute.values));
    Value::Map(map)
}

fn response_value(response: &Response) -> Value {
    let mut map = Map::typed(CLASS_RESPONSE);
    map.insert(KEY_REQUEST, response.request.as_ref().map_or(Value::Null, request_value));
    map.insert(KEY_RESULTS, value_list(response.results.iter().map(result_value).collect()));
    Value::Map(map)
}

fn result_value(result: &ResponseResult) -> Value {
    let mut map = Map::typed(CLASS_RESULT);
    map.insert(KEY_DECISION, Value::Int(result.decision.as_wire()));
    map.insert(KEY_RESOURCE_ID, opt_string(&result.resource_id));
    map.insert(KEY_STATUS, result.status.as_ref().map_or(Value::Null, status_value));
    map.insert(KEY_OBLIGATIONS, value_list(result.obligations.iter().map(obligation_value).collect()));
    Value::Map(map)
}

fn status_value(status: &Status) -> Value {
    let mut map = Map::typed(CLASS_STATUS);
    map.insert(KEY_MESSAGE, Value::String(status.message.clone()));
    map.insert(KEY_CODE, status.code.as_ref().map_or(Value::Null, status_code_value));
    Value::Map(map)
}

fn status_code_value(code: &StatusCode) -> Value {
    let mut map = Map::typed(CLASS_STATUS_CODE);
    map.insert(KEY_CODE, Value::String(code.code.clone()));
    map.insert(
        KEY_SUBCODE,
        code.subcode.as_deref().map_or(Value::Null, status_code_value),
    );
    Value::Map(map)
}

fn obligation_value(obligation: &Obligation) -> Value {
    let mut map = Map::typed(CLASS_OBLIGATION);
    map.insert(KEY_ID, Value::String(obligation.id.clone()));
    map.insert(KEY_FULFILL_ON, Value::Int(obligation.fulfill_on.as_wire()));
    map.insert(
        KEY_ASSIGNMENTS,
        value_list(obligation.assignments.iter().map(assignment_value).collect()),
    );
    Value::Map(map)
}

fn assignment_value(assignment: &AttributeAssignment) -> Value {
    let mut map = Map::typed(CLASS_ATTRIBUTE_ASSIGNMENT);
    map.insert(KEY_ID, Value::String(assignment.id.clone()));
    map.insert(KEY_VALUES, string_list(&assignment.values));
    Value::Map(map)
}

// ── Decode ────────────────────────────────────────────────────────────────────

/// A typed slot must hold a map carrying the expected class name.
fn expect_map<'a>(value: &'a Value, class: &'static str, context: &str) -> Result<&'a Map, DecodeError> {
    let map = match value {
        Value::Map(map) => map,
        other => {
            return Err(DecodeError::ShapeMismatch {
                context: context.to_string(),
                expected: class,
                found: other.kind().to_string(),
            })
        }
    };
    match map.type_name.as_deref() {
        Some(name) if name == class => Ok(map),
        Some(other) => Err(DecodeError::ShapeMismatch {
            context: context.to_string(),
            expected: class,
            found: other.to_string(),
        }),
        None => Err(DecodeError::ShapeMismatch {
            context: context.to_string(),
            expected: class,
            found: "untyped map".to_string(),
        }),
    }
}

fn expect_key<'a>(key: &'a Value, context: &str) -> Result<&'a str, DecodeError> {
    match key {
        Value::String(s) => Ok(s),
        other => Err(DecodeError::ShapeMismatch {
            context: format!("{context} map key"),
            expected: "string",
            found: other.kind().to_string(),
        }),
    }
}

/// Null and absent both mean "no value" for optional string fields.
fn opt_string_from(value: &Value, context: &str, key: &str) -> Result<Option<String>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(DecodeError::ShapeMismatch {
            context: format!("{context}.{key}"),
            expected: "string or null",
            found: other.kind().to_string(),
        }),
    }
}

fn strings_from(value: &Value, context: &str, key: &str) -> Result<Vec<String>, DecodeError> {
    let list = expect_list(value, context, key)?;
    let mut out = Vec::with_capacity(list.items.len());
    for (i, item) in list.items.iter().enumerate() {
        match item {
            Value::String(s) => out.push(s.clone()),
            other => {
                return Err(DecodeError::ShapeMismatch {
                    context: format!("{context}.{key}[{i}]"),
                    expected: "string",
                    found: other.kind().to_string(),
                })
            }
        }
    }
    Ok(out)
}

fn expect_list<'a>(value: &'a Value, context: &str, key: &str) -> Result<&'a List, DecodeError> {
    match value {
        Value::List(list) => Ok(list),
        other => Err(DecodeError::ShapeMismatch {
            context: format!("{context}.{key}"),
            expected: "list",
            found: other.kind().to_string(),
        }),
    }
}

fn missing(context: &str, key: &str) -> DecodeError {
    DecodeError::MissingRequired { path: format!("{context}.{key}") }
}

fn skip_unknown(context: &str, key: &str) {
    tracing::warn!(context, key, "skipping unknown field");
}

fn request_from(value: &Value, context: &str) -> Result<Request, DecodeError> {
    let map = expect_map(value, CLASS_REQUEST, context)?;
    let mut request = Request::new();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_SUBJECTS => {
                let list = expect_list(val, context, KEY_SUBJECTS)?;
                request.subjects = list
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| subject_from(item, &format!("{context}.subjects[{i}]")))
                    .collect::<Result<_, _>>()?;
            }
            KEY_RESOURCES => {
                let list = expect_list(val, context, KEY_RESOURCES)?;
                request.resources = list
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| resource_from(item, &format!("{context}.resources[{i}]")))
                    .collect::<Result<_, _>>()?;
            }
            KEY_ACTION => {
                request.action = match val {
                    Value::Null => None,
                    other => Some(action_from(other, &format!("{context}.action"))?),
                };
            }
            KEY_ENVIRONMENT => {
                request.environment = match val {
                    Value::Null => None,
                    other => Some(environment_from(other, &format!("{context}.environment"))?),
                };
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(request)
}

fn attributes_from(value: &Value, context: &str) -> Result<Vec<Attribute>, DecodeError> {
    let list = expect_list(value, context, KEY_ATTRIBUTES)?;
    list.items
        .iter()
        .enumerate()
        .map(|(i, item)| attribute_from(item, &format!("{context}.attributes[{i}]")))
        .collect()
}

fn subject_from(value: &Value, context: &str) -> Result<Subject, DecodeError> {
    let map = expect_map(value, CLASS_SUBJECT, context)?;
    let mut subject = Subject::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_CATEGORY => subject.category = opt_string_from(val, context, KEY_CATEGORY)?,
            KEY_ATTRIBUTES => subject.attributes = attributes_from(val, context)?,
            other => skip_unknown(context, other),
        }
    }
    Ok(subject)
}

fn resource_from(value: &Value, context: &str) -> Result<Resource, DecodeError> {
    let map = expect_map(value, CLASS_RESOURCE, context)?;
    let mut resource = Resource::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_CONTENT => resource.content = opt_string_from(val, context, KEY_CONTENT)?,
            KEY_ATTRIBUTES => resource.attributes = attributes_from(val, context)?,
            other => skip_unknown(context, other),
        }
    }
    Ok(resource)
}

fn action_from(value: &Value, context: &str) -> Result<Action, DecodeError> {
    let map = expect_map(value, CLASS_ACTION, context)?;
    let mut action = Action::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_ATTRIBUTES => action.attributes = attributes_from(val, context)?,
            other => skip_unknown(context, other),
        }
    }
    Ok(action)
}

fn environment_from(value: &Value, context: &str) -> Result<Environment, DecodeError> {
    let map = expect_map(value, CLASS_ENVIRONMENT, context)?;
    let mut environment = Environment::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_ATTRIBUTES => environment.attributes = attributes_from(val, context)?,
            other => skip_unknown(context, other),
        }
    }
    Ok(environment)
}

fn attribute_from(value: &Value, context: &str) -> Result<Attribute, DecodeError> {
    let map = expect_map(value, CLASS_ATTRIBUTE, context)?;
    let mut id = None;
    let mut attribute = Attribute::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_ID => id = opt_string_from(val, context, KEY_ID)?,
            KEY_DATA_TYPE => attribute.data_type = opt_string_from(val, context, KEY_DATA_TYPE)?,
            KEY_ISSUER => attribute.issuer = opt_string_from(val, context, KEY_ISSUER)?,
            KEY_VALUES => attribute.values = strings_from(val, context, KEY_VALUES)?,
            other => skip_unknown(context, other),
        }
    }
    attribute.id = id.ok_or_else(|| missing(context, KEY_ID))?;
    Ok(attribute)
}

fn response_from(value: &Value, context: &str) -> Result<Response, DecodeError> {
    let map = expect_map(value, CLASS_RESPONSE, context)?;
    let mut response = Response::default();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_REQUEST => {
                response.request = match val {
                    Value::Null => None,
                    other => Some(request_from(other, &format!("{context}.request"))?),
                };
            }
            KEY_RESULTS => {
                let list = expect_list(val, context, KEY_RESULTS)?;
                response.results = list
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| result_from(item, &format!("{context}.results[{i}]")))
                    .collect::<Result<_, _>>()?;
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(response)
}

fn result_from(value: &Value, context: &str) -> Result<ResponseResult, DecodeError> {
    let map = expect_map(value, CLASS_RESULT, context)?;
    let mut decision = None;
    let mut resource_id = None;
    let mut status = None;
    let mut obligations = Vec::new();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_DECISION => match val {
                Value::Int(code) => decision = Some(Decision::from_wire(*code)),
                Value::Null => {}
                other => {
                    return Err(DecodeError::ShapeMismatch {
                        context: format!("{context}.decision"),
                        expected: "int",
                        found: other.kind().to_string(),
                    })
                }
            },
            KEY_RESOURCE_ID => resource_id = opt_string_from(val, context, KEY_RESOURCE_ID)?,
            KEY_STATUS => {
                status = match val {
                    Value::Null => None,
                    other => Some(status_from(other, &format!("{context}.status"))?),
                };
            }
            KEY_OBLIGATIONS => {
                let list = expect_list(val, context, KEY_OBLIGATIONS)?;
                obligations = list
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| obligation_from(item, &format!("{context}.obligations[{i}]")))
                    .collect::<Result<_, _>>()?;
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(ResponseResult {
        decision: decision.ok_or_else(|| missing(context, KEY_DECISION))?,
        resource_id,
        status,
        obligations,
    })
}

fn status_from(value: &Value, context: &str) -> Result<Status, DecodeError> {
    let map = expect_map(value, CLASS_STATUS, context)?;
    let mut message = None;
    let mut code = None;
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_MESSAGE => message = opt_string_from(val, context, KEY_MESSAGE)?,
            KEY_CODE => {
                code = match val {
                    Value::Null => None,
                    other => Some(status_code_from(other, &format!("{context}.code"), 1)?),
                };
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(Status { message: message.ok_or_else(|| missing(context, KEY_MESSAGE))?, code })
}

fn status_code_from(value: &Value, context: &str, depth: usize) -> Result<StatusCode, DecodeError> {
    if depth > MAX_STATUS_DEPTH {
        return Err(DecodeError::DepthExceeded { max: MAX_STATUS_DEPTH });
    }
    let map = expect_map(value, CLASS_STATUS_CODE, context)?;
    let mut code = None;
    let mut subcode = None;
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_CODE => code = opt_string_from(val, context, KEY_CODE)?,
            KEY_SUBCODE => {
                // a Null subcode node simply ends the chain
                subcode = match val {
                    Value::Null => None,
                    other => Some(Box::new(status_code_from(
                        other,
                        &format!("{context}.subcode"),
                        depth + 1,
                    )?)),
                };
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(StatusCode { code: code.ok_or_else(|| missing(context, KEY_CODE))?, subcode })
}

fn obligation_from(value: &Value, context: &str) -> Result<Obligation, DecodeError> {
    let map = expect_map(value, CLASS_OBLIGATION, context)?;
    let mut id = None;
    let mut fulfill_on = FulfillOn::default();
    let mut assignments = Vec::new();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_ID => id = opt_string_from(val, context, KEY_ID)?,
            KEY_FULFILL_ON => match val {
                Value::Int(code) => {
                    fulfill_on = FulfillOn::from_wire(*code).ok_or_else(|| {
                        DecodeError::EnumOutOfRange {
                            context: format!("{context}.fulfillOn"),
                            value: *code,
                            kind: "fulfillOn",
                        }
                    })?;
                }
                Value::Null => {}
                other => {
                    return Err(DecodeError::ShapeMismatch {
                        context: format!("{context}.fulfillOn"),
                        expected: "int",
                        found: other.kind().to_string(),
                    })
                }
            },
            KEY_ASSIGNMENTS => {
                let list = expect_list(val, context, KEY_ASSIGNMENTS)?;
                assignments = list
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| assignment_from(item, &format!("{context}.assignments[{i}]")))
                    .collect::<Result<_, _>>()?;
            }
            other => skip_unknown(context, other),
        }
    }
    Ok(Obligation { id: id.ok_or_else(|| missing(context, KEY_ID))?, fulfill_on, assignments })
}

fn assignment_from(value: &Value, context: &str) -> Result<AttributeAssignment, DecodeError> {
    let map = expect_map(value, CLASS_ATTRIBUTE_ASSIGNMENT, context)?;
    let mut id = None;
    let mut values = Vec::new();
    for (key, val) in &map.entries {
        match expect_key(key, context)? {
            KEY_ID => id = opt_string_from(val, context, KEY_ID)?,
            KEY_VALUES => values = strings_from(val, context, KEY_VALUES)?,
            other => skip_unknown(context, other),
        }
    }
    Ok(AttributeAssignment { id: id.ok_or_else(|| missing(context, KEY_ID))?, values })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
