//! XACML request/response object model.
//!
//! These are the shapes the codec puts on the wire. Entities are built by
//! the caller (request side) or the decoder (response side) and are plain
//! owned data; the codec never keeps references across calls.

/// Authorization decision, integer-coded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Decision {
    Deny = 0,
    Permit = 1,
    Indeterminate = 2,
    NotApplicable = 3,
}

impl Decision {
    /// Unknown codes map to Indeterminate so a newer daemon cannot make an
    /// old client mis-grant.
    pub fn from_wire(code: i32) -> Self {
        match code {
            0 => Self::Deny,
            1 => Self::Permit,
            3 => Self::NotApplicable,
            _ => Self::Indeterminate,
        }
    }

    pub fn as_wire(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Deny => "Deny",
            Self::Permit => "Permit",
            Self::Indeterminate => "Indeterminate",
            Self::NotApplicable => "Not Applicable",
        })
    }
}

/// Which decision an obligation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum FulfillOn {
    #[default]
    Deny = 0,
    Permit = 1,
}

impl FulfillOn {
    /// Strict: an obligation with an unknown trigger must not be
    /// half-honored, so there is no fallback here.
    pub fn from_wire(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Deny),
            1 => Some(Self::Permit),
            _ => None,
        }
    }

    pub fn as_wire(self) -> i32 {
        self as i32
    }

    /// Whether an obligation with this trigger applies to `decision`.
    pub fn applies_to(self, decision: Decision) -> bool {
        matches!(
            (self, decision),
            (Self::Deny, Decision::Deny) | (Self::Permit, Decision::Permit)
        )
    }
}

// ── Request side ──────────────────────────────────────────────────────────────

/// One named attribute with zero or more string values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    pub id: String,
    pub data_type: Option<String>,
    pub issuer: Option<String>,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    /// Attribute carrying a single value, the common case.
    pub fn single(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id: id.into(), values: vec![value.into()], ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subject {
    pub category: Option<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resource {
    pub content: Option<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Action {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
    pub attributes: Vec<Attribute>,
}

/// The authorization query shipped to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub subjects: Vec<Subject>,
    pub resources: Vec<Resource>,
    pub action: Option<Action>,
    pub environment: Option<Environment>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }
}

// ── Response side ─────────────────────────────────────────────────────────────

/// Categorical outcome of evaluation, independent of the decision.
/// Subcodes chain recursively; the decoder caps the chain depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    pub code: String,
    pub subcode: Option<Box<StatusCode>>,
}

impl StatusCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), subcode: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub code: Option<StatusCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeAssignment {
    pub id: String,
    pub values: Vec<String>,
}

impl AttributeAssignment {
    pub fn single(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id: id.into(), values: vec![value.into()] }
    }
}

/// An instruction the enforcement point must carry out when the decision
/// matches `fulfill_on`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Obligation {
    pub id: String,
    pub fulfill_on: FulfillOn,
    pub assignments: Vec<AttributeAssignment>,
}

impl Obligation {
    pub fn new(id: impl Into<String>, fulfill_on: FulfillOn) -> Self {
        Self { id: id.into(), fulfill_on, assignments: Vec::new() }
    }
}

/// One evaluated result. `resource_id` ties it back to the queried resource
/// when the request named several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseResult {
    pub decision: Decision,
    pub resource_id: Option<String>,
    pub status: Option<Status>,
    pub obligations: Vec<Obligation>,
}

impl ResponseResult {
    pub fn new(decision: Decision) -> Self {
        Self { decision, resource_id: None, status: None, obligations: Vec::new() }
    }
}

/// The daemon's answer: the echoed request (informational, may be absent)
/// plus one result per evaluated resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub request: Option<Request>,
    pub results: Vec<ResponseResult>,
}
