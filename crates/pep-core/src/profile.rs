//! Grid worker-node authorization vocabulary.
//!
//! Attribute, data-type, and obligation identifiers from the authz-interop
//! and XACML specs, plus helpers to assemble the common query shape (one
//! subject described by DN, certificate chain, and VOMS FQANs) and to digest
//! the POSIX account-mapping obligations out of a result.

use crate::model::{
    Action, Attribute, Obligation, Request, Resource, ResponseResult, Subject,
};

// ── Identifiers ───────────────────────────────────────────────────────────────

pub const ATTRIBUTE_SUBJECT_ID: &str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
pub const ATTRIBUTE_SUBJECT_ISSUER: &str =
    "http://authz-interop.org/xacml/subject/subject-x509-issuer";
pub const ATTRIBUTE_KEY_INFO: &str = "urn:oasis:names:tc:xacml:1.0:subject:key-info";
pub const ATTRIBUTE_RESOURCE_ID: &str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
pub const ATTRIBUTE_ACTION_ID: &str = "urn:oasis:names:tc:xacml:1.0:action:action-id";

pub const ATTRIBUTE_VOMS_FQAN: &str = "http://authz-interop.org/xacml/subject/voms-fqan";
pub const ATTRIBUTE_VOMS_PRIMARY_FQAN: &str =
    "http://authz-interop.org/xacml/subject/voms-primary-fqan";

pub const DATATYPE_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const DATATYPE_X500_NAME: &str = "urn:oasis:names:tc:xacml:1.0:data-type:x500Name";

pub const STATUS_OK: &str = "urn:oasis:names:tc:xacml:1.0:status:ok";

pub const OBLIGATION_UIDGID: &str = "http://authz-interop.org/xacml/obligation/uidgid";
pub const OBLIGATION_SECONDARY_GIDS: &str =
    "http://authz-interop.org/xacml/obligation/secondary-gids";

pub const ASSIGNMENT_POSIX_UID: &str = "http://authz-interop.org/xacml/attribute/posix-uid";
pub const ASSIGNMENT_POSIX_GID: &str = "http://authz-interop.org/xacml/attribute/posix-gid";

// ── Request builder ───────────────────────────────────────────────────────────

/// Assembles the standard authorization query. Every subject-describing
/// attribute (DN, certificate chain, FQANs) lands in ONE Subject, in the
/// order the daemon's policies expect; the codec preserves that order.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    subject_dn: Option<String>,
    cert_chain: Option<String>,
    fqans: Vec<String>,
    resource_id: Option<String>,
    action_id: Option<String>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// X.500 distinguished name of the user.
    pub fn subject_dn(mut self, dn: impl Into<String>) -> Self {
        self.subject_dn = Some(dn.into());
        self
    }

    /// PEM text of the user's certificate chain, passed through opaquely.
    pub fn cert_chain(mut self, pem: impl Into<String>) -> Self {
        self.cert_chain = Some(pem.into());
        self
    }

    /// VOMS FQAN. The first one added becomes the primary FQAN.
    pub fn fqan(mut self, fqan: impl Into<String>) -> Self {
        self.fqans.push(fqan.into());
        self
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn action(mut self, id: impl Into<String>) -> Self {
        self.action_id = Some(id.into());
        self
    }

    pub fn build(self) -> Request {
        let mut subject = Subject::default();
        if let Some(dn) = self.subject_dn {
            subject.attributes.push(Attribute {
                id: ATTRIBUTE_SUBJECT_ID.to_string(),
                data_type: Some(DATATYPE_X500_NAME.to_string()),
                issuer: None,
                values: vec![dn],
            });
        }
        if let Some(pem) = self.cert_chain {
            subject.attributes.push(Attribute::single(ATTRIBUTE_KEY_INFO, pem));
        }
        if let Some(primary) = self.fqans.first() {
            let mut attribute = Attribute::single(ATTRIBUTE_VOMS_PRIMARY_FQAN, primary.clone());
            attribute.data_type = Some(DATATYPE_STRING.to_string());
            subject.attributes.push(attribute);
            subject.attributes.push(Attribute {
                id: ATTRIBUTE_VOMS_FQAN.to_string(),
                data_type: Some(DATATYPE_STRING.to_string()),
                issuer: None,
                values: self.fqans,
            });
        }

        let mut request = Request::new();
        if !subject.attributes.is_empty() {
            request.subjects.push(subject);
        }
        if let Some(id) = self.resource_id {
            request.resources.push(Resource {
                content: None,
                attributes: vec![Attribute::single(ATTRIBUTE_RESOURCE_ID, id)],
            });
        }
        if let Some(id) = self.action_id {
            request.action =
                Some(Action { attributes: vec![Attribute::single(ATTRIBUTE_ACTION_ID, id)] });
        }
        request
    }
}

// ── Obligation digest ─────────────────────────────────────────────────────────

/// POSIX account mapping extracted from uidgid / secondary-gids obligations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PosixMapping {
    pub uid: Option<String>,
    pub gid: Option<String>,
    pub secondary_gids: Vec<String>,
}

impl PosixMapping {
    /// Digest the mapping obligations that apply to this result's decision.
    /// Returns None when no mapping obligation is present.
    pub fn from_result(result: &ResponseResult) -> Option<Self> {
        let mut mapping = Self::default();
        let mut found = false;
        for obligation in applicable(result) {
            match obligation.id.as_str() {
                OBLIGATION_UIDGID => {
                    found = true;
                    for assignment in &obligation.assignments {
                        let value = assignment.values.first().cloned();
                        match assignment.id.as_str() {
                            ASSIGNMENT_POSIX_UID => mapping.uid = value,
                            ASSIGNMENT_POSIX_GID => mapping.gid = value,
                            _ => {}
                        }
                    }
                }
                OBLIGATION_SECONDARY_GIDS => {
                    found = true;
                    for assignment in &obligation.assignments {
                        if assignment.id == ASSIGNMENT_POSIX_GID {
                            mapping.secondary_gids.extend(assignment.values.iter().cloned());
                        }
                    }
                }
                _ => {}
            }
        }
        found.then_some(mapping)
    }
}

fn applicable(result: &ResponseResult) -> impl Iterator<Item = &Obligation> + '_ {
    result
        .obligations
        .iter()
        .filter(|ob| ob.fulfill_on.applies_to(result.decision))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
