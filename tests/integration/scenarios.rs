//! End-to-end codec scenarios: realistic queries and answers pushed through
//! the full marshal → bytes → unmarshal path in both directions.

use crate::*;

use pep_core::hessian::{self, Value};
use pep_core::{marshal_request, marshal_response, unmarshal_request, unmarshal_response};

#[test]
fn permit_with_uidgid_obligation() {
    let request = submit_request();
    let decoded = unmarshal_request(&marshal_request(&request).unwrap()).unwrap();
    assert_eq!(decoded, request);

    let subject = &decoded.subjects[0];
    assert_eq!(
        attribute_values(&subject.attributes, profile::ATTRIBUTE_SUBJECT_ID).unwrap(),
        ["CN=Alice,O=Example,C=CH"]
    );
    assert_eq!(
        attribute_values(
            &decoded.resources[0].attributes,
            profile::ATTRIBUTE_RESOURCE_ID
        )
        .unwrap(),
        ["urn:example:cluster"]
    );
    assert_eq!(
        attribute_values(
            &decoded.action.as_ref().unwrap().attributes,
            profile::ATTRIBUTE_ACTION_ID
        )
        .unwrap(),
        ["submit"]
    );

    let response = permit_uidgid_response();
    let decoded = unmarshal_response(&marshal_response(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);

    let result = &decoded.results[0];
    assert_eq!(result.decision, Decision::Permit);
    assert_eq!(
        result.status.as_ref().unwrap().code.as_ref().unwrap().code,
        profile::STATUS_OK
    );
    let obligation = &result.obligations[0];
    assert_eq!(obligation.id, profile::OBLIGATION_UIDGID);
    assert_eq!(obligation.fulfill_on, FulfillOn::Permit);
    assert_eq!(obligation.assignments.len(), 2);
    let mapping = profile::PosixMapping::from_result(result).unwrap();
    assert_eq!(mapping.uid.as_deref(), Some("1001"));
    assert_eq!(mapping.gid.as_deref(), Some("2001"));
}

#[test]
fn deny_without_obligations() {
    let response = Response {
        request: None,
        results: vec![ResponseResult::new(Decision::Deny)],
    };
    let decoded = unmarshal_response(&marshal_response(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
    assert_eq!(decoded.results[0].decision, Decision::Deny);
    assert!(decoded.results[0].obligations.is_empty());
    assert!(decoded.results[0].status.is_none());
}

#[test]
fn indeterminate_with_status_message() {
    let response = Response {
        request: None,
        results: vec![ResponseResult {
            decision: Decision::Indeterminate,
            resource_id: None,
            status: Some(Status {
                message: "policy repository unavailable".to_string(),
                code: Some(StatusCode::new(
                    "urn:oasis:names:tc:xacml:1.0:status:processing-error",
                )),
            }),
            obligations: Vec::new(),
        }],
    };
    let decoded = unmarshal_response(&marshal_response(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
    let status = decoded.results[0].status.as_ref().unwrap();
    assert_eq!(status.message, "policy repository unavailable");
    assert_eq!(
        status.code.as_ref().unwrap().code,
        "urn:oasis:names:tc:xacml:1.0:status:processing-error"
    );
}

#[test]
fn voms_fqan_subject_preserves_value_order() {
    let fqans = ["/vo/group/Role=prod", "/vo/group", "/vo"];
    let mut builder = profile::RequestBuilder::new()
        .subject_dn("CN=Alice,O=Example,C=CH")
        .resource("urn:example:cluster")
        .action("submit");
    for fqan in fqans {
        builder = builder.fqan(fqan);
    }
    let request = builder.build();

    let decoded = unmarshal_request(&marshal_request(&request).unwrap()).unwrap();
    assert_eq!(decoded, request);

    let subject = &decoded.subjects[0];
    assert_eq!(
        attribute_values(&subject.attributes, profile::ATTRIBUTE_VOMS_PRIMARY_FQAN).unwrap(),
        [fqans[0]]
    );
    assert_eq!(
        attribute_values(&subject.attributes, profile::ATTRIBUTE_VOMS_FQAN).unwrap(),
        fqans
    );
}

#[test]
fn secondary_gids_obligation_preserves_assignment_order() {
    let mut obligation = Obligation::new(profile::OBLIGATION_SECONDARY_GIDS, FulfillOn::Permit);
    for gid in ["3001", "3002", "3003"] {
        obligation
            .assignments
            .push(AttributeAssignment::single(profile::ASSIGNMENT_POSIX_GID, gid));
    }
    let response = Response {
        request: None,
        results: vec![ResponseResult {
            obligations: vec![obligation],
            ..ResponseResult::new(Decision::Permit)
        }],
    };

    let decoded = unmarshal_response(&marshal_response(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
    let mapping = profile::PosixMapping::from_result(&decoded.results[0]).unwrap();
    assert_eq!(mapping.secondary_gids, ["3001", "3002", "3003"]);
}

#[test]
fn future_result_field_is_tolerated() {
    // splice an unknown key into the Result map the way a newer daemon would
    let clean = marshal_response(&permit_uidgid_response()).unwrap();
    let mut root = hessian::deserialize(&clean).unwrap();
    {
        let response_map = match &mut root {
            Value::Map(map) => map,
            _ => panic!("response root is not a map"),
        };
        let results = response_map
            .entries
            .iter_mut()
            .find(|(k, _)| matches!(k, Value::String(s) if s == "results"))
            .map(|(_, v)| v)
            .unwrap();
        let result_map = match results {
            Value::List(list) => match &mut list.items[0] {
                Value::Map(map) => map,
                _ => panic!("result is not a map"),
            },
            _ => panic!("results is not a list"),
        };
        result_map.insert("futureField", Value::String("x".to_string()));
    }
    let spliced = hessian::serialize(&root).unwrap();

    let with_unknown = unmarshal_response(&spliced).unwrap();
    let without = unmarshal_response(&clean).unwrap();
    assert_eq!(with_unknown, without);
}

#[test]
fn empty_request_is_legal_wire() {
    let request = Request::new();
    let bytes = marshal_request(&request).unwrap();
    assert_eq!(unmarshal_request(&bytes).unwrap(), request);
}
