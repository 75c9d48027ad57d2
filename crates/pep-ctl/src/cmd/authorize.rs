//! The authorize command: build a query, ship it, render the answer.

use anyhow::{bail, Context, Result};

use libpep::{PepClient, PepConfig};
use pep_core::model::{Decision, Response, ResponseResult};
use pep_core::profile::{PosixMapping, RequestBuilder};

pub async fn cmd_authorize(args: &[&str]) -> Result<()> {
    let parsed = match parse_args(args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };

    match run(parsed).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

struct AuthorizeArgs {
    resource: String,
    action: String,
    subject_dn: Option<String>,
    fqans: Vec<String>,
    certchain: Option<String>,
    endpoints: Vec<String>,
    timeout: Option<u64>,
}

fn parse_args(args: &[&str]) -> Result<AuthorizeArgs> {
    let mut resource = None;
    let mut action = None;
    let mut subject_dn = None;
    let mut fqans = Vec::new();
    let mut certchain = None;
    let mut endpoints = Vec::new();
    let mut timeout = None;

    let mut i = 0;
    while i < args.len() {
        let option = args[i];
        i += 1;
        let mut value = || -> Result<String> {
            let v = args.get(i).with_context(|| format!("{option} requires a value"))?;
            i += 1;
            Ok(v.to_string())
        };
        match option {
            "--resource" => resource = Some(value()?),
            "--action" => action = Some(value()?),
            "--subject-dn" => subject_dn = Some(value()?),
            "--fqan" => fqans.push(value()?),
            "--certchain" => certchain = Some(value()?),
            "--endpoint" => endpoints.push(value()?),
            "--timeout" => {
                timeout = Some(value()?.parse().context("--timeout must be a number")?)
            }
            other => bail!("Unknown option: {other}"),
        }
    }

    Ok(AuthorizeArgs {
        resource: resource.context("--resource is required")?,
        action: action.context("--action is required")?,
        subject_dn,
        fqans,
        certchain,
        endpoints,
        timeout,
    })
}

/// Returns whether the first result was a Permit.
async fn run(args: AuthorizeArgs) -> Result<bool> {
    let mut config = PepConfig::load()?;
    if !args.endpoints.is_empty() {
        config.endpoints = args.endpoints;
    }
    if let Some(secs) = args.timeout {
        config.request_timeout_secs = secs;
    }

    let mut builder =
        RequestBuilder::new().resource(args.resource).action(args.action);
    if let Some(dn) = args.subject_dn {
        builder = builder.subject_dn(dn);
    }
    for fqan in args.fqans {
        builder = builder.fqan(fqan);
    }
    if let Some(path) = &args.certchain {
        builder = builder.cert_chain(read_cert_chain(path)?);
    }

    let client = PepClient::new(&config)?;
    let response = client.authorize(&builder.build()).await?;
    Ok(print_response(&response))
}

fn read_cert_chain(path: &str) -> Result<String> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read certificate chain {path}"))?;
    if !pem.contains("BEGIN CERTIFICATE") {
        bail!("{path} does not look like a PEM certificate chain");
    }
    Ok(pem)
}

fn print_response(response: &Response) -> bool {
    if response.results.is_empty() {
        println!("No results in response.");
        return false;
    }
    for result in &response.results {
        print_result(result);
    }
    response.results[0].decision == Decision::Permit
}

fn print_result(result: &ResponseResult) {
    if let Some(id) = &result.resource_id {
        println!("Resource: {id}");
    }
    println!("Decision: {}", result.decision);
    if let Some(status) = &result.status {
        if !status.message.is_empty() {
            println!("Status: {}", status.message);
        }
        let mut code = status.code.as_ref();
        while let Some(c) = code {
            println!("Status code: {}", c.code);
            code = c.subcode.as_deref();
        }
    }
    for obligation in &result.obligations {
        println!("Obligation: {} (on {:?})", obligation.id, obligation.fulfill_on);
        for assignment in &obligation.assignments {
            println!("  {} = {}", assignment.id, assignment.values.join(", "));
        }
    }
    if let Some(mapping) = PosixMapping::from_result(result) {
        let uid = mapping.uid.as_deref().unwrap_or("-");
        let gid = mapping.gid.as_deref().unwrap_or("-");
        println!(
            "POSIX mapping: uid={uid} gid={gid} secondary=[{}]",
            mapping.secondary_gids.join(", ")
        );
    }
}
