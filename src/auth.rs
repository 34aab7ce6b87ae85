//! Role-based authorization for the RPC surface.
//!
//! Callers present their roles in a custom extension of their client
//! certificate (comma-separated role names under [`ROLE_OID`]). Every
//! handler checks the method's required roles before the engine is
//! touched.

use std::collections::HashMap;

use tonic::{Request, Status};
use x509_parser::prelude::*;

/// Certificate extension carrying the caller's comma-separated roles.
pub const ROLE_OID: &str = "1.2.840.10070.8.1";

/// Full gRPC method names, as required by the policy lookup.
pub mod method {
    pub const START: &str = "/jobd.JobService/Start";
    pub const STOP: &str = "/jobd.JobService/Stop";
    pub const QUERY: &str = "/jobd.JobService/Query";
    pub const STREAM: &str = "/jobd.JobService/Stream";
}

/// Maps gRPC methods to the roles allowed to call them.
#[derive(Debug, Clone)]
pub struct Policy {
    rules: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for Policy {
    /// The default policy: mutating operations are admin-only, read
    /// operations are open to both roles.
    fn default() -> Self {
        let mut rules: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        rules.insert(method::START, &["admin"]);
        rules.insert(method::STOP, &["admin"]);
        rules.insert(method::QUERY, &["admin", "user"]);
        rules.insert(method::STREAM, &["admin", "user"]);
        Self { rules }
    }
}

impl Policy {
    /// Whether any of `roles` grants access to `method`. Unknown methods
    /// are denied.
    pub fn allows(&self, method: &str, roles: &[String]) -> bool {
        match self.rules.get(method) {
            Some(allowed) => roles
                .iter()
                .any(|role| allowed.iter().any(|a| *a == role.as_str())),
            None => false,
        }
    }
}

/// Deny unless the peer's certificate roles satisfy the policy for
/// `method`.
pub fn authorize<T>(request: &Request<T>, method: &str, policy: &Policy) -> Result<(), Status> {
    let roles = peer_roles(request)?;
    if policy.allows(method, &roles) {
        Ok(())
    } else {
        Err(Status::permission_denied(
            "caller roles do not permit this method",
        ))
    }
}

/// Roles presented by the connecting peer, read from the role extension
/// of its leaf certificate. A certificate without the extension carries
/// no roles.
pub fn peer_roles<T>(request: &Request<T>) -> Result<Vec<String>, Status> {
    let certs = request
        .peer_certs()
        .ok_or_else(|| Status::permission_denied("client certificate required"))?;
    let leaf = certs
        .first()
        .ok_or_else(|| Status::permission_denied("empty certificate chain"))?;

    let (_, cert) = X509Certificate::from_der(leaf.as_ref())
        .map_err(|_| Status::permission_denied("malformed client certificate"))?;

    for ext in cert.extensions() {
        if ext.oid.to_id_string() == ROLE_OID {
            return Ok(parse_roles(&decode_utf8_value(ext.value)));
        }
    }
    Ok(Vec::new())
}

/// Split a comma-separated role list, trimming whitespace and dropping
/// empty entries.
pub fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|role| role.trim().to_string())
        .filter(|role| !role.is_empty())
        .collect()
}

/// Extension values are either the bare role string or a DER-wrapped
/// UTF8String/IA5String; strip the short-form header when present.
fn decode_utf8_value(value: &[u8]) -> String {
    match value {
        [0x0c, len, rest @ ..] | [0x16, len, rest @ ..] if *len as usize == rest.len() => {
            String::from_utf8_lossy(rest).into_owned()
        }
        _ => String::from_utf8_lossy(value).into_owned(),
    }
}
