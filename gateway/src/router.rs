//! Inbound route table.
//!
//! Matches method + path against the fixed set of operations the gateway
//! serves and captures path parameters. Anything unmatched gets a 404
//! envelope from the service.

use http::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Login,
    /// Generic passthrough: the captured tail is the upstream path.
    TelephonyGet { path: String },
    TelephonyPost { path: String },
    TelephonyPut { path: String },
    TelephonyDelete { path: String },
    /// Method/endpoint/payload taken from the JSON body.
    TelephonyRequest,
    TelephonyStatus,
    /// Lead upsert into a specific outbound list.
    OutboundListLead { list_id: String },
    CampaignOutboundList,
    /// Public lead upsert; list id comes from the path or, when absent,
    /// from the body.
    PublicLeadsUpsert { list_id: Option<String> },
    /// Passthrough under the upstream `users/api/sms` prefix; the tail is
    /// empty for the prefix root.
    UsersSms { tail: String },
    /// Passthrough under `workflows/api/webform`.
    WorkflowsWebform { tail: String },
}

pub fn match_route(method: &Method, path: &str) -> Option<Route> {
    if path == "/health" && method == Method::GET {
        return Some(Route::Health);
    }
    if path == "/api/auth/login" && method == Method::POST {
        return Some(Route::Login);
    }

    if let Some(rest) = path.strip_prefix("/api/telephony/") {
        return match_telephony(method, rest);
    }

    if method == Method::POST {
        if let Some(route) = match_leads(path) {
            return Some(route);
        }
    }

    if let Some(tail) = match_prefix(path, "/users/api/sms") {
        return Some(Route::UsersSms {
            tail: tail.to_string(),
        });
    }
    if let Some(tail) = match_prefix(path, "/workflows/api/webform") {
        return Some(Route::WorkflowsWebform {
            tail: tail.to_string(),
        });
    }

    None
}

fn match_telephony(method: &Method, rest: &str) -> Option<Route> {
    match rest {
        "status" if method == Method::GET => return Some(Route::TelephonyStatus),
        "request" => return Some(Route::TelephonyRequest),
        _ => {}
    }

    let (verb, tail) = rest.split_once('/')?;
    if tail.is_empty() {
        return None;
    }
    let path = tail.to_string();

    match verb {
        "get" if method == Method::GET => Some(Route::TelephonyGet { path }),
        "post" if method == Method::POST => Some(Route::TelephonyPost { path }),
        "put" if method == Method::PUT => Some(Route::TelephonyPut { path }),
        "delete" if method == Method::DELETE => Some(Route::TelephonyDelete { path }),
        _ => None,
    }
}

fn match_leads(path: &str) -> Option<Route> {
    if path == "/data/api/types/campaignoutboundlist" {
        return Some(Route::CampaignOutboundList);
    }

    if let Some(rest) = path.strip_prefix("/data/api/types/outboundlist/")
        && let Some(list_id) = rest.strip_suffix("/lead")
        && !list_id.is_empty()
        && !list_id.contains('/')
    {
        return Some(Route::OutboundListLead {
            list_id: list_id.to_string(),
        });
    }

    if path == "/public/outboundlist/leadsupsert" {
        return Some(Route::PublicLeadsUpsert { list_id: None });
    }
    if let Some(rest) = path.strip_prefix("/public/outboundlist/")
        && let Some(list_id) = rest.strip_suffix("/leadsupsert")
        && !list_id.is_empty()
        && !list_id.contains('/')
    {
        return Some(Route::PublicLeadsUpsert {
            list_id: Some(list_id.to_string()),
        });
    }

    None
}

/// Match `path` against `prefix` exactly or `prefix/<tail>`; returns the
/// tail ("" for the exact match).
fn match_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    match rest.strip_prefix('/') {
        Some(tail) => Some(tail),
        None if rest.is_empty() => Some(""),
        None => None,
    }
}
