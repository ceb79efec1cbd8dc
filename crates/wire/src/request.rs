// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single client→server request object (spec §6): one flat struct
//! carrying every optional field any request kind might need, dispatched by
//! the rules in [`Request::dispatch`].

use serde::{Deserialize, Serialize};
use wrq_core::{JobKey, JobState, RepGroupName};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<JobKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_group: Option<RepGroupName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exitcode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(rename = "ServerID", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

/// The seven request kinds named by spec §6's dispatch rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Current,
    Details,
    Retry,
    Remove,
    Kill,
    ConfirmBadServer,
    DismissMsg,
}

impl RequestKind {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "current" => Self::Current,
            "details" => Self::Details,
            "retry" => Self::Retry,
            "remove" => Self::Remove,
            "kill" => Self::Kill,
            "confirmBadServer" => Self::ConfirmBadServer,
            "dismissMsg" => Self::DismissMsg,
            _ => return None,
        })
    }
}

/// The outcome of applying spec §6's "first match wins" dispatch rule to a
/// decoded [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// `Key` was non-empty: a single-job detail lookup.
    JobDetail(JobKey),
    /// `Request` named a recognized kind.
    Request(RequestKind),
}

impl Request {
    /// Applies the dispatch rule: `Key` wins if present, else `Request` if
    /// it names a recognized kind, else `None` (the request is ignored).
    pub fn dispatch(&self) -> Option<Dispatch> {
        if let Some(key) = self.key {
            return Some(Dispatch::JobDetail(key));
        }
        let kind = RequestKind::parse(self.request.as_deref()?)?;
        Some(Dispatch::Request(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_present_wins_over_request_field() {
        let key = JobKey::derive("echo hi", "/tmp");
        let request = Request { key: Some(key), request: Some("current".into()), ..Default::default() };
        assert_eq!(request.dispatch(), Some(Dispatch::JobDetail(key)));
    }

    #[test]
    fn unrecognized_request_kind_is_ignored() {
        let request = Request { request: Some("bogus".into()), ..Default::default() };
        assert_eq!(request.dispatch(), None);
    }

    #[test]
    fn empty_request_is_ignored() {
        assert_eq!(Request::default().dispatch(), None);
    }

    #[test]
    fn deserializes_from_pascal_case_json() {
        let json = r#"{"Request":"current","All":true,"ServerID":"srv-1"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.request.as_deref(), Some("current"));
        assert_eq!(request.all, Some(true));
        assert_eq!(request.server_id.as_deref(), Some("srv-1"));
    }

    #[yare::parameterized(
        current            = { "current", RequestKind::Current },
        details             = { "details", RequestKind::Details },
        retry               = { "retry", RequestKind::Retry },
        remove              = { "remove", RequestKind::Remove },
        kill                = { "kill", RequestKind::Kill },
        confirm_bad_server  = { "confirmBadServer", RequestKind::ConfirmBadServer },
        dismiss_msg         = { "dismissMsg", RequestKind::DismissMsg },
    )]
    fn recognized_kind_dispatches_without_key(raw: &str, expected: RequestKind) {
        let request = Request { request: Some(raw.into()), ..Default::default() };
        assert_eq!(request.dispatch(), Some(Dispatch::Request(expected)));
    }

    fn arb_request() -> impl Strategy<Value = Request> {
        (
            any::<Option<i32>>(),
            any::<Option<String>>(),
            any::<Option<bool>>(),
            any::<Option<String>>(),
            any::<Option<String>>(),
        )
            .prop_map(|(exitcode, fail_reason, all, server_id, msg)| Request {
                exitcode,
                fail_reason,
                all,
                server_id,
                msg,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn request_json_round_trips(request in arb_request()) {
            let json = serde_json::to_string(&request).unwrap();
            let restored: Request = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(request, restored);
        }
    }
}
