//! Check `build_request` and `parse_response` against JSON vectors stored in
//! `test-vectors/`.
//!
//! Bodies are compared as parsed JSON, not raw strings, so field order does
//! not matter.

use serde_json::Value;
use trustadmin_core::{
    build_request, parse_response, ClientConfig, FilterValue, HttpMethod, HttpResponse, RequestOptions, Session,
};

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_filter(value: &Value) -> FilterValue {
    match value {
        Value::String(s) => FilterValue::from(s.as_str()),
        Value::Bool(b) => FilterValue::from(*b),
        Value::Number(n) => FilterValue::from(n.as_i64().unwrap()),
        other => panic!("unsupported filter value: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

#[test]
fn request_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let config = ClientConfig::new(vectors["base_url"].as_str().unwrap()).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let session = Session::with_cookies(
            case["cookies"]
                .as_object()
                .unwrap()
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap().to_string())),
        );

        let mut options = RequestOptions::default();
        if !case["body"].is_null() {
            options.body = Some(case["body"].clone());
        }
        for filter in case["filters"].as_array().unwrap() {
            options = options.filter(filter[0].as_str().unwrap(), parse_filter(&filter[1]));
        }

        let method = parse_method(case["method"].as_str().unwrap());
        let req = build_request(&config, &session, method, case["path"].as_str().unwrap(), &options).unwrap();
        let expected = &case["expected"];

        assert_eq!(req.method, method, "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: headers");

        let body: Value = match req.body.as_deref() {
            Some(body) => serde_json::from_str(body).unwrap(),
            None => Value::Null,
        };
        assert_eq!(body, expected["body"], "{name}: body");
    }
}

#[test]
fn response_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse::new(
            u16::try_from(case["status"].as_u64().unwrap()).unwrap(),
            case["body"].as_str().unwrap(),
        );
        let expected = &case["expected"];

        match parse_response(&response) {
            Ok(value) => {
                assert!(expected.get("ok").is_some(), "{name}: expected an error, got {value}");
                assert_eq!(value, expected["ok"], "{name}: value");
            }
            Err(err) => {
                let want = expected.get("error").unwrap_or_else(|| panic!("{name}: unexpected error {err}"));
                assert_eq!(err.status().map(u64::from), want["status"].as_u64(), "{name}: status");
                assert_eq!(err.kind().as_str(), want["kind"].as_str().unwrap(), "{name}: kind");
                assert_eq!(err.message(), want["message"].as_str().unwrap(), "{name}: message");
                assert_eq!(err.to_string(), format!("Fetch error: {}", err.message()), "{name}: display");
            }
        }
    }
}
