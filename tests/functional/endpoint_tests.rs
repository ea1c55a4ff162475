//! HTTP-level behaviour of the mutate endpoint.

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::fixtures::{PodBuilder, pod_review, review_body};
use crate::{ACCEPTED_CONTENT_TYPE, Harness, patch_of, response_of};
use pod_image_webhook::webhooks::policies::STATUS_ANNOTATION;

#[tokio::test]
async fn test_single_container_pod_scenario() {
    let harness = Harness::new();
    let pod = PodBuilder::new("web")
        .namespace("default")
        .container("web", "nginx")
        .build();

    let review = harness.review(pod_review("8c3d0e4a", &pod)).await;

    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(review["kind"], "AdmissionReview");
    let response = response_of(&review);
    assert_eq!(response["uid"], "8c3d0e4a");
    assert_eq!(response["allowed"], true);
    assert_eq!(response["patchType"], "JSONPatch");
    assert_eq!(
        patch_of(&review).unwrap(),
        json!([
            {"op": "replace", "path": "/spec/containers/0/image", "value": "debian"},
            {"op": "add", "path": "/metadata/annotations", "value": {STATUS_ANNOTATION: "mutated"}}
        ])
    );
}

#[tokio::test]
async fn test_wire_fields() {
    let harness = Harness::new();
    let pod = PodBuilder::new("web")
        .namespace("default")
        .container("web", "nginx")
        .build();

    let (status, bytes) = harness
        .post(Some(ACCEPTED_CONTENT_TYPE), pod_review("abc", &pod))
        .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body.get("request").is_none());
    let response = &body["response"];
    assert_eq!(response["uid"], "abc");
    assert_eq!(response["allowed"], true);
    assert_eq!(response["patchType"], "JSONPatch");
    // base64 of a JSON array always starts with "W" ('[')
    assert!(response["patch"].as_str().unwrap().starts_with('W'));
    assert!(response["status"].get("message").is_none());
}

// The endpoint compares Content-Type against the literal "Application/json".
// Compliant clients, including the API server, send "application/json" and
// are rejected with 415.
#[tokio::test]
async fn test_lowercase_content_type_is_rejected() {
    let harness = Harness::new();
    let pod = PodBuilder::new("web").namespace("default").container("web", "nginx").build();

    let (status, body) = harness
        .post(Some("application/json"), pod_review("uid", &pod))
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "invalid Content-Type, expect `application/json`"
    );
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let harness = Harness::new();
    let (status, _) = harness.post(None, b"{}".to_vec()).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_oversized_body_is_bad_request() {
    let harness = Harness::new();
    let body = vec![b' '; pod_image_webhook::webhooks::MAX_REVIEW_BYTES + 1];
    let (status, body) = harness.post(Some(ACCEPTED_CONTENT_TYPE), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "invalid body");
}

#[tokio::test]
async fn test_invalid_json_is_reported_in_payload() {
    let harness = Harness::new();
    let review = harness.review(b"{\"apiVersion\": ".to_vec()).await;

    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    let response = response_of(&review);
    assert_eq!(response["uid"], "");
    assert_eq!(response["allowed"], false);
    assert!(
        response["status"]["message"]
            .as_str()
            .unwrap()
            .starts_with("couldn't decode AdmissionReview")
    );
    assert!(response.get("patch").is_none());
}

#[tokio::test]
async fn test_malformed_object_is_reported_with_uid() {
    let harness = Harness::new();
    let body = review_body(
        "admission.k8s.io/v1",
        "uid-bad",
        ("", "v1", "Pod"),
        Some("default"),
        json!({"apiVersion": "v1", "kind": "Pod", "spec": {"containers": {"image": "nginx"}}}),
    );

    let review = harness.review(body).await;

    let response = response_of(&review);
    assert_eq!(response["uid"], "uid-bad");
    assert_eq!(response["allowed"], false);
    assert!(
        response["status"]["message"]
            .as_str()
            .unwrap()
            .starts_with("could not unmarshal raw Pod object")
    );
    assert!(response.get("patch").is_none());
    assert!(response.get("patchType").is_none());
}

#[tokio::test]
async fn test_v1beta1_envelope_is_echoed() {
    let harness = Harness::new();
    let pod = PodBuilder::new("web").namespace("default").container("web", "nginx").build();
    let body = review_body(
        "admission.k8s.io/v1beta1",
        "uid-beta",
        ("", "v1", "Pod"),
        Some("default"),
        serde_json::to_value(&pod).unwrap(),
    );

    let review = harness.review(body).await;

    assert_eq!(review["apiVersion"], "admission.k8s.io/v1beta1");
    assert_eq!(response_of(&review)["uid"], "uid-beta");
    assert!(patch_of(&review).is_some());
}

#[tokio::test]
async fn test_configured_target_image() {
    let harness = Harness::with_args(&["--target-image", "alpine:3.20"]);
    let pod = PodBuilder::new("web")
        .namespace("default")
        .containers(2, "nginx")
        .build();

    let review = harness.review(pod_review("uid", &pod)).await;

    let patch = patch_of(&review).unwrap();
    assert_eq!(patch[0]["value"], "alpine:3.20");
    assert_eq!(patch[1]["value"], "alpine:3.20");
}

#[tokio::test]
async fn test_metrics_record_outcomes() {
    let harness = Harness::new();
    let pod = PodBuilder::new("web").namespace("default").container("web", "nginx").build();

    harness.review(pod_review("uid-1", &pod)).await;
    harness.review(b"[]".to_vec()).await;
    harness.post(Some("text/plain"), Vec::new()).await;

    let metrics = harness.health.metrics.encode();
    assert!(metrics.contains("admission_requests_total{outcome=\"patched\"} 1"));
    assert!(metrics.contains("admission_requests_total{outcome=\"decode_error\"} 1"));
    assert!(metrics.contains("admission_requests_total{outcome=\"rejected\"} 1"));
    assert!(metrics.contains("admission_patch_operations_count 1"));
}
