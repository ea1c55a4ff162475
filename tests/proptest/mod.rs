// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for pod-image-webhook.
//!
//! Uses proptest to generate random Pods and annotations and verify the
//! admission invariants.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::fixtures::{PodBuilder, pod_review};
use pod_image_webhook::webhooks::policies::{MUTATE_ANNOTATION, STATUS_ANNOTATION};
use pod_image_webhook::webhooks::{
    MutationPolicy, Mutator, PatchGenerator, Review, SchemeRegistry,
};

fn mutator() -> Mutator {
    Mutator::new(
        Arc::new(SchemeRegistry::new()),
        MutationPolicy::default(),
        PatchGenerator::new("debian"),
    )
}

fn patch_of(review: &Review) -> Option<serde_json::Value> {
    review
        .response
        .as_ref()
        .and_then(|r| r.patch.as_deref())
        .map(|p| serde_json::from_slice(p).unwrap())
}

/// Strategy for namespaces outside the ignored set.
fn user_namespace() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}".prop_filter("not a system namespace", |ns| {
        ns != "kube-system" && ns != "kube-public"
    })
}

/// Strategy for the ignored namespaces.
fn system_namespace() -> impl Strategy<Value = String> {
    prop_oneof![Just("kube-system".to_string()), Just("kube-public".to_string())]
}

/// Strategy for mutate-annotation values that opt out, in random case.
fn negative_token() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("n"), Just("no"), Just("false"), Just("off")],
        any::<u32>(),
    )
        .prop_map(|(token, mask)| {
            token
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    if mask & (1 << i) != 0 {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    }
                })
                .collect()
        })
}

/// Strategy for correlation identifiers.
fn correlation_uid() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}"
}

proptest! {
    /// Property: N containers yield N+1 operations, replaces in index order, add last.
    #[test]
    fn test_patch_shape(namespace in user_namespace(), containers in 0usize..12) {
        let pod = PodBuilder::new("web")
            .namespace(namespace)
            .containers(containers, "nginx")
            .build();
        let review = mutator().review(&pod_review("uid", &pod)).review;

        let patch = patch_of(&review).unwrap();
        let ops = patch.as_array().unwrap();
        prop_assert_eq!(ops.len(), containers + 1);
        for (i, op) in ops.iter().take(containers).enumerate() {
            prop_assert_eq!(&op["op"], "replace");
            prop_assert_eq!(op["path"].as_str().unwrap(), format!("/spec/containers/{i}/image"));
        }
        let last = &ops[containers];
        prop_assert_eq!(&last["op"], "add");
        prop_assert_eq!(&last["path"], "/metadata/annotations");
        prop_assert_eq!(&last["value"][STATUS_ANNOTATION], "mutated");
    }

    /// Property: the response UID always equals the request UID.
    #[test]
    fn test_uid_echoed(uid in correlation_uid(), namespace in prop_oneof![user_namespace(), system_namespace()]) {
        let pod = PodBuilder::new("web").namespace(namespace).container("web", "nginx").build();
        let review = mutator().review(&pod_review(&uid, &pod)).review;
        prop_assert_eq!(&review.response.unwrap().uid, &uid);
    }

    /// Property: ignored namespaces are allowed without a patch, whatever the annotations.
    #[test]
    fn test_system_namespace_never_patched(
        namespace in system_namespace(),
        mutate in "[a-zA-Z]{0,6}",
        containers in 0usize..5,
    ) {
        let pod = PodBuilder::new("web")
            .namespace(namespace)
            .containers(containers, "nginx")
            .annotation(MUTATE_ANNOTATION, mutate)
            .build();
        let review = mutator().review(&pod_review("uid", &pod)).review;
        let response = review.response.as_ref().unwrap();
        prop_assert!(response.allowed);
        prop_assert!(patch_of(&review).is_none());
        prop_assert!(serde_json::to_value(response).unwrap().get("patchType").is_none());
    }

    /// Property: negative tokens in any case opt out.
    #[test]
    fn test_negative_tokens_opt_out(namespace in user_namespace(), token in negative_token()) {
        let pod = PodBuilder::new("web")
            .namespace(namespace)
            .container("web", "nginx")
            .annotation(MUTATE_ANNOTATION, token)
            .build();
        let review = mutator().review(&pod_review("uid", &pod)).review;
        prop_assert!(review.response.as_ref().unwrap().allowed);
        prop_assert!(patch_of(&review).is_none());
    }

    /// Property: applying the patch and re-submitting yields no patch.
    #[test]
    fn test_idempotent(namespace in user_namespace(), containers in 0usize..6) {
        let pod = PodBuilder::new("web")
            .namespace(namespace)
            .containers(containers, "nginx")
            .build();
        let first = mutator().review(&pod_review("uid", &pod)).review;

        let mut doc = serde_json::to_value(&pod).unwrap();
        let patch: json_patch::Patch = serde_json::from_value(patch_of(&first).unwrap()).unwrap();
        json_patch::patch(&mut doc, &patch.0).unwrap();
        let patched: k8s_openapi::api::core::v1::Pod = serde_json::from_value(doc).unwrap();

        let second = mutator().review(&pod_review("uid", &patched)).review;
        prop_assert!(second.response.as_ref().unwrap().allowed);
        prop_assert!(patch_of(&second).is_none());
    }

    /// Property: arbitrary bytes never panic and always produce a response.
    #[test]
    fn test_arbitrary_body_always_answers(body in proptest::collection::vec(any::<u8>(), 0..256)) {
        let review = mutator().review(&body).review;
        prop_assert!(review.response.is_some());
        prop_assert_eq!(review.types.kind.as_str(), "AdmissionReview");
    }
}
