//! Property-based tests for scope handling.

mod common;

use oauth2_server::Config;
use oauth2_server::models::{Scope, unix_now};
use proptest::prelude::*;

use common::*;

/// Generate a scope of up to six tokens from a small vocabulary.
fn arb_scope() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(vec!["read", "write", "admin", "email", "profile", "openid"], 0..=6)
}

proptest! {
    /// Parsing is insensitive to order, duplicates and extra spaces.
    #[test]
    fn scope_parse_is_canonical(tokens in arb_scope()) {
        let forward = Scope::parse(&tokens.join(" "));
        let mut reversed = tokens.clone();
        reversed.reverse();
        let noisy = Scope::parse(&format!("  {}  {} ", reversed.join("  "), tokens.join(" ")));

        prop_assert_eq!(&forward, &noisy);
        prop_assert_eq!(forward.len(), tokens.len());
        prop_assert_eq!(Scope::parse(&forward.to_string()), forward);
    }

    /// Subset is reflexive and the empty scope is a subset of everything.
    #[test]
    fn scope_subset_laws(tokens in arb_scope()) {
        let scope = Scope::parse(&tokens.join(" "));
        prop_assert!(scope.is_subset_of(&scope));
        prop_assert!(Scope::default().is_subset_of(&scope));
        prop_assert!(scope.contains_all(&Scope::default()));
    }

    /// A refresh grant succeeds exactly when the requested scope is a subset of
    /// the granted one.
    #[test]
    fn refresh_never_escalates(granted in arb_scope(), requested in arb_scope()) {
        prop_assume!(!requested.is_empty());
        let granted = Scope::parse(&granted.join(" "));
        let requested_scope = Scope::parse(&requested.join(" "));

        let response = tokio_test::block_on(async {
            let server = test_server(Config::for_testing()).await;
            seed_refresh_token(&server, "rt1", CLIENT_ID, &granted.to_string(), unix_now() + 3600).await;
            server
                .handle_token_request(&refresh_request("rt1").with_body("scope", &requested.join(" ")))
                .await
        });

        if requested_scope.is_subset_of(&granted) {
            prop_assert_eq!(response.status(), 200);
            let requested_scope_str = requested_scope.to_string();
            prop_assert_eq!(response.parameter("scope"), Some(requested_scope_str.as_str()));
        } else {
            prop_assert_eq!(response.parameter("error"), Some("invalid_scope"));
        }
    }
}
