//! Property tests for URL canonicalization: idempotence and tracking
//! parameter removal over generated inputs.

use proptest::prelude::*;

use news_verification_backend::services::processing::canonicalize_url;

proptest! {
    #[test]
    fn canonicalization_is_idempotent(
        host in "[a-z][a-z0-9]{2,10}",
        path in "[a-zA-Z0-9/]{0,24}",
        utm_value in "[a-z0-9]{0,8}",
        query_value in "[a-z0-9]{0,8}",
    ) {
        let url = format!(
            "https://{host}.com/{path}?utm_source={utm_value}&q={query_value}&fbclid=zzz#section"
        );
        let once = canonicalize_url(&url).unwrap();
        let twice = canonicalize_url(&once).unwrap();
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn canonicalization_strips_tracking_params(
        host in "[a-z][a-z0-9]{2,10}",
        utm_value in "[a-z0-9]{1,8}",
    ) {
        let url = format!(
            "https://{host}.com/story?utm_campaign={utm_value}&gclid=123&fbclid=abc"
        );
        let canonical = canonicalize_url(&url).unwrap();
        prop_assert!(!canonical.contains("utm_"));
        prop_assert!(!canonical.contains("gclid"));
        prop_assert!(!canonical.contains("fbclid"));
        prop_assert!(!canonical.contains('#'));
        prop_assert!(!canonical.ends_with('/'));
    }

    #[test]
    fn canonicalization_lowercases_host(
        host in "[A-Za-z][A-Za-z0-9]{2,10}",
    ) {
        let url = format!("https://{host}.COM/Story");
        let canonical = canonicalize_url(&url).unwrap();
        let parsed = url::Url::parse(&canonical).unwrap();
        let stored_host = parsed.host_str().unwrap();
        prop_assert_eq!(stored_host, stored_host.to_lowercase());
        // Path case is preserved; only the host folds.
        prop_assert!(canonical.contains("/Story"));
    }
}
