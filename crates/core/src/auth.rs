//! AuthPolicy: two pure predicates, no I/O, called synchronously
//! by IntakeCoordinator and the read endpoints.

use blogpipe_common::normalize;
use blogpipe_common::types::Publisher;

/// `host(url)` equals `publisher.domain` or is a subdomain of it (suffix
/// match on a dot boundary, so `evil-example.com` does not match
/// `example.com`).
pub fn domain_matches(url: &str, publisher: &Publisher) -> bool {
    let host = normalize::host_of(url);
    let domain = publisher.domain.as_str();

    host == domain || host.ends_with(&format!(".{domain}"))
}

/// True if `publisher.config.whitelisted_blog_urls` is empty, or `url`
/// matches at least one configured glob pattern.
pub fn url_whitelisted(url: &str, publisher: &Publisher) -> bool {
    blogpipe_common::whitelist::url_whitelisted(url, &publisher.config.whitelisted_blog_urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogpipe_common::config::PublisherConfig;
    use blogpipe_common::types::PublisherStatus;
    use chrono::Utc;

    fn publisher(domain: &str, whitelist: Vec<String>) -> Publisher {
        let mut config = PublisherConfig::default();
        config.whitelisted_blog_urls = whitelist;
        Publisher {
            id: Default::default(),
            name: "test".into(),
            domain: domain.into(),
            email: "a@b.com".into(),
            status: PublisherStatus::Trial,
            config,
            total_blogs_processed: 0,
            blog_slots_reserved: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exact_domain_matches() {
        let p = publisher("example.com", vec![]);
        assert!(domain_matches("https://example.com/a", &p));
    }

    #[test]
    fn subdomain_matches() {
        let p = publisher("example.com", vec![]);
        assert!(domain_matches("https://blog.example.com/a", &p));
    }

    #[test]
    fn lookalike_domain_does_not_match() {
        let p = publisher("example.com", vec![]);
        assert!(!domain_matches("https://evil-example.com/a", &p));
    }

    #[test]
    fn empty_whitelist_accepts_any_url() {
        let p = publisher("example.com", vec![]);
        assert!(url_whitelisted("https://example.com/anything", &p));
    }

    #[test]
    fn nonempty_whitelist_requires_a_match() {
        let p = publisher("example.com", vec!["https://example.com/blog/*".into()]);
        assert!(url_whitelisted("https://example.com/blog/post-1", &p));
        assert!(!url_whitelisted("https://example.com/news/post-1", &p));
    }
}
