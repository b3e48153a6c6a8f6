// URL classification: which kind of business-profile page a URL points at.
// Pure string/URL inspection, no HTTP.

use url::Url;

use crate::types::Classification;

/// Confidence for a known profile host whose path looks like a company page.
pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
/// Confidence for a known profile host with an ambiguous path.
pub const PARTIAL_MATCH_CONFIDENCE: f64 = 0.5;
/// Confidence for any other valid http(s) URL.
pub const GENERIC_CONFIDENCE: f64 = 0.3;

struct ProfileHost {
    domain: &'static str,
    classification: Classification,
    /// Lower-cased path prefixes that precede the company identifier.
    profile_paths: &'static [&'static str],
}

const PROFILE_HOSTS: &[ProfileHost] = &[
    ProfileHost {
        domain: "linkedin.com",
        classification: Classification::LinkedInCompany,
        profile_paths: &["/company/", "/showcase/"],
    },
    ProfileHost {
        domain: "crunchbase.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/organization/"],
    },
    ProfileHost {
        domain: "zoominfo.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/c/"],
    },
    ProfileHost {
        domain: "bloomberg.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/profile/company/"],
    },
    ProfileHost {
        domain: "pitchbook.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/profiles/company/"],
    },
    ProfileHost {
        domain: "owler.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/company/"],
    },
    ProfileHost {
        domain: "glassdoor.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/overview/"],
    },
    ProfileHost {
        domain: "dnb.com",
        classification: Classification::OtherProfile,
        profile_paths: &["/business-directory/company-profiles."],
    },
];

/// Parse an absolute http(s) URL with a host. Anything else is not fetchable.
pub fn parse_web_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(parsed),
        _ => None,
    }
}

/// Classify a URL and report how confident the classification is.
/// Never fails: unparsable input is `Invalid` with confidence 0.0.
pub fn classify(raw: &str) -> (Classification, f64) {
    let Some(parsed) = parse_web_url(raw) else {
        return (Classification::Invalid, 0.0);
    };
    let host = normalized_host(&parsed);
    let path = parsed.path().to_lowercase();

    let matches: Vec<&ProfileHost> = PROFILE_HOSTS
        .iter()
        .filter(|p| host_matches(&host, p.domain))
        .collect();

    match matches.as_slice() {
        [] => (Classification::Generic, GENERIC_CONFIDENCE),
        [profile] if company_identifier(profile, &path).is_some() => {
            (profile.classification, EXACT_MATCH_CONFIDENCE)
        }
        [profile, ..] => (profile.classification, PARTIAL_MATCH_CONFIDENCE),
    }
}

/// The company identifier in a profile URL, e.g. `acme-corp` for
/// `https://www.linkedin.com/company/acme-corp/about`.
pub fn profile_slug(raw: &str) -> Option<String> {
    let parsed = parse_web_url(raw)?;
    let host = normalized_host(&parsed);
    let path = parsed.path().to_lowercase();
    PROFILE_HOSTS
        .iter()
        .filter(|p| host_matches(&host, p.domain))
        .find_map(|p| company_identifier(p, &path))
}

/// Normalize a URL for deduplication: lower-cased scheme, host and path,
/// trailing slash stripped, query string and fragment removed.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = parse_web_url(raw)?;
    let host = normalized_host(&parsed);
    let port = parsed
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    let path = parsed.path().to_lowercase();
    let path = path.trim_end_matches('/');
    Some(format!("{}://{}{}{}", parsed.scheme(), host, port, path))
}

fn normalized_host(parsed: &Url) -> String {
    parsed
        .host_str()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_lowercase()
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn company_identifier(profile: &ProfileHost, path: &str) -> Option<String> {
    profile.profile_paths.iter().find_map(|prefix| {
        let rest = path.strip_prefix(prefix)?;
        let ident = rest.split('/').next().unwrap_or_default();
        (!ident.is_empty()).then(|| ident.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_company_page_is_exact() {
        assert_eq!(
            classify("https://www.linkedin.com/company/acme-corp/"),
            (Classification::LinkedInCompany, 1.0)
        );
        assert_eq!(
            classify("https://linkedin.com/showcase/acme-cloud"),
            (Classification::LinkedInCompany, 1.0)
        );
    }

    #[test]
    fn linkedin_non_company_path_is_partial() {
        assert_eq!(
            classify("https://www.linkedin.com/in/jane-doe"),
            (Classification::LinkedInCompany, 0.5)
        );
        assert_eq!(
            classify("https://www.linkedin.com/company/"),
            (Classification::LinkedInCompany, 0.5)
        );
    }

    #[test]
    fn other_profile_hosts() {
        assert_eq!(
            classify("https://www.crunchbase.com/organization/acme"),
            (Classification::OtherProfile, 1.0)
        );
        assert_eq!(
            classify("https://www.zoominfo.com/c/acme-corp/123456"),
            (Classification::OtherProfile, 1.0)
        );
        assert_eq!(
            classify("https://www.dnb.com/business-directory/company-profiles.acme_corp.html"),
            (Classification::OtherProfile, 1.0)
        );
        assert_eq!(
            classify("https://www.crunchbase.com/discover"),
            (Classification::OtherProfile, 0.5)
        );
    }

    #[test]
    fn lookalike_hosts_are_generic() {
        assert_eq!(
            classify("https://notlinkedin.com/company/acme"),
            (Classification::Generic, GENERIC_CONFIDENCE)
        );
        assert_eq!(
            classify("https://linkedin.com.evil.io/company/acme"),
            (Classification::Generic, GENERIC_CONFIDENCE)
        );
    }

    #[test]
    fn company_website_is_generic() {
        assert_eq!(
            classify("https://acme.com/about"),
            (Classification::Generic, GENERIC_CONFIDENCE)
        );
    }

    #[test]
    fn malformed_urls_are_invalid() {
        for raw in ["", "acme.com", "not a url", "mailto:info@acme.com", "ftp://acme.com", "http://"] {
            assert_eq!(classify(raw), (Classification::Invalid, 0.0), "{raw}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let url = "https://uk.linkedin.com/company/acme?trk=foo";
        let first = classify(url);
        for _ in 0..10 {
            assert_eq!(classify(url), first);
        }
        assert_eq!(first, (Classification::LinkedInCompany, 1.0));
    }

    #[test]
    fn normalize_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize_url("HTTPS://WWW.LinkedIn.com/Company/Acme/?trk=abc#top").as_deref(),
            Some("https://www.linkedin.com/company/acme")
        );
        assert_eq!(
            normalize_url("https://acme.com/").as_deref(),
            Some("https://acme.com")
        );
        assert_eq!(
            normalize_url("http://localhost:8080/x/").as_deref(),
            Some("http://localhost:8080/x")
        );
        assert_eq!(normalize_url("nope"), None);
    }

    #[test]
    fn slug_is_extracted_from_profile_paths() {
        assert_eq!(
            profile_slug("https://www.linkedin.com/company/acme-corp/about/").as_deref(),
            Some("acme-corp")
        );
        assert_eq!(
            profile_slug("https://www.crunchbase.com/organization/acme").as_deref(),
            Some("acme")
        );
        assert_eq!(profile_slug("https://acme.com/company/acme"), None);
    }
}
