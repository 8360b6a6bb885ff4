//! Glob patterns for the exclusion list.
//!
//! Only `*` is special: it matches any run of characters, including `/`
//! and `?`. Everything else is literal and the pattern is anchored at both
//! ends.

use regex::Regex;
use swcache_core::Error;

/// Translate a glob into an anchored regular expression.
pub fn glob_to_regex(glob: &str) -> Result<Regex, Error> {
    let body = glob.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| Error::InvalidPattern(format!("{glob}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_anchored() {
        let re = glob_to_regex("/login").unwrap();
        assert!(re.is_match("/login"));
        assert!(!re.is_match("/login/x"));
        assert!(!re.is_match("/app/login"));
    }

    #[test]
    fn test_star_matches_anything() {
        let re = glob_to_regex("/login*").unwrap();
        assert!(re.is_match("/login"));
        assert!(re.is_match("/login?x=1"));
        assert!(re.is_match("/login/step/2"));
        assert!(!re.is_match("/logi"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let re = glob_to_regex("/api/v1.0/(x)+*").unwrap();
        assert!(re.is_match("/api/v1.0/(x)+/users"));
        assert!(!re.is_match("/api/v1x0/(x)+/users"));
        assert_eq!(re.as_str(), r"^/api/v1\.0/\(x\)\+.*$");
    }

    #[test]
    fn test_inner_star() {
        let re = glob_to_regex("/users/*/settings").unwrap();
        assert!(re.is_match("/users/42/settings"));
        assert!(!re.is_match("/users/42/profile"));
    }
}
