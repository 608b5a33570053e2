//! Access control integration tests
//!
//! Covers group closure ordering, rule precedence within a group, group
//! precedence across the closure, and storage prefix resolution.

use gitward::PolicyDocument;
use gitward::access_control::{
    AccessResolver, MatchStrategy, Mode, have_access, membership_closure,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn doc(text: &str) -> PolicyDocument {
    text.parse().unwrap()
}

fn closure(policy: &PolicyDocument, identity: &str) -> Vec<String> {
    membership_closure(policy, identity).unwrap().collect()
}

// =============================================================================
// 1. Group closure
// =============================================================================

mod group_closure {
    use super::*;

    #[test]
    fn test_nested_groups_depth_first() {
        let policy = doc("\
@a = alice
@b = @a
@c = @b
@d = bob
");
        assert_eq!(closure(&policy, "alice"), vec!["@a", "@b", "@c", "@all"]);
        assert_eq!(closure(&policy, "bob"), vec!["@d", "@all"]);
    }

    #[test]
    fn test_unknown_identity_only_all() {
        let policy = doc("@dev = alice\n");
        assert_eq!(closure(&policy, "nobody"), vec!["@all"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let policy = doc("\
@x = alice @y
@y = @x
");
        let groups = closure(&policy, "alice");
        assert_eq!(groups, vec!["@x", "@y", "@all"]);
    }

    #[test]
    fn test_each_group_once() {
        let policy = doc("\
@a = alice
@b = alice @a
@c = @a @b
");
        let groups = closure(&policy, "alice");
        let mut unique = groups.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(groups.len(), unique.len());
        assert_eq!(groups.last().map(String::as_str), Some("@all"));
    }
}

// =============================================================================
// 2. Rule precedence
// =============================================================================

mod rule_precedence {
    use super::*;

    const POLICY: &str = "\
@dev = alice
repo @dev
    RW+ = exact
    map RW+ exact = not-used
    map RW+ mapped = physical/mapped
    RW+_regex = ^mapped ^rx/
";

    #[test]
    fn test_exact_first() {
        let policy = doc(POLICY);
        let grant = have_access(&policy, "alice", Mode::Write, "exact")
            .unwrap()
            .unwrap();
        assert_eq!(grant.strategy, MatchStrategy::Exact);
        assert_eq!(grant.path, "exact");
    }

    #[test]
    fn test_mapping_before_regex() {
        let policy = doc(POLICY);
        let grant = have_access(&policy, "alice", Mode::Write, "mapped")
            .unwrap()
            .unwrap();
        assert_eq!(grant.strategy, MatchStrategy::Mapping);
        assert_eq!(grant.path, "physical/mapped");
    }

    #[test]
    fn test_regex_last() {
        let policy = doc(POLICY);
        let grant = have_access(&policy, "alice", Mode::Write, "rx/tool.git")
            .unwrap()
            .unwrap();
        assert_eq!(grant.strategy, MatchStrategy::Regex);
        assert_eq!(grant.path, "rx/tool");
    }

    #[test]
    fn test_modes_are_independent() {
        let policy = doc(POLICY);
        assert!(
            have_access(&policy, "alice", Mode::Read, "exact")
                .unwrap()
                .is_none()
        );
    }
}

// =============================================================================
// 3. Group precedence and prefixes
// =============================================================================

mod group_precedence {
    use super::*;

    #[test]
    fn test_closure_order_decides() {
        let policy = doc("\
@inner = alice
@outer = @inner
repo @outer
    map R shared = outer-copy
repo @inner
    map R shared = inner-copy
");
        let grant = have_access(&policy, "alice", Mode::Read, "shared")
            .unwrap()
            .unwrap();
        assert_eq!(grant.group, "@inner");
        assert_eq!(grant.path, "inner-copy");
    }

    #[test]
    fn test_all_consulted_last() {
        let policy = doc("\
@dev = alice
repo @all
    map R docs = public-docs
repo @dev
    map R docs = dev-docs
");
        let grant = have_access(&policy, "alice", Mode::Read, "docs")
            .unwrap()
            .unwrap();
        assert_eq!(grant.path, "dev-docs");

        let grant = have_access(&policy, "guest", Mode::Read, "docs")
            .unwrap()
            .unwrap();
        assert_eq!(grant.path, "public-docs");
    }

    #[test]
    fn test_default_prefix() {
        let policy = doc("repo @all\n    R = x\n");
        let grant = have_access(&policy, "anyone", Mode::Read, "x")
            .unwrap()
            .unwrap();
        assert_eq!(grant.prefix, "repositories");
    }

    #[test]
    fn test_group_prefix_overrides_global() {
        let policy = doc("\
gitosis
    repositories = /srv/global
@dev = alice
repo @dev
    R = x
    repositories = /srv/dev
");
        let grant = have_access(&policy, "alice", Mode::Read, "x")
            .unwrap()
            .unwrap();
        assert_eq!(grant.prefix, "/srv/dev");
    }

    #[test]
    fn test_resolve_read_falls_back() {
        let policy = doc("@dev = alice\nrepo @dev\n    R = ro\n    RW+ = rw\n");
        let resolver = AccessResolver::new(&policy);

        assert_eq!(
            resolver.resolve_read("alice", "ro").unwrap().unwrap().path,
            "ro"
        );
        assert_eq!(
            resolver.resolve_read("alice", "rw").unwrap().unwrap().path,
            "rw"
        );
        assert!(resolver.resolve_read("bob", "ro").unwrap().is_none());
    }
}
