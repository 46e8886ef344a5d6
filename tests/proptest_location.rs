//! Property tests for location parsing and cache entry naming.

use proptest::prelude::*;

use gridfetch::{DiskCache, Location, SourceKind};

proptest! {
    /// Arbitrary input never panics: it parses or fails cleanly.
    #[test]
    fn location_new_never_panics(input in ".{0,200}") {
        let _ = Location::new(&input);
    }

    /// http(s) inputs that parse always come out as network locations.
    #[test]
    fn http_inputs_infer_network_kind(host in "[a-z]{1,12}", path in "[a-z0-9/_.-]{0,40}") {
        let input = format!("https://{host}.example/{path}");
        if let Ok(location) = Location::new(&input) {
            prop_assert_eq!(location.kind(), SourceKind::PublicNetwork);
        }
    }

    /// Entry file names are flat: no separators, no traversal, bounded
    /// length, and stable for equal keys.
    #[test]
    fn cache_entry_names_are_flat_and_stable(path in "[ -~]{1,80}") {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DiskCache::new(dir.path()).expect("cache");

        let input = format!("https://example.org/{path}");
        if let Ok(location) = Location::new(&input) {
            let entry = cache.entry_path(&location);
            prop_assert_eq!(entry.parent(), Some(dir.path()));

            let name = entry.file_name().expect("name").to_string_lossy().into_owned();
            prop_assert!(!name.contains('/'));
            prop_assert!(name.len() <= 9 + 64);

            let again = Location::new(&input).expect("reparse");
            prop_assert_eq!(cache.entry_path(&again), entry);
        }
    }

    /// Distinct URLs land on distinct entries in practice (crc plus tail).
    #[test]
    fn distinct_paths_rarely_collide(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
        prop_assume!(a != b);
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DiskCache::new(dir.path()).expect("cache");

        let loc_a = Location::new(&format!("https://example.org/{a}.nc")).expect("parse a");
        let loc_b = Location::new(&format!("https://example.org/{b}.nc")).expect("parse b");
        prop_assert_ne!(cache.entry_path(&loc_a), cache.entry_path(&loc_b));
    }
}
