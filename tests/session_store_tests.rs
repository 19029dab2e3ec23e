use portal_gate::session::{
    FileSessionStore, MemorySessionStore, Right, Rights, SessionRecord, SessionStore,
    parse_session,
};

#[cfg(test)]
mod parse_tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let raw = r#"{"token":"abc","login":"ivanov","fio":"Иванов И.И.","rights":{"Студенты":true,"Анализ":false}}"#;
        let session = parse_session(raw).expect("well-formed record");

        assert_eq!(session.token(), Some("abc"));
        assert_eq!(session.login.as_deref(), Some("ivanov"));
        assert!(session.rights.grants(Right::Students));
        assert!(!session.rights.grants(Right::Analysis));
        assert!(!session.rights.grants(Right::Contracts));
    }

    #[test]
    fn test_malformed_values_read_as_absent() {
        let malformed = [
            "",
            "   ",
            "not json",
            "{\"token\":",
            "null",
            "42",
            "\"abc\"",
            "[]",
            "[\"abc\", \"login\"]",
            "true",
            r#"{"token": 123}"#,
            r#"{"rights": ["Студенты"]}"#,
            r#"{"rights": {"Студенты": "yes"}}"#,
            r#"{"login": {"nested": true}}"#,
        ];

        for raw in malformed {
            assert_eq!(parse_session(raw), None, "expected {raw:?} to read as absent");
        }
    }

    #[test]
    fn test_unknown_rights_are_ignored() {
        let session = parse_session(r#"{"token":"t","rights":{"Склад":true,"Договора":true}}"#)
            .expect("unknown right names do not make the record malformed");

        assert!(session.rights.grants(Right::Contracts));
        assert_eq!(session.rights.granted().collect::<Vec<_>>(), vec![Right::Contracts]);
    }

    #[test]
    fn test_null_rights_read_as_empty_table() {
        let session = parse_session(r#"{"login":"petrov","rights":null}"#).expect("valid record");
        assert_eq!(session.rights, Rights::default());
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_empty_strings_do_not_authenticate() {
        let session = parse_session(r#"{"token":"","login":"","fio":""}"#).expect("valid record");
        assert_eq!(session.token(), None);
        assert!(!session.is_authenticated());

        let by_name = parse_session(r#"{"fio":"Сидоров"}"#).expect("valid record");
        assert!(by_name.is_authenticated());
    }

    #[test]
    fn test_rights_serialize_with_backend_names() {
        let session = SessionRecord {
            rights: Rights::default().with(Right::Analysis, true),
            ..SessionRecord::with_token("abc")
        };
        let encoded = serde_json::to_value(&session).unwrap();

        assert_eq!(encoded["token"], "abc");
        assert_eq!(encoded["rights"]["Анализ"], true);
        assert!(encoded.get("login").is_none());
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[test]
    fn test_empty_store_has_no_session() {
        let store = MemorySessionStore::new();
        assert_eq!(store.read_session(), None);
    }

    #[test]
    fn test_write_then_read() {
        let store = MemorySessionStore::new();
        let session = SessionRecord::with_token("abc");

        store.write_session(&session).unwrap();

        assert_eq!(store.read_session(), Some(session));
    }

    #[test]
    fn test_corrupted_raw_value_reads_as_absent() {
        let store = MemorySessionStore::with_raw("{broken");
        assert_eq!(store.read_session(), None);
        // The raw value is left untouched; only interpretation fails.
        assert_eq!(store.raw().as_deref(), Some("{broken"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = MemorySessionStore::with_session(&SessionRecord::with_token("abc"));
        store.clear_session();
        store.clear_session();
        assert_eq!(store.read_session(), None);
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert_eq!(store.read_session(), None);
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));
        let session = SessionRecord {
            login: Some("ivanov".to_string()),
            rights: Rights::default().with(Right::Teachers, true),
            ..SessionRecord::with_token("abc")
        };

        store.write_session(&session).unwrap();

        assert!(store.path().ends_with("user.json"));
        assert_eq!(store.read_session(), Some(session));
    }

    #[test]
    fn test_no_caching_between_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.write_session(&SessionRecord::with_token("first")).unwrap();
        assert_eq!(store.read_session().unwrap().token(), Some("first"));

        // Another writer (a second window, the login form) replaces the file.
        fs::write(store.path(), r#"{"token":"second"}"#).unwrap();
        assert_eq!(store.read_session().unwrap().token(), Some("second"));
    }

    #[test]
    fn test_corrupted_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        fs::write(store.path(), b"\xff\xfe garbage").unwrap();
        assert_eq!(store.read_session(), None);

        fs::write(store.path(), "null").unwrap();
        assert_eq!(store.read_session(), None);
    }

    #[test]
    fn test_clear_removes_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.write_session(&SessionRecord::with_token("abc")).unwrap();

        store.clear_session();
        assert!(!store.path().exists());

        // Clearing again must not panic.
        store.clear_session();
        assert_eq!(store.read_session(), None);
    }
}
