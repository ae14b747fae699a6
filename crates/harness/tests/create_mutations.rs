use libris_core::{ConflictFields, CoreError, FieldValue, Record, RecordFields, sqlstate};
use libris_engine::EngineError;
use libris_harness::TestLibrary;
use libris_storage::{Storage, StorageError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.into())
}

// ============================================================================
// Conflict Variants
// ============================================================================

#[test]
fn duplicate_primary_key_resolves_to_isbn_conflict() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut library = TestLibrary::new()?;
    let first = library.engine.create_book("123", "Dune")?;
    assert_eq!(first.result.typename(), "Book");

    let second = library.engine.create_book("123", "Dune Messiah")?;
    assert_eq!(second.result.typename(), "BookIsbnConflict");
    assert!(second.record().is_none());
    assert_eq!(second.result.constraint_name(), Some("books_pkey"));
    assert_eq!(second.result.code(), Some(sqlstate::UNIQUE_VIOLATION));
    let message = second.result.message().ok_or("conflict has no message")?;
    assert!(message.contains("123"), "message should mention the key: {message}");
    assert_eq!(second.result.resolve_field("isbn"), Some(text("123")));

    assert_eq!(library.count("books")?, 1);
    Ok(())
}

#[test]
fn violated_unique_constraint_picks_its_own_variant() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut library = TestLibrary::new()?;
    library.engine.register_user("alice", "alice@example.com", None)?;

    let taken_username = library
        .engine
        .register_user("alice", "other@example.com", None)?;
    assert_eq!(taken_username.result.typename(), "UserUsernameConflict");
    assert_eq!(taken_username.result.constraint_name(), Some("unique_user_username"));
    assert_eq!(
        taken_username.result.detail(),
        Some("Key (username)=(alice) already exists.")
    );

    let taken_email = library
        .engine
        .register_user("bob", "alice@example.com", None)?;
    assert_eq!(taken_email.result.typename(), "UserEmailConflict");
    assert_eq!(taken_email.result.resolve_field("email"), Some(text("alice@example.com")));
    assert_eq!(taken_email.result.resolve_field("username"), None);

    assert_eq!(library.count("users")?, 1);
    Ok(())
}

#[test]
fn back_to_back_inserts_of_same_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let first = library.engine.create_author("Ursula K. Le Guin")?;
    let second = library.engine.create_author("Ursula K. Le Guin")?;

    assert!(first.result.is_created());
    assert_eq!(first.result.typename(), "Author");
    assert!(second.result.is_conflict());
    assert_eq!(second.result.typename(), "AuthorNameConflict");
    assert_eq!(second.result.resolve_field("__typename"), Some(text("AuthorNameConflict")));
    Ok(())
}

#[test]
fn composite_primary_key_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    library.engine.create_book("978-0441013593", "Dune")?;
    let author = library.engine.create_author("Frank Herbert")?;
    let author_id = author
        .record()
        .and_then(|r| r.get("id"))
        .and_then(FieldValue::as_integer)
        .ok_or("author has no id")?;

    let credit = library.engine.add_book_author("978-0441013593", author_id)?;
    assert_eq!(credit.result.typename(), "BookAuthor");

    let again = library.engine.add_book_author("978-0441013593", author_id)?;
    assert_eq!(again.result.typename(), "BookAuthorBookIsbnAuthorIdConflict");
    assert_eq!(again.result.constraint_name(), Some("book_authors_pkey"));
    assert_eq!(again.result.resolve_field("authorId"), Some(FieldValue::Integer(author_id)));
    Ok(())
}

// ============================================================================
// Propagated Failures
// ============================================================================

#[test]
fn check_violation_propagates() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut library = TestLibrary::new()?;
    let err = library.engine.create_book("42", "").unwrap_err();

    match err {
        EngineError::Storage(StorageError::Database(raw)) => {
            assert_eq!(raw.code, sqlstate::CHECK_VIOLATION);
            assert_eq!(raw.constraint.as_deref(), Some("books_title_check"));
        }
        other => panic!("expected a propagated CHECK failure, got {other:?}"),
    }
    assert_eq!(library.count("books")?, 0);
    Ok(())
}

#[test]
fn not_null_violation_propagates() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let err = library
        .create("users", vec![("username", text("carol"))])
        .unwrap_err();
    let raw = err
        .storage()
        .and_then(StorageError::raw_error)
        .ok_or("expected a database error")?;
    assert_eq!(raw.code, sqlstate::NOT_NULL_VIOLATION);
    Ok(())
}

#[test]
fn foreign_key_violation_propagates() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let err = library.engine.add_book_author("no-such-book", 7).unwrap_err();
    let classification = library
        .engine
        .classify(err.storage().ok_or("expected a storage error")?);
    assert!(!classification.is_recognized());
    assert_eq!(
        err.storage().and_then(StorageError::raw_error).map(|r| r.code.as_str()),
        Some(sqlstate::FOREIGN_KEY_VIOLATION)
    );
    Ok(())
}

#[test]
fn unknown_entity_is_rejected_before_writing() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let err = library
        .create("shelves", vec![("label", text("fiction"))])
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::InvalidData(_))));
    Ok(())
}

#[test]
fn generated_column_values_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let err = library
        .create(
            "books",
            vec![
                ("isbn", text("5")),
                ("title", text("Lilith's Brood")),
                ("created_at", FieldValue::Timestamp(0)),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::GeneratedColumn { ref column, .. }) if column == "created_at"
    ));
    assert!(!library.engine.classify(err.storage().ok_or("expected a storage error")?).is_recognized());
    assert_eq!(library.count("books")?, 0);
    Ok(())
}

#[test]
fn unknown_column_propagates() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let err = library
        .create("books", vec![("isbn", text("1")), ("title", text("x")), ("colour", text("red"))])
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::UnknownColumn { .. })
    ));
    Ok(())
}

// ============================================================================
// Created Variant
// ============================================================================

#[test]
fn created_user_exposes_all_fields() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut library = TestLibrary::new()?;
    let payload = library
        .engine
        .register_user("dana", "dana@example.com", Some("Reads a lot"))?;

    assert_eq!(payload.result.typename(), "User");
    assert!(payload.result.conflict().is_none());
    assert_eq!(payload.result.message(), None);
    assert_eq!(payload.result.field("username"), Some(&text("dana")));

    let record = payload.record().ok_or("created user has no record")?;
    assert_eq!(record.get("username"), Some(&text("dana")));
    assert_eq!(record.get("email"), Some(&text("dana@example.com")));
    assert_eq!(record.get("bio"), Some(&text("Reads a lot")));
    assert!(record.get("id").and_then(FieldValue::as_integer).is_some());

    let created_at = payload
        .result
        .resolve_field("createdAt")
        .and_then(|v| v.as_timestamp())
        .ok_or("createdAt missing")?;
    assert!(created_at > 0);
    assert!(payload.result.resolve_field("updatedAt").is_some());

    let stored = library
        .engine
        .storage()
        .find_by("users", "username", &text("dana"))?;
    assert_eq!(stored.as_ref(), Some(record));
    Ok(())
}

#[test]
fn created_book_round_trips_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let input = Record::new().with("isbn", "0-553-29335-4").with("title", "Foundation");
    let payload = library.engine.create("books", &input, None)?;

    let record = payload.record().ok_or("created book has no record")?;
    for (column, value) in input.iter() {
        assert_eq!(record.get(column), Some(value), "column {column}");
    }
    assert!(record.get("created_at").and_then(FieldValue::as_timestamp).is_some());
    Ok(())
}

#[test]
fn client_mutation_id_is_echoed() -> Result<(), Box<dyn std::error::Error>> {
    let mut library = TestLibrary::new()?;
    let input = Record::new().with("name", "Octavia E. Butler");

    let created = library.engine.create("authors", &input, Some("req-1"))?;
    assert_eq!(created.client_mutation_id.as_deref(), Some("req-1"));

    let conflicted = library.engine.create("authors", &input, Some("req-2"))?;
    assert_eq!(conflicted.client_mutation_id.as_deref(), Some("req-2"));
    assert_ne!(created.mutation_id, conflicted.mutation_id);

    let anonymous = library.engine.create_author("N. K. Jemisin")?;
    assert_eq!(anonymous.client_mutation_id, None);
    Ok(())
}
