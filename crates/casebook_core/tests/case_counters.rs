use casebook_core::db::open_db_in_memory;
use casebook_core::{
    CaseId, CaseInput, CaseService, CaseServiceError, CorrespondenceRepository,
    DirectoryRepository, RepoError, SqliteCaseRepository, SqliteCorrespondenceRepository,
    SqliteDirectoryRepository, UserId,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seed_user(conn: &Connection, username: &str) -> UserId {
    SqliteDirectoryRepository::try_new(conn)
        .unwrap()
        .create_user(username)
        .unwrap()
}

fn create_case(conn: &mut Connection, actor: UserId, name: &str, tags: &[&str]) -> CaseId {
    let repo = SqliteCaseRepository::try_new(conn).unwrap();
    let mut service = CaseService::new(repo);
    let mut input = CaseInput::named(name);
    input.tag = tags.iter().map(|tag| tag.to_string()).collect();
    service.create_case(actor, &input).unwrap().id
}

#[test]
fn counted_view_reports_zero_letters_and_one_note() {
    let mut conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "alice");
    let case_id = create_case(&mut conn, actor, "Sprawa", &[]);
    SqliteCorrespondenceRepository::try_new(&conn)
        .unwrap()
        .add_note(case_id, "pierwsza notatka")
        .unwrap();

    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);
    let counted = service.get_case_counted(case_id).unwrap().unwrap();
    assert_eq!(counted.letter_count, 0);
    assert_eq!(counted.note_count, 1);
    assert_eq!(counted.case.name, "Sprawa");

    let data = serde_json::to_value(&counted).unwrap();
    assert_eq!(data["letter_count"], 0);
    assert_eq!(data["note_count"], 1);
    assert_eq!(data["name"], "Sprawa");
}

#[test]
fn counters_follow_current_related_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "alice");
    let case_id = create_case(&mut conn, actor, "Sprawa", &[]);
    let other_id = create_case(&mut conn, actor, "Inna sprawa", &[]);

    {
        let correspondence = SqliteCorrespondenceRepository::try_new(&conn).unwrap();
        correspondence.add_letter(case_id, "wniosek").unwrap();
        correspondence.add_letter(case_id, "odpowiedź").unwrap();
        correspondence.add_note(other_id, "notatka").unwrap();
    }
    conn.execute("DELETE FROM letters WHERE name = 'wniosek';", [])
        .unwrap();

    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);
    let counted = service.get_case_counted(case_id).unwrap().unwrap();
    assert_eq!(counted.letter_count, 1);
    assert_eq!(counted.note_count, 0);

    let other = service.get_case_counted(other_id).unwrap().unwrap();
    assert_eq!(other.letter_count, 0);
    assert_eq!(other.note_count, 1);
}

#[test]
fn counted_view_of_unknown_case_is_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);
    assert!(service.get_case_counted(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn attaching_note_to_unknown_case_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let correspondence = SqliteCorrespondenceRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();
    let err = correspondence.add_note(missing, "x").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
}

#[test]
fn list_cases_filters_by_tag_and_includes_counters() {
    let mut conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "alice");
    let tagged = create_case(&mut conn, actor, "Umowy", &["rejestr umów"]);
    create_case(&mut conn, actor, "Inne", &["inne"]);
    SqliteCorrespondenceRepository::try_new(&conn)
        .unwrap()
        .add_note(tagged, "notatka")
        .unwrap();

    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);

    let all = service.list_cases(None, None, 0).unwrap();
    assert_eq!(all.applied_limit, 20);
    assert_eq!(all.items.len(), 2);

    let filtered = service
        .list_cases(Some("  rejestr   umów ".to_string()), Some(10), 0)
        .unwrap();
    assert_eq!(filtered.items.len(), 1);
    assert_eq!(filtered.items[0].case.id, tagged);
    assert_eq!(filtered.items[0].note_count, 1);
}

#[test]
fn list_cases_rejects_blank_tag_filter() {
    let mut conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "alice");
    create_case(&mut conn, actor, "Umowy", &["rejestr umów"]);

    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);
    let err = service
        .list_cases(Some("   ".to_string()), None, 0)
        .unwrap_err();
    match err {
        CaseServiceError::Validation(errors) => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), ["tag"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn list_cases_orders_by_update_time_and_paginates() {
    let mut conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "alice");
    let older = create_case(&mut conn, actor, "Starsza", &[]);
    let newer = create_case(&mut conn, actor, "Nowsza", &[]);
    conn.execute(
        "UPDATE cases SET updated_at = 1000 WHERE uuid = ?1;",
        [older.to_string()],
    )
    .unwrap();
    conn.execute(
        "UPDATE cases SET updated_at = 2000 WHERE uuid = ?1;",
        [newer.to_string()],
    )
    .unwrap();

    let repo = SqliteCaseRepository::try_new(&mut conn).unwrap();
    let service = CaseService::new(repo);
    let first_page = service.list_cases(None, Some(1), 0).unwrap();
    assert_eq!(first_page.items.len(), 1);
    assert_eq!(first_page.items[0].case.id, newer);

    let second_page = service.list_cases(None, Some(1), 1).unwrap();
    assert_eq!(second_page.items[0].case.id, older);

    let capped = service.list_cases(None, Some(1_000), 0).unwrap();
    assert_eq!(capped.applied_limit, 100);
}
