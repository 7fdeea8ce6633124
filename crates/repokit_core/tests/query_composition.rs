mod common;

use common::{
    connection, container, names, seed_post, seed_users, ActiveUserRepository, PostRepository,
    UserRepository,
};
use repokit_core::query::WhereEntry;
use repokit_core::{
    Boolean, EntityHandle, ProvisioningError, RepoError, Repository, RepositoryError, Scope,
    SqliteStore,
};
use rusqlite::types::Value;

fn seed_people(conn: &rusqlite::Connection) -> Vec<i64> {
    seed_users(
        conn,
        &[
            ("ada", 36, true, "admin"),
            ("bob", 17, true, "member"),
            ("cy", 52, false, "admin"),
            ("dee", 25, true, "member"),
        ],
    )
}

#[test]
fn filter_conjunction_and_disjunction() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let admins_over_40 = repo
        .filter(
            [
                WhereEntry::from(("role", "admin".to_string())),
                WhereEntry::from(("age", ">", Value::Integer(40))),
            ],
            Boolean::And,
        )
        .unwrap()
        .get(&["*"])
        .unwrap();
    assert_eq!(names(&admins_over_40), vec!["cy"]);

    let either = repo
        .filter(
            [("name", "bob".to_string()), ("name", "dee".to_string())],
            Boolean::Or,
        )
        .unwrap()
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&either), vec!["bob", "dee"]);
}

#[test]
fn successive_filter_and_find_by_calls_narrow_in_order() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .find_by("role", "member".to_string())
        .unwrap()
        .filter([("age", ">=", Value::Integer(18))], Boolean::And)
        .unwrap()
        .get(&[])
        .unwrap();
    assert_eq!(names(&rows), vec!["dee"]);
}

#[test]
fn invalid_condition_leaves_handle_untouched() {
    let conn = connection();
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let err = repo
        .filter(
            [
                WhereEntry::from(("name", "ada".to_string())),
                WhereEntry::from(("age", "~", Value::Integer(1))),
            ],
            Boolean::And,
        )
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::InvalidOperator(ref op)) if op == "~"
    ));
    assert!(repo.handle().is_pristine());

    let err = repo
        .filter([("name; drop", "x".to_string())], Boolean::And)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::InvalidIdentifier(_))
    ));
}

#[test]
fn scopes_apply_in_insertion_order_with_their_mode() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    // members OR (admins that are inactive)
    let rows = repo
        .scope(Scope::closure(|repo| {
            repo.find_by("role", "member".to_string())?;
            Ok(())
        }))
        .scope(
            Scope::closure(|repo| {
                repo.filter(
                    [
                        WhereEntry::from(("role", "admin".to_string())),
                        WhereEntry::from(("active", Value::Integer(0))),
                    ],
                    Boolean::And,
                )?;
                Ok(())
            })
            .or(),
        )
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["bob", "cy", "dee"]);
}

#[test]
fn later_scope_sees_earlier_narrowing() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .scope("active")
        .scope(Scope::closure(|repo| {
            let narrowed = repo
                .handle()
                .as_query()
                .map(|query| query.predicates().len())
                .unwrap_or_default();
            assert_eq!(narrowed, 1);
            repo.call("order_by_desc", &[Value::Text("age".to_string())])?;
            Ok(())
        }))
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["ada", "dee", "bob"]);
}

#[test]
fn scope_narrows_an_earlier_or_filter() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .filter([("name", "bob".to_string()), ("name", "cy".to_string())], Boolean::Or)
        .unwrap()
        .scope(Scope::closure(|repo| {
            repo.find_by("role", "admin".to_string())?;
            Ok(())
        }))
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["cy"]);

    // Several predicates from one scope narrow as a single unit too.
    let rows = repo
        .filter([("name", "ada".to_string()), ("name", "bob".to_string())], Boolean::Or)
        .unwrap()
        .scope(Scope::closure(|repo| {
            repo.filter(
                [
                    WhereEntry::from(("role", "member".to_string())),
                    WhereEntry::from(("age", "<", Value::Integer(18))),
                ],
                Boolean::Or,
            )?;
            Ok(())
        }))
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["bob"]);
}

#[test]
fn criteria_narrow_an_earlier_or_filter() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .filter([("name", "bob".to_string()), ("name", "dee".to_string())], Boolean::Or)
        .unwrap()
        .criteria("min_age", vec![Value::Integer(18)])
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["dee"]);

    let rows = repo
        .filter([("role", "admin".to_string()), ("name", "bob".to_string())], Boolean::Or)
        .unwrap()
        .criteria("only_active", Vec::new())
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["ada", "bob"]);
}

#[test]
fn boot_filters_narrow_caller_or_filter() {
    struct AdultsOnly;

    impl repokit_core::RepositoryDefinition for AdultsOnly {
        fn name(&self) -> &str {
            "AdultsOnly"
        }

        fn model(&self) -> &str {
            "user"
        }

        fn boot(&self, repository: &mut Repository<'_>) -> repokit_core::RepoResult<()> {
            repository.filter([("age", ">=", Value::Integer(18))], Boolean::And)?;
            Ok(())
        }
    }

    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let mut repo = Repository::new(&store, &container, AdultsOnly).unwrap();

    let rows = repo
        .filter([("name", "bob".to_string()), ("name", "cy".to_string())], Boolean::Or)
        .unwrap()
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["cy"]);
}

#[test]
fn named_scope_resolves_builder_methods_and_model_methods() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    for (name, created_at) in [("ada", 100_i64), ("bob", 300), ("cy", 400), ("dee", 200)] {
        conn.execute(
            "UPDATE users SET created_at = ?1 WHERE name = ?2",
            rusqlite::params![created_at, name],
        )
        .unwrap();
    }

    let rows = repo
        .scope("active")
        .scope("latest")
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["bob", "dee", "ada"]);

    let loaded = repo.scope("loaded").get(&["name"]).unwrap();
    assert_eq!(names(&loaded), vec!["ada", "cy"]);
}

#[test]
fn unknown_named_scope_is_a_repository_error() {
    let conn = connection();
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let err = repo.scope("vip").get(&["*"]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::UnknownScope { ref scope, .. }) if scope == "vip"
    ));

    let err = repo.scope("total").get(&["*"]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::NotChainable { ref method, .. }) if method == "total"
    ));
}

#[test]
fn resolved_handle_refuses_further_narrowing() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let err = repo
        .scope("loaded")
        .scope("active")
        .get(&["*"])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::HandleResolved { ref operation }) if operation == "active"
    ));

    repo.set_handle(EntityHandle::Resolved(Vec::new()));
    let err = repo
        .filter([("name", "ada".to_string())], Boolean::And)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::HandleResolved { .. })
    ));
    assert!(!repo.exists().unwrap());
    assert!(!repo.handle().is_resolved());
}

#[test]
fn criteria_apply_after_scopes_with_constructor_args() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .criteria("min_age", vec![Value::Integer(30)])
        .scope("active")
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["ada"]);

    // Criteria may queue scopes; they run in the same pass.
    let rows = repo.criteria("only_active", Vec::new()).get(&["name"]).unwrap();
    assert_eq!(names(&rows), vec!["ada", "bob", "dee"]);
}

#[test]
fn criteria_resolution_fails_only_when_applied() {
    let conn = connection();
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    repo.criteria("missing", Vec::new());
    assert_eq!(repo.list_criteria().len(), 1);
    let err = repo.get(&["*"]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Provisioning(ProvisioningError::Unbound(ref id)) if id == "missing"
    ));

    let err = repo.criteria("mailer", Vec::new()).get(&["*"]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Provisioning(ProvisioningError::NotACriteria { .. })
    ));

    let err = repo
        .criteria("min_age", vec![Value::Text("old".to_string())])
        .get(&["*"])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Provisioning(ProvisioningError::Construction { .. })
    ));
}

#[test]
fn forwarded_calls_adopt_chainable_results_only() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    let rows = repo
        .call("named", &[Value::Text("dee".to_string())])
        .unwrap()
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["dee"]);

    let rows = repo
        .call("order_by", &[Value::Text("age".to_string())])
        .unwrap()
        .call("take", &[Value::Integer(2)])
        .unwrap()
        .get(&["name"])
        .unwrap();
    assert_eq!(names(&rows), vec!["bob", "dee"]);

    let err = repo.call("total", &[]).err().unwrap();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::NotChainable { ref method, ref repository })
            if method == "total" && repository == "UserRepository"
    ));

    let err = repo.call("teleport", &[]).err().unwrap();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::UnknownMethod { ref method, .. }) if method == "teleport"
    ));
    assert!(err.to_string().contains("teleport"));
}

#[test]
fn boot_hook_can_queue_scopes() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let mut repo = Repository::new(&store, &container, ActiveUserRepository).unwrap();

    assert_eq!(repo.get(&["name"]).unwrap().len(), 3);
    assert_eq!(repo.without_boot().get(&["name"]).unwrap().len(), 4);
    assert_eq!(repo.get(&["name"]).unwrap().len(), 3);
}

#[test]
fn exists_and_random_respect_composition() {
    let conn = connection();
    seed_people(&conn);
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut repo = Repository::new(&store, &container, definition).unwrap();

    assert!(repo.find_by("name", "ada".to_string()).unwrap().exists().unwrap());
    assert!(!repo.find_by("name", "zed".to_string()).unwrap().exists().unwrap());

    let sample = repo.random(Some(2)).unwrap().get(&["name"]).unwrap();
    assert_eq!(sample.len(), 2);

    let admins = repo
        .find_by("role", "admin".to_string())
        .unwrap()
        .random(None)
        .unwrap()
        .get(&["name"])
        .unwrap();
    let mut admin_names = names(&admins);
    admin_names.sort();
    assert_eq!(admin_names, vec!["ada", "cy"]);
}

#[test]
fn eager_loads_relations_in_both_directions() {
    let conn = connection();
    let ids = seed_people(&conn);
    seed_post(&conn, ids[0], "first");
    seed_post(&conn, ids[0], "second");
    seed_post(&conn, ids[3], "hello");
    let store = SqliteStore::new(&conn);
    let container = container();
    let (definition, _) = UserRepository::counting();
    let mut users = Repository::new(&store, &container, definition).unwrap();

    let rows = users
        .with(["posts", "first_post"])
        .unwrap()
        .get(&["*"])
        .unwrap();
    assert_eq!(rows[0].related("posts").len(), 2);
    assert_eq!(rows[0].related("first_post")[0].text("title"), Some("first"));
    assert!(rows[1].related("posts").is_empty());
    assert_eq!(rows[3].related("posts").len(), 1);

    let json = rows[0].to_json();
    assert_eq!(json["posts"].as_array().map(Vec::len), Some(2));

    let mut posts = Repository::new(&store, &container, PostRepository).unwrap();
    let post = posts
        .with(["author"])
        .unwrap()
        .find_by("title", "hello".to_string())
        .unwrap()
        .first(&["*"], true)
        .unwrap()
        .unwrap();
    assert_eq!(post.related("author")[0].text("name"), Some("dee"));

    let err = users.with(["comments"]).unwrap().get(&["*"]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Repository(RepositoryError::UnknownRelation { .. })
    ));
}
