use adc_core::db::open_db_in_memory;
use adc_core::{
    roles, MemoryRepository, MemoryTransaction, Repository, Role, RoleService, SqliteRepository,
    User, UserRole, UserSearch, UserService, UserServiceError,
};

fn admin_role() -> Role {
    Role {
        id: 1,
        ..Role::new(roles::ADMIN)
    }
}

fn user_role() -> Role {
    Role {
        id: 2,
        ..Role::new(roles::USER)
    }
}

fn seeded_user(id: i64, email: &str, first: &str, last: &str, role: Role, in_active: bool) -> User {
    let mut user = User::new(email, first, last);
    user.id = id;
    user.in_active = in_active;
    user.user_roles.push(UserRole::with_role(id, role));
    user
}

/// Ann: active admin. Bob: inactive admin. Cid: active regular user.
fn mock_service(tx: &MemoryTransaction) -> UserService<MemoryRepository<User>> {
    UserService::new(MemoryRepository::with_data(
        tx,
        vec![
            seeded_user(1, "ann@adc.io", "Ann", "Lee", admin_role(), false),
            seeded_user(2, "bob@adc.io", "Bob", "Kim", admin_role(), true),
            seeded_user(3, "cid@adc.io", "Cid", "Kirk", user_role(), false),
        ],
    ))
}

#[test]
fn last_active_administrator_cannot_be_deactivated() {
    let tx = MemoryTransaction::new();
    let mut service = mock_service(&tx);

    let err = service.delete(1).unwrap_err();

    assert!(matches!(err, UserServiceError::LastAdministrator(1)));
    assert!(!service.get(1).unwrap().unwrap().in_active);
    assert_eq!(tx.stats().begun, 0);
}

#[test]
fn reactivating_a_second_admin_unblocks_the_first() {
    let tx = MemoryTransaction::new();
    let mut service = mock_service(&tx);

    assert!(!service.delete(2).unwrap());
    assert!(service.delete(1).unwrap());

    let ann = service.get(1).unwrap().unwrap();
    assert!(ann.in_active);
    assert!(matches!(
        service.delete(2),
        Err(UserServiceError::LastAdministrator(2))
    ));
}

#[test]
fn deleting_regular_user_toggles_flag_and_keeps_row() {
    let tx = MemoryTransaction::new();
    let mut service = mock_service(&tx);

    assert!(service.delete(3).unwrap());
    assert!(!service.delete(3).unwrap());

    assert_eq!(service.repository().snapshot().len(), 3);
    assert_eq!(tx.stats().committed, 2);
}

#[test]
fn deleting_unknown_user_is_not_found() {
    let tx = MemoryTransaction::new();
    let mut service = mock_service(&tx);

    assert!(matches!(
        service.delete(77),
        Err(UserServiceError::NotFound(77))
    ));
}

#[test]
fn search_filters_sorts_and_pages_with_full_total() {
    let tx = MemoryTransaction::new();
    let service = mock_service(&tx);

    let result = service
        .search(&UserSearch {
            query: Some("ki".to_string()),
            sort: "LastName".to_string(),
            direction: "asc".to_string(),
            skip: 0,
            limit: Some(1),
        })
        .unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].last_name, "Kim");
}

#[test]
fn search_defaults_to_first_name_descending() {
    let tx = MemoryTransaction::new();
    let service = mock_service(&tx);

    let result = service.search(&UserSearch::default()).unwrap();

    let names: Vec<&str> = result
        .items
        .iter()
        .map(|user| user.first_name.as_str())
        .collect();
    assert_eq!(names, vec!["Cid", "Bob", "Ann"]);
    assert_eq!(result.total, 3);
}

#[test]
fn update_issues_new_concurrency_stamp() {
    let tx = MemoryTransaction::new();
    let mut service = mock_service(&tx);
    let mut ann = service.get(1).unwrap().unwrap();
    let old_stamp = ann.concurrency_stamp.clone();

    ann.first_name = "Anna".to_string();
    let saved = service.update(ann).unwrap();

    let reloaded = service.get(1).unwrap().unwrap();
    assert_eq!(reloaded.first_name, "Anna");
    assert_ne!(reloaded.concurrency_stamp, old_stamp);
    assert_eq!(reloaded.concurrency_stamp, saved.concurrency_stamp);
}

#[test]
fn sqlite_backed_service_enforces_the_same_rules() {
    let conn = open_db_in_memory().unwrap();
    let seeded = RoleService::new(SqliteRepository::<Role>::try_new(&conn).unwrap())
        .ensure_default_roles()
        .unwrap();
    let mut links = SqliteRepository::<UserRole>::try_new(&conn).unwrap();
    let mut service = UserService::new(SqliteRepository::<User>::try_new(&conn).unwrap());

    let ann = service
        .create(User::new("ann@adc.io", "Ann", "Lee"))
        .unwrap();
    let bob = service
        .create(User::new("bob@adc.io", "Bob", "Kim"))
        .unwrap();
    links
        .create_many(vec![
            UserRole::new(ann.id, seeded[0].id),
            UserRole::new(bob.id, seeded[1].id),
        ])
        .unwrap();

    assert!(service.get(ann.id).unwrap().unwrap().is_admin());
    assert!(matches!(
        service.delete(ann.id),
        Err(UserServiceError::LastAdministrator(_))
    ));
    assert!(service.delete(bob.id).unwrap());

    let result = service
        .search(&UserSearch {
            sort: "isactive".to_string(),
            direction: "asc".to_string(),
            ..UserSearch::default()
        })
        .unwrap();
    let emails: Vec<&str> = result.items.iter().map(|user| user.email.as_str()).collect();
    assert_eq!(emails, vec!["ann@adc.io", "bob@adc.io"]);
}
