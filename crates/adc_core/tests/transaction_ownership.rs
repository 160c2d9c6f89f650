use adc_core::db::open_db_in_memory;
use adc_core::{
    MemoryRepository, MemoryTransaction, Predicate, QueryParams, RepoError, RepoResult,
    Repository, Role, SqliteRepository, TransactionStats, User,
};

fn stats(begun: u32, committed: u32, rolled_back: u32) -> TransactionStats {
    TransactionStats {
        begun,
        committed,
        rolled_back,
    }
}

#[test]
fn standalone_mutation_begins_and_commits_once() {
    let tx = MemoryTransaction::new();
    let mut roles = MemoryRepository::<Role>::new(&tx);

    roles.create(Role::new("Admin")).unwrap();

    assert_eq!(tx.stats(), stats(1, 1, 0));
    assert!(!tx.is_active());
    assert!(!roles.is_transaction_owner());
}

#[test]
fn nested_calls_share_the_outer_transaction() {
    let tx = MemoryTransaction::new();
    let mut users = MemoryRepository::<User>::new(&tx);
    let mut roles = MemoryRepository::<Role>::new(&tx);

    users.begin_transaction().unwrap();
    roles.create(Role::new("Admin")).unwrap();
    users.create(User::new("ann@adc.io", "Ann", "Lee")).unwrap();

    assert!(users.is_transaction_owner());
    assert!(roles.is_in_transaction());
    assert!(!roles.is_transaction_owner());
    assert_eq!(tx.stats(), stats(1, 0, 0));

    users.commit_transaction().unwrap();
    assert_eq!(tx.stats(), stats(1, 1, 0));
    assert_eq!(roles.snapshot().len(), 1);
}

#[test]
fn begin_while_active_does_not_take_ownership() {
    let tx = MemoryTransaction::new();
    let mut owner = MemoryRepository::<Role>::new(&tx);
    let mut other = MemoryRepository::<Role>::new(&tx);

    owner.begin_transaction().unwrap();
    other.begin_transaction().unwrap();
    other.commit_transaction().unwrap();
    other.rollback_transaction().unwrap();

    assert!(tx.is_active());
    assert!(!other.is_transaction_owner());
    assert_eq!(tx.stats(), stats(1, 0, 0));
}

#[test]
fn inner_failure_is_rolled_back_only_by_the_owner() {
    let tx = MemoryTransaction::new();
    let mut users = MemoryRepository::<User>::new(&tx);
    let mut roles = MemoryRepository::<Role>::new(&tx);
    roles.create(Role::new("User")).unwrap();

    let err = users
        .run_in_transaction(|users| -> RepoResult<()> {
            users.create_no_transaction(User::new("ann@adc.io", "Ann", "Lee"))?;
            roles.create(Role::new("Admin"))?;
            let inner = roles.create(Role::new("   "));
            assert!(matches!(inner, Err(RepoError::Validation(_))));
            assert!(roles.is_in_transaction());
            inner.map(|_| ())
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(tx.stats(), stats(2, 1, 1));
    assert!(users.snapshot().is_empty());
    let names: Vec<String> = roles.snapshot().into_iter().map(|role| role.name).collect();
    assert_eq!(names, vec!["User"]);
}

#[test]
fn separate_contexts_do_not_share_state() {
    let first = MemoryTransaction::new();
    let second = MemoryTransaction::new();
    let mut owner = MemoryRepository::<Role>::new(&first);
    let isolated = MemoryRepository::<Role>::new(&second);

    owner.begin_transaction().unwrap();

    assert!(!isolated.is_in_transaction());
    owner.rollback_transaction().unwrap();
}

#[test]
fn dropping_an_owning_memory_repository_rolls_back() {
    let tx = MemoryTransaction::new();
    let mut survivor = MemoryRepository::<Role>::new(&tx);
    {
        let mut owner = MemoryRepository::<Role>::shared(&tx, survivor.data());
        owner.begin_transaction().unwrap();
        owner.create_no_transaction(Role::new("Admin")).unwrap();
    }

    assert!(!tx.is_active());
    assert!(survivor.snapshot().is_empty());
    assert_eq!(tx.stats(), stats(1, 0, 1));

    survivor.create(Role::new("User")).unwrap();
    assert_eq!(tx.stats(), stats(2, 1, 1));
    assert!(!survivor.is_in_transaction());
    assert_eq!(survivor.snapshot().len(), 1);
}

#[test]
fn dropping_a_non_owner_leaves_the_transaction_open() {
    let tx = MemoryTransaction::new();
    let mut owner = MemoryRepository::<Role>::new(&tx);
    owner.begin_transaction().unwrap();
    {
        let mut joined = MemoryRepository::<Role>::shared(&tx, owner.data());
        joined.create(Role::new("Admin")).unwrap();
    }

    assert!(tx.is_active());
    owner.commit_transaction().unwrap();
    assert_eq!(owner.snapshot().len(), 1);
    assert_eq!(tx.stats(), stats(1, 1, 0));
}

#[test]
fn sqlite_non_owner_never_commits_or_rolls_back() {
    let conn = open_db_in_memory().unwrap();
    let mut users = SqliteRepository::<User>::try_new(&conn).unwrap();
    let mut roles = SqliteRepository::<Role>::try_new(&conn).unwrap();

    users.begin_transaction().unwrap();
    roles.create(Role::new("Admin")).unwrap();
    assert!(!conn.is_autocommit());
    assert!(!roles.is_transaction_owner());

    let failed = roles.create(Role::new("admin"));
    assert!(matches!(failed, Err(RepoError::Db(_))));
    assert!(roles.is_in_transaction());

    users.rollback_transaction().unwrap();
    assert!(conn.is_autocommit());
    assert!(roles
        .get_list(&QueryParams::new())
        .unwrap()
        .is_empty());
}

#[test]
fn sqlite_owner_commit_persists_nested_work() {
    let conn = open_db_in_memory().unwrap();
    let mut users = SqliteRepository::<User>::try_new(&conn).unwrap();
    let mut roles = SqliteRepository::<Role>::try_new(&conn).unwrap();

    let created = users
        .run_in_transaction(|users| {
            roles.create(Role::new("Admin"))?;
            users.create(User::new("ann@adc.io", "Ann", "Lee"))
        })
        .unwrap();

    assert!(conn.is_autocommit());
    assert!(!users.is_transaction_owner());
    assert_eq!(roles.count(&Predicate::always(), &[]).unwrap(), 1);
    assert_eq!(
        users
            .count(&Predicate::new(move |row: &User| row.id == created.id), &[])
            .unwrap(),
        1
    );
}

#[test]
fn dropping_an_owning_repository_rolls_back() {
    let conn = open_db_in_memory().unwrap();
    {
        let mut roles = SqliteRepository::<Role>::try_new(&conn).unwrap();
        roles.begin_transaction().unwrap();
        roles.create(Role::new("Admin")).unwrap();
    }

    assert!(conn.is_autocommit());
    let roles = SqliteRepository::<Role>::try_new(&conn).unwrap();
    assert_eq!(roles.count(&Predicate::always(), &[]).unwrap(), 0);
}
