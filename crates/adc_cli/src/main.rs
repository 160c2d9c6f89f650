//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire config, logging, storage and services end to end.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `adc_cli [config.json]`

use adc_core::{
    core_version, init_from_config, open_db_with, roles, Conversion, ConversionService,
    CoreConfig, MemoryRepository, MemoryTransaction, Predicate, Repository, RepositoryBackend,
    Role, RoleService, SqliteRepository, User, UserRole, UserSearch, UserService,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("adc_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    init_from_config(&config)?;
    info!(
        "event=cli_start module=cli status=ok backend={:?}",
        config.backend
    );

    println!("adc_core version={}", core_version());
    match config.backend {
        RepositoryBackend::Sqlite => {
            let conn = open_db_with(&config.database)?;
            let roles = SqliteRepository::<Role>::try_new(&conn)?;
            let links = SqliteRepository::<UserRole>::try_new(&conn)?;
            let users = SqliteRepository::<User>::try_new(&conn)?;
            smoke(roles, links, users)?;
            let conversions = SqliteRepository::<Conversion>::try_new(&conn)?;
            count_conversions(conversions)
        }
        RepositoryBackend::Memory => {
            let tx = MemoryTransaction::new();
            let roles = MemoryRepository::<Role>::new(&tx);
            let links = MemoryRepository::<UserRole>::new(&tx);
            let users = MemoryRepository::<User>::new(&tx);
            smoke(roles, links, users)?;
            count_conversions(MemoryRepository::<Conversion>::new(&tx))?;
            println!("memory transactions={:?}", tx.stats());
            Ok(())
        }
    }
}

/// Seeds roles, creates an administrator if none exists and prints a search.
fn smoke(
    role_repo: impl Repository<Role>,
    mut link_repo: impl Repository<UserRole>,
    user_repo: impl Repository<User>,
) -> Result<(), Box<dyn Error>> {
    let seeded = RoleService::new(role_repo).ensure_default_roles()?;
    let admin_role = seeded
        .into_iter()
        .find(|role| role.name == roles::ADMIN)
        .ok_or("admin role missing after seeding")?;

    let mut users = UserService::new(user_repo);
    let existing = users
        .repository()
        .get_one(&Predicate::new(|user: &User| user.email == "admin@adc.local"), &[], &[])?;
    if existing.is_none() {
        let admin = users.create(User::new("admin@adc.local", "Ada", "Admin"))?;
        link_repo.create(UserRole::new(admin.id, admin_role.id))?;
    }

    let result = users.search(&UserSearch {
        direction: "asc".to_string(),
        ..UserSearch::default()
    })?;
    println!("users total={}", result.total);
    for user in &result.items {
        println!(
            "user id={} email={} admin={} in_active={}",
            user.id,
            user.email,
            user.is_admin(),
            user.in_active
        );
    }
    Ok(())
}

fn count_conversions(repo: impl Repository<Conversion>) -> Result<(), Box<dyn Error>> {
    let conversions = ConversionService::new(repo);
    println!(
        "conversions total={}",
        conversions.count(&Predicate::always(), &[])?
    );
    Ok(())
}
